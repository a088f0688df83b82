//! Removal of stale scratch directories and files left by earlier requests

use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Prefix of every per-request scratch directory
pub const SCRATCH_PREFIX: &str = "dicom_lambda_";

const SECONDS_PER_HOUR: u64 = 3600;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Outcome of one [`TempCleaner::cleanup_old_files`] sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupReport {
    pub cleaned_directories: usize,
    pub cleaned_files: usize,
    pub total_size_freed_bytes: u64,
    pub total_size_freed_mb: f64,
    pub errors: Vec<String>,
    pub cleanup_time: String,
}

/// Snapshot of the scratch entries currently on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempUsageStats {
    pub total_temp_directories: usize,
    pub total_temp_files: usize,
    pub total_size_bytes: u64,
    pub total_size_mb: f64,
    pub oldest_file_age_hours: f64,
    pub newest_file_age_hours: f64,
}

#[derive(Debug, Clone)]
pub struct TempCleaner {
    base_dir: PathBuf,
    prefix: String,
    max_age: Duration,
}

impl TempCleaner {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            base_dir: base_dir.into(),
            prefix: SCRATCH_PREFIX.to_string(),
            max_age,
        }
    }

    /// Cleaner with the age limit given in hours; saturates instead of overflowing
    #[must_use]
    pub fn with_max_age_hours(base_dir: impl Into<PathBuf>, hours: u64) -> Self {
        Self::new(
            base_dir,
            Duration::from_secs(hours.saturating_mul(SECONDS_PER_HOUR)),
        )
    }

    /// Remove scratch directories and files older than the maximum age
    ///
    /// Failures on individual entries are collected in the report.
    pub fn cleanup_old_files(&self) -> CleanupReport {
        info!(
            "Starting cleanup of files older than {} hours",
            self.max_age.as_secs() / SECONDS_PER_HOUR
        );

        let mut report = CleanupReport {
            cleaned_directories: 0,
            cleaned_files: 0,
            total_size_freed_bytes: 0,
            total_size_freed_mb: 0.0,
            errors: Vec::new(),
            cleanup_time: String::new(),
        };

        let (dirs, files) = match self.find_entries() {
            Ok(entries) => entries,
            Err(e) => {
                let message = format!("Failed to list {}: {e}", self.base_dir.display());
                error!("{message}");
                report.errors.push(message);
                (Vec::new(), Vec::new())
            }
        };

        for dir in dirs {
            match self.remove_if_stale(&dir, true) {
                Ok(Some(size)) => {
                    report.cleaned_directories += 1;
                    report.total_size_freed_bytes += size;
                    info!("Cleaned up temp directory: {}", dir.display());
                }
                Ok(None) => {}
                Err(e) => {
                    let message = format!("Failed to clean directory {}: {e}", dir.display());
                    error!("{message}");
                    report.errors.push(message);
                }
            }
        }

        for file in files {
            match self.remove_if_stale(&file, false) {
                Ok(Some(size)) => {
                    report.cleaned_files += 1;
                    report.total_size_freed_bytes += size;
                    info!("Cleaned up temp file: {}", file.display());
                }
                Ok(None) => {}
                Err(e) => {
                    let message = format!("Failed to clean file {}: {e}", file.display());
                    error!("{message}");
                    report.errors.push(message);
                }
            }
        }

        report.total_size_freed_mb = to_mb(report.total_size_freed_bytes);
        report.cleanup_time = Utc::now().to_rfc3339();

        info!(
            "Cleanup completed. Dirs: {}, Files: {}, Size freed: {} MB",
            report.cleaned_directories, report.cleaned_files, report.total_size_freed_mb
        );
        report
    }

    /// Remove a directory tree; `false` if it is missing or removal fails
    pub fn cleanup_directory(&self, path: &Path) -> bool {
        if !path.is_dir() {
            warn!("Directory not found: {}", path.display());
            return false;
        }
        match fs::remove_dir_all(path) {
            Ok(()) => {
                info!("Cleaned up directory: {}", path.display());
                true
            }
            Err(e) => {
                error!("Failed to clean directory {}: {e}", path.display());
                false
            }
        }
    }

    /// Remove a single file; `false` if it is missing or removal fails
    pub fn cleanup_file(&self, path: &Path) -> bool {
        if !path.is_file() {
            warn!("File not found: {}", path.display());
            return false;
        }
        match fs::remove_file(path) {
            Ok(()) => {
                info!("Cleaned up file: {}", path.display());
                true
            }
            Err(e) => {
                error!("Failed to clean file {}: {e}", path.display());
                false
            }
        }
    }

    /// Count and size the scratch entries without touching them
    pub fn usage_stats(&self) -> TempUsageStats {
        let (dirs, files) = self.find_entries().unwrap_or_else(|e| {
            error!("Failed to get temp usage stats: {e}");
            (Vec::new(), Vec::new())
        });

        let mut total_size_bytes = 0;
        let mut ages: Vec<Duration> = Vec::new();
        for (path, is_dir) in dirs.iter().map(|p| (p, true)).chain(files.iter().map(|p| (p, false))) {
            let Ok(meta) = fs::metadata(path) else {
                continue;
            };
            total_size_bytes += if is_dir { directory_size(path) } else { meta.len() };
            if let Some(age) = age_of(&meta) {
                ages.push(age);
            }
        }

        let hours = |d: Option<&Duration>| d.map_or(0.0, |d| d.as_secs_f64() / SECONDS_PER_HOUR as f64);
        TempUsageStats {
            total_temp_directories: dirs.len(),
            total_temp_files: files.len(),
            total_size_bytes,
            total_size_mb: to_mb(total_size_bytes),
            oldest_file_age_hours: hours(ages.iter().max()),
            newest_file_age_hours: hours(ages.iter().min()),
        }
    }

    /// Scratch directories and loose scratch files directly under the base directory
    fn find_entries(&self) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let Ok(entry) = entry else {
                continue;
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() && name.starts_with(&self.prefix) {
                dirs.push(entry.path());
            } else if file_type.is_file() && self.is_scratch_file(name) {
                files.push(entry.path());
            }
        }

        Ok((dirs, files))
    }

    fn is_scratch_file(&self, name: &str) -> bool {
        name.starts_with(&self.prefix)
            || (name.starts_with("tmp") && (name.ends_with(".dcm") || name.ends_with(".jpg")))
    }

    /// Remove `path` if its mtime is past the maximum age; returns bytes freed
    fn remove_if_stale(&self, path: &Path, is_dir: bool) -> io::Result<Option<u64>> {
        let meta = fs::metadata(path)?;
        let stale = age_of(&meta).is_some_and(|age| age > self.max_age);
        if !stale {
            return Ok(None);
        }

        if is_dir {
            let size = directory_size(path);
            fs::remove_dir_all(path)?;
            Ok(Some(size))
        } else {
            let size = meta.len();
            fs::remove_file(path)?;
            Ok(Some(size))
        }
    }
}

impl Default for TempCleaner {
    fn default() -> Self {
        Self::with_max_age_hours(std::env::temp_dir(), 24)
    }
}

fn age_of(meta: &fs::Metadata) -> Option<Duration> {
    let modified = meta.modified().ok()?;
    Some(SystemTime::now().duration_since(modified).unwrap_or_default())
}

/// Total size of the regular files below `path`; unreadable entries are skipped
fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}
