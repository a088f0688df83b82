//! Retrieval of the input file into a per-request scratch directory

use serde::Deserialize;
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use suppaftp::types::FileType;
use suppaftp::FtpStream;
use thiserror::Error;
use tracing::{error, info, warn};

const USER_AGENT: &str = "DICOM-Lambda-Converter/1.0";
const DEFAULT_FILE_NAME: &str = "dicom_file.dcm";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const FTP_DEFAULT_PORT: u16 = 21;
const FTP_ANONYMOUS_USER: &str = "anonymous";
const FTP_ANONYMOUS_PASSWORD: &str = "anonymous@";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to download from HTTP: {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },

    #[error("Failed to download from FTP: {url}: {source}")]
    Ftp {
        url: String,
        #[source]
        source: suppaftp::FtpError,
    },

    #[error("Local file access is disabled")]
    LocalFilesDisabled,

    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a request's input lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Detect from the URL
    #[default]
    Auto,
    S3,
    R2,
    Ftp,
    Http,
    File,
}

impl StorageType {
    /// Replace [`StorageType::Auto`] with the type detected from `url`
    #[must_use]
    pub fn resolve(self, url: &str) -> StorageType {
        match self {
            StorageType::Auto => detect_storage_type(url),
            other => other,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageType::Auto => "auto",
            StorageType::S3 => "s3",
            StorageType::R2 => "r2",
            StorageType::Ftp => "ftp",
            StorageType::Http => "http",
            StorageType::File => "file",
        };
        f.write_str(name)
    }
}

/// Guess the storage type from the URL's scheme and host
#[must_use]
pub fn detect_storage_type(url: &str) -> StorageType {
    let Some((scheme, rest)) = url.split_once("://") else {
        return StorageType::File;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();

    match scheme.to_ascii_lowercase().as_str() {
        "ftp" => StorageType::Ftp,
        "file" => StorageType::File,
        _ if host.contains("s3.amazonaws.com") => StorageType::S3,
        _ if host.contains("r2.cloudflarestorage.com") => StorageType::R2,
        _ => StorageType::Http,
    }
}

/// Something that can place a copy of `url` inside `dest_dir`
pub trait FileSource {
    /// Fetch `url` into `dest_dir` and return the local path
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] if the file cannot be retrieved or written
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// Plain HTTP(S) GET; also serves public S3 and R2 objects
pub struct HttpSource {
    agent: ureq::Agent,
}

impl HttpSource {
    #[must_use]
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(HTTP_TIMEOUT)
            .build();
        Self { agent }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSource for HttpSource {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let response = self.agent.get(url).call().map_err(|e| {
            error!("HTTP download failed: {e}");
            FetchError::Http {
                url: url.to_string(),
                source: Box::new(e),
            }
        })?;

        let file_name = response
            .header("Content-Disposition")
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| file_name_from_url(url));
        let path = dest_dir.join(file_name);

        let io_error = |source| FetchError::Io {
            path: path.clone(),
            source,
        };
        let mut file = File::create(&path).map_err(io_error)?;
        io::copy(&mut response.into_reader(), &mut file).map_err(io_error)?;

        info!("Successfully downloaded from HTTP: {url}");
        Ok(path)
    }
}

/// Copies a local file (`file://` URL or bare path)
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSource;

impl FileSource for LocalFileSource {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let source = Path::new(url.strip_prefix("file://").unwrap_or(url));
        if !source.is_file() {
            return Err(FetchError::NotFound(source.to_path_buf()));
        }

        let file_name = source
            .file_name()
            .map_or_else(|| PathBuf::from(DEFAULT_FILE_NAME), PathBuf::from);
        let path = dest_dir.join(file_name);
        std::fs::copy(source, &path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;

        info!("Copied local file {}", source.display());
        Ok(path)
    }
}

/// Location and credentials parsed from an `ftp://[user[:password]@]host[:port]/path` URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpLocation {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub path: String,
}

impl FtpLocation {
    /// Parse an FTP URL; anonymous login on port 21 unless the URL says otherwise
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] for a non-FTP scheme, an empty host,
    /// a bad port or a missing path
    pub fn parse(url: &str) -> Result<Self, FetchError> {
        let invalid = |reason: &str| FetchError::InvalidUrl(format!("{url}: {reason}"));

        let rest = url
            .split_once("://")
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("ftp"))
            .map(|(_, rest)| rest)
            .ok_or_else(|| invalid("not an ftp URL"))?;
        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let (authority, path) = rest
            .split_once('/')
            .ok_or_else(|| invalid("missing file path"))?;
        if path.is_empty() {
            return Err(invalid("missing file path"));
        }

        let (userinfo, host_port) = match authority.rsplit_once('@') {
            Some((userinfo, host_port)) => (Some(userinfo), host_port),
            None => (None, authority),
        };
        let (user, password) = match userinfo {
            Some(info) => match info.split_once(':') {
                Some((user, password)) => (user, password),
                None => (info, FTP_ANONYMOUS_PASSWORD),
            },
            None => (FTP_ANONYMOUS_USER, FTP_ANONYMOUS_PASSWORD),
        };
        let (host, port) = match host_port.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid("bad port"))?),
            None => (host_port, FTP_DEFAULT_PORT),
        };
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        Ok(Self {
            host: host.to_string(),
            port,
            user: if user.is_empty() { FTP_ANONYMOUS_USER } else { user }.to_string(),
            password: password.to_string(),
            path: format!("/{path}"),
        })
    }

    fn file_name(&self) -> String {
        self.path
            .rsplit('/')
            .next()
            .and_then(sanitize_file_name)
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
    }
}

/// Binary-mode RETR over a passive FTP session
#[derive(Debug, Clone, Copy, Default)]
pub struct FtpSource;

impl FileSource for FtpSource {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
        let location = FtpLocation::parse(url)?;
        let ftp_error = |source: suppaftp::FtpError| {
            error!("FTP download failed: {source}");
            FetchError::Ftp {
                url: url.to_string(),
                source,
            }
        };

        let mut ftp = FtpStream::connect((location.host.as_str(), location.port))
            .map_err(ftp_error)?;
        ftp.login(&location.user, &location.password)
            .map_err(ftp_error)?;
        ftp.transfer_type(FileType::Binary).map_err(ftp_error)?;
        let data = ftp.retr_as_buffer(&location.path).map_err(ftp_error)?;
        if let Err(e) = ftp.quit() {
            warn!("FTP quit failed: {e}");
        }

        let path = dest_dir.join(location.file_name());
        std::fs::write(&path, data.into_inner()).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;

        info!(
            "Successfully downloaded from FTP: {}:{}{}",
            location.host, location.port, location.path
        );
        Ok(path)
    }
}

/// Dispatches a URL to the source for its storage type
#[derive(Default)]
pub struct Downloader {
    http: HttpSource,
    ftp: FtpSource,
    local: LocalFileSource,
    allow_local_files: bool,
}

impl Downloader {
    /// Downloader for remote sources only; local paths are refused
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit `file://` URLs and bare paths
    #[must_use]
    pub fn allow_local_files(mut self, allow: bool) -> Self {
        self.allow_local_files = allow;
        self
    }

    /// Fetch `url` into `dest_dir` using the given (or detected) storage type
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::LocalFilesDisabled`] for a local path unless
    /// enabled with [`Downloader::allow_local_files`], or the source's error
    /// if the fetch fails
    pub fn download(
        &self,
        url: &str,
        dest_dir: &Path,
        storage_type: StorageType,
    ) -> Result<PathBuf, FetchError> {
        let storage_type = storage_type.resolve(url);
        info!("Downloading from {storage_type}: {url}");

        match storage_type {
            StorageType::S3 | StorageType::R2 | StorageType::Http | StorageType::Auto => {
                self.http.fetch(url, dest_dir)
            }
            StorageType::File if self.allow_local_files => self.local.fetch(url, dest_dir),
            StorageType::File => {
                warn!("Refusing local file access: {url}");
                Err(FetchError::LocalFilesDisabled)
            }
            StorageType::Ftp => self.ftp.fetch(url, dest_dir),
        }
    }
}

/// Last path segment of the URL when it looks like a file name
fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest.split_once('/').map_or("", |(_, p)| p));

    path.rsplit('/')
        .next()
        .filter(|name| name.contains('.'))
        .and_then(sanitize_file_name)
        .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string())
}

fn file_name_from_disposition(header: &str) -> Option<String> {
    let (_, value) = header.split_once("filename=")?;
    let value = value.split(';').next().unwrap_or_default();
    sanitize_file_name(value.trim().trim_matches('"'))
}

/// Keep a name only if it cannot escape the destination directory
fn sanitize_file_name(name: &str) -> Option<String> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        None
    } else {
        Some(name.to_string())
    }
}
