//! Serverless-style request handler: fetch a DICOM file, convert it, and
//! return the JPEG as base64 inside a JSON response

use crate::cleanup::{TempCleaner, SCRATCH_PREFIX};
use crate::convert::convert_to_jpeg;
use crate::source::{Downloader, StorageType};
use crate::types::Quality;
use anyhow::anyhow;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const SERVICE_NAME: &str = "dicom-to-jpg-converter";
const DEFAULT_OUTPUT_FORMAT: &str = "jpg";

/// Settings shared by every request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Root under which per-request scratch directories are created
    pub temp_dir: PathBuf,
    /// Age after which leftover scratch entries are removed
    pub max_age_hours: u64,
    /// Accept `file://` URLs and bare paths; off for remote callers
    pub allow_local_files: bool,
}

impl HandlerConfig {
    #[must_use]
    pub fn cleaner(&self) -> TempCleaner {
        TempCleaner::with_max_age_hours(&self.temp_dir, self.max_age_hours)
    }

    #[must_use]
    pub fn downloader(&self) -> Downloader {
        Downloader::new().allow_local_files(self.allow_local_files)
    }
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            max_age_hours: 24,
            allow_local_files: false,
        }
    }
}

/// Incoming conversion request
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConversionRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub storage_type: StorageType,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub quality: Option<i64>,
}

fn default_output_format() -> String {
    DEFAULT_OUTPUT_FORMAT.to_string()
}

/// HTTP-like response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    /// JSON document, serialized
    pub body: String,
}

impl Response {
    fn json(status_code: u16, body: &Value) -> Self {
        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ]);
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    fn bad_request(error: &str, message: impl Into<String>) -> Self {
        Self::json(400, &json!({ "error": error, "message": message.into() }))
    }

    /// Parse the body back into JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON
    pub fn body_json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }
}

#[derive(Debug, Serialize)]
struct ConvertedImage {
    image_base64: String,
    file_size: usize,
    format: String,
    quality: u8,
}

/// Handle one conversion event
///
/// Never fails: bad requests yield status 400, processing failures 500.
pub fn handle_request(event: &Value, config: &HandlerConfig) -> Response {
    respond(event, config, &config.downloader())
}

fn respond(event: &Value, config: &HandlerConfig, downloader: &Downloader) -> Response {
    let request: ConversionRequest = match ConversionRequest::deserialize(event) {
        Ok(request) => request,
        Err(e) => return Response::bad_request("Invalid request", e.to_string()),
    };

    let Some(url) = request.url.as_deref().filter(|u| !u.is_empty()) else {
        return Response::bad_request(
            "URL is required",
            "Please provide a valid URL in the request body",
        );
    };

    let quality = match request.quality.map(Quality::new).transpose() {
        Ok(quality) => quality.unwrap_or_default(),
        Err(e) => return Response::bad_request("Invalid quality", e.to_string()),
    };

    if !matches!(request.output_format.to_ascii_lowercase().as_str(), "jpg" | "jpeg") {
        return Response::bad_request(
            "Unsupported output format",
            format!("Output format `{}` is not supported; use jpg", request.output_format),
        );
    }

    info!("Processing URL: {url}");
    info!("Storage type: {}", request.storage_type);

    let cleaner = config.cleaner();
    cleaner.cleanup_old_files();

    match process(url, &request, quality, config, &cleaner, downloader) {
        Ok(image) => {
            info!("Successfully converted DICOM to JPG. Size: {} bytes", image.file_size);
            Response::json(
                200,
                &json!({
                    "success": true,
                    "message": "DICOM successfully converted to JPG",
                    "data": image,
                    "timestamp": timestamp(),
                }),
            )
        }
        Err(e) => {
            error!("Error processing request: {e}");
            Response::json(
                500,
                &json!({
                    "success": false,
                    "error": e.to_string(),
                    "message": "Failed to process DICOM file",
                    "timestamp": timestamp(),
                }),
            )
        }
    }
}

fn process(
    url: &str,
    request: &ConversionRequest,
    quality: Quality,
    config: &HandlerConfig,
    cleaner: &TempCleaner,
    downloader: &Downloader,
) -> anyhow::Result<ConvertedImage> {
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(&config.temp_dir)
        .map_err(|e| anyhow!("Failed to create scratch directory: {e}"))?;

    let result = convert_in(scratch.path(), url, request, quality, downloader);
    cleaner.cleanup_directory(scratch.path());

    result
}

fn convert_in(
    scratch: &Path,
    url: &str,
    request: &ConversionRequest,
    quality: Quality,
    downloader: &Downloader,
) -> anyhow::Result<ConvertedImage> {
    let input = downloader.download(url, scratch, request.storage_type)?;
    let output = convert_to_jpeg(&input, scratch, quality)?;
    let bytes = std::fs::read(&output)?;

    Ok(ConvertedImage {
        image_base64: STANDARD.encode(&bytes),
        file_size: bytes.len(),
        format: request.output_format.clone(),
        quality: quality.get(),
    })
}

/// Liveness response
#[must_use]
pub fn health_check() -> Response {
    Response::json(
        200,
        &json!({
            "status": "healthy",
            "service": SERVICE_NAME,
            "timestamp": timestamp(),
        }),
    )
}

fn timestamp() -> String {
    Utc::now().to_rfc3339()
}
