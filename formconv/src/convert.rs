use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::pipeline::FormConverter;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const UPLOAD_FIELD: &str = "excelFile";
pub const ERROR_REPORT_FILE: &str = "conversion_error.txt";

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("XLSForm file '{}' is missing or empty", .0.display())]
    Missing(PathBuf),

    #[error("conversion request failed")]
    Http(#[from] reqwest::Error),

    #[error("conversion service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("conversion service did not return JSON: {body}")]
    NotJson { body: String },

    #[error("conversion file access failed")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub path: PathBuf,
    pub document: Value,
}

/// Client for the XLSForm to JSON web service.
pub struct FormconvClient {
    http: reqwest::Client,
    url: String,
    error_report: PathBuf,
}

impl FormconvClient {
    pub fn new(config: &Config) -> Result<Self, ConversionError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("formconv/", env!("CARGO_PKG_VERSION")))
            .timeout(config.conversion_timeout)
            .build()?;
        Ok(Self {
            http,
            url: config.conversion_url.clone(),
            error_report: config.output_dir.join(ERROR_REPORT_FILE),
        })
    }

    async fn write_error_report(&self, status: u16, body: &str, headers: &reqwest::header::HeaderMap) {
        let report = format!("Status Code: {}\nResponse: {}\nHeaders: {:?}\n", status, body, headers);
        if let Err(e) = fs::write(&self.error_report, report).await {
            warn!("Could not write {}: {}", self.error_report.display(), e);
        }
    }
}

#[async_trait]
impl FormConverter for FormconvClient {
    async fn convert(&self, form: &Path, result_path: &Path) -> Result<ConversionResult, ConversionError> {
        // 1. Read the workbook
        let bytes = match fs::read(form).await {
            Ok(b) if b.is_empty() => return Err(ConversionError::Missing(form.to_path_buf())),
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConversionError::Missing(form.to_path_buf()))
            }
            Err(e) => return Err(ConversionError::Io(e)),
        };
        let file_name = form
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "form.xlsx".to_string());

        // 2. Upload
        let part = Part::bytes(bytes).file_name(file_name).mime_str(XLSX_MIME)?;
        info!("Posting {} to {}", form.display(), self.url);
        let response = self
            .http
            .post(&self.url)
            .multipart(Form::new().part(UPLOAD_FIELD, part))
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;
        debug!("Conversion service answered {} ({} bytes)", status, body.len());

        // 3. Validate
        if status != reqwest::StatusCode::OK {
            self.write_error_report(status.as_u16(), &body, &headers).await;
            return Err(ConversionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let document = parse_document(&body).ok_or_else(|| ConversionError::NotJson { body: body.clone() })?;

        // 4. Persist verbatim
        fs::write(result_path, body.as_bytes()).await?;
        Ok(ConversionResult {
            path: result_path.to_path_buf(),
            document,
        })
    }
}

fn parse_document(body: &str) -> Option<Value> {
    let trimmed = body.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
