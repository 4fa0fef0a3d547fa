use async_trait::async_trait;
use chrono::Local;
use serde_json::Value;
use std::error::Error as _;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::Config;
use crate::convert::{ConversionError, ConversionResult, FormconvClient};
use crate::generator::{GeneratedForm, GenerationError, XlsformGenerator};
use crate::naming::{ArtifactKind, OutputNamer};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("survey description is empty")]
    EmptyRequest,

    #[error("cannot prepare output directory")]
    Io(#[from] std::io::Error),

    #[error("Failed to create XLSForm")]
    Generation(#[from] GenerationError),

    #[error("Form conversion failed")]
    Conversion(#[from] ConversionError),
}

impl RunError {
    /// The message followed by each underlying cause: `a: b: c`.
    pub fn report(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }
}

/// The caller's free-text description of the survey they want.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurveyRequest(String);

impl SurveyRequest {
    pub fn parse(text: &str) -> Result<Self, RunError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(RunError::EmptyRequest);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurveyRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes an XLSForm workbook for the request at `target`.
#[async_trait]
pub trait FormGenerator: Send + Sync {
    async fn generate(&self, request: &SurveyRequest, target: &Path) -> Result<GeneratedForm, GenerationError>;
}

/// Turns the workbook at `form` into JSON stored at `result_path`.
#[async_trait]
pub trait FormConverter: Send + Sync {
    async fn convert(&self, form: &Path, result_path: &Path) -> Result<ConversionResult, ConversionError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub xlsform_path: PathBuf,
    pub result_path: PathBuf,
    pub document: Value,
}

pub struct Pipeline<G, C> {
    namer: OutputNamer,
    generator: G,
    converter: C,
}

impl Pipeline<XlsformGenerator, FormconvClient> {
    /// The production wiring: LLM agent + spreadsheet MCP server, then the
    /// formconv web service.
    pub fn from_config(config: Arc<Config>) -> Result<Self, RunError> {
        let converter = FormconvClient::new(&config)?;
        let namer = OutputNamer::new(&config.output_dir);
        let generator = XlsformGenerator::new(config)?;
        Ok(Self::new(namer, generator, converter))
    }
}

impl<G: FormGenerator, C: FormConverter> Pipeline<G, C> {
    pub fn new(namer: OutputNamer, generator: G, converter: C) -> Self {
        Self {
            namer,
            generator,
            converter,
        }
    }

    pub fn output_dir(&self) -> &Path {
        self.namer.dir()
    }

    /// Generate the workbook, then convert it. Conversion is attempted only
    /// after generation succeeded; a failed conversion leaves the workbook.
    pub async fn run(&self, request: &SurveyRequest) -> Result<RunOutcome, RunError> {
        println!("Creating form for: {}", request);

        // 1. Output names
        self.namer.ensure_dir()?;
        let now = Local::now();
        let xlsform_path = self.namer.next_path(ArtifactKind::Xlsform, now);
        let result_path = self.namer.next_path(ArtifactKind::Result, now);
        info!("Output paths: {} / {}", xlsform_path.display(), result_path.display());

        // 2. Generate
        println!("Generating XLSForm...");
        let form = self.generator.generate(request, &xlsform_path).await?;
        println!("XLSForm creation result: {}", form.summary);
        println!("Successfully verified XLSForm file at {}", form.path.display());

        // 3. Convert
        println!("Converting XLSX to JSON...");
        println!("Sending XLSForm to conversion service...");
        let converted = self.converter.convert(&form.path, &result_path).await?;
        println!("Successfully converted XLSX to JSON");
        println!("JSON result saved to {}", converted.path.display());

        Ok(RunOutcome {
            xlsform_path: form.path,
            result_path: converted.path,
            document: converted.document,
        })
    }
}
