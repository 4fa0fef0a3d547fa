use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use formconv::cli::Args;
use formconv::{Config, Pipeline, RunOutcome, SurveyRequest};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let request = match SurveyRequest::parse(&args.description()) {
        Ok(r) => r,
        Err(e) => Args::command()
            .error(clap::error::ErrorKind::ValueValidation, e)
            .exit(),
    };

    let mut config = Config::from_env();
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(model) = &args.model {
        config = config.with_model(model.clone());
    }

    match run(config, &request).await {
        Ok(outcome) => {
            println!("Form generation completed successfully!");
            println!("XLSForm: {}", outcome.xlsform_path.display());
            println!("JSON:    {}", outcome.result_path.display());
            println!("JSON result:");
            println!("{}", serde_json::to_string_pretty(&outcome.document)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("Form generation failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(config: Config, request: &SurveyRequest) -> Result<RunOutcome> {
    let pipeline = Pipeline::from_config(Arc::new(config)).context("Failed to initialise pipeline")?;
    Ok(pipeline.run(request).await?)
}
