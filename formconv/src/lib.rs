pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod convert;
pub mod generator;
pub mod llm;
pub mod naming;
pub mod pipeline;
pub mod prompt;
pub mod sheets;

pub use config::Config;
pub use pipeline::{Pipeline, RunError, RunOutcome, SurveyRequest};
