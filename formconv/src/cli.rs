use clap::Parser;
use std::path::PathBuf;

/// Describe a survey in plain language; get an XLSForm workbook and its JSON.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Example: formconv 'Create a survey to collect patient information including name, age, symptoms, and treatment preferences'")]
pub struct Args {
    /// Survey description (several words are joined with spaces)
    #[arg(required = true, num_args = 1.., value_name = "DESCRIPTION")]
    pub description: Vec<String>,

    /// Directory for the generated files (overrides FORMCONV_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Model id (overrides MODEL_ID)
    #[arg(long)]
    pub model: Option<String>,
}

impl Args {
    pub fn description(&self) -> String {
        self.description.join(" ")
    }
}
