use std::fmt::Write as _;
use std::path::Path;

use crate::pipeline::SurveyRequest;

const BUILTIN_TEMPLATE: &str = include_str!("../prompts/xlsform_prompt.txt");

pub const SYSTEM_PROMPT: &str = "You build XLSForm workbooks by calling the spreadsheet tools you are given. \
Use the tools to create the workbook, its sheets and their rows. When the file is saved, \
reply with a one-paragraph summary of the form and make no further tool calls.";

/// XLSForm authoring rules placed in front of every request.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn builtin() -> Self {
        Self {
            text: BUILTIN_TEMPLATE.to_string(),
        }
    }

    /// Read the template from `path`, or fall back to the built-in rules.
    pub fn load(path: Option<&Path>) -> std::io::Result<Self> {
        match path {
            Some(p) => Ok(Self {
                text: std::fs::read_to_string(p)?,
            }),
            None => Ok(Self::builtin()),
        }
    }

    pub fn render(&self, request: &SurveyRequest, target: &Path) -> String {
        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = target.display();

        let mut prompt = String::with_capacity(self.text.len() + 1024);
        let _ = write!(
            prompt,
            "{}\n\nUser Query: {}\n\n\
             Please generate a complete XLSForm structure that addresses the user's requirements. \
             Return the result as a valid Excel file with the sheets (survey, choices, settings) properly formatted. \
             Create the xlsx file using the spreadsheet tools. Save the file to '{}'.\n\n\
             Important instructions:\n\
             - ALWAYS create ALL three required sheets: survey, choices, and settings (even if empty)\n\
             - DO NOT create any extra sheets like 'Sheet1'\n\
             - Every sheet must have headers in the first row\n\
             - The choices sheet must have the headers 'list_name', 'name', 'label' even if empty\n\
             - Avoid any complex constraints or validation formulas\n\
             - Use the exact path '{}' (file name '{}') for every tool call that takes a file path\n",
            self.text.trim_end(),
            request.as_str(),
            target,
            target,
            file_name,
        );
        prompt
    }
}
