use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentError, ToolError, ToolSurface};
use crate::config::Config;
use crate::llm::{ChatClient, ChatModel, LlmError, ToolSpec};
use crate::pipeline::{FormGenerator, SurveyRequest};
use crate::prompt::{PromptTemplate, SYSTEM_PROMPT};
use crate::sheets::{SheetError, SheetServer};

/// Argument names the spreadsheet tools use for the workbook location.
const PATH_ARGUMENTS: &[&str] = &["filepath", "file_path", "path", "filename"];

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to read prompt template")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("spreadsheet tool server failed")]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("XLSForm file '{}' was not created", .0.display())]
    Missing(PathBuf),

    #[error("XLSForm file '{}' is empty", .0.display())]
    Empty(PathBuf),

    #[error("failed to move XLSForm file into place")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedForm {
    pub path: PathBuf,
    pub summary: String,
    pub steps: usize,
}

/// Spreadsheet MCP tools, restricted to writing a single workbook.
pub struct SheetTools<'a> {
    server: &'a SheetServer,
    tools: Vec<ToolSpec>,
    target: PathBuf,
}

impl<'a> SheetTools<'a> {
    pub async fn discover(server: &'a SheetServer, target: &Path) -> Result<SheetTools<'a>, SheetError> {
        let tools = server.list_tools().await?;
        info!("Spreadsheet server offers {} tools", tools.len());
        Ok(Self {
            server,
            tools,
            target: target.to_path_buf(),
        })
    }
}

#[async_trait]
impl<'a> ToolSurface for SheetTools<'a> {
    fn specs(&self) -> Vec<ToolSpec> {
        self.tools.clone()
    }

    async fn call(&self, name: &str, mut arguments: Value) -> Result<String, ToolError> {
        supervise_paths(&mut arguments, &self.target)?;

        match self.server.call_tool(name, arguments).await {
            Ok(output) if output.is_error => Err(ToolError::Failed(output.text)),
            Ok(output) => Ok(output.text),
            Err(SheetError::Rejected { message, .. }) => Err(ToolError::Failed(message)),
            Err(e) => Err(ToolError::Transport(e.to_string())),
        }
    }
}

/// Point every path argument at `target`. Relative paths and paths naming the
/// target's file are rewritten; any other absolute path is refused.
pub fn supervise_paths(arguments: &mut Value, target: &Path) -> Result<(), ToolError> {
    let Some(object) = arguments.as_object_mut() else {
        return Ok(());
    };

    for key in PATH_ARGUMENTS {
        let Some(Value::String(raw)) = object.get(*key) else {
            continue;
        };
        let requested = Path::new(raw);
        if requested == target {
            continue;
        }
        if requested.is_relative() || requested.file_name() == target.file_name() {
            debug!("Rewriting {} '{}' -> '{}'", key, raw, target.display());
            object.insert((*key).to_string(), Value::String(target.display().to_string()));
        } else {
            return Err(ToolError::Rejected(format!(
                "only '{}' may be used as {}; '{}' is outside this task",
                target.display(),
                key,
                raw
            )));
        }
    }
    Ok(())
}

/// Make sure the workbook sits at `target` with content, moving it there if a
/// file of the same name turned up in one of `search_dirs`.
pub fn settle(target: &Path, search_dirs: &[PathBuf]) -> Result<PathBuf, GenerationError> {
    if !target.exists() {
        let file_name = target
            .file_name()
            .ok_or_else(|| GenerationError::Missing(target.to_path_buf()))?;

        let found = search_dirs
            .iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate != target && candidate.is_file());

        match found {
            Some(source) => {
                warn!("XLSForm saved at '{}', moving it to '{}'", source.display(), target.display());
                move_file(&source, target)?;
            }
            None => {
                if let Some(dir) = target.parent() {
                    debug!("Files in {}: {:?}", dir.display(), list_dir(dir));
                }
                return Err(GenerationError::Missing(target.to_path_buf()));
            }
        }
    }

    if std::fs::metadata(target)?.len() == 0 {
        return Err(GenerationError::Empty(target.to_path_buf()));
    }
    Ok(target.to_path_buf())
}

fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Crossing filesystems (e.g. /tmp on tmpfs)
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

fn list_dir(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default()
}

/// Produces XLSForm workbooks by letting an LLM agent drive a spreadsheet MCP
/// server.
pub struct XlsformGenerator {
    config: Arc<Config>,
    model: Box<dyn ChatModel>,
    template: PromptTemplate,
}

impl XlsformGenerator {
    pub fn new(config: Arc<Config>) -> Result<Self, GenerationError> {
        let template = PromptTemplate::load(config.prompt_path.as_deref()).map_err(GenerationError::Prompt)?;
        let model = Box::new(ChatClient::new(&config)?);
        Ok(Self::with_model(config, model, template))
    }

    pub fn with_model(config: Arc<Config>, model: Box<dyn ChatModel>, template: PromptTemplate) -> Self {
        Self { config, model, template }
    }
}

#[async_trait]
impl FormGenerator for XlsformGenerator {
    async fn generate(&self, request: &SurveyRequest, target: &Path) -> Result<GeneratedForm, GenerationError> {
        let server = SheetServer::connect(&self.config.sheet_server, &self.config.output_dir).await?;

        let outcome = async {
            let tools = SheetTools::discover(&server, target).await?;
            let agent = Agent::new(self.model.as_ref(), SYSTEM_PROMPT, self.config.max_agent_steps);
            let prompt = self.template.render(request, target);
            Ok::<_, GenerationError>(agent.run(&prompt, &tools).await?)
        }
        .await;

        server.close().await;
        let outcome = outcome?;

        let path = settle(target, &self.config.search_dirs)?;
        Ok(GeneratedForm {
            path,
            summary: outcome.answer,
            steps: outcome.steps,
        })
    }
}
