//! Connection to the spreadsheet MCP server over stdio.

use rmcp::model::{Content, RawContent};
use rmcp::service::{RoleClient, RunningService, ServiceExt};
use rmcp::transport::TokioChildProcess;
use rmcp::ServiceError;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::llm::ToolSpec;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("failed to start '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("MCP handshake failed: {0}")]
    Handshake(String),

    #[error("server rejected call to '{tool}': {message}")]
    Rejected { tool: String, message: String },

    #[error("lost connection to spreadsheet tool server: {0}")]
    Transport(String),
}

/// How to launch the server: `uvx excel-mcp-server stdio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ServerCommand {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

pub struct SheetServer {
    service: RunningService<RoleClient, ()>,
}

impl SheetServer {
    /// Spawn the server with `cwd` as its working directory and perform the
    /// initialize handshake.
    pub async fn connect(command: &ServerCommand, cwd: &Path) -> Result<Self, SheetError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args).current_dir(cwd);

        let transport = TokioChildProcess::new(cmd).map_err(|source| SheetError::Spawn {
            program: command.program.clone(),
            source,
        })?;
        let service = ().serve(transport).await.map_err(|e| SheetError::Handshake(e.to_string()))?;

        info!("Connected to spreadsheet tool server: {} {}", command.program, command.args.join(" "));
        Ok(Self { service })
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>, SheetError> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| SheetError::Transport(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolSpec {
                name: tool.name.to_string(),
                description: tool.description.unwrap_or_default().to_string(),
                parameters: Value::Object(Arc::unwrap_or_clone(tool.input_schema)),
            })
            .collect())
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput, SheetError> {
        let rejected = |message: String| SheetError::Rejected {
            tool: name.to_string(),
            message,
        };
        // The request parameter type follows `call_tool`'s signature.
        let params = serde_json::from_value(json!({ "name": name, "arguments": arguments }))
            .map_err(|e| rejected(format!("arguments must be a JSON object: {}", e)))?;

        match self.service.call_tool(params).await {
            Ok(result) => Ok(ToolOutput {
                text: text_content(result.content),
                is_error: result.is_error.unwrap_or(false),
            }),
            Err(ServiceError::McpError(e)) => Err(rejected(e.message.to_string())),
            Err(e) => Err(SheetError::Transport(e.to_string())),
        }
    }

    /// Stop the service; dropping the transport terminates the child.
    pub async fn close(self) {
        match self.service.cancel().await {
            Ok(reason) => debug!("Spreadsheet tool server closed: {:?}", reason),
            Err(e) => warn!("Spreadsheet tool server did not shut down cleanly: {}", e),
        }
    }
}

fn text_content(contents: Vec<Content>) -> String {
    contents
        .into_iter()
        .filter_map(|c| match c.raw {
            RawContent::Text(text) => Some(text.text),
            _ => None,
        })
        .fold(String::new(), |mut acc, text| {
            if !acc.is_empty() {
                acc.push('\n');
            }
            acc.push_str(&text);
            acc
        })
}
