use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{ChatMessage, ChatModel, LlmError, ToolSpec};

#[derive(Debug, Error)]
pub enum ToolError {
    /// The call was refused before reaching the tool; the model is told why.
    #[error("{0}")]
    Rejected(String),

    /// The tool ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The tool surface itself is unusable; the run cannot continue.
    #[error("tool transport failed: {0}")]
    Transport(String),
}

/// The capabilities an agent may invoke. The caller decides what is exposed
/// and how each call is supervised.
#[async_trait]
pub trait ToolSurface: Send + Sync {
    fn specs(&self) -> Vec<ToolSpec>;

    async fn call(&self, name: &str, arguments: Value) -> Result<String, ToolError>;
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("agent did not finish within {0} steps")]
    StepLimit(usize),

    #[error(transparent)]
    Tool(ToolError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutcome {
    pub answer: String,
    pub steps: usize,
    pub tool_calls: usize,
}

pub struct Agent<'a, M: ChatModel + ?Sized> {
    model: &'a M,
    system_prompt: String,
    max_steps: usize,
}

impl<'a, M: ChatModel + ?Sized> Agent<'a, M> {
    pub fn new(model: &'a M, system_prompt: impl Into<String>, max_steps: usize) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
            max_steps,
        }
    }

    /// Drive the model until it answers without requesting tools.
    pub async fn run<T: ToolSurface + ?Sized>(&self, task: &str, tools: &T) -> Result<AgentOutcome, AgentError> {
        let specs = tools.specs();
        let mut messages = vec![
            ChatMessage::System(self.system_prompt.clone()),
            ChatMessage::User(task.to_string()),
        ];
        let mut tool_calls = 0;

        for step in 1..=self.max_steps {
            let turn = self.model.complete(&messages, &specs).await?;

            if turn.tool_calls.is_empty() {
                let answer = turn.content.unwrap_or_default();
                info!("Agent finished after {} step(s), {} tool call(s)", step, tool_calls);
                return Ok(AgentOutcome {
                    answer,
                    steps: step,
                    tool_calls,
                });
            }

            let calls = turn.tool_calls.clone();
            messages.push(ChatMessage::Assistant {
                content: turn.content,
                tool_calls: turn.tool_calls,
            });

            for call in calls {
                tool_calls += 1;
                debug!("Step {}: tool '{}' args={}", step, call.name, call.arguments);

                let output = match serde_json::from_str::<Value>(&call.arguments) {
                    Err(e) => format!("Error: arguments are not valid JSON: {}", e),
                    Ok(args) => match tools.call(&call.name, args).await {
                        Ok(text) => text,
                        Err(ToolError::Transport(reason)) => {
                            return Err(AgentError::Tool(ToolError::Transport(reason)))
                        }
                        Err(e) => format!("Error: {}", e),
                    },
                };

                messages.push(ChatMessage::Tool {
                    call_id: call.id,
                    content: output,
                });
            }
        }

        Err(AgentError::StepLimit(self.max_steps))
    }
}
