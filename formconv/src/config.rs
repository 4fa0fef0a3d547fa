use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::sheets::ServerCommand;

pub const DEFAULT_MODEL_ID: &str = "deepinfra/Qwen/Qwen3-Next-80B-A3B-Instruct";
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.deepinfra.com/v1/openai";
pub const DEFAULT_OUTPUT_DIR: &str = "output_files";
pub const DEFAULT_CONVERSION_URL: &str = "https://formconv.herokuapp.com/result.json";
pub const DEFAULT_SHEET_SERVER: &str = "uvx excel-mcp-server stdio";
pub const DEFAULT_PROMPT_FILE: &str = "xlsform_prompt.txt";
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_AGENT_STEPS: usize = 20;
pub const TEMPERATURE: f32 = 0.6;

/// Settings for one run, read once at startup and never re-read.
#[derive(Debug)]
pub struct Config {
    pub api_key: Option<SecretString>,
    pub model_id: String,
    pub llm_base_url: String,
    pub temperature: f32,
    pub output_dir: PathBuf,
    pub conversion_url: String,
    pub conversion_timeout: Duration,
    pub sheet_server: ServerCommand,
    pub prompt_path: Option<PathBuf>,
    pub max_agent_steps: usize,
    /// Where a workbook saved under the wrong directory is looked for.
    pub search_dirs: Vec<PathBuf>,
}

impl Config {
    /// Load `.env` (if any) and read the process environment.
    pub fn from_env() -> Self {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                warn!("Ignoring unreadable .env file: {}", e);
            }
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::from_lookup(&cwd, |key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, resolving relative
    /// defaults against `cwd`.
    pub fn from_lookup<F>(cwd: &Path, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let sheet_server = get("EXCEL_MCP_COMMAND")
            .and_then(|line| {
                let parsed = ServerCommand::parse(&line);
                if parsed.is_none() {
                    warn!("EXCEL_MCP_COMMAND is blank, using default");
                }
                parsed
            })
            .or_else(|| ServerCommand::parse(DEFAULT_SHEET_SERVER))
            .unwrap_or_else(|| ServerCommand::new("uvx", vec![]));

        let prompt_path = get("XLSFORM_PROMPT_PATH").map(PathBuf::from).or_else(|| {
            let local = cwd.join(DEFAULT_PROMPT_FILE);
            local.is_file().then_some(local)
        });

        let conversion_timeout = parse_or(get("FORMCONV_CONVERT_TIMEOUT_SECS"), "FORMCONV_CONVERT_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONVERSION_TIMEOUT);

        let max_agent_steps = parse_or(get("AGENT_MAX_STEPS"), "AGENT_MAX_STEPS")
            .filter(|steps: &usize| *steps > 0)
            .unwrap_or(DEFAULT_MAX_AGENT_STEPS);

        let mut search_dirs = vec![
            cwd.to_path_buf(),
            PathBuf::from("/tmp"),
            PathBuf::from("/var/tmp"),
        ];
        if let Some(home) = get("HOME") {
            let home = PathBuf::from(home);
            search_dirs.push(home.join("Downloads"));
            search_dirs.push(home.join("Desktop"));
        }

        Self {
            api_key: get("DEEPINFRA_API_KEY").map(SecretString::from),
            model_id: get("MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            llm_base_url: get("DEEPINFRA_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: TEMPERATURE,
            output_dir: cwd.join(get("FORMCONV_OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string())),
            conversion_url: get("FORMCONV_CONVERT_URL").unwrap_or_else(|| DEFAULT_CONVERSION_URL.to_string()),
            conversion_timeout,
            sheet_server,
            prompt_path,
            max_agent_steps,
            search_dirs,
        }
    }

    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        self.output_dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            // search_dirs[0] is always the working directory
            self.search_dirs
                .first()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|| dir.to_path_buf())
        };
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str) -> Option<T> {
    let raw = value?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid {}='{}', using default", key, raw);
            None
        }
    }
}
