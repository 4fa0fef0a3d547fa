use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formconv::agent::{AgentError, ToolError};
use formconv::generator::{GenerationError, XlsformGenerator};
use formconv::llm::{AssistantTurn, ChatMessage, ChatModel, LlmError, ToolCall, ToolSpec};
use formconv::pipeline::FormGenerator;
use formconv::prompt::PromptTemplate;
use formconv::sheets::ServerCommand;
use formconv::{Config, SurveyRequest};

/// Replays canned turns, then repeats `fallback` if one is set.
struct ScriptedModel {
    turns: Mutex<VecDeque<AssistantTurn>>,
    fallback: Option<AssistantTurn>,
    offered: Arc<Mutex<Vec<String>>>,
    tool_replies: Arc<Mutex<Vec<String>>>,
}

impl ScriptedModel {
    fn new(turns: Vec<AssistantTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            fallback: None,
            offered: Arc::default(),
            tool_replies: Arc::default(),
        }
    }

    fn repeating(turn: AssistantTurn) -> Self {
        Self {
            fallback: Some(turn),
            ..Self::new(Vec::new())
        }
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<AssistantTurn, LlmError> {
        *self.offered.lock().unwrap() = tools.iter().map(|t| t.name.clone()).collect();
        if let Some(ChatMessage::Tool { content, .. }) = messages.last() {
            self.tool_replies.lock().unwrap().push(content.clone());
        }
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone())
            .ok_or_else(|| LlmError::Malformed("script exhausted".into()))
    }
}

fn call(name: &str, args: &str) -> AssistantTurn {
    AssistantTurn {
        content: None,
        tool_calls: vec![ToolCall {
            id: format!("call_{}", name),
            name: name.into(),
            arguments: args.into(),
        }],
    }
}

fn answer(text: &str) -> AssistantTurn {
    AssistantTurn {
        content: Some(text.into()),
        tool_calls: Vec::new(),
    }
}

fn config(work: &Path, max_steps: usize) -> Arc<Config> {
    let mut config = Config::from_lookup(work, |key| match key {
        "AGENT_MAX_STEPS" => Some(max_steps.to_string()),
        _ => None,
    });
    config.sheet_server = ServerCommand::new(env!("CARGO_BIN_EXE_formconv-sheet-test-server"), vec![]);
    config.search_dirs = vec![work.to_path_buf()];
    std::fs::create_dir_all(&config.output_dir).unwrap();
    Arc::new(config)
}

fn target(config: &Config) -> PathBuf {
    config.output_dir.join("xlsform_survey_20240307_120000.xlsx")
}

async fn generate(config: Arc<Config>, model: ScriptedModel) -> Result<formconv::generator::GeneratedForm, GenerationError> {
    let target = target(&config);
    let generator = XlsformGenerator::with_model(config, Box::new(model), PromptTemplate::builtin());
    let request = SurveyRequest::parse("Customer feedback with name and rating").unwrap();
    tokio::time::timeout(Duration::from_secs(30), generator.generate(&request, &target))
        .await
        .expect("generation hung")
}

#[tokio::test]
async fn relative_workbook_path_lands_at_target() {
    let work = tempfile::tempdir().unwrap();
    let config = config(work.path(), 10);
    let model = ScriptedModel::new(vec![
        call("create_workbook", r#"{"filepath": "survey.xlsx"}"#),
        call(
            "write_data_to_excel",
            r#"{"filepath": "survey.xlsx", "sheet_name": "survey", "data": [["type", "name", "label"], ["text", "full_name", "Name"]]}"#,
        ),
        answer("Created the XLSForm with survey sheet."),
    ]);
    let offered = model.offered.clone();
    let replies = model.tool_replies.clone();

    let form = generate(config.clone(), model).await.unwrap();

    let target = target(&config);
    assert_eq!(form.path, target);
    assert_eq!(form.summary, "Created the XLSForm with survey sheet.");
    assert_eq!(form.steps, 3);
    assert!(!config.output_dir.join("survey.xlsx").exists());

    let contents = std::fs::read_to_string(&target).unwrap();
    assert!(contents.starts_with("PK\u{3}\u{4}"));
    assert!(contents.contains("sheet survey: 2 rows"));

    let offered = offered.lock().unwrap().clone();
    assert!(offered.contains(&"create_workbook".to_string()));
    assert!(offered.contains(&"write_data_to_excel".to_string()));

    let replies = replies.lock().unwrap().clone();
    assert_eq!(replies[0], format!("Created workbook at {}", target.display()));
    assert_eq!(replies[1], "Wrote 2 rows to 'survey'");
}

#[tokio::test]
async fn foreign_absolute_path_is_refused_and_reported_to_model() {
    let work = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let stray = elsewhere.path().join("other.xlsx");
    let config = config(work.path(), 10);
    let model = ScriptedModel::new(vec![
        call("create_workbook", &format!(r#"{{"filepath": "{}"}}"#, stray.display())),
        call("create_workbook", r#"{"filepath": "xlsform_survey_20240307_120000.xlsx"}"#),
        answer("Done."),
    ]);
    let replies = model.tool_replies.clone();

    let form = generate(config.clone(), model).await.unwrap();

    assert_eq!(form.path, target(&config));
    assert!(!stray.exists());
    let replies = replies.lock().unwrap().clone();
    assert!(replies[0].starts_with("Error: only"), "reply was: {}", replies[0]);
}

#[tokio::test]
async fn tool_failure_is_fed_back_and_run_continues() {
    let work = tempfile::tempdir().unwrap();
    let config = config(work.path(), 10);
    let model = ScriptedModel::new(vec![
        call("write_data_to_excel", r#"{"filepath": "survey.xlsx", "sheet_name": "survey", "data": []}"#),
        call("create_workbook", r#"{"filepath": "survey.xlsx"}"#),
        answer("Done."),
    ]);
    let replies = model.tool_replies.clone();

    generate(config, model).await.unwrap();

    let replies = replies.lock().unwrap().clone();
    assert!(replies[0].starts_with("Error: File not found"), "reply was: {}", replies[0]);
}

#[tokio::test]
async fn step_limit_is_a_generation_error() {
    let work = tempfile::tempdir().unwrap();
    let config = config(work.path(), 2);
    let model = ScriptedModel::repeating(call("create_workbook", r#"{"filepath": "survey.xlsx"}"#));

    let err = generate(config, model).await.unwrap_err();

    assert!(matches!(err, GenerationError::Agent(AgentError::StepLimit(2))), "got: {:?}", err);
}

#[tokio::test]
async fn server_exit_is_a_transport_failure() {
    let work = tempfile::tempdir().unwrap();
    let config = config(work.path(), 10);
    let model = ScriptedModel::new(vec![call("crash", "{}"), answer("unreachable")]);

    let err = generate(config, model).await.unwrap_err();

    assert!(
        matches!(err, GenerationError::Agent(AgentError::Tool(ToolError::Transport(_)))),
        "got: {:?}",
        err
    );
}

#[tokio::test]
async fn answer_without_workbook_is_missing() {
    let work = tempfile::tempdir().unwrap();
    let config = config(work.path(), 10);
    let model = ScriptedModel::new(vec![answer("I could not create it.")]);

    let err = generate(config.clone(), model).await.unwrap_err();

    assert!(matches!(err, GenerationError::Missing(ref p) if *p == target(&config)), "got: {:?}", err);
}
