//! Test-only doubles for the model client and the deployer, plus reply fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde_json::json;

use crate::io::deploy::Deployer;
use crate::io::llm::{ChatMessage, CompletionClient, CompletionOptions, LlmError};
use crate::io::project::ProjectStore;

/// Replays canned replies in call order and records every prompt it receives.
///
/// Once the script runs out, calls fail with a configuration error so a test
/// that makes an unexpected call surfaces it instead of hanging on defaults.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<Result<String, String>>>,
    prompts: RefCell<Vec<String>>,
    image_calls: RefCell<Vec<Vec<PathBuf>>>,
    fail_all: Option<String>,
}

impl ScriptedClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            ..Self::default()
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_all: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn push(&self, reply: impl Into<String>) {
        self.replies.borrow_mut().push_back(Ok(reply.into()));
    }

    /// Queue a transport failure for the next unanswered call.
    pub fn push_error(&self, message: impl Into<String>) {
        self.replies.borrow_mut().push_back(Err(message.into()));
    }

    /// Prompt text of every call so far, image calls included.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.borrow().clone()
    }

    /// Image lists of every `complete_with_images` call.
    pub fn image_calls(&self) -> Vec<Vec<PathBuf>> {
        self.image_calls.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }

    fn next_reply(&self) -> Result<String, LlmError> {
        if let Some(message) = &self.fail_all {
            return Err(LlmError::Configuration(message.clone()));
        }
        match self.replies.borrow_mut().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(LlmError::Configuration(message)),
            None => Err(LlmError::Configuration(
                "scripted client has no replies left".to_string(),
            )),
        }
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(
        &self,
        messages: &[ChatMessage],
        _system: Option<&str>,
        _options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let text = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.borrow_mut().push(text);
        self.next_reply()
    }

    fn complete_with_images(
        &self,
        text: &str,
        images: &[PathBuf],
        _system: Option<&str>,
    ) -> Result<String, LlmError> {
        self.prompts.borrow_mut().push(text.to_string());
        self.image_calls.borrow_mut().push(images.to_vec());
        self.next_reply()
    }
}

/// Deployer that reports scripted outcomes without starting anything.
///
/// When the script is exhausted every deploy succeeds.
#[derive(Debug, Default)]
pub struct ScriptedDeployer {
    outcomes: VecDeque<bool>,
    deploys: usize,
    stops: usize,
    roots: Vec<PathBuf>,
}

impl ScriptedDeployer {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn deploys(&self) -> usize {
        self.deploys
    }

    pub fn stops(&self) -> usize {
        self.stops
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

impl Deployer for ScriptedDeployer {
    fn deploy(&mut self, project_root: &Path) -> bool {
        self.deploys += 1;
        self.roots.push(project_root.to_path_buf());
        self.outcomes.pop_front().unwrap_or(true)
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Project store over a fresh temp directory; keep the guard alive.
pub fn temp_project() -> (tempfile::TempDir, ProjectStore) {
    let temp = tempfile::tempdir().expect("create temp dir");
    let store = ProjectStore::open(temp.path().join("app")).expect("open project store");
    (temp, store)
}

/// Elaboration reply for `requirement`.
pub fn elaboration_reply(requirement: &str) -> String {
    json!({
        "requirement": requirement,
        "functionality": format!("The app lets the user {}", requirement.to_lowercase()),
        "ui_design": {
            "layout": "single column",
            "components": ["list", "button"],
            "styling": "minimal"
        },
        "interactions": [
            {"trigger": "click", "action": "update", "expected_result": "list changes"}
        ],
        "data": {"type": "mock", "schema": {"title": "string"}, "source": "in-memory"},
        "dependencies": []
    })
    .to_string()
}

/// Fenced test-case reply, as models usually send it.
pub fn test_case_reply(test_id: &str, requirement: &str) -> String {
    let body = json!({
        "test_id": test_id,
        "requirement": requirement,
        "persona": {
            "name": "Alice",
            "goal": format!("check that the app can {}", requirement.to_lowercase()),
            "context": "busy professional on a first visit"
        },
        "steps": [
            {
                "step_number": 1,
                "description": "Alice opens the app",
                "action": "navigate to the home page",
                "expected_result": "the main view renders"
            }
        ],
        "validation": {
            "functionality": "the requested behaviour works",
            "visual": "matches the described layout"
        }
    });
    format!("```json\n{body:#}\n```")
}

/// Judge reply with the given status string (`passed`, `failed`, `partial`).
pub fn judge_reply(status: &str, issues: &[&str]) -> String {
    json!({
        "test_id": "ignored",
        "status": status,
        "confidence": 0.9,
        "issues": issues,
        "observations": format!("judged {status}")
    })
    .to_string()
}

/// Development reply writing one file per `(path, content)` pair.
pub fn write_actions_reply(files: &[(&str, &str)]) -> String {
    files
        .iter()
        .map(|(path, content)| format!("<Action type=\"file\" filePath=\"{path}\">\n{content}\n</Action>"))
        .collect::<Vec<_>>()
        .join("\n\n")
}
