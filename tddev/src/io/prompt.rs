//! Prompt rendering for every model call the agents make.
//!
//! Templates live next to this file under `prompts/` and are compiled into the
//! binary. Structured values (requirements, test cases, results) are rendered
//! to pretty JSON here so the templates only ever interpolate strings.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::templates::{DEFAULT_TEMPLATE, catalog_listing};
use crate::core::types::{ElaboratedRequirement, TestCase, TestResult};

const DECOMPOSE_TEMPLATE: &str = include_str!("prompts/decompose.md");
const ELABORATE_TEMPLATE: &str = include_str!("prompts/elaborate.md");
const TEST_CASE_TEMPLATE: &str = include_str!("prompts/test_case.md");
const SELECT_TEMPLATE_TEMPLATE: &str = include_str!("prompts/select_template.md");
const SELECT_CONTEXT_TEMPLATE: &str = include_str!("prompts/select_context.md");
const DEVELOP_TEMPLATE: &str = include_str!("prompts/develop.md");
const JUDGE_TEMPLATE: &str = include_str!("prompts/judge.md");
const RECOMMENDATIONS_TEMPLATE: &str = include_str!("prompts/recommendations.md");

static ENGINE: LazyLock<PromptEngine> = LazyLock::new(PromptEngine::new);

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("decompose", DECOMPOSE_TEMPLATE),
            ("elaborate", ELABORATE_TEMPLATE),
            ("test_case", TEST_CASE_TEMPLATE),
            ("select_template", SELECT_TEMPLATE_TEMPLATE),
            ("select_context", SELECT_CONTEXT_TEMPLATE),
            ("develop", DEVELOP_TEMPLATE),
            ("judge", JUDGE_TEMPLATE),
            ("recommendations", RECOMMENDATIONS_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded prompt template should be valid");
        }
        Self { env }
    }

    fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let rendered = self
            .env
            .get_template(name)
            .and_then(|template| template.render(ctx))
            .with_context(|| format!("render {name} prompt"))?;
        debug!(template = name, chars = rendered.len(), "rendered prompt");
        Ok(rendered)
    }
}

fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize prompt json")
}

/// Keep the first `budget` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn render_decompose(user_input: &str, has_image: bool) -> Result<String> {
    ENGINE.render(
        "decompose",
        context! {
            user_input => user_input.trim(),
            has_image => has_image,
        },
    )
}

pub fn render_elaborate(user_input: &str, requirement: &str, has_image: bool) -> Result<String> {
    ENGINE.render(
        "elaborate",
        context! {
            user_input => user_input.trim(),
            requirement => requirement.trim(),
            has_image => has_image,
        },
    )
}

/// `position` is the 1-based index of the test case, used for the suggested id.
pub fn render_test_case(requirement: &ElaboratedRequirement, position: usize) -> Result<String> {
    ENGINE.render(
        "test_case",
        context! {
            requirement_json => pretty_json(requirement)?,
            suggested_id => format!("test_{position}"),
        },
    )
}

pub fn render_select_template(user_input: &str, high_level: &[String]) -> Result<String> {
    ENGINE.render(
        "select_template",
        context! {
            user_input => user_input.trim(),
            requirements_json => pretty_json(high_level)?,
            catalog => catalog_listing(),
            default_key => DEFAULT_TEMPLATE,
        },
    )
}

/// Inputs for the context-selection prompt.
#[derive(Debug, Clone, Copy)]
pub struct ContextSelectionInputs<'a> {
    /// Every project file, root-relative.
    pub files: &'a [String],
    /// Paths chosen in the previous round.
    pub current_context: &'a [String],
    pub user_input: &'a str,
    pub detailed: &'a [ElaboratedRequirement],
    /// Characters of the requirements JSON to include.
    pub requirements_char_budget: usize,
    pub feedback: Option<&'a str>,
}

pub fn render_select_context(input: &ContextSelectionInputs<'_>) -> Result<String> {
    let requirements = pretty_json(input.detailed)?;
    ENGINE.render(
        "select_context",
        context! {
            file_list => input.files.join("\n"),
            current_context => input.current_context.join("\n"),
            user_input => input.user_input.trim(),
            requirements_excerpt => truncate_chars(&requirements, input.requirements_char_budget),
            feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
        },
    )
}

/// Inputs for the edit prompt.
#[derive(Debug, Clone, Copy)]
pub struct DevelopInputs<'a> {
    /// Rendered context buffer (may be empty on a fresh project).
    pub context: &'a str,
    pub user_input: &'a str,
    pub high_level: &'a [String],
    pub detailed: &'a [ElaboratedRequirement],
    pub feedback: Option<&'a str>,
}

pub fn render_develop(input: &DevelopInputs<'_>) -> Result<String> {
    ENGINE.render(
        "develop",
        context! {
            context => input.context,
            user_input => input.user_input.trim(),
            high_level_json => pretty_json(input.high_level)?,
            detailed_json => pretty_json(input.detailed)?,
            feedback => input.feedback.map(str::trim).filter(|s| !s.is_empty()),
        },
    )
}

pub fn render_judge(test_case: &TestCase, app_url: &str) -> Result<String> {
    ENGINE.render(
        "judge",
        context! {
            test_case_json => pretty_json(test_case)?,
            app_url => app_url,
            steps_json => pretty_json(&test_case.steps)?,
        },
    )
}

pub fn render_recommendations(failed: &[&TestResult]) -> Result<String> {
    ENGINE.render(
        "recommendations",
        context! {
            failed_json => pretty_json(failed)?,
        },
    )
}
