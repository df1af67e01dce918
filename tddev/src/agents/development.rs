//! Development agent: picks a starter template, chooses which files to show
//! the model, and applies the edits it proposes.

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument, warn};

use crate::core::actions::{parse_file_actions, parse_included_paths};
use crate::core::templates::{Template, resolve_template};
use crate::core::types::{DevelopmentResult, ElaboratedRequirement};
use crate::io::config::DevelopmentConfig;
use crate::io::llm::CompletionClient;
use crate::io::project::ProjectStore;
use crate::io::prompt::{
    ContextSelectionInputs, DevelopInputs, render_develop, render_select_context,
    render_select_template,
};
use crate::io::scaffold::Scaffolder;

pub struct DevelopmentAgent<'a, C: CompletionClient> {
    client: &'a C,
    store: &'a ProjectStore,
    scaffolder: &'a dyn Scaffolder,
    config: DevelopmentConfig,
    /// Paths chosen by the last context selection.
    held_context: Vec<String>,
}

impl<'a, C: CompletionClient> DevelopmentAgent<'a, C> {
    pub fn new(
        client: &'a C,
        store: &'a ProjectStore,
        scaffolder: &'a dyn Scaffolder,
        config: DevelopmentConfig,
    ) -> Self {
        Self {
            client,
            store,
            scaffolder,
            config,
            held_context: Vec::new(),
        }
    }

    pub fn held_context(&self) -> &[String] {
        &self.held_context
    }

    /// Let the model pick a catalog template, then write its starter files.
    #[instrument(skip_all)]
    pub fn initialize_project(
        &self,
        user_input: &str,
        high_level: &[String],
    ) -> Result<&'static Template> {
        let prompt = render_select_template(user_input, high_level)?;
        let reply = self
            .client
            .prompt(&prompt)
            .context("request template selection")?;
        let template = resolve_template(&reply);
        if template.key != reply.trim().to_lowercase() {
            warn!(reply = %reply.trim(), fallback = template.key, "invalid template choice");
        }
        info!(template = template.key, "selected template");

        let written = self
            .scaffolder
            .materialize(self.store, template)
            .with_context(|| format!("scaffold template {}", template.key))?;
        debug!(files = written.len(), "scaffold written");
        Ok(template)
    }

    /// Ask the model which existing files matter for the next edit.
    ///
    /// The result replaces the held context. An empty project yields an empty
    /// selection without a model call; paths that do not exist are dropped.
    #[instrument(skip_all, fields(has_feedback = feedback.is_some()))]
    pub fn select_context(
        &mut self,
        user_input: &str,
        detailed: &[ElaboratedRequirement],
        feedback: Option<&str>,
    ) -> Result<Vec<String>> {
        let files = self.store.list_files(None).context("list project files")?;
        if files.is_empty() {
            debug!("empty project, nothing to select");
            self.held_context.clear();
            return Ok(Vec::new());
        }

        let prompt = render_select_context(&ContextSelectionInputs {
            files: &files,
            current_context: &self.held_context,
            user_input,
            detailed,
            requirements_char_budget: self.config.requirements_char_budget,
            feedback,
        })?;
        let reply = self
            .client
            .prompt(&prompt)
            .context("request context selection")?;

        let mut selected: Vec<String> = Vec::new();
        for path in parse_included_paths(&reply) {
            if selected.contains(&path) {
                continue;
            }
            if self.store.exists(&path) {
                selected.push(path);
            } else {
                debug!(path = %path, "dropping selected path that does not exist");
            }
        }
        info!(selected = selected.len(), available = files.len(), "selected context");
        self.held_context = selected.clone();
        Ok(selected)
    }

    /// One edit cycle: select context, prompt for actions, apply them.
    #[instrument(skip_all, fields(has_feedback = feedback.is_some()))]
    pub fn develop(
        &mut self,
        user_input: &str,
        high_level: &[String],
        detailed: &[ElaboratedRequirement],
        feedback: Option<&str>,
    ) -> Result<DevelopmentResult> {
        info!("starting development cycle");
        let selected = self.select_context(user_input, detailed, feedback)?;
        let context = self
            .store
            .context_buffer(&selected, self.config.include_line_numbers)
            .context("build context buffer")?;
        debug!(files = selected.len(), chars = context.len(), "context buffer ready");

        let prompt = render_develop(&DevelopInputs {
            context: &context,
            user_input,
            high_level,
            detailed,
            feedback,
        })?;
        let reply = self
            .client
            .prompt(&prompt)
            .context("request file actions")?;

        let actions = parse_file_actions(&reply);
        if actions.is_empty() {
            warn!(reply_chars = reply.len(), "reply contained no file actions");
        }

        let mut result = DevelopmentResult::default();
        for action in &actions {
            result.actions_taken.push(action.kind().to_string());
            match self.store.apply_action(action) {
                Ok(true) => result.files_modified.push(action.path().to_string()),
                Ok(false) => {}
                Err(err) => {
                    error!(kind = action.kind(), path = action.path(), err = %err, "failed to apply action");
                }
            }
        }
        info!(
            actions = result.actions_taken.len(),
            modified = result.files_modified.len(),
            "development cycle finished"
        );
        Ok(result)
    }
}
