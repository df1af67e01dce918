//! Run configuration, read from `config/config.toml` by default.
//!
//! The file is optional and every field has a default, so a bare checkout
//! runs with the same settings as an empty file. YAML is accepted for files
//! ending in `.yaml`/`.yml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TddevConfig {
    pub llm: LlmConfig,
    pub workflow: WorkflowConfig,
    pub development: DevelopmentConfig,
    pub testing: TestingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    /// `anthropic`, `openai`, or the `claude-agent-sdk` alias.
    pub provider: String,
    /// Provider default when absent.
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: None,
            temperature: 0.0,
            max_tokens: 8192,
            request_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub max_iterations: u32,
    /// Pass rate at or above which the loop stops successfully.
    pub pass_threshold: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            pass_threshold: 0.95,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DevelopmentConfig {
    /// Characters of the requirements JSON shown to the context selector.
    pub requirements_char_budget: usize,
    pub include_line_numbers: bool,
}

impl Default for DevelopmentConfig {
    fn default() -> Self {
        Self {
            requirements_char_budget: 1000,
            include_line_numbers: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TestingConfig {
    pub app_url: String,
    pub install_command: Vec<String>,
    pub dev_command: Vec<String>,
    pub install_timeout_secs: u64,
    pub startup_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub shutdown_grace_secs: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:5173".to_string(),
            install_command: vec!["npm".to_string(), "install".to_string()],
            dev_command: vec!["npm".to_string(), "run".to_string(), "dev".to_string()],
            install_timeout_secs: 600,
            startup_timeout_secs: 30,
            poll_interval_ms: 1000,
            shutdown_grace_secs: 5,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<u32>,
}

impl TddevConfig {
    pub fn validate(&self) -> Result<()> {
        if self.llm.provider.trim().is_empty() {
            return Err(anyhow!("llm.provider must be non-empty"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(anyhow!("llm.temperature must be within [0, 2]"));
        }
        if self.llm.max_tokens == 0 {
            return Err(anyhow!("llm.max_tokens must be > 0"));
        }
        if self.llm.request_timeout_secs == 0 {
            return Err(anyhow!("llm.request_timeout_secs must be > 0"));
        }
        if self.workflow.max_iterations == 0 {
            return Err(anyhow!("workflow.max_iterations must be > 0"));
        }
        if !(self.workflow.pass_threshold > 0.0 && self.workflow.pass_threshold <= 1.0) {
            return Err(anyhow!("workflow.pass_threshold must be within (0, 1]"));
        }
        if self.development.requirements_char_budget == 0 {
            return Err(anyhow!("development.requirements_char_budget must be > 0"));
        }
        if self.testing.app_url.trim().is_empty() {
            return Err(anyhow!("testing.app_url must be non-empty"));
        }
        check_command("testing.install_command", &self.testing.install_command)?;
        check_command("testing.dev_command", &self.testing.dev_command)?;
        if self.testing.install_timeout_secs == 0 {
            return Err(anyhow!("testing.install_timeout_secs must be > 0"));
        }
        if self.testing.startup_timeout_secs == 0 {
            return Err(anyhow!("testing.startup_timeout_secs must be > 0"));
        }
        if self.testing.poll_interval_ms == 0 {
            return Err(anyhow!("testing.poll_interval_ms must be > 0"));
        }
        if self.testing.shutdown_grace_secs == 0 {
            return Err(anyhow!("testing.shutdown_grace_secs must be > 0"));
        }
        Ok(())
    }

    /// Apply command-line overrides; the result is validated again.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Result<Self> {
        if let Some(provider) = &overrides.provider {
            // A provider switch without an explicit model must not inherit
            // the other vendor's model name from the file.
            if !provider.eq_ignore_ascii_case(&self.llm.provider) && overrides.model.is_none() {
                self.llm.model = None;
            }
            self.llm.provider = provider.clone();
        }
        if let Some(model) = &overrides.model {
            self.llm.model = Some(model.clone());
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.workflow.max_iterations = max_iterations;
        }
        self.validate()?;
        Ok(self)
    }
}

fn check_command(name: &str, command: &[String]) -> Result<()> {
    match command.first() {
        Some(program) if !program.trim().is_empty() => Ok(()),
        _ => Err(anyhow!("{name} must be a non-empty array")),
    }
}

/// Load config from a TOML (or YAML) file.
///
/// If the file is missing, returns `TddevConfig::default()`.
pub fn load_config(path: &Path) -> Result<TddevConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "config file not found, using defaults");
        let cfg = TddevConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TddevConfig = if is_yaml(path) {
        serde_yaml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    } else {
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
    };
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    info!(path = %path.display(), "loaded config");
    Ok(cfg)
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TddevConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[llm]\nprovider = \"openai\"\n\n[workflow]\nmax_iterations = 5\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.max_tokens, 8192);
        assert_eq!(cfg.workflow.max_iterations, 5);
        assert_eq!(cfg.workflow.pass_threshold, 0.95);
        assert_eq!(cfg.testing, TestingConfig::default());
    }

    #[test]
    fn yaml_files_are_accepted() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.yaml");
        fs::write(
            &path,
            "testing:\n  app_url: http://localhost:3000\n  startup_timeout_secs: 60\n",
        )
        .expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.testing.app_url, "http://localhost:3000");
        assert_eq!(cfg.testing.startup_timeout_secs, 60);
        assert_eq!(cfg.llm, LlmConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut cfg = TddevConfig::default();
        cfg.workflow.pass_threshold = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TddevConfig::default();
        cfg.testing.dev_command = vec![" ".to_string()];
        assert!(cfg.validate().is_err());

        let mut cfg = TddevConfig::default();
        cfg.llm.temperature = 2.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("config.toml");
        fs::write(&path, "[workflow]\nmax_iterations = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(format!("{err:#}").contains("max_iterations"));
    }

    #[test]
    fn overrides_take_precedence() {
        let mut cfg = TddevConfig::default();
        cfg.llm.model = Some("claude-opus-4-1".to_string());
        let cfg = cfg
            .with_overrides(&CliOverrides {
                provider: Some("openai".to_string()),
                model: None,
                max_iterations: Some(7),
            })
            .expect("overrides");
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.model, None);
        assert_eq!(cfg.workflow.max_iterations, 7);

        let cfg = TddevConfig::default()
            .with_overrides(&CliOverrides {
                model: Some("gpt-4.1-mini".to_string()),
                ..CliOverrides::default()
            })
            .expect("overrides");
        assert_eq!(cfg.llm.model.as_deref(), Some("gpt-4.1-mini"));
    }

    #[test]
    fn zero_iteration_override_is_rejected() {
        let overrides = CliOverrides {
            max_iterations: Some(0),
            ..CliOverrides::default()
        };
        assert!(TddevConfig::default().with_overrides(&overrides).is_err());
    }
}
