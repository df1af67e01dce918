//! Run artifacts under `<project>/.tddev/`.
//!
//! Layout:
//!
//! ```text
//! .tddev/
//!   test_data.json              requirement pipeline output, written once
//!   iterations/iteration_N.json one record per develop/verify round
//!   summary.json                written when the loop stops
//! ```
//!
//! Every file is pretty JSON with a trailing newline, written through a temp
//! file and a rename so readers never see a partial document.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::{IterationRecord, TestPlan};

pub const RUN_LOG_DIR: &str = ".tddev";

/// Final bookkeeping for one workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub iterations: u32,
    pub final_pass_rate: f64,
    pub final_passed: usize,
    pub final_failed: usize,
    pub total_tests: usize,
    /// Sum of `files_modified` over all iterations (paths counted per touch).
    pub files_modified_total: usize,
    pub project_path: PathBuf,
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RunLogPaths {
    pub dir: PathBuf,
    pub test_data_path: PathBuf,
    pub iterations_dir: PathBuf,
    pub summary_path: PathBuf,
}

impl RunLogPaths {
    pub fn new(project_root: &Path) -> Self {
        let dir = project_root.join(RUN_LOG_DIR);
        Self {
            test_data_path: dir.join("test_data.json"),
            iterations_dir: dir.join("iterations"),
            summary_path: dir.join("summary.json"),
            dir,
        }
    }

    pub fn iteration_path(&self, iteration: u32) -> PathBuf {
        self.iterations_dir
            .join(format!("iteration_{iteration}.json"))
    }
}

pub fn write_test_plan(paths: &RunLogPaths, plan: &TestPlan) -> Result<()> {
    debug!(
        requirements = plan.high_level_requirements.len(),
        test_cases = plan.test_cases.len(),
        "writing test plan"
    );
    write_json(&paths.test_data_path, plan)
}

pub fn write_iteration(paths: &RunLogPaths, record: &IterationRecord) -> Result<PathBuf> {
    let path = paths.iteration_path(record.iteration);
    debug!(iteration = record.iteration, path = %path.display(), "writing iteration record");
    write_json(&path, record)?;
    Ok(path)
}

pub fn write_summary(paths: &RunLogPaths, summary: &RunSummary) -> Result<()> {
    debug!(iterations = summary.iterations, success = summary.success, "writing run summary");
    write_json(&paths.summary_path, summary)
}

pub fn load_summary(paths: &RunLogPaths) -> Result<RunSummary> {
    read_json(&paths.summary_path)
}

pub fn load_test_plan(paths: &RunLogPaths) -> Result<TestPlan> {
    read_json(&paths.test_data_path)
}

pub fn load_iteration(paths: &RunLogPaths, iteration: u32) -> Result<IterationRecord> {
    read_json(&paths.iteration_path(iteration))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("run log path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{DevelopmentResult, TestReport};

    #[test]
    fn paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        assert!(paths.test_data_path.ends_with(".tddev/test_data.json"));
        assert!(paths.summary_path.ends_with(".tddev/summary.json"));
        assert!(
            paths
                .iteration_path(2)
                .ends_with(".tddev/iterations/iteration_2.json")
        );
    }

    #[test]
    fn iteration_record_is_pretty_json_with_newline() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        let record = IterationRecord {
            iteration: 1,
            development: DevelopmentResult {
                files_modified: vec!["src/App.tsx".to_string()],
                actions_taken: vec!["file".to_string()],
            },
            testing: TestReport::deployment_failed(2),
        };

        let path = write_iteration(&paths, &record).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        assert!(contents.starts_with("{\n  \"iteration\": 1,"));
        assert!(contents.ends_with("}\n"));
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(load_iteration(&paths, 1).expect("load"), record);
    }

    #[test]
    fn summary_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        let now = Utc::now();
        let summary = RunSummary {
            iterations: 2,
            final_pass_rate: 1.0,
            final_passed: 3,
            final_failed: 0,
            total_tests: 3,
            files_modified_total: 4,
            project_path: temp.path().to_path_buf(),
            success: true,
            started_at: now,
            finished_at: now,
        };
        write_summary(&paths, &summary).expect("write");
        assert_eq!(load_summary(&paths).expect("load"), summary);
    }

    #[test]
    fn test_plan_is_rewritten_in_place() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = RunLogPaths::new(temp.path());
        let mut plan = TestPlan::default();
        write_test_plan(&paths, &plan).expect("write");
        plan.high_level_requirements.push("Add todos".to_string());
        write_test_plan(&paths, &plan).expect("rewrite");
        assert_eq!(load_test_plan(&paths).expect("load"), plan);
    }
}
