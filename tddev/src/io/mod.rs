//! Side-effecting helpers: model calls, project files, child processes and run logs.

pub mod config;
pub mod deploy;
pub mod llm;
pub mod process;
pub mod project;
pub mod prompt;
pub mod run_log;
pub mod scaffold;
