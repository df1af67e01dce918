//! Test-driven generation of web applications by cooperating model agents.
//!
//! A request is decomposed into requirements and narrative test cases once;
//! the app is then edited and verified in a loop until enough cases pass.
//!
//! - **[`core`]**: pure logic (reply parsing, action blocks, feedback,
//!   termination rules, the data model).
//! - **[`io`]**: side effects (model HTTP calls, project files, child
//!   processes, run logs, configuration).
//! - **[`agents`]**: the requirement pipeline, developer and tester.
//! - **[`workflow`]**: the loop that ties them together.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod workflow;
