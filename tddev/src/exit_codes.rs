//! Process exit codes for the `tddev` CLI.

/// The run completed, whether or not the pass threshold was reached.
pub const OK: i32 = 0;
/// Configuration, client initialization, or workflow error.
pub const FAILURE: i32 = 1;
