//! Deterministic, pure logic shared by the agents and the refinement loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (model replies, test results) and return deterministic outputs
//! suitable for tests.

pub mod actions;
pub mod feedback;
pub mod reply;
pub mod templates;
pub mod termination;
pub mod types;
