//! Model-driven agents: requirement pipeline, developer, and tester.

pub mod development;
pub mod test_generation;
pub mod testing;
