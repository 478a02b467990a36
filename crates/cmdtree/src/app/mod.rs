//! Command tree evaluation and command dispatch.

pub mod context;
pub mod evaluator;
pub mod fan_out;
pub mod registry;
