//! Command tree model and the errors it can raise.

pub mod errors;
pub mod model;
