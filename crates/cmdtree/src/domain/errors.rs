//! Domain-specific errors.

use thiserror::Error;

/// A command tree that is neither a leaf nor a group.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("malformed command tree at {path}: {reason}")]
    Malformed { path: String, reason: String },
}

impl TreeError {
    pub fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        TreeError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Failures that abort an evaluation. A failing scope check is not one of them.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Command not found: {command} (probably, you want to run command in async mode?)")]
    CommandNotFound { command: String },
    #[error(transparent)]
    Executor(#[from] anyhow::Error),
    #[error("scope check failed: {0:#}")]
    Scope(anyhow::Error),
}
