//! Host capabilities consumed by the evaluator.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::errors::EvalError;
use crate::domain::model::Selection;

/// Runs a command by identifier. `args` is `None` when the leaf carries no payload.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str, args: Option<&Value>) -> Result<Value, EvalError>;
}

/// Decides whether a scoped branch may run. `None` and `Some(false)` both prune the branch.
#[async_trait]
pub trait ScopeChecker: Send + Sync {
    async fn check(&self, scope: &Value) -> anyhow::Result<Option<bool>>;
}

/// Reads and replaces the live selections of the active document.
pub trait SelectionAccess: Send + Sync {
    fn selections(&self) -> Vec<Selection>;

    /// Replace every live selection with `selections`.
    fn set_selections(&self, selections: Vec<Selection>);
}

/// The capability bundle threaded by reference through every recursive evaluation.
pub struct ExecutionContext<'a> {
    executor: &'a dyn CommandExecutor,
    scopes: &'a dyn ScopeChecker,
    selections: &'a dyn SelectionAccess,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        executor: &'a dyn CommandExecutor,
        scopes: &'a dyn ScopeChecker,
        selections: &'a dyn SelectionAccess,
    ) -> Self {
        Self {
            executor,
            scopes,
            selections,
        }
    }

    /// Build a context from a host that provides every capability itself.
    pub fn from_host<H>(host: &'a H) -> Self
    where
        H: CommandExecutor + ScopeChecker + SelectionAccess,
    {
        Self::new(host, host, host)
    }

    /// Swap the command executor, keeping scope checks and selections.
    pub fn with_executor(self, executor: &'a dyn CommandExecutor) -> Self {
        Self { executor, ..self }
    }

    pub async fn execute(&self, command: &str, args: Option<&Value>) -> Result<Value, EvalError> {
        self.executor.execute(command, args).await
    }

    pub async fn check_scope(&self, scope: &Value) -> Result<bool, EvalError> {
        let passed = self.scopes.check(scope).await.map_err(EvalError::Scope)?;
        Ok(passed.unwrap_or(false))
    }

    pub fn selections(&self) -> Vec<Selection> {
        self.selections.selections()
    }

    pub fn set_selections(&self, selections: Vec<Selection>) {
        self.selections.set_selections(selections);
    }
}
