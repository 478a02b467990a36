//! In-memory editor host.
//!
//! Stands in for a real editor: it owns the live selections, a set of active context keys used
//! for scope checks, and a handful of cursor commands. Every command it runs is logged.

use std::collections::BTreeSet;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::context::{CommandExecutor, ScopeChecker, SelectionAccess};
use crate::domain::errors::EvalError;
use crate::domain::model::{Position, Selection};

/// Serializable editor state: live selections and active context keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    #[serde(default)]
    pub selections: Vec<Selection>,
    #[serde(default)]
    pub context: BTreeSet<String>,
}

/// A command the editor executed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invocation {
    pub command: String,
    pub args: Option<Value>,
}

#[derive(Debug, Clone, Copy)]
enum Motion {
    Up,
    Down,
    Left,
    Right,
    Home,
}

#[derive(Debug, Default)]
pub struct SimulatedEditor {
    selections: Mutex<Vec<Selection>>,
    context: BTreeSet<String>,
    invocations: Mutex<Vec<Invocation>>,
}

impl SimulatedEditor {
    pub fn new(state: DocumentState) -> Self {
        Self {
            selections: Mutex::new(state.selections),
            context: state.context,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_selections(selections: Vec<Selection>) -> Self {
        Self::new(DocumentState {
            selections,
            ..DocumentState::default()
        })
    }

    /// Mark a context key as active for scope checks.
    pub fn activate(mut self, key: impl Into<String>) -> Self {
        self.context.insert(key.into());
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().clone()
    }

    pub fn state(&self) -> DocumentState {
        DocumentState {
            selections: self.selections.lock().clone(),
            context: self.context.clone(),
        }
    }

    fn scope_matches(&self, scope: &Value) -> bool {
        match scope {
            Value::String(key) => match key.strip_prefix('!') {
                Some(negated) => !self.context.contains(negated),
                None => self.context.contains(key),
            },
            Value::Array(items) => items.iter().all(|item| self.scope_matches(item)),
            _ => false,
        }
    }

    fn move_cursors(&self, motion: Motion, args: Option<&Value>) -> anyhow::Result<()> {
        let count = repeat_count(args)?;
        for selection in self.selections.lock().iter_mut() {
            let Position { line, character } = selection.active;
            let active = match motion {
                Motion::Up => Position::new(line.saturating_sub(count), character),
                Motion::Down => Position::new(line.saturating_add(count), character),
                Motion::Left => Position::new(line, character.saturating_sub(count)),
                Motion::Right => Position::new(line, character.saturating_add(count)),
                Motion::Home => Position::new(line, 0),
            };
            *selection = Selection::caret(active);
        }
        Ok(())
    }
}

fn repeat_count(args: Option<&Value>) -> anyhow::Result<u32> {
    match args {
        None | Some(Value::Null) => Ok(1),
        Some(value) => match value.as_u64() {
            Some(count) => Ok(u32::try_from(count).unwrap_or(u32::MAX)),
            None => bail!("expected a repeat count, got {value}"),
        },
    }
}

#[async_trait]
impl CommandExecutor for SimulatedEditor {
    async fn execute(&self, command: &str, args: Option<&Value>) -> Result<Value, EvalError> {
        self.invocations.lock().push(Invocation {
            command: command.to_owned(),
            args: args.cloned(),
        });

        let motion = match command {
            "cursorUp" => Motion::Up,
            "cursorDown" => Motion::Down,
            "cursorLeft" => Motion::Left,
            "cursorRight" => Motion::Right,
            "cursorHome" => Motion::Home,
            "editor.selections" => {
                let selections = self.selections.lock().clone();
                return Ok(serde_json::to_value(selections).map_err(anyhow::Error::from)?);
            }
            other => return Err(anyhow!("unknown editor command: {other}").into()),
        };

        self.move_cursors(motion, args)?;
        Ok(Value::Null)
    }
}

#[async_trait]
impl ScopeChecker for SimulatedEditor {
    async fn check(&self, scope: &Value) -> anyhow::Result<Option<bool>> {
        Ok(Some(self.scope_matches(scope)))
    }
}

impl SelectionAccess for SimulatedEditor {
    fn selections(&self) -> Vec<Selection> {
        self.selections.lock().clone()
    }

    fn set_selections(&self, selections: Vec<Selection>) {
        *self.selections.lock() = selections;
    }
}
