//! Command providers shipped with the binary.

use std::sync::Arc;

use anyhow::bail;
use serde_json::Value;

use crate::app::registry::{CommandProvider, Handler};

pub const TEXT_PROVIDER: &str = "cmdtree.text";

/// Every provider the CLI can enable through `[extensions]`.
pub fn builtin_providers() -> Vec<Box<dyn CommandProvider>> {
    vec![Box::new(TextProvider)]
}

/// Small string utilities: `text.echo` and `text.upper`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextProvider;

impl CommandProvider for TextProvider {
    fn name(&self) -> &str {
        TEXT_PROVIDER
    }

    fn commands(&self) -> Vec<(String, Handler)> {
        let echo: Handler = Arc::new(|args| Ok(args.cloned().unwrap_or(Value::Null)));
        let upper: Handler = Arc::new(|args| match args {
            Some(Value::String(text)) => Ok(Value::String(text.to_uppercase())),
            other => bail!("text.upper expects a string argument, got {other:?}"),
        });
        vec![("text.echo".into(), echo), ("text.upper".into(), upper)]
    }
}
