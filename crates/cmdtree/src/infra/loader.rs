//! Reading command trees and editor documents from disk.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::domain::model::CommandNode;
use crate::infra::editor::DocumentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Guess the format from a file extension, defaulting to JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Format::Yaml
            }
            _ => Format::Json,
        }
    }
}

pub fn load_tree(path: &Path) -> Result<CommandNode> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read command tree: {}", path.display()))?;
    parse_tree(&data, Format::from_path(path))
        .with_context(|| format!("invalid command tree in {}", path.display()))
}

pub fn parse_tree(contents: &str, format: Format) -> Result<CommandNode> {
    let value: Value = match format {
        Format::Json => serde_json::from_str(contents).context("failed to parse JSON")?,
        Format::Yaml => serde_yaml::from_str(contents).context("failed to parse YAML")?,
    };
    Ok(CommandNode::from_value(&value)?)
}

pub fn load_document(path: &Path) -> Result<DocumentState> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read document: {}", path.display()))?;
    let state = match Format::from_path(path) {
        Format::Json => serde_json::from_str(&data)
            .with_context(|| format!("invalid document in {}", path.display()))?,
        Format::Yaml => serde_yaml::from_str(&data)
            .with_context(|| format!("invalid document in {}", path.display()))?,
    };
    Ok(state)
}
