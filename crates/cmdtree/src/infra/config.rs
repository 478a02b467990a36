//! Configuration management utilities.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::config_dir;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::app::evaluator::EvaluatorOptions;
use crate::app::registry::Dispatch;

static DEFAULT_CONFIG: Lazy<&'static str> =
    Lazy::new(|| include_str!("../../assets/default-config.toml"));
static DEFAULT_WORKSPACE_CONFIG_PATH: &str = ".cmdtree/config.toml";

/// Layered configuration loaded from defaults, user, workspace, and env.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub evaluator: Evaluator,
    /// Command providers to load, keyed by provider name.
    #[serde(default)]
    pub extensions: BTreeMap<String, bool>,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    dispatch: Option<Dispatch>,
}

impl Defaults {
    pub fn dispatch(&self) -> Dispatch {
        self.dispatch.unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluator {
    #[serde(default)]
    concurrent_siblings: Option<bool>,
}

impl Evaluator {
    pub fn concurrent_siblings(&self) -> bool {
        self.concurrent_siblings.unwrap_or(false)
    }

    pub fn options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            concurrent_siblings: self.concurrent_siblings(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logging {
    #[serde(default)]
    filter: Option<String>,
}

impl Logging {
    fn default_filter() -> &'static str {
        "warn"
    }

    pub fn filter(&self) -> String {
        self.filter
            .clone()
            .unwrap_or_else(|| Self::default_filter().to_owned())
    }
}

/// Environment overrides for critical settings.
#[derive(Debug, Default, Clone)]
pub struct EnvOverrides {
    dispatch: Option<String>,
    log_filter: Option<String>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self {
            dispatch: env::var("CMDTREE_DISPATCH").ok(),
            log_filter: env::var("CMDTREE_LOG").ok(),
        }
    }

    #[cfg(test)]
    fn for_tests(dispatch: &str, log_filter: &str) -> Self {
        Self {
            dispatch: Some(dispatch.to_owned()),
            log_filter: Some(log_filter.to_owned()),
        }
    }
}

impl Config {
    /// Load configuration from defaults, user/global config, workspace config, and env overrides.
    pub fn load() -> Result<Self> {
        let env = EnvOverrides::from_env();
        let global = global_config_path();
        let workspace = workspace_config_path()?;
        Self::load_with_layers(global, workspace, env)
    }

    /// Load defaults plus a single explicit file, skipping the global and workspace layers.
    pub fn load_from(path: &Path) -> Result<Self> {
        let base = Self::from_str(&DEFAULT_CONFIG)?;
        let overlay = Self::from_file(path)?;
        apply_env_overrides(base.merge(overlay), EnvOverrides::from_env())
    }

    fn load_with_layers(
        global: Option<PathBuf>,
        workspace: Option<PathBuf>,
        env_overrides: EnvOverrides,
    ) -> Result<Self> {
        let mut layers: Vec<Config> = Vec::new();

        layers.push(Self::from_str(&DEFAULT_CONFIG)?);

        if let Some(global_path) = global.filter(|path| path.exists()) {
            layers.push(Self::from_file(&global_path)?);
        }

        if let Some(workspace_path) = workspace.filter(|path| path.exists()) {
            layers.push(Self::from_file(&workspace_path)?);
        }

        let merged = layers.into_iter().reduce(Config::merge).unwrap_or_default();
        apply_env_overrides(merged, env_overrides)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_str(&data)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    fn from_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).with_context(|| "failed to parse TOML config".to_string())?;
        Ok(config)
    }

    fn merge(self, other: Self) -> Self {
        Self {
            defaults: merge_defaults(self.defaults, other.defaults),
            evaluator: merge_evaluator(self.evaluator, other.evaluator),
            extensions: merge_extensions(self.extensions, other.extensions),
            logging: merge_logging(self.logging, other.logging),
        }
    }
}

fn merge_defaults(mut base: Defaults, overlay: Defaults) -> Defaults {
    if let Some(value) = overlay.dispatch {
        base.dispatch = Some(value);
    }
    base
}

fn merge_evaluator(mut base: Evaluator, overlay: Evaluator) -> Evaluator {
    if let Some(value) = overlay.concurrent_siblings {
        base.concurrent_siblings = Some(value);
    }
    base
}

fn merge_extensions(
    mut base: BTreeMap<String, bool>,
    overlay: BTreeMap<String, bool>,
) -> BTreeMap<String, bool> {
    base.extend(overlay);
    base
}

fn merge_logging(mut base: Logging, overlay: Logging) -> Logging {
    if let Some(value) = overlay.filter {
        base.filter = Some(value);
    }
    base
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join("cmdtree/config.toml"))
}

fn workspace_config_path() -> Result<Option<PathBuf>> {
    let cwd = env::current_dir()?;
    let root = find_repo_root(&cwd).unwrap_or(cwd);
    Ok(Some(root.join(DEFAULT_WORKSPACE_CONFIG_PATH)))
}

fn find_repo_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    loop {
        if current.join(".git").exists() {
            return Some(current.to_path_buf());
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}

fn apply_env_overrides(mut config: Config, env: EnvOverrides) -> Result<Config> {
    if let Some(dispatch) = env.dispatch {
        config.defaults.dispatch = Some(
            dispatch
                .parse()
                .context("invalid CMDTREE_DISPATCH override")?,
        );
    }
    if let Some(filter) = env.log_filter {
        config.logging.filter = Some(filter);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_uses_defaults_when_no_files() {
        let config = Config::load_with_layers(None, None, EnvOverrides::default())
            .expect("load default config");
        assert_eq!(config.defaults.dispatch(), Dispatch::Async);
        assert!(!config.evaluator.concurrent_siblings());
        assert_eq!(config.extensions.get("cmdtree.text"), Some(&true));
        assert_eq!(config.logging.filter(), "warn");
    }

    #[test]
    fn merge_global_and_workspace() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("config.toml");
        fs::write(
            &global,
            r#"
[defaults]
dispatch = "sync"
[extensions]
"vim.motions" = true
"#,
        )?;

        let workspace_dir = temp.path().join("repo");
        fs::create_dir_all(workspace_dir.join(".cmdtree"))?;
        fs::create_dir_all(workspace_dir.join(".git"))?;
        fs::write(
            workspace_dir.join(".cmdtree/config.toml"),
            r#"
[evaluator]
concurrent_siblings = true
[extensions]
"cmdtree.text" = false
"#,
        )?;

        let global_path = Some(global);
        let workspace_path = Some(workspace_dir.join(".cmdtree/config.toml"));

        let config =
            Config::load_with_layers(global_path, workspace_path, EnvOverrides::default())?;

        assert_eq!(config.defaults.dispatch(), Dispatch::Sync);
        assert!(config.evaluator.concurrent_siblings());
        assert_eq!(config.extensions.get("vim.motions"), Some(&true));
        assert_eq!(config.extensions.get("cmdtree.text"), Some(&false));
        assert_eq!(find_repo_root(&workspace_dir.join(".cmdtree")), Some(workspace_dir.clone()));

        Ok(())
    }

    #[test]
    fn workspace_restores_async_dispatch_over_global_sync() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let global = temp.path().join("global.toml");
        fs::write(&global, "[defaults]\ndispatch = \"sync\"\n")?;
        let workspace = temp.path().join("workspace.toml");
        fs::write(&workspace, "[defaults]\ndispatch = \"async\"\n")?;

        let config =
            Config::load_with_layers(Some(global), Some(workspace), EnvOverrides::default())?;

        assert_eq!(config.defaults.dispatch(), Dispatch::Async);
        Ok(())
    }

    #[test]
    fn env_overrides_take_precedence() -> Result<()> {
        let overrides = EnvOverrides::for_tests("sync", "cmdtree=trace");
        let config = Config::load_with_layers(None, None, overrides)?;
        assert_eq!(config.defaults.dispatch(), Dispatch::Sync);
        assert_eq!(config.logging.filter(), "cmdtree=trace");
        Ok(())
    }

    #[test]
    fn invalid_dispatch_override_is_rejected() {
        let overrides = EnvOverrides::for_tests("sometimes", "warn");
        assert!(Config::load_with_layers(None, None, overrides).is_err());
    }

    #[test]
    fn invalid_config_returns_error() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let file = temp.path().join("broken.toml");
        fs::write(&file, "this is not toml")?;
        let result = Config::from_file(&file);
        assert!(result.is_err());
        Ok(())
    }
}
