//! In-process commands contributed by command providers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::context::CommandExecutor;
use crate::domain::errors::EvalError;

/// A synchronous in-process command handler.
pub type Handler = Arc<dyn Fn(Option<&Value>) -> Result<Value> + Send + Sync>;

/// A named bundle of command handlers that can be switched on in configuration.
pub trait CommandProvider: Send + Sync {
    fn name(&self) -> &str;

    fn commands(&self) -> Vec<(String, Handler)>;
}

/// How leaves are dispatched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Dispatch {
    /// Registered commands first, then the host executor.
    #[default]
    Async,
    /// Registered commands only; anything else is a configuration error.
    Sync,
}

impl FromStr for Dispatch {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "async" => Ok(Dispatch::Async),
            "sync" => Ok(Dispatch::Sync),
            other => Err(anyhow!("unknown dispatch mode: {other}")),
        }
    }
}

/// Table of in-process commands keyed by identifier.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    handlers: BTreeMap<String, Handler>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the commands of every enabled extension.
    ///
    /// Extensions are visited in map order and later ones replace earlier handlers with the same
    /// identifier. An enabled extension with no matching provider is an error.
    pub fn from_config(
        extensions: &BTreeMap<String, bool>,
        providers: &[Box<dyn CommandProvider>],
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (name, enabled) in extensions {
            if !*enabled {
                continue;
            }
            let Some(provider) = providers
                .iter()
                .find(|provider| provider.name() == name.as_str())
            else {
                bail!("Commands extension declared but not found: {name}");
            };
            registry.extend_from(provider.as_ref());
        }
        tracing::debug!(commands = registry.len(), "command registry loaded");
        Ok(registry)
    }

    pub fn register<F>(&mut self, command: impl Into<String>, handler: F)
    where
        F: Fn(Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.handlers.insert(command.into(), Arc::new(handler));
    }

    pub fn extend_from(&mut self, provider: &dyn CommandProvider) {
        for (command, handler) in provider.commands() {
            if self.handlers.insert(command.clone(), handler).is_some() {
                tracing::debug!(%command, provider = provider.name(), "command handler replaced");
            }
        }
    }

    pub fn contains(&self, command: &str) -> bool {
        self.handlers.contains_key(command)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Run a registered command, or `None` when nothing is registered under `command`.
    pub fn invoke(&self, command: &str, args: Option<&Value>) -> Option<Result<Value>> {
        self.handlers.get(command).map(|handler| handler(args))
    }

    /// An executor dispatching through this registry. In [`Dispatch::Async`] mode unknown
    /// commands fall through to `host`.
    pub fn executor<'a>(
        &'a self,
        dispatch: Dispatch,
        host: &'a dyn CommandExecutor,
    ) -> RegistryExecutor<'a> {
        RegistryExecutor {
            registry: self,
            fallback: match dispatch {
                Dispatch::Async => Some(host),
                Dispatch::Sync => None,
            },
        }
    }
}

pub struct RegistryExecutor<'a> {
    registry: &'a CommandRegistry,
    fallback: Option<&'a dyn CommandExecutor>,
}

#[async_trait]
impl<'a> CommandExecutor for RegistryExecutor<'a> {
    async fn execute(&self, command: &str, args: Option<&Value>) -> Result<Value, EvalError> {
        if let Some(result) = self.registry.invoke(command, args) {
            return result.map_err(EvalError::Executor);
        }
        match self.fallback {
            Some(host) => host.execute(command, args).await,
            None => Err(EvalError::CommandNotFound {
                command: command.to_owned(),
            }),
        }
    }
}

/// A provider assembled from closures; handy for embedding hosts and tests.
pub struct FnProvider {
    name: String,
    commands: Vec<(String, Handler)>,
}

impl FnProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            commands: Vec::new(),
        }
    }

    pub fn with_command<F>(mut self, command: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Option<&Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.commands.push((command.into(), Arc::new(handler)));
        self
    }
}

impl CommandProvider for FnProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn commands(&self) -> Vec<(String, Handler)> {
        self.commands.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandExecutor for RecordingHost {
        async fn execute(&self, command: &str, _args: Option<&Value>) -> Result<Value, EvalError> {
            self.calls.lock().push(command.to_owned());
            Ok(json!("host"))
        }
    }

    fn providers() -> Vec<Box<dyn CommandProvider>> {
        let alpha: Box<dyn CommandProvider> =
            Box::new(FnProvider::new("alpha").with_command("shared", |_| Ok(json!("alpha"))));
        let beta: Box<dyn CommandProvider> = Box::new(
            FnProvider::new("beta")
                .with_command("shared", |_| Ok(json!("beta")))
                .with_command("echo", |args| Ok(args.cloned().unwrap_or(Value::Null))),
        );
        vec![alpha, beta]
    }

    fn extensions(entries: &[(&str, bool)]) -> BTreeMap<String, bool> {
        entries
            .iter()
            .map(|(name, enabled)| ((*name).to_owned(), *enabled))
            .collect()
    }

    #[test]
    fn later_extensions_override_earlier_ones() {
        let extensions = extensions(&[("alpha", true), ("beta", true)]);
        let registry = CommandRegistry::from_config(&extensions, &providers()).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("echo"));
        assert!(!registry.contains("missing"));
        assert_eq!(registry.invoke("shared", None).unwrap().unwrap(), json!("beta"));
        assert_eq!(
            registry.invoke("echo", Some(&json!([1, 2]))).unwrap().unwrap(),
            json!([1, 2])
        );
        assert!(registry.invoke("missing", None).is_none());
    }

    #[test]
    fn disabled_extensions_are_skipped() {
        let registry = CommandRegistry::from_config(
            &extensions(&[("alpha", true), ("beta", false), ("ghost", false)]),
            &providers(),
        )
        .unwrap();

        assert!(!registry.is_empty());
        assert_eq!(registry.commands().collect::<Vec<_>>(), vec!["shared"]);
        assert_eq!(registry.invoke("shared", None).unwrap().unwrap(), json!("alpha"));
    }

    #[test]
    fn unknown_enabled_extension_is_an_error() {
        let err = CommandRegistry::from_config(&extensions(&[("ghost", true)]), &providers())
            .unwrap_err();
        assert_eq!(err.to_string(), "Commands extension declared but not found: ghost");
    }

    #[test]
    fn parses_dispatch_modes() {
        assert_eq!("SYNC".parse::<Dispatch>().unwrap(), Dispatch::Sync);
        assert_eq!(" async ".parse::<Dispatch>().unwrap(), Dispatch::Async);
        assert!("eventually".parse::<Dispatch>().is_err());
    }

    #[tokio::test]
    async fn async_dispatch_prefers_registered_commands() {
        let host = RecordingHost::default();
        let mut registry = CommandRegistry::new();
        registry.register("local", |_| Ok(json!("local")));
        let executor = registry.executor(Dispatch::Async, &host);

        assert_eq!(executor.execute("local", None).await.unwrap(), json!("local"));
        assert_eq!(executor.execute("remote", None).await.unwrap(), json!("host"));
        assert_eq!(*host.calls.lock(), vec!["remote".to_owned()]);
    }

    #[tokio::test]
    async fn sync_dispatch_rejects_unregistered_commands() {
        let host = RecordingHost::default();
        let registry = CommandRegistry::new();
        let executor = registry.executor(Dispatch::Sync, &host);

        let err = executor.execute("cursorDown", None).await.unwrap_err();

        assert!(matches!(
            &err,
            EvalError::CommandNotFound { command } if command == "cursorDown"
        ));
        assert_eq!(
            err.to_string(),
            "Command not found: cursorDown (probably, you want to run command in async mode?)"
        );
        assert!(host.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn handler_errors_surface_as_executor_failures() {
        let host = RecordingHost::default();
        let mut registry = CommandRegistry::new();
        registry.register("broken", |_| Err(anyhow!("handler failed")));
        let executor = registry.executor(Dispatch::Sync, &host);

        let err = executor.execute("broken", None).await.unwrap_err();
        assert!(matches!(err, EvalError::Executor(_)));
        assert_eq!(err.to_string(), "handler failed");
    }
}
