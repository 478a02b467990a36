//! Infrastructure adapters for config, logging, files, and the simulated editor host.

pub mod config;
pub mod editor;
pub mod loader;
pub mod logging;
pub mod providers;
