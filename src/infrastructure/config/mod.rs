//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment: serialized defaults, project
//! YAML files, then `TASKCASCADE_*` environment overrides.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR};
