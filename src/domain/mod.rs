//! Domain layer for the taskcascade engine
//!
//! This module contains the task model, its prerequisite rules and the
//! storage ports the engine depends on.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
