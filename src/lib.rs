//! Taskcascade - Task Dependency and Unlocking Engine
//!
//! Tasks carry a count of unresolved prerequisites and become eligible to run
//! (`allowed`) once it reaches zero. Batches of interdependent tasks are
//! submitted by label; resolving a task cascades to its dependents.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): task state machine, reports, port traits
//! - **Service Layer** (`services`): batch orchestration, cascade propagation
//! - **Adapters** (`adapters`): SQLite and in-memory repositories
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use taskcascade::adapters::memory::{InMemoryRequirementRepository, InMemoryTaskRepository};
//! use taskcascade::domain::models::{EngineConfig, TaskSpec};
//! use taskcascade::services::TaskService;
//!
//! let service = TaskService::new(
//!     Arc::new(InMemoryTaskRepository::new()),
//!     Arc::new(InMemoryRequirementRepository::new()),
//!     &EngineConfig::default(),
//! );
//! let report = service
//!     .create_batch(vec![
//!         TaskSpec::new("design", 1, user),
//!         TaskSpec::new("build", 1, user).after("design"),
//!     ])
//!     .await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    BatchReport, CascadeReport, Config, EngineConfig, Requirement, Task, TaskSpec, TaskStatus,
};
pub use domain::ports::{RequirementRepository, TaskFilter, TaskRepository};
pub use services::{NewTask, TaskService};
