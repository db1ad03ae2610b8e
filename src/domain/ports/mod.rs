//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces that storage adapters implement:
//! - TaskRepository: tasks and their prerequisite edges
//! - RequirementRepository: requirements that tasks fulfill

pub mod requirement_repository;
pub mod task_repository;

pub use requirement_repository::RequirementRepository;
pub use task_repository::{TaskFilter, TaskRepository};
