//! Service layer: the dependency engine and the task lifecycle built on it.

pub mod batch_orchestrator;
pub mod cascade_propagator;
pub mod dependency_resolver;
pub mod fan_out;
pub mod reassignment;
pub mod task_locks;
pub mod task_service;

pub use batch_orchestrator::BatchOrchestrator;
pub use cascade_propagator::CascadePropagator;
pub use dependency_resolver::{DependencyResolver, ResolvedPrerequisites};
pub use fan_out::{FanOut, FanOutResult};
pub use reassignment::ReassignmentService;
pub use task_locks::{TaskLockGuard, TaskLocks};
pub use task_service::{NewTask, TaskService};
