pub mod batch;
pub mod cascade;
pub mod config;
pub mod requirement;
pub mod task;

pub use batch::{AcceptedTask, BatchReport, LabelMap, TaskFailure, TaskSpec};
pub use cascade::{CascadeReport, FanOutReport, Reassignment};
pub use config::{Config, DatabaseConfig, EngineConfig, LoggingConfig};
pub use requirement::Requirement;
pub use task::{PrerequisiteResolution, Task, TaskStatus};
