//! Cascade and reassignment reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::batch::TaskFailure;

/// Outcome of propagating one prerequisite's resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub prerequisite_id: Uuid,
    /// Dependents whose counter reached zero.
    pub unlocked: Vec<Uuid>,
    pub still_blocked: Vec<Uuid>,
    /// Dependents already updated by an earlier attempt of this cascade.
    pub already_satisfied: Vec<Uuid>,
    pub edges_cleared: u64,
}

impl CascadeReport {
    pub fn new(prerequisite_id: Uuid) -> Self {
        Self {
            prerequisite_id,
            ..Default::default()
        }
    }

    pub fn affected(&self) -> usize {
        self.unlocked.len() + self.still_blocked.len() + self.already_satisfied.len()
    }

    pub fn is_noop(&self) -> bool {
        self.affected() == 0
    }
}

/// Assign a task to a different user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub task_id: Uuid,
    pub user_id: Uuid,
}

/// Per-unit results of a fan-out that has no invariant to maintain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FanOutReport {
    pub succeeded: Vec<Uuid>,
    pub failures: Vec<TaskFailure>,
}

impl FanOutReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}
