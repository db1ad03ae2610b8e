//! Task domain model.
//!
//! Tasks are units of work assigned to a user. A task may depend on other
//! tasks; it stays blocked until every prerequisite has resolved, at which
//! point it becomes `allowed` and can move through its review lifecycle.
//!
//! The prerequisite counter and the `allowed` flag are only ever moved by the
//! methods on [`Task`], which keeps
//! `num_of_prerequisite == |prerequisites \ satisfied_prerequisites|` and
//! `allowed == (num_of_prerequisite == 0)` true after every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Review status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Assigned, not yet submitted
    Pending,
    /// Submitted and waiting on a reviewer
    InReview,
    /// Accepted; resolves the task for its dependents
    Completed,
    /// Sent back by a reviewer
    Rejected,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InReview => "in_review",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_review" | "in-review" | "review" => Some(Self::InReview),
            "completed" | "complete" | "done" => Some(Self::Completed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Completed is the only resolved state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            // Pending -> Completed is the assigner forcing completion
            Self::Pending => vec![Self::InReview, Self::Completed],
            Self::InReview => vec![Self::Completed, Self::Rejected],
            Self::Rejected => vec![Self::InReview],
            Self::Completed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of applying one prerequisite's resolution to a dependent task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "remaining")]
pub enum PrerequisiteResolution {
    /// The counter reached zero and the task is now allowed.
    Unlocked,
    /// The counter was decremented but other prerequisites remain.
    StillBlocked(u32),
    /// This prerequisite had already been applied; nothing changed.
    AlreadySatisfied,
}

impl PrerequisiteResolution {
    /// Whether the task was mutated and needs to be written back.
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::AlreadySatisfied)
    }
}

/// A unit of work with optional prerequisites.
///
/// Tasks are built with [`Task::new`] or loaded by a store, never decoded
/// from outside input:
///
/// ```compile_fail
/// let _: taskcascade::domain::models::Task = serde_json::from_str("{}").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub requirement_id: i64,
    pub assigner_id: Option<Uuid>,
    pub assigned_user_id: Uuid,
    pub note: String,
    pub(crate) prerequisites: Vec<Uuid>,
    pub(crate) satisfied_prerequisites: Vec<Uuid>,
    pub(crate) num_of_prerequisite: u32,
    pub(crate) allowed: bool,
    pub status: TaskStatus,
    pub reviewers: Vec<Uuid>,
    pub deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Task {
    /// Create a task with a fresh durable identifier and no prerequisites.
    pub fn new(requirement_id: i64, assigned_user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            requirement_id,
            assigner_id: None,
            assigned_user_id,
            note: String::new(),
            prerequisites: Vec::new(),
            satisfied_prerequisites: Vec::new(),
            num_of_prerequisite: 0,
            allowed: true,
            status: TaskStatus::default(),
            reviewers: Vec::new(),
            deadline: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub fn with_assigner(mut self, assigner_id: Uuid) -> Self {
        self.assigner_id = Some(assigner_id);
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the prerequisite set of a task that has not yet been persisted.
    ///
    /// Duplicates collapse. The counter is set to the number of distinct
    /// prerequisites and `allowed` follows it.
    pub fn set_prerequisites(&mut self, ids: impl IntoIterator<Item = Uuid>) -> DomainResult<()> {
        if !self.satisfied_prerequisites.is_empty() {
            return Err(DomainError::invariant(
                self.id,
                "prerequisites cannot be replaced after any have been satisfied",
            ));
        }

        let mut unique: Vec<Uuid> = Vec::new();
        for id in ids {
            if id == self.id {
                return Err(DomainError::ValidationFailed(format!(
                    "Task {} cannot depend on itself",
                    self.id
                )));
            }
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        let count = u32::try_from(unique.len()).map_err(|_| {
            DomainError::ValidationFailed(format!("Task {} has too many prerequisites", self.id))
        })?;

        self.prerequisites = unique;
        self.num_of_prerequisite = count;
        self.allowed = count == 0;
        Ok(())
    }

    pub fn prerequisites(&self) -> &[Uuid] {
        &self.prerequisites
    }

    pub fn satisfied_prerequisites(&self) -> &[Uuid] {
        &self.satisfied_prerequisites
    }

    /// Prerequisites that have not yet resolved for this task.
    pub fn remaining_prerequisites(&self) -> Vec<Uuid> {
        self.prerequisites
            .iter()
            .filter(|id| !self.satisfied_prerequisites.contains(id))
            .copied()
            .collect()
    }

    pub fn num_of_prerequisite(&self) -> u32 {
        self.num_of_prerequisite
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }

    pub fn depends_on(&self, prerequisite_id: Uuid) -> bool {
        self.prerequisites.contains(&prerequisite_id)
    }

    pub fn num_of_reviewer(&self) -> usize {
        self.reviewers.len()
    }

    /// Decrement the prerequisite counter by one.
    ///
    /// Fails without mutating the task when the counter is already zero.
    pub fn reduce_prerequisite(&mut self) -> DomainResult<u32> {
        if self.num_of_prerequisite == 0 {
            return Err(DomainError::invariant(
                self.id,
                "prerequisite counter is already zero",
            ));
        }
        self.num_of_prerequisite -= 1;
        self.updated_at = Utc::now();
        Ok(self.num_of_prerequisite)
    }

    /// Mark the task eligible to execute. Requires a zero counter.
    pub fn allow(&mut self) -> DomainResult<()> {
        if self.num_of_prerequisite != 0 {
            return Err(DomainError::invariant(
                self.id,
                format!(
                    "cannot allow with {} prerequisite(s) outstanding",
                    self.num_of_prerequisite
                ),
            ));
        }
        if !self.allowed {
            self.allowed = true;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Apply the resolution of `prerequisite_id` to this task.
    ///
    /// Applying the same prerequisite twice is a no-op, so a cascade retried
    /// before its edge was cleared never decrements a dependent twice.
    pub fn resolve_prerequisite(
        &mut self,
        prerequisite_id: Uuid,
    ) -> DomainResult<PrerequisiteResolution> {
        if self.satisfied_prerequisites.contains(&prerequisite_id) {
            return Ok(PrerequisiteResolution::AlreadySatisfied);
        }
        if !self.prerequisites.contains(&prerequisite_id) {
            return Err(DomainError::invariant(
                self.id,
                format!("{prerequisite_id} is not a prerequisite of this task"),
            ));
        }

        let remaining = self.reduce_prerequisite()?;
        self.satisfied_prerequisites.push(prerequisite_id);

        if remaining == 0 {
            self.allow()?;
            Ok(PrerequisiteResolution::Unlocked)
        } else {
            Ok(PrerequisiteResolution::StillBlocked(remaining))
        }
    }

    /// Verify the counter and eligibility rules hold.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let outstanding = self.remaining_prerequisites().len();
        if u32::try_from(outstanding).ok() != Some(self.num_of_prerequisite) {
            return Err(DomainError::invariant(
                self.id,
                format!(
                    "counter is {} but {} prerequisite(s) are outstanding",
                    self.num_of_prerequisite, outstanding
                ),
            ));
        }
        if self.allowed != (self.num_of_prerequisite == 0) {
            return Err(DomainError::invariant(
                self.id,
                format!(
                    "allowed is {} with counter {}",
                    self.allowed, self.num_of_prerequisite
                ),
            ));
        }
        Ok(())
    }

    /// Check if can transition to given status.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Transition to a new review status.
    ///
    /// A blocked task cannot be submitted or completed.
    pub fn transition_to(&mut self, new_status: TaskStatus) -> DomainResult<()> {
        if !self.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
            });
        }
        if !self.allowed && matches!(new_status, TaskStatus::InReview | TaskStatus::Completed) {
            return Err(DomainError::ValidationFailed(format!(
                "Task {} is blocked by {} prerequisite(s)",
                self.id, self.num_of_prerequisite
            )));
        }

        self.status = new_status;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Check if task has resolved for its dependents.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Hand the task to another user.
    pub fn reassign(&mut self, user_id: Uuid) {
        if self.assigned_user_id != user_id {
            self.assigned_user_id = user_id;
            self.updated_at = Utc::now();
        }
    }

    /// Forward the task to a reviewer. Returns false if already forwarded.
    pub fn forward_to(&mut self, reviewer_id: Uuid) -> bool {
        if self.reviewers.contains(&reviewer_id) {
            return false;
        }
        self.reviewers.push(reviewer_id);
        self.updated_at = Utc::now();
        true
    }

    /// Withdraw a forwarded review. Returns false if it was never forwarded.
    pub fn withdraw_from(&mut self, reviewer_id: Uuid) -> bool {
        let before = self.reviewers.len();
        self.reviewers.retain(|r| *r != reviewer_id);
        if self.reviewers.len() == before {
            return false;
        }
        self.updated_at = Utc::now();
        true
    }

    /// Validate task.
    pub fn validate(&self) -> Result<(), String> {
        if self.requirement_id <= 0 {
            return Err("Task requirement id must be positive".to_string());
        }
        if self.prerequisites.contains(&self.id) {
            return Err("Task cannot depend on itself".to_string());
        }
        Ok(())
    }
}
