//! Requirement domain model.
//!
//! A requirement is the piece of an order that one or more tasks fulfill.
//! Completing a task marks its requirement fulfilled.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: i64,
    pub order_id: Option<Uuid>,
    pub request: String,
    pub expected_outcome: String,
    pub fulfilled: bool,
}

impl Requirement {
    pub fn new(id: i64, request: impl Into<String>) -> Self {
        Self {
            id,
            order_id: None,
            request: request.into(),
            expected_outcome: String::new(),
            fulfilled: false,
        }
    }

    pub fn with_order(mut self, order_id: Uuid) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_expected_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.expected_outcome = outcome.into();
        self
    }

    /// Returns true if the requirement changed.
    pub fn mark_fulfilled(&mut self) -> bool {
        let changed = !self.fulfilled;
        self.fulfilled = true;
        changed
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id <= 0 {
            return Err("Requirement id must be positive".to_string());
        }
        if self.request.trim().is_empty() {
            return Err("Requirement request cannot be empty".to_string());
        }
        Ok(())
    }
}
