use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Requirement;

/// Repository interface for the requirements tasks fulfill.
#[async_trait]
pub trait RequirementRepository: Send + Sync {
    async fn create(&self, requirement: &Requirement) -> DomainResult<()>;

    async fn get(&self, id: i64) -> DomainResult<Option<Requirement>>;

    async fn update(&self, requirement: &Requirement) -> DomainResult<()>;
}
