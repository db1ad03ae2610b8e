//! SQLite implementation of the RequirementRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::parse_optional_uuid;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::Requirement;
use crate::domain::ports::RequirementRepository;

#[derive(Clone)]
pub struct SqliteRequirementRepository {
    pool: SqlitePool,
}

impl SqliteRequirementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequirementRepository for SqliteRequirementRepository {
    async fn create(&self, requirement: &Requirement) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO requirements (id, order_id, request, expected_outcome, fulfilled) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(requirement.id)
        .bind(requirement.order_id.map(|id| id.to_string()))
        .bind(&requirement.request)
        .bind(&requirement.expected_outcome)
        .bind(requirement.fulfilled)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: i64) -> DomainResult<Option<Requirement>> {
        let row: Option<RequirementRow> = sqlx::query_as("SELECT * FROM requirements WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Requirement::try_from).transpose()
    }

    async fn update(&self, requirement: &Requirement) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE requirements SET order_id = ?, request = ?, expected_outcome = ?, fulfilled = ? WHERE id = ?",
        )
        .bind(requirement.order_id.map(|id| id.to_string()))
        .bind(&requirement.request)
        .bind(&requirement.expected_outcome)
        .bind(requirement.fulfilled)
        .bind(requirement.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::RequirementNotFound(requirement.id));
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RequirementRow {
    id: i64,
    order_id: Option<String>,
    request: String,
    expected_outcome: String,
    fulfilled: bool,
}

impl TryFrom<RequirementRow> for Requirement {
    type Error = DomainError;

    fn try_from(row: RequirementRow) -> Result<Self, Self::Error> {
        Ok(Requirement {
            id: row.id,
            order_id: parse_optional_uuid(row.order_id)?,
            request: row.request,
            expected_outcome: row.expected_outcome,
            fulfilled: row.fulfilled,
        })
    }
}
