use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Owner;
use crate::repository::traits::OwnerStore;
use crate::Result;

#[derive(Clone)]
pub struct PostgresOwnerRepository {
    pool: PgPool,
}

impl PostgresOwnerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OwnerStore for PostgresOwnerRepository {
    async fn insert(&self, owner: &Owner) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO owners (id, email, notify_on_completion, notify_on_failure, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(owner.id)
        .bind(&owner.email)
        .bind(owner.notify_on_completion)
        .bind(owner.notify_on_failure)
        .bind(owner.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Owner>> {
        let owner = sqlx::query_as::<_, Owner>("SELECT * FROM owners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(owner)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        // Jobs (and through them executions and logs) cascade
        let result = sqlx::query("DELETE FROM owners WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
