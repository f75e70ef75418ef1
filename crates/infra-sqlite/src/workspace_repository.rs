// SQLite WorkspaceRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use hookline_core::domain::Workspace;
use hookline_core::error::Result;
use hookline_core::port::WorkspaceRepository;
use sqlx::SqlitePool;

pub struct SqliteWorkspaceRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Workspaces are provisioned outside the delivery subsystem; this is
    /// for seeding and tests.
    pub async fn insert(&self, workspace: &Workspace) -> Result<()> {
        sqlx::query("INSERT INTO workspaces (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&workspace.id)
            .bind(&workspace.name)
            .bind(workspace.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    name: String,
    created_at: i64,
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn list_all(&self) -> Result<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> =
            sqlx::query_as("SELECT id, name, created_at FROM workspaces ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|r| Workspace::new(r.id, r.name, r.created_at))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};

    #[tokio::test]
    async fn test_list_all_in_creation_order() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteWorkspaceRepository::new(pool);

        repo.insert(&Workspace::new("ws-b", "Beta", 2)).await.unwrap();
        repo.insert(&Workspace::new("ws-a", "Alpha", 1)).await.unwrap();

        let ids: Vec<_> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(ids, vec!["ws-a", "ws-b"]);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_database_error() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let repo = SqliteWorkspaceRepository::new(pool);

        repo.insert(&Workspace::new("ws-a", "Alpha", 1)).await.unwrap();
        let err = repo
            .insert(&Workspace::new("ws-a", "Again", 2))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Unique constraint"));
    }
}
