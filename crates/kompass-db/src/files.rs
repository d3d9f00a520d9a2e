//! File attachment repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use kompass_core::{Error, FileAttachment, FileAttachmentRepository, Result};

/// PostgreSQL implementation of FileAttachmentRepository.
///
/// The attachment row shares its id with the `file` page it belongs to.
pub struct PgFileAttachmentRepository {
    pool: Pool<Postgres>,
}

impl PgFileAttachmentRepository {
    /// Create a new PgFileAttachmentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileAttachmentRepository for PgFileAttachmentRepository {
    async fn upsert(&self, page_id: i64, path: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (id, path)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET path = EXCLUDED.path
            "#,
        )
        .bind(page_id)
        .bind(path)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn get_for_page(&self, page_id: i64) -> Result<Option<FileAttachment>> {
        let row = sqlx::query("SELECT id, path, created_at FROM files WHERE id = $1")
            .bind(page_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.map(|r| FileAttachment {
            id: r.get("id"),
            path: r.get("path"),
            created_at: r.get("created_at"),
        }))
    }
}
