//! Block repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;

use kompass_core::{Block, BlockRepository, BlockTextUpdate, CreateBlockRequest, Error, Result};

use crate::parse_enum;

pub(crate) const BLOCK_COLUMNS: &str =
    "id, page_id, title, content, readmore, image, image_hover, block_type, sort";

pub(crate) fn block_from_row(row: &PgRow) -> Result<Block> {
    Ok(Block {
        id: row.get("id"),
        page_id: row.get("page_id"),
        title: row.get("title"),
        content: row.get("content"),
        readmore: row.get("readmore"),
        image: row.get("image"),
        image_hover: row.get("image_hover"),
        block_type: parse_enum(row.get("block_type"))?,
        sort: row.get("sort"),
    })
}

/// PostgreSQL implementation of BlockRepository.
pub struct PgBlockRepository {
    pool: Pool<Postgres>,
}

impl PgBlockRepository {
    /// Create a new PgBlockRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert copies of `blocks` into `page_id` in one transaction, keeping
    /// their sort order. Ids are returned in input order.
    pub async fn insert_copies(&self, page_id: i64, blocks: &[Block]) -> Result<Vec<i64>> {
        if blocks.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut ids = Vec::with_capacity(blocks.len());
        for block in blocks {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO blocks (page_id, title, content, readmore, image, image_hover, block_type, sort)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                RETURNING id
                "#,
            )
            .bind(page_id)
            .bind(&block.title)
            .bind(&block.content)
            .bind(&block.readmore)
            .bind(&block.image)
            .bind(&block.image_hover)
            .bind(block.block_type.as_str())
            .bind(block.sort)
            .fetch_one(&mut *tx)
            .await
            .map_err(Error::Database)?;
            ids.push(id);
        }
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "blocks",
            op = "insert_copies",
            page_id,
            block_count = ids.len(),
            "Inserted block copies"
        );
        Ok(ids)
    }

    /// A window of the blocks in `ids`, ordered by id.
    pub async fn window(&self, ids: &[i64], limit: i64, offset: i64) -> Result<Vec<Block>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = ANY($1) ORDER BY id LIMIT $2 OFFSET $3"
        ))
        .bind(ids)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(block_from_row).collect()
    }

    /// Apply text updates in one transaction.
    pub async fn update_texts(&self, updates: &[BlockTextUpdate]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        for update in updates.iter().filter(|u| !u.is_empty()) {
            Self::update_text_tx(&mut tx, update).await?;
        }
        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn update_text_tx(
        tx: &mut Transaction<'_, Postgres>,
        update: &BlockTextUpdate,
    ) -> Result<()> {
        let query = match (&update.content, &update.readmore) {
            (Some(content), Some(readmore)) => {
                sqlx::query("UPDATE blocks SET content = $2, readmore = $3 WHERE id = $1")
                    .bind(update.block_id)
                    .bind(content)
                    .bind(readmore)
            }
            (Some(content), None) => sqlx::query("UPDATE blocks SET content = $2 WHERE id = $1")
                .bind(update.block_id)
                .bind(content),
            (None, Some(readmore)) => {
                sqlx::query("UPDATE blocks SET readmore = $2 WHERE id = $1")
                    .bind(update.block_id)
                    .bind(readmore)
            }
            (None, None) => return Ok(()),
        };

        let result = query.execute(&mut **tx).await.map_err(Error::Database)?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("block {}", update.block_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl BlockRepository for PgBlockRepository {
    async fn create(&self, req: CreateBlockRequest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO blocks (page_id, title, content, readmore, image, image_hover, block_type, sort)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    (SELECT COALESCE(MAX(sort), 0) + 1 FROM blocks WHERE page_id = $1))
            RETURNING id
            "#,
        )
        .bind(req.page_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.readmore)
        .bind(&req.image)
        .bind(&req.image_hover)
        .bind(req.block_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Block>> {
        let row = sqlx::query(&format!("SELECT {BLOCK_COLUMNS} FROM blocks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(block_from_row).transpose()
    }

    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Block>> {
        let rows = sqlx::query(&format!(
            "SELECT {BLOCK_COLUMNS} FROM blocks WHERE page_id = $1 ORDER BY sort, id"
        ))
        .bind(page_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(block_from_row).collect()
    }
}
