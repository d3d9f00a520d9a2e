//! Page repository implementation.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;

use kompass_core::{
    CreatePageRequest, Error, Page, PageRepository, PageStatus, Plan, Result, TemplateFilter,
    Theme,
};

use crate::parse_enum;

/// Column list shared by every page query.
pub(crate) const PAGE_COLUMNS: &str = "id, organization_id, parent_id, language_tag, page_type, \
     theme, status, title, image, image_hover, sort, created_at, updated_at";

/// Map a `pages` row onto the model.
pub(crate) fn page_from_row(row: &PgRow) -> Result<Page> {
    Ok(Page {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        parent_id: row.get("parent_id"),
        language_tag: row.get("language_tag"),
        page_type: parse_enum(row.get("page_type"))?,
        theme: parse_enum(row.get("theme"))?,
        status: parse_enum(row.get("status"))?,
        title: row.get("title"),
        image: row.get("image"),
        image_hover: row.get("image_hover"),
        sort: row.get("sort"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn plan_strings(plans: &[Plan]) -> Vec<String> {
    plans.iter().map(|p| p.as_str().to_string()).collect()
}

/// PostgreSQL implementation of PageRepository.
pub struct PgPageRepository {
    pool: Pool<Postgres>,
}

impl PgPageRepository {
    /// Create a new PgPageRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Template roots in theme order.
    pub async fn template_roots(&self) -> Result<Vec<Page>> {
        self.list_roots(None).await
    }

    /// The root page an organization holds for `theme`.
    pub async fn organization_root(&self, organization_id: i64, theme: Theme) -> Result<Page> {
        let row = sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages \
             WHERE organization_id = $1 AND parent_id IS NULL AND theme = $2 \
             ORDER BY sort, id LIMIT 1"
        ))
        .bind(organization_id)
        .bind(theme.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => page_from_row(&row),
            None => Err(Error::RootPageNotFound {
                organization_id,
                theme,
            }),
        }
    }

    /// Visible template children of `parent_id` in the filter's theme whose
    /// default content includes the filter's plan.
    pub async fn template_children(
        &self,
        parent_id: i64,
        filter: &TemplateFilter,
    ) -> Result<Vec<Page>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages \
             WHERE parent_id = $1 AND organization_id IS NULL \
               AND status = $2 AND theme = $3 \
               AND EXISTS (SELECT 1 FROM default_pages d WHERE d.id = pages.id AND d.plan = $4) \
             ORDER BY sort, id"
        ))
        .bind(parent_id)
        .bind(PageStatus::Visible.as_str())
        .bind(filter.theme.as_str())
        .bind(filter.plan.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(page_from_row).collect()
    }

    /// Insert copies of `pages` under `parent_id` in one transaction.
    ///
    /// Copies keep every attribute except id, organization, parent and
    /// timestamps. Ids are returned in input order.
    pub async fn insert_copies(
        &self,
        parent_id: i64,
        organization_id: i64,
        pages: &[Page],
    ) -> Result<Vec<i64>> {
        if pages.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let ids = self
            .insert_copies_tx(&mut tx, parent_id, organization_id, pages)
            .await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "pages",
            op = "insert_copies",
            parent_id,
            organization_id,
            page_count = ids.len(),
            "Inserted page copies"
        );
        Ok(ids)
    }

    /// Transaction-scoped variant of [`insert_copies`](Self::insert_copies).
    pub async fn insert_copies_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        parent_id: i64,
        organization_id: i64,
        pages: &[Page],
    ) -> Result<Vec<i64>> {
        let mut ids = Vec::with_capacity(pages.len());
        for page in pages {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO pages (organization_id, parent_id, language_tag, page_type, theme,
                                   status, title, image, image_hover, sort)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING id
                "#,
            )
            .bind(organization_id)
            .bind(parent_id)
            .bind(&page.language_tag)
            .bind(page.page_type.as_str())
            .bind(page.theme.as_str())
            .bind(page.status.as_str())
            .bind(&page.title)
            .bind(&page.image)
            .bind(&page.image_hover)
            .bind(page.sort)
            .fetch_one(&mut **tx)
            .await
            .map_err(Error::Database)?;
            ids.push(id);
        }
        Ok(ids)
    }
}

#[async_trait]
impl PageRepository for PgPageRepository {
    async fn create(&self, req: CreatePageRequest) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO pages (organization_id, parent_id, language_tag, page_type, theme,
                               status, title, image, image_hover, sort)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                    (SELECT COALESCE(MAX(sort), 0) + 1 FROM pages
                     WHERE parent_id IS NOT DISTINCT FROM $2
                       AND organization_id IS NOT DISTINCT FROM $1))
            RETURNING id
            "#,
        )
        .bind(req.organization_id)
        .bind(req.parent_id)
        .bind(&req.language_tag)
        .bind(req.page_type.as_str())
        .bind(req.theme.as_str())
        .bind(req.status.as_str())
        .bind(&req.title)
        .bind(&req.image)
        .bind(&req.image_hover)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Page>> {
        let row = sqlx::query(&format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        row.as_ref().map(page_from_row).transpose()
    }

    async fn list_children(&self, parent_id: i64) -> Result<Vec<Page>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages WHERE parent_id = $1 ORDER BY sort, id"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(page_from_row).collect()
    }

    async fn list_roots(&self, organization_id: Option<i64>) -> Result<Vec<Page>> {
        let rows = sqlx::query(&format!(
            "SELECT {PAGE_COLUMNS} FROM pages \
             WHERE parent_id IS NULL AND organization_id IS NOT DISTINCT FROM $1 \
             ORDER BY sort, id"
        ))
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(page_from_row).collect()
    }

    async fn set_default_plans(&self, page_id: i64, plans: &[Plan]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO default_pages (id, plan)
            SELECT $1, plan FROM UNNEST($2::text[]) AS plan
            ON CONFLICT (id, plan) DO NOTHING
            "#,
        )
        .bind(page_id)
        .bind(plan_strings(plans))
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }

    async fn remove_default_plans(&self, page_id: i64, plans: &[Plan]) -> Result<()> {
        sqlx::query("DELETE FROM default_pages WHERE id = $1 AND plan = ANY($2)")
            .bind(page_id)
            .bind(plan_strings(plans))
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(())
    }

    async fn default_plans(&self, page_id: i64) -> Result<Vec<Plan>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT plan FROM default_pages WHERE id = $1 ORDER BY plan")
                .bind(page_id)
                .fetch_all(&self.pool)
                .await
                .map_err(Error::Database)?;

        rows.iter().map(|p| parse_enum(p)).collect()
    }

    async fn touch(&self, page_id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE pages SET updated_at = NOW() WHERE id = $1")
            .bind(page_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }
}
