//! Organization repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use kompass_core::{
    defaults, CreateOrganizationRequest, Error, Organization, OrganizationRepository,
    OrganizationRole, PageStatus, PageType, Result, Theme,
};

use crate::parse_enum;

/// PostgreSQL implementation of OrganizationRepository.
pub struct PgOrganizationRepository {
    pool: Pool<Postgres>,
}

impl PgOrganizationRepository {
    /// Create a new PgOrganizationRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrganizationRepository for PgOrganizationRepository {
    async fn create(&self, req: CreateOrganizationRequest) -> Result<i64> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("organization name is empty".into()));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let organization_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO organizations (name, image, city, population, address, invoice_address, plan)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&req.name)
        .bind(&req.image)
        .bind(&req.city)
        .bind(req.population)
        .bind(&req.address)
        .bind(&req.invoice_address)
        .bind(req.plan.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO organizations_users (organization_id, user_id, role) VALUES ($1, $2, $3)",
        )
        .bind(organization_id)
        .bind(req.owner_user_id)
        .bind(OrganizationRole::Owner.as_str())
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        for theme in Theme::ALL {
            sqlx::query(
                r#"
                INSERT INTO pages (organization_id, parent_id, language_tag, page_type, theme, status, title, sort)
                VALUES ($1, NULL, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(organization_id)
            .bind(defaults::LANGUAGE_TAG)
            .bind(PageType::Section.as_str())
            .bind(theme.as_str())
            .bind(PageStatus::Visible.as_str())
            .bind(theme.root_title())
            .bind(theme.root_sort())
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "organizations",
            op = "create",
            organization_id,
            plan = %req.plan,
            "Created organization with theme roots"
        );
        Ok(organization_id)
    }

    async fn get(&self, id: i64) -> Result<Option<Organization>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, image, city, population, address, invoice_address, plan, status,
                   created_at, updated_at
            FROM organizations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some(Organization {
            id: r.get("id"),
            name: r.get("name"),
            image: r.get("image"),
            city: r.get("city"),
            population: r.get("population"),
            address: r.get("address"),
            invoice_address: r.get("invoice_address"),
            plan: parse_enum(r.get("plan"))?,
            status: parse_enum(r.get("status"))?,
            created_at: r.get("created_at"),
            updated_at: r.get("updated_at"),
        }))
    }
}
