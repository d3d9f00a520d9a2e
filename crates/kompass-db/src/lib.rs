//! # kompass-db
//!
//! PostgreSQL database layer for the kompass content backend.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for pages, blocks, file attachments and
//!   organizations
//! - [`PgContentStore`], the storage the cloning engine runs against
//!
//! ## Example
//!
//! ```rust,ignore
//! use kompass_db::{Database, OrganizationRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/kompass").await?;
//!     let org = db.organizations.get(1).await?;
//!     println!("{:?}", org.map(|o| o.name));
//!     Ok(())
//! }
//! ```
pub mod blocks;
pub mod content_store;
pub mod files;
pub mod organizations;
pub mod pages;
pub mod pool;

// Always compiled so integration tests (in tests/) can reach it.
pub mod test_fixtures;

// Re-export core types
pub use kompass_core::*;

pub use blocks::PgBlockRepository;
pub use content_store::PgContentStore;
pub use files::PgFileAttachmentRepository;
pub use organizations::PgOrganizationRepository;
pub use pages::PgPageRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

/// Parse a text column into one of the core enums.
pub(crate) fn parse_enum<T>(raw: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse::<T>().map_err(Error::Internal)
}

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Page repository, including default-plan membership.
    pub pages: PgPageRepository,
    pub blocks: PgBlockRepository,
    pub files: PgFileAttachmentRepository,
    pub organizations: PgOrganizationRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            pages: PgPageRepository::new(pool.clone()),
            blocks: PgBlockRepository::new(pool.clone()),
            files: PgFileAttachmentRepository::new(pool.clone()),
            organizations: PgOrganizationRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Content store sharing this database's pool.
    pub fn content_store(&self) -> PgContentStore {
        PgContentStore::new(self.pool.clone())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
