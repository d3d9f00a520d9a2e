//! Core traits for kompass abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// CONTENT STORE (consumed by the cloning engine)
// =============================================================================

/// Selects which template pages are default content for a clone run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateFilter {
    pub plan: Plan,
    pub theme: Theme,
}

impl TemplateFilter {
    pub fn new(plan: Plan, theme: Theme) -> Self {
        Self { plan, theme }
    }

    /// Whether a page passes the filter given the plans it belongs to.
    pub fn admits(&self, page: &Page, plans: &[Plan]) -> bool {
        page.status == PageStatus::Visible && page.theme == self.theme && plans.contains(&self.plan)
    }
}

/// New text for the linkable fields of one block.
///
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockTextUpdate {
    pub block_id: i64,
    pub content: Option<String>,
    pub readmore: Option<String>,
}

impl BlockTextUpdate {
    /// True when neither field changes.
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.readmore.is_none()
    }
}

/// Storage operations the cloning engine relies on.
///
/// Implementations must be usable from several tasks at once.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Template roots: no organization, no parent. One per theme.
    async fn get_root_template_pages(&self) -> Result<Vec<Page>>;

    /// The organization's root page for `theme`.
    ///
    /// Fails with `Error::RootPageNotFound` when missing.
    async fn get_organization_root_page(&self, organization_id: i64, theme: Theme) -> Result<Page>;

    /// Visible template children of `parent_id` that belong to the filter's
    /// plan and theme, in sort order.
    async fn get_template_children(
        &self,
        parent_id: i64,
        filter: &TemplateFilter,
    ) -> Result<Vec<Page>>;

    /// Insert copies of `pages` under `parent_id` in one transaction.
    ///
    /// Returns the new ids in input order.
    async fn insert_pages(
        &self,
        parent_id: i64,
        organization_id: i64,
        pages: &[Page],
    ) -> Result<Vec<i64>>;

    /// Blocks of a page in sort order.
    async fn get_blocks_by_page(&self, page_id: i64) -> Result<Vec<Block>>;

    /// Insert copies of `blocks` into `page_id` in one transaction.
    ///
    /// Returns the new ids in input order.
    async fn insert_blocks(&self, page_id: i64, blocks: &[Block]) -> Result<Vec<i64>>;

    /// Attachment of a `file` page. Fails with `Error::FileNotFound` when missing.
    async fn get_file_attachment(&self, page_id: i64) -> Result<FileAttachment>;

    /// Create (or replace) the attachment of `page_id`.
    async fn create_file_attachment(&self, page_id: i64, path: &str) -> Result<()>;

    /// A window of the blocks in `ids`, ordered by id.
    async fn get_blocks_by_ids(&self, ids: &[i64], limit: i64, offset: i64) -> Result<Vec<Block>>;

    /// Apply text updates, one statement per block, in one transaction.
    async fn update_block_texts(&self, updates: &[BlockTextUpdate]) -> Result<()>;

    /// Apply a single text update.
    async fn update_block_text(&self, update: BlockTextUpdate) -> Result<()> {
        self.update_block_texts(std::slice::from_ref(&update)).await
    }

    /// Bump a page's `updated_at`.
    async fn touch_page(&self, page_id: i64) -> Result<()>;
}

// =============================================================================
// AUTHORING REPOSITORIES
// =============================================================================

/// Repository for pages and their default-plan membership.
#[async_trait]
pub trait PageRepository: Send + Sync {
    /// Create a page after its last sibling.
    async fn create(&self, req: CreatePageRequest) -> Result<i64>;

    /// Fetch a page by id.
    async fn get(&self, id: i64) -> Result<Option<Page>>;

    /// Children of a page in sort order.
    async fn list_children(&self, parent_id: i64) -> Result<Vec<Page>>;

    /// Root pages of an organization, or template roots when `None`.
    async fn list_roots(&self, organization_id: Option<i64>) -> Result<Vec<Page>>;

    /// Add a page to the default content of `plans`. Existing entries are kept.
    async fn set_default_plans(&self, page_id: i64, plans: &[Plan]) -> Result<()>;

    /// Remove a page from the default content of `plans`.
    async fn remove_default_plans(&self, page_id: i64, plans: &[Plan]) -> Result<()>;

    /// Plans whose default content includes the page.
    async fn default_plans(&self, page_id: i64) -> Result<Vec<Plan>>;

    /// Bump `updated_at`.
    async fn touch(&self, page_id: i64) -> Result<()>;
}

/// Repository for blocks.
#[async_trait]
pub trait BlockRepository: Send + Sync {
    /// Create a block after the page's last block.
    async fn create(&self, req: CreateBlockRequest) -> Result<i64>;

    /// Fetch a block by id.
    async fn get(&self, id: i64) -> Result<Option<Block>>;

    /// Blocks of a page in sort order.
    async fn list_for_page(&self, page_id: i64) -> Result<Vec<Block>>;
}

/// Repository for file attachments.
#[async_trait]
pub trait FileAttachmentRepository: Send + Sync {
    /// Create the attachment of a page, replacing the path if one exists.
    async fn upsert(&self, page_id: i64, path: &str) -> Result<()>;

    /// Attachment of a page.
    async fn get_for_page(&self, page_id: i64) -> Result<Option<FileAttachment>>;
}

/// Repository for organizations.
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Create an organization, its owner membership and one root page per
    /// theme, atomically.
    async fn create(&self, req: CreateOrganizationRequest) -> Result<i64>;

    /// Fetch an organization by id.
    async fn get(&self, id: i64) -> Result<Option<Organization>>;
}
