//! PostgreSQL-backed [`ContentStore`] used by the cloning engine.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use kompass_core::{
    Block, BlockRepository, BlockTextUpdate, ContentStore, Error, FileAttachment,
    FileAttachmentRepository, Page, PageRepository, Result, TemplateFilter, Theme,
};

use crate::blocks::PgBlockRepository;
use crate::files::PgFileAttachmentRepository;
use crate::pages::PgPageRepository;

/// Content store over the page, block and file repositories.
pub struct PgContentStore {
    pages: PgPageRepository,
    blocks: PgBlockRepository,
    files: PgFileAttachmentRepository,
}

impl PgContentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pages: PgPageRepository::new(pool.clone()),
            blocks: PgBlockRepository::new(pool.clone()),
            files: PgFileAttachmentRepository::new(pool),
        }
    }
}

#[async_trait]
impl ContentStore for PgContentStore {
    async fn get_root_template_pages(&self) -> Result<Vec<Page>> {
        self.pages.template_roots().await
    }

    async fn get_organization_root_page(&self, organization_id: i64, theme: Theme) -> Result<Page> {
        self.pages.organization_root(organization_id, theme).await
    }

    async fn get_template_children(
        &self,
        parent_id: i64,
        filter: &TemplateFilter,
    ) -> Result<Vec<Page>> {
        self.pages.template_children(parent_id, filter).await
    }

    async fn insert_pages(
        &self,
        parent_id: i64,
        organization_id: i64,
        pages: &[Page],
    ) -> Result<Vec<i64>> {
        self.pages
            .insert_copies(parent_id, organization_id, pages)
            .await
    }

    async fn get_blocks_by_page(&self, page_id: i64) -> Result<Vec<Block>> {
        self.blocks.list_for_page(page_id).await
    }

    async fn insert_blocks(&self, page_id: i64, blocks: &[Block]) -> Result<Vec<i64>> {
        self.blocks.insert_copies(page_id, blocks).await
    }

    async fn get_file_attachment(&self, page_id: i64) -> Result<FileAttachment> {
        self.files
            .get_for_page(page_id)
            .await?
            .ok_or(Error::FileNotFound(page_id))
    }

    async fn create_file_attachment(&self, page_id: i64, path: &str) -> Result<()> {
        self.files.upsert(page_id, path).await
    }

    async fn get_blocks_by_ids(&self, ids: &[i64], limit: i64, offset: i64) -> Result<Vec<Block>> {
        self.blocks.window(ids, limit, offset).await
    }

    async fn update_block_texts(&self, updates: &[BlockTextUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        self.blocks.update_texts(updates).await
    }

    async fn touch_page(&self, page_id: i64) -> Result<()> {
        self.pages.touch(page_id).await
    }
}
