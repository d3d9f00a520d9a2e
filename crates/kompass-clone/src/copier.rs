//! Copies a template subtree into an organization's page tree.
//!
//! Siblings are inserted in one transaction and committed before any of them
//! is descended into. Traversal uses an explicit worklist, so depth is bounded
//! by memory rather than by the call stack.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, trace, warn};

use kompass_core::{ContentStore, Page, PageType, Result, TemplateFilter};

use crate::background::BackgroundTasks;
use crate::remap::RemapTables;

/// A page whose own content could not be copied. The page row itself exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFailure {
    /// Template page being copied.
    pub source_page_id: i64,
    /// What failed: `children`, `pages`, `blocks` or `file`.
    pub stage: &'static str,
    pub error: String,
}

/// Counters for one copied subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub pages: usize,
    pub blocks: usize,
    pub files: usize,
    pub failures: Vec<CopyFailure>,
}

impl CopyStats {
    /// Fold another subtree's counters into this one.
    pub fn merge(&mut self, other: CopyStats) {
        self.pages += other.pages;
        self.blocks += other.blocks;
        self.files += other.files;
        self.failures.extend(other.failures);
    }
}

/// Pending sibling batch: template pages and the copy they go under.
struct Frame {
    sources: Vec<Page>,
    target_parent_id: i64,
}

/// Copies template pages, blocks and file attachments for one theme branch.
pub struct TreeCopier {
    store: Arc<dyn ContentStore>,
    remap: Arc<RemapTables>,
    background: Arc<BackgroundTasks>,
    filter: TemplateFilter,
    organization_id: i64,
    touch_pages: bool,
}

impl TreeCopier {
    pub fn new(
        store: Arc<dyn ContentStore>,
        remap: Arc<RemapTables>,
        background: Arc<BackgroundTasks>,
        filter: TemplateFilter,
        organization_id: i64,
    ) -> Self {
        Self {
            store,
            remap,
            background,
            filter,
            organization_id,
            touch_pages: true,
        }
    }

    /// Enable or disable `updated_at` touches for pages written to.
    pub fn with_touch_pages(mut self, enabled: bool) -> Self {
        self.touch_pages = enabled;
        self
    }

    /// Copy `pages` and everything below them under `target_parent_id`.
    ///
    /// Fails only when the top-level sibling insert fails. Failures deeper in
    /// the tree are logged and reported in [`CopyStats::failures`]; the rest
    /// of the subtree is still copied.
    pub async fn copy_subtree(&self, pages: Vec<Page>, target_parent_id: i64) -> Result<CopyStats> {
        let mut stats = CopyStats::default();
        if pages.is_empty() {
            return Ok(stats);
        }

        let top = Frame {
            sources: pages,
            target_parent_id,
        };
        let mut worklist = self.copy_frame(top, &mut stats).await?;

        while let Some(frame) = worklist.pop() {
            let first_source = frame.sources.first().map(|p| p.id).unwrap_or_default();
            match self.copy_frame(frame, &mut stats).await {
                Ok(children) => worklist.extend(children),
                Err(e) => {
                    warn!(
                        subsystem = "clone",
                        component = "copier",
                        organization_id = self.organization_id,
                        page_id = first_source,
                        error = %e,
                        "Sibling insert failed, skipping subtree"
                    );
                    stats.failures.push(CopyFailure {
                        source_page_id: first_source,
                        stage: "pages",
                        error: e.to_string(),
                    });
                }
            }
        }

        debug!(
            subsystem = "clone",
            component = "copier",
            op = "copy_subtree",
            organization_id = self.organization_id,
            theme = %self.filter.theme,
            page_count = stats.pages,
            block_count = stats.blocks,
            failures = stats.failures.len(),
            "Subtree copied"
        );
        Ok(stats)
    }

    /// Insert one sibling batch, copy leaf content, and return the section
    /// batches still to visit (in reverse order, ready for a stack).
    async fn copy_frame(&self, frame: Frame, stats: &mut CopyStats) -> Result<Vec<Frame>> {
        let new_ids = self
            .store
            .insert_pages(frame.target_parent_id, self.organization_id, &frame.sources)
            .await?;

        // No await between the committed insert and recording it.
        self.remap
            .pages
            .insert_all(frame.sources.iter().map(|p| p.id).zip(new_ids.iter().copied()));
        stats.pages += new_ids.len();

        let mut pending = Vec::new();
        for (source, new_id) in frame.sources.iter().zip(new_ids) {
            trace!(
                subsystem = "clone",
                component = "copier",
                source_id = source.id,
                page_id = new_id,
                page_type = %source.page_type,
                "Page copied"
            );

            let outcome = match source.page_type {
                PageType::Section => self.section_children(source, new_id).await.map(|frame| {
                    if let Some(frame) = frame {
                        pending.push(frame);
                    }
                }),
                PageType::File => self.copy_file(source, new_id, stats).await,
                PageType::Content => self.copy_blocks(source, new_id, stats).await,
            };

            if let Err(e) = outcome {
                let stage = match source.page_type {
                    PageType::Section => "children",
                    PageType::File => "file",
                    PageType::Content => "blocks",
                };
                warn!(
                    subsystem = "clone",
                    component = "copier",
                    organization_id = self.organization_id,
                    page_id = source.id,
                    stage,
                    error = %e,
                    "Copying page content failed"
                );
                stats.failures.push(CopyFailure {
                    source_page_id: source.id,
                    stage,
                    error: e.to_string(),
                });
            }
        }

        pending.reverse();
        Ok(pending)
    }

    async fn section_children(&self, source: &Page, new_id: i64) -> Result<Option<Frame>> {
        let children = self
            .store
            .get_template_children(source.id, &self.filter)
            .await?;
        if children.is_empty() {
            return Ok(None);
        }
        Ok(Some(Frame {
            sources: children,
            target_parent_id: new_id,
        }))
    }

    async fn copy_file(&self, source: &Page, new_id: i64, stats: &mut CopyStats) -> Result<()> {
        let attachment = self.store.get_file_attachment(source.id).await?;
        self.store
            .create_file_attachment(new_id, &attachment.path)
            .await?;
        stats.files += 1;
        self.touch(new_id).await;
        Ok(())
    }

    async fn copy_blocks(&self, source: &Page, new_id: i64, stats: &mut CopyStats) -> Result<()> {
        let blocks = self.store.get_blocks_by_page(source.id).await?;
        if blocks.is_empty() {
            return Ok(());
        }

        let new_block_ids = self.store.insert_blocks(new_id, &blocks).await?;
        self.remap
            .blocks
            .insert_all(blocks.iter().map(|b| b.id).zip(new_block_ids.iter().copied()));
        stats.blocks += new_block_ids.len();
        self.touch(new_id).await;
        Ok(())
    }

    async fn touch(&self, page_id: i64) {
        if !self.touch_pages {
            return;
        }
        let store = Arc::clone(&self.store);
        self.background
            .spawn(format!("touch page {page_id}"), async move {
                store.touch_page(page_id).await
            })
            .await;
    }
}
