//! Rewrites template links in copied blocks so they point at the copies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, trace};

use kompass_core::{Block, BlockTextUpdate, ContentStore, Result};

use crate::remap::RemapTables;
use crate::scanner::LinkScanner;

/// Outcome of one link-rewrite pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RewriteStats {
    /// Copied blocks inspected.
    pub scanned: usize,
    /// Blocks whose text changed.
    pub rewritten: usize,
    /// Batches committed.
    pub batches: usize,
}

/// Batch-wise link rewriter over the blocks created by one clone run.
pub struct LinkRewriter {
    store: Arc<dyn ContentStore>,
    scanner: Arc<dyn LinkScanner>,
    batch_size: i64,
}

impl LinkRewriter {
    pub fn new(store: Arc<dyn ContentStore>, scanner: Arc<dyn LinkScanner>, batch_size: i64) -> Self {
        Self {
            store,
            scanner,
            batch_size: batch_size.max(1),
        }
    }

    /// Rewrite links in every copied block of `organization_id`.
    ///
    /// A no-op when either remap table is empty. A failed read or update
    /// stops the pass; batches committed before it keep their changes.
    pub async fn fix_links(&self, organization_id: i64, remap: &RemapTables) -> Result<RewriteStats> {
        let mut stats = RewriteStats::default();

        if remap.pages.is_empty() || remap.blocks.is_empty() {
            debug!(
                subsystem = "clone",
                component = "rewriter",
                op = "fix_links",
                organization_id,
                "Nothing copied, skipping link rewrite"
            );
            return Ok(stats);
        }

        let start = Instant::now();
        let pages = remap.pages.snapshot();
        let blocks = remap.blocks.snapshot();
        let candidates = remap.blocks.copied_ids();
        let mut offset: i64 = 0;

        loop {
            let batch = self
                .store
                .get_blocks_by_ids(&candidates, self.batch_size, offset)
                .await?;
            if batch.is_empty() {
                break;
            }

            let updates: Vec<BlockTextUpdate> = batch
                .iter()
                .filter_map(|block| self.rewrite_block(block, organization_id, &pages, &blocks))
                .collect();

            if !updates.is_empty() {
                self.store.update_block_texts(&updates).await?;
            }

            stats.scanned += batch.len();
            stats.rewritten += updates.len();
            stats.batches += 1;
            debug!(
                subsystem = "clone",
                component = "rewriter",
                organization_id,
                offset,
                block_count = batch.len(),
                rewritten_count = updates.len(),
                "Link batch committed"
            );

            offset += batch.len() as i64;
            if (batch.len() as i64) < self.batch_size {
                break;
            }
        }

        info!(
            subsystem = "clone",
            component = "rewriter",
            op = "fix_links",
            organization_id,
            block_count = stats.scanned,
            rewritten_count = stats.rewritten,
            duration_ms = start.elapsed().as_millis() as u64,
            "Link rewrite complete"
        );
        Ok(stats)
    }

    fn rewrite_block(
        &self,
        block: &Block,
        organization_id: i64,
        pages: &HashMap<i64, i64>,
        blocks: &HashMap<i64, i64>,
    ) -> Option<BlockTextUpdate> {
        let rewrite = |text: &Option<String>| {
            text.as_deref()
                .and_then(|t| self.scanner.rewrite(t, organization_id, pages, blocks))
        };

        let update = BlockTextUpdate {
            block_id: block.id,
            content: rewrite(&block.content),
            readmore: rewrite(&block.readmore),
        };
        if update.is_empty() {
            return None;
        }

        trace!(
            subsystem = "clone",
            component = "rewriter",
            block_id = block.id,
            "Block links rewritten"
        );
        Some(update)
    }
}
