//! Entry point of a clone run: fans out one copier per theme, then rewrites
//! links once for the whole organization.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use kompass_core::{extract_timestamp, new_v7, ContentStore, Page, Plan, Result, TemplateFilter, Theme};

use crate::background::BackgroundTasks;
use crate::config::CloneConfig;
use crate::copier::{CopyFailure, CopyStats, TreeCopier};
use crate::remap::RemapTables;
use crate::rewriter::LinkRewriter;
use crate::scanner::{LinkScanner, PathLinkScanner};

/// A theme branch that copied nothing or stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub theme: Theme,
    pub error: String,
}

/// Summary of one clone run.
#[derive(Debug, Clone, Serialize)]
pub struct CloneReport {
    pub run_id: Uuid,
    pub organization_id: i64,
    pub plan: Plan,
    /// Start instant, as encoded in `run_id`.
    pub started_at: DateTime<Utc>,
    /// Pages created, including those of branches cut off by the deadline.
    pub pages_copied: usize,
    /// Blocks created, including those of branches cut off by the deadline.
    pub blocks_copied: usize,
    /// Attachments created by branches that ran to completion.
    pub files_copied: usize,
    pub blocks_rewritten: usize,
    pub failed_branches: usize,
    pub branch_failures: Vec<BranchFailure>,
    pub copy_failures: Vec<CopyFailure>,
    pub background_failures: usize,
    /// The copy phase hit the configured deadline.
    pub timed_out: bool,
    /// Some content was not copied.
    pub degraded: bool,
    pub duration_ms: u64,
}

/// Runs default-content clones against a content store.
pub struct CloneOrchestrator {
    store: Arc<dyn ContentStore>,
    scanner: Arc<dyn LinkScanner>,
    config: CloneConfig,
}

impl CloneOrchestrator {
    pub fn new(store: Arc<dyn ContentStore>, config: CloneConfig) -> Self {
        Self {
            store,
            scanner: Arc::new(PathLinkScanner::new()),
            config,
        }
    }

    /// Replace the link scanner used by the rewrite pass.
    pub fn with_scanner(mut self, scanner: Arc<dyn LinkScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn config(&self) -> &CloneConfig {
        &self.config
    }

    /// Copy the default content of `plan` into `organization_id`.
    ///
    /// Fails only when the template roots cannot be read or the link rewrite
    /// fails. Branch failures and a missed deadline are reported in the
    /// returned [`CloneReport`].
    pub async fn clone_default_content(&self, organization_id: i64, plan: Plan) -> Result<CloneReport> {
        let run_id = new_v7();
        let span = info_span!(
            "clone_run",
            run_id = %run_id,
            organization_id,
            plan = %plan
        );
        self.run(run_id, organization_id, plan).instrument(span).await
    }

    async fn run(&self, run_id: Uuid, organization_id: i64, plan: Plan) -> Result<CloneReport> {
        let started_at = extract_timestamp(&run_id).unwrap_or_else(Utc::now);
        let start = Instant::now();

        info!(
            subsystem = "clone",
            component = "orchestrator",
            op = "clone_default_content",
            "Clone run started"
        );

        let roots = self.store.get_root_template_pages().await?;
        let remap = Arc::new(RemapTables::new());
        let background = Arc::new(BackgroundTasks::new());

        let mut pending: Vec<Theme> = roots.iter().map(|r| r.theme).collect();
        let mut branches = JoinSet::new();
        for root in roots {
            let branch = Branch {
                store: Arc::clone(&self.store),
                remap: Arc::clone(&remap),
                background: Arc::clone(&background),
                organization_id,
                plan,
                touch_pages: self.config.touch_pages,
            };
            branches.spawn(branch.run(root).in_current_span());
        }

        let mut copied = CopyStats::default();
        let mut branch_failures = Vec::new();
        let mut timed_out = false;
        let deadline = self
            .config
            .deadline
            .map(|d| tokio::time::Instant::now() + d);

        loop {
            let joined = match deadline {
                Some(at) if !timed_out => {
                    tokio::select! {
                        joined = branches.join_next() => joined,
                        _ = tokio::time::sleep_until(at) => {
                            timed_out = true;
                            warn!(
                                subsystem = "clone",
                                component = "orchestrator",
                                outstanding = branches.len(),
                                "Clone deadline reached, aborting outstanding branches"
                            );
                            branches.abort_all();
                            continue;
                        }
                    }
                }
                _ => branches.join_next().await,
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((theme, outcome)) => {
                    if let Some(pos) = pending.iter().position(|t| *t == theme) {
                        pending.remove(pos);
                    }
                    match outcome {
                        Ok(stats) => copied.merge(stats),
                        Err(e) => {
                            warn!(
                                subsystem = "clone",
                                component = "orchestrator",
                                theme = %theme,
                                error = %e,
                                "Theme branch failed"
                            );
                            branch_failures.push(BranchFailure {
                                theme,
                                error: e.to_string(),
                            });
                        }
                    }
                }
                // Aborted at the deadline; the theme stays in `pending`.
                Err(e) if e.is_cancelled() => {}
                Err(e) => {
                    warn!(
                        subsystem = "clone",
                        component = "orchestrator",
                        error = %e,
                        "Theme branch task panicked"
                    );
                }
            }
        }

        let unfinished = if timed_out {
            "deadline exceeded before branch finished"
        } else {
            "branch task did not complete"
        };
        branch_failures.extend(pending.into_iter().map(|theme| BranchFailure {
            theme,
            error: unfinished.to_string(),
        }));

        let rewriter = LinkRewriter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.scanner),
            self.config.link_batch_size,
        );
        let rewrite = rewriter.fix_links(organization_id, &remap).await;
        let background_failures = background.drain().await;
        let rewrite = rewrite?;

        let failed_branches = branch_failures.len();
        let degraded = timed_out || failed_branches > 0 || !copied.failures.is_empty();
        let report = CloneReport {
            run_id,
            organization_id,
            plan,
            started_at,
            pages_copied: remap.pages.len(),
            blocks_copied: remap.blocks.len(),
            files_copied: copied.files,
            blocks_rewritten: rewrite.rewritten,
            failed_branches,
            branch_failures,
            copy_failures: copied.failures,
            background_failures,
            timed_out,
            degraded,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        if report.degraded {
            warn!(
                subsystem = "clone",
                component = "orchestrator",
                op = "clone_default_content",
                page_count = report.pages_copied,
                block_count = report.blocks_copied,
                failed_branches = report.failed_branches,
                copy_failures = report.copy_failures.len(),
                timed_out = report.timed_out,
                degraded = true,
                duration_ms = report.duration_ms,
                "Clone run finished degraded"
            );
        } else {
            info!(
                subsystem = "clone",
                component = "orchestrator",
                op = "clone_default_content",
                page_count = report.pages_copied,
                block_count = report.blocks_copied,
                rewritten_count = report.blocks_rewritten,
                duration_ms = report.duration_ms,
                success = true,
                "Clone run finished"
            );
        }
        Ok(report)
    }
}

/// Owned state of one theme branch, moved into its task.
struct Branch {
    store: Arc<dyn ContentStore>,
    remap: Arc<RemapTables>,
    background: Arc<BackgroundTasks>,
    organization_id: i64,
    plan: Plan,
    touch_pages: bool,
}

impl Branch {
    async fn run(self, root: Page) -> (Theme, Result<CopyStats>) {
        let theme = root.theme;
        (theme, self.copy(root).await)
    }

    async fn copy(self, root: Page) -> Result<CopyStats> {
        let filter = TemplateFilter::new(self.plan, root.theme);
        let children = self.store.get_template_children(root.id, &filter).await?;
        if children.is_empty() {
            debug!(
                subsystem = "clone",
                component = "orchestrator",
                theme = %root.theme,
                "No default content for theme"
            );
            return Ok(CopyStats::default());
        }

        let target = self
            .store
            .get_organization_root_page(self.organization_id, root.theme)
            .await?;

        TreeCopier::new(
            self.store,
            self.remap,
            self.background,
            filter,
            self.organization_id,
        )
        .with_touch_pages(self.touch_pages)
        .copy_subtree(children, target.id)
        .await
    }
}
