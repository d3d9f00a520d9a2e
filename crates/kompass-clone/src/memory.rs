//! In-memory content store for deterministic testing.
//!
//! Implements [`ContentStore`] and [`OrganizationRepository`] over plain
//! collections, with switches for injecting failures and latency.
//!
//! ## Usage
//!
//! ```rust
//! use kompass_clone::memory::MemoryContentStore;
//! use kompass_core::{PageType, Plan, Theme};
//!
//! let store = MemoryContentStore::new();
//! let root = store.add_template_root(Theme::Precautions);
//! let page = store.add_template_page(root, PageType::Content, "Notvorrat", &[Plan::Basic]);
//! store.add_block(page, "Wasser", Some("siehe /admin/page/1"));
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use kompass_core::{
    defaults, Block, BlockTextUpdate, BlockType, ContentStore, CreateOrganizationRequest, Error,
    FileAttachment, Organization, OrganizationRepository, OrganizationStatus, Page, PageStatus,
    PageType, Plan, Result, TemplateFilter, Theme,
};

#[derive(Default)]
struct State {
    next_id: i64,
    pages: BTreeMap<i64, Page>,
    blocks: BTreeMap<i64, Block>,
    files: HashMap<i64, FileAttachment>,
    default_plans: HashSet<(i64, Plan)>,
    organizations: BTreeMap<i64, Organization>,
    members: Vec<(i64, i64)>,
    touches: Vec<i64>,
    failures: Failures,
    block_update_calls: usize,
}

#[derive(Default)]
struct Failures {
    template_roots: bool,
    children_of: HashSet<i64>,
    page_inserts: HashSet<i64>,
    block_inserts: HashSet<i64>,
    files_of: HashSet<i64>,
    block_updates: bool,
    block_updates_after: Option<usize>,
    touches: bool,
    slow_children: HashMap<i64, Duration>,
    slow_blocks: HashMap<i64, Duration>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn new_page(
        &mut self,
        organization_id: Option<i64>,
        parent_id: Option<i64>,
        page_type: PageType,
        theme: Theme,
        title: &str,
    ) -> i64 {
        let id = self.next_id();
        let sort = self
            .pages
            .values()
            .filter(|p| p.parent_id == parent_id && p.organization_id == organization_id)
            .map(|p| p.sort)
            .max()
            .unwrap_or(0)
            + 1;
        let now = Utc::now();
        self.pages.insert(
            id,
            Page {
                id,
                organization_id,
                parent_id,
                language_tag: defaults::LANGUAGE_TAG.to_string(),
                page_type,
                theme,
                status: PageStatus::Visible,
                title: title.to_string(),
                image: None,
                image_hover: None,
                sort,
                created_at: now,
                updated_at: now,
            },
        );
        id
    }
}

/// Thread-safe in-memory store. Ids are shared by all entity kinds and
/// increase monotonically.
#[derive(Default)]
pub struct MemoryContentStore {
    state: Mutex<State>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Seeding ───────────────────────────────────────────────────────────

    /// Add the template root of `theme`.
    pub fn add_template_root(&self, theme: Theme) -> i64 {
        self.state()
            .new_page(None, None, PageType::Section, theme, theme.root_title())
    }

    /// Add a visible template page under `parent_id`, in the parent's theme,
    /// belonging to the default content of `plans`.
    pub fn add_template_page(
        &self,
        parent_id: i64,
        page_type: PageType,
        title: &str,
        plans: &[Plan],
    ) -> i64 {
        let mut state = self.state();
        let theme = state
            .pages
            .get(&parent_id)
            .map(|p| p.theme)
            .unwrap_or(Theme::Precautions);
        let id = state.new_page(None, Some(parent_id), page_type, theme, title);
        for plan in plans {
            state.default_plans.insert((id, *plan));
        }
        id
    }

    /// Change the status of a page.
    pub fn set_status(&self, page_id: i64, status: PageStatus) {
        if let Some(page) = self.state().pages.get_mut(&page_id) {
            page.status = status;
        }
    }

    /// Add a block at the end of `page_id`.
    pub fn add_block(&self, page_id: i64, title: &str, content: Option<&str>) -> i64 {
        self.add_block_with_readmore(page_id, title, content, None)
    }

    pub fn add_block_with_readmore(
        &self,
        page_id: i64,
        title: &str,
        content: Option<&str>,
        readmore: Option<&str>,
    ) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        let sort = state
            .blocks
            .values()
            .filter(|b| b.page_id == page_id)
            .map(|b| b.sort)
            .max()
            .unwrap_or(0)
            + 1;
        state.blocks.insert(
            id,
            Block {
                id,
                page_id,
                title: title.to_string(),
                content: content.map(str::to_string),
                readmore: readmore.map(str::to_string),
                image: None,
                image_hover: None,
                block_type: BlockType::Default,
                sort,
            },
        );
        id
    }

    /// Attach a file to `page_id`.
    pub fn add_file(&self, page_id: i64, path: &str) {
        self.state().files.insert(
            page_id,
            FileAttachment {
                id: page_id,
                path: path.to_string(),
                created_at: Utc::now(),
            },
        );
    }

    /// Add an organization with one root page per theme.
    pub fn add_organization(&self, plan: Plan) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        let now = Utc::now();
        state.organizations.insert(
            id,
            Organization {
                id,
                name: format!("Organisation {id}"),
                image: None,
                city: "Musterstadt".to_string(),
                population: 0,
                address: String::new(),
                invoice_address: String::new(),
                plan,
                status: OrganizationStatus::default(),
                created_at: now,
                updated_at: now,
            },
        );
        for theme in Theme::ALL {
            state.new_page(Some(id), None, PageType::Section, theme, theme.root_title());
        }
        id
    }

    // ─── Failure injection ─────────────────────────────────────────────────

    /// Fail the template root lookup.
    pub fn fail_template_roots(&self) {
        self.state().failures.template_roots = true;
    }

    /// Fail lookups of the template children of `page_id`.
    pub fn fail_children_of(&self, page_id: i64) {
        self.state().failures.children_of.insert(page_id);
    }

    /// Delay lookups of the template children of `page_id`.
    pub fn slow_children_of(&self, page_id: i64, delay: Duration) {
        self.state().failures.slow_children.insert(page_id, delay);
    }

    /// Delay reading the blocks of `source_page_id`.
    pub fn slow_blocks_of(&self, source_page_id: i64, delay: Duration) {
        self.state().failures.slow_blocks.insert(source_page_id, delay);
    }

    /// Fail any sibling insert that contains a copy of `source_page_id`.
    pub fn fail_page_insert(&self, source_page_id: i64) {
        self.state().failures.page_inserts.insert(source_page_id);
    }

    /// Fail block inserts copying the blocks of `source_page_id`.
    pub fn fail_block_insert(&self, source_page_id: i64) {
        self.state().failures.block_inserts.insert(source_page_id);
    }

    /// Fail reading the attachment of `source_page_id`.
    pub fn fail_file_of(&self, source_page_id: i64) {
        self.state().failures.files_of.insert(source_page_id);
    }

    /// Fail every block text update.
    pub fn fail_block_updates(&self) {
        self.state().failures.block_updates = true;
    }

    /// Let the first `calls` block text updates succeed and fail the rest.
    pub fn fail_block_updates_after(&self, calls: usize) {
        self.state().failures.block_updates_after = Some(calls);
    }

    /// Fail every page touch.
    pub fn fail_touches(&self) {
        self.state().failures.touches = true;
    }

    // ─── Inspection ────────────────────────────────────────────────────────

    pub fn page(&self, id: i64) -> Option<Page> {
        self.state().pages.get(&id).cloned()
    }

    pub fn block(&self, id: i64) -> Option<Block> {
        self.state().blocks.get(&id).cloned()
    }

    pub fn file(&self, page_id: i64) -> Option<FileAttachment> {
        self.state().files.get(&page_id).cloned()
    }

    /// Children of `parent_id` in sort order, regardless of owner or status.
    pub fn children(&self, parent_id: i64) -> Vec<Page> {
        let mut children: Vec<Page> = self
            .state()
            .pages
            .values()
            .filter(|p| p.parent_id == Some(parent_id))
            .cloned()
            .collect();
        children.sort_by_key(|p| (p.sort, p.id));
        children
    }

    /// Blocks of `page_id` in sort order.
    pub fn blocks_of(&self, page_id: i64) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .state()
            .blocks
            .values()
            .filter(|b| b.page_id == page_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| (b.sort, b.id));
        blocks
    }

    /// Root page of an organization for `theme`.
    pub fn organization_root(&self, organization_id: i64, theme: Theme) -> Option<Page> {
        self.state()
            .pages
            .values()
            .find(|p| {
                p.organization_id == Some(organization_id) && p.parent_id.is_none() && p.theme == theme
            })
            .cloned()
    }

    /// Number of pages owned by `organization_id`, roots included.
    pub fn organization_page_count(&self, organization_id: i64) -> usize {
        self.state()
            .pages
            .values()
            .filter(|p| p.organization_id == Some(organization_id))
            .count()
    }

    /// User ids of an organization's members.
    pub fn members(&self, organization_id: i64) -> Vec<i64> {
        self.state()
            .members
            .iter()
            .filter(|(org, _)| *org == organization_id)
            .map(|(_, user)| *user)
            .collect()
    }

    /// Page ids touched so far, in order.
    pub fn touched_pages(&self) -> Vec<i64> {
        self.state().touches.clone()
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn get_root_template_pages(&self) -> Result<Vec<Page>> {
        let state = self.state();
        if state.failures.template_roots {
            return Err(Error::Internal("injected template root failure".into()));
        }
        let mut roots: Vec<Page> = state
            .pages
            .values()
            .filter(|p| p.is_template() && p.is_root())
            .cloned()
            .collect();
        roots.sort_by_key(|p| (p.sort, p.id));
        Ok(roots)
    }

    async fn get_organization_root_page(&self, organization_id: i64, theme: Theme) -> Result<Page> {
        self.organization_root(organization_id, theme)
            .ok_or(Error::RootPageNotFound {
                organization_id,
                theme,
            })
    }

    async fn get_template_children(
        &self,
        parent_id: i64,
        filter: &TemplateFilter,
    ) -> Result<Vec<Page>> {
        let delay = self.state().failures.slow_children.get(&parent_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.failures.children_of.contains(&parent_id) {
            return Err(Error::Internal(format!(
                "injected children lookup failure for page {parent_id}"
            )));
        }

        let mut children: Vec<Page> = state
            .pages
            .values()
            .filter(|p| p.is_template() && p.parent_id == Some(parent_id))
            .filter(|p| {
                let plans: Vec<Plan> = state
                    .default_plans
                    .iter()
                    .filter(|(id, _)| *id == p.id)
                    .map(|(_, plan)| *plan)
                    .collect();
                filter.admits(p, &plans)
            })
            .cloned()
            .collect();
        children.sort_by_key(|p| (p.sort, p.id));
        Ok(children)
    }

    async fn insert_pages(
        &self,
        parent_id: i64,
        organization_id: i64,
        pages: &[Page],
    ) -> Result<Vec<i64>> {
        let mut state = self.state();
        if let Some(p) = pages
            .iter()
            .find(|p| state.failures.page_inserts.contains(&p.id))
        {
            return Err(Error::Internal(format!(
                "injected insert failure for copy of page {}",
                p.id
            )));
        }

        let now = Utc::now();
        let mut ids = Vec::with_capacity(pages.len());
        for page in pages {
            let id = state.next_id();
            state.pages.insert(
                id,
                Page {
                    id,
                    organization_id: Some(organization_id),
                    parent_id: Some(parent_id),
                    created_at: now,
                    updated_at: now,
                    ..page.clone()
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_blocks_by_page(&self, page_id: i64) -> Result<Vec<Block>> {
        let delay = self.state().failures.slow_blocks.get(&page_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.blocks_of(page_id))
    }

    async fn insert_blocks(&self, page_id: i64, blocks: &[Block]) -> Result<Vec<i64>> {
        let mut state = self.state();
        if let Some(b) = blocks
            .iter()
            .find(|b| state.failures.block_inserts.contains(&b.page_id))
        {
            return Err(Error::Internal(format!(
                "injected insert failure for blocks of page {}",
                b.page_id
            )));
        }

        let mut ids = Vec::with_capacity(blocks.len());
        for block in blocks {
            let id = state.next_id();
            state.blocks.insert(
                id,
                Block {
                    id,
                    page_id,
                    ..block.clone()
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn get_file_attachment(&self, page_id: i64) -> Result<FileAttachment> {
        let state = self.state();
        if state.failures.files_of.contains(&page_id) {
            return Err(Error::Internal(format!(
                "injected attachment failure for page {page_id}"
            )));
        }
        state
            .files
            .get(&page_id)
            .cloned()
            .ok_or(Error::FileNotFound(page_id))
    }

    async fn create_file_attachment(&self, page_id: i64, path: &str) -> Result<()> {
        self.add_file(page_id, path);
        Ok(())
    }

    async fn get_blocks_by_ids(&self, ids: &[i64], limit: i64, offset: i64) -> Result<Vec<Block>> {
        let wanted: HashSet<i64> = ids.iter().copied().collect();
        // BTreeMap iteration is already ordered by id.
        Ok(self
            .state()
            .blocks
            .values()
            .filter(|b| wanted.contains(&b.id))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn update_block_texts(&self, updates: &[BlockTextUpdate]) -> Result<()> {
        let mut state = self.state();
        let call = state.block_update_calls;
        state.block_update_calls += 1;
        let over_limit = state
            .failures
            .block_updates_after
            .is_some_and(|allowed| call >= allowed);
        if state.failures.block_updates || over_limit {
            return Err(Error::Internal("injected block update failure".into()));
        }
        if let Some(missing) = updates.iter().find(|u| !state.blocks.contains_key(&u.block_id)) {
            return Err(Error::NotFound(format!("block {}", missing.block_id)));
        }

        for update in updates {
            if let Some(block) = state.blocks.get_mut(&update.block_id) {
                if let Some(content) = &update.content {
                    block.content = Some(content.clone());
                }
                if let Some(readmore) = &update.readmore {
                    block.readmore = Some(readmore.clone());
                }
            }
        }
        Ok(())
    }

    async fn touch_page(&self, page_id: i64) -> Result<()> {
        let mut state = self.state();
        if state.failures.touches {
            return Err(Error::Internal(format!("injected touch failure for page {page_id}")));
        }
        let page = state
            .pages
            .get_mut(&page_id)
            .ok_or(Error::PageNotFound(page_id))?;
        page.updated_at = Utc::now();
        state.touches.push(page_id);
        Ok(())
    }
}

#[async_trait]
impl OrganizationRepository for MemoryContentStore {
    async fn create(&self, req: CreateOrganizationRequest) -> Result<i64> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidInput("organization name is empty".into()));
        }
        let id = self.add_organization(req.plan);
        let mut state = self.state();
        if let Some(org) = state.organizations.get_mut(&id) {
            org.name = req.name;
            org.image = req.image;
            org.city = req.city;
            org.population = req.population;
            org.address = req.address;
            org.invoice_address = req.invoice_address;
        }
        state.members.push((id, req.owner_user_id));
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<Organization>> {
        Ok(self.state().organizations.get(&id).cloned())
    }
}
