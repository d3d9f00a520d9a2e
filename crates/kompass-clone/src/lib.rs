//! # kompass-clone
//!
//! Copies the default content of a subscription plan into an organization
//! and rewrites template links so they point at the copies.
//!
//! This crate provides:
//! - Per-run remap tables from template ids to copy ids
//! - A worklist-based tree copier for pages, blocks and file attachments
//! - A batch link rewriter behind the [`LinkScanner`] seam
//! - The orchestrator that fans out one copier per theme
//! - Provisioning entry points that schedule clones in the background
//! - With the `test-utils` feature, an in-memory store with failure injection
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kompass_clone::{CloneConfig, CloneOrchestrator};
//! use kompass_db::Database;
//! use kompass_core::Plan;
//!
//! let db = Database::connect("postgres://...").await?;
//! let orchestrator = CloneOrchestrator::new(Arc::new(db.content_store()), CloneConfig::from_env());
//! let report = orchestrator.clone_default_content(42, Plan::Basic).await?;
//! println!("{} pages copied", report.pages_copied);
//! ```

pub mod background;
pub mod config;
pub mod copier;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod orchestrator;
pub mod provision;
pub mod remap;
pub mod rewriter;
pub mod scanner;

pub use background::BackgroundTasks;
pub use config::CloneConfig;
pub use copier::{CopyFailure, CopyStats, TreeCopier};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryContentStore;
pub use orchestrator::{BranchFailure, CloneOrchestrator, CloneReport};
pub use provision::{CloneHandle, OrganizationProvisioner, ProvisionedOrganization};
pub use remap::{RemapTable, RemapTables};
pub use rewriter::{LinkRewriter, RewriteStats};
pub use scanner::{LinkMatch, LinkScanner, PathLinkScanner};
