//! # kompass-core
//!
//! Core types, traits, and abstractions for the kompass content backend.
//!
//! This crate provides the domain model (pages, blocks, file attachments,
//! organizations), the storage traits the cloning engine consumes, and the
//! shared error, logging and default definitions.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
pub use uuid_utils::{extract_timestamp, new_v7};
