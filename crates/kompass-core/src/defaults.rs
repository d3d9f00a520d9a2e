//! Centralized default constants for kompass.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers.

// =============================================================================
// CLONING
// =============================================================================

/// Blocks loaded and rewritten per link-rewrite transaction.
pub const LINK_BATCH_SIZE: i64 = 50;

/// Path prefix of links that point at template pages.
pub const TEMPLATE_LINK_PREFIX: &str = "/admin/page/";

/// Fragment prefix of block anchors inside a page link.
pub const BLOCK_ANCHOR_PREFIX: &str = "#block-";

/// Whether writes into copied pages bump their `updated_at`.
pub const TOUCH_PAGES: bool = true;

// =============================================================================
// CONTENT
// =============================================================================

/// Language tag of seeded organization root pages.
pub const LANGUAGE_TAG: &str = "de";

// =============================================================================
// DATABASE
// =============================================================================

/// Default database URL when `DATABASE_URL` is not set.
pub const DATABASE_URL: &str = "postgres://localhost/kompass";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_batch_size_positive() {
        assert!(LINK_BATCH_SIZE > 0);
    }

    #[test]
    fn test_link_prefixes_shape() {
        assert!(TEMPLATE_LINK_PREFIX.starts_with('/'));
        assert!(TEMPLATE_LINK_PREFIX.ends_with('/'));
        assert!(BLOCK_ANCHOR_PREFIX.starts_with('#'));
    }
}
