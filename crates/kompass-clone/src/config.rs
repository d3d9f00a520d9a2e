//! Clone run configuration.

use std::time::Duration;

use kompass_core::defaults;

/// Configuration for a clone run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneConfig {
    /// Blocks loaded and rewritten per link-rewrite transaction.
    pub link_batch_size: i64,
    /// Overall deadline for the copy phase. `None` waits for every branch.
    pub deadline: Option<Duration>,
    /// Submit `updated_at` touches for pages that received nested writes.
    pub touch_pages: bool,
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            link_batch_size: defaults::LINK_BATCH_SIZE,
            deadline: None,
            touch_pages: defaults::TOUCH_PAGES,
        }
    }
}

impl CloneConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CLONE_LINK_BATCH_SIZE` | `50` | Blocks per link-rewrite batch (min 1) |
    /// | `CLONE_DEADLINE_SECS` | unset | Deadline for the copy phase |
    /// | `CLONE_TOUCH_PAGES` | `true` | Bump `updated_at` of written pages |
    pub fn from_env() -> Self {
        let link_batch_size = std::env::var("CLONE_LINK_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(defaults::LINK_BATCH_SIZE)
            .max(1);

        let deadline = std::env::var("CLONE_DEADLINE_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);

        let touch_pages = std::env::var("CLONE_TOUCH_PAGES")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(defaults::TOUCH_PAGES);

        Self {
            link_batch_size,
            deadline,
            touch_pages,
        }
    }

    /// Set the link-rewrite batch size (clamped to at least 1).
    pub fn with_link_batch_size(mut self, size: i64) -> Self {
        self.link_batch_size = size.max(1);
        self
    }

    /// Set the copy-phase deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Enable or disable page touches.
    pub fn with_touch_pages(mut self, enabled: bool) -> Self {
        self.touch_pages = enabled;
        self
    }
}
