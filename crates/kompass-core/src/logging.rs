//! Structured logging schema and field name constants for kompass.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query a clone run across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue: a branch failed, a background write failed |
//! | INFO  | Lifecycle events, clone run start and completion |
//! | DEBUG | Decision points, per-branch results, batch boundaries |
//! | TRACE | Per-item iteration (single pages, blocks, rewritten links) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of one clone run. Format: UUIDv7 (time-ordered).
pub const RUN_ID: &str = "run_id";

/// Subsystem originating the log event.
/// Values: "database", "clone", "cli"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "orchestrator", "copier", "rewriter", "background"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "clone_default_content", "copy_subtree", "fix_links"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Target organization of a clone run.
pub const ORGANIZATION_ID: &str = "organization_id";

/// Page being read or written.
pub const PAGE_ID: &str = "page_id";

/// Block being read or written.
pub const BLOCK_ID: &str = "block_id";

/// Theme of the branch being copied.
pub const THEME: &str = "theme";

/// Subscription plan of the clone run.
pub const PLAN: &str = "plan";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of pages created.
pub const PAGE_COUNT: &str = "page_count";

/// Number of blocks created or scanned.
pub const BLOCK_COUNT: &str = "block_count";

/// Number of blocks whose text was rewritten.
pub const REWRITTEN_COUNT: &str = "rewritten_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Run finished past its deadline or with failed branches.
pub const DEGRADED: &str = "degraded";
