//! Shared error taxonomy.
//!
//! Every component-level error enum in this crate implements [`Categorized`] so the
//! pipeline executor can decide retry/abort/surface behavior uniformly, without
//! matching on each module's concrete error type.

use std::fmt;

/// The six error categories from the error-handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Retry with backoff: LLM timeout, queue network error, graph/search unavailable.
    Transient,
    /// Invalid queue name, oversized non-truncatable payload, invalid config.
    Validation,
    /// Throttle denial, cap reached.
    Capacity,
    /// Cross-reference external id missing on validate.
    Orphan,
    /// Per-function worker exception; job still counts as done for drain purposes.
    ProcessingError,
    /// SQL connection loss during persist; abort the current pipeline stage.
    Fatal,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Transient => "Transient",
            Category::Validation => "Validation",
            Category::Capacity => "Capacity",
            Category::Orphan => "Orphan",
            Category::ProcessingError => "ProcessingError",
            Category::Fatal => "Fatal",
        };
        f.write_str(s)
    }
}

/// Implemented by every component error enum so callers can branch on category
/// instead of the concrete error type.
pub trait Categorized {
    fn category(&self) -> Category;

    fn is_retryable(&self) -> bool {
        matches!(self.category(), Category::Transient)
    }

    fn is_fatal(&self) -> bool {
        matches!(self.category(), Category::Fatal)
    }
}
