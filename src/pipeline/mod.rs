//! Pipeline entry points for watch-log operations.
//!
//! - `Reconciler`: one full reconciliation pass over catalog + log
//! - `RetryPolicy`: bounded retry for detail-link resolution

pub mod reconcile;
pub mod retry;

pub use reconcile::{Reconciler, RunStats};
pub use retry::RetryPolicy;
