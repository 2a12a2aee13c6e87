//! Concurrent batch analysis.
//!
//! A [`BatchCoordinator`] validates a [`BatchRequest`], normalizes its items,
//! and runs them through a small pool of worker loops fed by a
//! priority-ordered [`ItemScheduler`](scheduler::ItemScheduler). Each item
//! goes through the analysis cache first and the analyzer registry on a
//! miss. Failures, cancellation and timeout are recorded per item; the batch
//! itself always completes with a [`BatchReport`].
//!
//! ```rust,ignore
//! let report = coordinator
//!     .submit(
//!         BatchRequest::new("launch-copy", ["first draft", "second draft"])
//!             .frameworks(["STEPPS"])
//!             .concurrency(2),
//!     )
//!     .await?;
//! assert_eq!(report.results.len(), 2);
//! ```

mod coordinator;
pub mod progress;
pub mod scheduler;
mod types;
mod worker;

pub use coordinator::{BatchCoordinator, CoordinatorStatus};
pub use progress::{ProgressSnapshot, ProgressTracker};
pub use scheduler::ItemScheduler;
pub use types::{
    BatchItem, BatchReport, BatchRequest, BatchStatus, BatchSummary, CancelAck, HistoryEntry,
    ItemInput, ItemOutcome, ItemResult, ItemSpec,
};
