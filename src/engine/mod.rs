//! Pure computation engines for the reconciliation pipeline.
//!
//! Both the aggregator and the detector are pure functions over ledger
//! snapshots; persistence and locking live with the caller.

pub mod aggregator;
pub mod detector;

pub use aggregator::aggregate;
pub use detector::{detect, DetectedBreak};
