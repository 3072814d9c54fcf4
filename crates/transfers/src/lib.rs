//! Download tracking for the slskd bridge.
//!
//! - [`TransferRegistry`]: volatile, concurrent store of tracked downloads.
//! - [`TransferReconciler`]: background task mirroring slskd progress into it.
//! - [`TransferService`]: enqueue/cancel/retry on top of both.

mod error;
pub mod reconciler;
pub mod registry;
mod service;

pub use crate::error::TransferError;
pub use crate::reconciler::{map_transfer_state, ReconcileReport, TransferReconciler};
pub use crate::registry::{TrackedTransfer, TransferRegistry, TransferStatus};
pub use crate::service::TransferService;
