//! Search orchestration on top of slskd.
//!
//! [`SearchCoordinator::search_and_wait`] submits a query, polls it with an
//! adaptive delay and hands back the peer responses once the search completes
//! or the caller's deadline passes.

mod coordinator;
pub mod delay;
mod error;

pub use crate::coordinator::{SearchConfig, SearchCoordinator};
pub use crate::error::SearchError;
