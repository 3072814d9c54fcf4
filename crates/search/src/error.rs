use slskrr_slskd::SlskdError;
use thiserror::Error;

/// Ways a search-and-wait can fail.
///
/// Running out of time is not among them: a deadline yields whatever results
/// slskd collected so far.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search submission rejected: {0}")]
    Submission(#[source] SlskdError),
    #[error("search transport error: {0}")]
    Transport(#[source] SlskdError),
    #[error("search cancelled")]
    Cancelled,
}
