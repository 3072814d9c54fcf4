use slskrr_slskd::SlskdError;
use slskrr_token::TokenError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
    #[error("backend error: {0}")]
    Backend(#[from] SlskdError),
    #[error("transfer not found: {0}")]
    NotFound(String),
}
