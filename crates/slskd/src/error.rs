use thiserror::Error;

/// Errors that can occur when communicating with a slskd instance.
#[derive(Debug, Error)]
pub enum SlskdError {
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(String),
}

impl SlskdError {
    pub(crate) fn parse_error(msg: impl Into<String>) -> Self {
        SlskdError::Parse(msg.into())
    }

    pub(crate) fn server_error(status: u16, message: impl Into<String>) -> Self {
        SlskdError::ServerError {
            status,
            message: message.into(),
        }
    }
}
