use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

/// Everything the chat core can refuse a request with.
///
/// None of these are fatal: the handler boundary turns each one into a single
/// event for the sender and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("too many messages, slow down")]
    RateLimited,

    #[error("wait for a reply before sending more")]
    TurnLimitExceeded,

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::TurnLimitExceeded => "turn_limit_exceeded",
            Self::InvalidContent(_) => "invalid_content",
            Self::Internal(_) => "internal",
        }
    }
}
