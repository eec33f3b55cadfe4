use crate::protocol::DecodeError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("a generation session is already in progress")]
    AlreadyInProgress,
    #[error("{0}")]
    Connection(String),
    // The decode detail is logged, not shown.
    #[error("malformed server message")]
    Protocol(#[from] DecodeError),
    #[error("{0}")]
    ServerReported(String),
    #[error("cancelled by user")]
    Cancelled,
    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SessionError {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ServerReported(_) | Self::AlreadyInProgress)
    }

    pub fn unexpected_close(code: u16, clean: bool) -> Self {
        let cleanliness = if clean { "clean" } else { "unclean" };
        Self::Connection(format!(
            "connection closed before completion (code {code}, {cleanliness})"
        ))
    }
}
