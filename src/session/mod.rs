use crate::protocol::InboundMessage;
use serde::Serialize;
use std::fmt;

pub mod controller;
pub mod error;

pub use controller::SessionController;
pub use error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// The single frame sent to the service once the channel is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    source_code: String,
    prompt: String,
    libraries: Vec<String>,
}

impl GenerationRequest {
    /// Duplicate libraries are dropped, keeping the first occurrence.
    pub fn new(
        source_code: impl Into<String>,
        prompt: impl Into<String>,
        libraries: impl IntoIterator<Item = String>,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for library in libraries {
            if !unique.contains(&library) {
                unique.push(library);
            }
        }

        Self {
            source_code: source_code.into(),
            prompt: prompt.into(),
            libraries: unique,
        }
    }

    pub fn source_code(&self) -> &str {
        &self.source_code
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn libraries(&self) -> &[String] {
        &self.libraries
    }

    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    Connecting,
    Awaiting,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Awaiting => "awaiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Awaiting)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub plan: String,
    pub code: String,
    pub error: String,
    pub status: SessionStatus,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        self.status.is_busy()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Applies one non-terminal update. Every kind owns its own slot and a
    /// later update replaces the earlier one. Returns false for `Completion`,
    /// which the controller handles because it also closes the channel.
    fn fold(&mut self, update: InboundMessage) -> bool {
        match update {
            InboundMessage::PlanUpdate { text } => self.plan = text,
            InboundMessage::CodeUpdate { text } => self.code = text,
            InboundMessage::ErrorUpdate { text } => {
                self.record(&SessionError::ServerReported(text))
            }
            InboundMessage::Completion => return false,
        }
        true
    }

    /// Keeps a recoverable error in the error slot without ending the session.
    fn record(&mut self, error: &SessionError) {
        debug_assert!(!error.is_terminal());
        self.error = error.to_string();
    }

    fn fail(&mut self, error: &SessionError) {
        self.status = SessionStatus::Failed;
        self.error = error.to_string();
    }
}
