use crate::protocol::{self, InboundMessage, NORMAL_CLOSURE};
use crate::session::{GenerationRequest, SessionError, SessionId, SessionState, SessionStatus};
use crate::transport::{Channel, ChannelEnvelope, ChannelEvent, Connector};

/// Owns the lifecycle of one generation request at a time.
///
/// Every mutation of [`SessionState`] happens in this type's handlers, which
/// run on the thread that owns the controller. Readers only ever get a
/// [`snapshot`](Self::snapshot).
pub struct SessionController<C: Connector> {
    connector: C,
    state: SessionState,
    session: Option<SessionId>,
    next_session: u64,
    pending_request: Option<GenerationRequest>,
    channel: Option<Box<dyn Channel>>,
}

impl<C: Connector> SessionController<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            state: SessionState::default(),
            session: None,
            next_session: 1,
            pending_request: None,
            channel: None,
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.status
    }

    #[cfg(test)]
    pub fn channel_closed(&self) -> bool {
        self.channel
            .as_ref()
            .map(|channel| channel.is_closed())
            .unwrap_or(true)
    }

    pub fn start(&mut self, request: GenerationRequest) -> Result<SessionId, SessionError> {
        if self.state.is_busy() {
            return Err(SessionError::AlreadyInProgress);
        }

        self.close_channel();

        let session = SessionId(self.next_session);
        self.next_session += 1;
        tracing::info!(
            %session,
            source_bytes = request.source_code().len(),
            prompt_bytes = request.prompt().len(),
            libraries = request.libraries().len(),
            "starting generation session"
        );

        self.session = Some(session);
        self.state = SessionState {
            status: SessionStatus::Connecting,
            ..SessionState::default()
        };
        self.pending_request = Some(request);
        self.channel = Some(self.connector.open(session));
        Ok(session)
    }

    pub fn cancel(&mut self) {
        if !self.state.is_busy() {
            return;
        }
        tracing::info!(session = ?self.session, "session cancelled by user");
        self.terminate(SessionError::Cancelled);
    }

    /// Routes a channel event to its handler. Events from any session other
    /// than the current one are stale and dropped.
    pub fn handle(&mut self, envelope: ChannelEnvelope) {
        if self.session != Some(envelope.session) {
            tracing::debug!(session = %envelope.session, "dropping event for stale session");
            return;
        }

        match envelope.event {
            ChannelEvent::Opened => self.on_open(),
            ChannelEvent::Frame(raw) => self.on_message(&raw),
            ChannelEvent::Error(message) => self.on_channel_error(message),
            ChannelEvent::Closed { code, clean } => self.on_channel_close(code, clean),
        }
    }

    pub fn on_open(&mut self) {
        if self.state.status != SessionStatus::Connecting {
            self.close_channel();
            return;
        }

        let Some(request) = self.pending_request.take() else {
            return;
        };
        let frame = match request.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.terminate(SessionError::from(err));
                return;
            }
        };

        let sent = match self.channel.as_mut() {
            Some(channel) => channel.send(frame),
            None => Err(SessionError::Connection("channel is closed".to_string())),
        };
        match sent {
            Ok(()) => {
                self.state.status = SessionStatus::Awaiting;
                tracing::debug!(session = ?self.session, "request sent, awaiting updates");
            }
            Err(err) => self.terminate(err),
        }
    }

    pub fn on_message(&mut self, raw: &str) {
        if self.state.is_terminal() {
            tracing::debug!(session = ?self.session, "frame after terminal status ignored");
            return;
        }

        let updates = match protocol::decode(raw) {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(session = ?self.session, error = %err, "failed to decode frame");
                self.terminate(SessionError::from(err));
                return;
            }
        };

        for update in updates {
            if let InboundMessage::ErrorUpdate { text } = &update {
                tracing::warn!(session = ?self.session, error = %text, "server reported error");
            } else {
                tracing::trace!(session = ?self.session, kind = update.kind(), "folding update");
            }

            if !self.state.fold(update) {
                self.state.status = SessionStatus::Completed;
                tracing::info!(session = ?self.session, "generation completed");
                self.close_channel();
                return;
            }
        }
    }

    pub fn on_channel_error(&mut self, message: String) {
        if self.state.is_terminal() {
            self.close_channel();
            return;
        }
        tracing::warn!(session = ?self.session, error = %message, "channel error");
        self.terminate(SessionError::Connection(message));
    }

    pub fn on_channel_close(&mut self, code: u16, clean: bool) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!(
            session = ?self.session,
            code,
            clean,
            normal = code == NORMAL_CLOSURE,
            "channel closed before completion"
        );
        self.terminate(SessionError::unexpected_close(code, clean));
    }

    fn terminate(&mut self, error: SessionError) {
        debug_assert!(error.is_terminal());
        self.close_channel();
        self.pending_request = None;
        self.state.fail(&error);
    }

    fn close_channel(&mut self) {
        if let Some(channel) = self.channel.as_mut() {
            channel.close();
        }
    }
}

impl<C: Connector> Drop for SessionController<C> {
    fn drop(&mut self) {
        self.close_channel();
    }
}
