//! Websocket channel to the generation service.
//!
//! Each session gets one task on the tokio runtime. The task reports what
//! happens on the socket as [`ChannelEvent`]s through the app event queue and
//! takes outbound frames and the close request from a command channel. The
//! controller on the UI thread never touches the socket directly.

use crate::event::AppEvent;
use crate::protocol::{ABNORMAL_CLOSURE, NORMAL_CLOSURE};
use crate::session::{SessionError, SessionId};
use futures_util::{SinkExt, StreamExt};
use std::sync::mpsc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc as command_mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::error::{Error as WsError, ProtocolError};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Opened,
    Frame(String),
    Error(String),
    Closed { code: u16, clean: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEnvelope {
    pub session: SessionId,
    pub event: ChannelEvent,
}

/// Opens channels for sessions. Events for the returned channel must be
/// tagged with `session`.
pub trait Connector {
    fn open(&self, session: SessionId) -> Box<dyn Channel>;
}

pub trait Channel: Send {
    fn send(&mut self, frame: String) -> Result<(), SessionError>;
    /// Idempotent.
    fn close(&mut self);
    fn is_closed(&self) -> bool;
}

#[derive(Debug)]
enum ChannelCommand {
    Send(String),
    Close,
}

#[derive(Clone)]
pub struct WsConnector {
    endpoint: String,
    connect_timeout: Duration,
    runtime_handle: Handle,
    tx: mpsc::Sender<AppEvent>,
}

impl WsConnector {
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        runtime_handle: Handle,
        tx: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout,
            runtime_handle,
            tx,
        }
    }
}

impl Connector for WsConnector {
    fn open(&self, session: SessionId) -> Box<dyn Channel> {
        let (commands_tx, commands_rx) = command_mpsc::unbounded_channel();
        let endpoint = self.endpoint.clone();
        let connect_timeout = self.connect_timeout;
        let tx = self.tx.clone();

        self.runtime_handle.spawn(async move {
            run_channel(endpoint, connect_timeout, session, commands_rx, tx).await;
        });

        Box::new(WsChannel {
            commands: commands_tx,
            closed: false,
        })
    }
}

struct WsChannel {
    commands: command_mpsc::UnboundedSender<ChannelCommand>,
    closed: bool,
}

impl Channel for WsChannel {
    fn send(&mut self, frame: String) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Connection("channel is closed".to_string()));
        }
        self.commands
            .send(ChannelCommand::Send(frame))
            .map_err(|_| SessionError::Connection("channel task has stopped".to_string()))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.commands.send(ChannelCommand::Close);
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

fn emit(tx: &mpsc::Sender<AppEvent>, session: SessionId, event: ChannelEvent) {
    let _ = tx.send(AppEvent::Channel(ChannelEnvelope { session, event }));
}

async fn run_channel(
    endpoint: String,
    connect_timeout: Duration,
    session: SessionId,
    mut commands: command_mpsc::UnboundedReceiver<ChannelCommand>,
    tx: mpsc::Sender<AppEvent>,
) {
    tracing::debug!(%session, %endpoint, "opening channel");

    // A close that arrives while connecting abandons the attempt.
    let connected = tokio::select! {
        result = timeout(connect_timeout, connect_async(endpoint.as_str())) => result,
        _ = wait_for_close(&mut commands) => {
            tracing::debug!(%session, "channel closed before open completed");
            return;
        }
    };

    let ws_stream = match connected {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(err)) => {
            emit(
                &tx,
                session,
                ChannelEvent::Error(format!("failed to connect to {endpoint}: {err}")),
            );
            return;
        }
        Err(_) => {
            emit(
                &tx,
                session,
                ChannelEvent::Error(format!(
                    "connection to {endpoint} timed out after {connect_timeout:?}"
                )),
            );
            return;
        }
    };

    tracing::info!(%session, "channel open");
    emit(&tx, session, ChannelEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(ChannelCommand::Send(frame)) => {
                    if let Err(err) = write.send(Message::Text(frame.into())).await {
                        let message = format!("failed to send frame: {err}");
                        emit(&tx, session, ChannelEvent::Error(message));
                        break;
                    }
                }
                Some(ChannelCommand::Close) | None => {
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    }));
                    let _ = write.send(close).await;
                    let _ = write.close().await;
                    tracing::debug!(%session, "channel closed by client");
                    break;
                }
            },
            incoming = read.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    emit(&tx, session, ChannelEvent::Frame(text.as_str().to_string()));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => emit(&tx, session, ChannelEvent::Frame(text)),
                    Err(_) => {
                        let message = "received non-utf8 binary frame".to_string();
                        emit(&tx, session, ChannelEvent::Error(message));
                        break;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = frame
                        .map(|frame| u16::from(frame.code))
                        .unwrap_or(NORMAL_CLOSURE);
                    emit(&tx, session, ChannelEvent::Closed { code, clean: true });
                    break;
                }
                // Pings are answered by tungstenite.
                Some(Ok(_)) => {}
                Some(Err(err)) if is_reset(&err) => {
                    emit(
                        &tx,
                        session,
                        ChannelEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            clean: false,
                        },
                    );
                    break;
                }
                Some(Err(err)) => {
                    emit(&tx, session, ChannelEvent::Error(format!("channel read failed: {err}")));
                    break;
                }
                None => {
                    emit(
                        &tx,
                        session,
                        ChannelEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            clean: false,
                        },
                    );
                    break;
                }
            },
        }
    }
}

fn is_reset(err: &WsError) -> bool {
    match err {
        WsError::ConnectionClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(err) => err.kind() == std::io::ErrorKind::ConnectionReset,
        _ => false,
    }
}

async fn wait_for_close(commands: &mut command_mpsc::UnboundedReceiver<ChannelCommand>) {
    loop {
        match commands.recv().await {
            Some(ChannelCommand::Close) | None => return,
            // Nothing can be sent before the socket exists.
            Some(ChannelCommand::Send(_)) => {}
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::{Channel, Connector};
    use crate::session::{SessionError, SessionId};
    use std::sync::{Arc, Mutex, MutexGuard};

    #[derive(Debug, Default)]
    pub struct ChannelLog {
        pub opened: Vec<SessionId>,
        pub sent: Vec<String>,
        pub closes: usize,
        pub closed: bool,
    }

    /// Records what the controller asks of its channels. Events are fed to the
    /// controller by hand.
    #[derive(Clone, Default)]
    pub struct RecordingConnector {
        log: Arc<Mutex<ChannelLog>>,
        refuse_sends: bool,
    }

    impl RecordingConnector {
        pub fn refusing_sends() -> Self {
            Self {
                refuse_sends: true,
                ..Self::default()
            }
        }

        pub fn log(&self) -> MutexGuard<'_, ChannelLog> {
            self.log.lock().expect("log lock should not be poisoned")
        }
    }

    struct RecordingChannel {
        log: Arc<Mutex<ChannelLog>>,
        refuse_sends: bool,
        closed: bool,
    }

    impl Connector for RecordingConnector {
        fn open(&self, session: SessionId) -> Box<dyn Channel> {
            let mut log = self.log();
            log.opened.push(session);
            log.closed = false;
            Box::new(RecordingChannel {
                log: Arc::clone(&self.log),
                refuse_sends: self.refuse_sends,
                closed: false,
            })
        }
    }

    impl Channel for RecordingChannel {
        fn send(&mut self, frame: String) -> Result<(), SessionError> {
            if self.refuse_sends || self.closed {
                return Err(SessionError::Connection("send refused".to_string()));
            }
            self.log
                .lock()
                .expect("log lock should not be poisoned")
                .sent
                .push(frame);
            Ok(())
        }

        fn close(&mut self) {
            if self.closed {
                return;
            }
            self.closed = true;
            let mut log = self.log.lock().expect("log lock should not be poisoned");
            log.closes += 1;
            log.closed = true;
        }

        fn is_closed(&self) -> bool {
            self.closed
        }
    }
}
