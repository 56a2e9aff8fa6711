//! Unix domain socket server for IPC
//!
//! Provides request-response communication with the lock controller and push
//! notifications of lock and overlay events to subscribed clients.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::events::LockEvent;
use crate::state::{ControlCommand, LockStatus};

use super::protocol::{DaemonStatus, Notification, Request, Response};

const MAX_MESSAGE_LEN: usize = 1024 * 1024;
const OUTBOUND_BUFFER: usize = 64;

/// Everything a client handler needs
#[derive(Clone)]
struct ClientContext {
    control_tx: mpsc::Sender<ControlCommand>,
    event_tx: broadcast::Sender<LockEvent>,
    start_time: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: UnixListener,
    context: ClientContext,
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the socket; requests are forwarded to the controller behind `control_tx`
    pub fn new(
        socket_path: &Path,
        control_tx: mpsc::Sender<ControlCommand>,
        event_tx: broadcast::Sender<LockEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Set socket permissions to owner-only (0600)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener,
            context: ClientContext {
                control_tx,
                event_tx,
                start_time: Instant::now(),
            },
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = self.context.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(stream: UnixStream, context: ClientContext) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>(OUTBOUND_BUFFER);
        let writer_task = tokio::spawn(Self::write_frames(writer, out_rx));
        let mut forwarder: Option<JoinHandle<()>> = None;

        let result: Result<()> = async {
            while let Some(body) = read_frame(&mut reader).await? {
                let response = match serde_json::from_slice::<Request>(&body) {
                    Ok(request) => {
                        debug!(?request, "received request");
                        let (response, subscribe) = Self::process_request(request, &context).await;
                        if subscribe && forwarder.is_none() {
                            debug!("client subscribed to notifications");
                            forwarder = Some(tokio::spawn(Self::forward_events(
                                context.event_tx.subscribe(),
                                out_tx.clone(),
                            )));
                        }
                        response
                    }
                    Err(e) => {
                        warn!(%e, "malformed request");
                        Response::error("bad_request", e.to_string())
                    }
                };

                if out_tx.send(encode(&response)?).await.is_err() {
                    break;
                }
            }
            debug!("client disconnected");
            Ok(())
        }
        .await;

        if let Some(forwarder) = forwarder {
            forwarder.abort();
        }
        drop(out_tx);
        let _ = writer_task.await;
        result
    }

    /// Write queued frames until every sender is gone
    async fn write_frames(mut writer: OwnedWriteHalf, mut out_rx: mpsc::Receiver<Vec<u8>>) {
        while let Some(frame) = out_rx.recv().await {
            if let Err(e) = writer.write_all(&frame).await {
                debug!(?e, "client write failed");
                break;
            }
        }
    }

    /// Push lock events to a subscribed client
    async fn forward_events(mut event_rx: broadcast::Receiver<LockEvent>, out_tx: mpsc::Sender<Vec<u8>>) {
        loop {
            let notification = match event_rx.recv().await {
                Ok(event) => Notification::Event { event },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged behind lock events");
                    Notification::Lagged { skipped }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let frame = match encode(&notification) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(?e, "failed to encode notification");
                    continue;
                }
            };
            if out_tx.send(frame).await.is_err() {
                break;
            }
        }
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, context: &ClientContext) -> (Response, bool) {
        let control_tx = &context.control_tx;

        let response = match request {
            Request::Ping => Response::Pong,

            Request::Subscribe => return (Response::Subscribed, true),

            Request::GetStatus => Self::status(context).await,

            Request::SetLocked { locked } => {
                info!(locked, "lock change requested via IPC");
                Self::command_then_status(ControlCommand::SetLocked(locked), context).await
            }

            Request::SetEffect { effect } => {
                Self::command_then_status(ControlCommand::SetEffect(effect), context).await
            }

            Request::UpdateSettings { update } => {
                Self::command_then_status(ControlCommand::UpdateSettings(update), context).await
            }

            Request::GetWordSet { kind } => {
                match query(control_tx, |reply| ControlCommand::GetWordSet { kind, reply }).await {
                    Some(set) => Response::WordSet(set),
                    None => unavailable(),
                }
            }

            Request::UpdateMainWords { words } => {
                match query(control_tx, |reply| ControlCommand::UpdateMainWords { words, reply }).await {
                    Some(count) => Response::WordsUpdated { count },
                    None => unavailable(),
                }
            }

            Request::UpdateRandomWords { words } => {
                match query(control_tx, |reply| ControlCommand::UpdateRandomWords { words, reply }).await
                {
                    Some(count) => Response::WordsUpdated { count },
                    None => unavailable(),
                }
            }
        };

        (response, false)
    }

    // Commands are applied in order, so the status reflects the change
    async fn command_then_status(command: ControlCommand, context: &ClientContext) -> Response {
        if context.control_tx.send(command).await.is_err() {
            return unavailable();
        }
        Self::status(context).await
    }

    async fn status(context: &ClientContext) -> Response {
        match query::<LockStatus>(&context.control_tx, ControlCommand::Status).await {
            Some(lock) => Response::Status(DaemonStatus {
                version: env!("CARGO_PKG_VERSION").to_string(),
                uptime_secs: context.start_time.elapsed().as_secs(),
                lock,
            }),
            None => unavailable(),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Send a command carrying a reply channel and wait for the answer
async fn query<T>(
    control_tx: &mpsc::Sender<ControlCommand>,
    make: impl FnOnce(oneshot::Sender<T>) -> ControlCommand,
) -> Option<T> {
    let (reply_tx, reply_rx) = oneshot::channel();
    control_tx.send(make(reply_tx)).await.ok()?;
    reply_rx.await.ok()
}

fn unavailable() -> Response {
    Response::error("unavailable", "lock controller is not running")
}

/// Encode a length-prefixed JSON message
fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg)?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Read one length-prefixed message; `None` on a clean disconnect
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_MESSAGE_LEN, "message too large: {len} bytes");

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::effects::LockEffect;
    use crate::intercept::HookState;
    use crate::settings::Settings;

    fn fake_status(locked: bool) -> LockStatus {
        LockStatus {
            is_locked: locked,
            permission_granted: true,
            hook_state: if locked { HookState::Active } else { HookState::Stopped },
            effect: LockEffect::None,
            degraded: None,
            keys_forwarded: 0,
            keys_dropped: 0,
            speech_dropped: 0,
            settings: Settings::default(),
        }
    }

    /// Controller stand-in that tracks the lock flag and answers status queries
    fn spawn_fake_controller(mut rx: mpsc::Receiver<ControlCommand>) -> Arc<Mutex<bool>> {
        let locked = Arc::new(Mutex::new(false));
        let state = Arc::clone(&locked);
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    ControlCommand::SetLocked(value) => *state.lock().unwrap() = value,
                    ControlCommand::Status(reply) => {
                        let _ = reply.send(fake_status(*state.lock().unwrap()));
                    }
                    ControlCommand::UpdateMainWords { words, reply } => {
                        let _ = reply.send(words.len());
                    }
                    _ => {}
                }
            }
        });
        locked
    }

    async fn request(stream: &mut UnixStream, request: &Request) -> serde_json::Value {
        stream.write_all(&encode(request).unwrap()).await.unwrap();
        receive(stream).await
    }

    async fn receive(stream: &mut UnixStream) -> serde_json::Value {
        let body = tokio::time::timeout(Duration::from_secs(5), read_frame(stream))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    async fn start() -> (tempfile::TempDir, PathBuf, broadcast::Sender<LockEvent>, Arc<Mutex<bool>>) {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("daemon.sock");
        let (control_tx, control_rx) = mpsc::channel(8);
        let (event_tx, _) = broadcast::channel(16);
        let locked = spawn_fake_controller(control_rx);

        let server = Server::new(&socket_path, control_tx, event_tx.clone()).unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        (dir, socket_path, event_tx, locked)
    }

    #[tokio::test]
    async fn test_ping_and_set_locked() {
        let (_dir, socket_path, _events, locked) = start().await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        let pong = request(&mut stream, &Request::Ping).await;
        assert_eq!(pong["type"], "pong");

        let status = request(&mut stream, &Request::SetLocked { locked: true }).await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["is_locked"], true);
        assert_eq!(status["hook_state"], "active");
        assert!(*locked.lock().unwrap());
    }

    #[tokio::test]
    async fn test_word_update_and_bad_request() {
        let (_dir, socket_path, _events, _locked) = start().await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        let updated = request(
            &mut stream,
            &Request::UpdateMainWords {
                words: vec![crate::words::WordPair::new("cat", "Katze")],
            },
        )
        .await;
        assert_eq!(updated["type"], "words_updated");
        assert_eq!(updated["count"], 1);

        let body = br#"{"type":"launch_rockets"}"#;
        let mut frame = (body.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(body);
        stream.write_all(&frame).await.unwrap();
        let error = receive(&mut stream).await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let (_dir, socket_path, events, _locked) = start().await;
        let mut stream = UnixStream::connect(&socket_path).await.unwrap();

        let subscribed = request(&mut stream, &Request::Subscribe).await;
        assert_eq!(subscribed["type"], "subscribed");

        // The forwarder subscribes right after the reply is queued
        tokio::time::timeout(Duration::from_secs(5), async {
            while events.receiver_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        events.send(LockEvent::Unlocked).unwrap();
        let note = receive(&mut stream).await;
        assert_eq!(note["type"], "event");
        assert_eq!(note["event"]["type"], "unlocked");
    }
}
