use crate::client::config::ClientConfig;
use crate::client::connection::ConnectionManager;
use crate::error::{LinkError, Result};
use crate::traits::{
    ChatRuntime, KeyValueStore, NativeRuntime, Transport, TransportEvent, TransportHandle,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

enum Command {
    Frame(String),
    Close,
}

/// WebSocket transport on tokio-tungstenite.
///
/// Each `open` spawns one task on the runtime that owns the socket: it
/// performs the handshake, forwards inbound text frames and writes queued
/// outbound ones. Frames it could not write are returned as
/// [`TransportEvent::Undelivered`] before the link reports closing.
#[derive(Clone)]
pub struct WsTransport {
    runtime: Arc<dyn ChatRuntime>,
}

impl WsTransport {
    pub fn new(runtime: Arc<dyn ChatRuntime>) -> Self {
        Self { runtime }
    }
}

struct WsHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl TransportHandle for WsHandle {
    fn send(&self, frame: &str) -> Result<()> {
        self.commands
            .send(Command::Frame(frame.to_string()))
            .map_err(|_| LinkError::Closed)
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

/// Collect every frame still waiting in the command channel.
fn unsent_frames(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    mut frames: Vec<String>,
) -> Vec<String> {
    commands.close();
    while let Ok(command) = commands.try_recv() {
        if let Command::Frame(text) = command {
            frames.push(text);
        }
    }
    frames
}

impl Transport for WsTransport {
    fn open(
        &self,
        url: &str,
    ) -> Result<(
        Box<dyn TransportHandle>,
        async_channel::Receiver<TransportEvent>,
    )> {
        let url = url::Url::parse(url)?;
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
        let (tx, rx) = async_channel::unbounded();

        self.runtime.spawn(Box::pin(async move {
            tracing::debug!("[WS] Connecting to {}", url);
            let ws = match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((ws, _response)) => ws,
                Err(e) => {
                    let _ = tx.send(TransportEvent::Error(e.to_string())).await;
                    let _ = tx.send(TransportEvent::Closed).await;
                    return;
                }
            };
            let _ = tx.send(TransportEvent::Opened).await;
            let (mut write, mut read) = ws.split();
            let mut failed = Vec::new();
            let mut error = None;

            loop {
                tokio::select! {
                    command = cmd_rx.recv() => match command {
                        Some(Command::Frame(text)) => {
                            if let Err(e) = write.send(Message::Text(text.clone())).await {
                                failed.push(text);
                                error = Some(e.to_string());
                                break;
                            }
                        }
                        Some(Command::Close) | None => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = tx.send(TransportEvent::Message(text)).await;
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            tracing::trace!("[WS] Ignoring {} byte binary frame", bytes.len());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!("[WS] Server closed: {:?}", frame);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error = Some(e.to_string());
                            break;
                        }
                        None => break,
                    },
                }
            }

            let undelivered = unsent_frames(&mut cmd_rx, failed);
            if !undelivered.is_empty() {
                tracing::debug!("[WS] {} frames not written", undelivered.len());
                let _ = tx.send(TransportEvent::Undelivered(undelivered)).await;
            }
            if let Some(e) = error {
                let _ = tx.send(TransportEvent::Error(e)).await;
            }
            let _ = tx.send(TransportEvent::Closed).await;
            tracing::debug!("[WS] Socket task for {} ended", url);
        }));

        Ok((Box::new(WsHandle { commands: cmd_tx }), rx))
    }
}

/// Manager over a real WebSocket with the tokio runtime.
pub fn connect_native(
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
) -> Result<ConnectionManager> {
    config.validate()?;
    let runtime: Arc<dyn ChatRuntime> = Arc::new(NativeRuntime);
    Ok(ConnectionManager::new(
        config,
        Arc::new(WsTransport::new(runtime.clone())),
        store,
        runtime,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsent_frames_keep_order_and_close_channel() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(Command::Frame("a".into())).unwrap();
        tx.send(Command::Close).unwrap();
        tx.send(Command::Frame("b".into())).unwrap();

        let frames = unsent_frames(&mut rx, vec!["failed".into()]);
        assert_eq!(frames, vec!["failed", "a", "b"]);

        let handle = WsHandle { commands: tx };
        assert!(matches!(handle.send("late"), Err(LinkError::Closed)));
    }

    #[test]
    fn test_malformed_url_is_not_retryable() {
        let transport = WsTransport::new(Arc::new(NativeRuntime));
        match transport.open("not a url") {
            Err(e) => assert!(!e.is_retryable()),
            Ok(_) => panic!("malformed url opened"),
        }
    }
}
