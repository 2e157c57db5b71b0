use crate::types::Severity;
use axum::extract::ws::{Message, WebSocket};
use chrono::Utc;
use futures_util::sink::Sink;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 256;

pub const ALERT_CREATED: &str = "alert_created";

/// One serialized `{type, data, timestamp}` envelope, shared by every
/// subscriber.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: String,
    /// Set for alert frames so sockets can apply the user's classification
    pub severity: Option<Severity>,
    pub text: Arc<str>,
}

impl Frame {
    fn deliverable_to(&self, threshold: Severity) -> bool {
        match (self.kind.as_str(), self.severity) {
            (ALERT_CREATED, Some(severity)) => severity.notifies(threshold),
            _ => true,
        }
    }
}

/// In-memory fan-out to every open WebSocket.
#[derive(Clone)]
pub struct Hub {
    tx: broadcast::Sender<Frame>,
    connections: Arc<AtomicUsize>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            connections: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Push `{type, data, timestamp}` to all sockets. Returns how many
    /// subscribers were reached; zero when nobody is connected.
    pub fn broadcast<T: Serialize>(&self, kind: &str, data: &T) -> usize {
        let data = match serde_json::to_value(data) {
            Ok(v) => v,
            Err(e) => {
                warn!(kind, error = %e, "Failed to serialize broadcast payload");
                return 0;
            }
        };
        let severity = data
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
        let envelope = json!({
            "type": kind,
            "data": data,
            "timestamp": Utc::now().to_rfc3339(),
        });

        let frame = Frame {
            kind: kind.to_string(),
            severity,
            text: Arc::from(envelope.to_string()),
        };
        self.tx.send(frame).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Frame> {
        self.tx.subscribe()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    /// Pump broadcast frames into `socket` until either side goes away.
    ///
    /// `access` carries the user's current alert classification; alert
    /// frames below it are skipped. When it turns `None` the user lost
    /// access and the socket is closed.
    pub async fn serve_socket(
        &self,
        socket: WebSocket,
        user: String,
        mut access: watch::Receiver<Option<Severity>>,
    ) {
        let _guard = ConnectionGuard::new(self.connections.clone());
        info!(%user, connections = self.connection_count(), "WebSocket connected");

        let (mut sender, mut receiver) = socket.split();
        let mut rx = self.subscribe();

        let mut send_task = tokio::spawn(async move {
            forward_frames(&mut sender, &mut rx, &mut access).await;
        });

        // Clients only listen; inbound frames are drained until close.
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        info!(%user, "WebSocket disconnected");
    }
}

/// Forward frames from `rx` to `sink` until the sink fails, the hub goes
/// away or `access` is revoked. Access changes win over pending frames.
async fn forward_frames<S>(
    sink: &mut S,
    rx: &mut broadcast::Receiver<Frame>,
    access: &mut watch::Receiver<Option<Severity>>,
) where
    S: Sink<Message> + Unpin,
{
    loop {
        let current = *access.borrow_and_update();
        let Some(threshold) = current else {
            debug!("WebSocket access revoked");
            let _ = sink.send(Message::Close(None)).await;
            return;
        };

        tokio::select! {
            biased;

            changed = access.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            frame = rx.recv() => match frame {
                Ok(frame) => {
                    if !frame.deliverable_to(threshold) {
                        continue;
                    }
                    if sink
                        .send(Message::Text(frame.text.as_ref().into()))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "WebSocket subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

struct ConnectionGuard(Arc<AtomicUsize>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}
