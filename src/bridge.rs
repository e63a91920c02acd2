use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use url::Url;

use crate::client::{response_result, ClientError, TdClient};
use crate::td::{Request, Response, Update};

const UPDATE_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

/// Requests waiting for their response, keyed by `@extra`. Once closed, every
/// waiter is dropped and new registrations fail.
#[derive(Clone, Default)]
struct Waiters {
    inner: Arc<Mutex<WaiterTable>>,
}

#[derive(Default)]
struct WaiterTable {
    pending: HashMap<u64, oneshot::Sender<Response>>,
    closed: bool,
}

impl Waiters {
    fn register(&self, extra: u64) -> Result<oneshot::Receiver<Response>, ClientError> {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if table.closed {
            return Err(ClientError::Disconnected);
        }
        let (tx, rx) = oneshot::channel();
        table.pending.insert(extra, tx);
        Ok(rx)
    }

    fn take(&self, extra: u64) -> Option<oneshot::Sender<Response>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pending
            .remove(&extra)
    }

    fn close(&self) {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.closed = true;
        table.pending.clear();
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).closed
    }
}

/// TDLib client reached through a tdjson WebSocket bridge. One JSON object
/// per frame; requests are matched to responses by `@extra`.
pub struct BridgeClient {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    waiters: Waiters,
    next_extra: AtomicU64,
}

impl BridgeClient {
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<Update>), BridgeError> {
        let url = Url::parse(url)?;
        let (ws, _) = connect_async(url).await?;
        let (mut sink, mut stream) = ws.split();

        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel::<WsMessage>();
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let waiters = Waiters::default();

        tokio::spawn(async move {
            while let Some(message) = outgoing_rx.recv().await {
                if let Err(error) = sink.send(message).await {
                    warn!(error = %error, "Failed to write to TDLib bridge");
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_waiters = waiters.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let payload = match message {
                    Ok(WsMessage::Text(text)) => text,
                    Ok(WsMessage::Binary(data)) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => continue,
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(error) => {
                        warn!(error = %error, "TDLib bridge connection failed");
                        break;
                    }
                };

                match route_frame(&payload) {
                    Ok(Frame::Response { extra, response }) => {
                        match reader_waiters.take(extra) {
                            Some(waiter) => {
                                let _ = waiter.send(response);
                            }
                            None => debug!(extra, "Response for a request nobody is waiting on"),
                        }
                    }
                    Ok(Frame::Update(Update::Other)) => {}
                    Ok(Frame::Update(update)) => {
                        if updates_tx.send(update).await.is_err() {
                            debug!("Update receiver dropped");
                        }
                    }
                    Ok(Frame::Malformed { extra, error }) => {
                        warn!(extra, error = %error, "Undecodable TDLib response");
                        drop(reader_waiters.take(extra));
                    }
                    Err(error) => debug!(error = %error, "Skipping undecodable TDLib frame"),
                }
            }
            reader_waiters.close();
            debug!("TDLib bridge reader stopped");
        });

        let client = Self {
            outgoing,
            waiters,
            next_extra: AtomicU64::new(1),
        };
        Ok((client, updates_rx))
    }

    fn next_extra(&self) -> u64 {
        self.next_extra.fetch_add(1, Ordering::Relaxed)
    }

    fn write(&self, request: &Request, extra: u64) -> Result<(), ClientError> {
        let payload = encode_request(request, extra)?;
        self.outgoing
            .send(WsMessage::Text(payload))
            .map_err(|_| ClientError::Disconnected)
    }
}

#[async_trait]
impl TdClient for BridgeClient {
    async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let extra = self.next_extra();
        let rx = self.waiters.register(extra)?;

        if let Err(error) = self.write(&request, extra) {
            self.waiters.take(extra);
            return Err(error);
        }

        let response = rx.await.map_err(|_| ClientError::Disconnected)?;
        response_result(response)
    }

    fn post(&self, request: Request) -> Result<(), ClientError> {
        let extra = self.next_extra();
        self.write(&request, extra)
    }
}

#[derive(Debug, PartialEq)]
enum Frame {
    Response { extra: u64, response: Response },
    /// Carried an `@extra` but the body did not decode.
    Malformed { extra: u64, error: String },
    Update(Update),
}

fn encode_request(request: &Request, extra: u64) -> Result<String, serde_json::Error> {
    let mut value = serde_json::to_value(request)?;
    if let Value::Object(map) = &mut value {
        map.insert("@extra".to_string(), Value::from(extra));
    }
    serde_json::to_string(&value)
}

fn route_frame(payload: &str) -> Result<Frame, serde_json::Error> {
    let mut value: Value = serde_json::from_str(payload)?;
    let extra = value
        .as_object_mut()
        .and_then(|map| map.remove("@extra"))
        .and_then(|extra| extra.as_u64());
    match extra {
        Some(extra) => match serde_json::from_value(value) {
            Ok(response) => Ok(Frame::Response { extra, response }),
            Err(error) => Ok(Frame::Malformed {
                extra,
                error: error.to_string(),
            }),
        },
        None => Ok(Frame::Update(serde_json::from_value(value)?)),
    }
}
