//! WebSocket item-state stream with keepalive and auto-reconnect.
//!
//! Connects to the openHAB `/ws` endpoint and streams parsed item-state
//! events through a [`tokio::sync::broadcast`] channel. A heartbeat frame
//! is sent on a fixed interval; a failed send drops the connection and the
//! loop reconnects with exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use habsync_api::websocket::{PushConfig, WebSocketHandle, push_url};
//! use tokio_util::sync::CancellationToken;
//!
//! let ws_url = push_url(&"http://openhab.local:8080".parse()?)?;
//! let handle = WebSocketHandle::connect(ws_url, PushConfig::default(), CancellationToken::new(), None)?;
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{} = {}", event.item, event.value);
//! }
//!
//! handle.close().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_core::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::Error;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Envelope `type` of the frames we act on.
const ITEM_STATE_EVENT: &str = "ItemStateEvent";

const HEARTBEAT_TOPIC: &str = "openhab/websocket/heartbeat";

// ── ItemStateEvent ───────────────────────────────────────────────────

/// A state update for one item, parsed from a WebSocket frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStateEvent {
    /// Topic namespace, normally `"openhab"`.
    pub namespace: String,

    /// Item name (the catalog's `name`, not its link).
    pub item: String,

    /// New raw state, e.g. `"ON"` or `"5 MB/s"`.
    pub value: String,

    /// openHAB state type (`"OnOff"`, `"Quantity"`, ...), if reported.
    #[serde(default)]
    pub value_type: Option<String>,
}

// ── Configuration ────────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

/// Push connection tuning.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Interval between heartbeat frames. Default: 5s.
    pub heartbeat_interval: Duration,

    /// How long to wait for the server to acknowledge our close frame.
    pub close_timeout: Duration,

    /// `source` field of outbound heartbeat frames.
    pub source: String,

    pub reconnect: ReconnectConfig,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(5),
            close_timeout: Duration::from_secs(5),
            source: "habsync".into(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

/// Derive the push endpoint from the server base URL.
///
/// `http://host:8080` becomes `ws://host:8080/ws`, `https://` becomes
/// `wss://`. Any path prefix on the base URL is kept.
pub fn push_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => {
            return Err(Error::WebSocketConnect(format!(
                "unsupported base URL scheme '{other}'"
            )));
        }
    };

    let rest = &base.as_str()[base.scheme().len()..];
    let full = format!("{scheme}{}/ws", rest.trim_end_matches('/'));
    Ok(Url::parse(&full)?)
}

// ── WebSocketHandle ──────────────────────────────────────────────────

/// Handle to a running WebSocket event stream.
///
/// Call [`shutdown`](Self::shutdown) to signal the background task, or
/// [`close`](Self::close) to signal it and wait for the close handshake.
pub struct WebSocketHandle {
    event_rx: broadcast::Receiver<Arc<ItemStateEvent>>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WebSocketHandle {
    /// Spawn the connection loop for `ws_url`.
    ///
    /// Returns immediately once the background task is spawned. The first
    /// connection attempt happens asynchronously. `bearer`, if provided, is
    /// sent as the `Authorization` header of the upgrade request.
    pub fn connect(
        ws_url: Url,
        config: PushConfig,
        cancel: CancellationToken,
        bearer: Option<String>,
    ) -> Result<Self, Error> {
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(Error::WebSocketConnect(format!(
                "not a WebSocket URL: {ws_url}"
            )));
        }
        if config.heartbeat_interval.is_zero() {
            return Err(Error::WebSocketConnect(
                "heartbeat interval must be greater than zero".into(),
            ));
        }

        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (connected_tx, connected) = watch::channel(false);

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            ws_loop(ws_url, event_tx, connected_tx, config, task_cancel, bearer).await;
        });

        Ok(Self {
            event_rx,
            connected,
            cancel,
            task,
        })
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// If a consumer falls behind, it receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ItemStateEvent>> {
        self.event_rx.resubscribe()
    }

    /// A lazy, unbounded stream of events received from now on.
    ///
    /// Each call starts a fresh stream; lagged gaps are skipped. The stream
    /// ends when the background task exits.
    pub fn stream(&self) -> impl Stream<Item = Arc<ItemStateEvent>> + Send + use<> {
        let mut rx = self.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "push stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    /// Whether a WebSocket connection is currently established.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Watch connection up/down transitions.
    pub fn connection(&self) -> watch::Receiver<bool> {
        self.connected.clone()
    }

    /// Signal the background task to shut down gracefully.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Shut down and wait for the close handshake to finish.
    ///
    /// Bounded by the configured close timeout.
    pub async fn close(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "WebSocket task ended abnormally");
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on error, backoff → reconnect.
///
/// Cancellation is observed inside `connect_and_read` so an open
/// connection always gets a chance to send its close frame.
async fn ws_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<Arc<ItemStateEvent>>,
    connected: watch::Sender<bool>,
    config: PushConfig,
    cancel: CancellationToken,
    bearer: Option<String>,
) {
    let mut attempt: u32 = 0;

    while !cancel.is_cancelled() {
        let result = connect_and_read(
            &ws_url,
            &event_tx,
            &connected,
            &config,
            &cancel,
            bearer.as_deref(),
        )
        .await;
        connected.send_replace(false);

        if cancel.is_cancelled() {
            break;
        }

        match result {
            // Clean disconnect (server close frame or stream ended).
            Ok(()) => {
                info!("WebSocket disconnected cleanly, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                warn!(error = %e, attempt, "WebSocket error");

                if let Some(max) = config.reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &config.reconnect);
                info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single WebSocket connection and pump it until it drops.
///
/// Sends a heartbeat on every tick; a failed heartbeat is returned as an
/// error so the caller reconnects.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<Arc<ItemStateEvent>>,
    connected: &watch::Sender<bool>,
    config: &PushConfig,
    cancel: &CancellationToken,
    bearer: Option<&str>,
) -> Result<(), Error> {
    info!(url = %url, "Connecting to WebSocket");

    let uri: tungstenite::http::Uri = url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(value) = bearer {
        request = request.with_header("Authorization", value);
    }

    let connect = tokio_tungstenite::connect_async(request);
    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = connect => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
    };

    info!("WebSocket connected");
    connected.send_replace(true);

    let (mut write, mut read) = ws_stream.split();

    let mut heartbeat = tokio::time::interval(config.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    heartbeat.tick().await; // consume the immediate first tick

    let heartbeat_text = heartbeat_frame(&config.source);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                close_gracefully(&mut write, &mut read, config.close_timeout).await;
                return Ok(());
            }
            _ = heartbeat.tick() => {
                write
                    .send(Message::text(heartbeat_text.clone()))
                    .await
                    .map_err(|e| Error::WebSocketSend(e.to_string()))?;
                trace!("heartbeat sent");
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        parse_and_broadcast(&text, event_tx);
                    }
                    Some(Ok(Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        trace!("WebSocket ping");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            info!("WebSocket close frame received (no payload)");
                        }
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        info!("WebSocket stream ended");
                        return Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

/// Send a normal-closure frame and wait (bounded) for the peer's answer.
async fn close_gracefully<W, R>(write: &mut W, read: &mut R, timeout: Duration)
where
    W: Sink<Message> + Unpin,
    W::Error: std::fmt::Display,
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };

    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "could not send close frame");
        return;
    }

    let acknowledged = tokio::time::timeout(timeout, async {
        while let Some(msg) = read.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    })
    .await;

    match acknowledged {
        Ok(()) => debug!("WebSocket closed"),
        Err(_) => warn!(
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "WebSocket close not acknowledged"
        ),
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Envelope openHAB sends over the WebSocket.
///
/// `payload` is itself JSON-encoded text.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    payload: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatePayload {
    #[serde(rename = "type", default)]
    value_type: Option<String>,
    value: serde_json::Value,
}

/// Split `<ns>/items/<id>/state` into `(ns, id)`.
fn parse_state_topic(topic: &str) -> Option<(&str, &str)> {
    let mut parts = topic.split('/');
    let (Some(ns), Some("items"), Some(item), Some("state"), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };

    if ns.is_empty() || item.is_empty() {
        return None;
    }
    Some((ns, item))
}

/// Parse one text frame. Returns `None` for anything that is not a
/// well-formed item state event.
fn parse_frame(text: &str) -> Option<ItemStateEvent> {
    let envelope: WsEnvelope = match serde_json::from_str(text) {
        Ok(e) => e,
        Err(e) => {
            debug!(error = %e, "Failed to parse WebSocket envelope");
            return None;
        }
    };

    if envelope.kind != ITEM_STATE_EVENT {
        trace!(kind = %envelope.kind, "ignoring frame");
        return None;
    }

    let topic = envelope.topic?;
    let Some((namespace, item)) = parse_state_topic(&topic) else {
        trace!(topic = %topic, "ignoring non-state topic");
        return None;
    };

    let payload: StatePayload = match serde_json::from_str(envelope.payload.as_deref()?) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, item, "Failed to parse state payload");
            return None;
        }
    };

    let value = match payload.value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => return None,
        other => other.to_string(),
    };

    Some(ItemStateEvent {
        namespace: namespace.to_owned(),
        item: item.to_owned(),
        value,
        value_type: payload.value_type,
    })
}

/// Parse a WebSocket text frame and broadcast it if meaningful.
fn parse_and_broadcast(text: &str, event_tx: &broadcast::Sender<Arc<ItemStateEvent>>) {
    if let Some(event) = parse_frame(text) {
        // Ignore send errors -- just means no active subscribers right now
        let _ = event_tx.send(Arc::new(event));
    }
}

/// The application-level heartbeat openHAB expects from clients.
fn heartbeat_frame(source: &str) -> String {
    serde_json::json!({
        "type": "WebSocketEvent",
        "topic": HEARTBEAT_TOPIC,
        "payload": "PING",
        "source": source,
    })
    .to_string()
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
