// ── Synchronization engine ──
//
// Full lifecycle management for one openHAB server connection. Loads the
// item catalog, polls watched items, bridges WebSocket state events into
// the registry, and routes outbound writes through a single command
// processor. Poll, push and command paths all funnel into
// `ItemRegistry::update_state`.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use bytes::Bytes;
use futures_util::future::join_all;
use habsync_api::websocket::push_url;
use habsync_api::{ItemStateEvent, PushConfig, RestClient, WebSocketHandle};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::command::{self, Command, CommandEnvelope, CommandResult};
use crate::config::ConnectionConfig;
use crate::error::CoreError;
use crate::model::{ChangeSource, Item};
use crate::store::{ItemGroup, ItemRegistry};
use crate::stream::{ChangeObserver, ChangeSubscription, ObserverHandle, spawn_observer};

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── EngineState ──────────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EngineState {
    Uninitialized,
    Loading,
    LoadFailed,
    Steady,
    /// Every read of the last refresh cycle failed to reach the server.
    Reconnecting {
        attempt: u32,
    },
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// The main entry point for UI layers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Construct with
/// [`new`](Self::new), then call [`initialize`](Self::initialize) to load
/// the catalog and start background tasks.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: Arc<ItemRegistry>,
    state: watch::Sender<EngineState>,
    /// Present while the engine is initialized.
    session: ArcSwapOption<Session>,
    lifecycle: Mutex<Lifecycle>,
    /// Parent of every subscription; replaced by `shutdown`.
    subscribers: ArcSwap<CancellationToken>,
}

/// Everything tied to one successful `initialize`.
struct Session {
    config: ConnectionConfig,
    client: RestClient,
    command_tx: mpsc::Sender<CommandEnvelope>,
}

#[derive(Default)]
struct Lifecycle {
    cancel: CancellationToken,
    task_handles: Vec<JoinHandle<()>>,
    push: Option<WebSocketHandle>,
}

impl SyncEngine {
    /// Create an engine with an empty registry. Does NOT connect.
    pub fn new() -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);

        Self {
            inner: Arc::new(EngineInner {
                registry: Arc::new(ItemRegistry::new()),
                state,
                session: ArcSwapOption::empty(),
                lifecycle: Mutex::new(Lifecycle::default()),
                subscribers: ArcSwap::from_pointee(CancellationToken::new()),
            }),
        }
    }

    /// Access the underlying registry.
    pub fn registry(&self) -> &Arc<ItemRegistry> {
        &self.inner.registry
    }

    /// Configuration of the current session, if initialized.
    pub fn config(&self) -> Option<ConnectionConfig> {
        self.inner.session.load_full().map(|s| s.config.clone())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Load the item catalog and start background tasks.
    ///
    /// Stops any previous session first, so calling this again is the
    /// retry and reconfiguration path. On failure the engine enters
    /// [`LoadFailed`](EngineState::LoadFailed) with an empty registry.
    /// An invalid configuration is rejected up front and leaves the
    /// running session untouched. Returns the number of items loaded.
    pub async fn initialize(&self, config: ConnectionConfig) -> Result<usize, CoreError> {
        config.validate()?;

        let mut lifecycle = self.inner.lifecycle.lock().await;
        self.inner.state.send_replace(EngineState::Loading);

        stop_tasks(&mut lifecycle).await;
        self.inner.session.store(None);

        let loaded = async {
            let client = RestClient::new(config.url.clone(), &config.transport())?;
            let items = client.list_items().await?;
            Ok::<_, habsync_api::Error>((client, items))
        }
        .await;

        let (client, descriptors) = match loaded {
            Ok(ok) => ok,
            Err(e) => {
                self.inner.registry.clear();
                self.inner.state.send_replace(EngineState::LoadFailed);
                warn!(url = %config.url, error = %e, "item catalog load failed");
                return Err(e.into());
            }
        };

        let count = self
            .inner
            .registry
            .load(descriptors.into_iter().map(Item::from).collect());

        // Spawn background tasks
        let cancel = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let session = Arc::new(Session {
            config,
            client,
            command_tx,
        });

        lifecycle.task_handles.push(tokio::spawn(command_processor_task(
            self.clone(),
            Arc::clone(&session),
            command_rx,
            cancel.clone(),
        )));
        lifecycle.task_handles.push(tokio::spawn(poll_task(
            self.clone(),
            Arc::clone(&session),
            cancel.clone(),
        )));

        if session.config.push_enabled {
            match start_push(&session.config, &cancel) {
                Ok(handle) => {
                    lifecycle.task_handles.push(tokio::spawn(push_bridge_task(
                        Arc::clone(&self.inner.registry),
                        handle.subscribe(),
                        cancel.clone(),
                    )));
                    lifecycle.push = Some(handle);
                }
                Err(e) => warn!(error = %e, "push updates unavailable, polling only"),
            }
        }

        info!(url = %session.config.url, items = count, "item catalog loaded");
        self.inner.session.store(Some(session));
        lifecycle.cancel = cancel;
        self.inner.state.send_replace(EngineState::Steady);
        Ok(count)
    }

    /// Stop all background tasks and end every subscription.
    ///
    /// The registry keeps its last contents for inspection.
    pub async fn shutdown(&self) {
        let mut lifecycle = self.inner.lifecycle.lock().await;
        stop_tasks(&mut lifecycle).await;
        self.inner.session.store(None);
        self.inner
            .subscribers
            .swap(Arc::new(CancellationToken::new()))
            .cancel();
        self.inner.state.send_replace(EngineState::Uninitialized);
        debug!("engine shut down");
    }

    // ── State observation ────────────────────────────────────────────

    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    /// Subscribe to lifecycle state changes.
    pub fn state_changes(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    /// Lifecycle state changes as a `Stream`, starting with the current one.
    pub fn state_stream(&self) -> WatchStream<EngineState> {
        WatchStream::new(self.inner.state.subscribe())
    }

    /// Whether the WebSocket event stream is currently connected.
    pub async fn push_connected(&self) -> bool {
        self.inner
            .lifecycle
            .lock()
            .await
            .push
            .as_ref()
            .is_some_and(WebSocketHandle::is_connected)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to item change events.
    pub fn subscribe(&self) -> ChangeSubscription {
        ChangeSubscription::new(
            self.inner.registry.subscribe(),
            self.inner.subscribers.load().child_token(),
        )
    }

    /// Run `observer` for every change on its own task.
    pub fn observe<O: ChangeObserver>(&self, observer: O) -> ObserverHandle {
        spawn_observer(self.subscribe(), observer)
    }

    // ── Watching ─────────────────────────────────────────────────────

    /// Include an item in the refresh cycle. Returns whether it is known.
    pub fn set_watched(&self, link: &str) -> bool {
        self.inner.registry.set_watched(link)
    }

    /// Remove an item from the refresh cycle. Returns whether it is known.
    pub fn unwatch(&self, link: &str) -> bool {
        self.inner.registry.unwatch(link)
    }

    // ── Read views ───────────────────────────────────────────────────

    pub fn items(&self) -> Vec<Item> {
        self.inner.registry.all()
    }

    pub fn find(&self, link: &str) -> Option<Item> {
        self.inner.registry.find(link)
    }

    pub fn cached_state(&self, link: &str) -> Option<String> {
        self.inner.registry.find(link).and_then(|item| item.state)
    }

    pub fn label(&self, link: &str) -> Option<String> {
        self.inner.registry.find(link).map(|item| item.label)
    }

    /// Cached state rendered through the item's display pattern.
    pub fn display_state(&self, link: &str) -> Option<String> {
        self.inner
            .registry
            .find(link)
            .map(|item| item.display_state())
    }

    /// Items matching `predicate`, grouped for display.
    pub fn grouped_catalog(&self, predicate: impl Fn(&Item) -> bool) -> Vec<ItemGroup> {
        self.inner.registry.grouped(predicate)
    }

    /// Fetch the icon for an item's category in its cached state.
    ///
    /// Items without a category yield empty bytes.
    pub async fn icon(&self, link: &str) -> Result<Bytes, CoreError> {
        let session = self.session()?;
        let item = self.require_item(link)?;
        let state = item.state.as_deref().unwrap_or_default();
        Ok(session
            .client
            .fetch_icon(item.category.as_deref(), state)
            .await?)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Set an item's state.
    ///
    /// The cache is updated before the write is sent, then reconciled with
    /// the state the server confirms. A failed write is returned as is;
    /// the optimistic value stays until the next refresh corrects it.
    pub async fn send_state(&self, link: &str, value: &str) -> Result<String, CoreError> {
        let session = self.session()?;
        self.require_item(link)?;

        self.inner
            .registry
            .update_state(link, value, ChangeSource::Command);

        let result = self
            .execute(
                &session,
                Command::SetState {
                    link: link.to_owned(),
                    value: value.to_owned(),
                },
            )
            .await?;
        Ok(result.state)
    }

    /// Flip an item with the default toggle semantics.
    pub async fn toggle_state(&self, link: &str) -> Result<String, CoreError> {
        self.toggle_state_with(link, command::toggled_value).await
    }

    /// Flip an item with a caller-supplied toggle function.
    pub async fn toggle_state_with<F>(&self, link: &str, toggle: F) -> Result<String, CoreError>
    where
        F: FnOnce(&Item) -> Result<String, CoreError>,
    {
        self.session()?;
        let item = self.require_item(link)?;
        let value = toggle(&item)?;
        self.send_state(link, &value).await
    }

    /// Add `delta` to the item's numeric state, clamped to `[min, max]`.
    pub async fn adjust_state(
        &self,
        link: &str,
        delta: f64,
        min: f64,
        max: f64,
    ) -> Result<String, CoreError> {
        self.session()?;
        let item = self.require_item(link)?;
        let value = command::adjusted_value(&item, delta, min, max)?;
        self.send_state(link, &value).await
    }

    /// Re-read one item now, outside the refresh cycle.
    pub async fn refresh_state(&self, link: &str) -> Result<String, CoreError> {
        let session = self.session()?;
        self.require_item(link)?;
        let result = self
            .execute(
                &session,
                Command::ReadState {
                    link: link.to_owned(),
                },
            )
            .await?;
        Ok(result.state)
    }

    /// Send a command to the processor task and await the result.
    async fn execute(&self, session: &Session, cmd: Command) -> Result<CommandResult, CoreError> {
        let (tx, rx) = oneshot::channel();

        session
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::NotInitialized)?;

        rx.await.map_err(|_| CoreError::NotInitialized)?
    }

    // ── Helpers ──────────────────────────────────────────────────────

    fn session(&self) -> Result<Arc<Session>, CoreError> {
        self.inner
            .session
            .load_full()
            .ok_or(CoreError::NotInitialized)
    }

    fn require_item(&self, link: &str) -> Result<Item, CoreError> {
        self.inner
            .registry
            .find(link)
            .ok_or_else(|| CoreError::NotFound {
                identifier: link.to_owned(),
            })
    }

    /// Move between `Steady` and `Reconnecting` after a refresh cycle.
    fn record_reachability(&self, reachable: bool) {
        self.inner.state.send_if_modified(|state| match (*state, reachable) {
            (EngineState::Reconnecting { attempt }, true) => {
                info!(attempts = attempt, "server reachable again");
                *state = EngineState::Steady;
                true
            }
            (EngineState::Steady, false) => {
                warn!("server unreachable, polling continues");
                *state = EngineState::Reconnecting { attempt: 1 };
                true
            }
            (EngineState::Reconnecting { attempt }, false) => {
                *state = EngineState::Reconnecting {
                    attempt: attempt.saturating_add(1),
                };
                true
            }
            _ => false,
        });
    }
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Cancel and join everything owned by the current session.
async fn stop_tasks(lifecycle: &mut Lifecycle) {
    lifecycle.cancel.cancel();

    for handle in lifecycle.task_handles.drain(..) {
        if let Err(e) = handle.await {
            warn!(error = %e, "background task ended abnormally");
        }
    }
    if let Some(push) = lifecycle.push.take() {
        push.close().await;
    }
}

/// Open the WebSocket event stream for `config`'s server.
fn start_push(
    config: &ConnectionConfig,
    cancel: &CancellationToken,
) -> Result<WebSocketHandle, CoreError> {
    let url = push_url(&config.url)?;
    let push = PushConfig {
        heartbeat_interval: config.heartbeat_interval,
        reconnect: config.reconnect.clone(),
        ..PushConfig::default()
    };
    debug!(url = %url, "starting push updates");
    Ok(WebSocketHandle::connect(
        url,
        push,
        cancel.child_token(),
        config.transport().bearer(),
    )?)
}

/// Periodically re-read every watched item.
async fn poll_task(engine: SyncEngine, session: Arc<Session>, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(session.config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = poll_cycle(&engine, &session) => {}
                }
            }
        }
    }
}

/// One refresh cycle over the watched items.
async fn poll_cycle(engine: &SyncEngine, session: &Session) {
    let registry = &engine.inner.registry;
    let links = registry.watched_links();
    if links.is_empty() {
        trace!("no watched items");
        return;
    }

    let reads = links.iter().map(|link| async move {
        (link.as_str(), session.client.read_state(link).await)
    });
    let results = join_all(reads).await;

    let mut succeeded = 0usize;
    let mut unreachable = 0usize;
    for (link, result) in &results {
        match result {
            Ok(state) => {
                succeeded += 1;
                registry.update_state(link, state, ChangeSource::Poll);
            }
            Err(e) => {
                if e.is_unreachable() {
                    unreachable += 1;
                }
                warn!(link, error = %e, "state read failed, retrying next cycle");
            }
        }
    }

    if succeeded > 0 {
        engine.record_reachability(true);
    } else if unreachable == results.len() {
        engine.record_reachability(false);
    }
    trace!(watched = results.len(), succeeded, "refresh cycle complete");
}

/// Apply WebSocket state events to watched items.
async fn push_bridge_task(
    registry: Arc<ItemRegistry>,
    mut rx: broadcast::Receiver<Arc<ItemStateEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(event) => apply_push(&registry, &event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "push bridge lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

fn apply_push(registry: &ItemRegistry, event: &ItemStateEvent) {
    let Some(item) = registry.find_by_id(&event.item) else {
        trace!(item = %event.item, "push event for unknown item");
        return;
    };
    if !item.watched {
        trace!(item = %event.item, "push event for unwatched item");
        return;
    }
    registry.update_state(&item.link, &event.value, ChangeSource::Push);
}

/// Process commands from the mpsc channel in submission order.
async fn command_processor_task(
    engine: SyncEngine,
    session: Arc<Session>,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    result = route_command(&engine, &session, envelope.command) => {
                        let _ = envelope.response_tx.send(result);
                    }
                }
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────────

async fn route_command(
    engine: &SyncEngine,
    session: &Session,
    cmd: Command,
) -> Result<CommandResult, CoreError> {
    let registry = &engine.inner.registry;

    match cmd {
        Command::SetState { link, value } => {
            let confirmed = session.client.write_state(&link, &value).await?;
            if confirmed != value {
                debug!(link, sent = %value, confirmed = %confirmed, "server adjusted value");
            }
            registry.update_state(&link, &confirmed, ChangeSource::Confirmation);
            Ok(CommandResult {
                link,
                state: confirmed,
            })
        }

        Command::ReadState { link } => {
            let state = session.client.read_state(&link).await?;
            registry.update_state(&link, &state, ChangeSource::Poll);
            Ok(CommandResult { link, state })
        }
    }
}
