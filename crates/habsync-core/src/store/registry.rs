// ── Item registry ──
//
// Canonical set of known items and their last-known state. The table is
// swapped atomically on reload; per-item mutations go through `DashMap`
// shard locks, and the change event for a transition is published while
// that lock is held so one item's events leave in detection order.
// Watch-flag changes and reloads are serialized by `reload`, so a flag set
// while a new table is being built is never lost.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, trace, warn};

use crate::model::{ChangeEvent, ChangeSource, Item, ItemKind};

const CHANGE_CHANNEL_SIZE: usize = 1024;

/// One loaded catalog. Never mutated structurally after construction.
#[derive(Default)]
struct ItemTable {
    items: DashMap<String, Item>,
    /// Item name → link.
    by_id: HashMap<String, String>,
    /// Links in catalog order.
    order: Vec<String>,
}

/// Thread-safe item store with change notification.
pub struct ItemRegistry {
    table: ArcSwap<ItemTable>,
    /// Held exclusively by `load`, shared by watch-flag changes.
    reload: RwLock<()>,
    change_tx: broadcast::Sender<Arc<ChangeEvent>>,
    last_load: watch::Sender<Option<DateTime<Utc>>>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        let (last_load, _) = watch::channel(None);

        Self {
            table: ArcSwap::from_pointee(ItemTable::default()),
            reload: RwLock::new(()),
            change_tx,
            last_load,
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Replace the whole item set. Readers see the old or the new set,
    /// never a mix.
    ///
    /// Duplicate links keep the first occurrence. Watch flags survive for
    /// links present in both sets. Returns the number of items loaded.
    pub fn load(&self, items: Vec<Item>) -> usize {
        let _reload = self.reload.write().unwrap_or_else(PoisonError::into_inner);
        let previous = self.table.load();
        let table_items = DashMap::with_capacity(items.len());
        let mut by_id = HashMap::with_capacity(items.len());
        let mut order = Vec::with_capacity(items.len());

        for mut item in items {
            if table_items.contains_key(&item.link) {
                warn!(link = %item.link, "duplicate item link in catalog, skipping");
                continue;
            }
            item.watched = previous
                .items
                .get(&item.link)
                .is_some_and(|old| old.watched);
            by_id.entry(item.id.clone()).or_insert_with(|| item.link.clone());
            order.push(item.link.clone());
            table_items.insert(item.link.clone(), item);
        }

        let count = order.len();
        self.table.store(Arc::new(ItemTable {
            items: table_items,
            by_id,
            order,
        }));
        self.last_load.send_replace(Some(Utc::now()));
        debug!(items = count, "item registry loaded");
        count
    }

    /// Drop every item.
    pub fn clear(&self) {
        self.table.store(Arc::new(ItemTable::default()));
        self.last_load.send_replace(None);
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn find(&self, link: &str) -> Option<Item> {
        self.table.load().items.get(link).map(|e| e.value().clone())
    }

    pub fn find_by_id(&self, id: &str) -> Option<Item> {
        let table = self.table.load();
        let link = table.by_id.get(id)?;
        table.items.get(link).map(|e| e.value().clone())
    }

    pub fn contains(&self, link: &str) -> bool {
        self.table.load().items.contains_key(link)
    }

    pub fn len(&self) -> usize {
        self.table.load().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All items in catalog order.
    pub fn all(&self) -> Vec<Item> {
        self.collect(|_| true)
    }

    pub fn watched(&self) -> Vec<Item> {
        self.collect(|item| item.watched)
    }

    pub fn by_kind(&self, kind: &ItemKind) -> Vec<Item> {
        self.collect(|item| &item.kind == kind)
    }

    /// Links of watched items, in catalog order.
    pub fn watched_links(&self) -> Vec<String> {
        let table = self.table.load();
        table
            .order
            .iter()
            .filter(|link| table.items.get(*link).is_some_and(|e| e.watched))
            .cloned()
            .collect()
    }

    /// Items matching `predicate`, in catalog order.
    pub(crate) fn collect(&self, predicate: impl Fn(&Item) -> bool) -> Vec<Item> {
        let table = self.table.load();
        table
            .order
            .iter()
            .filter_map(|link| table.items.get(link))
            .filter(|e| predicate(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Mark an item as watched so the refresh cycle polls it.
    ///
    /// Idempotent. Unknown links are logged and ignored; returns whether
    /// the link is known.
    pub fn set_watched(&self, link: &str) -> bool {
        self.set_watch_flag(link, true)
    }

    /// Stop polling an item. Returns whether the link is known.
    pub fn unwatch(&self, link: &str) -> bool {
        self.set_watch_flag(link, false)
    }

    fn set_watch_flag(&self, link: &str, watched: bool) -> bool {
        let _reload = self.reload.read().unwrap_or_else(PoisonError::into_inner);
        let table = self.table.load();
        let Some(mut item) = table.items.get_mut(link) else {
            warn!(link, "unknown item link, ignoring watch change");
            return false;
        };
        if item.watched != watched {
            item.watched = watched;
            debug!(link, watched, "watch flag changed");
        }
        true
    }

    /// Set an item's cached state and report whether it changed.
    ///
    /// Emits exactly one [`ChangeEvent`] per real transition; an equal
    /// value or an unknown link emits nothing and returns `false`.
    pub fn update_state(&self, link: &str, new_state: &str, source: ChangeSource) -> bool {
        let table = self.table.load();
        let Some(mut item) = table.items.get_mut(link) else {
            trace!(link, %source, "state update for unknown link");
            return false;
        };

        if item.state.as_deref() == Some(new_state) {
            return false;
        }

        let previous_state = item.state.replace(new_state.to_owned());
        let event = ChangeEvent {
            link: item.link.clone(),
            item: item.id.clone(),
            new_state: new_state.to_owned(),
            previous_state,
            source,
            observed_at: Utc::now(),
        };

        // Published under the shard lock: per-item ordering.
        let _ = self.change_tx.send(Arc::new(event));
        drop(item);

        debug!(link, state = new_state, %source, "item state changed");
        true
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeEvent>> {
        self.change_tx.subscribe()
    }

    // ── Metadata ─────────────────────────────────────────────────────

    pub fn last_load(&self) -> Option<DateTime<Utc>> {
        *self.last_load.borrow()
    }
}

impl Default for ItemRegistry {
    fn default() -> Self {
        Self::new()
    }
}
