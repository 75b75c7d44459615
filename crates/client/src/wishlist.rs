//! Wishlist store: the single source of truth for wishlist state.
//!
//! One writer, many readers. The collection lives in a `tokio::sync::watch`
//! channel; every UI surface holds a receiver from [`WishlistStore::subscribe`]
//! and always observes the latest committed snapshot. Each mutation writes
//! the whole collection to durable storage before subscribers are notified.
//!
//! Public operations never fail. Storage problems are logged and the
//! in-memory change stands for the rest of the session.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use dislion_core::{WishlistItem, WishlistItemInput, WishlistKey};

use crate::storage::{KeyValueStore, keys, read_json, write_json};

/// Persisted, observable wishlist.
pub struct WishlistStore {
    items: watch::Sender<Vec<WishlistItem>>,
    storage: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for WishlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WishlistStore")
            .field("items", &*self.items.borrow())
            .finish_non_exhaustive()
    }
}

impl WishlistStore {
    /// Empty store persisting to `storage`. Call
    /// [`load_from_storage`](Self::load_from_storage) to rehydrate.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            items: watch::Sender::new(Vec::new()),
            storage,
        }
    }

    /// Store rehydrated from `storage`.
    #[must_use]
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let store = Self::new(storage);
        store.load_from_storage();
        store
    }

    /// Replace the in-memory collection with the stored one.
    ///
    /// Missing or corrupt storage yields an empty collection. Unreadable
    /// entries are skipped and duplicate keys keep their first occurrence.
    pub fn load_from_storage(&self) {
        let raw: Vec<serde_json::Value> = match read_json(self.storage.as_ref(), keys::WISHLIST) {
            Ok(items) => items.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Stored wishlist is unreadable, starting empty");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let items: Vec<WishlistItem> = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<WishlistItem>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable wishlist entry");
                    None
                }
            })
            .filter(|item| seen.insert(item.unique_key.clone()))
            .collect();

        debug!(count = items.len(), "Wishlist loaded");
        self.items.send_replace(items);
    }

    /// Add an entry with quantity 1. Adding an existing key is a no-op.
    ///
    /// Returns whether the entry was added.
    pub fn add(&self, input: WishlistItemInput) -> bool {
        let key = input.unique_key();
        let added = self.commit(|items| {
            if items.iter().any(|item| item.unique_key == key) {
                return false;
            }
            items.push(input.into_item());
            true
        });
        debug!(key = %key, added, "Wishlist add");
        added
    }

    /// Remove the entry under `key`. Returns whether one was removed.
    pub fn remove(&self, key: &WishlistKey) -> bool {
        self.commit(|items| {
            let before = items.len();
            items.retain(|item| &item.unique_key != key);
            items.len() != before
        })
    }

    /// Set the quantity of the entry under `key`; `0` is stored as 1.
    ///
    /// Returns whether the entry exists.
    pub fn update_quantity(&self, key: &WishlistKey, quantity: u32) -> bool {
        let quantity = quantity.max(1);
        let mut found = false;
        self.commit(|items| {
            let Some(item) = items.iter_mut().find(|item| &item.unique_key == key) else {
                return false;
            };
            found = true;
            if item.quantity == quantity {
                return false;
            }
            item.quantity = quantity;
            true
        });
        found
    }

    #[must_use]
    pub fn contains(&self, key: &WishlistKey) -> bool {
        self.items.borrow().iter().any(|item| &item.unique_key == key)
    }

    /// Remove every entry and persist the empty collection.
    pub fn clear(&self) {
        self.items.send_modify(|items| {
            items.clear();
            self.persist(items);
        });
    }

    /// Receiver that observes every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<WishlistItem>> {
        self.items.subscribe()
    }

    /// Copy of the current collection, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WishlistItem> {
        self.items.borrow().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Sum of all quantities, for the badge counter.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items
            .borrow()
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Apply `change`; if it reports a modification, persist and notify.
    fn commit(&self, change: impl FnOnce(&mut Vec<WishlistItem>) -> bool) -> bool {
        self.items.send_if_modified(|items| {
            let changed = change(items);
            if changed {
                self.persist(items);
            }
            changed
        })
    }

    fn persist(&self, items: &[WishlistItem]) {
        if let Err(e) = write_json(self.storage.as_ref(), keys::WISHLIST, items) {
            warn!(error = %e, "Failed to persist wishlist, change kept in memory only");
        }
    }
}
