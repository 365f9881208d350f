use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::error::HubError;
use crate::storage::Store;
use crate::types::{self, encoded_list_size, keys, MediaItem, PER_ITEM_MAX_BYTES, TOTAL_MAX_BYTES};

/// Owns one display surface's in-memory copy of the wallpaper list and the
/// currently displayed item, and keeps the persisted copy consistent.
///
/// Operations are sequential per manager (`&mut self`). Surfaces open at the
/// same time each hold their own copy; persisted writes are last-write-wins.
pub struct RotationManager {
    store: Arc<dyn Store>,
    wallpapers: Vec<MediaItem>,
    current: Option<MediaItem>,
}

impl RotationManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store, wallpapers: Vec::new(), current: None }
    }

    /// Read the persisted list; absent or malformed data falls back to the
    /// built-in defaults. Never fails outward. Seeds the current selection
    /// when the list is non-empty.
    pub async fn load(&mut self) {
        self.wallpapers = match self.store.get(&[keys::WALLPAPERS]).await {
            Ok(mut got) => match got.remove(keys::WALLPAPERS) {
                Some(v) => match serde_json::from_value::<Vec<MediaItem>>(v) {
                    Ok(list) => list,
                    Err(e) => {
                        warn!(error = %e, "malformed wallpaper list, using defaults");
                        types::default_wallpapers()
                    }
                },
                // First run before install seeding, or a cleared store.
                None => types::default_wallpapers(),
            },
            Err(e) => {
                warn!(error = %e, "failed to read wallpaper list, using defaults");
                types::default_wallpapers()
            }
        };
        if self.current.is_none() {
            self.select_random().await;
        }
    }

    /// Append an item and persist the whole list. Rejected before insertion
    /// when the item alone exceeds the per-item ceiling; rejected and rolled
    /// back when the resulting list exceeds the aggregate ceiling, leaving the
    /// list exactly as it was.
    pub async fn add(&mut self, item: MediaItem) -> Result<(), HubError> {
        let size = item.encoded_size();
        if size > PER_ITEM_MAX_BYTES {
            return Err(HubError::ItemTooLarge { size, limit: PER_ITEM_MAX_BYTES });
        }
        self.wallpapers.push(item);
        let total = encoded_list_size(&self.wallpapers);
        if total > TOTAL_MAX_BYTES {
            self.wallpapers.pop();
            return Err(HubError::StorageQuotaExceeded { size: total, limit: TOTAL_MAX_BYTES });
        }
        self.persist().await;
        Ok(())
    }

    /// Remove by index and re-persist. If the removed value was the one on
    /// display and no equal item remains, a replacement is chosen at random;
    /// an emptied list keeps showing the stale current item.
    pub async fn remove(&mut self, index: usize) -> Result<MediaItem, HubError> {
        if index >= self.wallpapers.len() {
            return Err(HubError::IndexOutOfBounds { index, len: self.wallpapers.len() });
        }
        let removed = self.wallpapers.remove(index);
        self.persist().await;
        let still_present = match &self.current {
            Some(c) => self.wallpapers.contains(c),
            None => true,
        };
        if !still_present {
            self.select_random().await;
        }
        Ok(removed)
    }

    /// Pick uniformly at random, each call independent (the previous pick is
    /// not excluded). Empty list: no-op, the display does not change.
    pub async fn select_random(&mut self) -> Option<MediaItem> {
        if self.wallpapers.is_empty() {
            return None;
        }
        let idx = rand::rng().random_range(0..self.wallpapers.len());
        let item = self.wallpapers[idx].clone();
        self.set_current(item.clone()).await;
        Some(item)
    }

    /// Make `item` current unconditionally (thumbnail click).
    pub async fn select_specific(&mut self, item: MediaItem) {
        self.set_current(item).await;
    }

    pub fn wallpapers(&self) -> &[MediaItem] {
        &self.wallpapers
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.current.as_ref()
    }

    async fn set_current(&mut self, item: MediaItem) {
        self.current = Some(item.clone());
        // Best-effort bookkeeping for the popup's stats display; losing this
        // write is not a correctness failure.
        let entries = vec![
            (keys::LAST_CHANGED.to_string(), Value::from(crate::current_epoch())),
            (keys::CURRENT_WALLPAPER.to_string(), serde_json::to_value(&item).unwrap_or(Value::Null)),
        ];
        if let Err(e) = self.store.set(entries).await {
            warn!(error = %e, "failed to record wallpaper change");
        }
    }

    async fn persist(&self) {
        let payload = match serde_json::to_value(&self.wallpapers) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to encode wallpaper list");
                return;
            }
        };
        if let Err(e) = self.store.set(vec![(keys::WALLPAPERS.to_string(), payload)]).await {
            // In-memory state stays authoritative until the next successful load.
            warn!(error = %e, "failed to persist wallpaper list");
        }
    }
}
