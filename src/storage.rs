use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::info;

use crate::types::{self, keys};

/// One written key on the change-notification feed.
#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: String,
    pub old: Option<Value>,
    pub new: Option<Value>,
}

/// Durable key-value persistence surviving restarts. Values are schemaless
/// JSON documents. Writes are last-write-wins; there is no cross-writer
/// coordination (see the concurrency notes in the crate docs).
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch the requested keys; absent keys are omitted from the mapping.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;

    /// Write all entries. Ok is the ack. Emits one change event per key.
    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()>;

    /// Subscribe to the change feed. Events are only delivered to receivers
    /// that exist at write time; nothing is queued for later subscribers.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

const CHANGE_FEED_CAPACITY: usize = 64;

/// In-process store, the fallback for environments without a database and the
/// fixture for unit tests.
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { values: Mutex::new(HashMap::new()), changes }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let values = self.values.lock().unwrap();
        Ok(keys
            .iter()
            .filter_map(|k| values.get(*k).map(|v| ((*k).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let mut events = Vec::with_capacity(entries.len());
        {
            let mut values = self.values.lock().unwrap();
            for (key, new) in entries {
                let old = values.insert(key.clone(), new.clone());
                events.push(StoreChange { key, old, new: Some(new) });
            }
        }
        for ev in events {
            // No receivers means no open listeners; that is fine.
            let _ = self.changes.send(ev);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

/// First-install seeding: if no wallpaper list exists yet, write the built-in
/// defaults and leave auto-rotation off. A later call is a no-op, so a mutated
/// list is never clobbered.
pub async fn ensure_defaults(store: &dyn Store) -> Result<()> {
    let existing = store.get(&[keys::WALLPAPERS]).await?;
    if existing.contains_key(keys::WALLPAPERS) {
        return Ok(());
    }
    info!("first install: seeding {} default wallpapers", types::default_wallpapers().len());
    store
        .set(vec![
            (keys::WALLPAPERS.to_string(), serde_json::to_value(types::default_wallpapers())?),
            (keys::AUTO_CHANGE.to_string(), Value::Bool(false)),
        ])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_omits_absent_keys() {
        let store = MemoryStore::new();
        store.set(vec![("a".into(), json!(1))]).await.unwrap();

        let got = store.get(&["a", "missing"]).await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got["a"], json!(1));
    }

    #[tokio::test]
    async fn change_feed_carries_old_and_new_values() {
        let store = MemoryStore::new();
        store.set(vec![("interval".into(), json!(45))]).await.unwrap();

        let mut rx = store.subscribe();
        store.set(vec![("interval".into(), json!(10))]).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.key, "interval");
        assert_eq!(ev.old, Some(json!(45)));
        assert_eq!(ev.new, Some(json!(10)));
    }

    #[tokio::test]
    async fn subscribers_see_nothing_from_before_they_attached() {
        let store = MemoryStore::new();
        store.set(vec![("a".into(), json!(1))]).await.unwrap();

        let mut rx = store.subscribe();
        store.set(vec![("b".into(), json!(2))]).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.key, "b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn defaults_seed_once_and_only_once() {
        let store = MemoryStore::new();
        ensure_defaults(&store).await.unwrap();

        let got = store.get(&[keys::WALLPAPERS, keys::AUTO_CHANGE]).await.unwrap();
        let list: Vec<crate::types::MediaItem> =
            serde_json::from_value(got[keys::WALLPAPERS].clone()).unwrap();
        assert_eq!(list, types::default_wallpapers());
        assert_eq!(got[keys::AUTO_CHANGE], json!(false));

        // A mutated list survives a re-run (e.g. process restart).
        store.set(vec![(keys::WALLPAPERS.to_string(), json!(["https://example.com/x.jpg"]))]).await.unwrap();
        ensure_defaults(&store).await.unwrap();
        let got = store.get(&[keys::WALLPAPERS]).await.unwrap();
        assert_eq!(got[keys::WALLPAPERS], json!(["https://example.com/x.jpg"]));
    }
}
