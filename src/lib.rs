pub mod db;
pub mod error;
pub mod rotation;
pub mod scheduler;
pub mod storage;
pub mod surfaces;
pub mod types;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::error::HubError;
    pub use crate::rotation::RotationManager;
    pub use crate::scheduler::{RotationScheduler, TRIGGER_NAME};
    pub use crate::storage::{MemoryStore, Store, StoreChange};
    pub use crate::surfaces::{SurfaceHub, SurfaceKind, SurfaceMessage};
    pub use crate::types::{MediaItem, MediaKind, RotationSettings};
    pub use crate::{HubStats, WallpaperHub};
}

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::db::Database;
use crate::rotation::RotationManager;
use crate::scheduler::RotationScheduler;
use crate::storage::Store;
use crate::surfaces::{SurfaceHub, SurfaceKind, SurfaceMessage};
use crate::types::{effective_interval, keys, MediaItem};

/// Snapshot of the store for the stats display (wallpaper count, rotation
/// state, last change).
#[derive(Debug, Clone)]
pub struct HubStats {
    pub wallpaper_count: usize,
    pub auto_change: bool,
    pub interval_minutes: u32,
    pub last_changed: Option<i64>,
    pub current: Option<MediaItem>,
}

/// Entry point. Owns the store, the surface registry and the rotation
/// scheduler; display surfaces get their own `RotationManager` through
/// `open_surface`.
pub struct WallpaperHub {
    store: Arc<dyn Store>,
    db: Option<Database>,
    surfaces: SurfaceHub,
    scheduler: Arc<RotationScheduler>,
    watch: JoinHandle<()>,
}

impl WallpaperHub {
    /// Open the database, optionally run migrations, seed first-install
    /// defaults and start the scheduler.
    pub async fn connect(database_url: Option<&str>, run_migrations: bool) -> Result<Self> {
        let db = Database::connect(database_url).await?;
        if run_migrations {
            db.run_migrations().await?;
        }
        let mut hub = Self::with_store(Arc::new(db.clone())).await?;
        hub.db = Some(db);
        Ok(hub)
    }

    /// Build on any store implementation (embedders, tests).
    pub async fn with_store(store: Arc<dyn Store>) -> Result<Self> {
        storage::ensure_defaults(store.as_ref()).await?;
        let surfaces = SurfaceHub::new();
        let scheduler = Arc::new(RotationScheduler::new(store.clone(), surfaces.clone()));
        // Watch first, then the startup transition, so no settings write can
        // fall between the two.
        let watch = scheduler.spawn_watch();
        scheduler.start().await?;
        Ok(Self { store, db: None, surfaces, scheduler, watch })
    }

    /// A new-tab surface opening: a loaded rotation manager plus the feed its
    /// rotate notifications arrive on.
    pub async fn open_surface(&self) -> (RotationManager, mpsc::UnboundedReceiver<SurfaceMessage>) {
        let rx = self.surfaces.attach(SurfaceKind::NewTab);
        let mut manager = RotationManager::new(self.store.clone());
        manager.load().await;
        (manager, rx)
    }

    /// Settings-surface write: toggle auto-rotation. The scheduler reacts via
    /// the store change feed, not through a direct call.
    pub async fn set_auto_change(&self, enabled: bool) -> Result<()> {
        self.store.set(vec![(keys::AUTO_CHANGE.to_string(), Value::Bool(enabled))]).await
    }

    /// Settings-surface write: rotation interval in minutes. Stored as given;
    /// out-of-range values take effect as the default of 30.
    pub async fn set_interval(&self, minutes: i64) -> Result<()> {
        self.store.set(vec![(keys::INTERVAL.to_string(), Value::from(minutes))]).await
    }

    /// Ask open new-tab surfaces to rotate now. Returns how many were reached.
    pub fn request_rotation(&self) -> usize {
        self.surfaces.notify(SurfaceKind::NewTab, SurfaceMessage::ChangeWallpaper)
    }

    /// Ask open new-tab surfaces to show their settings panel.
    pub fn request_settings(&self) -> usize {
        self.surfaces.notify(SurfaceKind::NewTab, SurfaceMessage::OpenSettings)
    }

    pub async fn stats(&self) -> Result<HubStats> {
        let got = self
            .store
            .get(&[
                keys::WALLPAPERS,
                keys::AUTO_CHANGE,
                keys::INTERVAL,
                keys::LAST_CHANGED,
                keys::CURRENT_WALLPAPER,
            ])
            .await?;
        Ok(HubStats {
            wallpaper_count: got
                .get(keys::WALLPAPERS)
                .and_then(|v| v.as_array().map(Vec::len))
                .unwrap_or(0),
            auto_change: got.get(keys::AUTO_CHANGE).and_then(Value::as_bool).unwrap_or(false),
            interval_minutes: effective_interval(got.get(keys::INTERVAL)),
            last_changed: got.get(keys::LAST_CHANGED).and_then(Value::as_i64),
            current: got
                .get(keys::CURRENT_WALLPAPER)
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok()),
        })
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn surfaces(&self) -> &SurfaceHub {
        &self.surfaces
    }

    pub fn scheduler(&self) -> &RotationScheduler {
        self.scheduler.as_ref()
    }

    /// Vacuum/compact the database (SQLite only; no-op for other stores).
    pub async fn vacuum_db(&self) -> Result<()> {
        match &self.db {
            Some(db) => db.vacuum().await,
            None => Ok(()),
        }
    }

    /// Disarm the trigger and stop watching the store.
    pub fn shutdown(&self) {
        self.scheduler.disarm();
        self.watch.abort();
    }
}

// --- helpers ---

pub(crate) fn current_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn stats_reflect_the_store() {
        let store = Arc::new(MemoryStore::new());
        let hub = WallpaperHub::with_store(store.clone()).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.wallpaper_count, 5);
        assert!(!stats.auto_change);
        assert_eq!(stats.interval_minutes, 30);
        assert_eq!(stats.last_changed, None);

        hub.set_auto_change(true).await.unwrap();
        hub.set_interval(45).await.unwrap();
        store
            .set(vec![(keys::LAST_CHANGED.to_string(), json!(1_700_000_000))])
            .await
            .unwrap();

        let stats = hub.stats().await.unwrap();
        assert!(stats.auto_change);
        assert_eq!(stats.interval_minutes, 45);
        assert_eq!(stats.last_changed, Some(1_700_000_000));
        hub.shutdown();
    }

    #[tokio::test]
    async fn rotation_requests_reach_open_surfaces_only() {
        let store = Arc::new(MemoryStore::new());
        let hub = WallpaperHub::with_store(store).await.unwrap();

        assert_eq!(hub.request_rotation(), 0);

        let (_manager, mut rx) = hub.open_surface().await;
        assert_eq!(hub.request_rotation(), 1);
        assert_eq!(rx.recv().await, Some(SurfaceMessage::ChangeWallpaper));

        assert_eq!(hub.request_settings(), 1);
        assert_eq!(rx.recv().await, Some(SurfaceMessage::OpenSettings));
        hub.shutdown();
    }
}
