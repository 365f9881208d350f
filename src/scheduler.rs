use anyhow::Result;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::storage::{Store, StoreChange};
use crate::surfaces::{SurfaceHub, SurfaceKind, SurfaceMessage};
use crate::types::{effective_interval, keys, RotationSettings};

/// Name of the process-wide periodic trigger.
pub const TRIGGER_NAME: &str = "wallpaperChange";

struct Trigger {
    period: Duration,
    task: JoinHandle<()>,
}

/// Process-wide rotation scheduler: Disarmed ⇄ Armed, at most one trigger.
///
/// The trigger carries only its period; it does not track which surfaces
/// exist. On each fire it notifies whatever new-tab surfaces are open at that
/// moment. It reacts to settings writes through the store change feed, so the
/// settings surface never calls it directly.
pub struct RotationScheduler {
    store: Arc<dyn Store>,
    surfaces: SurfaceHub,
    trigger: Mutex<Option<Trigger>>,
}

impl RotationScheduler {
    pub fn new(store: Arc<dyn Store>, surfaces: SurfaceHub) -> Self {
        Self { store, surfaces, trigger: Mutex::new(None) }
    }

    /// Arm the trigger. Always clear-before-create: an existing trigger is
    /// aborted first, so repeated arming never accumulates duplicates.
    pub fn arm(&self, period: Duration) {
        let mut slot = self.trigger.lock().unwrap();
        if let Some(old) = slot.take() {
            old.task.abort();
        }
        let surfaces = self.surfaces.clone();
        let task = tokio::spawn(async move {
            // First fire lands after one full period (delay = period).
            let mut ticks = time::interval_at(Instant::now() + period, period);
            loop {
                ticks.tick().await;
                let reached = surfaces.notify(SurfaceKind::NewTab, SurfaceMessage::ChangeWallpaper);
                debug!(trigger = TRIGGER_NAME, reached, "rotation trigger fired");
            }
        });
        *slot = Some(Trigger { period, task });
        info!(trigger = TRIGGER_NAME, period_secs = period.as_secs(), "rotation trigger armed");
    }

    /// Deregister the trigger, if any.
    pub fn disarm(&self) {
        if let Some(old) = self.trigger.lock().unwrap().take() {
            old.task.abort();
            info!(trigger = TRIGGER_NAME, "rotation trigger disarmed");
        }
    }

    pub fn is_armed(&self) -> bool {
        self.trigger.lock().unwrap().is_some()
    }

    pub fn period(&self) -> Option<Duration> {
        self.trigger.lock().unwrap().as_ref().map(|t| t.period)
    }

    /// Startup transition: arm iff auto-rotation is already enabled.
    pub async fn start(&self) -> Result<()> {
        let settings = self.read_settings().await?;
        if settings.enabled {
            self.arm(settings.period());
        }
        Ok(())
    }

    /// Drive the state machine from the store change feed. Runs until the
    /// store's feed closes.
    pub fn spawn_watch(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        let mut rx = this.store.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(change) => this.apply_change(&change).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "store change feed lagged; re-syncing settings");
                        if let Err(e) = this.resync().await {
                            warn!(error = %e, "failed to re-sync rotation settings");
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn apply_change(&self, change: &StoreChange) {
        match change.key.as_str() {
            keys::AUTO_CHANGE => {
                let enabled = change.new.as_ref().and_then(Value::as_bool).unwrap_or(false);
                if enabled {
                    let period = match self.read_settings().await {
                        Ok(s) => s.period(),
                        Err(e) => {
                            warn!(error = %e, "failed to read interval; arming with default");
                            RotationSettings::default().period()
                        }
                    };
                    self.arm(period);
                } else {
                    self.disarm();
                }
            }
            keys::INTERVAL => {
                // Re-arm with the new period only while rotation is on; the
                // old period must not stay alive alongside it.
                if self.is_armed() {
                    let minutes = effective_interval(change.new.as_ref());
                    self.arm(Duration::from_secs(u64::from(minutes) * 60));
                }
            }
            _ => {}
        }
    }

    async fn resync(&self) -> Result<()> {
        let settings = self.read_settings().await?;
        if settings.enabled {
            self.arm(settings.period());
        } else {
            self.disarm();
        }
        Ok(())
    }

    async fn read_settings(&self) -> Result<RotationSettings> {
        let got = self.store.get(&[keys::AUTO_CHANGE, keys::INTERVAL]).await?;
        Ok(RotationSettings::from_values(got.get(keys::AUTO_CHANGE), got.get(keys::INTERVAL)))
    }
}
