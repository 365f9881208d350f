use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Surface-type marker. Only new-tab surfaces render wallpapers; rotation
/// notifications are addressed by kind, never to every surface indiscriminately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    NewTab,
    Popup,
}

/// Fire-and-forget messages delivered to open display surfaces. Wire format is
/// `{"action":"changeWallpaper"}` / `{"action":"openSettings"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SurfaceMessage {
    ChangeWallpaper,
    OpenSettings,
}

struct Registration {
    kind: SurfaceKind,
    tx: mpsc::UnboundedSender<SurfaceMessage>,
}

/// Process-wide registry of open display surfaces. Surfaces attach when they
/// open and are pruned once their receiver is dropped; nothing is queued for
/// surfaces that are not open at notify time.
#[derive(Clone)]
pub struct SurfaceHub {
    inner: Arc<Mutex<Vec<Registration>>>,
}

impl SurfaceHub {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Register an open surface of the given kind.
    pub fn attach(&self, kind: SurfaceKind) -> mpsc::UnboundedReceiver<SurfaceMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().push(Registration { kind, tx });
        rx
    }

    /// Deliver to every open surface matching `kind`. Returns the number of
    /// surfaces reached; closed surfaces are dropped from the registry.
    pub fn notify(&self, kind: SurfaceKind, msg: SurfaceMessage) -> usize {
        let mut regs = self.inner.lock().unwrap();
        regs.retain(|r| !r.tx.is_closed());
        regs.iter()
            .filter(|r| r.kind == kind)
            .filter(|r| r.tx.send(msg).is_ok())
            .count()
    }

    /// Open surfaces of the given kind (pruning closed ones first).
    pub fn open_count(&self, kind: SurfaceKind) -> usize {
        let mut regs = self.inner.lock().unwrap();
        regs.retain(|r| !r.tx.is_closed());
        regs.iter().filter(|r| r.kind == kind).count()
    }
}

impl Default for SurfaceHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_use_the_action_wire_format() {
        assert_eq!(
            serde_json::to_value(SurfaceMessage::ChangeWallpaper).unwrap(),
            json!({ "action": "changeWallpaper" })
        );
        assert_eq!(
            serde_json::to_value(SurfaceMessage::OpenSettings).unwrap(),
            json!({ "action": "openSettings" })
        );
    }

    #[tokio::test]
    async fn notify_reaches_only_matching_surfaces() {
        let hub = SurfaceHub::new();
        let mut newtab = hub.attach(SurfaceKind::NewTab);
        let mut popup = hub.attach(SurfaceKind::Popup);

        let delivered = hub.notify(SurfaceKind::NewTab, SurfaceMessage::ChangeWallpaper);
        assert_eq!(delivered, 1);
        assert_eq!(newtab.recv().await, Some(SurfaceMessage::ChangeWallpaper));
        assert!(popup.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_surfaces_are_pruned_and_late_surfaces_get_nothing() {
        let hub = SurfaceHub::new();
        let first = hub.attach(SurfaceKind::NewTab);
        drop(first);

        assert_eq!(hub.notify(SurfaceKind::NewTab, SurfaceMessage::ChangeWallpaper), 0);
        assert_eq!(hub.open_count(SurfaceKind::NewTab), 0);

        // A surface opening later sees nothing from before it attached.
        let mut late = hub.attach(SurfaceKind::NewTab);
        assert!(late.try_recv().is_err());
    }
}
