use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Store keys shared with the settings surface.
pub mod keys {
    pub const WALLPAPERS: &str = "wallpapers";
    pub const AUTO_CHANGE: &str = "autoChange";
    pub const INTERVAL: &str = "interval";
    pub const LAST_CHANGED: &str = "lastChanged";
    pub const CURRENT_WALLPAPER: &str = "currentWallpaper";
}

/// Per-item ceiling for the encoded payload of a single wallpaper.
pub const PER_ITEM_MAX_BYTES: usize = 2 * 1024 * 1024;
/// Aggregate ceiling for the encoded wallpaper list (storage quota headroom).
pub const TOTAL_MAX_BYTES: usize = 4 * 1024 * 1024;

pub const MIN_INTERVAL_MINUTES: u32 = 1;
pub const MAX_INTERVAL_MINUTES: u32 = 180;
pub const DEFAULT_INTERVAL_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// A displayable wallpaper: a remote URL or an embedded binary-as-text payload.
/// Identity is value equality; the list keeps no separate ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaItem {
    Url(String),
    Embedded { kind: MediaKind, data: String },
}

impl MediaItem {
    pub fn url(u: impl Into<String>) -> Self {
        MediaItem::Url(u.into())
    }

    pub fn embedded(kind: MediaKind, data: impl Into<String>) -> Self {
        MediaItem::Embedded { kind, data: data.into() }
    }

    /// Encoded byte length used for quota accounting.
    pub fn encoded_size(&self) -> usize {
        serde_json::to_string(self).map(|s| s.len()).unwrap_or(0)
    }

    /// Short human-readable form for logs and the CLI.
    pub fn display_ref(&self) -> String {
        match self {
            MediaItem::Url(u) => u.clone(),
            MediaItem::Embedded { kind, data } => {
                let kind = match kind { MediaKind::Image => "image", MediaKind::Video => "video" };
                format!("<embedded {} ({} bytes)>", kind, data.len())
            }
        }
    }
}

/// Encoded size of the whole list as persisted.
pub fn encoded_list_size(items: &[MediaItem]) -> usize {
    serde_json::to_string(items).map(|s| s.len()).unwrap_or(0)
}

/// Defaults seeded on first install.
pub fn default_wallpapers() -> Vec<MediaItem> {
    [
        "https://images.unsplash.com/photo-1506905925346-21bda4d32df4?w=1920&h=1080&fit=crop",
        "https://images.unsplash.com/photo-1441974231531-c6227db76b6e?w=1920&h=1080&fit=crop",
        "https://images.unsplash.com/photo-1518837695005-2083093ee35b?w=1920&h=1080&fit=crop",
        "https://images.unsplash.com/photo-1469474968028-56623f02e42e?w=1920&h=1080&fit=crop",
        "https://images.unsplash.com/photo-1420593248178-d88870618ca0?w=1920&h=1080&fit=crop",
    ]
    .into_iter()
    .map(MediaItem::url)
    .collect()
}

/// Auto-rotation settings as read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationSettings {
    pub enabled: bool,
    pub interval_minutes: u32,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self { enabled: false, interval_minutes: DEFAULT_INTERVAL_MINUTES }
    }
}

impl RotationSettings {
    pub fn from_values(auto_change: Option<&Value>, interval: Option<&Value>) -> Self {
        Self {
            enabled: auto_change.and_then(Value::as_bool).unwrap_or(false),
            interval_minutes: effective_interval(interval),
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.interval_minutes) * 60)
    }
}

/// Effective rotation interval in minutes. Anything that is not an integer in
/// [1,180] (absent, non-numeric, unparsable string, out of range) yields the
/// default of 30. Numeric strings are accepted: the settings surface stores the
/// raw text-input value.
pub fn effective_interval(value: Option<&Value>) -> u32 {
    let minutes = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match minutes {
        Some(m) if (i64::from(MIN_INTERVAL_MINUTES)..=i64::from(MAX_INTERVAL_MINUTES)).contains(&m) => m as u32,
        _ => DEFAULT_INTERVAL_MINUTES,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_items_serialize_as_plain_strings() {
        let item = MediaItem::url("https://example.com/a.jpg");
        assert_eq!(serde_json::to_value(&item).unwrap(), json!("https://example.com/a.jpg"));

        let back: MediaItem = serde_json::from_value(json!("https://example.com/a.jpg")).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn embedded_items_carry_a_kind_discriminator() {
        let item = MediaItem::embedded(MediaKind::Video, "AAAA");
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v, json!({ "kind": "video", "data": "AAAA" }));
    }

    #[test]
    fn interval_fallback_covers_non_numeric_and_out_of_range() {
        assert_eq!(effective_interval(None), 30);
        assert_eq!(effective_interval(Some(&json!("soon"))), 30);
        assert_eq!(effective_interval(Some(&json!(true))), 30);
        assert_eq!(effective_interval(Some(&json!(0))), 30);
        assert_eq!(effective_interval(Some(&json!(181))), 30);
        assert_eq!(effective_interval(Some(&json!(-5))), 30);
        assert_eq!(effective_interval(Some(&json!(1))), 1);
        assert_eq!(effective_interval(Some(&json!(180))), 180);
        assert_eq!(effective_interval(Some(&json!(45))), 45);
        // The settings input arrives as raw text.
        assert_eq!(effective_interval(Some(&json!("45"))), 45);
        assert_eq!(effective_interval(Some(&json!(" 10 "))), 10);
    }

    #[test]
    fn settings_period_is_minutes() {
        let s = RotationSettings { enabled: true, interval_minutes: 45 };
        assert_eq!(s.period(), Duration::from_secs(45 * 60));
    }

    #[test]
    fn default_list_has_five_urls() {
        let defaults = default_wallpapers();
        assert_eq!(defaults.len(), 5);
        assert!(defaults.iter().all(|w| matches!(w, MediaItem::Url(u) if u.starts_with("https://"))));
    }
}
