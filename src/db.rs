use anyhow::{Context, Result};
use async_trait::async_trait;
use directories::ProjectDirs;
use serde_json::Value;
use sqlx::any::AnyPoolOptions;
use sqlx::{any::AnyConnectOptions, migrate::Migrator, AnyPool, ConnectOptions};
use std::collections::HashMap;
use std::sync::Once;
use std::{path::PathBuf, str::FromStr};
use tokio::sync::broadcast;
use tracing::warn;

use crate::storage::{Store, StoreChange};

// Ensure drivers are installed exactly once for sqlx::any
static INSTALL_DRIVERS: Once = Once::new();

// Embed SQL migrations from the migrations/ directory
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const CHANGE_FEED_CAPACITY: usize = 64;

/// SQLite-backed key-value store. Values are stored as JSON text; writes are
/// last-write-wins across connections.
#[derive(Clone)]
pub struct Database {
    pool: AnyPool,
    changes: broadcast::Sender<StoreChange>,
}

impl Database {
    // Create a connection pool. If database_url is None, use a sensible default
    // (SQLite file in the user's data directory).
    pub async fn connect(database_url: Option<&str>) -> Result<Self> {
        // Register compiled-in drivers for sqlx::any
        INSTALL_DRIVERS.call_once(|| sqlx::any::install_default_drivers());

        let url = match database_url {
            Some(u) if !u.trim().is_empty() => u.to_string(),
            _ => default_sqlite_url()?,
        };

        // Parse options to tweak connection settings (e.g., logging)
        let opts = AnyConnectOptions::from_str(&url)
            .with_context(|| format!("invalid database URL: {url}"))?;
        // Quiet by default; callers can enable SQLX_LOG if they want
        let opts = opts.disable_statement_logging();

        let pool = AnyPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to connect to database: {url}"))?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self { pool, changes })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        match MIGRATOR.run(&self.pool).await {
            Ok(_) => Ok(()),
            Err(e) => {
                let msg = e.to_string();
                let looks_modified = msg.contains("was previously applied but has been modified");
                let duplicate_version = msg.contains("UNIQUE constraint failed: _sqlx_migrations.version");
                if looks_modified || duplicate_version {
                    let _ = sqlx::query("DELETE FROM _sqlx_migrations").execute(&self.pool).await;
                    MIGRATOR.run(&self.pool).await.context("running migrations after ledger reset")
                } else {
                    Err(e).context("running migrations")
                }
            }
        }
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub async fn vacuum(&self) -> Result<()> {
        // Best-effort: works on SQLite
        let _ = sqlx::query("VACUUM").execute(&self.pool).await;
        Ok(())
    }

    async fn fetch_value(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|text| match serde_json::from_str(&text) {
            Ok(v) => Some(v),
            Err(e) => {
                // Corrupt rows read as absent; callers fall back to defaults.
                warn!(key, error = %e, "discarding unparsable store value");
                None
            }
        }))
    }
}

#[async_trait]
impl Store for Database {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(v) = self.fetch_value(key).await? {
                out.insert((*key).to_string(), v);
            }
        }
        Ok(out)
    }

    async fn set(&self, entries: Vec<(String, Value)>) -> Result<()> {
        let mut events = Vec::with_capacity(entries.len());
        for (key, new) in entries {
            let old = self.fetch_value(&key).await?;
            let text = serde_json::to_string(&new)?;
            sqlx::query(
                "INSERT INTO kv(key, value) VALUES (?, ?)\n                 ON CONFLICT(key) DO UPDATE SET value=excluded.value",
            )
            .bind(&key)
            .bind(&text)
            .execute(&self.pool)
            .await?;
            events.push(StoreChange { key, old, new: Some(new) });
        }
        for ev in events {
            let _ = self.changes.send(ev);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

fn default_sqlite_url() -> Result<String> {
    let proj = ProjectDirs::from("dev", "wallhub", "wallhub")
        .context("unable to determine data directory for default sqlite path")?;
    let mut path: PathBuf = proj.data_dir().to_path_buf();
    std::fs::create_dir_all(&path).with_context(|| format!("creating data dir: {}", path.display()))?;
    path.push("wallhub.db");

    // Ensure the file exists so SQLite can open it in rw mode
    let _ = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(&path);

    // Encode spaces in the path for a valid sqlite URL
    let mut path_str = path.to_string_lossy().to_string();
    if path_str.contains(' ') {
        path_str = path_str.replace(' ', "%20");
    }
    Ok(format!("sqlite:///{path_str}?mode=rwc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn temp_db(dir: &tempfile::TempDir) -> Database {
        let url = format!("sqlite:///{}?mode=rwc", dir.path().join("wallhub.db").display());
        let db = Database::connect(Some(&url)).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn values_round_trip_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let db = temp_db(&dir).await;

        db.set(vec![
            ("autoChange".into(), json!(true)),
            ("interval".into(), json!(45)),
        ])
        .await
        .unwrap();

        let got = db.get(&["autoChange", "interval", "missing"]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["autoChange"], json!(true));
        assert_eq!(got["interval"], json!(45));
    }

    #[tokio::test]
    async fn overwrites_emit_old_and_new_on_the_feed() {
        let dir = tempfile::tempdir().unwrap();
        let db = temp_db(&dir).await;
        db.set(vec![("interval".into(), json!(45))]).await.unwrap();

        let mut rx = db.subscribe();
        db.set(vec![("interval".into(), json!(10))]).await.unwrap();

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.key, "interval");
        assert_eq!(ev.old, Some(json!(45)));
        assert_eq!(ev.new, Some(json!(10)));
    }

    #[tokio::test]
    async fn corrupt_rows_read_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let db = temp_db(&dir).await;

        sqlx::query("INSERT INTO kv(key, value) VALUES ('wallpapers', 'not json {')")
            .execute(db.pool())
            .await
            .unwrap();

        let got = db.get(&["wallpapers"]).await.unwrap();
        assert!(got.is_empty());
    }
}
