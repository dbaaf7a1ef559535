use crate::store::{StateStore, StoreError};
use andro_core::DurableState;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;

/// Durable state as one JSON row in a SQLite database.
#[derive(Clone)]
pub struct SqliteStateStore {
    pool: Pool<Sqlite>,
}

impl SqliteStateStore {
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display());
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&db_url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS durable_state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                state_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// When the record was last written (Unix seconds), if ever.
    pub async fn updated_at(&self) -> Result<Option<i64>, StoreError> {
        let row = sqlx::query("SELECT updated_at FROM durable_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("updated_at")))
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn load(&self) -> Result<DurableState, StoreError> {
        let row = sqlx::query("SELECT state_json FROM durable_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => {
                let json: String = row.get("state_json");
                DurableState::from_json(&json)
            }
            None => DurableState::default(),
        })
    }

    async fn save(&self, state: &DurableState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state)?;
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO durable_state (id, state_json, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at",
        )
        .bind(&json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Durable state saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use andro_core::Mode;

    async fn store_in(dir: &tempfile::TempDir) -> SqliteStateStore {
        SqliteStateStore::open(dir.path().join("andro.db"))
            .await
            .expect("Failed to open store")
    }

    #[tokio::test]
    async fn test_empty_database_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        assert_eq!(store.load().await.unwrap(), DurableState::default());
        assert_eq!(store.updated_at().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_single_row_upsert() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;

        for care in 1..=3 {
            let state = DurableState {
                care_points: care,
                mode: Mode::Focus,
                ..Default::default()
            };
            store.save(&state).await.unwrap();
        }

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM durable_state")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.care_points, 3);
        assert_eq!(loaded.mode, Mode::Focus);
        assert!(store.updated_at().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = DurableState::default();
        state.add_note("remember the umbrella");
        {
            let store = store_in(&dir).await;
            store.save(&state).await.unwrap();
        }
        let store = store_in(&dir).await;
        assert_eq!(store.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_malformed_row_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        sqlx::query("INSERT INTO durable_state (id, state_json, updated_at) VALUES (1, 'oops', 0)")
            .execute(&store.pool)
            .await
            .unwrap();
        assert_eq!(store.load().await.unwrap(), DurableState::default());
    }
}
