//! SQLite implementation of [`TaskStore`].
//!
//! Migrations in `./migrations` are embedded at compile time and run on
//! [`SqliteTaskStore::connect`]. Queries use the runtime-checked
//! `sqlx::query` form so no `DATABASE_URL` is needed to build.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use talkie_models::{TaskId, TaskRecord, TaskStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::TaskStore;

type TaskRow = (String, Option<String>, String, String, String);

/// SQLite-backed task store.
#[derive(Clone, Debug)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is a sqlx SQLite URL such as `sqlite://tasks.db`.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!("Connected task store at {}", url);
        Ok(store)
    }

    /// Private in-memory database, used by tests.
    ///
    /// Every SQLite connection to `:memory:` gets its own database, so the
    /// pool is pinned to a single connection that never expires.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Cheap connectivity probe for readiness checks.
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn current_status(&self, id: &TaskId) -> StoreResult<Option<TaskStatus>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT status FROM tasks WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|(status,)| status.parse::<TaskStatus>().map_err(StoreError::from))
            .transpose()
    }

    /// Move a record to `next`, optionally setting the result.
    ///
    /// The update only applies if the status still matches the one read.
    async fn transition(
        &self,
        id: &TaskId,
        next: TaskStatus,
        result: Option<&str>,
    ) -> StoreResult<()> {
        let current = self
            .current_status(id)
            .await?
            .ok_or_else(|| StoreError::not_found(id.as_str()))?;
        current.transition(next)?;

        let now = Utc::now().to_rfc3339();
        let done = sqlx::query(
            "UPDATE tasks SET status = ?1, result = COALESCE(?2, result), updated_at = ?3 \
             WHERE id = ?4 AND status = ?5",
        )
        .bind(next.as_str())
        .bind(result)
        .bind(&now)
        .bind(id.as_str())
        .bind(current.as_str())
        .execute(&self.pool)
        .await?;

        if done.rows_affected() == 0 {
            // Lost a race: report against whatever is stored now.
            return match self.current_status(id).await? {
                Some(actual) => Err(actual.transition(next).err().map_or_else(
                    || StoreError::conflict(id.as_str()),
                    StoreError::from,
                )),
                None => Err(StoreError::not_found(id.as_str())),
            };
        }

        debug!(task_id = %id, from = %current, to = %next, "Updated task status");
        Ok(())
    }
}

fn parse_timestamp(raw: &str, field: &str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        warn!(raw = %raw, field = field, error = %e, "failed to parse task timestamp; using now");
        Utc::now()
    })
}

fn row_to_record(row: TaskRow) -> StoreResult<TaskRecord> {
    let (id, result, status, created_at, updated_at) = row;
    Ok(TaskRecord {
        id: TaskId::from(id),
        result,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at, "created_at"),
        updated_at: parse_timestamp(&updated_at, "updated_at"),
    })
}

impl TaskStore for SqliteTaskStore {
    async fn create(&self, id: &TaskId, status: TaskStatus) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO tasks (id, result, status, created_at, updated_at) \
             VALUES (?1, NULL, ?2, ?3, ?3)",
        )
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(task_id = %id, status = %status, "Created task record");
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::already_exists(id.as_str()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(&self, id: &TaskId, status: TaskStatus) -> StoreResult<()> {
        self.transition(id, status, None).await
    }

    async fn update_result(&self, id: &TaskId, result: &str) -> StoreResult<()> {
        let now = Utc::now().to_rfc3339();
        let done = sqlx::query("UPDATE tasks SET result = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(result)
            .bind(&now)
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(id.as_str()));
        }
        Ok(())
    }

    async fn complete(&self, id: &TaskId, result: &str) -> StoreResult<()> {
        self.transition(id, TaskStatus::Success, Some(result)).await
    }

    async fn get(&self, id: &TaskId) -> StoreResult<Option<TaskRecord>> {
        let row: Option<TaskRow> = sqlx::query_as(
            "SELECT id, result, status, created_at, updated_at FROM tasks WHERE id = ?1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_record).transpose()
    }

    async fn interrupt_running(&self) -> StoreResult<u64> {
        let now = Utc::now().to_rfc3339();
        let done = sqlx::query("UPDATE tasks SET status = ?1, updated_at = ?2 WHERE status = ?3")
            .bind(TaskStatus::Failed.as_str())
            .bind(&now)
            .bind(TaskStatus::Running.as_str())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn count_by_status(&self, status: TaskStatus) -> StoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE status = ?1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteTaskStore {
        SqliteTaskStore::in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store().await;
        let id = TaskId::new();

        store.create(&id, TaskStatus::Pending).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.status, TaskStatus::Pending);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let store = store().await;
        let id = TaskId::new();

        store.create(&id, TaskStatus::Pending).await.unwrap();
        let err = store.create(&id, TaskStatus::Pending).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_is_none() {
        let store = store().await;
        assert!(store.get(&TaskId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_status_keeps_result() {
        let store = store().await;
        let id = TaskId::new();
        store.create(&id, TaskStatus::Pending).await.unwrap();
        store.update_result(&id, "a.mp4").await.unwrap();

        store.update_status(&id, TaskStatus::Running).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Running);
        assert_eq!(record.result.as_deref(), Some("a.mp4"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = store().await;
        let id = TaskId::from("ghost");

        let err = store.update_status(&id, TaskStatus::Running).await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.update_result(&id, "x.mp4").await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.complete(&id, "x.mp4").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_terminal_record_cannot_regress() {
        let store = store().await;
        let id = TaskId::new();
        store.create(&id, TaskStatus::Pending).await.unwrap();
        store.update_status(&id, TaskStatus::Running).await.unwrap();
        store.update_status(&id, TaskStatus::Failed).await.unwrap();

        let err = store.update_status(&id, TaskStatus::Running).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition(t) if t.from == TaskStatus::Failed && t.to == TaskStatus::Running
        ));
        assert!(store.complete(&id, "late.mp4").await.is_err());

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Failed);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_pending_cannot_skip_running() {
        let store = store().await;
        let id = TaskId::new();
        store.create(&id, TaskStatus::Pending).await.unwrap();

        assert!(matches!(
            store.complete(&id, "a.mp4").await,
            Err(StoreError::InvalidTransition(_))
        ));
        assert!(matches!(
            store.update_status(&id, TaskStatus::Failed).await,
            Err(StoreError::InvalidTransition(_))
        ));
        assert_eq!(
            store.get(&id).await.unwrap().unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_complete_sets_result_and_status() {
        let store = store().await;
        let id = TaskId::new();
        store.create(&id, TaskStatus::Pending).await.unwrap();
        store.update_status(&id, TaskStatus::Running).await.unwrap();

        store.complete(&id, "2024_01_01_12.30.00.mp4").await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Success);
        assert_eq!(record.result.as_deref(), Some("2024_01_01_12.30.00.mp4"));
        assert!(record.updated_at >= record.created_at);
    }

    #[tokio::test]
    async fn test_interrupt_running() {
        let store = store().await;
        let running = TaskId::new();
        let pending = TaskId::new();
        store.create(&running, TaskStatus::Pending).await.unwrap();
        store.update_status(&running, TaskStatus::Running).await.unwrap();
        store.create(&pending, TaskStatus::Pending).await.unwrap();

        assert_eq!(store.interrupt_running().await.unwrap(), 1);

        assert_eq!(
            store.get(&running).await.unwrap().unwrap().status,
            TaskStatus::Failed
        );
        assert_eq!(
            store.get(&pending).await.unwrap().unwrap().status,
            TaskStatus::Pending
        );
        assert_eq!(store.count_by_status(TaskStatus::Pending).await.unwrap(), 1);
        assert_eq!(store.count_by_status(TaskStatus::Running).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_records_survive_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("tasks.db").display());
        let id = TaskId::new();

        {
            let store = SqliteTaskStore::connect(&url).await.unwrap();
            store.create(&id, TaskStatus::Pending).await.unwrap();
            store.close().await;
        }

        let store = SqliteTaskStore::connect(&url).await.unwrap();
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = store().await;
        let ids: Vec<TaskId> = (0..16).map(|_| TaskId::new()).collect();

        let handles: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let store = store.clone();
                tokio::spawn(async move { store.create(&id, TaskStatus::Pending).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.count_by_status(TaskStatus::Pending).await.unwrap(), 16);
    }
}
