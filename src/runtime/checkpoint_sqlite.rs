/*!
SQLite checkpoint store.

Durable [`CheckpointStore`] backend on top of `sqlx`. State and frontier
are serialized through the persistence models; the schema is created on
connect, so no external migration step is required.

Write serialization happens inside a transaction that re-checks the
stored maximum sequence, turning racing writers into
[`CheckpointError::Conflict`] instead of silent reordering.

Storage grows with `sessions x checkpoints x state size`; the engine
never deletes rows. Prune old checkpoints externally, e.g.:

```bash
sqlite3 graphloom.db "DELETE FROM checkpoints WHERE created_at < datetime('now', '-30 days')"
sqlite3 graphloom.db "VACUUM"
```
*/

use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::runtime::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, Result};
use crate::runtime::persistence::{
    PersistedCheckpoint, PersistedState, from_json_str, to_json_string,
};
use crate::types::SessionId;

/// SQLite-backed checkpoint store.
pub struct SqliteStore {
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish()
    }
}

impl SqliteStore {
    /// Connect to (or create) a SQLite database.
    /// Example URL: `"sqlite://graphloom.db"`.
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| CheckpointError::Backend {
                message: format!("connect error: {e}"),
            })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
        "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("create sessions table: {e}"),
        })?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS checkpoints (
                session_id TEXT NOT NULL REFERENCES sessions(id),
                sequence INTEGER NOT NULL,
                state_json TEXT NOT NULL,
                frontier_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (session_id, sequence)
            )
        "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("create checkpoints table: {e}"),
        })?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

fn decode_row(row: &SqliteRow) -> Result<Checkpoint> {
    let session_id: String = row
        .try_get("session_id")
        .map_err(|e| CheckpointError::Backend {
            message: format!("read session_id: {e}"),
        })?;
    let sequence: i64 = row
        .try_get("sequence")
        .map_err(|e| CheckpointError::Backend {
            message: format!("read sequence: {e}"),
        })?;
    let state_json: String = row
        .try_get("state_json")
        .map_err(|e| CheckpointError::Backend {
            message: format!("read state_json: {e}"),
        })?;
    let frontier_json: String = row
        .try_get("frontier_json")
        .map_err(|e| CheckpointError::Backend {
            message: format!("read frontier_json: {e}"),
        })?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| CheckpointError::Backend {
            message: format!("read created_at: {e}"),
        })?;

    let state: PersistedState = from_json_str(&state_json)?;
    let frontier: Vec<String> = from_json_str(&frontier_json)?;
    Ok(Checkpoint::from(PersistedCheckpoint {
        session_id,
        sequence: sequence as u64,
        state,
        frontier,
        created_at,
    }))
}

#[async_trait::async_trait]
impl CheckpointStore for SqliteStore {
    #[instrument(skip(self, checkpoint), err)]
    async fn put(&self, checkpoint: Checkpoint) -> Result<()> {
        let persisted = PersistedCheckpoint::from(&checkpoint);
        let state_json = to_json_string(&persisted.state)?;
        let frontier_json = to_json_string(&persisted.frontier)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CheckpointError::Backend {
                message: format!("tx begin: {e}"),
            })?;

        let max_row = sqlx::query(
            r#"
            SELECT MAX(sequence) AS max_sequence FROM checkpoints WHERE session_id = ?1
        "#,
        )
        .bind(&checkpoint.session_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("query max sequence: {e}"),
        })?;
        let max_sequence: Option<i64> =
            max_row
                .try_get("max_sequence")
                .map_err(|e| CheckpointError::Backend {
                    message: format!("read max sequence: {e}"),
                })?;
        if let Some(max) = max_sequence {
            if checkpoint.sequence <= max as u64 {
                return Err(CheckpointError::Conflict {
                    session: checkpoint.session_id,
                    sequence: checkpoint.sequence,
                });
            }
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO sessions (id) VALUES (?1)
        "#,
        )
        .bind(&checkpoint.session_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("insert session: {e}"),
        })?;

        sqlx::query(
            r#"
            INSERT INTO checkpoints (session_id, sequence, state_json, frontier_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        )
        .bind(&checkpoint.session_id)
        .bind(checkpoint.sequence as i64)
        .bind(&state_json)
        .bind(&frontier_json)
        .bind(&persisted.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("insert checkpoint: {e}"),
        })?;

        tx.commit().await.map_err(|e| CheckpointError::Backend {
            message: format!("tx commit: {e}"),
        })?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_latest(&self, session_id: &str) -> Result<Option<Checkpoint>> {
        let row: Option<SqliteRow> = sqlx::query(
            r#"
            SELECT session_id, sequence, state_json, frontier_json, created_at
            FROM checkpoints
            WHERE session_id = ?1
            ORDER BY sequence DESC
            LIMIT 1
        "#,
        )
        .bind(session_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("query latest: {e}"),
        })?;

        row.as_ref().map(decode_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list(&self, session_id: &str) -> Result<Vec<Checkpoint>> {
        let rows: Vec<SqliteRow> = sqlx::query(
            r#"
            SELECT session_id, sequence, state_json, frontier_json, created_at
            FROM checkpoints
            WHERE session_id = ?1
            ORDER BY sequence ASC
        "#,
        )
        .bind(session_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("query list: {e}"),
        })?;

        rows.iter().map(decode_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_sessions(&self) -> Result<Vec<SessionId>> {
        let rows: Vec<SqliteRow> = sqlx::query(r#"SELECT id FROM sessions ORDER BY id"#)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| CheckpointError::Backend {
                message: format!("query sessions: {e}"),
            })?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("id")
                    .map_err(|e| CheckpointError::Backend {
                        message: format!("read session id: {e}"),
                    })
            })
            .collect()
    }
}
