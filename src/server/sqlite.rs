use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use crate::{PasteStore, StoreError, StoredContent, StoredPaste};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pastes (
    id TEXT PRIMARY KEY NOT NULL,
    content TEXT NOT NULL,
    encrypted INTEGER NOT NULL DEFAULT 0,
    password_hash TEXT,
    created_at INTEGER NOT NULL,
    expires_at INTEGER,
    expire_after_viewing INTEGER NOT NULL DEFAULT 0,
    viewed INTEGER NOT NULL DEFAULT 0,
    creator_ip TEXT
);
CREATE INDEX IF NOT EXISTS pastes_expires_at ON pastes (expires_at);
";

const SELECT_PASTE: &str = "SELECT id, content, encrypted, password_hash, created_at, expires_at,
        expire_after_viewing, viewed, creator_ip
     FROM pastes WHERE id = ?1";

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        StoreError::Backend(error.to_string())
    }
}

/// Paste store on a single SQLite connection.
///
/// The primary key rejects duplicate ids and `viewed` flips through a
/// conditional `UPDATE`, so both hold across concurrent requests without
/// any application-side locking beyond the connection mutex.
#[derive(Clone)]
pub struct SqlitePasteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePasteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Backend(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection poisoned".into()))?;
            op(&guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("sqlite task failed: {e}")))?
    }
}

fn paste_from_row(row: &Row<'_>) -> rusqlite::Result<StoredPaste> {
    let body: String = row.get(1)?;
    let encrypted: bool = row.get(2)?;
    let content = if encrypted {
        StoredContent::Encrypted { blob: body }
    } else {
        StoredContent::Plain { text: body }
    };
    Ok(StoredPaste {
        id: row.get(0)?,
        content,
        password_hash: row.get(3)?,
        created_at: row.get(4)?,
        expires_at: row.get(5)?,
        expire_after_viewing: row.get(6)?,
        viewed: row.get(7)?,
        creator_ip: row.get(8)?,
    })
}

#[async_trait]
impl PasteStore for SqlitePasteStore {
    async fn insert(&self, paste: StoredPaste) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let (body, encrypted) = match &paste.content {
                StoredContent::Plain { text } => (text.as_str(), false),
                StoredContent::Encrypted { blob } => (blob.as_str(), true),
            };
            let result = conn.execute(
                "INSERT INTO pastes (id, content, encrypted, password_hash, created_at,
                    expires_at, expire_after_viewing, viewed, creator_ip)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    paste.id,
                    body,
                    encrypted,
                    paste.password_hash,
                    paste.created_at,
                    paste.expires_at,
                    paste.expire_after_viewing,
                    paste.viewed,
                    paste.creator_ip,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    Err(StoreError::DuplicateId(paste.id.clone()))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn find_by_id(&self, id: &str) -> Result<StoredPaste, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(SELECT_PASTE, params![id], paste_from_row)
                .optional()?
                .ok_or(StoreError::NotFound(id))
        })
        .await
    }

    async fn mark_viewed(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE pastes SET viewed = 1 WHERE id = ?1 AND viewed = 0",
                params![id],
            )?;
            if changed == 1 {
                return Ok(true);
            }
            let exists = conn
                .query_row("SELECT 1 FROM pastes WHERE id = ?1", params![id], |_| Ok(()))
                .optional()?
                .is_some();
            if exists {
                Ok(false)
            } else {
                Err(StoreError::NotFound(id))
            }
        })
        .await
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM pastes WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![now],
            )?;
            Ok(removed)
        })
        .await
    }
}
