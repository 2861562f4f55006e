use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

pub mod server;

use crate::server::sqlite::SqlitePasteStore;

/// Paste body as it sits in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredContent {
    Plain { text: String },
    /// Base64 blob produced by the content cipher (nonce followed by ciphertext).
    Encrypted { blob: String },
}

impl StoredContent {
    pub fn is_encrypted(&self) -> bool {
        matches!(self, StoredContent::Encrypted { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPaste {
    pub id: String,
    pub content: StoredContent,
    pub password_hash: Option<String>,
    /// UNIX milliseconds.
    pub created_at: i64,
    /// UNIX milliseconds; the paste is unreadable once this instant has passed.
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub expire_after_viewing: bool,
    #[serde(default)]
    pub viewed: bool,
    pub creator_ip: Option<String>,
}

impl StoredPaste {
    pub fn is_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_consumed(&self) -> bool {
        self.expire_after_viewing && self.viewed
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expires_at) if now > expires_at)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("paste id already exists: {0}")]
    DuplicateId(String),
    #[error("paste not found: {0}")]
    NotFound(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Durable home of paste records.
///
/// Implementations perform no business-rule filtering: expired or consumed
/// records are returned as-is by [`PasteStore::find_by_id`]. Uniqueness of ids
/// and the `viewed` transition must be enforced atomically by the store itself.
#[async_trait]
pub trait PasteStore: Send + Sync + 'static {
    async fn insert(&self, paste: StoredPaste) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: &str) -> Result<StoredPaste, StoreError>;
    /// Flips `viewed` from false to true. Returns `true` only for the call
    /// that performed the transition.
    async fn mark_viewed(&self, id: &str) -> Result<bool, StoreError>;
    /// Physically removes every record whose `expires_at` is before `now`.
    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError>;
}

pub type SharedPasteStore = Arc<dyn PasteStore>;

pub struct MemoryPasteStore {
    entries: RwLock<HashMap<String, StoredPaste>>,
}

impl MemoryPasteStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for MemoryPasteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PasteStore for MemoryPasteStore {
    async fn insert(&self, paste: StoredPaste) -> Result<(), StoreError> {
        let mut map = self.entries.write().await;
        if map.contains_key(&paste.id) {
            return Err(StoreError::DuplicateId(paste.id));
        }
        map.insert(paste.id.clone(), paste);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<StoredPaste, StoreError> {
        let map = self.entries.read().await;
        map.get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn mark_viewed(&self, id: &str) -> Result<bool, StoreError> {
        let mut map = self.entries.write().await;
        let paste = map
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if paste.viewed {
            return Ok(false);
        }
        paste.viewed = true;
        Ok(true)
    }

    async fn purge_expired(&self, now: i64) -> Result<usize, StoreError> {
        let mut map = self.entries.write().await;
        let before = map.len();
        map.retain(|_, paste| !paste.is_expired_at(now));
        Ok(before - map.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Sqlite { path: String },
}

pub fn create_paste_store(backend: &StoreBackend) -> Result<SharedPasteStore, StoreError> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryPasteStore::new())),
        StoreBackend::Sqlite { path } => Ok(Arc::new(SqlitePasteStore::open(path)?)),
    }
}
