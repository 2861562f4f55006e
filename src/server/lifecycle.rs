use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{SharedPasteStore, StoreError, StoredContent, StoredPaste};

use super::credentials::CredentialGuard;
use super::crypto::ContentCipher;
use super::ids::allocate_id;
use super::time::{current_timestamp, is_representable, to_datetime};

const MAX_ALLOCATION_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    Consumed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingPassword,
    WrongPassword,
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("paste not found")]
    NotFound,
    #[error("paste gone: {0:?}")]
    Gone(GoneReason),
    #[error("unauthorized: {0:?}")]
    Unauthorized(AuthFailure),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Default, Clone)]
pub struct NewPaste {
    pub content: String,
    pub password: Option<String>,
    /// UNIX milliseconds.
    pub expires_at: Option<i64>,
    pub expire_after_viewing: bool,
    pub creator_ip: Option<String>,
}

/// Decrypted paste plus the metadata a client may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedPaste {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expire_after_viewing: bool,
}

/// Create and retrieve pastes.
///
/// Retrieval walks a fixed sequence of gates: existence, consumption,
/// expiry, password, decryption. Only when all of them pass is a view-once
/// paste marked as viewed, so a failed attempt never consumes it.
#[derive(Clone)]
pub struct PasteService {
    store: SharedPasteStore,
    cipher: Option<Arc<ContentCipher>>,
    guard: CredentialGuard,
}

impl PasteService {
    pub fn new(
        store: SharedPasteStore,
        cipher: Option<Arc<ContentCipher>>,
        guard: CredentialGuard,
    ) -> Self {
        Self {
            store,
            cipher,
            guard,
        }
    }

    pub fn store(&self) -> &SharedPasteStore {
        &self.store
    }

    pub fn encrypts_at_rest(&self) -> bool {
        self.cipher.is_some()
    }

    pub async fn create(&self, request: NewPaste) -> Result<String, LifecycleError> {
        if request.content.is_empty() {
            return Err(LifecycleError::Validation("Content cannot be empty".into()));
        }
        if matches!(request.expires_at, Some(at) if !is_representable(at)) {
            return Err(LifecycleError::Validation("Invalid expiresAt: out of range".into()));
        }

        let password_hash = match request.password.filter(|p| !p.is_empty()) {
            Some(password) => Some(self.hash_password(password).await?),
            None => None,
        };
        let content = self.seal(&request.content)?;

        let paste = StoredPaste {
            id: String::new(),
            content,
            password_hash,
            created_at: current_timestamp(),
            expires_at: request.expires_at,
            expire_after_viewing: request.expire_after_viewing,
            viewed: false,
            creator_ip: request.creator_ip,
        };
        self.insert_with_fresh_id(paste).await
    }

    /// Raw-text paste: no password, no expiry, never view-once.
    pub async fn create_quick(
        &self,
        content: String,
        creator_ip: Option<String>,
    ) -> Result<String, LifecycleError> {
        self.create(NewPaste {
            content,
            creator_ip,
            ..NewPaste::default()
        })
        .await
    }

    /// Runs the existence, consumption and expiry gates without touching
    /// credentials or content.
    pub async fn check_available(&self, id: &str) -> Result<StoredPaste, LifecycleError> {
        let paste = match self.store.find_by_id(id).await {
            Ok(paste) => paste,
            Err(StoreError::NotFound(_)) => return Err(LifecycleError::NotFound),
            Err(err) => return Err(LifecycleError::Internal(err.to_string())),
        };

        if paste.is_consumed() {
            return Err(LifecycleError::Gone(GoneReason::Consumed));
        }
        if paste.is_expired_at(current_timestamp()) {
            return Err(LifecycleError::Gone(GoneReason::Expired));
        }
        Ok(paste)
    }

    pub async fn retrieve(
        &self,
        id: &str,
        password: Option<&str>,
    ) -> Result<RetrievedPaste, LifecycleError> {
        let paste = self.check_available(id).await?;

        if let Some(hash) = paste.password_hash.clone() {
            let candidate = password
                .filter(|p| !p.is_empty())
                .ok_or(LifecycleError::Unauthorized(AuthFailure::MissingPassword))?;
            if !self.verify_password(hash, candidate.to_string()).await? {
                return Err(LifecycleError::Unauthorized(AuthFailure::WrongPassword));
            }
        }

        let content = self.open(&paste.content)?;
        let created_at = stored_instant(&paste.id, paste.created_at)?;
        let expires_at = paste
            .expires_at
            .map(|at| stored_instant(&paste.id, at))
            .transpose()?;

        if paste.expire_after_viewing {
            match self.store.mark_viewed(&paste.id).await {
                Ok(true) => log::info!("view-once paste {} consumed", paste.id),
                Ok(false) => return Err(LifecycleError::Gone(GoneReason::Consumed)),
                Err(StoreError::NotFound(_)) => return Err(LifecycleError::NotFound),
                Err(err) => return Err(LifecycleError::Internal(err.to_string())),
            }
        }

        Ok(RetrievedPaste {
            id: paste.id,
            content,
            created_at,
            expires_at,
            expire_after_viewing: paste.expire_after_viewing,
        })
    }

    async fn insert_with_fresh_id(&self, mut paste: StoredPaste) -> Result<String, LifecycleError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            paste.id = allocate_id().map_err(|e| LifecycleError::Internal(e.to_string()))?;
            match self.store.insert(paste.clone()).await {
                Ok(()) => {
                    log::info!(
                        "created paste {} (protected: {}, view-once: {}, encrypted: {})",
                        paste.id,
                        paste.is_protected(),
                        paste.expire_after_viewing,
                        paste.content.is_encrypted()
                    );
                    return Ok(paste.id);
                }
                Err(StoreError::DuplicateId(id)) => {
                    log::warn!("paste id collision on {id}, allocating another");
                }
                Err(err) => return Err(LifecycleError::Internal(err.to_string())),
            }
        }
        Err(LifecycleError::Internal(format!(
            "no unique paste id after {MAX_ALLOCATION_ATTEMPTS} attempts"
        )))
    }

    fn seal(&self, text: &str) -> Result<StoredContent, LifecycleError> {
        match &self.cipher {
            Some(cipher) => cipher
                .encrypt(text)
                .map(|blob| StoredContent::Encrypted { blob })
                .map_err(|e| LifecycleError::Internal(e.to_string())),
            None => Ok(StoredContent::Plain {
                text: text.to_owned(),
            }),
        }
    }

    fn open(&self, content: &StoredContent) -> Result<String, LifecycleError> {
        match content {
            StoredContent::Plain { text } => Ok(text.clone()),
            StoredContent::Encrypted { blob } => self
                .cipher
                .as_ref()
                .ok_or_else(|| {
                    LifecycleError::Internal("encrypted paste but no cipher key configured".into())
                })?
                .decrypt(blob)
                .map_err(|e| LifecycleError::Internal(e.to_string())),
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, LifecycleError> {
        let guard = self.guard.clone();
        tokio::task::spawn_blocking(move || guard.hash(&password))
            .await
            .map_err(|e| LifecycleError::Internal(e.to_string()))?
            .map_err(|e| LifecycleError::Internal(e.to_string()))
    }

    async fn verify_password(&self, hash: String, candidate: String) -> Result<bool, LifecycleError> {
        let guard = self.guard.clone();
        tokio::task::spawn_blocking(move || guard.verify(&hash, &candidate))
            .await
            .map_err(|e| LifecycleError::Internal(e.to_string()))?
            .map_err(|e| LifecycleError::Internal(e.to_string()))
    }
}

fn stored_instant(id: &str, millis: i64) -> Result<DateTime<Utc>, LifecycleError> {
    to_datetime(millis).ok_or_else(|| {
        LifecycleError::Internal(format!("paste {id} has timestamp {millis} out of range"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryPasteStore, PasteStore};

    fn service_with(store: Arc<MemoryPasteStore>, key: Option<&[u8]>) -> PasteService {
        PasteService::new(
            store,
            key.map(|k| Arc::new(ContentCipher::new(k.to_vec()))),
            CredentialGuard::with_cost(64, 1, 1).unwrap(),
        )
    }

    #[tokio::test]
    async fn encrypts_at_rest_when_key_configured() {
        let store = Arc::new(MemoryPasteStore::new());
        let service = service_with(store.clone(), Some(b"0123456789abcdef0123456789abcdef"));

        let id = service
            .create_quick("hi".into(), Some("10.0.0.1".into()))
            .await
            .unwrap();
        let stored = store.find_by_id(&id).await.unwrap();
        match stored.content {
            StoredContent::Encrypted { ref blob } => assert!(!blob.contains("hi")),
            StoredContent::Plain { .. } => panic!("expected encrypted content"),
        }
        assert_eq!(stored.creator_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(service.retrieve(&id, None).await.unwrap().content, "hi");
    }

    #[tokio::test]
    async fn stores_plaintext_without_key() {
        let store = Arc::new(MemoryPasteStore::new());
        let service = service_with(store.clone(), None);

        let id = service.create_quick("plain".into(), None).await.unwrap();
        assert!(!store.find_by_id(&id).await.unwrap().content.is_encrypted());
    }

    #[tokio::test]
    async fn empty_password_means_unprotected() {
        let store = Arc::new(MemoryPasteStore::new());
        let service = service_with(store.clone(), None);

        let id = service
            .create(NewPaste {
                content: "open".into(),
                password: Some(String::new()),
                ..NewPaste::default()
            })
            .await
            .unwrap();
        assert!(store.find_by_id(&id).await.unwrap().password_hash.is_none());
    }

    #[tokio::test]
    async fn encrypted_record_without_cipher_is_internal() {
        let store = Arc::new(MemoryPasteStore::new());
        store
            .insert(StoredPaste {
                id: "orphan".into(),
                content: StoredContent::Encrypted {
                    blob: "AAAA".into(),
                },
                password_hash: None,
                created_at: 0,
                expires_at: None,
                expire_after_viewing: false,
                viewed: false,
                creator_ip: None,
            })
            .await
            .unwrap();
        let service = service_with(store, None);

        assert!(matches!(
            service.retrieve("orphan", None).await,
            Err(LifecycleError::Internal(_))
        ));
    }
}
