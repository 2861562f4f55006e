use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use super::lifecycle::RetrievedPaste;
use super::time::{from_unix_seconds, parse_timestamp};

/// Shape shared by every response body, success or failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: u16,
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(status: Status, message: impl Into<String>, data: T) -> Self {
        Self {
            status: status.code,
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(status: Status, message: impl Into<String>) -> Self {
        Self {
            status: status.code,
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

/// `expiresAt` as sent by clients: UNIX seconds or an RFC 3339 string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TimestampInput {
    Seconds(i64),
    Text(String),
}

impl TimestampInput {
    /// Resolves to UNIX milliseconds. Empty strings mean "no expiry".
    pub fn resolve(&self) -> Result<Option<i64>, String> {
        match self {
            TimestampInput::Seconds(seconds) => from_unix_seconds(*seconds)
                .map(Some)
                .ok_or_else(|| format!("{seconds} is out of range")),
            TimestampInput::Text(text) if text.trim().is_empty() => Ok(None),
            TimestampInput::Text(text) => parse_timestamp(text).map(Some),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct CreatePasteRequest {
    pub content: String,
    pub password: Option<String>,
    pub expires_at: Option<TimestampInput>,
    pub expire_after_viewing: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UnlockRequest {
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedPaste {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteView {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expire_after_viewing: bool,
}

impl From<RetrievedPaste> for PasteView {
    fn from(paste: RetrievedPaste) -> Self {
        Self {
            id: paste.id,
            content: paste.content,
            created_at: paste.created_at,
            expires_at: paste.expires_at,
            expire_after_viewing: paste.expire_after_viewing,
        }
    }
}
