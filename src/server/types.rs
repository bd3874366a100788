//! JSON bodies for the directory endpoints.

use serde::{Deserialize, Serialize};

use crate::models::ContactCard;
use crate::refresh::{DirectoryLoad, LoadOrigin};

pub const MSG_NO_CHANGES: &str = "No changes detected. Cache is up to date.";
pub const MSG_REFRESHED: &str = "Cache refreshed successfully";
pub const MSG_EMPTY_DIRECTORY: &str =
    "No emergency contacts are available right now. Please check back later.";

/// Result of a manual refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    pub message: String,
    pub contacts_count: usize,
    pub timestamp: i64,
    pub data_hash: Option<String>,
    pub cache_used: bool,
}

impl FetchResponse {
    /// `None` when the load produced nothing to report.
    pub fn from_load(load: &DirectoryLoad) -> Option<Self> {
        let message = match load.origin {
            LoadOrigin::Empty => return None,
            LoadOrigin::Cache => MSG_NO_CHANGES,
            LoadOrigin::Fresh => MSG_REFRESHED,
        };
        Some(Self {
            success: true,
            message: message.to_string(),
            contacts_count: load.contacts.len(),
            timestamp: load
                .envelope
                .as_ref()
                .map_or_else(|| chrono::Utc::now().timestamp(), |e| e.timestamp),
            data_hash: load.envelope.as_ref().map(|e| e.data_hash.clone()),
            cache_used: load.cache_used(),
        })
    }
}

/// `{ "success": false, "error": ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Rate limit exceeded error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitErrorResponse {
    pub success: bool,
    pub error: String,
    pub retry_after_seconds: u64,
}

/// Cards for the contacts page.
#[derive(Debug, Clone, Serialize)]
pub struct ContactsResponse {
    pub contacts: Vec<ContactCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<String>,
    /// RFC 3339 time of the fetch that produced the list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CacheEnvelope;

    fn load(origin: LoadOrigin) -> DirectoryLoad {
        DirectoryLoad {
            contacts: Vec::new(),
            envelope: Some(CacheEnvelope {
                timestamp: 1_700_000_000,
                data_hash: "abc".to_string(),
                contact_count: 0,
            }),
            origin,
        }
    }

    #[test]
    fn test_fetch_response_messages() {
        let cached = FetchResponse::from_load(&load(LoadOrigin::Cache)).unwrap();
        assert_eq!(cached.message, MSG_NO_CHANGES);
        assert!(cached.cache_used);
        assert_eq!(cached.timestamp, 1_700_000_000);
        assert_eq!(cached.data_hash.as_deref(), Some("abc"));

        let fresh = FetchResponse::from_load(&load(LoadOrigin::Fresh)).unwrap();
        assert_eq!(fresh.message, MSG_REFRESHED);
        assert!(!fresh.cache_used);

        assert!(FetchResponse::from_load(&load(LoadOrigin::Empty)).is_none());
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_string(&ErrorResponse::new("Invalid or missing key")).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"Invalid or missing key"}"#);
    }
}
