//! Blocking fetch of the published sheet.

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CACHE_CONTROL, EXPIRES, PRAGMA};
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::url::retry_url;
use crate::error::FetchError;

pub const USER_AGENT: &str = "EmergencyContacts/1.0";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const TOTAL_TIMEOUT: Duration = Duration::from_secs(8);

/// Bytes inspected when deciding whether a payload is an HTML page.
const SNIFF_LEN: usize = 200;
const MAX_REDIRECTS: usize = 10;

/// Raw payload plus its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedSheet {
    pub body: String,
    /// Lowercase hex SHA-256 of the raw bytes.
    pub hash: String,
}

impl FetchedSheet {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            body: String::from_utf8_lossy(bytes).into_owned(),
            hash: content_hash(bytes),
        }
    }
}

/// Where sheet payloads come from. Every error means "use the last good cache".
pub trait SheetSource: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedSheet, FetchError>;
}

/// HTTP implementation of [`SheetSource`]. Certificates are always verified.
pub struct SheetFetcher {
    client: Client,
}

impl SheetFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(TOTAL_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/csv, */*;q=0.8")
            .header(CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(EXPIRES, "0")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.bytes()?.to_vec())
    }
}

impl SheetSource for SheetFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedSheet, FetchError> {
        fetch_with_retry(url, |u| self.get(u))
    }
}

/// Run `get`, retrying once with a fresh marker when the publish endpoint
/// answers with an HTML page.
pub fn fetch_with_retry<F>(url: &str, mut get: F) -> Result<FetchedSheet, FetchError>
where
    F: FnMut(&str) -> Result<Vec<u8>, FetchError>,
{
    let body = non_empty(get(url)?)?;
    if !looks_like_html(&body) {
        return Ok(FetchedSheet::from_bytes(&body));
    }

    tracing::warn!("sheet endpoint served HTML instead of CSV; retrying once");
    let body = non_empty(get(&retry_url(url))?)?;
    if looks_like_html(&body) {
        tracing::warn!("retry also returned HTML; giving up");
        return Err(FetchError::NotCsv);
    }
    Ok(FetchedSheet::from_bytes(&body))
}

fn non_empty(body: Vec<u8>) -> Result<Vec<u8>, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        Err(FetchError::EmptyBody)
    } else {
        Ok(body)
    }
}

pub fn looks_like_html(body: &[u8]) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let end = (start + SNIFF_LEN).min(body.len());
    let snippet = String::from_utf8_lossy(&body[start..end]).to_lowercase();
    snippet.contains("<!doctype html") || snippet.contains("<html")
}

pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
