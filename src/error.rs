//! Error types for the sheet pipeline, cache, and vCard export.
//!
//! None of these ever reach a page render: callers fall back to the last good
//! cache (or an empty list) and decide on user-facing wording themselves.

use thiserror::Error;

/// Failure fetching the published sheet.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("upstream returned an empty body")]
    EmptyBody,

    #[error("upstream served an HTML page instead of CSV")]
    NotCsv,
}

/// Payload could not be shaped into contact rows.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload contained no rows")]
    NoRows,

    #[error("single-line payload had only {0} cells (need at least 5)")]
    TooFewCells(usize),

    #[error("no usable contacts in payload")]
    NoContacts,
}

/// Failure persisting the contact cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to move cache file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// vCard export rejected its input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VcardError {
    #[error("invalid name format")]
    InvalidName,

    #[error("invalid phone number format")]
    InvalidNumber,
}
