//! Core data types for the page snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Fixed description of how the title is obtained, carried in every
/// structured document.
pub const EXTRACTION_NOTES: &str = "title taken from the first <title> element";

/// What one successful cycle produced.
///
/// The timestamp, title and body only ever travel together, so a snapshot
/// either has all three or none of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// When the body was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Trimmed inner text of the first `<title>` element.
    pub title: String,
    /// Body bytes exactly as received.
    pub raw_body: Vec<u8>,
}

/// The current view of the watched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Target URL, fixed at startup.
    pub source_url: String,
    /// Latest successful capture, `None` until the first cycle succeeds.
    pub capture: Option<Capture>,
}

impl Snapshot {
    /// A snapshot with no capture yet.
    pub fn empty(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            capture: None,
        }
    }

    /// A snapshot holding a fresh capture.
    pub fn captured(
        source_url: impl Into<String>,
        fetched_at: DateTime<Utc>,
        title: impl Into<String>,
        raw_body: Vec<u8>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            capture: Some(Capture {
                fetched_at,
                title: title.into(),
                raw_body,
            }),
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.capture.as_ref().map(|c| c.fetched_at)
    }

    pub fn title(&self) -> Option<&str> {
        self.capture.as_ref().map(|c| c.title.as_str())
    }

    /// Raw body of the latest capture; empty before the first success.
    pub fn raw_body(&self) -> &[u8] {
        self.capture
            .as_ref()
            .map(|c| c.raw_body.as_slice())
            .unwrap_or(&[])
    }

    /// Structured view used by the JSON route and the mirror file.
    pub fn document(&self) -> SnapshotDocument<'_> {
        SnapshotDocument {
            url: &self.source_url,
            fetched_at: self.fetched_at(),
            title: self.title(),
            notes: EXTRACTION_NOTES,
        }
    }
}

/// Serializable form of a [`Snapshot`], without the raw body.
///
/// Absent values serialize as `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument<'a> {
    pub url: &'a str,
    pub fetched_at: Option<DateTime<Utc>>,
    pub title: Option<&'a str>,
    pub notes: &'static str,
}

impl SnapshotDocument<'_> {
    /// Pretty-printed JSON text.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Failure to mirror a snapshot to disk.
#[derive(thiserror::Error, Debug)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience result type for mirror operations.
pub type PersistResult<T> = Result<T, PersistError>;
