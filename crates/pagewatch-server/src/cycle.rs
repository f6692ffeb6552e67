//! One fetch → extract → store cycle, and the running tally of cycles.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use pagewatch::{extract_title, PersistError, Snapshot, SnapshotStore};
use serde::Serialize;
use url::Url;

use crate::fetch::{FetchError, Fetcher};

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The snapshot was replaced. `persist_error` is set when the durable
    /// mirror could not be written; the in-memory snapshot stands regardless.
    Updated {
        fetched_at: DateTime<Utc>,
        title: String,
        body_len: usize,
        persist_error: Option<PersistError>,
    },
    /// The page was fetched but has no title; the snapshot was left alone.
    NoTitle { body_len: usize },
    /// The fetch failed; the snapshot was left alone.
    Failed(FetchError),
}

impl CycleOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, CycleOutcome::Updated { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Updated {
                persist_error: None,
                ..
            } => "updated",
            CycleOutcome::Updated { .. } => "updated_not_persisted",
            CycleOutcome::NoTitle { .. } => "no_title",
            CycleOutcome::Failed(e) => e.kind(),
        }
    }
}

/// Apply a fetch result to the store.
///
/// Only a body with a title replaces the snapshot; every other result leaves
/// the store exactly as it was.
pub fn settle(
    store: &SnapshotStore,
    source_url: &str,
    fetched: Result<Vec<u8>, FetchError>,
    fetched_at: DateTime<Utc>,
) -> CycleOutcome {
    let body = match fetched {
        Ok(body) => body,
        Err(e) => return CycleOutcome::Failed(e),
    };

    let Some(title) = extract_title(&body) else {
        return CycleOutcome::NoTitle {
            body_len: body.len(),
        };
    };

    let body_len = body.len();
    let persist_error = store
        .commit(Snapshot::captured(source_url, fetched_at, title.clone(), body))
        .err();

    CycleOutcome::Updated {
        fetched_at,
        title,
        body_len,
        persist_error,
    }
}

/// Counters and last-outcome details, read by `/health`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub attempted: u64,
    pub updated: u64,
    pub failed: u64,
    pub no_title: u64,
    pub persist_failures: u64,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
}

/// Shared, lock-protected [`CycleReport`].
#[derive(Debug, Default)]
pub struct CycleStats {
    inner: Mutex<CycleReport>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, at: DateTime<Utc>, outcome: &CycleOutcome) {
        let mut report = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        report.attempted += 1;
        report.last_attempt_at = Some(at);
        report.last_outcome = Some(outcome.label().to_string());

        match outcome {
            CycleOutcome::Updated { persist_error, .. } => {
                report.updated += 1;
                report.last_success_at = Some(at);
                match persist_error {
                    Some(e) => {
                        report.persist_failures += 1;
                        report.last_error = Some(format!("persist: {e}"));
                    }
                    None => report.last_error = None,
                }
            }
            CycleOutcome::NoTitle { .. } => {
                report.no_title += 1;
                report.last_error = Some("no <title> element in body".to_string());
            }
            CycleOutcome::Failed(e) => {
                report.failed += 1;
                report.last_error = Some(e.to_string());
            }
        }
    }

    pub fn snapshot(&self) -> CycleReport {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Everything one cycle needs, owned by the scheduler task.
#[derive(Debug, Clone)]
pub struct Pipeline {
    target: Url,
    fetcher: Fetcher,
    store: Arc<SnapshotStore>,
    stats: Arc<CycleStats>,
}

impl Pipeline {
    pub fn new(
        target: Url,
        fetcher: Fetcher,
        store: Arc<SnapshotStore>,
        stats: Arc<CycleStats>,
    ) -> Self {
        Self {
            target,
            fetcher,
            store,
            stats,
        }
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    /// Run one cycle. Never fails: every outcome is logged and counted.
    pub async fn run_once(&self) -> CycleOutcome {
        let started = std::time::Instant::now();
        let fetched = self.fetcher.fetch(&self.target).await.map(|f| {
            if f.hops > 0 {
                tracing::debug!("fetched {} after {} redirect(s)", f.final_url, f.hops);
            }
            f.body
        });
        let fetched_at = Utc::now();
        let outcome = settle(&self.store, self.target.as_str(), fetched, fetched_at);

        match &outcome {
            CycleOutcome::Updated {
                fetched_at,
                title,
                body_len,
                persist_error,
            } => {
                tracing::info!(
                    "[OK] {} title={:?} bytes={} elapsed_ms={}",
                    fetched_at.to_rfc3339(),
                    title,
                    body_len,
                    started.elapsed().as_millis()
                );
                if let Some(e) = persist_error {
                    tracing::warn!("snapshot kept in memory but not persisted: {e}");
                }
            }
            CycleOutcome::NoTitle { body_len } => {
                tracing::warn!(
                    "fetched {} ({body_len} bytes) but found no <title>; snapshot unchanged",
                    self.target
                );
            }
            CycleOutcome::Failed(e) => {
                tracing::warn!("[ERROR] fetch of {} failed ({}): {e}", self.target, e.kind());
            }
        }

        self.stats.record(fetched_at, &outcome);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    const URL: &str = "https://example.com/";

    #[test]
    fn test_settle_updates_on_title() {
        let store = SnapshotStore::new(URL);
        let at = Utc::now();
        let outcome = settle(&store, URL, Ok(b"<title>Hello</title>".to_vec()), at);

        assert!(outcome.is_updated());
        let snap = store.read();
        assert_eq!(snap.title(), Some("Hello"));
        assert_eq!(snap.fetched_at(), Some(at));
        assert_eq!(snap.raw_body(), b"<title>Hello</title>");
    }

    #[test]
    fn test_settle_failure_leaves_store_unchanged() {
        let store = SnapshotStore::new(URL);
        settle(&store, URL, Ok(b"<title>Good</title>".to_vec()), Utc::now());
        let before = store.read();

        let outcome = settle(&store, URL, Err(FetchError::HttpStatus(404)), Utc::now());
        assert!(matches!(outcome, CycleOutcome::Failed(FetchError::HttpStatus(404))));
        assert_eq!(*store.read(), *before);
    }

    #[test]
    fn test_settle_no_title_leaves_store_unchanged() {
        let store = SnapshotStore::new(URL);
        let outcome = settle(&store, URL, Ok(b"<p>untitled</p>".to_vec()), Utc::now());
        assert!(matches!(outcome, CycleOutcome::NoTitle { body_len: 15 }));
        assert!(store.read().capture.is_none());
    }

    #[test]
    fn test_stats_record_each_outcome() {
        let stats = CycleStats::new();
        let store = SnapshotStore::new(URL);
        let now = Utc::now();

        stats.record(now, &settle(&store, URL, Ok(b"<title>A</title>".to_vec()), now));
        stats.record(now, &settle(&store, URL, Ok(b"nothing".to_vec()), now));
        stats.record(
            now,
            &settle(&store, URL, Err(FetchError::Timeout(Duration::from_secs(15))), now),
        );

        let report = stats.snapshot();
        assert_eq!(report.attempted, 3);
        assert_eq!(report.updated, 1);
        assert_eq!(report.no_title, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.last_success_at, Some(now));
        assert_eq!(report.last_outcome.as_deref(), Some("timeout"));
        assert!(report.last_error.unwrap().starts_with("Timeout"));
    }

    #[derive(Debug, Clone)]
    enum Step {
        Titled(String),
        Untitled,
        Failed(u16),
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            "[A-Za-z0-9 ]{0,12}".prop_map(Step::Titled),
            Just(Step::Untitled),
            (400u16..600).prop_map(Step::Failed),
        ]
    }

    proptest! {
        #[test]
        fn prop_title_and_body_travel_together(steps in prop::collection::vec(step(), 0..24)) {
            let store = SnapshotStore::new(URL);
            for step in steps {
                let before = store.read();
                let fetched = match &step {
                    Step::Titled(t) => Ok(format!("<html><title>{t}</title></html>").into_bytes()),
                    Step::Untitled => Ok(b"<html></html>".to_vec()),
                    Step::Failed(code) => Err(FetchError::HttpStatus(*code)),
                };
                let outcome = settle(&store, URL, fetched, Utc::now());
                let after = store.read();

                prop_assert_eq!(after.title().is_some(), !after.raw_body().is_empty());
                prop_assert_eq!(after.title().is_some(), after.fetched_at().is_some());

                match step {
                    Step::Titled(t) => {
                        prop_assert!(outcome.is_updated());
                        prop_assert_eq!(after.title(), Some(t.trim()));
                    }
                    _ => prop_assert_eq!(&*after, &*before),
                }
            }
        }
    }
}
