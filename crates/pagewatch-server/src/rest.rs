//! HTTP query server for the current snapshot.
//!
//! Every route is a read of the [`SnapshotStore`]; nothing here fetches.
//! Absent data is rendered as placeholders or `null`, never as an error
//! status, and unknown paths fall back to the summary page.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use pagewatch::SnapshotStore;
use serde_json::Value;
use tower_http::trace::TraceLayer;

use crate::cycle::CycleStats;

/// Body served on `/raw` before the first successful cycle.
pub const RAW_PLACEHOLDER: &str = "<!-- no HTML downloaded yet -->";

/// Shown on the summary page for absent values.
const ABSENT: &str = "—";

const HTML_UTF8: &str = "text/html; charset=utf-8";
const JSON_UTF8: &str = "application/json; charset=utf-8";

/// State shared by all handlers.
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub stats: Arc<CycleStats>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(store: Arc<SnapshotStore>, stats: Arc<CycleStats>) -> Self {
        Self {
            store,
            stats,
            started_at: Instant::now(),
        }
    }
}

/// Build the router with all query routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(summary))
        .route("/json", get(document))
        .route("/raw", get(raw))
        .route("/health", get(health))
        .fallback(summary)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until the process ends.
pub async fn serve(listener: tokio::net::TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    tracing::info!("query server listening on http://{addr}  routes: /  /json  /raw  /health");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────

async fn summary(State(state): State<Arc<AppState>>) -> Html<String> {
    let snap = state.store.read();
    let fetched_at = snap
        .fetched_at()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ABSENT.to_string());
    let title = snap.title().unwrap_or(ABSENT);
    let url = escape_html(&snap.source_url);

    Html(format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8" />
  <title>pagewatch</title>
  <style>
    body {{ font-family: system-ui, Arial; padding: 24px; max-width: 760px; margin: 0 auto; }}
    .muted {{ color: #666; font-size: 0.95rem; }}
    code {{ font-family: ui-monospace, Menlo, Consolas, monospace; }}
  </style>
</head>
<body>
  <h1>pagewatch</h1>
  <p class="muted">Fetches <code>{url}</code> periodically and keeps its <code>&lt;title&gt;</code>.</p>

  <h2>Latest snapshot</h2>
  <ul>
    <li><b>URL:</b> <code>{url}</code></li>
    <li><b>Fetched at:</b> <code>{fetched_at}</code></li>
    <li><b>Title:</b> <code>{title}</code></li>
  </ul>

  <h3>Endpoints</h3>
  <ul>
    <li><a href="/json">/json</a> structured snapshot</li>
    <li><a href="/raw">/raw</a> last raw HTML</li>
    <li><a href="/health">/health</a> cycle statistics</li>
  </ul>
</body>
</html>"#,
        fetched_at = escape_html(&fetched_at),
        title = escape_html(title),
    ))
}

async fn document(State(state): State<Arc<AppState>>) -> Response {
    let snap = state.store.read();
    let body = snap.document().to_pretty_json().unwrap_or_else(|e| {
        tracing::warn!("failed to serialize snapshot document: {e}");
        "{}".to_string()
    });
    ([(header::CONTENT_TYPE, JSON_UTF8)], body).into_response()
}

async fn raw(State(state): State<Arc<AppState>>) -> Response {
    let snap = state.store.read();
    let body = if snap.capture.is_some() {
        snap.raw_body().to_vec()
    } else {
        RAW_PLACEHOLDER.as_bytes().to_vec()
    };
    ([(header::CONTENT_TYPE, HTML_UTF8)], body).into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snap = state.store.read();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs_f64(),
        "target": snap.source_url,
        "has_snapshot": snap.capture.is_some(),
        "cycles": state.stats.snapshot(),
    }))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
