//! pagewatch server: fetches one page on a fixed period, keeps its title as
//! the current snapshot, and serves that snapshot over HTTP.

pub mod config;
pub mod cycle;
pub mod fetch;
pub mod rest;
pub mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use pagewatch::{SnapshotMirror, SnapshotStore};

pub use config::{Config, WatchArgs};
pub use cycle::{CycleOutcome, CycleStats, Pipeline};
pub use fetch::{FetchError, Fetcher};
pub use rest::AppState;
pub use scheduler::RepeatingTask;

/// Store, statistics and pipeline wired from one configuration.
///
/// Building this is where startup can fail: the data directory and the HTTP
/// client must both be usable before anything runs.
pub struct Watch {
    pub store: Arc<SnapshotStore>,
    pub stats: Arc<CycleStats>,
    pub pipeline: Pipeline,
}

impl Watch {
    pub fn build(config: &Config) -> Result<Self> {
        let mirror = SnapshotMirror::open(&config.data_dir).with_context(|| {
            format!(
                "failed to create data directory: {}",
                config.data_dir.display()
            )
        })?;
        let store = Arc::new(SnapshotStore::with_mirror(config.target.as_str(), mirror));
        let stats = Arc::new(CycleStats::new());
        let fetcher = Fetcher::from_config(config).context("failed to build HTTP client")?;
        let pipeline = Pipeline::new(
            config.target.clone(),
            fetcher,
            Arc::clone(&store),
            Arc::clone(&stats),
        );
        Ok(Self {
            store,
            stats,
            pipeline,
        })
    }

    /// Start the repeating cycle on the current runtime.
    pub fn spawn_scheduler(&self, config: &Config) -> tokio::task::JoinHandle<()> {
        let pipeline = self.pipeline.clone();
        RepeatingTask::new("snapshot", config.period).spawn(move || {
            let pipeline = pipeline.clone();
            async move {
                pipeline.run_once().await;
            }
        })
    }

    pub fn app_state(&self) -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::clone(&self.store),
            Arc::clone(&self.stats),
        ))
    }
}

/// Run the scheduler and the query server until the process is killed.
pub async fn run(config: Config) -> Result<()> {
    let watch = Watch::build(&config)?;
    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(
        "starting pagewatch v{} target={} period={}s timeout={}s data_dir={}",
        env!("CARGO_PKG_VERSION"),
        config.target,
        config.period.as_secs(),
        config.timeout.as_secs(),
        config.data_dir.display()
    );

    let scheduler = watch.spawn_scheduler(&config);
    let result = rest::serve(listener, watch.app_state()).await;
    scheduler.abort();
    result
}

/// Run a single cycle and return its outcome along with the store.
pub async fn run_once(config: &Config) -> Result<(CycleOutcome, Arc<SnapshotStore>)> {
    let watch = Watch::build(config)?;
    let outcome = watch.pipeline.run_once().await;
    Ok((outcome, watch.store))
}
