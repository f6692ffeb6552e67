//! Configuration loading and validation.
//!
//! Every value comes from a command-line flag, then its environment
//! variable, then the default below. The result is validated once into an
//! immutable [`Config`] before anything starts.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use url::Url;

pub const DEFAULT_TARGET: &str = "https://es.wikipedia.org/wiki/Portada";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PERIOD_SECS: u64 = 10 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_REDIRECTS: usize = 5;
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "es";
pub const DEFAULT_DATA_DIR: &str = "data";

/// Client identifier sent with every fetch unless overridden.
pub fn default_user_agent() -> String {
    format!(
        "pagewatch/{} (periodic title snapshot)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Watch settings as given on the command line.
#[derive(Debug, Clone, clap::Args)]
pub struct WatchArgs {
    /// Page to fetch on every cycle.
    #[arg(long, env = "PAGEWATCH_TARGET", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Host the query server binds to.
    #[arg(long, env = "PAGEWATCH_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port the query server binds to.
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Seconds between the starts of two cycles.
    #[arg(long, env = "PAGEWATCH_PERIOD_SECS", default_value_t = DEFAULT_PERIOD_SECS)]
    pub period_secs: u64,

    /// Overall fetch timeout in seconds, redirects included.
    #[arg(long, env = "PAGEWATCH_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout_secs: u64,

    /// Redirect hops to follow before giving up.
    #[arg(long, env = "PAGEWATCH_MAX_REDIRECTS", default_value_t = DEFAULT_MAX_REDIRECTS)]
    pub max_redirects: usize,

    /// User-Agent header for fetches.
    #[arg(long, env = "PAGEWATCH_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Accept-Language header for fetches.
    #[arg(long, env = "PAGEWATCH_ACCEPT_LANGUAGE", default_value = DEFAULT_ACCEPT_LANGUAGE)]
    pub accept_language: String,

    /// Directory holding last.html and last.json.
    #[arg(long, env = "PAGEWATCH_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,
}

/// Validated, immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Url,
    pub host: String,
    pub port: u16,
    pub period: Duration,
    pub timeout: Duration,
    pub max_redirects: usize,
    pub user_agent: String,
    pub accept_language: String,
    pub data_dir: PathBuf,
}

impl Config {
    /// Defaults for everything but the target.
    pub fn for_target(target: &str) -> Result<Self> {
        Ok(Self {
            target: parse_target(target)?,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            period: Duration::from_secs(DEFAULT_PERIOD_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: default_user_agent(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        })
    }

    pub fn from_args(args: &WatchArgs) -> Result<Self> {
        if args.period_secs == 0 {
            bail!("period must be at least one second");
        }
        if args.timeout_secs == 0 {
            bail!("timeout must be at least one second");
        }

        Ok(Self {
            target: parse_target(&args.target)?,
            host: args.host.clone(),
            port: args.port,
            period: Duration::from_secs(args.period_secs),
            timeout: Duration::from_secs(args.timeout_secs),
            max_redirects: args.max_redirects,
            user_agent: args
                .user_agent
                .clone()
                .filter(|ua| !ua.trim().is_empty())
                .unwrap_or_else(default_user_agent),
            accept_language: args.accept_language.clone(),
            data_dir: args.data_dir.clone(),
        })
    }

    /// `host:port` for the query server listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_target(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid target URL: {raw}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => bail!("unsupported target scheme '{other}' (expected http or https)"),
    }
}
