//! Run configuration assembled from the process environment and CLI flags.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_REGISTRY_URL: &str = "https://pypi.org/pypi";
pub const DEFAULT_RANKING_URL: &str =
    "https://hugovk.github.io/top-pypi-packages/top-pypi-packages-{days}-days.json";
pub const DEFAULT_WORKERS: usize = 24;
pub const MAX_WORKERS: usize = 64;
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_HTTP_ATTEMPTS: usize = 3;

/// Options shared by every command, mirrored from the CLI's global flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Time window of the download ranking snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RankingWindow {
    Days30,
    #[default]
    Days365,
}

impl RankingWindow {
    #[must_use]
    pub fn days(self) -> u16 {
        match self {
            Self::Days30 => 30,
            Self::Days365 => 365,
        }
    }
}

impl FromStr for RankingWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "30" => Ok(Self::Days30),
            "365" => Ok(Self::Days365),
            other => Err(format!("ranking window must be 30 or 365 days (got {other})")),
        }
    }
}

impl fmt::Display for RankingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.days())
    }
}

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// URL template; `{days}` is replaced with the window length.
    pub url_template: String,
    pub window: RankingWindow,
}

impl RankingConfig {
    #[must_use]
    pub fn url(&self) -> String {
        self.url_template
            .replace("{days}", &self.window.days().to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub timeout: Duration,
    pub attempts: usize,
    pub keep_proxies: bool,
}

#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub registry: RegistryConfig,
    pub ranking: RankingConfig,
    pub network: NetworkConfig,
    pub workers: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                base_url: DEFAULT_REGISTRY_URL.to_string(),
            },
            ranking: RankingConfig {
                url_template: DEFAULT_RANKING_URL.to_string(),
                window: RankingWindow::default(),
            },
            network: NetworkConfig {
                timeout: DEFAULT_HTTP_TIMEOUT,
                attempts: DEFAULT_HTTP_ATTEMPTS,
                keep_proxies: false,
            },
            workers: DEFAULT_WORKERS,
        }
    }
}

impl HarvestConfig {
    /// Builds a configuration snapshot from the current process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_snapshot(&EnvSnapshot::capture())
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot) -> Self {
        let defaults = Self::default();
        Self {
            registry: RegistryConfig {
                base_url: snapshot
                    .var("HARVEST_REGISTRY_URL")
                    .map(|value| value.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.registry.base_url),
            },
            ranking: RankingConfig {
                url_template: snapshot
                    .var("HARVEST_RANKING_URL")
                    .map(ToOwned::to_owned)
                    .unwrap_or(defaults.ranking.url_template),
                window: parsed_or(snapshot, "HARVEST_DAYS", defaults.ranking.window),
            },
            network: NetworkConfig {
                timeout: timeout_or(snapshot, "HARVEST_HTTP_TIMEOUT", defaults.network.timeout),
                attempts: parsed_or(snapshot, "HARVEST_HTTP_ATTEMPTS", defaults.network.attempts)
                    .max(1),
                keep_proxies: crate::net::keep_proxies(snapshot),
            },
            workers: clamp_workers(parsed_or(snapshot, "HARVEST_WORKERS", defaults.workers)),
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: Option<usize>) -> Self {
        if let Some(workers) = workers {
            self.workers = clamp_workers(workers);
        }
        self
    }

    #[must_use]
    pub fn with_window(mut self, window: Option<RankingWindow>) -> Self {
        if let Some(window) = window {
            self.ranking.window = window;
        }
        self
    }
}

pub(crate) fn clamp_workers(requested: usize) -> usize {
    requested.clamp(1, MAX_WORKERS)
}

/// Whole seconds; zero would fail every request, so it counts as invalid.
fn timeout_or(snapshot: &EnvSnapshot, key: &str, default: Duration) -> Duration {
    match parsed_or(snapshot, key, default.as_secs()) {
        0 => {
            warn!(key, value = 0, "ignoring invalid configuration value");
            default
        }
        secs => Duration::from_secs(secs),
    }
}

fn parsed_or<T>(snapshot: &EnvSnapshot, key: &str, default: T) -> T
where
    T: FromStr,
{
    match snapshot.var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = raw, "ignoring invalid configuration value");
            default
        }),
        None => default,
    }
}
