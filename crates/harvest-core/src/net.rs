use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use tracing::debug;

use crate::config::{EnvSnapshot, NetworkConfig};
use crate::HarvestError;

const USER_AGENT: &str = concat!("harvest/", env!("CARGO_PKG_VERSION"));
const RETRY_BACKOFF: Duration = Duration::from_millis(150);
const PROXY_KEYS: &[&str] = &[
    "HTTP_PROXY",
    "http_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "ALL_PROXY",
    "all_proxy",
    "NO_PROXY",
    "no_proxy",
];

/// Decide whether harvest should honor standard proxy environment variables.
///
/// Behavior:
/// - `HARVEST_KEEP_PROXIES=1/true/yes/on` forces proxies on.
/// - `HARVEST_KEEP_PROXIES=0/false/no/off/""` forces proxies off.
/// - If unset, proxies are enabled only when at least one proxy env var is set.
pub(crate) fn keep_proxies(snapshot: &EnvSnapshot) -> bool {
    if let Some(raw) = snapshot.var("HARVEST_KEEP_PROXIES") {
        let value = raw.trim().to_ascii_lowercase();
        return !matches!(value.as_str(), "" | "0" | "false" | "no" | "off");
    }
    PROXY_KEYS
        .iter()
        .any(|key| snapshot.var(key).is_some_and(|value| !value.trim().is_empty()))
}

pub(crate) fn http_client(network: &NetworkConfig) -> Result<Client, HarvestError> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(network.timeout);
    if !network.keep_proxies {
        builder = builder.no_proxy();
    }
    builder
        .build()
        .map_err(|err| HarvestError::network("<client>", format!("failed to build http client: {err}")))
}

/// Issue a GET, retrying transport failures and 5xx answers with linear backoff.
///
/// Client errors (4xx) are returned immediately.
pub(crate) fn get_with_retries(
    client: &Client,
    url: &str,
    attempts: usize,
) -> Result<Response, HarvestError> {
    let attempts = attempts.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        match client.get(url).send() {
            Ok(response) if response.status().is_server_error() => {
                last_err = Some(HarvestError::network(
                    url,
                    format!("server answered {}", response.status()),
                ));
            }
            Ok(response) if !response.status().is_success() => {
                return Err(HarvestError::network(
                    url,
                    format!("server answered {}", response.status()),
                ));
            }
            Ok(response) => return Ok(response),
            Err(err) => last_err = Some(HarvestError::network(url, err)),
        }
        if attempt < attempts {
            debug!(url, attempt, "retrying request");
            thread::sleep(RETRY_BACKOFF * u32::try_from(attempt).unwrap_or(u32::MAX));
        }
    }
    Err(last_err.unwrap_or_else(|| HarvestError::network(url, "no attempts made")))
}

#[cfg(test)]
pub(crate) fn test_client() -> Client {
    Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("test http client")
}
