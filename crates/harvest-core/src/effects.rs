//! Side-effect seams: everything that talks to the network goes through these traits.

use std::io::{self, Write};

use reqwest::blocking::Client;

use crate::config::HarvestConfig;
use crate::net::{get_with_retries, http_client};
use crate::registry::{self, ReleaseMetadata, SourceDistributionUrl};
use crate::{ranking, HarvestError};

/// Retrieves the ranked list of most-downloaded package names.
pub trait TopListFetcher: Send + Sync {
    fn fetch_top(&self) -> Result<Vec<String>, HarvestError>;
}

pub trait RegistryClient: Send + Sync {
    fn fetch_metadata(&self, package: &str) -> Result<ReleaseMetadata, HarvestError>;
}

/// Streams the bytes behind a distribution URL into `sink`, returning the byte count.
pub trait ArchiveSource: Send + Sync {
    fn fetch_to(
        &self,
        url: &SourceDistributionUrl,
        sink: &mut dyn Write,
    ) -> Result<u64, HarvestError>;
}

pub trait Effects: Send + Sync {
    fn top_list(&self) -> &dyn TopListFetcher;
    fn registry(&self) -> &dyn RegistryClient;
    fn archives(&self) -> &dyn ArchiveSource;
}

/// HTTP-backed effects sharing one connection pool.
pub struct SystemEffects {
    top_list: SystemTopListFetcher,
    registry: SystemRegistryClient,
    archives: SystemArchiveSource,
}

impl SystemEffects {
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let client = http_client(&config.network)?;
        let attempts = config.network.attempts;
        Ok(Self {
            top_list: SystemTopListFetcher {
                client: client.clone(),
                url: config.ranking.url(),
                attempts,
            },
            registry: SystemRegistryClient {
                client: client.clone(),
                base_url: config.registry.base_url.clone(),
                attempts,
            },
            archives: SystemArchiveSource { client, attempts },
        })
    }
}

impl Effects for SystemEffects {
    fn top_list(&self) -> &dyn TopListFetcher {
        &self.top_list
    }

    fn registry(&self) -> &dyn RegistryClient {
        &self.registry
    }

    fn archives(&self) -> &dyn ArchiveSource {
        &self.archives
    }
}

struct SystemTopListFetcher {
    client: Client,
    url: String,
    attempts: usize,
}

impl TopListFetcher for SystemTopListFetcher {
    fn fetch_top(&self) -> Result<Vec<String>, HarvestError> {
        ranking::fetch_ranking(&self.client, &self.url, self.attempts)
    }
}

struct SystemRegistryClient {
    client: Client,
    base_url: String,
    attempts: usize,
}

impl RegistryClient for SystemRegistryClient {
    fn fetch_metadata(&self, package: &str) -> Result<ReleaseMetadata, HarvestError> {
        registry::fetch_metadata(&self.client, &self.base_url, package, self.attempts)
    }
}

struct SystemArchiveSource {
    client: Client,
    attempts: usize,
}

impl ArchiveSource for SystemArchiveSource {
    fn fetch_to(
        &self,
        url: &SourceDistributionUrl,
        sink: &mut dyn Write,
    ) -> Result<u64, HarvestError> {
        let mut response = get_with_retries(&self.client, url.as_str(), self.attempts)?;
        io::copy(&mut response, sink)
            .map_err(|err| HarvestError::network(url.as_str(), format!("stream error: {err}")))
    }
}
