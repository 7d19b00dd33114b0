//! Release metadata lookup and source-distribution selection.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::effects::RegistryClient;
use crate::net::get_with_retries;
use crate::HarvestError;

/// Kind tag carried by source distributions in the registry's `python_version` field.
pub const SOURCE_KIND: &str = "source";

/// Registry answer for `GET {registry}/{package}/json`, reduced to what selection reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ReleaseMetadata {
    /// Distributions of the current release.
    pub urls: Vec<DistributionFile>,
    pub releases: BTreeMap<String, Vec<DistributionFile>>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DistributionFile {
    #[serde(rename = "python_version")]
    pub kind: String,
    pub url: String,
}

impl DistributionFile {
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.kind == SOURCE_KIND
    }
}

/// Download location of a package's source archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDistributionUrl(Url);

impl SourceDistributionUrl {
    pub fn parse(raw: &str) -> Result<Self, HarvestError> {
        Url::parse(raw)
            .map(Self)
            .map_err(|err| HarvestError::format(raw, format!("invalid distribution url: {err}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SourceDistributionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolves a package (and optional release) to its source archive URL.
pub struct ReleaseResolver<'a> {
    registry: &'a dyn RegistryClient,
}

impl<'a> ReleaseResolver<'a> {
    #[must_use]
    pub fn new(registry: &'a dyn RegistryClient) -> Self {
        Self { registry }
    }

    /// Fetch metadata for `package` and pick its source distribution.
    ///
    /// # Errors
    ///
    /// `VersionNotFound` and `NoSourceAvailable` are ordinary per-package
    /// answers; transport and payload problems surface as `Network`/`Format`.
    pub fn resolve(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<SourceDistributionUrl, HarvestError> {
        let metadata = self.registry.fetch_metadata(package)?;
        select_source(package, &metadata, version)
    }
}

/// Pick the first source distribution of the requested (or current) release.
pub fn select_source(
    package: &str,
    metadata: &ReleaseMetadata,
    version: Option<&str>,
) -> Result<SourceDistributionUrl, HarvestError> {
    let files = match version {
        None => &metadata.urls,
        Some(version) => {
            metadata
                .releases
                .get(version)
                .ok_or_else(|| HarvestError::VersionNotFound {
                    package: package.to_string(),
                    requested: version.to_string(),
                    available: metadata.releases.keys().cloned().collect(),
                })?
        }
    };
    let file = files
        .iter()
        .find(|file| file.is_source())
        .ok_or_else(|| HarvestError::NoSourceAvailable {
            package: package.to_string(),
        })?;
    debug!(package, url = %file.url, "selected source distribution");
    SourceDistributionUrl::parse(&file.url)
}

pub(crate) fn metadata_url(base_url: &str, package: &str) -> String {
    format!("{}/{package}/json", base_url.trim_end_matches('/'))
}

pub(crate) fn fetch_metadata(
    client: &Client,
    base_url: &str,
    package: &str,
    attempts: usize,
) -> Result<ReleaseMetadata, HarvestError> {
    let url = metadata_url(base_url, package);
    let response = get_with_retries(client, &url, attempts)?;
    let body = response
        .text()
        .map_err(|err| HarvestError::network(url.as_str(), err))?;
    serde_json::from_str(&body).map_err(|err| HarvestError::format(url, err))
}
