//! In-memory effects for exercising the pipeline without a network.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use crate::archive::testing::{tar_bytes, zip_bytes, Entry, TarCompression};
use crate::effects::{ArchiveSource, Effects, RegistryClient, TopListFetcher};
use crate::registry::{DistributionFile, ReleaseMetadata, SourceDistributionUrl, SOURCE_KIND};
use crate::HarvestError;

enum FakePackage {
    Metadata(ReleaseMetadata),
    Error(HarvestError),
    Panic,
}

pub(crate) struct FakeEffects {
    top: Result<Vec<String>, HarvestError>,
    packages: HashMap<String, FakePackage>,
    archives: HashMap<String, Vec<u8>>,
    resolved: Mutex<Vec<String>>,
}

impl FakeEffects {
    pub(crate) fn new(top: &[&str]) -> Self {
        Self {
            top: Ok(top.iter().map(ToString::to_string).collect()),
            packages: HashMap::new(),
            archives: HashMap::new(),
            resolved: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_top_list(err: HarvestError) -> Self {
        let mut effects = Self::new(&[]);
        effects.top = Err(err);
        effects
    }

    /// Publish `<package>-<version>/` as a gzip tarball sdist.
    pub(crate) fn with_sdist(self, package: &str, version: &str) -> Self {
        let root = format!("{package}-{version}/");
        let module = format!("{package}-{version}/{package}.py");
        let entries: [Entry<'_>; 2] = [
            (root.as_str(), None),
            (module.as_str(), Some("print('hello')\n")),
        ];
        let bytes = tar_bytes(&entries, TarCompression::Gzip);
        self.with_archive(package, version, "tar.gz", bytes)
    }

    pub(crate) fn with_zip_sdist(self, package: &str, version: &str, entries: &[Entry<'_>]) -> Self {
        self.with_archive(package, version, "zip", zip_bytes(entries))
    }

    pub(crate) fn with_archive(
        mut self,
        package: &str,
        version: &str,
        extension: &str,
        bytes: Vec<u8>,
    ) -> Self {
        let url = format!("https://files.invalid/{package}/{package}-{version}.{extension}");
        let file = DistributionFile {
            kind: SOURCE_KIND.to_string(),
            url: url.clone(),
        };
        let metadata = ReleaseMetadata {
            urls: vec![file.clone()],
            releases: BTreeMap::from([(version.to_string(), vec![file])]),
        };
        self.archives.insert(url, bytes);
        self.packages
            .insert(package.to_string(), FakePackage::Metadata(metadata));
        self
    }

    pub(crate) fn with_wheel_only(mut self, package: &str) -> Self {
        let file = DistributionFile {
            kind: "py3".to_string(),
            url: format!("https://files.invalid/{package}/{package}-1.0-py3-none-any.whl"),
        };
        let metadata = ReleaseMetadata {
            urls: vec![file.clone()],
            releases: BTreeMap::from([("1.0".to_string(), vec![file])]),
        };
        self.packages
            .insert(package.to_string(), FakePackage::Metadata(metadata));
        self
    }

    pub(crate) fn with_error(mut self, package: &str, err: HarvestError) -> Self {
        self.packages
            .insert(package.to_string(), FakePackage::Error(err));
        self
    }

    pub(crate) fn with_panic(mut self, package: &str) -> Self {
        self.packages.insert(package.to_string(), FakePackage::Panic);
        self
    }

    /// Packages whose metadata was requested, in call order.
    pub(crate) fn resolved(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

impl TopListFetcher for FakeEffects {
    fn fetch_top(&self) -> Result<Vec<String>, HarvestError> {
        self.top.clone()
    }
}

impl RegistryClient for FakeEffects {
    fn fetch_metadata(&self, package: &str) -> Result<ReleaseMetadata, HarvestError> {
        self.resolved.lock().unwrap().push(package.to_string());
        match self.packages.get(package) {
            Some(FakePackage::Metadata(metadata)) => Ok(metadata.clone()),
            Some(FakePackage::Error(err)) => Err(err.clone()),
            Some(FakePackage::Panic) => panic!("registry client blew up for {package}"),
            None => Err(HarvestError::Network {
                url: format!("https://registry.invalid/{package}/json"),
                message: "HTTP status client error (404 Not Found)".to_string(),
            }),
        }
    }
}

impl ArchiveSource for FakeEffects {
    fn fetch_to(
        &self,
        url: &SourceDistributionUrl,
        sink: &mut dyn Write,
    ) -> Result<u64, HarvestError> {
        let bytes = self
            .archives
            .get(url.as_str())
            .ok_or_else(|| HarvestError::network(url.as_str(), "connection refused"))?;
        sink.write_all(bytes)
            .map_err(|err| HarvestError::io(Path::new(url.as_str()), err))?;
        Ok(bytes.len() as u64)
    }
}

impl Effects for FakeEffects {
    fn top_list(&self) -> &dyn TopListFetcher {
        self
    }

    fn registry(&self) -> &dyn RegistryClient {
        self
    }

    fn archives(&self) -> &dyn ArchiveSource {
        self
    }
}
