use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

use crate::effects::ArchiveSource;
use crate::registry::SourceDistributionUrl;
use crate::HarvestError;

const ARCHIVE_SUFFIX: &str = "-src";

/// A downloaded, not-yet-extracted archive.
///
/// The file is removed when the value is dropped, so whoever holds it last
/// cleans it up whether or not extraction succeeded.
#[derive(Debug)]
pub struct ArchiveFile {
    file: NamedTempFile,
    size: u64,
}

impl ArchiveFile {
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the file now, logging instead of failing if that is impossible.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        if let Err(err) = self.file.close() {
            warn!(path = %path.display(), %err, "failed to remove downloaded archive");
        }
    }
}

/// Downloads distribution archives into package-scoped files under a target directory.
pub struct ArchiveFetcher<'a> {
    source: &'a dyn ArchiveSource,
}

impl<'a> ArchiveFetcher<'a> {
    #[must_use]
    pub fn new(source: &'a dyn ArchiveSource) -> Self {
        Self { source }
    }

    /// Stream `url` into `<dest_dir>/<package>-src`.
    ///
    /// # Errors
    ///
    /// Returns `Network` on transport failure and `Io` when the local file
    /// cannot be created; a partially written file is removed before returning.
    pub fn fetch(
        &self,
        url: &SourceDistributionUrl,
        dest_dir: &Path,
        package: &str,
    ) -> Result<ArchiveFile, HarvestError> {
        let path = archive_path(dest_dir, package)?;
        if path.exists() {
            debug!(path = %path.display(), "removing stale archive from an earlier run");
            fs::remove_file(&path).map_err(|err| HarvestError::io(&path, err))?;
        }
        let mut file = Builder::new()
            .prefix(&format!("{package}{ARCHIVE_SUFFIX}"))
            .rand_bytes(0)
            .tempfile_in(dest_dir)
            .map_err(|err| HarvestError::io(&path, err))?;
        let size = self.source.fetch_to(url, file.as_file_mut())?;
        file.as_file_mut()
            .flush()
            .map_err(|err| HarvestError::io(&path, err))?;
        debug!(package, size, path = %path.display(), "downloaded archive");
        Ok(ArchiveFile { file, size })
    }
}

/// Reject names that would place the archive outside `dest_dir`.
pub fn validate_package_name(name: &str) -> Result<(), HarvestError> {
    let valid = !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(HarvestError::InvalidPackageName {
            name: name.to_string(),
        })
    }
}

pub(crate) fn archive_path(dest_dir: &Path, package: &str) -> Result<PathBuf, HarvestError> {
    validate_package_name(package)?;
    Ok(dest_dir.join(format!("{package}{ARCHIVE_SUFFIX}")))
}
