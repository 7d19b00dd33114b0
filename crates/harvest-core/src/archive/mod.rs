//! Container sniffing and extraction of downloaded source archives.

mod format;
mod unpack;

#[cfg(test)]
pub(crate) mod testing;

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

pub use format::{ArchiveFormat, Compression};

use crate::download::ArchiveFile;
use crate::HarvestError;

/// Result of unpacking one archive into the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedArchive {
    /// Destination joined with the first path component of the first accepted member.
    pub root: PathBuf,
    pub format: ArchiveFormat,
    pub members: usize,
    /// Members refused because they were links or pointed outside the destination.
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Unpack `file` into `dest`. The archive is deleted before this returns,
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// `UnknownArchiveFormat` when sniffing fails, `Extraction` when the archive
    /// is corrupt, cannot be written out, or holds no acceptable member.
    pub fn extract(&self, file: ArchiveFile, dest: &Path) -> Result<ExtractedArchive, HarvestError> {
        let result = extract_path(file.path(), dest);
        file.discard();
        result
    }
}

fn extract_path(archive: &Path, dest: &Path) -> Result<ExtractedArchive, HarvestError> {
    let format = ArchiveFormat::sniff(archive)?;
    debug!(archive = %archive.display(), ?format, "detected archive format");
    let unpacked = match format {
        ArchiveFormat::Tar(compression) => unpack::unpack_tar(archive, compression, dest)?,
        ArchiveFormat::Zip => unpack::unpack_zip(archive, dest)?,
    };
    let root = unpacked
        .first_member
        .as_deref()
        .and_then(top_level)
        .ok_or_else(|| HarvestError::extraction(archive, "archive contains no extractable members"))?;
    Ok(ExtractedArchive {
        root: dest.join(root),
        format,
        members: unpacked.members,
        skipped: unpacked.skipped,
    })
}

fn top_level(member: &Path) -> Option<&Path> {
    match member.components().next() {
        Some(Component::Normal(first)) => Some(Path::new(first)),
        _ => None,
    }
}
