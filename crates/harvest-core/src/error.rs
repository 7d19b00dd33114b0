use std::path::{Path, PathBuf};

/// Failure taxonomy shared by every stage of a harvest run.
///
/// Per-package variants are caught at the pipeline boundary and turned into an
/// [`Outcome`](crate::Outcome); `Format` from the ranking endpoint and
/// `CacheIo` abort the whole run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
    #[error("unexpected payload from {url}: {message}")]
    Format { url: String, message: String },
    #[error("no release `{requested}` for {package} (available: {})", available.join(", "))]
    VersionNotFound {
        package: String,
        requested: String,
        available: Vec<String>,
    },
    #[error("no source distribution published for {package}")]
    NoSourceAvailable { package: String },
    #[error("unknown archive format: {}", path.display())]
    UnknownArchiveFormat { path: PathBuf },
    #[error("failed to extract {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },
    #[error("i/o error at {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("cache file {} is unusable: {message}", path.display())]
    CacheIo { path: PathBuf, message: String },
    #[error("`{name}` is not a valid package name")]
    InvalidPackageName { name: String },
    #[error("{message}")]
    Usage { message: String },
}

impl HarvestError {
    pub(crate) fn network(url: impl Into<String>, err: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn format(url: impl Into<String>, err: impl ToString) -> Self {
        Self::Format {
            url: url.into(),
            message: err.to_string(),
        }
    }

    pub(crate) fn extraction(path: &Path, err: impl ToString) -> Self {
        Self::Extraction {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn io(path: &Path, err: impl ToString) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn cache_io(path: &Path, err: impl ToString) -> Self {
        Self::CacheIo {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    /// Short machine-readable tag used in JSON output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Format { .. } => "format",
            Self::VersionNotFound { .. } => "version-not-found",
            Self::NoSourceAvailable { .. } => "no-source",
            Self::UnknownArchiveFormat { .. } => "unknown-archive-format",
            Self::Extraction { .. } => "extraction",
            Self::Io { .. } => "io",
            Self::CacheIo { .. } => "cache-io",
            Self::InvalidPackageName { .. } => "invalid-package-name",
            Self::Usage { .. } => "usage",
        }
    }
}
