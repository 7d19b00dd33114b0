//! Resolve → download → extract for a single package, with total failure isolation.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveExtractor, ExtractedArchive};
use crate::download::{validate_package_name, ArchiveFetcher};
use crate::effects::Effects;
use crate::registry::ReleaseResolver;
use crate::HarvestError;

/// Internal progress of one package; only reported inside failure diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Resolving,
    Downloading,
    Extracting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Extracting => "extracting",
        })
    }
}

/// Terminal result for one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum Outcome {
    Success(ExtractedArchive),
    NoSourceAvailable,
    VersionNotFound {
        requested: String,
        available: Vec<String>,
    },
    Failure {
        stage: Stage,
        kind: String,
        cause: String,
    },
}

impl Outcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// One-line human summary.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Success(extracted) => format!("extracted to {}", extracted.root.display()),
            Self::NoSourceAvailable => "no source distribution available".to_string(),
            Self::VersionNotFound {
                requested,
                available,
            } => format!(
                "release {requested} not found (available: {})",
                available.join(", ")
            ),
            Self::Failure { stage, cause, .. } => format!("failed while {stage}: {cause}"),
        }
    }
}

pub struct FetchPipeline<'a> {
    effects: &'a dyn Effects,
    target_dir: PathBuf,
    extractor: ArchiveExtractor,
}

impl<'a> FetchPipeline<'a> {
    #[must_use]
    pub fn new(effects: &'a dyn Effects, target_dir: &Path) -> Self {
        Self {
            effects,
            target_dir: target_dir.to_path_buf(),
            extractor: ArchiveExtractor::new(),
        }
    }

    /// Never fails: every error, and any panic raised on the way, becomes an [`Outcome`].
    pub fn run(&self, package: &str, version: Option<&str>) -> Outcome {
        let stage = Cell::new(Stage::Resolving);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(package, version, &stage)
        }));
        let outcome = match result {
            Ok(Ok(extracted)) => Outcome::Success(extracted),
            Ok(Err(HarvestError::NoSourceAvailable { .. })) => Outcome::NoSourceAvailable,
            Ok(Err(HarvestError::VersionNotFound {
                requested,
                available,
                ..
            })) => Outcome::VersionNotFound {
                requested,
                available,
            },
            Ok(Err(err)) => Outcome::Failure {
                stage: stage.get(),
                kind: err.kind().to_string(),
                cause: err.to_string(),
            },
            Err(payload) => Outcome::Failure {
                stage: stage.get(),
                kind: "panic".to_string(),
                cause: panic_message(payload.as_ref()),
            },
        };
        match &outcome {
            Outcome::Success(extracted) => {
                info!(package, root = %extracted.root.display(), "fetched");
            }
            Outcome::NoSourceAvailable | Outcome::VersionNotFound { .. } => {
                info!(package, outcome = %outcome.describe(), "skipped");
            }
            Outcome::Failure { stage, cause, .. } => {
                warn!(package, %stage, cause = %cause, "fetch failed");
            }
        }
        outcome
    }

    fn run_stages(
        &self,
        package: &str,
        version: Option<&str>,
        stage: &Cell<Stage>,
    ) -> Result<ExtractedArchive, HarvestError> {
        validate_package_name(package)?;
        debug!(package, ?version, "resolving");
        let url = ReleaseResolver::new(self.effects.registry()).resolve(package, version)?;

        stage.set(Stage::Downloading);
        debug!(package, url = %url, "downloading");
        let archive = ArchiveFetcher::new(self.effects.archives()).fetch(
            &url,
            &self.target_dir,
            package,
        )?;

        stage.set(Stage::Extracting);
        debug!(package, size = archive.size(), "extracting");
        self.extractor.extract(archive, &self.target_dir)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
