//! Fetches the source distributions of the most-downloaded PyPI packages into a
//! local directory, remembering finished packages in `info.json` so reruns resume.

pub mod archive;
pub mod cache;
mod commands;
pub mod config;
pub mod download;
pub mod effects;
mod error;
mod net;
mod outcome;
pub mod pipeline;
mod pool;
mod progress;
pub mod ranking;
pub mod registry;
pub mod scan;
pub mod scheduler;

#[cfg(test)]
mod fakes;

pub use archive::{ArchiveExtractor, ArchiveFormat, Compression, ExtractedArchive};
pub use cache::{CacheRecord, CacheStore, CACHE_FILE_NAME};
pub use commands::{execute, FetchRequest, GetRequest, HarvestCommand, ScanRequest};
pub use config::{GlobalOptions, HarvestConfig, RankingWindow};
pub use download::{ArchiveFetcher, ArchiveFile};
pub use effects::{ArchiveSource, Effects, RegistryClient, SystemEffects, TopListFetcher};
pub use error::HarvestError;
pub use outcome::{format_status_message, to_json_response, CommandStatus, ExecutionOutcome};
pub use pipeline::{FetchPipeline, Outcome, Stage};
pub use registry::{ReleaseResolver, SourceDistributionUrl};
pub use scan::{Analyzer, Finding, PackageScan, ScanSummary, Utf8SourceAnalyzer};
pub use scheduler::{PackageReport, RankRange, RunSummary, Scheduler};
