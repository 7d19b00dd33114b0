//! Command requests and the executor that turns them into [`ExecutionOutcome`]s.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use crate::config::{GlobalOptions, HarvestConfig, RankingWindow};
use crate::effects::{Effects, SystemEffects};
use crate::outcome::ExecutionOutcome;
use crate::pipeline::Outcome;
use crate::scan::{scan_directory, Utf8SourceAnalyzer};
use crate::scheduler::{RankRange, Scheduler};
use crate::{progress, HarvestError};

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub directory: PathBuf,
    pub workers: Option<usize>,
    pub limit: RankRange,
    pub days: Option<RankingWindow>,
}

#[derive(Debug, Clone)]
pub struct GetRequest {
    pub directory: PathBuf,
    pub package: String,
    pub release: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub directory: PathBuf,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum HarvestCommand {
    Fetch(FetchRequest),
    Get(GetRequest),
    Scan(ScanRequest),
}

impl HarvestCommand {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch",
            Self::Get(_) => "get",
            Self::Scan(_) => "scan",
        }
    }
}

/// Run `command` against the live registry with configuration from the environment.
///
/// # Errors
///
/// Only when the HTTP stack cannot be set up; everything else is reported
/// through the returned outcome.
pub fn execute(global: &GlobalOptions, command: &HarvestCommand) -> Result<ExecutionOutcome> {
    if global.quiet || global.json {
        progress::suppress();
    }
    let config = configure(HarvestConfig::from_env(), command);
    debug!(
        registry = %config.registry.base_url,
        ranking = %config.ranking.url(),
        workers = config.workers,
        "configuration"
    );
    let effects = SystemEffects::new(&config).context("failed to set up the HTTP client")?;
    Ok(execute_with(&config, &effects, command))
}

fn configure(config: HarvestConfig, command: &HarvestCommand) -> HarvestConfig {
    match command {
        HarvestCommand::Fetch(request) => config
            .with_workers(request.workers)
            .with_window(request.days),
        HarvestCommand::Scan(request) => config.with_workers(request.workers),
        HarvestCommand::Get(_) => config,
    }
}

pub(crate) fn execute_with(
    config: &HarvestConfig,
    effects: &dyn Effects,
    command: &HarvestCommand,
) -> ExecutionOutcome {
    let result = match command {
        HarvestCommand::Fetch(request) => fetch(config, effects, request),
        HarvestCommand::Get(request) => get(effects, request),
        HarvestCommand::Scan(request) => scan(config, request),
    };
    result.unwrap_or_else(|err| ExecutionOutcome::from_error(&err))
}

fn fetch(
    config: &HarvestConfig,
    effects: &dyn Effects,
    request: &FetchRequest,
) -> Result<ExecutionOutcome, HarvestError> {
    let summary = Scheduler::new(effects).run(&request.directory, config.workers, request.limit)?;
    let pending = summary.requested - summary.cached;
    let mut message = format!(
        "fetched {} of {pending} packages ({} already cached)",
        summary.succeeded, summary.cached
    );
    let skipped = summary.no_source + summary.version_missing;
    if skipped > 0 {
        message.push_str(&format!(", {skipped} without a source distribution"));
    }
    if summary.failed > 0 {
        message.push_str(&format!(", {} failed", summary.failed));
    }
    let mut details = serde_json::to_value(&summary).unwrap_or_default();
    details["directory"] = json!(request.directory);
    details["days"] = json!(config.ranking.window.days());
    Ok(ExecutionOutcome::success(message, details))
}

fn get(effects: &dyn Effects, request: &GetRequest) -> Result<ExecutionOutcome, HarvestError> {
    let report = Scheduler::new(effects).fetch_one(
        &request.directory,
        &request.package,
        request.release.as_deref(),
    )?;
    let details = serde_json::to_value(&report).unwrap_or_default();
    let message = format!("{}: {}", report.package, report.outcome.describe());
    Ok(match report.outcome {
        Outcome::Success(_) => ExecutionOutcome::success(message, details),
        Outcome::NoSourceAvailable | Outcome::VersionNotFound { .. } => {
            ExecutionOutcome::user_error(message, details)
        }
        Outcome::Failure { .. } => ExecutionOutcome::failure(message, details),
    })
}

fn scan(config: &HarvestConfig, request: &ScanRequest) -> Result<ExecutionOutcome, HarvestError> {
    let summary = scan_directory(&request.directory, config.workers, &Utf8SourceAnalyzer)?;
    let message = format!(
        "scanned {} files in {} packages ({} flagged)",
        summary.files,
        summary.packages,
        summary.flagged.len()
    );
    let details = serde_json::to_value(&summary).unwrap_or_default();
    Ok(ExecutionOutcome::success(message, details))
}
