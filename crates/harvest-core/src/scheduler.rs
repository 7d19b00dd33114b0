//! Batch runs over the ranked package list with a persisted, resumable cache.

use std::collections::HashSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::cache::{CacheRecord, CacheStore};
use crate::effects::Effects;
use crate::pipeline::{FetchPipeline, Outcome};
use crate::pool::run_bounded;
use crate::progress::ProgressReporter;
use crate::HarvestError;

/// Contiguous slice of the ranked list, `START:STOP` with Python slice rules:
/// either bound may be omitted, negative bounds count from the end, and
/// out-of-range bounds clamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankRange {
    pub start: Option<isize>,
    pub stop: Option<isize>,
}

impl RankRange {
    pub const ALL: Self = Self {
        start: None,
        stop: None,
    };

    #[must_use]
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self { start, stop }
    }

    #[must_use]
    pub fn apply<T>(&self, ranked: Vec<T>) -> Vec<T> {
        let len = ranked.len();
        let start = self.start.map_or(0, |idx| resolve_index(idx, len));
        let stop = self.stop.map_or(len, |idx| resolve_index(idx, len));
        if start >= stop {
            return Vec::new();
        }
        ranked.into_iter().skip(start).take(stop - start).collect()
    }
}

fn resolve_index(idx: isize, len: usize) -> usize {
    if idx < 0 {
        len.saturating_sub(idx.unsigned_abs())
    } else {
        idx.unsigned_abs().min(len)
    }
}

impl FromStr for RankRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((start, stop)) = s.trim().split_once(':') else {
            return Err(format!("expected START:STOP, got `{s}`"));
        };
        let bound = |raw: &str| -> Result<Option<isize>, String> {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse()
                .map(Some)
                .map_err(|_| format!("`{raw}` is not a valid index"))
        };
        Ok(Self {
            start: bound(start)?,
            stop: bound(stop)?,
        })
    }
}

impl fmt::Display for RankRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str(":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub package: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Counts and per-package outcomes of one batch run, reports in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub requested: usize,
    pub cached: usize,
    pub succeeded: usize,
    pub no_source: usize,
    pub version_missing: usize,
    pub failed: usize,
    pub reports: Vec<PackageReport>,
}

impl RunSummary {
    fn new(requested: usize, cached: usize, reports: Vec<PackageReport>) -> Self {
        let mut summary = Self {
            requested,
            cached,
            ..Self::default()
        };
        for report in &reports {
            match report.outcome {
                Outcome::Success(_) => summary.succeeded += 1,
                Outcome::NoSourceAvailable => summary.no_source += 1,
                Outcome::VersionNotFound { .. } => summary.version_missing += 1,
                Outcome::Failure { .. } => summary.failed += 1,
            }
        }
        summary.reports = reports;
        summary
    }
}

pub struct Scheduler<'a> {
    effects: &'a dyn Effects,
}

impl<'a> Scheduler<'a> {
    #[must_use]
    pub fn new(effects: &'a dyn Effects) -> Self {
        Self { effects }
    }

    /// Fetch every ranked package in `limit` that the cache does not list yet.
    ///
    /// Per-package problems end up in the summary. The cache is rewritten with
    /// this run's successes even if the worker pool itself panics.
    ///
    /// # Errors
    ///
    /// `Usage` when `target_dir` is not a directory, `CacheIo` when the cache
    /// cannot be read or written, and `Network`/`Format` when the ranked list
    /// cannot be fetched.
    pub fn run(
        &self,
        target_dir: &Path,
        workers: usize,
        limit: RankRange,
    ) -> Result<RunSummary, HarvestError> {
        ensure_target_dir(target_dir)?;
        let store = CacheStore::new(target_dir);
        let done = store.load_or_init()?;

        let ranked = self.effects.top_list().fetch_top()?;
        let selected = dedup_in_order(limit.apply(ranked));
        let requested = selected.len();
        let pending: Vec<String> = selected
            .into_iter()
            .filter(|name| !done.contains(name))
            .collect();
        let cached = requested - pending.len();
        info!(
            requested,
            cached,
            pending = pending.len(),
            workers,
            %limit,
            "starting fetch"
        );

        let pipeline = FetchPipeline::new(self.effects, target_dir);
        let progress = ProgressReporter::bar("Fetching packages", pending.len());
        let mut reports = Vec::with_capacity(pending.len());
        with_durable_cache(&store, done, |record| {
            run_bounded(
                pending,
                workers,
                |package: String| {
                    let outcome = pipeline.run(&package, None);
                    PackageReport { package, outcome }
                },
                |report| {
                    progress.increment();
                    if report.outcome.is_success() {
                        record.insert(report.package.clone());
                    }
                    reports.push(report);
                },
            );
        })?;

        let summary = RunSummary::new(requested, cached, reports);
        progress.finish(format!(
            "Fetched {} of {} packages",
            summary.succeeded,
            summary.requested - summary.cached
        ));
        Ok(summary)
    }

    /// Run one package, optionally pinned to `version`, recording a success in the cache.
    ///
    /// # Errors
    ///
    /// `Usage` when `target_dir` is not a directory and `CacheIo` when the cache
    /// cannot be read or written.
    pub fn fetch_one(
        &self,
        target_dir: &Path,
        package: &str,
        version: Option<&str>,
    ) -> Result<PackageReport, HarvestError> {
        ensure_target_dir(target_dir)?;
        let store = CacheStore::new(target_dir);
        let mut record = store.load_or_init()?;
        if record.contains(package) {
            debug!(package, "already cached; fetching again as requested");
        }
        let outcome = FetchPipeline::new(self.effects, target_dir).run(package, version);
        if outcome.is_success() && record.insert(package.to_string()) {
            store.persist(&record)?;
        }
        Ok(PackageReport {
            package: package.to_string(),
            outcome,
        })
    }
}

pub(crate) fn ensure_target_dir(target_dir: &Path) -> Result<(), HarvestError> {
    if target_dir.is_dir() {
        Ok(())
    } else {
        Err(HarvestError::Usage {
            message: format!("target directory {} does not exist", target_dir.display()),
        })
    }
}

fn dedup_in_order(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    names
        .into_iter()
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Run `body` against the loaded record, then persist whatever it holds,
/// panic or not. A panic is re-raised after the write.
fn with_durable_cache<T>(
    store: &CacheStore,
    mut record: CacheRecord,
    body: impl FnOnce(&mut CacheRecord) -> T,
) -> Result<T, HarvestError> {
    let loaded = record.len();
    let result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut record)));
    let persisted = store.persist(&record);
    debug!(added = record.len() - loaded, "cache updated");
    match result {
        Ok(value) => persisted.map(|()| value),
        Err(payload) => {
            if let Err(err) = persisted {
                error!(%err, "could not save cache while unwinding");
            }
            panic::resume_unwind(payload)
        }
    }
}
