//! Walks extracted package trees and hands every Python source to an [`Analyzer`].

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::pool::run_bounded;
use crate::progress::ProgressReporter;
use crate::scheduler::ensure_target_dir;
use crate::HarvestError;

const SOURCE_EXTENSION: &str = "py";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub file: PathBuf,
    pub message: String,
}

/// Inspects one source file. Returning `Err` marks the whole package as errored.
pub trait Analyzer: Send + Sync {
    fn analyze(&self, file: &Path) -> Result<Vec<Finding>, HarvestError>;
}

/// Flags sources that do not decode as UTF-8.
#[derive(Debug, Default, Clone, Copy)]
pub struct Utf8SourceAnalyzer;

impl Analyzer for Utf8SourceAnalyzer {
    fn analyze(&self, file: &Path) -> Result<Vec<Finding>, HarvestError> {
        let bytes = fs::read(file).map_err(|err| HarvestError::io(file, err))?;
        Ok(match std::str::from_utf8(&bytes) {
            Ok(_) => Vec::new(),
            Err(err) => vec![Finding {
                file: file.to_path_buf(),
                message: format!("not valid UTF-8 after byte {}", err.valid_up_to()),
            }],
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageScan {
    pub package: String,
    pub directory: PathBuf,
    pub files: usize,
    pub findings: Vec<Finding>,
    pub error: Option<String>,
}

impl PackageScan {
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        !self.findings.is_empty() || self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub packages: usize,
    pub files: usize,
    /// Only packages with findings or errors, in completion order.
    pub flagged: Vec<PackageScan>,
}

/// `requests-2.31.0` → `requests`.
#[must_use]
pub fn package_name_from_dir(dir: &Path) -> String {
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.split_once('-') {
        Some((head, _)) => head.to_string(),
        None => name,
    }
}

/// Scan every package directory directly under `target_dir`.
///
/// # Errors
///
/// `Usage` when `target_dir` is not a directory, `Io` when it cannot be listed.
pub fn scan_directory(
    target_dir: &Path,
    workers: usize,
    analyzer: &dyn Analyzer,
) -> Result<ScanSummary, HarvestError> {
    ensure_target_dir(target_dir)?;
    let mut packages = Vec::new();
    for entry in fs::read_dir(target_dir).map_err(|err| HarvestError::io(target_dir, err))? {
        let entry = entry.map_err(|err| HarvestError::io(target_dir, err))?;
        if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
            packages.push(entry.path());
        }
    }
    packages.sort();

    let mut summary = ScanSummary {
        packages: packages.len(),
        ..ScanSummary::default()
    };
    let progress = ProgressReporter::bar("Scanning packages", packages.len());
    run_bounded(
        packages,
        workers,
        |dir: PathBuf| scan_package(&dir, analyzer),
        |scan| {
            progress.increment();
            summary.files += scan.files;
            if scan.is_flagged() {
                summary.flagged.push(scan);
            }
        },
    );
    progress.finish(format!(
        "Scanned {} packages, {} flagged",
        summary.packages,
        summary.flagged.len()
    ));
    Ok(summary)
}

fn scan_package(dir: &Path, analyzer: &dyn Analyzer) -> PackageScan {
    let mut scan = PackageScan {
        package: package_name_from_dir(dir),
        directory: dir.to_path_buf(),
        files: 0,
        findings: Vec::new(),
        error: None,
    };
    if let Err(err) = visit_sources(dir, analyzer, &mut scan) {
        warn!(package = %scan.package, %err, "scan aborted");
        scan.error = Some(err.to_string());
    }
    debug!(package = %scan.package, files = scan.files, findings = scan.findings.len(), "scanned");
    scan
}

fn visit_sources(
    dir: &Path,
    analyzer: &dyn Analyzer,
    scan: &mut PackageScan,
) -> Result<(), HarvestError> {
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|err| HarvestError::io(dir, err))?;
        let is_source = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext == SOURCE_EXTENSION);
        if !is_source {
            continue;
        }
        scan.files += 1;
        scan.findings.extend(analyzer.analyze(entry.path())?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailOn(&'static str);

    impl Analyzer for FailOn {
        fn analyze(&self, file: &Path) -> Result<Vec<Finding>, HarvestError> {
            if file.ends_with(self.0) {
                return Err(HarvestError::io(file, "analyzer crashed"));
            }
            Ok(Vec::new())
        }
    }

    fn write(path: &Path, bytes: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn package_name_is_the_prefix_before_the_first_dash() {
        assert_eq!(package_name_from_dir(Path::new("/t/requests-2.31.0")), "requests");
        assert_eq!(package_name_from_dir(Path::new("/t/google-auth-2.0")), "google");
        assert_eq!(package_name_from_dir(Path::new("/t/six")), "six");
    }

    #[test]
    fn reports_only_packages_with_findings() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("clean-1.0/clean/__init__.py"), b"x = 1\n");
        write(&temp.path().join("clean-1.0/README.txt"), b"\xff not python");
        write(&temp.path().join("latin-0.3/latin.py"), b"name = '\xe9'\n");
        fs::write(temp.path().join("info.json"), "[]").unwrap();

        let summary = scan_directory(temp.path(), 4, &Utf8SourceAnalyzer).unwrap();
        assert_eq!(summary.packages, 2);
        assert_eq!(summary.files, 2);
        assert_eq!(summary.flagged.len(), 1);
        let latin = &summary.flagged[0];
        assert_eq!(latin.package, "latin");
        assert_eq!(latin.findings.len(), 1);
        assert!(latin.findings[0].message.contains("byte 8"));
    }

    #[test]
    fn analyzer_errors_mark_the_package() {
        let temp = tempfile::tempdir().unwrap();
        write(&temp.path().join("demo-1.0/a.py"), b"");
        write(&temp.path().join("demo-1.0/b.py"), b"");
        let summary = scan_directory(temp.path(), 1, &FailOn("a.py")).unwrap();
        assert_eq!(summary.flagged.len(), 1);
        assert!(summary.flagged[0]
            .error
            .as_deref()
            .unwrap()
            .contains("analyzer crashed"));
    }

    #[test]
    fn missing_directory_is_a_usage_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = scan_directory(&temp.path().join("nope"), 2, &Utf8SourceAnalyzer).unwrap_err();
        assert_eq!(err.kind(), "usage");
    }
}
