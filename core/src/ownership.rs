//! Hands filesystem paths over to the resolved identity.
//!
//! Individual `chown` failures are warnings; only failing to create a
//! directory for a recursive update ends the run.

use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::Result;
use crate::error::RunNonRootErr;
use crate::materializer::ResolvedIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipOutcome {
    Changed,
    /// Recursive update skipped because the path already had the target owner.
    AlreadyOwned,
    /// Number of entries whose ownership could not be changed.
    Failed(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReport {
    pub path: PathBuf,
    pub outcome: OwnershipOutcome,
}

/// Counts of paths by outcome. `failed` counts entries, not top-level paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnershipSummary {
    pub changed: usize,
    pub already_owned: usize,
    pub failed: usize,
}

impl OwnershipSummary {
    pub fn from_reports(reports: &[PathReport]) -> Self {
        reports
            .iter()
            .fold(Self::default(), |mut summary, report| {
                match report.outcome {
                    OwnershipOutcome::Changed => summary.changed += 1,
                    OwnershipOutcome::AlreadyOwned => summary.already_owned += 1,
                    OwnershipOutcome::Failed(entries) => summary.failed += entries,
                }
                summary
            })
    }
}

pub struct OwnershipUpdater<'a> {
    identity: &'a ResolvedIdentity,
    quiet: bool,
}

impl<'a> OwnershipUpdater<'a> {
    pub fn new(identity: &'a ResolvedIdentity, quiet: bool) -> Self {
        Self { identity, quiet }
    }

    /// Changes the owner of each path itself, without descending.
    pub fn update(&self, paths: &[PathBuf]) -> Vec<PathReport> {
        paths
            .iter()
            .map(|path| {
                let outcome = match self.chown(path) {
                    Ok(()) => OwnershipOutcome::Changed,
                    Err(err) => {
                        self.warn_failure(path, &err);
                        OwnershipOutcome::Failed(1)
                    }
                };
                PathReport {
                    path: path.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// Creates each path if needed, then changes ownership of everything
    /// below it unless the path is already owned by the target identity.
    pub fn update_recursive(&self, paths: &[PathBuf]) -> Result<Vec<PathReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            std::fs::create_dir_all(path).map_err(|source| RunNonRootErr::DirectoryCreation {
                path: path.clone(),
                source,
            })?;
            let outcome = if self.already_owned(path) {
                if !self.quiet {
                    info!(
                        "{} is already owned by {}:{}; skipping",
                        path.display(),
                        self.identity.uid,
                        self.identity.gid
                    );
                }
                OwnershipOutcome::AlreadyOwned
            } else {
                self.chown_tree(path)
            };
            reports.push(PathReport {
                path: path.clone(),
                outcome,
            });
        }
        Ok(reports)
    }

    fn already_owned(&self, path: &Path) -> bool {
        std::fs::metadata(path)
            .map(|meta| meta.uid() == self.identity.uid && meta.gid() == self.identity.gid)
            .unwrap_or(false)
    }

    fn chown_tree(&self, root: &Path) -> OwnershipOutcome {
        let mut failures = 0;
        for entry in WalkDir::new(root) {
            let result = match &entry {
                Ok(entry) => self.lchown(entry.path()),
                Err(err) => Err(std::io::Error::other(err.to_string())),
            };
            if let Err(err) = result {
                let path = entry
                    .as_ref()
                    .map(|entry| entry.path().to_path_buf())
                    .unwrap_or_else(|_| root.to_path_buf());
                self.warn_failure(&path, &err);
                failures += 1;
            }
        }
        if failures == 0 {
            OwnershipOutcome::Changed
        } else {
            OwnershipOutcome::Failed(failures)
        }
    }

    fn chown(&self, path: &Path) -> std::io::Result<()> {
        std::os::unix::fs::chown(path, Some(self.identity.uid), Some(self.identity.gid))
    }

    /// Symlinks are re-owned themselves rather than followed.
    fn lchown(&self, path: &Path) -> std::io::Result<()> {
        std::os::unix::fs::lchown(path, Some(self.identity.uid), Some(self.identity.gid))
    }

    fn warn_failure(&self, path: &Path, err: &std::io::Error) {
        if !self.quiet {
            warn!(
                "failed to change ownership of {} to {}:{}: {err}",
                path.display(),
                self.identity.user,
                self.identity.gid
            );
        }
    }
}
