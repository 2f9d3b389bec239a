//! Backup orchestration engine.
//!
//! Drives one run end to end: create the on-disk structure, snapshot the
//! account metadata, enumerate repositories, mirror-clone and collect
//! metadata per repository on a bounded worker pool, back up gists (full
//! runs only), and write the manifest.
//!
//! Failure policy: structural errors (directory creation, authentication at
//! enumeration time, manifest write) abort the run with `Err` and leave no
//! manifest. Per-repository failures are recorded as outcomes and the run
//! still completes - a run where every clone failed still produces a
//! manifest with `completed_with_errors`.

pub mod clone;
pub mod manifest;
pub mod metadata;
pub mod progress;

use chrono::{Local, Utc};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::github::models::RepositorySummary;
use crate::github::GitHubApi;
use self::clone::RepositoryCloner;
use self::manifest::{
    BackupManifest, CloneStatus, MetadataStatus, RepositoryOutcome, RunScope, RunStatus,
};
use self::metadata::MetadataCollector;
use self::progress::{NoopReporter, ProgressReporter};

/// Fixed subdirectories of every run root.
const RUN_SUBDIRS: &[&str] = &[
    "repositories",
    "metadata",
    "issues_prs",
    "wikis",
    "releases",
    "gists",
    "settings",
];

/// Run-state sequencing. There is no failed phase: a structural error
/// returns `Err` from `run` before the next transition is applied, and
/// per-repository failures are carried as outcome values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Init,
    StructureCreated,
    AccountMetadataDone,
    ReposDone,
    GistsDone,
    Complete,
}

/// Log and apply a phase transition.
fn advance(phase: &mut RunPhase, next: RunPhase) {
    debug!(from = ?phase, to = ?next, "run phase transition");
    *phase = next;
}

/// Cooperative cancellation handle. Cancelling stops new repository work
/// from being dispatched; in-flight clones finish (or hit their timeout)
/// and the manifest reflects only what was processed.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-supplied run configuration.
#[derive(Clone)]
pub struct BackupOptions {
    /// Parent directory under which the uniquely-named run root is created.
    pub backup_dir: PathBuf,
    /// Full account snapshot or an explicit named subset.
    pub scope: RunScope,
    /// Bounded worker pool size for per-repository work.
    pub workers: usize,
}

impl BackupOptions {
    pub fn full(backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            scope: RunScope::Full,
            workers: 1,
        }
    }

    pub fn selective(backup_dir: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            backup_dir: backup_dir.into(),
            scope: RunScope::Selective(names),
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Drives one backup run. Construct per run; the reporter and cancellation
/// token are injected up front so the run itself has no global state.
pub struct BackupOrchestrator {
    api: Arc<dyn GitHubApi>,
    cloner: Arc<dyn RepositoryCloner>,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancelToken,
    options: BackupOptions,
}

impl BackupOrchestrator {
    pub fn new(
        api: Arc<dyn GitHubApi>,
        cloner: Arc<dyn RepositoryCloner>,
        options: BackupOptions,
    ) -> Self {
        Self {
            api,
            cloner,
            reporter: Arc::new(NoopReporter),
            cancel: CancelToken::new(),
            options,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the backup to completion and return the written manifest.
    pub fn run(&self) -> Result<BackupManifest> {
        let started_at = Utc::now();
        let mut phase = RunPhase::Init;

        // Authentication failure here is structural: without a valid
        // credential there is nothing to back up.
        let account = self.api.authenticated_user()?;
        info!(account = %account.login, "starting backup run");

        let root = self.create_structure(&account.login)?;
        advance(&mut phase, RunPhase::StructureCreated);
        self.reporter
            .report("structure", 5, &format!("Created {}", root.display()));

        self.backup_account_metadata(&root, &account)?;
        advance(&mut phase, RunPhase::AccountMetadataDone);
        self.reporter
            .report("account", 10, "Account metadata captured");

        // Enumeration failures (auth, rate limit, network) are structural:
        // no repository list, no run.
        let enumerated = self.api.list_repositories()?;
        let (selected, mut outcomes) = self.select_scope(enumerated);

        let total = selected.len();
        info!(total, workers = self.options.workers, "processing repositories");

        let processed = self.process_repositories(&root, &selected)?;
        outcomes.extend(processed);
        advance(&mut phase, RunPhase::ReposDone);
        self.reporter
            .report("repositories", 90, "Repository phase finished");

        // Selective runs are scoped to code, not account-wide artifacts.
        let mut gists_backed_up = None;
        if !self.cancel.is_cancelled() && !self.options.scope.is_selective() {
            gists_backed_up = self.backup_gists(&root);
            advance(&mut phase, RunPhase::GistsDone);
            self.reporter.report("gists", 95, "Gists captured");
        }

        let clone_successes = outcomes
            .iter()
            .filter(|o| o.clone == CloneStatus::Ok)
            .count();
        let clone_failures = outcomes.len() - clone_successes;

        let status = if self.cancel.is_cancelled() {
            RunStatus::Cancelled
        } else if outcomes.iter().all(RepositoryOutcome::is_clean) {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithErrors
        };

        let manifest = BackupManifest {
            backup_date: started_at,
            account: account.login.clone(),
            location: root.to_string_lossy().into_owned(),
            repositories_count: outcomes.len(),
            status,
            scope: self.options.scope.clone(),
            clone_successes,
            clone_failures,
            gists_backed_up,
            repositories: outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        // A manifest write failure is the last structural error: the run
        // yields no manifest at all in that case.
        manifest.write(&root.join("backup_summary.json"))?;
        advance(&mut phase, RunPhase::Complete);

        self.reporter.report(
            "complete",
            100,
            &format!("Backup finished: {:?}", manifest.status),
        );
        info!(
            status = ?manifest.status,
            repositories = manifest.repositories_count,
            failures = manifest.clone_failures,
            "backup run finished"
        );

        Ok(manifest)
    }

    /// Create the uniquely-named run root with its fixed subdirectories.
    /// Re-running never reuses a previous root.
    fn create_structure(&self, login: &str) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let base = format!("github_backup_{}_{}", login, stamp);

        let mut root = self.options.backup_dir.join(&base);
        let mut attempt = 1u32;
        while root.exists() {
            attempt += 1;
            root = self.options.backup_dir.join(format!("{}_{}", base, attempt));
        }

        for sub in RUN_SUBDIRS {
            std::fs::create_dir_all(root.join(sub))?;
        }

        info!(root = %root.display(), "created backup structure");
        Ok(root)
    }

    /// Write the account profile and SSH keys. The profile write is
    /// structural (local disk trouble); the SSH key fetch is soft.
    fn backup_account_metadata(
        &self,
        root: &Path,
        account: &crate::github::models::AccountProfile,
    ) -> Result<()> {
        let profile_json = serde_json::to_string_pretty(account)?;
        std::fs::write(root.join("metadata").join("user_profile.json"), profile_json)?;

        match self.api.ssh_keys() {
            Ok(keys) => {
                let json = serde_json::to_string_pretty(&keys)?;
                std::fs::write(root.join("settings").join("ssh_keys.json"), json)?;
            }
            Err(e) => warn!(error = %e, "could not back up SSH keys"),
        }

        Ok(())
    }

    /// Narrow the enumerated list to the requested scope. Unknown selective
    /// names become per-name not-found outcomes so the manifest audits them
    /// instead of silently dropping them.
    fn select_scope(
        &self,
        enumerated: Vec<RepositorySummary>,
    ) -> (Vec<RepositorySummary>, Vec<RepositoryOutcome>) {
        match &self.options.scope {
            RunScope::Full => (enumerated, Vec::new()),
            RunScope::Selective(names) => {
                let selected: Vec<RepositorySummary> = enumerated
                    .into_iter()
                    .filter(|r| names.contains(&r.name))
                    .collect();

                let missing: Vec<RepositoryOutcome> = names
                    .iter()
                    .filter(|n| !selected.iter().any(|r| &r.name == *n))
                    .map(|n| {
                        warn!(repo = %n, "requested repository not found on account");
                        RepositoryOutcome {
                            name: n.clone(),
                            clone: CloneStatus::Failed {
                                reason: "repository not found on account".to_string(),
                            },
                            metadata: MetadataStatus::Failed {
                                reason: "repository not found on account".to_string(),
                            },
                        }
                    })
                    .collect();

                (selected, missing)
            }
        }
    }

    /// Clone + collect for every selected repository on a bounded pool.
    /// Outcomes and counters are aggregated under a mutex; tasks share no
    /// other mutable state.
    fn process_repositories(
        &self,
        root: &Path,
        selected: &[RepositorySummary],
    ) -> Result<Vec<RepositoryOutcome>> {
        let total = selected.len();
        let outcomes: Mutex<Vec<RepositoryOutcome>> = Mutex::new(Vec::with_capacity(total));
        let done = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        pool.install(|| {
            selected.par_iter().for_each(|repo| {
                // Cancellation stops dispatch; work already started finishes.
                if self.cancel.is_cancelled() {
                    return;
                }

                let outcome = self.process_one(root, repo);

                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                let percent = 10 + (80 * finished / total.max(1)) as u8;
                self.reporter.report(
                    "repositories",
                    percent,
                    &format!("Backed up {} ({}/{})", repo.full_name, finished, total),
                );

                match &outcome.clone {
                    CloneStatus::Ok => info!(repo = %repo.full_name, "clone ok"),
                    CloneStatus::Failed { reason } => {
                        error!(repo = %repo.full_name, %reason, "clone failed");
                    }
                }

                outcomes
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(outcome);
            });
        });

        Ok(outcomes.into_inner().unwrap_or_else(|p| p.into_inner()))
    }

    /// One repository: snapshot directory, mirror clone, metadata files.
    /// Every failure in here is soft and lands in the outcome.
    fn process_one(&self, root: &Path, repo: &RepositorySummary) -> RepositoryOutcome {
        let repo_dir = root.join("repositories").join(&repo.name);
        if let Err(e) = std::fs::create_dir_all(&repo_dir) {
            let reason = format!("cannot create snapshot directory: {}", e);
            return RepositoryOutcome {
                name: repo.name.clone(),
                clone: CloneStatus::Failed {
                    reason: reason.clone(),
                },
                metadata: MetadataStatus::Failed { reason },
            };
        }

        let clone_status = match self.cloner.mirror(repo, &repo_dir.join("git")) {
            Ok(()) => CloneStatus::Ok,
            Err(e) => CloneStatus::Failed {
                reason: e.to_string(),
            },
        };

        let collected = MetadataCollector::new(self.api.as_ref()).collect(repo);
        let metadata_status = match collected.write_to(&repo_dir) {
            Ok(()) => collected.status(),
            Err(e) => MetadataStatus::Failed {
                reason: format!("cannot write metadata files: {}", e),
            },
        };

        RepositoryOutcome {
            name: repo.name.clone(),
            clone: clone_status,
            metadata: metadata_status,
        }
    }

    /// Full runs only. Soft: a gist failure degrades the run, it does not
    /// abort it.
    fn backup_gists(&self, root: &Path) -> Option<usize> {
        match self.api.gists() {
            Ok(gists) => {
                let count = gists.len();
                let json = match serde_json::to_string_pretty(&gists) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "could not serialize gists");
                        return None;
                    }
                };
                if let Err(e) = std::fs::write(root.join("gists").join("gists.json"), json) {
                    warn!(error = %e, "could not write gists snapshot");
                    return None;
                }
                info!(count, "gists captured");
                Some(count)
            }
            Err(e) => {
                warn!(error = %e, "could not fetch gists");
                None
            }
        }
    }
}
