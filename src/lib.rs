//! HubVault Core Library
//!
//! Takes a full, auditable snapshot of a GitHub account:
//! - Mirror clone of every repository (all branches, tags, refs)
//! - Repository metadata, issues with comments, releases with assets
//! - Account-level gists and SSH keys
//! - Encrypted local settings store with named profiles
//!
//! Pipeline: enumerate -> create structure -> clone + collect per repository
//! -> aggregate outcomes -> write manifest.

pub mod backup;
pub mod error;
pub mod github;
pub mod settings;

// Re-export main types
pub use backup::manifest::{
    BackupManifest, CloneStatus, MetadataStatus, RepositoryOutcome, RunScope, RunStatus,
};
pub use backup::progress::{NoopReporter, ProgressReporter};
pub use backup::{BackupOptions, BackupOrchestrator, CancelToken};
pub use error::{Error, Result};
pub use github::client::GitHubClient;
pub use github::models::RepositorySummary;
pub use github::GitHubApi;
pub use settings::store::SettingsStore;
