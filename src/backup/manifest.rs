//! Run outcomes and the durable manifest (`backup_summary.json`).
//!
//! The manifest is the final, immutable record of one backup run. It is
//! written exactly once at run end; a later run creates a new root and a
//! new manifest, never mutating a previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Requested scope of a run. Recorded explicitly in the manifest so a
/// selective run is distinguishable from a full one without inferring it
/// from absent sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    Full,
    Selective(Vec<String>),
}

impl RunScope {
    pub fn is_selective(&self) -> bool {
        matches!(self, RunScope::Selective(_))
    }
}

/// Clone outcome for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloneStatus {
    Ok,
    Failed { reason: String },
}

/// Metadata outcome for one repository, independent of the clone outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MetadataStatus {
    Ok,
    /// Some sub-resources (metadata / issues / releases) could not be
    /// fetched; the rest were written.
    Partial { missing: Vec<String> },
    Failed { reason: String },
}

/// Per-repository result. Clone and metadata axes are independent: a
/// metadata failure never implies a clone failure and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryOutcome {
    pub name: String,
    pub clone: CloneStatus,
    pub metadata: MetadataStatus,
}

impl RepositoryOutcome {
    /// True when both the clone and every metadata sub-fetch succeeded.
    pub fn is_clean(&self) -> bool {
        self.clone == CloneStatus::Ok && self.metadata == MetadataStatus::Ok
    }
}

/// Overall run status. Per-repository failures never make a run `Failed`;
/// a structural failure produces no manifest at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithErrors,
    Cancelled,
}

/// The serialized form of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupManifest {
    pub backup_date: DateTime<Utc>,
    pub account: String,
    /// Absolute or caller-relative path of the run root.
    pub location: String,
    pub repositories_count: usize,
    pub status: RunStatus,
    pub scope: RunScope,
    pub clone_successes: usize,
    pub clone_failures: usize,
    /// Present only for full runs that reached the gist phase.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gists_backed_up: Option<usize>,
    pub repositories: Vec<RepositoryOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BackupManifest {
    /// Write the manifest as pretty JSON. A write failure is structural.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
