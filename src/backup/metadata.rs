//! Per-repository metadata collection.
//!
//! Three independent sub-fetches: descriptive fields, issues with comments,
//! releases with assets. One sub-fetch failing is logged and recorded as a
//! missing sub-resource; it never blocks the others, and never blocks the
//! clone - the code history is the higher-value artifact.

use std::path::Path;
use tracing::warn;

use super::manifest::MetadataStatus;
use crate::error::Result;
use crate::github::models::{IssueRecord, ReleaseRecord, RepositorySummary};
use crate::github::GitHubApi;

/// Everything collected for one repository. Absent parts were unreachable.
pub struct RepositoryMetadata {
    pub details: Option<RepositorySummary>,
    pub issues: Option<Vec<IssueRecord>>,
    pub releases: Option<Vec<ReleaseRecord>>,
}

impl RepositoryMetadata {
    /// Derive the outcome status: all present -> Ok, some -> Partial,
    /// none -> Failed.
    pub fn status(&self) -> MetadataStatus {
        let mut missing = Vec::new();
        if self.details.is_none() {
            missing.push("metadata".to_string());
        }
        if self.issues.is_none() {
            missing.push("issues".to_string());
        }
        if self.releases.is_none() {
            missing.push("releases".to_string());
        }

        if missing.is_empty() {
            MetadataStatus::Ok
        } else if missing.len() == 3 {
            MetadataStatus::Failed {
                reason: "no metadata sub-resource could be fetched".to_string(),
            }
        } else {
            MetadataStatus::Partial { missing }
        }
    }

    /// Write the collected parts as JSON files into the repository's
    /// snapshot directory (`metadata.json`, `issues.json`, `releases.json`).
    pub fn write_to(&self, repo_dir: &Path) -> Result<()> {
        if let Some(details) = &self.details {
            let json = serde_json::to_string_pretty(details)?;
            std::fs::write(repo_dir.join("metadata.json"), json)?;
        }
        if let Some(issues) = &self.issues {
            let json = serde_json::to_string_pretty(issues)?;
            std::fs::write(repo_dir.join("issues.json"), json)?;
        }
        if let Some(releases) = &self.releases {
            let json = serde_json::to_string_pretty(releases)?;
            std::fs::write(repo_dir.join("releases.json"), json)?;
        }
        Ok(())
    }
}

/// Fetches the three metadata sub-resources for one repository.
pub struct MetadataCollector<'a> {
    api: &'a dyn GitHubApi,
}

impl<'a> MetadataCollector<'a> {
    pub fn new(api: &'a dyn GitHubApi) -> Self {
        Self { api }
    }

    /// Collect whatever is reachable. This never fails as a whole; each
    /// sub-fetch degrades independently.
    pub fn collect(&self, repo: &RepositorySummary) -> RepositoryMetadata {
        let details = match self.api.repository(&repo.full_name) {
            Ok(details) => Some(details),
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "could not fetch repository details");
                None
            }
        };

        let issues = match self.api.issues(&repo.full_name) {
            Ok(issues) => Some(issues),
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "could not fetch issues");
                None
            }
        };

        let releases = match self.api.releases(&repo.full_name) {
            Ok(releases) => Some(releases),
            Err(e) => {
                warn!(repo = %repo.full_name, error = %e, "could not fetch releases");
                None
            }
        };

        RepositoryMetadata {
            details,
            issues,
            releases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(
        details: bool,
        issues: bool,
        releases: bool,
    ) -> RepositoryMetadata {
        RepositoryMetadata {
            details: details.then(|| {
                serde_json::from_value(serde_json::json!({
                    "name": "r", "full_name": "o/r", "private": false,
                    "fork": false, "archived": false, "disabled": false,
                    "clone_url": "https://github.com/o/r.git",
                    "description": null, "language": null, "homepage": null,
                    "ssh_url": null, "created_at": null, "updated_at": null,
                    "pushed_at": null
                }))
                .unwrap()
            }),
            issues: issues.then(Vec::new),
            releases: releases.then(Vec::new),
        }
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(meta(true, true, true).status(), MetadataStatus::Ok);
        assert_eq!(
            meta(true, false, true).status(),
            MetadataStatus::Partial {
                missing: vec!["issues".to_string()]
            }
        );
        assert!(matches!(
            meta(false, false, false).status(),
            MetadataStatus::Failed { .. }
        ));
    }

    #[test]
    fn test_write_only_present_parts() {
        let dir = tempfile::TempDir::new().unwrap();
        meta(true, false, true).write_to(dir.path()).unwrap();

        assert!(dir.path().join("metadata.json").exists());
        assert!(!dir.path().join("issues.json").exists());
        assert!(dir.path().join("releases.json").exists());
    }
}
