//! Typed records for everything pulled from the GitHub REST API.
//!
//! Each record carries the fixed field set that ends up in the on-disk JSON
//! snapshot. No duck-typed maps are passed around: the API boundary
//! deserializes straight into these types and the backup writes them back
//! out with serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One repository as returned by the list/detail endpoints. Immutable
/// snapshot of remote state at enumeration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub private: bool,
    pub fork: bool,
    pub archived: bool,
    pub disabled: bool,
    /// Size in kilobytes, as reported by the API.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub default_branch: Option<String>,
    pub language: Option<String>,
    pub homepage: Option<String>,
    pub clone_url: String,
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
}

/// The authenticated account's profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountProfile {
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub bio: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default, alias = "total_private_repos")]
    pub private_repos: Option<u64>,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
}

/// One comment on an issue or pull request thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRecord {
    #[serde(default, deserialize_with = "actor_login")]
    pub user: Option<String>,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// One issue (or pull request thread) with its comments attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueRecord {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "actor_login")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "label_names")]
    pub labels: Vec<String>,
    /// Attached after a separate comments fetch; the issue payload itself
    /// only carries a count.
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

/// One release asset (name, URL, size only - binaries are not downloaded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    pub name: String,
    #[serde(alias = "browser_download_url")]
    pub download_url: String,
    pub size: u64,
}

/// One release with its assets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub tag_name: String,
    pub name: Option<String>,
    pub body: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<AssetRecord>,
}

/// One file inside a gist. Content is only present when the gist detail
/// endpoint was fetched (the list endpoint omits it).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GistFile {
    pub content: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// One account-level gist with file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GistRecord {
    pub id: String,
    pub description: Option<String>,
    pub public: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
}

/// One SSH public key registered on the account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshKeyRecord {
    pub id: u64,
    pub key: String,
    pub title: Option<String>,
}

#[derive(Deserialize)]
struct ActorRef {
    login: String,
}

/// Flatten `{"login": "..."}` actor objects into a plain login string.
fn actor_login<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<ActorRef>::deserialize(deserializer)?.map(|a| a.login))
}

#[derive(Deserialize)]
struct LabelRef {
    name: String,
}

/// Flatten label objects into their names.
fn label_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Vec::<LabelRef>::deserialize(deserializer)?
        .into_iter()
        .map(|l| l.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_summary_from_api_payload() {
        let payload = json!({
            "name": "dotfiles",
            "full_name": "octocat/dotfiles",
            "description": null,
            "private": true,
            "fork": false,
            "archived": false,
            "disabled": false,
            "size": 128,
            "default_branch": "main",
            "language": "Shell",
            "homepage": null,
            "clone_url": "https://github.com/octocat/dotfiles.git",
            "ssh_url": "git@github.com:octocat/dotfiles.git",
            "topics": ["shell", "config"],
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2024-06-01T12:00:00Z",
            "pushed_at": null
        });

        let repo: RepositorySummary = serde_json::from_value(payload).unwrap();
        assert_eq!(repo.name, "dotfiles");
        assert!(repo.private);
        assert_eq!(repo.topics, vec!["shell", "config"]);
        assert!(repo.pushed_at.is_none());
    }

    #[test]
    fn test_issue_actor_and_labels_flattened() {
        let payload = json!({
            "number": 7,
            "title": "Broken build",
            "body": "see logs",
            "state": "open",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": null,
            "closed_at": null,
            "user": {"login": "octocat"},
            "labels": [{"name": "bug"}, {"name": "ci"}]
        });

        let issue: IssueRecord = serde_json::from_value(payload).unwrap();
        assert_eq!(issue.user.as_deref(), Some("octocat"));
        assert_eq!(issue.labels, vec!["bug", "ci"]);
        assert!(issue.comments.is_empty());
    }

    #[test]
    fn test_asset_download_url_alias() {
        let payload = json!({
            "name": "hv-linux-x86_64.tar.gz",
            "browser_download_url": "https://github.com/o/r/releases/download/v1/hv.tar.gz",
            "size": 4096
        });

        let asset: AssetRecord = serde_json::from_value(payload).unwrap();
        assert!(asset.download_url.ends_with("hv.tar.gz"));

        // Round-trips under the snapshot field name
        let out = serde_json::to_value(&asset).unwrap();
        assert!(out.get("download_url").is_some());
    }
}
