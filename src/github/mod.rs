//! GitHub REST API boundary: typed records and the blocking client.

pub mod client;
pub mod models;

pub use self::client::GitHubClient;

use self::models::{
    AccountProfile, GistRecord, IssueRecord, ReleaseRecord, RepositorySummary, SshKeyRecord,
};
use crate::error::Result;

/// Everything the backup engine needs from the remote platform.
///
/// [`GitHubClient`] implements this against api.github.com; tests plug in
/// in-memory fakes. Enumeration order is not guaranteed stable across calls.
pub trait GitHubApi: Send + Sync {
    /// Profile of the authenticated account.
    fn authenticated_user(&self) -> Result<AccountProfile>;

    /// Every repository visible to the authenticated account, all
    /// visibility levels, paged to completion.
    fn list_repositories(&self) -> Result<Vec<RepositorySummary>>;

    /// Fresh descriptive metadata for one repository.
    fn repository(&self, full_name: &str) -> Result<RepositorySummary>;

    /// All issues (any state, pull request threads included) with comments.
    fn issues(&self, full_name: &str) -> Result<Vec<IssueRecord>>;

    /// All releases with their asset names/URLs/sizes.
    fn releases(&self, full_name: &str) -> Result<Vec<ReleaseRecord>>;

    /// Account-level gists including file contents.
    fn gists(&self) -> Result<Vec<GistRecord>>;

    /// SSH public keys registered on the account.
    fn ssh_keys(&self) -> Result<Vec<SshKeyRecord>>;
}
