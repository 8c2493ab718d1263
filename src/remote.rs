// Default owner/repo detection
//
// Reads the `origin` remote of the enclosing git repository and splits
// its URL into owner and repository name. The result only seeds prompt
// defaults, so callers treat any failure here as "no defaults".

use std::path::Path;

use git2::Repository;
use url::Url;

use crate::error::{ReleaseError, Result};

/// Owner and repository name parsed from a remote URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDefaults {
    pub owner: String,
    pub repo: String,
}

/// Discover the repository containing `path` and parse its `origin` URL
pub fn detect_origin<P: AsRef<Path>>(path: P) -> Result<RemoteDefaults> {
    let repo = Repository::discover(path)?;
    let remote = repo.find_remote("origin")?;
    let url = remote
        .url()
        .ok_or_else(|| ReleaseError::InvalidRemoteUrl("origin has no utf-8 url".into()))?;
    parse_remote_url(url)
}

/// Parse a remote URL of any host.
///
/// Supports:
/// - `https://host/owner/repo.git`
/// - `ssh://git@host/owner/repo.git`
/// - `git@host:owner/repo.git`
///
/// The `.git` suffix is optional in every form.
pub fn parse_remote_url(url: &str) -> Result<RemoteDefaults> {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            return parse_owner_repo_path(parsed.path().trim_start_matches('/'), url);
        }
    }

    // scp-like syntax: [user@]host:owner/repo
    if let Some((host, path)) = url.split_once(':') {
        if !host.is_empty() && !host.contains('/') {
            return parse_owner_repo_path(path.trim_start_matches('/'), url);
        }
    }

    Err(ReleaseError::InvalidRemoteUrl(url.to_string()))
}

fn parse_owner_repo_path(path: &str, url: &str) -> Result<RemoteDefaults> {
    let path = path.trim_end_matches('/').trim_end_matches(".git");
    let mut parts = path.rsplitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some(repo), Some(owner)) if !repo.is_empty() && !owner.is_empty() => Ok(RemoteDefaults {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }),
        _ => Err(ReleaseError::InvalidRemoteUrl(url.to_string())),
    }
}
