// ─── Version Catalog ───
// Fetching and querying the global version index.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

/// Top-level version index.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionIndex {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the index.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    pub url: String,
    pub time: DateTime<Utc>,
    pub release_time: DateTime<Utc>,
    /// Only present in the v2 index.
    #[serde(default)]
    pub sha1: Option<String>,
}

/// `latest` and `snapshot` resolve through the index and never trust the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionAlias {
    Latest,
    Snapshot,
}

impl VersionAlias {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "latest" => Some(VersionAlias::Latest),
            "snapshot" => Some(VersionAlias::Snapshot),
            _ => None,
        }
    }
}

impl VersionIndex {
    pub async fn fetch(downloader: &Downloader, url: &str) -> LauncherResult<Self> {
        info!("Fetching version index...");

        let raw = downloader.fetch_bytes(url).await?;
        let index: VersionIndex = serde_json::from_slice(&raw)?;

        info!("Loaded {} versions from index", index.versions.len());
        Ok(index)
    }

    /// Find a version entry by id, ignoring ASCII case.
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id.eq_ignore_ascii_case(id))
    }

    pub fn resolve_alias(&self, alias: VersionAlias) -> LauncherResult<&VersionEntry> {
        let target = match alias {
            VersionAlias::Latest => &self.latest.release,
            VersionAlias::Snapshot => &self.latest.snapshot,
        };
        self.find_version(target)
            .ok_or_else(|| LauncherError::VersionNotFound(target.clone()))
    }
}

impl VersionEntry {
    /// Digest the remote manifest is expected to hash to.
    ///
    /// Manifest URLs embed it as the path segment before the file name
    /// (`.../v1/packages/<sha1>/<id>.json`); the v2 `sha1` field is the fallback.
    pub fn expected_digest(&self) -> Option<String> {
        digest_from_url(&self.url).or_else(|| self.sha1.clone())
    }
}

pub fn digest_from_url(url: &str) -> Option<String> {
    let mut segments = url.rsplit('/');
    segments.next()?;
    let candidate = segments.next()?;

    let is_sha1 = candidate.len() == 40 && candidate.chars().all(|c| c.is_ascii_hexdigit());
    is_sha1.then(|| candidate.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> VersionIndex {
        serde_json::from_value(serde_json::json!({
            "latest": { "release": "1.21", "snapshot": "24w14a" },
            "versions": [
                {
                    "id": "24w14a",
                    "type": "snapshot",
                    "url": "https://piston-meta.mojang.com/v1/packages/0123456789abcdef0123456789abcdef01234567/24w14a.json",
                    "time": "2024-04-03T12:00:00+00:00",
                    "releaseTime": "2024-04-03T12:00:00+00:00"
                },
                {
                    "id": "1.21",
                    "type": "release",
                    "url": "https://example.com/1.21.json",
                    "time": "2024-06-13T08:24:03+00:00",
                    "releaseTime": "2024-06-13T08:24:03+00:00",
                    "sha1": "ffffffffffffffffffffffffffffffffffffffff"
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn aliases_are_case_insensitive() {
        assert_eq!(VersionAlias::parse("LATEST"), Some(VersionAlias::Latest));
        assert_eq!(VersionAlias::parse("Snapshot"), Some(VersionAlias::Snapshot));
        assert_eq!(VersionAlias::parse("1.21"), None);
    }

    #[test]
    fn alias_resolves_through_latest_block() {
        let index = index();
        assert_eq!(index.resolve_alias(VersionAlias::Latest).unwrap().id, "1.21");
        assert_eq!(
            index.resolve_alias(VersionAlias::Snapshot).unwrap().version_type,
            "snapshot"
        );
    }

    #[test]
    fn digest_comes_from_url_segment_then_field() {
        let index = index();
        assert_eq!(
            index.find_version("24w14a").unwrap().expected_digest().as_deref(),
            Some("0123456789abcdef0123456789abcdef01234567")
        );
        assert_eq!(
            index.find_version("1.21").unwrap().expected_digest().as_deref(),
            Some("ffffffffffffffffffffffffffffffffffffffff")
        );
    }
}
