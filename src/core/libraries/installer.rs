use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::natives::{self, NativePlanner};
use crate::core::config::Endpoints;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::LauncherResult;
use crate::core::layout::InstallRoot;
use crate::core::maven::join_relative;
use crate::core::platform::Platform;
use crate::core::version::{LibraryEntry, ResolvedVersion, VersionJson};

/// Output of the library stage.
#[derive(Debug, Clone)]
pub struct InstalledLibraries {
    /// Ordered, de-duplicated; the version jar comes last.
    pub classpath: Vec<PathBuf>,
    pub natives_dir: PathBuf,
}

pub struct LibraryInstaller<'a> {
    root: &'a InstallRoot,
    downloader: &'a Downloader,
    endpoints: &'a Endpoints,
    platform: &'a Platform,
}

impl<'a> LibraryInstaller<'a> {
    pub fn new(
        root: &'a InstallRoot,
        downloader: &'a Downloader,
        endpoints: &'a Endpoints,
        platform: &'a Platform,
    ) -> Self {
        Self {
            root,
            downloader,
            endpoints,
            platform,
        }
    }

    /// Fetch the libraries and stage their natives. A modded launch takes the whole
    /// manifest chain, any other launch only the vanilla manifest.
    pub async fn install(
        &self,
        resolved: &ResolvedVersion,
        modded: bool,
    ) -> LauncherResult<InstalledLibraries> {
        let libraries_dir = self.root.libraries_dir();
        let mut seen = HashSet::new();
        let mut classpath = Vec::new();
        let mut downloads = Vec::new();
        let mut planner = NativePlanner::new(self.root, self.endpoints, self.platform);

        let manifests: Vec<&VersionJson> = match (&resolved.inherited, modded) {
            (Some(vanilla), false) => vec![vanilla],
            _ => resolved.chain().collect(),
        };

        let mut skipped = 0usize;
        for library in manifests.into_iter().flat_map(|m| m.libraries.iter()) {
            if !library.is_allowed(self.platform) {
                debug!("Skipping library (rules): {}", library.name);
                skipped += 1;
                continue;
            }

            planner.add(library);
            if library.is_natives_only() {
                continue;
            }

            let relative = match library.relative_path() {
                Ok(relative) => relative,
                Err(e) => {
                    warn!("Skipping library {}: {}", library.name, e);
                    continue;
                }
            };
            let dest = match join_relative(&libraries_dir, &relative) {
                Ok(dest) => dest,
                Err(e) => {
                    warn!("Skipping library {}: {}", library.name, e);
                    continue;
                }
            };
            if !seen.insert(dest.clone()) {
                continue;
            }

            downloads.push(self.download_for(library, &relative, dest.clone()));
            classpath.push(dest);
        }

        let native_archives = planner.finish();
        let archive_paths: Vec<PathBuf> =
            native_archives.iter().map(|n| n.archive.clone()).collect();
        downloads.extend(native_archives.into_iter().map(|n| n.download));

        info!(
            "{} libraries on the classpath, {} skipped by rules, {} native archives",
            classpath.len(),
            skipped,
            archive_paths.len()
        );
        self.downloader.download_batch(downloads).await;

        let natives_dir = self.root.natives_dir(resolved.game.effective_id());
        natives::extract_all(archive_paths, &natives_dir).await?;

        let jar = self.root.version_jar(resolved.jar_id());
        if !classpath.contains(&jar) {
            classpath.push(jar);
        }

        Ok(InstalledLibraries {
            classpath,
            natives_dir,
        })
    }

    /// Explicit URLs are fetched as-is; anything else is probed on the
    /// library's repository (or the default one) first.
    fn download_for(&self, library: &LibraryEntry, relative: &str, dest: PathBuf) -> DownloadEntry {
        let sha1 = library.artifact_sha1().map(str::to_string);
        let size = library.artifact().and_then(|a| a.size);

        if let Some(url) = library.artifact().and_then(|a| a.remote_url()) {
            return DownloadEntry::new(url, dest, sha1).with_size(size);
        }

        let repo = library
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(&self.endpoints.libraries);
        let url = format!("{}/{}", repo.trim_end_matches('/'), relative);
        DownloadEntry::new(url, dest, sha1).with_size(size).probed()
    }
}
