use std::path::{Path, PathBuf};

use crate::core::config::Endpoints;
use crate::core::downloader::Downloader;
use crate::core::layout::InstallRoot;
use crate::core::version::VersionIndex;

/// Everything an adapter needs to turn a version token into a manifest on disk.
pub struct InstallContext<'a> {
    /// Version token as the user typed it (e.g. `fabric-loader-0.15.11-1.20.1`).
    pub token: &'a str,
    /// Where the adapter must write the manifest JSON.
    pub manifest_path: &'a Path,
    pub root: &'a InstallRoot,
    pub downloader: &'a Downloader,
    pub endpoints: &'a Endpoints,
    /// Version catalog, when it could be fetched.
    pub catalog: Option<&'a VersionIndex>,
    /// Scratch directory for installer archives.
    pub temp_dir: PathBuf,
}

impl<'a> InstallContext<'a> {
    pub fn new(
        token: &'a str,
        manifest_path: &'a Path,
        root: &'a InstallRoot,
        downloader: &'a Downloader,
        endpoints: &'a Endpoints,
        catalog: Option<&'a VersionIndex>,
    ) -> Self {
        Self {
            token,
            manifest_path,
            root,
            downloader,
            endpoints,
            catalog,
            temp_dir: std::env::temp_dir(),
        }
    }

    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }
}
