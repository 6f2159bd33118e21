// ─── Install Root ───
// On-disk tree shared by every stage:
//   versions/<id>/<id>.json | <id>.jar | natives/
//   libraries/<maven path>
//   assets/indexes/<id>.json, assets/objects/<hh>/<hash>
//   resources/<virtual path>   (pre-1.6 assets)

use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::join_relative;

#[derive(Debug, Clone)]
pub struct InstallRoot {
    root: PathBuf,
}

impl InstallRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The conventional game directory of the running OS.
    pub fn default_location() -> LauncherResult<Self> {
        let root = if cfg!(target_os = "windows") {
            dirs::data_dir().map(|d| d.join(".minecraft"))
        } else if cfg!(target_os = "macos") {
            dirs::home_dir().map(|d| d.join("Library/Application Support/minecraft"))
        } else {
            dirs::home_dir().map(|d| d.join(".minecraft"))
        };

        root.map(Self::new).ok_or_else(|| {
            LauncherError::Other("Could not determine the home directory".to_string())
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{id}.json"))
    }

    pub fn version_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{id}.jar"))
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_dir(id).join("natives")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index(&self, id: &str) -> PathBuf {
        self.assets_dir().join("indexes").join(format!("{id}.json"))
    }

    pub fn asset_object(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    /// Flat layout used by pre-1.6 asset indexes.
    pub fn legacy_resource(&self, virtual_path: &str) -> LauncherResult<PathBuf> {
        join_relative(&self.root.join("resources"), virtual_path)
    }
}
