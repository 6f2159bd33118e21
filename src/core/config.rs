use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const CONFIG_FILE: &str = "launcher_config.json";

/// Remote services the pipeline talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub version_manifest: String,
    /// Asset object CDN; objects live at `<resources>/<hh>/<hash>`.
    pub resources: String,
    /// Default maven repository for libraries without an explicit URL.
    pub libraries: String,
    pub fabric_meta: String,
    /// `{gameVersion: [fullForgeVersion, ...]}` index.
    pub forge_index: String,
    pub forge_maven: String,
    /// `{gameVersion: {name}}` catalog of Optifine builds.
    pub optifine_catalog: String,
    pub optifine_downloads: String,
    /// Maintained ARM builds of old LWJGL natives.
    pub native_replacements: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            version_manifest: "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json"
                .to_string(),
            resources: "https://resources.download.minecraft.net".to_string(),
            libraries: "https://libraries.minecraft.net".to_string(),
            fabric_meta: "https://meta.fabricmc.net/v2/versions".to_string(),
            forge_index:
                "https://files.minecraftforge.net/net/minecraftforge/forge/maven-metadata.json"
                    .to_string(),
            forge_maven: "https://maven.minecraftforge.net/net/minecraftforge/forge/".to_string(),
            optifine_catalog: "https://morpheuslauncher.it/downloads/extra-optifine/versions.json"
                .to_string(),
            optifine_downloads: "https://morpheuslauncher.it/downloads/extra-optifine".to_string(),
            native_replacements: "https://morpheuslauncher.it/downloads/extra-natives".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub endpoints: Endpoints,
    /// Java executable used in subprocess mode. Defaults to `java` on `PATH`.
    pub java_path: Option<PathBuf>,
    pub max_parallel_downloads: Option<usize>,
}

impl LauncherConfig {
    /// Read `<root>/launcher_config.json`, falling back to defaults.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("No launcher config at {:?}, using defaults", path);
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring malformed launcher config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    pub fn java_executable(&self) -> PathBuf {
        self.java_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("java"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "endpoints": { "libraries": "http://127.0.0.1:9/maven" }, "max_parallel_downloads": 2 }"#,
        )
        .unwrap();

        let config = LauncherConfig::load(dir.path());
        assert_eq!(config.endpoints.libraries, "http://127.0.0.1:9/maven");
        assert_eq!(config.endpoints.resources, Endpoints::default().resources);
        assert_eq!(config.max_parallel_downloads, Some(2));
        assert_eq!(config.java_executable(), PathBuf::from("java"));
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();

        let config = LauncherConfig::load(dir.path());
        assert_eq!(config.endpoints.fabric_meta, Endpoints::default().fabric_meta);
        assert!(config.java_path.is_none());
    }
}
