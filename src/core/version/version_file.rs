// ─── Version File ───
// Typed per-version manifest. Fields the launcher does not interpret are
// carried through `extra` so a saved manifest keeps its original shape.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::platform::Platform;
use crate::core::version::rules::{self, LibraryRule};

type JsonMap = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionJson {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    /// Legacy asset index name, used when `assetIndex` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Arguments>,
    /// Legacy flat argument template (pre-1.13).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
    /// Token the user asked for when it differs from the remote id.
    /// Rendered as `id` on save.
    #[serde(skip)]
    pub requested_alias: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadArtifact {
    pub sha1: String,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

/// One entry of a structured argument list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ArgumentValue {
    Plain(String),
    Conditional {
        #[serde(default)]
        rules: Vec<LibraryRule>,
        value: ArgumentTokens,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ArgumentTokens {
    One(String),
    Many(Vec<String>),
}

impl ArgumentValue {
    /// Tokens this entry contributes on `platform`.
    pub fn tokens(&self, platform: &Platform) -> Vec<String> {
        match self {
            ArgumentValue::Plain(token) => vec![token.clone()],
            ArgumentValue::Conditional { rules, value } => {
                if !rules::is_included(Some(rules.as_slice()), platform) {
                    return Vec::new();
                }
                match value {
                    ArgumentTokens::One(token) => vec![token.clone()],
                    ArgumentTokens::Many(tokens) => tokens.clone(),
                }
            }
        }
    }
}

// ─── Library Entry ───

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryEntry {
    /// Maven coordinate.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<LibraryRule>>,
    /// OS name → classifier template (legacy natives).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<BTreeMap<String, String>>,
    /// Repository base overriding the default library repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Top-level digest as published by loader metadata services.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(flatten)]
    pub extra: JsonMap,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<BTreeMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibDownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default)]
    pub url: String,
}

impl LibDownloadArtifact {
    /// Empty URLs mark artifacts that are produced locally (Forge installers).
    pub fn remote_url(&self) -> Option<&str> {
        let url = self.url.trim();
        (!url.is_empty()).then_some(url)
    }
}

impl LibraryEntry {
    pub fn from_coordinate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_allowed(&self, platform: &Platform) -> bool {
        rules::is_included(self.rules.as_deref(), platform)
    }

    pub fn artifact(&self) -> Option<&LibDownloadArtifact> {
        self.downloads.as_ref()?.artifact.as_ref()
    }

    pub fn classifiers(&self) -> Option<&BTreeMap<String, LibDownloadArtifact>> {
        self.downloads.as_ref()?.classifiers.as_ref()
    }

    /// Store-relative location: the explicit artifact path, else the maven path.
    pub fn relative_path(&self) -> LauncherResult<String> {
        if let Some(path) = self.artifact().and_then(|a| a.path.as_deref()) {
            return Ok(path.to_string());
        }
        Ok(MavenArtifact::parse(&self.name)?.relative_path())
    }

    /// Declared digest for the main artifact, if any.
    pub fn artifact_sha1(&self) -> Option<&str> {
        self.artifact()
            .and_then(|a| a.sha1.as_deref())
            .or(self.sha1.as_deref())
    }

    /// True when the entry only carries native classifiers and no jar for the classpath.
    pub fn is_natives_only(&self) -> bool {
        self.artifact().is_none() && self.natives.is_some()
    }
}

// ─── Load / Save ───

impl VersionJson {
    pub fn from_slice(bytes: &[u8], origin: &Path) -> LauncherResult<Self> {
        serde_json::from_slice(bytes).map_err(|source| LauncherError::ManifestParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub async fn load(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Self::from_slice(&raw, path)
    }

    /// Id as it is written to disk.
    pub fn effective_id(&self) -> &str {
        self.requested_alias.as_deref().unwrap_or(&self.id)
    }

    pub fn to_json_pretty(&self) -> LauncherResult<String> {
        let mut value = serde_json::to_value(self)?;
        if let Some(alias) = &self.requested_alias {
            value["id"] = serde_json::Value::String(alias.clone());
        }
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub async fn save_to(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        let json = self.to_json_pretty()?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| LauncherError::io(path, e))
    }

    pub fn asset_index_id(&self) -> Option<&str> {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    /// Game arguments for `platform`, from whichever template form is populated.
    pub fn game_arguments(&self, platform: &Platform) -> Vec<String> {
        if let Some(legacy) = &self.minecraft_arguments {
            return legacy.split_whitespace().map(str::to_string).collect();
        }
        match &self.arguments {
            Some(args) => args.game.iter().flat_map(|a| a.tokens(platform)).collect(),
            None => Vec::new(),
        }
    }

    pub fn jvm_arguments(&self, platform: &Platform) -> Vec<String> {
        match &self.arguments {
            Some(args) => args.jvm.iter().flat_map(|a| a.tokens(platform)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::OsFamily;

    fn linux() -> Platform {
        Platform::new(OsFamily::Linux, "x86_64")
    }

    #[test]
    fn argument_object_rules_apply_to_platform() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "test",
            "mainClass": "net.minecraft.client.main.Main",
            "arguments": {
                "game": [
                    "--username",
                    "${auth_player_name}",
                    {
                        "rules": [{"action": "allow", "os": {"name": "linux"}}],
                        "value": ["--linux-only"]
                    },
                    {
                        "rules": [{"action": "allow", "os": {"name": "windows"}}],
                        "value": "--should-not-appear"
                    },
                    {
                        "rules": [{"action": "allow", "features": {"is_demo_user": true}}],
                        "value": "--demo"
                    }
                ]
            }
        }))
        .unwrap();

        assert_eq!(
            parsed.game_arguments(&linux()),
            vec!["--username", "${auth_player_name}", "--linux-only"]
        );
    }

    #[test]
    fn legacy_template_is_split_on_whitespace() {
        let parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "1.8.9",
            "minecraftArguments": "--username ${auth_player_name}  --version ${version_name}"
        }))
        .unwrap();

        assert_eq!(parsed.game_arguments(&linux()).len(), 4);
        assert!(parsed.jvm_arguments(&linux()).is_empty());
    }

    #[test]
    fn requested_alias_is_rendered_as_id_and_unknown_fields_survive() {
        let mut parsed: VersionJson = serde_json::from_value(serde_json::json!({
            "id": "1.21",
            "type": "release",
            "complianceLevel": 1,
            "javaVersion": { "component": "java-runtime-delta", "majorVersion": 21 },
            "libraries": [{ "name": "a:b:1.0", "extract": { "exclude": ["META-INF/"] } }]
        }))
        .unwrap();
        parsed.requested_alias = Some("latest".to_string());

        let saved: serde_json::Value =
            serde_json::from_str(&parsed.to_json_pretty().unwrap()).unwrap();
        assert_eq!(saved["id"], "latest");
        assert_eq!(saved["complianceLevel"], 1);
        assert_eq!(saved["javaVersion"]["majorVersion"], 21);
        assert_eq!(saved["libraries"][0]["extract"]["exclude"][0], "META-INF/");
        assert!(saved.get("requestedAlias").is_none());
    }

    #[test]
    fn library_path_prefers_explicit_artifact_path() {
        let explicit: LibraryEntry = serde_json::from_value(serde_json::json!({
            "name": "com.mojang:brigadier:1.0.18",
            "downloads": { "artifact": {
                "path": "custom/brigadier.jar",
                "sha1": "abc",
                "size": 1,
                "url": "https://libraries.minecraft.net/custom/brigadier.jar"
            }}
        }))
        .unwrap();
        assert_eq!(explicit.relative_path().unwrap(), "custom/brigadier.jar");
        assert_eq!(explicit.artifact_sha1(), Some("abc"));

        let derived = LibraryEntry::from_coordinate("net.fabricmc:sponge-mixin:0.12.5+mixin.0.8.5");
        assert_eq!(
            derived.relative_path().unwrap(),
            "net/fabricmc/sponge-mixin/0.12.5+mixin.0.8.5/sponge-mixin-0.12.5+mixin.0.8.5.jar"
        );
    }

    #[test]
    fn malformed_manifest_reports_its_path() {
        let err = VersionJson::from_slice(b"{\"id\": 3", Path::new("versions/x/x.json")).unwrap_err();
        assert!(matches!(err, LauncherError::ManifestParse { ref path, .. } if path.ends_with("x.json")));
    }
}
