use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use super::context::InstallContext;
use super::installer::{LoaderInstallResult, LoaderInstaller};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::{join_relative, MavenArtifact};

type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Installs Forge by unpacking the official installer archive.
///
/// Install processors (binary patching of the client jar) are not run.
pub struct ForgeInstaller;

/// Pick the installer version for `token` from a `{gameVersion: [fullVersion]}` index.
///
/// Game keys are kept when the token's first `-` segment contains them. Inside a
/// kept key, an entry survives when its Forge segment appears in the token. Builds
/// with four or more dotted parts also match on their first three. The last
/// survivor wins.
pub fn select_installer_candidate(index: &JsonMap, token: &str) -> Option<String> {
    let head = token.split('-').next().unwrap_or(token);

    index
        .iter()
        .filter(|(game_version, _)| !game_version.is_empty())
        .filter(|(game_version, _)| head.contains(game_version.as_str()))
        .filter_map(|(_, versions)| versions.as_array())
        .flatten()
        .filter_map(|v| v.as_str())
        .filter(|full| {
            let Some(forge_version) = full.split('-').nth(1).filter(|v| !v.is_empty()) else {
                return false;
            };
            if token.contains(forge_version) {
                return true;
            }
            let parts: Vec<&str> = forge_version.split('.').collect();
            parts.len() > 3 && token.contains(&parts[..3].join("."))
        })
        .last()
        .map(str::to_string)
}

fn installer_url(forge_maven: &str, version: &str) -> String {
    format!(
        "{}/{version}/forge-{version}-installer.jar",
        forge_maven.trim_end_matches('/')
    )
}

#[async_trait]
impl LoaderInstaller for ForgeInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        let raw_index = ctx
            .downloader
            .fetch_bytes(&ctx.endpoints.forge_index)
            .await
            .map_err(|e| LauncherError::LoaderApi(format!("Forge index: {e}")))?;
        let index: JsonMap = serde_json::from_slice(&raw_index)?;

        let version = select_installer_candidate(&index, ctx.token).ok_or_else(|| {
            LauncherError::Loader(format!("No Forge installer matches {}", ctx.token))
        })?;
        let game_version = version.split('-').next().unwrap_or(&version).to_string();
        info!("Installing Forge {} for {}", version, ctx.token);

        let installer_path = ctx.temp_dir.join(format!("forge-{version}-installer.jar"));
        if !installer_path.exists() {
            let url = installer_url(&ctx.endpoints.forge_maven, &version);
            ctx.downloader
                .download_file(&url, &installer_path, None)
                .await?;
        } else {
            debug!("Reusing cached installer {:?}", installer_path);
        }

        let manifest_path = ctx.manifest_path.to_path_buf();
        let libraries_dir = ctx.root.libraries_dir();
        let target = manifest_path.clone();
        let inherits_from = tokio::task::spawn_blocking(move || {
            unpack_installer(&installer_path, &target, &libraries_dir, &game_version)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Forge unpack task failed: {e}")))??;

        info!("Forge {} installed", version);
        Ok(LoaderInstallResult {
            manifest_path,
            inherits_from: Some(inherits_from),
        })
    }
}

// ─── Installer archive ───

/// What `install_profile.json` tells us about the bundled artifact.
#[derive(Debug, Default)]
struct ProfileInfo {
    coordinate: Option<String>,
    file_path: Option<String>,
    version_info: Option<serde_json::Value>,
}

impl ProfileInfo {
    fn from_value(profile: &serde_json::Value) -> Self {
        let install = profile.get("install");
        let text =
            |v: Option<&serde_json::Value>| v.and_then(|v| v.as_str()).map(str::to_string);

        Self {
            coordinate: text(profile.get("path"))
                .or_else(|| text(install.and_then(|i| i.get("path")))),
            file_path: text(install.and_then(|i| i.get("filePath"))),
            version_info: profile
                .get("versionInfo")
                .filter(|v| v.is_object())
                .cloned(),
        }
    }
}

/// Write the manifest and extract bundled jars. Returns the parent version.
fn unpack_installer(
    installer: &Path,
    manifest_path: &Path,
    libraries_dir: &Path,
    game_version: &str,
) -> LauncherResult<String> {
    let file = File::open(installer).map_err(|e| LauncherError::io(installer, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let profile = match archive.by_name("install_profile.json") {
        Ok(entry) => {
            let value: serde_json::Value = serde_json::from_reader(entry)?;
            ProfileInfo::from_value(&value)
        }
        Err(_) => ProfileInfo::default(),
    };

    if let Some(parent) = manifest_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }

    if let Some(mut version_info) = profile.version_info.clone() {
        version_info["inheritsFrom"] = serde_json::Value::String(game_version.to_string());
        let json = serde_json::to_string_pretty(&version_info)?;
        std::fs::write(manifest_path, json).map_err(|e| LauncherError::io(manifest_path, e))?;
    } else {
        let mut entry = archive
            .by_name("version.json")
            .map_err(|e| LauncherError::Loader(format!("Installer has no manifest: {e}")))?;
        let mut raw = Vec::new();
        entry
            .read_to_end(&mut raw)
            .map_err(|e| LauncherError::io(installer, e))?;
        std::fs::write(manifest_path, &raw).map_err(|e| LauncherError::io(manifest_path, e))?;
    }

    let inherits_from = ensure_inherits_from(manifest_path, game_version)?;
    extract_bundled_jars(&mut archive, &profile, libraries_dir)?;
    Ok(inherits_from)
}

/// Fill a missing `inheritsFrom`; leaves the file untouched when it is already set.
fn ensure_inherits_from(manifest_path: &Path, game_version: &str) -> LauncherResult<String> {
    let raw = std::fs::read(manifest_path).map_err(|e| LauncherError::io(manifest_path, e))?;
    let mut value: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|source| LauncherError::ManifestParse {
            path: manifest_path.to_path_buf(),
            source,
        })?;

    if let Some(existing) = value.get("inheritsFrom").and_then(|v| v.as_str()) {
        return Ok(existing.to_string());
    }

    value["inheritsFrom"] = serde_json::Value::String(game_version.to_string());
    let json = serde_json::to_string_pretty(&value)?;
    std::fs::write(manifest_path, json).map_err(|e| LauncherError::io(manifest_path, e))?;
    Ok(game_version.to_string())
}

fn extract_bundled_jars(
    archive: &mut zip::ZipArchive<File>,
    profile: &ProfileInfo,
    libraries_dir: &Path,
) -> LauncherResult<()> {
    let coordinate_target = match profile.coordinate.as_deref() {
        Some(coord) => Some(MavenArtifact::parse(coord)?.local_path(libraries_dir)?),
        None => None,
    };

    let mut names: Vec<String> = archive
        .file_names()
        .filter(|name| name.ends_with(".jar"))
        .map(str::to_string)
        .collect();
    // The declared universal jar claims the coordinate path before any other entry.
    if let Some(file_path) = &profile.file_path {
        if let Some(pos) = names.iter().position(|n| n == file_path) {
            let declared = names.remove(pos);
            names.insert(0, declared);
        }
    }

    for name in names {
        let target: PathBuf = match name.strip_prefix("maven/") {
            Some(relative) => join_relative(libraries_dir, relative)?,
            None => match &coordinate_target {
                Some(target) => target.clone(),
                None => continue,
            },
        };

        if target.exists() {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
        }

        let mut entry = archive.by_name(&name)?;
        let mut out = File::create(&target).map_err(|e| LauncherError::io(&target, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&target, e))?;
        debug!("Extracted {} -> {:?}", name, target);
    }

    Ok(())
}
