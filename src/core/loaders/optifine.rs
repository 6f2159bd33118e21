use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::context::InstallContext;
use super::installer::{LoaderInstallResult, LoaderInstaller};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::maven::MavenArtifact;
use crate::core::version::{ArgumentValue, Arguments, LibraryEntry, VersionJson};

const LAUNCHWRAPPER_PREFIX: &str = "net.minecraft.launchwrapper.";
const LAUNCHWRAPPER_MAIN: &str = "net.minecraft.launchwrapper.Launch";
const TWEAK_ARGS: [&str; 2] = ["--tweakClass", "optifine.OptiFineTweaker"];

/// Classes that embed the `OptiFine_<mc>_<edition>` marker, newest layout first.
const MARKER_CLASSES: [&str; 4] = [
    "net/optifine/Config.class",
    "notch/net/optifine/Config.class",
    "Config.class",
    "VersionThread.class",
];

/// Repackages an Optifine installer as a library plus a synthesized manifest.
pub struct OptifineInstaller;

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
}

/// Game version and edition read from the installer's marker string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptifineBuild {
    pub game_version: String,
    pub edition: String,
    /// Optifine helper jar bundled with the installer, when there is one.
    pub helper_version: Option<String>,
}

impl OptifineBuild {
    /// Parse `OptiFine_1.8.9_HD_U_M5` into `1.8.9` and `HD_U_M5`.
    pub fn from_marker(marker: &str) -> LauncherResult<Self> {
        let tokens: Vec<&str> = marker.split('_').collect();
        if tokens.len() < 3 {
            return Err(LauncherError::Loader(format!(
                "Unrecognised Optifine version marker {marker}"
            )));
        }

        Ok(Self {
            game_version: tokens[1].to_string(),
            edition: tokens[2..].join("_"),
            helper_version: None,
        })
    }

    pub fn library(&self) -> MavenArtifact {
        MavenArtifact::new(
            "optifine",
            "OptiFine",
            &format!("{}_{}", self.game_version, self.edition),
        )
    }

    pub fn helper(&self) -> MavenArtifact {
        match &self.helper_version {
            Some(v) => MavenArtifact::new("optifine", "launchwrapper-of", v),
            None => MavenArtifact::new("net.minecraft", "launchwrapper", "1.12"),
        }
    }
}

/// Longest catalog key that appears in the lower-cased token.
fn select_catalog_key<'c, V>(catalog: &'c BTreeMap<String, V>, token: &str) -> Option<&'c str> {
    let token = token.to_ascii_lowercase();
    catalog
        .keys()
        .filter(|key| token.contains(&key.to_ascii_lowercase()))
        .max_by_key(|key| key.len())
        .map(String::as_str)
}

/// Printable run starting at `OptiFine_` inside a class file.
pub fn scan_version_marker(class_bytes: &[u8]) -> Option<String> {
    const NEEDLE: &[u8] = b"OptiFine_";

    let start = class_bytes
        .windows(NEEDLE.len())
        .position(|window| window == NEEDLE)?;

    let marker: String = class_bytes[start..]
        .iter()
        .take_while(|b| (32u8..=122).contains(*b))
        .map(|&b| b as char)
        .collect();
    Some(marker)
}

fn is_helper_version(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit() || c == '.')
}

#[async_trait]
impl LoaderInstaller for OptifineInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        let raw = ctx
            .downloader
            .fetch_bytes(&ctx.endpoints.optifine_catalog)
            .await
            .map_err(|e| LauncherError::LoaderApi(format!("Optifine catalog: {e}")))?;
        let catalog: BTreeMap<String, CatalogEntry> = serde_json::from_slice(&raw)?;

        let key = select_catalog_key(&catalog, ctx.token).ok_or_else(|| {
            LauncherError::Loader(format!("No Optifine build matches {}", ctx.token))
        })?;
        let name = catalog
            .get(key)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| LauncherError::Loader(format!("Optifine catalog entry {key}")))?;

        let installer_path = ctx.temp_dir.join(format!("{name}.jar"));
        if !installer_path.exists() {
            let url = format!(
                "{}/{}.jar",
                ctx.endpoints.optifine_downloads.trim_end_matches('/'),
                name
            );
            ctx.downloader
                .download_file(&url, &installer_path, None)
                .await?;
        }

        let libraries_dir = ctx.root.libraries_dir();
        let build = tokio::task::spawn_blocking(move || {
            repackage_installer(&installer_path, &libraries_dir)
        })
        .await
        .map_err(|e| LauncherError::Other(format!("Optifine unpack task failed: {e}")))??;
        info!(
            "Installing Optifine {} for Minecraft {}",
            build.edition, build.game_version
        );

        let base = load_base_manifest(&ctx, &build.game_version).await;
        let manifest = synthesize_manifest(ctx.token, &build, base.as_ref());
        manifest.save_to(ctx.manifest_path).await?;

        Ok(LoaderInstallResult {
            manifest_path: ctx.manifest_path.to_path_buf(),
            inherits_from: Some(build.game_version),
        })
    }
}

/// Read the version marker, then copy the installer (and its helper) into the store.
fn repackage_installer(installer: &Path, libraries_dir: &Path) -> LauncherResult<OptifineBuild> {
    let file = File::open(installer).map_err(|e| LauncherError::io(installer, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let mut marker = None;
    for class in MARKER_CLASSES {
        let Ok(mut entry) = archive.by_name(class) else {
            continue;
        };
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| LauncherError::io(installer, e))?;
        if let Some(found) = scan_version_marker(&bytes) {
            marker = Some(found);
            break;
        }
    }
    let marker = marker
        .ok_or_else(|| LauncherError::Loader("Optifine version marker not found".into()))?;
    let mut build = OptifineBuild::from_marker(&marker)?;

    copy_if_absent(installer, &build.library().local_path(libraries_dir)?)?;

    let helper_version = match archive.by_name("launchwrapper-of.txt") {
        Ok(mut entry) => {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| LauncherError::io(installer, e))?;
            Some(text.trim().to_string())
        }
        Err(_) => None,
    };

    if let Some(version) = helper_version.filter(|v| is_helper_version(v)) {
        let jar_name = format!("launchwrapper-of-{version}.jar");
        build.helper_version = Some(version);
        let target = build.helper().local_path(libraries_dir)?;
        if !target.exists() {
            let mut entry = archive.by_name(&jar_name)?;
            write_entry(&mut entry, &target)?;
        }
    }

    Ok(build)
}

fn copy_if_absent(source: &Path, target: &Path) -> LauncherResult<()> {
    if target.exists() {
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    std::fs::copy(source, target).map_err(|e| LauncherError::io(target, e))?;
    Ok(())
}

fn write_entry(entry: &mut impl Read, target: &Path) -> LauncherResult<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let mut out = File::create(target).map_err(|e| LauncherError::io(target, e))?;
    std::io::copy(entry, &mut out).map_err(|e| LauncherError::io(target, e))?;
    Ok(())
}

/// Vanilla manifest the Optifine build targets, fetched through the catalog when absent.
async fn load_base_manifest(ctx: &InstallContext<'_>, game_version: &str) -> Option<VersionJson> {
    let path = ctx.root.version_json(game_version);

    if !path.exists() {
        let entry = ctx.catalog.and_then(|c| c.find_version(game_version))?;
        let digest = entry.expected_digest();
        if let Err(e) = ctx
            .downloader
            .download_file(&entry.url, &path, digest.as_deref())
            .await
        {
            warn!("Could not fetch base manifest {}: {}", game_version, e);
            return None;
        }
    }

    match VersionJson::load(&path).await {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            warn!("Could not read base manifest {:?}: {}", path, e);
            None
        }
    }
}

fn synthesize_manifest(
    token: &str,
    build: &OptifineBuild,
    base: Option<&VersionJson>,
) -> VersionJson {
    let mut manifest = VersionJson {
        id: token.to_string(),
        version_type: Some("release".to_string()),
        inherits_from: Some(build.game_version.clone()),
        libraries: vec![LibraryEntry::from_coordinate(build.library().to_string())],
        ..VersionJson::default()
    };

    let base_main = base.and_then(|b| b.main_class.as_deref()).unwrap_or_default();
    if base_main.starts_with(LAUNCHWRAPPER_PREFIX) {
        debug!("Base manifest already boots through launchwrapper");
        return manifest;
    }

    manifest.main_class = Some(LAUNCHWRAPPER_MAIN.to_string());
    manifest
        .libraries
        .push(LibraryEntry::from_coordinate(build.helper().to_string()));

    let structured =
        base.is_some_and(|b| b.minecraft_arguments.is_none() && b.arguments.is_some());
    if structured {
        manifest.arguments = Some(Arguments {
            game: TWEAK_ARGS
                .iter()
                .map(|a| ArgumentValue::Plain(a.to_string()))
                .collect(),
            jvm: Vec::new(),
        });
    } else {
        manifest.minecraft_arguments = Some(TWEAK_ARGS.join(" "));
    }

    manifest
}
