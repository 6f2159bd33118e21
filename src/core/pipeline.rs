// ─── Launch Pipeline ───
// Resolve → install libraries and assets → assemble → launch.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::core::assets::{AssetManager, SyncedAssets};
use crate::core::config::LauncherConfig;
use crate::core::downloader::Downloader;
use crate::core::error::LauncherResult;
use crate::core::http::build_http_client;
use crate::core::launch::arguments::{self, ArgumentContext, Identity};
use crate::core::launch::{launch, InProcessHost, LaunchMode, LaunchPlan};
use crate::core::layout::InstallRoot;
use crate::core::libraries::LibraryInstaller;
use crate::core::platform::Platform;
use crate::core::version::VersionResolver;

/// Loader names that make a version token count as modded by default.
const MODDED_MARKERS: &[&str] = &["fabric", "forge", "quilt", "optifine", "liteloader"];

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Concrete version id, loader id, or `latest`/`snapshot`.
    pub version_token: String,
    pub modded: bool,
    /// Launch through `java -cp` instead of an in-process class loader.
    pub use_classpath: bool,
    pub game_directory: Option<PathBuf>,
    pub start_on_first_thread: bool,
}

impl LaunchOptions {
    pub fn new(version_token: impl Into<String>) -> Self {
        let version_token = version_token.into();
        Self {
            modded: looks_modded(&version_token),
            version_token,
            use_classpath: false,
            game_directory: None,
            start_on_first_thread: false,
        }
    }
}

pub fn looks_modded(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    MODDED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// A plan ready to run, plus the Java binary for subprocess mode.
#[derive(Debug, Clone)]
pub struct PreparedLaunch {
    pub plan: LaunchPlan,
    pub java: PathBuf,
}

pub async fn resolve_and_launch(options: LaunchOptions, identity: Identity) -> LauncherResult<()> {
    resolve_and_launch_with_host(options, identity, None).await
}

pub async fn resolve_and_launch_with_host(
    options: LaunchOptions,
    identity: Identity,
    host: Option<&dyn InProcessHost>,
) -> LauncherResult<()> {
    let prepared = prepare_launch(&options, &identity).await?;
    launch(&prepared.plan, &prepared.java, host).await
}

/// Stage everything the launch needs without starting the game.
pub async fn prepare_launch(
    options: &LaunchOptions,
    identity: &Identity,
) -> LauncherResult<PreparedLaunch> {
    let root = match &options.game_directory {
        Some(dir) => InstallRoot::new(dir),
        None => InstallRoot::default_location()?,
    };
    let config = LauncherConfig::load(root.path());
    let platform = Platform::current()?;

    let mut downloader = Downloader::new(build_http_client()?);
    if let Some(limit) = config.max_parallel_downloads {
        downloader = downloader.with_concurrency(limit);
    }

    info!(
        "Preparing {} in {:?} ({})",
        options.version_token,
        root.path(),
        platform.os
    );

    let resolver = VersionResolver::new(&root, &downloader, &config.endpoints);
    let resolved = resolver.resolve(&options.version_token).await?;
    if resolved.inherited.is_some() && !options.modded {
        info!(
            "{} is not launched as modded, using vanilla libraries only",
            resolved.game.effective_id()
        );
    }

    let libraries = LibraryInstaller::new(&root, &downloader, &config.endpoints, &platform);
    let assets = AssetManager::new(&root, &downloader, &config.endpoints.resources);
    let asset_index = resolved.asset_index();

    let library_stage = libraries.install(&resolved, options.modded);
    let (installed, synced) = tokio::join!(library_stage, async {
        match asset_index {
            Some(info) => assets.sync(info).await.map(Some),
            None => Ok(None),
        }
    });
    let installed = installed?;
    let synced = synced?.unwrap_or_else(|| {
        warn!("No asset index declared, skipping asset sync");
        SyncedAssets {
            index_id: resolved
                .chain()
                .find_map(|m| m.asset_index_id())
                .unwrap_or("legacy")
                .to_string(),
            assets_root: root.assets_dir(),
            game_assets: root.assets_dir(),
        }
    });

    let libraries_dir = root.libraries_dir();
    let ctx = ArgumentContext {
        identity,
        version_name: resolved.game.effective_id(),
        version_type: resolved.version_type(),
        game_directory: root.path(),
        assets_root: &synced.assets_root,
        game_assets: &synced.game_assets,
        assets_index_name: &synced.index_id,
        natives_directory: &installed.natives_dir,
        library_directory: &libraries_dir,
    };

    let plan = LaunchPlan {
        argv: arguments::game_arguments(&resolved, &platform, &ctx),
        jvm_args: arguments::jvm_arguments(&resolved, &platform, &ctx),
        main_class: resolved.main_class()?.to_string(),
        mode: if options.use_classpath {
            LaunchMode::Subprocess
        } else {
            LaunchMode::Classloader
        },
        game_directory: root.path().to_path_buf(),
        start_on_first_thread: options.start_on_first_thread,
        classpath: installed.classpath,
        natives_dir: installed.natives_dir,
    };

    Ok(PreparedLaunch {
        plan,
        java: config.java_executable(),
    })
}
