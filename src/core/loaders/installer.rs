use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::error::LauncherResult;

use super::{
    context::InstallContext, fabric::FabricInstaller, forge::ForgeInstaller,
    optifine::OptifineInstaller,
};

/// What an adapter left on disk.
#[derive(Debug, Clone)]
pub struct LoaderInstallResult {
    pub manifest_path: PathBuf,
    /// Vanilla version the written manifest augments.
    pub inherits_from: Option<String>,
}

#[async_trait]
pub trait LoaderInstaller: Send + Sync {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult>;
}

/// Modloader families recognised in version tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderKind {
    Fabric,
    Forge,
    Optifine,
}

impl LoaderKind {
    /// Case-insensitive substring match on the token.
    pub fn detect(token: &str) -> Option<Self> {
        let token = token.to_ascii_lowercase();
        if token.contains("fabric") {
            Some(LoaderKind::Fabric)
        } else if token.contains("forge") {
            Some(LoaderKind::Forge)
        } else if token.contains("optifine") {
            Some(LoaderKind::Optifine)
        } else {
            None
        }
    }
}

/// Static dispatcher over the adapters.
pub enum Installer {
    Fabric(FabricInstaller),
    Forge(ForgeInstaller),
    Optifine(OptifineInstaller),
}

impl Installer {
    pub fn new(kind: LoaderKind) -> Self {
        match kind {
            LoaderKind::Fabric => Self::Fabric(FabricInstaller),
            LoaderKind::Forge => Self::Forge(ForgeInstaller),
            LoaderKind::Optifine => Self::Optifine(OptifineInstaller),
        }
    }

    pub async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        match self {
            Installer::Fabric(i) => i.install(ctx).await,
            Installer::Forge(i) => i.install(ctx).await,
            Installer::Optifine(i) => i.install(ctx).await,
        }
    }
}
