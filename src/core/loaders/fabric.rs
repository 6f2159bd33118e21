use async_trait::async_trait;
use tracing::info;

use super::context::InstallContext;
use super::installer::{LoaderInstallResult, LoaderInstaller};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::VersionJson;

/// Fabric publishes ready-made launcher profiles; the adapter stores one verbatim.
pub struct FabricInstaller;

/// Loader and game version carried by a `fabric-loader-<loader>-<game>` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabricToken {
    pub loader_version: String,
    pub game_version: String,
}

impl FabricToken {
    pub fn parse(token: &str) -> LauncherResult<Self> {
        let malformed = || {
            LauncherError::Loader(format!(
                "Expected fabric-loader-<loader>-<game>, got {token}"
            ))
        };

        let mut parts = token.splitn(4, '-');
        let (Some(_), Some(_), Some(loader), Some(game)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        if loader.is_empty() || game.is_empty() {
            return Err(malformed());
        }

        Ok(Self {
            loader_version: loader.to_string(),
            game_version: game.to_string(),
        })
    }

    pub fn profile_url(&self, fabric_meta: &str) -> String {
        format!(
            "{}/loader/{}/{}/profile/json",
            fabric_meta.trim_end_matches('/'),
            self.game_version,
            self.loader_version
        )
    }
}

#[async_trait]
impl LoaderInstaller for FabricInstaller {
    async fn install(&self, ctx: InstallContext<'_>) -> LauncherResult<LoaderInstallResult> {
        let token = FabricToken::parse(ctx.token)?;
        info!(
            "Installing Fabric {} for Minecraft {}",
            token.loader_version, token.game_version
        );

        let url = token.profile_url(&ctx.endpoints.fabric_meta);
        let raw = ctx
            .downloader
            .fetch_bytes(&url)
            .await
            .map_err(|e| LauncherError::LoaderApi(format!("Fabric meta {url}: {e}")))?;

        let profile = VersionJson::from_slice(&raw, ctx.manifest_path)?;
        if profile.main_class.as_deref().map_or(true, str::is_empty) {
            return Err(LauncherError::LoaderApi(
                "Fabric profile missing mainClass".into(),
            ));
        }

        if let Some(parent) = ctx.manifest_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }
        tokio::fs::write(ctx.manifest_path, &raw)
            .await
            .map_err(|e| LauncherError::io(ctx.manifest_path, e))?;

        info!("Fabric profile written to {:?}", ctx.manifest_path);

        Ok(LoaderInstallResult {
            manifest_path: ctx.manifest_path.to_path_buf(),
            inherits_from: profile
                .inherits_from
                .or(Some(token.game_version)),
        })
    }
}
