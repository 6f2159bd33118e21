// ─── Manifest Resolver ───
// Turns a version token into the manifest chain the later stages consume.

use tracing::{debug, info, warn};

use crate::core::config::Endpoints;
use crate::core::downloader::{hash, DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::InstallRoot;
use crate::core::loaders::{InstallContext, Installer, LoaderKind};
use crate::core::version::manifest::{VersionAlias, VersionIndex};
use crate::core::version::version_file::{AssetIndexInfo, VersionJson};

/// A game manifest and, when it inherits, the vanilla manifest underneath it.
#[derive(Debug, Clone)]
pub struct ResolvedVersion {
    pub game: VersionJson,
    pub inherited: Option<VersionJson>,
}

impl ResolvedVersion {
    /// Parent first, then the manifest that was asked for.
    pub fn chain(&self) -> impl Iterator<Item = &VersionJson> {
        self.inherited.iter().chain(std::iter::once(&self.game))
    }

    pub fn main_class(&self) -> LauncherResult<&str> {
        self.game
            .main_class
            .as_deref()
            .or_else(|| self.inherited.as_ref()?.main_class.as_deref())
            .ok_or_else(|| {
                LauncherError::Other(format!("{} declares no main class", self.game.id))
            })
    }

    pub fn asset_index(&self) -> Option<&AssetIndexInfo> {
        self.game
            .asset_index
            .as_ref()
            .or_else(|| self.inherited.as_ref()?.asset_index.as_ref())
    }

    /// Version folder holding the runnable client jar.
    pub fn jar_id(&self) -> &str {
        match &self.inherited {
            Some(parent) => parent.effective_id(),
            None => self.game.effective_id(),
        }
    }

    pub fn version_type(&self) -> &str {
        self.game
            .version_type
            .as_deref()
            .or_else(|| self.inherited.as_ref()?.version_type.as_deref())
            .unwrap_or("release")
    }
}

pub struct VersionResolver<'a> {
    root: &'a InstallRoot,
    downloader: &'a Downloader,
    endpoints: &'a Endpoints,
}

impl<'a> VersionResolver<'a> {
    pub fn new(root: &'a InstallRoot, downloader: &'a Downloader, endpoints: &'a Endpoints) -> Self {
        Self {
            root,
            downloader,
            endpoints,
        }
    }

    /// The catalog, or `None` when it cannot be fetched or parsed.
    pub async fn fetch_catalog(&self) -> Option<VersionIndex> {
        match VersionIndex::fetch(self.downloader, &self.endpoints.version_manifest).await {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Version catalog unavailable, continuing from local cache: {}", e);
                None
            }
        }
    }

    pub async fn resolve(&self, token: &str) -> LauncherResult<ResolvedVersion> {
        let catalog = self.fetch_catalog().await;
        self.resolve_with_catalog(token, catalog.as_ref()).await
    }

    pub async fn resolve_with_catalog(
        &self,
        token: &str,
        catalog: Option<&VersionIndex>,
    ) -> LauncherResult<ResolvedVersion> {
        let game = match VersionAlias::parse(token) {
            Some(alias) => self.resolve_alias(token, alias, catalog).await?,
            None => self.resolve_concrete(token, catalog, true).await?,
        };

        let inherited = match game.inherits_from.clone() {
            Some(parent) => {
                debug!("{} inherits from {}", game.id, parent);
                Some(self.resolve_concrete(&parent, catalog, false).await?)
            }
            None => None,
        };

        let resolved = ResolvedVersion { game, inherited };
        self.fetch_client_jars(&resolved).await;

        info!("Resolved version {}", resolved.game.effective_id());
        Ok(resolved)
    }

    // ── Aliases ─────────────────────────────────────────

    /// Always re-fetch; the remote target of an alias may have moved.
    async fn resolve_alias(
        &self,
        token: &str,
        alias: VersionAlias,
        catalog: Option<&VersionIndex>,
    ) -> LauncherResult<VersionJson> {
        let path = self.root.version_json(token);

        let Some(catalog) = catalog else {
            return self.load_cached(token).await;
        };
        let entry = catalog.resolve_alias(alias)?;
        info!("{} resolves to {}", token, entry.id);

        let digest = entry.expected_digest();
        if let Err(e) = self
            .downloader
            .download_file(&entry.url, &path, digest.as_deref())
            .await
        {
            warn!("Could not refresh {}: {}", token, e);
            return self.load_cached(token).await;
        }

        let mut manifest = VersionJson::load(&path).await?;
        manifest.requested_alias = Some(token.to_string());
        manifest.save_to(&path).await?;
        Ok(manifest)
    }

    // ── Concrete ids ────────────────────────────────────

    async fn resolve_concrete(
        &self,
        token: &str,
        catalog: Option<&VersionIndex>,
        allow_loaders: bool,
    ) -> LauncherResult<VersionJson> {
        let path = self.root.version_json(token);

        if let Some(entry) = catalog.and_then(|c| c.find_version(token)) {
            let digest = entry.expected_digest();
            if !hash::is_cached(&path, digest.as_deref()).await {
                info!("Fetching manifest for {}", entry.id);
                if let Err(e) = self
                    .downloader
                    .download_file(&entry.url, &path, digest.as_deref())
                    .await
                {
                    warn!("Could not fetch manifest {}: {}", token, e);
                }
            }
            return self.load_cached(token).await;
        }

        if !path.exists() && allow_loaders {
            if let Some(kind) = LoaderKind::detect(token) {
                self.run_adapter(kind, token, catalog).await?;
            }
        }

        self.load_cached(token).await
    }

    async fn run_adapter(
        &self,
        kind: LoaderKind,
        token: &str,
        catalog: Option<&VersionIndex>,
    ) -> LauncherResult<()> {
        info!("No local manifest for {}, running {:?} installer", token, kind);
        let path = self.root.version_json(token);
        let ctx = InstallContext::new(
            token,
            &path,
            self.root,
            self.downloader,
            self.endpoints,
            catalog,
        );
        let result = Installer::new(kind).install(ctx).await?;

        let mut manifest = VersionJson::load(&result.manifest_path).await?;
        let mut changed = false;
        if manifest.inherits_from.is_none() && result.inherits_from.is_some() {
            manifest.inherits_from = result.inherits_from;
            changed = true;
        }
        if kind == LoaderKind::Forge && manifest.id != token {
            manifest.id = token.to_string();
            changed = true;
        }
        if changed {
            manifest.save_to(&result.manifest_path).await?;
        }
        Ok(())
    }

    async fn load_cached(&self, token: &str) -> LauncherResult<VersionJson> {
        let path = self.root.version_json(token);
        if !path.exists() {
            return Err(LauncherError::VersionNotFound(token.to_string()));
        }
        VersionJson::load(&path).await
    }

    // ── Client jars ─────────────────────────────────────

    async fn fetch_client_jars(&self, resolved: &ResolvedVersion) {
        let entries: Vec<DownloadEntry> = resolved
            .chain()
            .filter_map(|manifest| {
                let client = manifest.client_download()?;
                Some(
                    DownloadEntry::new(
                        client.url.clone(),
                        self.root.version_jar(manifest.effective_id()),
                        Some(client.sha1.clone()),
                    )
                    .with_size(Some(client.size)),
                )
            })
            .collect();

        if entries.is_empty() {
            return;
        }
        self.downloader.download_batch(entries).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::hash::sha1_bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RELEASE_MANIFEST: &str = r#"{"id":"1.21","type":"release","mainClass":"net.minecraft.client.main.Main","libraries":[]}"#;

    fn catalog_json(server: &MockServer, manifest_sha1: &str) -> serde_json::Value {
        serde_json::json!({
            "latest": { "release": "1.21", "snapshot": "1.21" },
            "versions": [{
                "id": "1.21",
                "type": "release",
                "url": format!("{}/v1/packages/{}/1.21.json", server.uri(), manifest_sha1),
                "time": "2024-06-13T08:24:03+00:00",
                "releaseTime": "2024-06-13T08:24:03+00:00"
            }]
        })
    }

    async fn mount_catalog(server: &MockServer) {
        let digest = sha1_bytes(RELEASE_MANIFEST.as_bytes());
        Mock::given(method("GET"))
            .and(path("/catalog.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(catalog_json(server, &digest)))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/packages/{digest}/1.21.json")))
            .respond_with(ResponseTemplate::new(200).set_body_string(RELEASE_MANIFEST))
            .mount(server)
            .await;
    }

    fn endpoints(server: &MockServer) -> Endpoints {
        Endpoints {
            version_manifest: format!("{}/catalog.json", server.uri()),
            ..Endpoints::default()
        }
    }

    #[tokio::test]
    async fn latest_alias_is_saved_under_the_requested_name() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = endpoints(&server);
        let resolver = VersionResolver::new(&root, &downloader, &endpoints);

        let resolved = resolver.resolve("latest").await.unwrap();
        assert_eq!(resolved.game.effective_id(), "latest");

        let saved: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("versions/latest/latest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved["id"], "latest");
    }

    #[tokio::test]
    async fn valid_cached_manifest_is_not_fetched_again() {
        let server = MockServer::start().await;
        let digest = sha1_bytes(RELEASE_MANIFEST.as_bytes());
        Mock::given(method("GET"))
            .and(path("/catalog.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(catalog_json(&server, &digest)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/packages/{digest}/1.21.json")))
            .respond_with(ResponseTemplate::new(200).set_body_string(RELEASE_MANIFEST))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = endpoints(&server);
        let resolver = VersionResolver::new(&root, &downloader, &endpoints);

        resolver.resolve("1.21").await.unwrap();
        let second = resolver.resolve("1.21").await.unwrap();
        assert_eq!(second.game.id, "1.21");
    }

    #[tokio::test]
    async fn stale_cached_manifest_is_replaced() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let path = root.version_json("1.21");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"id":"1.21","mainClass":"stale.Main"}"#).unwrap();

        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = endpoints(&server);
        let resolved = VersionResolver::new(&root, &downloader, &endpoints)
            .resolve("1.21")
            .await
            .unwrap();

        assert_eq!(resolved.main_class().unwrap(), "net.minecraft.client.main.Main");
    }

    #[tokio::test]
    async fn missing_catalog_falls_back_to_local_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/catalog.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = endpoints(&server);
        let resolver = VersionResolver::new(&root, &downloader, &endpoints);

        let err = resolver.resolve("1.21").await.unwrap_err();
        assert!(matches!(err, LauncherError::VersionNotFound(ref v) if v == "1.21"));

        let path = root.version_json("1.21");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, RELEASE_MANIFEST).unwrap();
        assert_eq!(resolver.resolve("1.21").await.unwrap().game.id, "1.21");
    }

    #[tokio::test]
    async fn inherited_manifest_is_resolved_alongside() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let token = "fabric-loader-0.15.11-1.21";
        let path = root.version_json(token);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            r#"{"id":"fabric-loader-0.15.11-1.21","inheritsFrom":"1.21","mainClass":"net.fabricmc.loader.impl.launch.knot.KnotClient"}"#,
        )
        .unwrap();

        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = endpoints(&server);
        let resolved = VersionResolver::new(&root, &downloader, &endpoints)
            .resolve(token)
            .await
            .unwrap();

        assert_eq!(resolved.inherited.as_ref().unwrap().id, "1.21");
        assert_eq!(resolved.jar_id(), "1.21");
        assert_eq!(
            resolved.main_class().unwrap(),
            "net.fabricmc.loader.impl.launch.knot.KnotClient"
        );
        let ids: Vec<_> = resolved.chain().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1.21", token]);
    }

    #[tokio::test]
    async fn missing_loader_manifest_is_installed_and_linked_to_its_parent() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;
        Mock::given(method("GET"))
            .and(path("/fabric/loader/1.21/0.15.11/profile/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"id":"fabric-loader-0.15.11-1.21","mainClass":"net.fabricmc.loader.impl.launch.knot.KnotClient","libraries":[]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = Endpoints {
            fabric_meta: format!("{}/fabric", server.uri()),
            ..endpoints(&server)
        };
        let resolver = VersionResolver::new(&root, &downloader, &endpoints);

        let token = "fabric-loader-0.15.11-1.21";
        let resolved = resolver.resolve(token).await.unwrap();
        assert_eq!(resolved.game.inherits_from.as_deref(), Some("1.21"));
        assert_eq!(resolved.inherited.as_ref().unwrap().id, "1.21");

        let saved = VersionJson::load(&root.version_json(token)).await.unwrap();
        assert_eq!(saved.inherits_from.as_deref(), Some("1.21"));

        // The manifest is on disk now, so the adapter does not run again.
        resolver.resolve(token).await.unwrap();
    }

    fn forge_installer_bytes(version_json: &str) -> Vec<u8> {
        use std::io::Write;

        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("version.json", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(version_json.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn forge_manifest_is_renamed_to_the_requested_token() {
        let server = MockServer::start().await;
        mount_catalog(&server).await;
        Mock::given(method("GET"))
            .and(path("/forge/index.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "1.21": ["1.21-51.0.33"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/maven/1.21-51.0.33/forge-1.21-51.0.33-installer.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(forge_installer_bytes(
                r#"{"id":"1.21-forge-51.0.33","mainClass":"cpw.mods.bootstraplauncher.BootstrapLauncher"}"#,
            )))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let endpoints = Endpoints {
            forge_index: format!("{}/forge/index.json", server.uri()),
            forge_maven: format!("{}/maven", server.uri()),
            ..endpoints(&server)
        };

        let token = "1.21-Forge-51.0.33";
        let resolved = VersionResolver::new(&root, &downloader, &endpoints)
            .resolve(token)
            .await
            .unwrap();

        assert_eq!(resolved.game.id, token);
        assert_eq!(resolved.jar_id(), "1.21");
        let saved = VersionJson::load(&root.version_json(token)).await.unwrap();
        assert_eq!(saved.id, token);
        assert_eq!(saved.inherits_from.as_deref(), Some("1.21"));
    }
}
