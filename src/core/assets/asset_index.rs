use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::InstallRoot;
use crate::core::version::AssetIndexInfo;

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: BTreeMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

/// Where the game should look for the assets of one index.
#[derive(Debug, Clone)]
pub struct SyncedAssets {
    pub index_id: String,
    pub assets_root: PathBuf,
    /// Legacy indexes point the game at the flat `resources/` tree.
    pub game_assets: PathBuf,
}

/// Indexes whose id marks the flat, pre-1.6 layout.
pub fn is_legacy_layout(index_id: &str) -> bool {
    index_id.contains("pre-1.6")
}

/// Reconciles an asset index against the local object store.
pub struct AssetManager<'a> {
    root: &'a InstallRoot,
    downloader: &'a Downloader,
    resources_url: &'a str,
}

impl<'a> AssetManager<'a> {
    pub fn new(root: &'a InstallRoot, downloader: &'a Downloader, resources_url: &'a str) -> Self {
        Self {
            root,
            downloader,
            resources_url,
        }
    }

    /// Fetch the index when it is not on disk yet. The index itself is never digest-checked.
    pub async fn load_index(&self, info: &AssetIndexInfo) -> LauncherResult<AssetIndex> {
        let path = self.root.asset_index(&info.id);
        if !path.exists() {
            self.downloader.download_file(&info.url, &path, None).await?;
        }

        let raw = tokio::fs::read(&path)
            .await
            .map_err(|e| LauncherError::io(&path, e))?;
        serde_json::from_slice(&raw).map_err(|source| LauncherError::ManifestParse { path, source })
    }

    /// Target path of one object for this index layout.
    pub fn object_path(
        &self,
        index_id: &str,
        virtual_path: &str,
        hash: &str,
    ) -> LauncherResult<PathBuf> {
        if is_legacy_layout(index_id) {
            self.root.legacy_resource(virtual_path)
        } else {
            Ok(self.root.asset_object(hash))
        }
    }

    /// Reconcile every object of the index in one batch.
    pub async fn sync(&self, info: &AssetIndexInfo) -> LauncherResult<SyncedAssets> {
        let index = self.load_index(info).await?;
        let base = self.resources_url.trim_end_matches('/');

        let entries: Vec<DownloadEntry> = index
            .objects
            .iter()
            .filter(|(_, obj)| obj.hash.len() > 2)
            .filter_map(|(virtual_path, obj)| {
                let dest = match self.object_path(&info.id, virtual_path, &obj.hash) {
                    Ok(dest) => dest,
                    Err(e) => {
                        warn!("Skipping asset {}: {}", virtual_path, e);
                        return None;
                    }
                };
                let url = format!("{}/{}/{}", base, &obj.hash[..2], obj.hash);
                Some(
                    DownloadEntry::new(url, dest, Some(obj.hash.clone()))
                        .with_size(Some(obj.size)),
                )
            })
            .collect();

        info!(
            "Reconciling {} asset objects for index {}",
            entries.len(),
            info.id
        );
        let report = self.downloader.download_batch(entries).await;
        if !report.is_complete() {
            warn!("{} asset downloads failed", report.failures.len());
        }

        let assets_root = self.root.assets_dir();
        let game_assets = if is_legacy_layout(&info.id) {
            self.root.path().join("resources")
        } else {
            assets_root.clone()
        };

        Ok(SyncedAssets {
            index_id: info.id.clone(),
            assets_root,
            game_assets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::hash::sha1_bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_index(server: &MockServer, index_id: &str, objects: &[(&str, &[u8])]) {
        let mut map = serde_json::Map::new();
        for (virtual_path, body) in objects {
            let hash = sha1_bytes(body);
            map.insert(
                virtual_path.to_string(),
                serde_json::json!({ "hash": hash, "size": body.len() }),
            );
            Mock::given(method("GET"))
                .and(path(format!("/objects/{}/{}", &hash[..2], hash)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
                .expect(1)
                .mount(server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path(format!("/indexes/{index_id}.json")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "objects": map })),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    fn info(server: &MockServer, id: &str) -> AssetIndexInfo {
        AssetIndexInfo {
            id: id.to_string(),
            url: format!("{}/indexes/{id}.json", server.uri()),
            sha1: None,
            size: None,
            total_size: None,
        }
    }

    #[tokio::test]
    async fn legacy_index_uses_flat_resources_tree() {
        let server = MockServer::start().await;
        let dig: &[u8] = b"dig sound";
        serve_index(&server, "pre-1.6", &[("sound/dig.ogg", dig)]).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let resources = format!("{}/objects", server.uri());
        let synced = AssetManager::new(&root, &downloader, &resources)
            .sync(&info(&server, "pre-1.6"))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("resources/sound/dig.ogg")).unwrap(),
            dig
        );
        assert!(!root.asset_object(&sha1_bytes(dig)).exists());
        assert_eq!(synced.game_assets, dir.path().join("resources"));
    }

    #[tokio::test]
    async fn objects_are_content_addressed_and_not_refetched() {
        let server = MockServer::start().await;
        let icon: &[u8] = b"icon bytes";
        serve_index(&server, "17", &[("icons/icon_16x16.png", icon)]).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let downloader = Downloader::new(reqwest::Client::new());
        let resources = format!("{}/objects", server.uri());
        let manager = AssetManager::new(&root, &downloader, &resources);

        manager.sync(&info(&server, "17")).await.unwrap();
        let synced = manager.sync(&info(&server, "17")).await.unwrap();

        assert!(root.asset_object(&sha1_bytes(icon)).exists());
        assert!(root.asset_index("17").exists());
        assert_eq!(synced.assets_root, root.assets_dir());
    }

    #[tokio::test]
    async fn corrupted_object_is_refetched() {
        let server = MockServer::start().await;
        let body: &[u8] = b"texture";
        serve_index(&server, "5", &[("minecraft/textures/stone.png", body)]).await;

        let dir = tempfile::tempdir().unwrap();
        let root = InstallRoot::new(dir.path());
        let object = root.asset_object(&sha1_bytes(body));
        std::fs::create_dir_all(object.parent().unwrap()).unwrap();
        std::fs::write(&object, b"truncated").unwrap();

        let downloader = Downloader::new(reqwest::Client::new());
        let resources = format!("{}/objects", server.uri());
        AssetManager::new(&root, &downloader, &resources)
            .sync(&info(&server, "5"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&object).unwrap(), body);
    }

    #[tokio::test]
    async fn legacy_entries_outside_resources_are_skipped() {
        let server = MockServer::start().await;
        let body: &[u8] = b"escaped";
        let hash = sha1_bytes(body);
        Mock::given(method("GET"))
            .and(path(format!("/objects/{}/{}", &hash[..2], hash)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/indexes/pre-1.6.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "objects": { "../../escape.txt": { "hash": hash, "size": body.len() } }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let game = dir.path().join("game");
        let root = InstallRoot::new(&game);
        let downloader = Downloader::new(reqwest::Client::new());
        let resources = format!("{}/objects", server.uri());
        AssetManager::new(&root, &downloader, &resources)
            .sync(&info(&server, "pre-1.6"))
            .await
            .unwrap();

        assert!(!dir.path().join("escape.txt").exists());
        assert!(!game.join("escape.txt").exists());
    }
}
