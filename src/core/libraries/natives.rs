// ─── Natives ───
// Selects the native archives a manifest needs on this platform and unpacks
// their shared libraries into the version's natives directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::config::Endpoints;
use crate::core::downloader::DownloadEntry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::layout::InstallRoot;
use crate::core::maven::{join_relative, MavenArtifact};
use crate::core::platform::{OsFamily, Platform};
use crate::core::version::{LibDownloadArtifact, LibraryEntry};

const NATIVE_SUFFIXES: [&str; 4] = [".dll", ".so", ".dylib", ".jnilib"];

/// One archive to fetch (when needed) and unpack.
#[derive(Debug, Clone)]
pub struct NativeArchive {
    pub archive: PathBuf,
    pub download: DownloadEntry,
}

/// Collects native archives for one pass, fetching each replacement at most once.
pub struct NativePlanner<'a> {
    root: &'a InstallRoot,
    endpoints: &'a Endpoints,
    platform: &'a Platform,
    seen: HashSet<PathBuf>,
    archives: Vec<NativeArchive>,
}

impl<'a> NativePlanner<'a> {
    pub fn new(root: &'a InstallRoot, endpoints: &'a Endpoints, platform: &'a Platform) -> Self {
        Self {
            root,
            endpoints,
            platform,
            seen: HashSet::new(),
            archives: Vec::new(),
        }
    }

    pub fn finish(self) -> Vec<NativeArchive> {
        self.archives
    }

    /// Queue whatever natives `library` contributes. The library must already
    /// have passed its rule check.
    pub fn add(&mut self, library: &LibraryEntry) {
        if let Some(classifiers) = library.classifiers() {
            for bucket in self.platform.os.native_classifiers() {
                if let Some(artifact) = classifiers.get(*bucket) {
                    self.add_classifier(library, bucket, artifact);
                }
            }
            return;
        }

        let is_unified_native =
            library.name.to_ascii_lowercase().contains("native") && library.rules.is_some();
        if is_unified_native {
            self.add_unified(library);
        }
    }

    fn add_classifier(
        &mut self,
        library: &LibraryEntry,
        bucket: &str,
        artifact: &LibDownloadArtifact,
    ) {
        let needs_arm_build = self.platform.is_arm()
            && self.platform.os != OsFamily::Windows
            && artifact.url.contains("lwjgl-platform-2");
        if needs_arm_build {
            let os = match self.platform.os {
                OsFamily::Osx => "macos",
                _ => "linux",
            };
            self.add_replacement(&format!("lwjgl-2-{os}-aarch64.zip"));
            return;
        }

        let archive = match artifact.path.as_deref() {
            Some(path) => join_relative(&self.root.libraries_dir(), path),
            None => MavenArtifact::parse(&library.name).and_then(|coord| {
                coord
                    .with_classifier(bucket)
                    .local_path(&self.root.libraries_dir())
            }),
        };
        let archive = match archive {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Skipping natives of {}: {}", library.name, e);
                return;
            }
        };

        let Some(url) = artifact.remote_url() else {
            return;
        };
        self.push(
            archive.clone(),
            DownloadEntry::new(url, archive, artifact.sha1.clone()).with_size(artifact.size),
        );
    }

    fn add_unified(&mut self, library: &LibraryEntry) {
        if !self.platform.accepts_native(&library.name) {
            let lwjgl_on_arm_linux = self.platform.is_arm()
                && self.platform.os == OsFamily::Linux
                && library.name.contains("lwjgl");
            if lwjgl_on_arm_linux {
                self.add_replacement("lwjgl-3.3-linux-aarch64.zip");
            } else {
                debug!("Skipping native {} (architecture mismatch)", library.name);
            }
            return;
        }

        let Some(artifact) = library.artifact() else {
            return;
        };
        let Some(url) = artifact.remote_url() else {
            return;
        };
        let archive = match library
            .relative_path()
            .and_then(|relative| join_relative(&self.root.libraries_dir(), &relative))
        {
            Ok(archive) => archive,
            Err(e) => {
                warn!("Skipping native {}: {}", library.name, e);
                return;
            }
        };

        self.push(
            archive.clone(),
            DownloadEntry::new(url, archive, artifact.sha1.clone()).with_size(artifact.size),
        );
    }

    fn add_replacement(&mut self, file_name: &str) {
        let archive = self
            .root
            .libraries_dir()
            .join("extra-natives")
            .join(file_name);
        let url = format!(
            "{}/{}",
            self.endpoints.native_replacements.trim_end_matches('/'),
            file_name
        );
        self.push(archive.clone(), DownloadEntry::new(url, archive, None));
    }

    fn push(&mut self, archive: PathBuf, download: DownloadEntry) {
        if self.seen.insert(archive.clone()) {
            self.archives.push(NativeArchive { archive, download });
        }
    }
}

fn is_native_binary(name: &str) -> bool {
    NATIVE_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

/// Unpack native binaries from `archive` into `natives_dir`, dropping any
/// directory structure. Returns the number of files written.
pub fn extract_archive(archive: &Path, natives_dir: &Path) -> LauncherResult<usize> {
    let file = std::fs::File::open(archive).map_err(|e| LauncherError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)?;
    let mut written = 0;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let Some(file_name) = name.rsplit(['/', '\\']).next().filter(|n| !n.is_empty()) else {
            continue;
        };
        if !is_native_binary(file_name) {
            continue;
        }

        let dest = natives_dir.join(file_name);
        let mut out = std::fs::File::create(&dest).map_err(|e| LauncherError::io(&dest, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| LauncherError::io(&dest, e))?;
        debug!("Extracted native: {}", file_name);
        written += 1;
    }

    Ok(written)
}

/// Unpack every available archive. Missing or unreadable archives are logged and skipped.
pub async fn extract_all(archives: Vec<PathBuf>, natives_dir: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|e| LauncherError::io(natives_dir, e))?;

    let dest = natives_dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        for archive in archives.iter().filter(|a| a.exists()) {
            if let Err(e) = extract_archive(archive, &dest) {
                warn!("Cannot unpack natives from {:?}: {}", archive, e);
            }
        }
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {}", e)))
}
