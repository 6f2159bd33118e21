pub mod manifest;
pub mod resolver;
pub mod rules;
pub mod version_file;

pub use manifest::VersionIndex;
pub use resolver::{ResolvedVersion, VersionResolver};
pub use version_file::{
    ArgumentValue, Arguments, AssetIndexInfo, LibDownloadArtifact, LibraryEntry, VersionJson,
};
