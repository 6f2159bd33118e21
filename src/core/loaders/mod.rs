pub mod context;
pub mod fabric;
pub mod forge;
pub mod installer;
pub mod optifine;

pub use context::InstallContext;
pub use installer::{Installer, LoaderInstallResult, LoaderInstaller, LoaderKind};
