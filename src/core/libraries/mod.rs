pub mod installer;
pub mod natives;

pub use installer::{InstalledLibraries, LibraryInstaller};
