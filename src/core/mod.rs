// ─── Morpheus Launcher Core ───
// Turns a version token into a staged, runnable installation.
//
// Architecture:
//   core/
//     version/     Version catalog, manifests, rules, inheritance resolution
//     loaders/     Fabric, Forge and Optifine manifest adapters
//     maven/       Coordinate parsing and repository layout
//     downloader/  Concurrent downloads with SHA-1 validation
//     libraries/   Library + native installation
//     assets/      Asset index + object reconciliation
//     launch/      Argument assembly + process spawner
//     pipeline     Resolve → install → launch

pub mod assets;
pub mod config;
pub mod downloader;
pub mod error;
pub mod http;
pub mod launch;
pub mod layout;
pub mod libraries;
pub mod loaders;
pub mod maven;
pub mod pipeline;
pub mod platform;
pub mod version;
