pub mod asset_index;

pub use asset_index::{AssetManager, SyncedAssets};
