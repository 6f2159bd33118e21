pub mod client;
pub mod hash;

pub use client::{BatchReport, DownloadEntry, Downloader};
