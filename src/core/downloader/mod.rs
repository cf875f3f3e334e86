mod client;

pub use client::{download_percent, Downloader};
