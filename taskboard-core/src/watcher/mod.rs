#[cfg(feature = "file-watcher")]
pub mod file_watcher;
pub mod types;
