pub mod binary;
pub mod registry;

use crate::config::ConfigError;
use crate::point_cloud::PointCollection;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// A format specific point cloud reader.
///
/// Every failure is returned as a [`LoadError`]; implementations never panic across this boundary.
#[async_trait]
pub trait PointCloudLoader: Send + Sync {
    fn name(&self) -> &str;

    /// Lower-cased extensions including the leading dot, e.g. `.bin`.
    fn supported_extensions(&self) -> &[&str];

    fn can_load(&self, path: &Path) -> bool {
        // Suffix from the last dot of the file name, so a bare `.bin` counts as `.bin`.
        let ext = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.rfind('.').map(|dot| &name[dot..]));

        match ext {
            Some(ext) if ext.len() > 1 => self
                .supported_extensions()
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }

    /// Blocks the calling thread until the file is decoded.
    fn load(&self, path: &Path) -> Result<PointCollection, LoadError>;

    /// Same result as [`load`](Self::load), with I/O and decoding done off the caller's thread.
    async fn load_async(&self, path: &Path) -> Result<PointCollection, LoadError>;
}

#[async_trait]
impl<L: PointCloudLoader + ?Sized> PointCloudLoader for Arc<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supported_extensions(&self) -> &[&str] {
        (**self).supported_extensions()
    }

    fn can_load(&self, path: &Path) -> bool {
        (**self).can_load(path)
    }

    fn load(&self, path: &Path) -> Result<PointCollection, LoadError> {
        (**self).load(path)
    }

    async fn load_async(&self, path: &Path) -> Result<PointCollection, LoadError> {
        (**self).load_async(path).await
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Declared point count {count} exceeds the limit of {limit}")]
    CountExceedsLimit { count: u32, limit: u32 },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid binary data at byte {offset}: {reason}")]
    Decode { offset: u64, reason: String },

    #[error("Native memory layout does not match the wire format")]
    LayoutAssumptionViolated,

    #[error("Invalid loader options: {0}")]
    Config(#[from] ConfigError),

    #[error("No loader registered for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Background load failed: {0}")]
    Worker(String),
}

/// Non-fatal findings of a successful load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    #[error("File size {actual} does not match the {expected} bytes implied by its header, data may be corrupt")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// A decoded collection together with the warnings raised while decoding it.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub collection: PointCollection,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_collection(self) -> PointCollection {
        self.collection
    }
}
