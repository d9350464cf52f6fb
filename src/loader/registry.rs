use super::binary::BinaryLoader;
use super::{LoadError, PointCloudLoader};
use crate::point_cloud::PointCollection;
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Open set of loaders, picked by file extension.
///
/// Loaders are consulted in registration order, the first whose
/// [`can_load`](PointCloudLoader::can_load) accepts the path wins.
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: Vec<Arc<dyn PointCloudLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in binary loader.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(BinaryLoader::new());
        registry
    }

    pub fn register<L: PointCloudLoader + 'static>(&mut self, loader: L) -> &mut Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn loaders(&self) -> impl Iterator<Item = &Arc<dyn PointCloudLoader>> {
        self.loaders.iter()
    }

    pub fn find(&self, path: &Path) -> Option<&Arc<dyn PointCloudLoader>> {
        self.loaders.iter().find(|loader| loader.can_load(path))
    }

    fn resolve(&self, path: &Path) -> Result<&Arc<dyn PointCloudLoader>, LoadError> {
        let loader = self
            .find(path)
            .ok_or_else(|| LoadError::UnsupportedFormat(path.to_path_buf()))?;
        debug!(loader = loader.name(), path = %path.display(), "resolved loader");
        Ok(loader)
    }

    pub fn load(&self, path: &Path) -> Result<PointCollection, LoadError> {
        self.resolve(path)?.load(path)
    }

    pub async fn load_async(&self, path: &Path) -> Result<PointCollection, LoadError> {
        self.resolve(path)?.load_async(path).await
    }

    /// Loads every path concurrently. Results keep the order of `paths`; the first error wins.
    pub async fn load_all_async<P: AsRef<Path>>(
        &self,
        paths: &[P],
    ) -> Result<Vec<PointCollection>, LoadError> {
        try_join_all(paths.iter().map(|path| self.load_async(path.as_ref()))).await
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.loaders.iter().map(|loader| loader.name()))
            .finish()
    }
}
