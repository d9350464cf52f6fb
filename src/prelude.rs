pub use crate::bounds::Aabb;
pub use crate::config::LoaderOptions;
pub use crate::loader::binary::{BinaryLoader, DecodeStrategy};
pub use crate::loader::registry::LoaderRegistry;
pub use crate::loader::PointCloudLoader;
pub use crate::point::PointRecord;
pub use crate::point_cloud::PointCollection;

// Error types
pub use crate::config::ConfigError;
pub use crate::loader::LoadError;
pub use crate::loader::LoadWarning;
