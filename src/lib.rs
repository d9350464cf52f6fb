//! Loading of fixed-layout binary point clouds.
//!
//! A `.bin` file is a little-endian `u32` point count followed by that many 16 byte
//! records (`f32` x, y, z and a packed `u32` rgba color). Files decode into an immutable
//! [`PointCollection`] carrying its bounding box, count and memory footprint.

pub mod bounds;
pub mod config;
pub mod format;
pub mod loader;
pub mod point;
pub mod point_cloud;
pub mod prelude;

pub use bounds::Aabb;
pub use config::{ConfigError, LoaderOptions};
pub use format::{encode_points, save_points, write_points, FileHeader, MAX_POINT_COUNT};
pub use loader::binary::{BinaryLoader, DecodeStrategy};
pub use loader::registry::LoaderRegistry;
pub use loader::{LoadError, LoadReport, LoadWarning, PointCloudLoader};
pub use point::{pack_rgba, unpack_rgba, PointRecord};
pub use point_cloud::PointCollection;
