use pointbin::prelude::*;
use pointbin::save_points;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pointbin=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let path = std::env::temp_dir().join("pointbin_sample.bin");
            let points: Vec<_> = (0..1000)
                .map(|i| {
                    let t = i as f32 * 0.01;
                    PointRecord::from_rgba8(
                        glam::Vec3::new(t.cos(), t.sin(), t),
                        [(i % 256) as u8, 128, 255 - (i % 256) as u8, 255],
                    )
                })
                .collect();
            save_points(&path, &points)?;
            path
        }
    };

    let registry = LoaderRegistry::with_defaults();
    let cloud = registry.load_async(&path).await?;

    println!("Points: {}", cloud.len());
    println!("Bounds: {:?}", cloud.bounds());
    println!("Center: {}", cloud.bounds().center());
    println!("Memory: {} bytes", cloud.memory_footprint());

    Ok(())
}
