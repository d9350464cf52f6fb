use crate::point::PointRecord;
use binrw::{binrw, BinResult, BinWrite};
use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

/// Size of the `u32` point count header.
pub const HEADER_SIZE: usize = 4;

/// Size of one encoded [`PointRecord`].
pub const POINT_STRIDE: usize = 16;

/// Upper bound on the declared point count. Larger headers are rejected before any allocation.
pub const MAX_POINT_COUNT: u32 = 50_000_000;

pub const BINARY_EXTENSION: &str = ".bin";

#[binrw]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct FileHeader {
    pub point_count: u32,
}

/// File length implied by a header declaring `point_count` records.
pub const fn expected_file_size(point_count: u32) -> u64 {
    HEADER_SIZE as u64 + point_count as u64 * POINT_STRIDE as u64
}

/// Number of complete records a file of `file_len` bytes can hold after its header.
pub const fn records_available(file_len: u64) -> u64 {
    file_len.saturating_sub(HEADER_SIZE as u64) / POINT_STRIDE as u64
}

/// Encodes the header followed by every record, in order.
pub fn write_points<W: Write + Seek>(writer: &mut W, points: &[PointRecord]) -> BinResult<()> {
    let point_count = u32::try_from(points.len())
        .ok()
        .filter(|count| *count <= MAX_POINT_COUNT)
        .ok_or_else(|| binrw::Error::AssertFail {
            pos: 0,
            message: format!(
                "{} points exceed the limit of {}",
                points.len(),
                MAX_POINT_COUNT
            ),
        })?;

    FileHeader { point_count }.write(writer)?;
    for point in points {
        point.write(writer)?;
    }

    Ok(())
}

pub fn encode_points(points: &[PointRecord]) -> BinResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE + points.len() * POINT_STRIDE));
    write_points(&mut cursor, points)?;
    Ok(cursor.into_inner())
}

pub fn save_points(path: impl AsRef<Path>, points: &[PointRecord]) -> BinResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_points(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}
