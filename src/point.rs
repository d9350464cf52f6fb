use binrw::binrw;
use bytemuck::{Pod, Zeroable};
use glam::{U8Vec4, Vec3};
use std::mem::{align_of, offset_of, size_of};

/// One sample of a point cloud: a world-space position and a packed color.
///
/// The in-memory layout is the wire layout: three little-endian `f32` followed by one
/// little-endian `u32`, 16 bytes, no padding.
#[binrw]
#[brw(little)]
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Red in the lowest byte, alpha in the highest.
    pub rgba: u32,
}

const _: () = {
    assert!(size_of::<PointRecord>() == 16);
    assert!(align_of::<PointRecord>() == 4);
    assert!(offset_of!(PointRecord, x) == 0);
    assert!(offset_of!(PointRecord, y) == 4);
    assert!(offset_of!(PointRecord, z) == 8);
    assert!(offset_of!(PointRecord, rgba) == 12);
};

impl PointRecord {
    pub const fn new(x: f32, y: f32, z: f32, rgba: u32) -> Self {
        Self { x, y, z, rgba }
    }

    pub fn from_position(position: Vec3, rgba: u32) -> Self {
        Self::new(position.x, position.y, position.z, rgba)
    }

    pub fn from_rgba8(position: Vec3, [r, g, b, a]: [u8; 4]) -> Self {
        Self::from_position(position, pack_rgba(r, g, b, a))
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn color(&self) -> U8Vec4 {
        U8Vec4::from_array(unpack_rgba(self.rgba))
    }
}

#[inline]
pub const fn pack_rgba(r: u8, g: u8, b: u8, a: u8) -> u32 {
    u32::from_le_bytes([r, g, b, a])
}

#[inline]
pub const fn unpack_rgba(rgba: u32) -> [u8; 4] {
    rgba.to_le_bytes()
}
