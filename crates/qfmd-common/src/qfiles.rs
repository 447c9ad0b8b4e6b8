// qfiles.rs -- On-disk constants and packed records for Quake model formats
//
// Sizes here are the wire layout, not Rust struct sizes: everything
// multi-byte goes through the SizeBuf little-endian codec field by field.
// The one exception is DTriVertx, which is all 8-bit and therefore safe to
// blit straight out of the file image with bytemuck.

use bytemuck::{Pod, Zeroable};

/// Fixed width of every path/name field (skins, shaders, tags, model name).
pub const MAX_QPATH: usize = 64;
/// Fixed width of a frame name field.
pub const MAX_FRAMENAME: usize = 16;

// ============================================================
// MDL (Quake alias models)
// ============================================================

/// MDL magic: "IDPO" in little-endian
pub const IDPOLYHEADER: i32 = (b'O' as i32) << 24 | (b'P' as i32) << 16 | (b'D' as i32) << 8 | b'I' as i32;
pub const MDL_ALIAS_VERSION: i32 = 6;

/// MDL header: magic, version, scale/origin/radius/eye, seven counts,
/// flags, size. 84 bytes, no offset table -- sections are strictly
/// sequential.
pub const MDL_HEADER_SIZE: usize = 84;

// ============================================================
// MD2 (Quake 2 alias models)
// ============================================================

/// MD2 magic: "IDP2" in little-endian
pub const IDALIASHEADER: i32 = (b'2' as i32) << 24 | (b'P' as i32) << 16 | (b'D' as i32) << 8 | b'I' as i32;
pub const ALIAS_VERSION: i32 = 8;

/// 17 x i32
pub const MD2_HEADER_SIZE: usize = 68;
/// i16 s + i16 t
pub const MD2_ST_SIZE: usize = 4;
/// 3 x i16 vertex indices + 3 x i16 st indices
pub const MD2_TRIANGLE_SIZE: usize = 12;
/// scale(12) + translate(12) + name(16), before the packed verts
pub const MD2_FRAME_HEADER_SIZE: usize = 40;

/// Quantization range of a packed byte coordinate (MDL and MD2).
pub const BYTE_VERTEX_RANGE: f32 = 255.0;

/// A packed per-frame vertex: byte-quantized position plus an index into
/// the 162-entry normal table. MDL and MD2 share this record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DTriVertx {
    pub v: [u8; 3],
    pub lightnormalindex: u8,
}

pub const DTRIVERTX_SIZE: usize = 4;

// ============================================================
// MD3 (Quake 3 models)
// ============================================================

/// MD3 magic: "IDP3" in little-endian, used by both the file header and
/// every surface sub-header
pub const IDMD3HEADER: i32 = (b'3' as i32) << 24 | (b'P' as i32) << 16 | (b'D' as i32) << 8 | b'I' as i32;
pub const MD3_VERSION: i32 = 15;

/// ident + version + name + flags + 4 counts + 4 offsets
pub const MD3_HEADER_SIZE: usize = 108;
/// min(12) + max(12) + origin(12) + radius(4) + name(16)
pub const MD3_FRAME_SIZE: usize = 56;
/// name(64) + origin(12) + axis(36)
pub const MD3_TAG_SIZE: usize = 112;
/// name(64) + shader index(4)
pub const MD3_SHADER_SIZE: usize = 68;
/// 3 x i32 vertex indices
pub const MD3_TRIANGLE_SIZE: usize = 12;
/// f32 s + f32 t
pub const MD3_TEXCOORD_SIZE: usize = 8;
/// 3 x i16 position + u16 packed normal
pub const MD3_VERTEX_SIZE: usize = 8;
/// surface sub-header: ident + name + flags + 4 counts + 5 offsets
pub const MD3_SURFACE_BASE_SIZE: usize = 108;

/// Fixed-point factor for MD3 vertex coordinates: world = short / 64.
pub const MD3_XYZ_SCALE: f32 = 64.0;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    // =========================================================================
    // Magic number constants
    // =========================================================================

    #[test]
    fn mdl_magic() {
        let bytes = IDPOLYHEADER.to_le_bytes();
        assert_eq!(&bytes, b"IDPO");
    }

    #[test]
    fn md2_magic() {
        let bytes = IDALIASHEADER.to_le_bytes();
        assert_eq!(&bytes, b"IDP2");
    }

    #[test]
    fn md3_magic() {
        let bytes = IDMD3HEADER.to_le_bytes();
        assert_eq!(&bytes, b"IDP3");
    }

    #[test]
    fn format_versions() {
        assert_eq!(MDL_ALIAS_VERSION, 6);
        assert_eq!(ALIAS_VERSION, 8);
        assert_eq!(MD3_VERSION, 15);
    }

    // =========================================================================
    // Wire-size arithmetic
    // =========================================================================

    #[test]
    fn size_of_dtrivertx() {
        // v(3) + lightnormalindex(1) = 4
        assert_eq!(size_of::<DTriVertx>(), DTRIVERTX_SIZE);
    }

    #[test]
    fn mdl_header_size() {
        // ident(4) + version(4) + scale(12) + origin(12) + radius(4) +
        // eye(12) + 7 counts(28) + flags... counts include synctype; flags
        // and size close the header
        assert_eq!(MDL_HEADER_SIZE, 4 + 4 + 12 + 12 + 4 + 12 + 6 * 4 + 4 + 4 + 4);
    }

    #[test]
    fn md2_header_size() {
        // ident + version + skinwidth + skinheight + framesize +
        // 6 counts + 6 offsets = 17 x i32
        assert_eq!(MD2_HEADER_SIZE, 17 * 4);
    }

    #[test]
    fn md3_record_sizes() {
        assert_eq!(MD3_HEADER_SIZE, 4 + 4 + MAX_QPATH + 4 + 4 * 4 + 4 * 4);
        assert_eq!(MD3_FRAME_SIZE, 12 * 3 + 4 + MAX_FRAMENAME);
        assert_eq!(MD3_TAG_SIZE, MAX_QPATH + 4 * 3 + 4 * 9);
        assert_eq!(MD3_SHADER_SIZE, MAX_QPATH + 4);
        assert_eq!(MD3_SURFACE_BASE_SIZE, 4 + MAX_QPATH + 4 + 4 * 4 + 4 * 5);
    }
}
