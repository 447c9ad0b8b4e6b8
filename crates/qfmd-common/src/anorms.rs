// anorms.rs -- Precomputed vertex-normal table and normal codecs
//
// MDL and MD2 store one byte per vertex normal: an index into the fixed
// 162-entry unit-vector table below. The table is a shared asset across the
// whole Quake tool family and must stay byte-identical to the reference
// values, or round-tripped models shade differently in other tools.
//
// MD3 packs normals into 16 bits instead: 8-bit latitude and 8-bit
// longitude on a 256x256 spherical grid, quantized with the reference
// tools' 255/(2*pi) factor. Decode and encode are closed-form rather than a
// 64K-entry table.

use std::f32::consts::PI;

use crate::error::FormatError;

pub const NUMVERTEXNORMALS: usize = 162;

#[rustfmt::skip]
pub static BYTEDIRS: [[f32; 3]; NUMVERTEXNORMALS] = [
    [-0.525731,  0.000000,  0.850651], [-0.442863,  0.238856,  0.864188],
    [-0.295242,  0.000000,  0.955423], [-0.309017,  0.500000,  0.809017],
    [-0.162460,  0.262866,  0.951056], [ 0.000000,  0.000000,  1.000000],
    [ 0.000000,  0.850651,  0.525731], [-0.147621,  0.716567,  0.681718],
    [ 0.147621,  0.716567,  0.681718], [ 0.000000,  0.525731,  0.850651],
    [ 0.309017,  0.500000,  0.809017], [ 0.525731,  0.000000,  0.850651],
    [ 0.295242,  0.000000,  0.955423], [ 0.442863,  0.238856,  0.864188],
    [ 0.162460,  0.262866,  0.951056], [-0.681718,  0.147621,  0.716567],
    [-0.809017,  0.309017,  0.500000], [-0.587785,  0.425325,  0.688191],
    [-0.850651,  0.525731,  0.000000], [-0.864188,  0.442863,  0.238856],
    [-0.716567,  0.681718,  0.147621], [-0.688191,  0.587785,  0.425325],
    [-0.500000,  0.809017,  0.309017], [-0.238856,  0.864188,  0.442863],
    [-0.425325,  0.688191,  0.587785], [-0.716567,  0.681718, -0.147621],
    [-0.500000,  0.809017, -0.309017], [-0.525731,  0.850651,  0.000000],
    [ 0.000000,  0.850651, -0.525731], [-0.238856,  0.864188, -0.442863],
    [ 0.000000,  0.955423, -0.295242], [-0.262866,  0.951056, -0.162460],
    [ 0.000000,  1.000000,  0.000000], [ 0.000000,  0.955423,  0.295242],
    [-0.262866,  0.951056,  0.162460], [ 0.238856,  0.864188,  0.442863],
    [ 0.262866,  0.951056,  0.162460], [ 0.500000,  0.809017,  0.309017],
    [ 0.238856,  0.864188, -0.442863], [ 0.262866,  0.951056, -0.162460],
    [ 0.500000,  0.809017, -0.309017], [ 0.850651,  0.525731,  0.000000],
    [ 0.716567,  0.681718,  0.147621], [ 0.716567,  0.681718, -0.147621],
    [ 0.525731,  0.850651,  0.000000], [ 0.425325,  0.688191,  0.587785],
    [ 0.864188,  0.442863,  0.238856], [ 0.688191,  0.587785,  0.425325],
    [ 0.809017,  0.309017,  0.500000], [ 0.681718,  0.147621,  0.716567],
    [ 0.587785,  0.425325,  0.688191], [ 0.955423,  0.295242,  0.000000],
    [ 1.000000,  0.000000,  0.000000], [ 0.951056,  0.162460,  0.262866],
    [ 0.850651, -0.525731,  0.000000], [ 0.955423, -0.295242,  0.000000],
    [ 0.864188, -0.442863,  0.238856], [ 0.951056, -0.162460,  0.262866],
    [ 0.809017, -0.309017,  0.500000], [ 0.681718, -0.147621,  0.716567],
    [ 0.850651,  0.000000,  0.525731], [ 0.864188,  0.442863, -0.238856],
    [ 0.809017,  0.309017, -0.500000], [ 0.951056,  0.162460, -0.262866],
    [ 0.525731,  0.000000, -0.850651], [ 0.681718,  0.147621, -0.716567],
    [ 0.681718, -0.147621, -0.716567], [ 0.850651,  0.000000, -0.525731],
    [ 0.809017, -0.309017, -0.500000], [ 0.864188, -0.442863, -0.238856],
    [ 0.951056, -0.162460, -0.262866], [ 0.147621,  0.716567, -0.681718],
    [ 0.309017,  0.500000, -0.809017], [ 0.425325,  0.688191, -0.587785],
    [ 0.442863,  0.238856, -0.864188], [ 0.587785,  0.425325, -0.688191],
    [ 0.688191,  0.587785, -0.425325], [-0.147621,  0.716567, -0.681718],
    [-0.309017,  0.500000, -0.809017], [ 0.000000,  0.525731, -0.850651],
    [-0.525731,  0.000000, -0.850651], [-0.442863,  0.238856, -0.864188],
    [-0.295242,  0.000000, -0.955423], [-0.162460,  0.262866, -0.951056],
    [ 0.000000,  0.000000, -1.000000], [ 0.295242,  0.000000, -0.955423],
    [ 0.162460,  0.262866, -0.951056], [-0.442863, -0.238856, -0.864188],
    [-0.309017, -0.500000, -0.809017], [-0.162460, -0.262866, -0.951056],
    [ 0.000000, -0.850651, -0.525731], [-0.147621, -0.716567, -0.681718],
    [ 0.147621, -0.716567, -0.681718], [ 0.000000, -0.525731, -0.850651],
    [ 0.309017, -0.500000, -0.809017], [ 0.442863, -0.238856, -0.864188],
    [ 0.162460, -0.262866, -0.951056], [ 0.238856, -0.864188, -0.442863],
    [ 0.500000, -0.809017, -0.309017], [ 0.425325, -0.688191, -0.587785],
    [ 0.716567, -0.681718, -0.147621], [ 0.688191, -0.587785, -0.425325],
    [ 0.587785, -0.425325, -0.688191], [ 0.000000, -0.955423, -0.295242],
    [ 0.000000, -1.000000,  0.000000], [ 0.262866, -0.951056, -0.162460],
    [ 0.000000, -0.850651,  0.525731], [ 0.000000, -0.955423,  0.295242],
    [ 0.238856, -0.864188,  0.442863], [ 0.262866, -0.951056,  0.162460],
    [ 0.500000, -0.809017,  0.309017], [ 0.716567, -0.681718,  0.147621],
    [ 0.525731, -0.850651,  0.000000], [-0.238856, -0.864188, -0.442863],
    [-0.500000, -0.809017, -0.309017], [-0.262866, -0.951056, -0.162460],
    [-0.850651, -0.525731,  0.000000], [-0.716567, -0.681718, -0.147621],
    [-0.716567, -0.681718,  0.147621], [-0.525731, -0.850651,  0.000000],
    [-0.500000, -0.809017,  0.309017], [-0.238856, -0.864188,  0.442863],
    [-0.262866, -0.951056,  0.162460], [-0.864188, -0.442863,  0.238856],
    [-0.809017, -0.309017,  0.500000], [-0.688191, -0.587785,  0.425325],
    [-0.681718, -0.147621,  0.716567], [-0.442863, -0.238856,  0.864188],
    [-0.587785, -0.425325,  0.688191], [-0.309017, -0.500000,  0.809017],
    [-0.147621, -0.716567,  0.681718], [-0.425325, -0.688191,  0.587785],
    [-0.162460, -0.262866,  0.951056], [ 0.442863, -0.238856,  0.864188],
    [ 0.162460, -0.262866,  0.951056], [ 0.309017, -0.500000,  0.809017],
    [ 0.147621, -0.716567,  0.681718], [ 0.000000, -0.525731,  0.850651],
    [ 0.425325, -0.688191,  0.587785], [ 0.587785, -0.425325,  0.688191],
    [ 0.688191, -0.587785,  0.425325], [-0.955423,  0.295242,  0.000000],
    [-0.951056,  0.162460,  0.262866], [-1.000000,  0.000000,  0.000000],
    [-0.850651,  0.000000,  0.525731], [-0.955423, -0.295242,  0.000000],
    [-0.951056, -0.162460,  0.262866], [-0.864188,  0.442863, -0.238856],
    [-0.951056,  0.162460, -0.262866], [-0.809017,  0.309017, -0.500000],
    [-0.864188, -0.442863, -0.238856], [-0.951056, -0.162460, -0.262866],
    [-0.809017, -0.309017, -0.500000], [-0.681718,  0.147621, -0.716567],
    [-0.681718, -0.147621, -0.716567], [-0.850651,  0.000000, -0.525731],
    [-0.688191,  0.587785, -0.425325], [-0.587785,  0.425325, -0.688191],
    [-0.425325,  0.688191, -0.587785], [-0.425325, -0.688191, -0.587785],
    [-0.587785, -0.425325, -0.688191], [-0.688191, -0.587785, -0.425325],
];

/// Compress a unit vector to a table index: exhaustive best-dot-product
/// search. Ties keep the lowest index, so the result is deterministic.
pub fn compress_normal(dir: &[f32; 3]) -> u8 {
    let mut best = 0;
    let mut bestd: f32 = 0.0;

    for (i, bd) in BYTEDIRS.iter().enumerate() {
        let d = dir[0] * bd[0] + dir[1] * bd[1] + dir[2] * bd[2];
        if d > bestd {
            bestd = d;
            best = i;
        }
    }

    best as u8
}

/// Look up a compressed normal. Indices past the table are a format error
/// in whatever file they came from.
pub fn decompress_normal(index: usize) -> Result<[f32; 3], FormatError> {
    if index >= NUMVERTEXNORMALS {
        return Err(FormatError::BadNormalIndex { index });
    }
    Ok(BYTEDIRS[index])
}

// ============================================================
// MD3 latitude/longitude packing
// ============================================================

/// Pack a unit vector into the MD3 16-bit lat/long form: high byte
/// latitude, low byte longitude, both in 2*pi/255 steps (truncated toward
/// zero, as the id tools do). The poles are singular for atan2 and get
/// their conventional encodings: +Z -> 0x0000, -Z -> 0x0080.
pub fn encode_lat_lng(dir: &[f32; 3]) -> u16 {
    if dir[0] == 0.0 && dir[1] == 0.0 {
        return if dir[2] > 0.0 { 0x0000 } else { 0x0080 };
    }

    let lat = (dir[1].atan2(dir[0]) * (255.0 / (2.0 * PI))) as i32 & 0xff;
    let lng = (dir[2].clamp(-1.0, 1.0).acos() * (255.0 / (2.0 * PI))) as i32 & 0xff;
    ((lat << 8) | lng) as u16
}

/// Unpack an MD3 lat/long normal back to a unit vector.
pub fn decode_lat_lng(packed: u16) -> [f32; 3] {
    let lat = ((packed >> 8) & 0xff) as f32 * (2.0 * PI / 255.0);
    let lng = (packed & 0xff) as f32 * (2.0 * PI / 255.0);
    [
        lat.cos() * lng.sin(),
        lat.sin() * lng.sin(),
        lng.cos(),
    ]
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32; 3], b: &[f32; 3]) -> f32 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    #[test]
    fn table_entries_are_unit_length() {
        for (i, n) in BYTEDIRS.iter().enumerate() {
            let len = dot(n, n).sqrt();
            assert!(
                (len - 1.0).abs() < 1e-5,
                "entry {} has length {}",
                i,
                len
            );
        }
    }

    #[test]
    fn compress_is_identity_on_table_entries() {
        // Every table entry must be its own nearest neighbour, so a decode
        // followed by an encode reproduces the index (and the decode of
        // that index reproduces the entry bit-for-bit).
        for i in 0..NUMVERTEXNORMALS {
            let dir = decompress_normal(i).unwrap();
            assert_eq!(compress_normal(&dir) as usize, i, "entry {}", i);
            assert_eq!(decompress_normal(compress_normal(&dir) as usize).unwrap(), dir);
        }
    }

    #[test]
    fn compress_picks_nearest_for_perturbed_input() {
        let up = [0.05f32, -0.03, 0.99];
        let idx = compress_normal(&up) as usize;
        // nearest table entry to almost-straight-up is (0, 0, 1)
        assert_eq!(BYTEDIRS[idx], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn decompress_rejects_out_of_range_index() {
        assert!(decompress_normal(NUMVERTEXNORMALS - 1).is_ok());
        assert!(matches!(
            decompress_normal(NUMVERTEXNORMALS),
            Err(FormatError::BadNormalIndex { index: 162 })
        ));
    }

    #[test]
    fn lat_lng_poles() {
        assert_eq!(encode_lat_lng(&[0.0, 0.0, 1.0]), 0x0000);
        assert_eq!(encode_lat_lng(&[0.0, 0.0, -1.0]), 0x0080);
        assert_eq!(decode_lat_lng(0x0000), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn lat_lng_round_trip_is_close() {
        let dirs: [[f32; 3]; 5] = [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [-1.0, 0.0, 0.0],
            [0.577350, 0.577350, 0.577350],
            [-0.267261, 0.534522, -0.801784],
        ];
        for dir in &dirs {
            let out = decode_lat_lng(encode_lat_lng(dir));
            // one grid step is ~1.4 degrees; allow two
            assert!(dot(dir, &out) > 0.995, "{:?} -> {:?}", dir, out);
        }
    }
}
