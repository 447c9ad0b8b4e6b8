// convert.rs -- Geometry conversion between host float space and disk space
//
// The codecs in md2.rs/md3.rs/mdl.rs move structs to and from bytes; this
// module moves geometry between the caller's representation (float
// positions, unit normals, normalized bottom-left-origin UVs, faces as
// index lists) and each format's quantized disk representation.
//
// Shared conventions, applied symmetrically on import and export:
//
//   winding   disk triangles are wound opposite to host faces, so every
//             index triple (and its UVs) is reversed when crossing the
//             boundary. On import, if the reversed triple would end in
//             vertex 0, it is rotated so 0 lands in the first slot.
//   UV space  disk images hang top-down, host images bottom-up:
//             t_host = 1 - t_disk.
//   faces     only triangles cross the boundary. Quads are never split
//             automatically (the diagonal choice is not canonical);
//             check_faces rejects them before any output exists.

use std::collections::HashMap;

use qfmd_common::anorms::{compress_normal, decode_lat_lng, decompress_normal, encode_lat_lng};
use qfmd_common::error::{FormatError, ValidationError};
use qfmd_common::qfiles::{DTriVertx, BYTE_VERTEX_RANGE, MD3_XYZ_SCALE};

use crate::md2::{Md2, Md2Frame, Md2StVert, Md2Triangle};
use crate::md3::{Md3Frame, Md3Surface, Md3TexCoord, Md3Triangle, Md3Vertex};
use crate::mdl::{Mdl, MdlSimpleFrame, MdlStVert};

// ============================================================
// Face validation and winding
// ============================================================

/// Every face that crosses the export boundary must be a triangle. Returns
/// the indices of all offending faces at once so the caller can report them
/// in one diagnostic.
pub fn check_faces(faces: &[Vec<usize>]) -> Result<(), ValidationError> {
    let bad: Vec<usize> = faces
        .iter()
        .enumerate()
        .filter(|(_, f)| f.len() != 3)
        .map(|(i, _)| i)
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::NonTriangularFaces { faces: bad })
    }
}

/// Disk triple -> host triple: reverse the winding, then keep vertex 0 out
/// of the last slot by rotating it to the front.
fn import_triple(triple: [usize; 3]) -> [usize; 3] {
    let rev = [triple[2], triple[1], triple[0]];
    if rev[2] == 0 {
        [rev[2], rev[0], rev[1]]
    } else {
        rev
    }
}

// ============================================================
// Byte quantization (MD2 frames, MDL frames)
// ============================================================

/// Componentwise min/max over a position list.
pub fn bounds(positions: &[[f32; 3]]) -> ([f32; 3], [f32; 3]) {
    let mut mins = [0.0f32; 3];
    let mut maxs = [0.0f32; 3];
    if let Some(first) = positions.first() {
        mins = *first;
        maxs = *first;
    }
    for p in positions {
        for i in 0..3 {
            mins[i] = mins[i].min(p[i]);
            maxs[i] = maxs[i].max(p[i]);
        }
    }
    (mins, maxs)
}

/// Quantize one position into the byte lattice of a scale/translate pair.
/// Values outside the lattice wrap modulo 256 instead of clamping; existing
/// assets depend on that wraparound, so it is load-bearing behavior.
pub fn quantize_vertex(
    p: &[f32; 3],
    scale: &[f32; 3],
    translate: &[f32; 3],
    normal: &[f32; 3],
) -> DTriVertx {
    let mut v = [0u8; 3];
    for i in 0..3 {
        if scale[i] != 0.0 {
            v[i] = (((p[i] - translate[i]) / scale[i]) as i32 & 255) as u8;
        }
    }
    DTriVertx {
        v,
        lightnormalindex: compress_normal(normal),
    }
}

pub fn dequantize_vertex(tv: &DTriVertx, scale: &[f32; 3], translate: &[f32; 3]) -> [f32; 3] {
    [
        tv.v[0] as f32 * scale[0] + translate[0],
        tv.v[1] as f32 * scale[1] + translate[1],
        tv.v[2] as f32 * scale[2] + translate[2],
    ]
}

// ============================================================
// MD2
// ============================================================

/// Build the disk triangle list and the welded UV table for an MD2 export.
/// UVs that are bit-identical across faces share one table slot; triangles
/// are emitted with reversed winding. The returned UVs are still normalized
/// host-space values, to be run through convert_stverts.
pub fn build_md2_tris(
    faces: &[Vec<usize>],
    face_uvs: &[Vec<[f32; 2]>],
) -> Result<(Vec<Md2Triangle>, Vec<[f32; 2]>), ValidationError> {
    check_faces(faces)?;

    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut slots: HashMap<[u32; 2], usize> = HashMap::new();
    let mut tris = Vec::with_capacity(faces.len());

    for (face, fuv) in faces.iter().zip(face_uvs) {
        let mut tri = Md2Triangle {
            index_xyz: [0; 3],
            index_st: [0; 3],
        };
        for i in 0..3 {
            // reverse the winding for disk order
            let src = 2 - i;
            tri.index_xyz[i] = face[src] as i16;
            let uv = fuv[src];
            let key = [uv[0].to_bits(), uv[1].to_bits()];
            let slot = *slots.entry(key).or_insert_with(|| {
                uvs.push(uv);
                uvs.len() - 1
            });
            tri.index_st[i] = slot as i16;
        }
        tris.push(tri);
    }
    Ok((tris, uvs))
}

/// Normalized host UVs -> integer texel coordinates. The vertical flip
/// happens here; out-of-range texels wrap back into the skin.
pub fn convert_stverts(uvs: &[[f32; 2]], skinwidth: i32, skinheight: i32) -> Vec<Md2StVert> {
    uvs.iter()
        .map(|uv| {
            let mut s = (uv[0] * (skinwidth - 1) as f32) as i32;
            let mut t = ((1.0 - uv[1]) * (skinheight - 1) as f32) as i32;
            if skinwidth > 0 {
                s = s.rem_euclid(skinwidth);
            }
            if skinheight > 0 {
                t = t.rem_euclid(skinheight);
            }
            Md2StVert {
                s: s as i16,
                t: t as i16,
            }
        })
        .collect()
}

/// Build one MD2 frame from float positions and unit normals. The frame's
/// quantization transform is derived from its own bounding box, so it must
/// be rebuilt whenever the positions change.
pub fn make_md2_frame(name: &str, positions: &[[f32; 3]], normals: &[[f32; 3]]) -> Md2Frame {
    let (mins, maxs) = bounds(positions);
    let mut scale = [0.0f32; 3];
    for i in 0..3 {
        scale[i] = (maxs[i] - mins[i]) / BYTE_VERTEX_RANGE;
    }
    let verts = positions
        .iter()
        .zip(normals)
        .map(|(p, n)| quantize_vertex(p, &scale, &mins, n))
        .collect();
    Md2Frame {
        name: name.to_string(),
        scale,
        translate: mins,
        verts,
    }
}

pub fn md2_frame_positions(frame: &Md2Frame) -> Vec<[f32; 3]> {
    frame
        .verts
        .iter()
        .map(|tv| dequantize_vertex(tv, &frame.scale, &frame.translate))
        .collect()
}

pub fn md2_frame_normals(frame: &Md2Frame) -> Result<Vec<[f32; 3]>, FormatError> {
    frame
        .verts
        .iter()
        .map(|tv| decompress_normal(tv.lightnormalindex as usize))
        .collect()
}

/// Host-side faces of an imported MD2: winding restored, vertex 0 rotated
/// out of the last slot, UVs looked up and flipped back to host space.
pub fn md2_faces(mdl: &Md2) -> Vec<([usize; 3], [[f32; 2]; 3])> {
    let sw = (mdl.skinwidth - 1).max(1) as f32;
    let sh = (mdl.skinheight - 1).max(1) as f32;
    mdl.tris
        .iter()
        .map(|tri| {
            let rev_v = [
                tri.index_xyz[2] as usize,
                tri.index_xyz[1] as usize,
                tri.index_xyz[0] as usize,
            ];
            let rev_st = [
                tri.index_st[2] as usize,
                tri.index_st[1] as usize,
                tri.index_st[0] as usize,
            ];
            // the zero check looks at the vertex triple only; the UV triple
            // rotates in lockstep to keep corners paired
            let (verts, st) = if rev_v[2] == 0 {
                (
                    [rev_v[2], rev_v[0], rev_v[1]],
                    [rev_st[2], rev_st[0], rev_st[1]],
                )
            } else {
                (rev_v, rev_st)
            };
            let mut uvs = [[0.0f32; 2]; 3];
            for (uv, &slot) in uvs.iter_mut().zip(st.iter()) {
                let stv = &mdl.stverts[slot];
                *uv = [stv.s as f32 / sw, 1.0 - stv.t as f32 / sh];
            }
            (verts, uvs)
        })
        .collect()
}

// ============================================================
// MD3
// ============================================================

/// Welded geometry of one surface, ready for Md3Surface assembly.
#[derive(Debug)]
pub struct WeldedSurface {
    pub triangles: Vec<Md3Triangle>,
    /// Disk-space texcoords, one per welded vertex (t already flipped).
    pub texcoords: Vec<Md3TexCoord>,
    /// Welded slot -> host vertex index, for pulling per-frame positions
    /// and normals out of the host arrays.
    pub vertmap: Vec<usize>,
}

/// Triangulate-checked welding for MD3 export. A disk vertex is one
/// (host vertex, UV) pair; face corners sharing both collapse into one
/// slot, keyed by the exact UV bits.
pub fn weld_surface(
    faces: &[Vec<usize>],
    face_uvs: &[Vec<[f32; 2]>],
) -> Result<WeldedSurface, ValidationError> {
    check_faces(faces)?;

    let mut slots: HashMap<(usize, [u32; 2]), usize> = HashMap::new();
    let mut texcoords = Vec::new();
    let mut vertmap = Vec::new();
    let mut triangles = Vec::with_capacity(faces.len());

    for (face, fuv) in faces.iter().zip(face_uvs) {
        let mut tri = Md3Triangle { indexes: [0; 3] };
        for i in 0..3 {
            // reverse the winding for disk order
            let src = 2 - i;
            let vert = face[src];
            let uv = fuv[src];
            let key = (vert, [uv[0].to_bits(), uv[1].to_bits()]);
            let slot = *slots.entry(key).or_insert_with(|| {
                texcoords.push(Md3TexCoord {
                    s: uv[0],
                    t: 1.0 - uv[1],
                });
                vertmap.push(vert);
                vertmap.len() - 1
            });
            tri.indexes[i] = slot as i32;
        }
        triangles.push(tri);
    }
    Ok(WeldedSurface {
        triangles,
        texcoords,
        vertmap,
    })
}

/// Quantize one frame of a welded surface into the 1/64 fixed-point
/// lattice. A coordinate that leaves the int16 range is refused rather than
/// wrapped.
pub fn md3_frame_verts(
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    vertmap: &[usize],
) -> Result<Vec<Md3Vertex>, ValidationError> {
    let mut verts = Vec::with_capacity(vertmap.len());
    for &host in vertmap {
        let p = positions[host];
        let mut xyz = [0i16; 3];
        for i in 0..3 {
            let fixed = (p[i] * MD3_XYZ_SCALE).round();
            if fixed < i16::MIN as f32 || fixed > i16::MAX as f32 {
                return Err(ValidationError::CoordinateOverflow { value: p[i] });
            }
            xyz[i] = fixed as i16;
        }
        verts.push(Md3Vertex {
            xyz,
            normal: encode_lat_lng(&normals[host]),
        });
    }
    Ok(verts)
}

/// Frame bounding metadata from the union of all surface positions for one
/// frame.
pub fn make_md3_frame(name: &str, positions: &[[f32; 3]]) -> Md3Frame {
    let (mins, maxs) = bounds(positions);
    let mut radius_sq = 0.0f32;
    for i in 0..3 {
        radius_sq += mins[i].abs().max(maxs[i].abs()).powi(2);
    }
    Md3Frame {
        mins,
        maxs,
        local_origin: [0.0; 3],
        radius: radius_sq.sqrt(),
        name: name.to_string(),
    }
}

pub fn md3_surface_positions(surface: &Md3Surface, frame: usize) -> Vec<[f32; 3]> {
    surface
        .frame_verts(frame)
        .iter()
        .map(|v| {
            [
                v.xyz[0] as f32 / MD3_XYZ_SCALE,
                v.xyz[1] as f32 / MD3_XYZ_SCALE,
                v.xyz[2] as f32 / MD3_XYZ_SCALE,
            ]
        })
        .collect()
}

pub fn md3_surface_normals(surface: &Md3Surface, frame: usize) -> Vec<[f32; 3]> {
    surface
        .frame_verts(frame)
        .iter()
        .map(|v| decode_lat_lng(v.normal))
        .collect()
}

/// Per-welded-vertex UVs in host space (t flipped back).
pub fn md3_surface_uvs(surface: &Md3Surface) -> Vec<[f32; 2]> {
    surface
        .texcoords
        .iter()
        .map(|tc| [tc.s, 1.0 - tc.t])
        .collect()
}

/// Host-side faces of an imported MD3 surface.
pub fn md3_faces(surface: &Md3Surface) -> Vec<[usize; 3]> {
    surface
        .triangles
        .iter()
        .map(|tri| {
            import_triple([
                tri.indexes[0] as usize,
                tri.indexes[1] as usize,
                tri.indexes[2] as usize,
            ])
        })
        .collect()
}

// ============================================================
// MDL
// ============================================================

/// Model-global quantization transform over every frame of an MDL export.
/// Returns (scale, origin); all frames share them, unlike MD2's per-frame
/// pairs.
pub fn calc_mdl_bounds(frames: &[Vec<[f32; 3]>]) -> ([f32; 3], [f32; 3]) {
    let mut mins = [f32::MAX; 3];
    let mut maxs = [f32::MIN; 3];
    let mut any = false;
    for frame in frames {
        for p in frame {
            any = true;
            for i in 0..3 {
                mins[i] = mins[i].min(p[i]);
                maxs[i] = maxs[i].max(p[i]);
            }
        }
    }
    if !any {
        return ([0.0; 3], [0.0; 3]);
    }
    let mut scale = [0.0f32; 3];
    for i in 0..3 {
        scale[i] = (maxs[i] - mins[i]) / BYTE_VERTEX_RANGE;
    }
    (scale, mins)
}

/// Quantize one MDL frame with the model-global transform; the frame's
/// bbox is the componentwise min/max of its quantized vertices.
pub fn make_mdl_frame(
    name: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    scale: &[f32; 3],
    origin: &[f32; 3],
) -> MdlSimpleFrame {
    let verts: Vec<DTriVertx> = positions
        .iter()
        .zip(normals)
        .map(|(p, n)| quantize_vertex(p, scale, origin, n))
        .collect();

    let mut bboxmin = DTriVertx {
        v: [255; 3],
        lightnormalindex: 0,
    };
    let mut bboxmax = DTriVertx {
        v: [0; 3],
        lightnormalindex: 0,
    };
    if verts.is_empty() {
        bboxmin.v = [0; 3];
    }
    for tv in &verts {
        for i in 0..3 {
            bboxmin.v[i] = bboxmin.v[i].min(tv.v[i]);
            bboxmax.v[i] = bboxmax.v[i].max(tv.v[i]);
        }
    }
    MdlSimpleFrame {
        bboxmin,
        bboxmax,
        name: name.to_string(),
        verts,
    }
}

pub fn mdl_frame_positions(
    frame: &MdlSimpleFrame,
    scale: &[f32; 3],
    origin: &[f32; 3],
) -> Vec<[f32; 3]> {
    frame
        .verts
        .iter()
        .map(|tv| dequantize_vertex(tv, scale, origin))
        .collect()
}

/// Per-vertex MDL texcoords from normalized host UVs. Seam handling is the
/// caller's concern; exported vertices carry onseam = 0.
pub fn build_mdl_stverts(uvs: &[[f32; 2]], skinwidth: i32, skinheight: i32) -> Vec<MdlStVert> {
    convert_stverts(uvs, skinwidth, skinheight)
        .iter()
        .map(|st| MdlStVert {
            onseam: 0,
            s: st.s as i32,
            t: st.t as i32,
        })
        .collect()
}

/// Per-vertex host UVs of an imported MDL.
pub fn mdl_uvs(mdl: &Mdl) -> Vec<[f32; 2]> {
    let sw = (mdl.skinwidth - 1).max(1) as f32;
    let sh = (mdl.skinheight - 1).max(1) as f32;
    mdl.stverts
        .iter()
        .map(|st| [st.s as f32 / sw, 1.0 - st.t as f32 / sh])
        .collect()
}

/// Host-side faces of an imported MDL.
pub fn mdl_faces(mdl: &Mdl) -> Vec<[usize; 3]> {
    mdl.tris
        .iter()
        .map(|tri| {
            import_triple([
                tri.vertindex[0] as usize,
                tri.vertindex[1] as usize,
                tri.vertindex[2] as usize,
            ])
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
