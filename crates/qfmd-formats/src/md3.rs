// md3.rs -- MD3 (Quake 3 alias model) codec
//
// Unlike MD2, an MD3 file is a container: a list of frames and tags shared
// by the whole model, plus any number of surfaces. Each surface is its own
// self-describing block with a sub-magic, counts, and offsets relative to
// the surface start, holding triangles, shaders, texcoords, and the
// per-frame vertex lattice. Vertex positions are 1/64-unit fixed point,
// normals are packed latitude/longitude pairs.

use std::path::Path;

use tracing::debug;

use qfmd_common::error::{FormatError, ValidationError};
use qfmd_common::qfiles::{
    IDMD3HEADER, MAX_FRAMENAME, MAX_QPATH, MD3_FRAME_SIZE, MD3_HEADER_SIZE, MD3_SHADER_SIZE,
    MD3_SURFACE_BASE_SIZE, MD3_TAG_SIZE, MD3_TEXCOORD_SIZE, MD3_TRIANGLE_SIZE, MD3_VERSION,
    MD3_VERTEX_SIZE,
};
use qfmd_common::sizebuf::SizeBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct Md3Frame {
    pub mins: [f32; 3],
    pub maxs: [f32; 3],
    pub local_origin: [f32; 3],
    pub radius: f32,
    pub name: String,
}

impl Default for Md3Frame {
    fn default() -> Self {
        Self {
            mins: [0.0; 3],
            maxs: [0.0; 3],
            local_origin: [0.0; 3],
            radius: 0.0,
            name: String::new(),
        }
    }
}

/// Attachment point: an origin plus a 3x3 orientation, one instance per
/// frame. Tags with the same name across frames animate the attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct Md3Tag {
    pub name: String,
    pub origin: [f32; 3],
    pub axis: [[f32; 3]; 3],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Md3Shader {
    pub name: String,
    pub index: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Md3Triangle {
    pub indexes: [i32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Md3TexCoord {
    pub s: f32,
    pub t: f32,
}

/// Fixed-point position (1/64 unit) plus a packed lat/lng normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Md3Vertex {
    pub xyz: [i16; 3],
    pub normal: u16,
}

/// One mesh of the model. `verts` holds the vertex lattice for every frame
/// back to back: frame f's vertices are `verts[f*nv..(f+1)*nv]` where
/// `nv = texcoords.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Md3Surface {
    pub name: String,
    pub flags: i32,
    pub shaders: Vec<Md3Shader>,
    pub triangles: Vec<Md3Triangle>,
    pub texcoords: Vec<Md3TexCoord>,
    pub verts: Vec<Md3Vertex>,
}

impl Md3Surface {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Per-frame vertex count, derived from the texcoord table (one texcoord
    /// per lattice vertex).
    pub fn num_verts(&self) -> usize {
        self.texcoords.len()
    }

    /// The vertex lattice for one frame.
    pub fn frame_verts(&self, frame: usize) -> &[Md3Vertex] {
        let nv = self.num_verts();
        &self.verts[frame * nv..(frame + 1) * nv]
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Md3 {
    pub name: String,
    pub flags: i32,
    pub frames: Vec<Md3Frame>,
    pub tags: Vec<Md3Tag>,
    pub surfaces: Vec<Md3Surface>,
}

fn count(section: &'static str, v: i32) -> Result<usize, FormatError> {
    if v < 0 {
        return Err(FormatError::BadCount { section, count: v });
    }
    Ok(v as usize)
}

impl Md3 {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let mut sb = SizeBuf::from_file(path)?;
        let mdl = Self::read(&mut sb)?;
        debug!(
            name = %mdl.name,
            frames = mdl.frames.len(),
            tags = mdl.tags.len(),
            surfaces = mdl.surfaces.len(),
            "loaded md3"
        );
        Ok(mdl)
    }

    pub fn read(sb: &mut SizeBuf) -> Result<Self, FormatError> {
        let ident = sb.read_string(4)?;
        let version = sb.read_long()?;
        if ident.as_bytes() != IDMD3HEADER.to_le_bytes() || version != MD3_VERSION {
            return Err(FormatError::BadIdent { ident, version });
        }

        let name = sb.read_path(MAX_QPATH)?;
        let flags = sb.read_long()?;
        let num_frames = count("num_frames", sb.read_long()?)?;
        let num_tags = count("num_tags", sb.read_long()?)?;
        let num_surfaces = count("num_surfaces", sb.read_long()?)?;
        let _num_skins = sb.read_long()?;
        let ofs_frames = count("ofs_frames", sb.read_long()?)?;
        let ofs_tags = count("ofs_tags", sb.read_long()?)?;
        let ofs_surfaces = count("ofs_surfaces", sb.read_long()?)?;
        let _ofs_eof = sb.read_long()?;

        let mut frames = Vec::with_capacity(sb.reserve_hint(num_frames, MD3_FRAME_SIZE));
        sb.seek(ofs_frames)?;
        for _ in 0..num_frames {
            frames.push(Md3Frame {
                mins: sb.read_float3()?,
                maxs: sb.read_float3()?,
                local_origin: sb.read_float3()?,
                radius: sb.read_float()?,
                name: sb.read_path(MAX_FRAMENAME)?,
            });
        }

        // tags are stored frame-major: num_tags entries per frame
        let mut tags = Vec::with_capacity(sb.reserve_hint(num_tags * num_frames, MD3_TAG_SIZE));
        sb.seek(ofs_tags)?;
        for _ in 0..num_tags * num_frames {
            let name = sb.read_path(MAX_QPATH)?;
            let origin = sb.read_float3()?;
            let axis = [sb.read_float3()?, sb.read_float3()?, sb.read_float3()?];
            tags.push(Md3Tag { name, origin, axis });
        }

        // each surface block carries its own size; the next surface starts
        // at surface_start + ofs_end
        let mut surfaces = Vec::with_capacity(sb.reserve_hint(num_surfaces, MD3_SURFACE_BASE_SIZE));
        let mut surface_start = ofs_surfaces;
        for _ in 0..num_surfaces {
            let (surface, ofs_end) = Self::read_surface(sb, surface_start, num_frames)?;
            surfaces.push(surface);
            surface_start += ofs_end;
        }

        Ok(Self {
            name,
            flags,
            frames,
            tags,
            surfaces,
        })
    }

    fn read_surface(
        sb: &mut SizeBuf,
        start: usize,
        num_frames: usize,
    ) -> Result<(Md3Surface, usize), FormatError> {
        sb.seek(start)?;
        // each surface block restates the file magic, with no version of
        // its own
        let ident = sb.read_string(4)?;
        if ident.as_bytes() != IDMD3HEADER.to_le_bytes() {
            return Err(FormatError::BadIdent {
                ident,
                version: MD3_VERSION,
            });
        }

        let name = sb.read_path(MAX_QPATH)?;
        let flags = sb.read_long()?;
        let _num_frames = sb.read_long()?;
        let num_shaders = count("num_shaders", sb.read_long()?)?;
        let num_verts = count("num_verts", sb.read_long()?)?;
        let num_triangles = count("num_triangles", sb.read_long()?)?;
        let ofs_triangles = count("ofs_triangles", sb.read_long()?)?;
        let ofs_shaders = count("ofs_shaders", sb.read_long()?)?;
        let ofs_st = count("ofs_st", sb.read_long()?)?;
        let ofs_xyznormals = count("ofs_xyznormals", sb.read_long()?)?;
        let ofs_end = count("ofs_end", sb.read_long()?)?;

        let mut triangles = Vec::with_capacity(sb.reserve_hint(num_triangles, MD3_TRIANGLE_SIZE));
        sb.seek(start + ofs_triangles)?;
        for t in 0..num_triangles {
            let mut tri = Md3Triangle { indexes: [0; 3] };
            for idx in tri.indexes.iter_mut() {
                *idx = sb.read_long()?;
            }
            // stored indices are untrusted; a bad one must fail here, not
            // when a caller walks the faces
            for idx in tri.indexes {
                if idx < 0 || idx as usize >= num_verts {
                    return Err(FormatError::BadIndex {
                        tri: t,
                        kind: "vertex",
                        index: idx,
                        count: num_verts,
                    });
                }
            }
            triangles.push(tri);
        }

        let mut shaders = Vec::with_capacity(sb.reserve_hint(num_shaders, MD3_SHADER_SIZE));
        sb.seek(start + ofs_shaders)?;
        for _ in 0..num_shaders {
            shaders.push(Md3Shader {
                name: sb.read_path(MAX_QPATH)?,
                index: sb.read_long()?,
            });
        }

        let mut texcoords = Vec::with_capacity(sb.reserve_hint(num_verts, MD3_TEXCOORD_SIZE));
        sb.seek(start + ofs_st)?;
        for _ in 0..num_verts {
            texcoords.push(Md3TexCoord {
                s: sb.read_float()?,
                t: sb.read_float()?,
            });
        }

        let mut verts = Vec::with_capacity(sb.reserve_hint(num_verts * num_frames, MD3_VERTEX_SIZE));
        sb.seek(start + ofs_xyznormals)?;
        for _ in 0..num_verts * num_frames {
            let xyz = [sb.read_short()?, sb.read_short()?, sb.read_short()?];
            let normal = sb.read_ushort()?;
            verts.push(Md3Vertex { xyz, normal });
        }

        Ok((
            Md3Surface {
                name,
                flags,
                shaders,
                triangles,
                texcoords,
                verts,
            },
            ofs_end,
        ))
    }

    pub fn save(&self, path: &Path) -> Result<(), ValidationError> {
        let sb = self.write()?;
        sb.to_file(path)?;
        debug!(name = %self.name, bytes = sb.len(), "wrote md3");
        Ok(())
    }

    pub fn write(&self) -> Result<SizeBuf, ValidationError> {
        if self.frames.is_empty() {
            return Err(ValidationError::NoFrames);
        }
        let num_frames = self.frames.len();
        for surface in &self.surfaces {
            Self::validate_surface(surface, num_frames)?;
        }
        // tags repeat frame-major, so the header count is tags-per-frame;
        // an uneven list would be silently shortened on reread
        if self.tags.len() % num_frames != 0 {
            return Err(ValidationError::UnevenTagSplit {
                tags: self.tags.len(),
                frames: num_frames,
            });
        }
        let num_tags = self.tags.len() / num_frames;

        let ofs_frames = MD3_HEADER_SIZE;
        let ofs_tags = ofs_frames + MD3_FRAME_SIZE * num_frames;
        let ofs_surfaces = ofs_tags + MD3_TAG_SIZE * self.tags.len();
        let surface_sizes: Vec<usize> = self
            .surfaces
            .iter()
            .map(|s| Self::surface_size(s, num_frames))
            .collect();
        let ofs_eof = ofs_surfaces + surface_sizes.iter().sum::<usize>();

        let mut sb = SizeBuf::new();
        sb.write_long(IDMD3HEADER);
        sb.write_long(MD3_VERSION);
        sb.write_string(&self.name, MAX_QPATH);
        sb.write_long(self.flags);
        sb.write_long(num_frames as i32);
        sb.write_long(num_tags as i32);
        sb.write_long(self.surfaces.len() as i32);
        sb.write_long(0); // num_skins, unused
        sb.write_long(ofs_frames as i32);
        sb.write_long(ofs_tags as i32);
        sb.write_long(ofs_surfaces as i32);
        sb.write_long(ofs_eof as i32);

        for frame in &self.frames {
            sb.write_float3(&frame.mins);
            sb.write_float3(&frame.maxs);
            sb.write_float3(&frame.local_origin);
            sb.write_float(frame.radius);
            sb.write_string(&frame.name, MAX_FRAMENAME);
        }

        for tag in &self.tags {
            sb.write_path(&tag.name, MAX_QPATH);
            sb.write_float3(&tag.origin);
            for row in &tag.axis {
                sb.write_float3(row);
            }
        }

        for surface in &self.surfaces {
            Self::write_surface(&mut sb, surface, num_frames);
        }

        Ok(sb)
    }

    fn surface_size(surface: &Md3Surface, num_frames: usize) -> usize {
        MD3_SURFACE_BASE_SIZE
            + MD3_TRIANGLE_SIZE * surface.triangles.len()
            + MD3_SHADER_SIZE * surface.shaders.len()
            + MD3_TEXCOORD_SIZE * surface.texcoords.len()
            + MD3_VERTEX_SIZE * surface.texcoords.len() * num_frames
    }

    fn validate_surface(surface: &Md3Surface, num_frames: usize) -> Result<(), ValidationError> {
        let nv = surface.num_verts();
        if surface.verts.len() % num_frames != 0 {
            return Err(ValidationError::UnevenVertexSplit {
                name: surface.name.clone(),
                verts: surface.verts.len(),
                frames: num_frames,
            });
        }
        if surface.verts.len() / num_frames != nv {
            return Err(ValidationError::TexcoordMismatch {
                name: surface.name.clone(),
                texcoords: nv,
                verts: surface.verts.len() / num_frames,
            });
        }
        for (t, tri) in surface.triangles.iter().enumerate() {
            for idx in tri.indexes {
                if idx < 0 || idx as usize >= nv {
                    return Err(ValidationError::IndexOutOfRange {
                        tri: t,
                        kind: "vertex",
                        index: idx as usize,
                        count: nv,
                    });
                }
            }
        }
        Ok(())
    }

    fn write_surface(sb: &mut SizeBuf, surface: &Md3Surface, num_frames: usize) {
        let nv = surface.num_verts();

        let ofs_triangles = MD3_SURFACE_BASE_SIZE;
        let ofs_shaders = ofs_triangles + MD3_TRIANGLE_SIZE * surface.triangles.len();
        let ofs_st = ofs_shaders + MD3_SHADER_SIZE * surface.shaders.len();
        let ofs_xyznormals = ofs_st + MD3_TEXCOORD_SIZE * nv;
        let ofs_end = ofs_xyznormals + MD3_VERTEX_SIZE * nv * num_frames;

        sb.write_long(IDMD3HEADER);
        sb.write_string(&surface.name, MAX_QPATH);
        sb.write_long(surface.flags);
        sb.write_long(num_frames as i32);
        sb.write_long(surface.shaders.len() as i32);
        sb.write_long(nv as i32);
        sb.write_long(surface.triangles.len() as i32);
        sb.write_long(ofs_triangles as i32);
        sb.write_long(ofs_shaders as i32);
        sb.write_long(ofs_st as i32);
        sb.write_long(ofs_xyznormals as i32);
        sb.write_long(ofs_end as i32);

        for tri in &surface.triangles {
            for idx in tri.indexes {
                sb.write_long(idx);
            }
        }
        for shader in &surface.shaders {
            sb.write_path(&shader.name, MAX_QPATH);
            sb.write_long(shader.index);
        }
        for tc in &surface.texcoords {
            sb.write_float(tc.s);
            sb.write_float(tc.t);
        }
        for vert in &surface.verts {
            for c in vert.xyz {
                sb.write_short(c);
            }
            sb.write_ushort(vert.normal);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Two frames, one tag per frame, one surface with a single triangle.
    fn make_test_model() -> Md3 {
        let mut mdl = Md3::new("models/players/test/upper.md3");
        for fno in 0..2 {
            mdl.frames.push(Md3Frame {
                mins: [-8.0, -8.0, -8.0],
                maxs: [8.0, 8.0, 8.0 + fno as f32],
                local_origin: [0.0; 3],
                radius: 13.8,
                name: format!("frame{}", fno),
            });
            mdl.tags.push(Md3Tag {
                name: "tag_torso".to_string(),
                origin: [0.0, 0.0, 4.0 * fno as f32],
                axis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            });
        }

        let mut surf = Md3Surface::new("u_torso");
        surf.shaders.push(Md3Shader {
            name: "models/players/test/torso.tga".to_string(),
            index: 0,
        });
        surf.triangles.push(Md3Triangle { indexes: [0, 2, 1] });
        surf.texcoords = vec![
            Md3TexCoord { s: 0.0, t: 1.0 },
            Md3TexCoord { s: 1.0, t: 1.0 },
            Md3TexCoord { s: 0.0, t: 0.0 },
        ];
        for fno in 0..2i16 {
            surf.verts.extend([
                Md3Vertex { xyz: [0, 0, fno * 64], normal: 0x0000 },
                Md3Vertex { xyz: [512, 0, fno * 64], normal: 0x0080 },
                Md3Vertex { xyz: [0, 512, fno * 64], normal: 0x4040 },
            ]);
        }
        mdl.surfaces.push(surf);
        mdl
    }

    #[test]
    fn round_trip() {
        let mdl = make_test_model();
        let sb = mdl.write().unwrap();
        let reread = Md3::read(&mut SizeBuf::from_vec(sb.data().to_vec())).unwrap();

        assert_eq!(reread.name, mdl.name);
        assert_eq!(reread.frames, mdl.frames);
        assert_eq!(reread.tags, mdl.tags);
        assert_eq!(reread.surfaces, mdl.surfaces);
    }

    #[test]
    fn round_trip_two_surfaces() {
        let mut mdl = make_test_model();
        let mut second = mdl.surfaces[0].clone();
        second.name = "u_arms".to_string();
        second.triangles.push(Md3Triangle { indexes: [1, 0, 2] });
        mdl.surfaces.push(second);

        let sb = mdl.write().unwrap();
        let reread = Md3::read(&mut SizeBuf::from_vec(sb.data().to_vec())).unwrap();
        assert_eq!(reread.surfaces.len(), 2);
        assert_eq!(reread.surfaces, mdl.surfaces);
    }

    #[test]
    fn header_offsets_are_cumulative() {
        let mdl = make_test_model();
        let sb = mdl.write().unwrap();
        let mut sb = SizeBuf::from_vec(sb.data().to_vec());

        sb.seek(4 + 4 + 64 + 4).unwrap();
        let num_frames = sb.read_long().unwrap();
        let num_tags = sb.read_long().unwrap();
        let num_surfaces = sb.read_long().unwrap();
        let _num_skins = sb.read_long().unwrap();
        assert_eq!((num_frames, num_tags, num_surfaces), (2, 1, 1));

        let ofs_frames = sb.read_long().unwrap();
        let ofs_tags = sb.read_long().unwrap();
        let ofs_surfaces = sb.read_long().unwrap();
        let ofs_eof = sb.read_long().unwrap();

        assert_eq!(ofs_frames, 108);
        assert_eq!(ofs_tags, 108 + 56 * 2);
        assert_eq!(ofs_surfaces, ofs_tags + 112 * 2);
        // one surface: base 108 + 1 tri * 12 + 1 shader * 68 + 3 st * 8
        // + 3 verts * 2 frames * 8
        assert_eq!(ofs_eof, ofs_surfaces + 108 + 12 + 68 + 24 + 48);
        assert_eq!(ofs_eof as usize, sb.len());
    }

    #[test]
    fn surface_has_sub_magic() {
        let mdl = make_test_model();
        let sb = mdl.write().unwrap();
        let data = sb.data();
        let ofs_surfaces = 108 + 56 * 2 + 112 * 2;
        assert_eq!(&data[ofs_surfaces..ofs_surfaces + 4], b"IDP3");
    }

    #[test]
    fn rejects_wrong_magic() {
        let sb = make_test_model().write().unwrap();
        let mut data = sb.data().to_vec();
        data[0] = b'X';
        let err = Md3::read(&mut SizeBuf::from_vec(data)).unwrap_err();
        assert!(matches!(err, FormatError::BadIdent { .. }));
    }

    #[test]
    fn rejects_wrong_version() {
        let sb = make_test_model().write().unwrap();
        let mut data = sb.data().to_vec();
        data[4] = 16;
        let err = Md3::read(&mut SizeBuf::from_vec(data)).unwrap_err();
        assert!(matches!(err, FormatError::BadIdent { version: 16, .. }));
    }

    #[test]
    fn read_rejects_out_of_range_stored_index() {
        let sb = make_test_model().write().unwrap();
        let mut data = sb.data().to_vec();
        // first surface's first triangle index: surface start + base size
        let ofs_tris = 108 + 56 * 2 + 112 * 2 + 108;
        data[ofs_tris..ofs_tris + 4].copy_from_slice(&99i32.to_le_bytes());
        let err = Md3::read(&mut SizeBuf::from_vec(data)).unwrap_err();
        match err {
            FormatError::BadIndex { tri, kind, index, count } => {
                assert_eq!((tri, kind, index, count), (0, "vertex", 99, 3));
            }
            other => panic!("expected BadIndex, got {other:?}"),
        }
    }

    #[test]
    fn huge_tag_count_fails_at_end_of_stream() {
        let sb = make_test_model().write().unwrap();
        let mut data = sb.data().to_vec();
        // num_tags is the second count after ident/version/name/flags
        data[80..84].copy_from_slice(&i32::MAX.to_le_bytes());
        let err = Md3::read(&mut SizeBuf::from_vec(data)).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }

    #[test]
    fn export_rejects_uneven_tag_list() {
        let mut mdl = make_test_model();
        mdl.tags.push(Md3Tag {
            name: "tag_weapon".to_string(),
            origin: [0.0; 3],
            axis: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        });
        assert!(matches!(
            mdl.write(),
            Err(ValidationError::UnevenTagSplit { tags: 3, frames: 2 })
        ));
    }

    #[test]
    fn export_requires_a_frame() {
        let mut mdl = make_test_model();
        mdl.frames.clear();
        assert!(matches!(mdl.write(), Err(ValidationError::NoFrames)));
    }

    #[test]
    fn export_rejects_uneven_vertex_split() {
        let mut mdl = make_test_model();
        mdl.surfaces[0].verts.pop();
        assert!(matches!(
            mdl.write(),
            Err(ValidationError::UnevenVertexSplit { verts: 5, frames: 2, .. })
        ));
    }

    #[test]
    fn export_rejects_texcoord_mismatch() {
        let mut mdl = make_test_model();
        // still an even split across 2 frames, but 2 verts/frame for 3 sts
        mdl.surfaces[0].verts.truncate(4);
        assert!(matches!(
            mdl.write(),
            Err(ValidationError::TexcoordMismatch { texcoords: 3, verts: 2, .. })
        ));
    }

    #[test]
    fn export_rejects_out_of_range_triangle_index() {
        let mut mdl = make_test_model();
        mdl.surfaces[0].triangles[0].indexes[2] = 3;
        assert!(matches!(
            mdl.write(),
            Err(ValidationError::IndexOutOfRange {
                tri: 0,
                kind: "vertex",
                index: 3,
                count: 3
            })
        ));
    }
}
