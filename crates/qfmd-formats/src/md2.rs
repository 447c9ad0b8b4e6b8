// md2.rs -- MD2 (Quake 2 alias model) codec
//
// Flat single-surface format: one skin list, one st (texcoord) table, one
// triangle list, and a list of frames each holding the whole model's
// byte-quantized vertices. The header carries counts plus byte offsets to
// every section; offsets are recomputed from scratch on every write as the
// cumulative sums of the section sizes in the fixed order
// skins -> st -> tris -> frames.
//
// GL command lists are legacy renderer state: discarded on read, written
// with a zero count.

use std::path::Path;

use tracing::debug;

use qfmd_common::error::{FormatError, ValidationError};
use qfmd_common::qfiles::{
    DTriVertx, ALIAS_VERSION, DTRIVERTX_SIZE, IDALIASHEADER, MAX_FRAMENAME, MAX_QPATH,
    MD2_FRAME_HEADER_SIZE, MD2_HEADER_SIZE, MD2_ST_SIZE, MD2_TRIANGLE_SIZE,
};
use qfmd_common::sizebuf::SizeBuf;

/// Texcoord table entry: integer texel coordinates, scaled by the skin
/// dimensions rather than normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Md2StVert {
    pub s: i16,
    pub t: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Md2Triangle {
    pub index_xyz: [i16; 3],
    pub index_st: [i16; 3],
}

/// One pose of the whole model. Scale and translate are the frame's own
/// dequantization transform and must be recomputed from the frame's bounds
/// whenever the vertex positions change (the conversion layer does this).
#[derive(Debug, Clone, PartialEq)]
pub struct Md2Frame {
    pub name: String,
    pub scale: [f32; 3],
    pub translate: [f32; 3],
    pub verts: Vec<DTriVertx>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Md2 {
    pub name: String,
    pub skinwidth: i32,
    pub skinheight: i32,
    pub skins: Vec<String>,
    pub stverts: Vec<Md2StVert>,
    pub tris: Vec<Md2Triangle>,
    pub frames: Vec<Md2Frame>,
}

fn count(section: &'static str, v: i32) -> Result<usize, FormatError> {
    if v < 0 {
        return Err(FormatError::BadCount { section, count: v });
    }
    Ok(v as usize)
}

impl Md2 {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Import a model file. The whole file is read up front and the handle
    /// closed before decoding starts; a failure returns no partial model.
    pub fn load(path: &Path) -> Result<Self, FormatError> {
        let mut sb = SizeBuf::from_file(path)?;
        let mut mdl = Self::read(&mut sb)?;
        if let Some(stem) = path.file_stem() {
            mdl.name = stem.to_string_lossy().into_owned();
        }
        debug!(
            name = %mdl.name,
            skins = mdl.skins.len(),
            tris = mdl.tris.len(),
            frames = mdl.frames.len(),
            "loaded md2"
        );
        Ok(mdl)
    }

    pub fn read(sb: &mut SizeBuf) -> Result<Self, FormatError> {
        let ident = sb.read_string(4)?;
        let version = sb.read_long()?;
        if ident.as_bytes() != IDALIASHEADER.to_le_bytes() || version != ALIAS_VERSION {
            return Err(FormatError::BadIdent { ident, version });
        }

        let skinwidth = sb.read_long()?;
        let skinheight = sb.read_long()?;
        let _framesize = sb.read_long()?;

        let num_skins = count("num_skins", sb.read_long()?)?;
        let num_xyz = count("num_xyz", sb.read_long()?)?;
        let num_st = count("num_st", sb.read_long()?)?;
        let num_tris = count("num_tris", sb.read_long()?)?;
        let _num_glcmds = sb.read_long()?;
        let num_frames = count("num_frames", sb.read_long()?)?;

        let ofs_skins = count("ofs_skins", sb.read_long()?)?;
        let ofs_st = count("ofs_st", sb.read_long()?)?;
        let ofs_tris = count("ofs_tris", sb.read_long()?)?;
        let ofs_frames = count("ofs_frames", sb.read_long()?)?;
        let _ofs_glcmds = sb.read_long()?;
        let _ofs_end = sb.read_long()?;

        let mut skins = Vec::with_capacity(sb.reserve_hint(num_skins, MAX_QPATH));
        sb.seek(ofs_skins)?;
        for _ in 0..num_skins {
            skins.push(sb.read_path(MAX_QPATH)?);
        }

        let mut stverts = Vec::with_capacity(sb.reserve_hint(num_st, MD2_ST_SIZE));
        sb.seek(ofs_st)?;
        for _ in 0..num_st {
            stverts.push(Md2StVert {
                s: sb.read_short()?,
                t: sb.read_short()?,
            });
        }

        let mut tris = Vec::with_capacity(sb.reserve_hint(num_tris, MD2_TRIANGLE_SIZE));
        sb.seek(ofs_tris)?;
        for t in 0..num_tris {
            let mut tri = Md2Triangle {
                index_xyz: [0; 3],
                index_st: [0; 3],
            };
            for v in tri.index_xyz.iter_mut() {
                *v = sb.read_short()?;
            }
            for st in tri.index_st.iter_mut() {
                *st = sb.read_short()?;
            }
            // stored indices are untrusted; a bad one must fail here, not
            // when a caller walks the faces
            for v in tri.index_xyz {
                if v < 0 || v as usize >= num_xyz {
                    return Err(FormatError::BadIndex {
                        tri: t,
                        kind: "vertex",
                        index: v as i32,
                        count: num_xyz,
                    });
                }
            }
            for st in tri.index_st {
                if st < 0 || st as usize >= num_st {
                    return Err(FormatError::BadIndex {
                        tri: t,
                        kind: "texcoord",
                        index: st as i32,
                        count: num_st,
                    });
                }
            }
            tris.push(tri);
        }

        let framesize = MD2_FRAME_HEADER_SIZE + DTRIVERTX_SIZE * num_xyz;
        let mut frames = Vec::with_capacity(sb.reserve_hint(num_frames, framesize));
        sb.seek(ofs_frames)?;
        for _ in 0..num_frames {
            frames.push(Self::read_frame(sb, num_xyz)?);
        }

        Ok(Self {
            name: String::new(),
            skinwidth,
            skinheight,
            skins,
            stverts,
            tris,
            frames,
        })
    }

    fn read_frame(sb: &mut SizeBuf, num_xyz: usize) -> Result<Md2Frame, FormatError> {
        let scale = sb.read_float3()?;
        let translate = sb.read_float3()?;
        let name = sb.read_path(MAX_FRAMENAME)?;
        // packed verts are all 8 bit, so they blit straight out of the image
        let raw = sb.read_data(num_xyz * DTRIVERTX_SIZE)?;
        let verts = bytemuck::cast_slice::<u8, DTriVertx>(&raw).to_vec();
        Ok(Md2Frame {
            name,
            scale,
            translate,
            verts,
        })
    }

    /// Export to a file. Validation and serialization happen entirely in
    /// memory; the target path is only touched once the image is complete.
    pub fn save(&self, path: &Path) -> Result<(), ValidationError> {
        let sb = self.write()?;
        sb.to_file(path)?;
        debug!(name = %self.name, bytes = sb.len(), "wrote md2");
        Ok(())
    }

    pub fn write(&self) -> Result<SizeBuf, ValidationError> {
        // frame 0 supplies the vertex count in the header
        let first = self.frames.first().ok_or(ValidationError::NoFrames)?;
        let num_xyz = first.verts.len();
        self.validate_topology(num_xyz)?;

        let framesize = (MD2_FRAME_HEADER_SIZE + DTRIVERTX_SIZE * num_xyz) as i32;

        let mut sb = SizeBuf::new();
        sb.write_long(IDALIASHEADER);
        sb.write_long(ALIAS_VERSION);
        sb.write_long(self.skinwidth);
        sb.write_long(self.skinheight);
        sb.write_long(framesize);

        sb.write_long(self.skins.len() as i32);
        sb.write_long(num_xyz as i32);
        sb.write_long(self.stverts.len() as i32);
        sb.write_long(self.tris.len() as i32);
        sb.write_long(0); // no gl commands
        sb.write_long(self.frames.len() as i32);

        // cumulative section offsets in fixed order
        let mut pos = MD2_HEADER_SIZE as i32;
        sb.write_long(pos); // ofs_skins
        pos += (MAX_QPATH * self.skins.len()) as i32;
        sb.write_long(pos); // ofs_st
        pos += (MD2_ST_SIZE * self.stverts.len()) as i32;
        sb.write_long(pos); // ofs_tris
        pos += (MD2_TRIANGLE_SIZE * self.tris.len()) as i32;
        sb.write_long(pos); // ofs_frames
        pos += framesize * self.frames.len() as i32;
        sb.write_long(pos); // ofs_glcmds
        sb.write_long(pos); // ofs_end

        for skin in &self.skins {
            sb.write_path(skin, MAX_QPATH);
        }
        for st in &self.stverts {
            sb.write_short(st.s);
            sb.write_short(st.t);
        }
        for tri in &self.tris {
            for v in tri.index_xyz {
                sb.write_short(v);
            }
            for st in tri.index_st {
                sb.write_short(st);
            }
        }
        for frame in &self.frames {
            sb.write_float3(&frame.scale);
            sb.write_float3(&frame.translate);
            sb.write_string(&frame.name, MAX_FRAMENAME);
            sb.write_data(bytemuck::cast_slice(&frame.verts));
        }

        Ok(sb)
    }

    fn validate_topology(&self, num_xyz: usize) -> Result<(), ValidationError> {
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.verts.len() != num_xyz {
                return Err(ValidationError::MismatchedFrameTopology {
                    frame: i,
                    verts: frame.verts.len(),
                    expected: num_xyz,
                });
            }
        }
        for (t, tri) in self.tris.iter().enumerate() {
            for v in tri.index_xyz {
                if v as usize >= num_xyz || v < 0 {
                    return Err(ValidationError::IndexOutOfRange {
                        tri: t,
                        kind: "vertex",
                        index: v as usize,
                        count: num_xyz,
                    });
                }
            }
            for st in tri.index_st {
                if st as usize >= self.stverts.len() || st < 0 {
                    return Err(ValidationError::IndexOutOfRange {
                        tri: t,
                        kind: "texcoord",
                        index: st as usize,
                        count: self.stverts.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
