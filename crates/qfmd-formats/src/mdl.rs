// mdl.rs -- MDL (Quake alias model) codec
//
// The oldest of the three formats and the only one with no header offsets:
// sections follow the header back to back, each prefixed by whatever tag
// the section needs (skin group type, frame type). Quantization is
// model-global, one scale/origin pair in the header covering every frame.
//
// Skin pixels are 8-bit palette indices. The codec carries them as opaque
// byte blobs sized skinwidth*skinheight; palette lookup belongs to the
// caller.

use std::path::Path;

use tracing::debug;

use qfmd_common::error::{FormatError, ValidationError};
use qfmd_common::qfiles::{DTriVertx, DTRIVERTX_SIZE, IDPOLYHEADER, MAX_FRAMENAME, MDL_ALIAS_VERSION};
use qfmd_common::sizebuf::SizeBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum MdlSkin {
    Single(Vec<u8>),
    /// Animated skin: one interval (seconds) per member picture.
    Group {
        intervals: Vec<f32>,
        skins: Vec<Vec<u8>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdlStVert {
    pub onseam: i32,
    pub s: i32,
    pub t: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MdlTriangle {
    pub facesfront: i32,
    pub vertindex: [i32; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdlSimpleFrame {
    pub bboxmin: DTriVertx,
    pub bboxmax: DTriVertx,
    pub name: String,
    pub verts: Vec<DTriVertx>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MdlFrameKind {
    Simple(MdlSimpleFrame),
    /// Frame group: members auto-animate on their intervals.
    Group {
        bboxmin: DTriVertx,
        bboxmax: DTriVertx,
        intervals: Vec<f32>,
        frames: Vec<MdlSimpleFrame>,
    },
}

impl MdlFrameKind {
    /// Simple frames in file order, flattening groups.
    pub fn simple_frames(&self) -> &[MdlSimpleFrame] {
        match self {
            Self::Simple(frame) => std::slice::from_ref(frame),
            Self::Group { frames, .. } => frames,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mdl {
    pub name: String,
    pub scale: [f32; 3],
    pub origin: [f32; 3],
    pub radius: f32,
    pub eye_position: [f32; 3],
    pub skinwidth: i32,
    pub skinheight: i32,
    pub synctype: i32,
    pub flags: i32,
    pub size: f32,
    pub skins: Vec<MdlSkin>,
    pub stverts: Vec<MdlStVert>,
    pub tris: Vec<MdlTriangle>,
    pub frames: Vec<MdlFrameKind>,
}

impl Default for Mdl {
    fn default() -> Self {
        Self {
            name: String::new(),
            scale: [1.0; 3],
            origin: [0.0; 3],
            radius: 0.0,
            eye_position: [0.0; 3],
            skinwidth: 0,
            skinheight: 0,
            synctype: 0,
            flags: 0,
            size: 0.0,
            skins: Vec::new(),
            stverts: Vec::new(),
            tris: Vec::new(),
            frames: Vec::new(),
        }
    }
}

fn count(section: &'static str, v: i32) -> Result<usize, FormatError> {
    if v < 0 {
        return Err(FormatError::BadCount { section, count: v });
    }
    Ok(v as usize)
}

fn read_trivertx(sb: &mut SizeBuf) -> Result<DTriVertx, FormatError> {
    Ok(DTriVertx {
        v: [sb.read_byte()?, sb.read_byte()?, sb.read_byte()?],
        lightnormalindex: sb.read_byte()?,
    })
}

fn write_trivertx(sb: &mut SizeBuf, tv: &DTriVertx) {
    for c in tv.v {
        sb.write_byte(c);
    }
    sb.write_byte(tv.lightnormalindex);
}

impl Mdl {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

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
            "loaded mdl"
        );
        Ok(mdl)
    }

    pub fn read(sb: &mut SizeBuf) -> Result<Self, FormatError> {
        let ident = sb.read_string(4)?;
        let version = sb.read_long()?;
        if ident.as_bytes() != IDPOLYHEADER.to_le_bytes() || version != MDL_ALIAS_VERSION {
            return Err(FormatError::BadIdent { ident, version });
        }

        let scale = sb.read_float3()?;
        let origin = sb.read_float3()?;
        let radius = sb.read_float()?;
        let eye_position = sb.read_float3()?;
        let num_skins = count("num_skins", sb.read_long()?)?;
        let skinwidth = sb.read_long()?;
        let skinheight = sb.read_long()?;
        let num_verts = count("num_verts", sb.read_long()?)?;
        let num_tris = count("num_tris", sb.read_long()?)?;
        let num_frames = count("num_frames", sb.read_long()?)?;
        let synctype = sb.read_long()?;
        let flags = sb.read_long()?;
        let size = sb.read_float()?;

        let skinsize = count("skinwidth", skinwidth)? * count("skinheight", skinheight)?;
        let mut skins = Vec::with_capacity(sb.reserve_hint(num_skins, skinsize + 4));
        for _ in 0..num_skins {
            skins.push(Self::read_skin(sb, skinsize)?);
        }

        let mut stverts = Vec::with_capacity(sb.reserve_hint(num_verts, 12));
        for _ in 0..num_verts {
            stverts.push(MdlStVert {
                onseam: sb.read_long()?,
                s: sb.read_long()?,
                t: sb.read_long()?,
            });
        }

        let mut tris = Vec::with_capacity(sb.reserve_hint(num_tris, 16));
        for t in 0..num_tris {
            let facesfront = sb.read_long()?;
            let vertindex = [sb.read_long()?, sb.read_long()?, sb.read_long()?];
            // stored indices are untrusted; a bad one must fail here, not
            // when a caller walks the faces
            for v in vertindex {
                if v < 0 || v as usize >= num_verts {
                    return Err(FormatError::BadIndex {
                        tri: t,
                        kind: "vertex",
                        index: v,
                        count: num_verts,
                    });
                }
            }
            tris.push(MdlTriangle {
                facesfront,
                vertindex,
            });
        }

        let mut frames = Vec::with_capacity(sb.reserve_hint(num_frames, 4));
        for _ in 0..num_frames {
            frames.push(Self::read_frame(sb, num_verts)?);
        }

        Ok(Self {
            name: String::new(),
            scale,
            origin,
            radius,
            eye_position,
            skinwidth,
            skinheight,
            synctype,
            flags,
            size,
            skins,
            stverts,
            tris,
            frames,
        })
    }

    fn read_skin(sb: &mut SizeBuf, skinsize: usize) -> Result<MdlSkin, FormatError> {
        let group = sb.read_long()?;
        if group == 0 {
            return Ok(MdlSkin::Single(sb.read_data(skinsize)?));
        }
        let n = count("skin group", sb.read_long()?)?;
        let mut intervals = Vec::with_capacity(sb.reserve_hint(n, 4));
        for _ in 0..n {
            intervals.push(sb.read_float()?);
        }
        let mut pics = Vec::with_capacity(sb.reserve_hint(n, skinsize));
        for _ in 0..n {
            pics.push(sb.read_data(skinsize)?);
        }
        Ok(MdlSkin::Group {
            intervals,
            skins: pics,
        })
    }

    fn read_simple_frame(sb: &mut SizeBuf, num_verts: usize) -> Result<MdlSimpleFrame, FormatError> {
        let bboxmin = read_trivertx(sb)?;
        let bboxmax = read_trivertx(sb)?;
        let name = sb.read_path(MAX_FRAMENAME)?;
        let mut verts = Vec::with_capacity(sb.reserve_hint(num_verts, DTRIVERTX_SIZE));
        for _ in 0..num_verts {
            verts.push(read_trivertx(sb)?);
        }
        Ok(MdlSimpleFrame {
            bboxmin,
            bboxmax,
            name,
            verts,
        })
    }

    fn read_frame(sb: &mut SizeBuf, num_verts: usize) -> Result<MdlFrameKind, FormatError> {
        let kind = sb.read_long()?;
        if kind == 0 {
            return Ok(MdlFrameKind::Simple(Self::read_simple_frame(sb, num_verts)?));
        }
        let n = count("frame group", sb.read_long()?)?;
        let bboxmin = read_trivertx(sb)?;
        let bboxmax = read_trivertx(sb)?;
        let mut intervals = Vec::with_capacity(sb.reserve_hint(n, 4));
        for _ in 0..n {
            intervals.push(sb.read_float()?);
        }
        let mut members = Vec::with_capacity(sb.reserve_hint(n, DTRIVERTX_SIZE));
        for _ in 0..n {
            members.push(Self::read_simple_frame(sb, num_verts)?);
        }
        Ok(MdlFrameKind::Group {
            bboxmin,
            bboxmax,
            intervals,
            frames: members,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ValidationError> {
        let sb = self.write()?;
        sb.to_file(path)?;
        debug!(name = %self.name, bytes = sb.len(), "wrote mdl");
        Ok(())
    }

    pub fn write(&self) -> Result<SizeBuf, ValidationError> {
        if self.frames.is_empty() {
            return Err(ValidationError::NoFrames);
        }
        let num_verts = self.stverts.len();
        self.validate_topology(num_verts)?;

        let mut sb = SizeBuf::new();
        sb.write_long(IDPOLYHEADER);
        sb.write_long(MDL_ALIAS_VERSION);
        sb.write_float3(&self.scale);
        sb.write_float3(&self.origin);
        sb.write_float(self.radius);
        sb.write_float3(&self.eye_position);
        sb.write_long(self.skins.len() as i32);
        sb.write_long(self.skinwidth);
        sb.write_long(self.skinheight);
        sb.write_long(num_verts as i32);
        sb.write_long(self.tris.len() as i32);
        sb.write_long(self.frames.len() as i32);
        sb.write_long(self.synctype);
        sb.write_long(self.flags);
        sb.write_float(self.size);

        for skin in &self.skins {
            match skin {
                MdlSkin::Single(pixels) => {
                    sb.write_long(0);
                    sb.write_data(pixels);
                }
                MdlSkin::Group { intervals, skins } => {
                    sb.write_long(1);
                    sb.write_long(skins.len() as i32);
                    for &dt in intervals {
                        sb.write_float(dt);
                    }
                    for pixels in skins {
                        sb.write_data(pixels);
                    }
                }
            }
        }

        for st in &self.stverts {
            sb.write_long(st.onseam);
            sb.write_long(st.s);
            sb.write_long(st.t);
        }
        for tri in &self.tris {
            sb.write_long(tri.facesfront);
            for v in tri.vertindex {
                sb.write_long(v);
            }
        }

        for frame in &self.frames {
            match frame {
                MdlFrameKind::Simple(simple) => {
                    sb.write_long(0);
                    Self::write_simple_frame(&mut sb, simple);
                }
                MdlFrameKind::Group {
                    bboxmin,
                    bboxmax,
                    intervals,
                    frames,
                } => {
                    sb.write_long(1);
                    sb.write_long(frames.len() as i32);
                    write_trivertx(&mut sb, bboxmin);
                    write_trivertx(&mut sb, bboxmax);
                    for &dt in intervals {
                        sb.write_float(dt);
                    }
                    for simple in frames {
                        Self::write_simple_frame(&mut sb, simple);
                    }
                }
            }
        }

        Ok(sb)
    }

    fn write_simple_frame(sb: &mut SizeBuf, frame: &MdlSimpleFrame) {
        write_trivertx(sb, &frame.bboxmin);
        write_trivertx(sb, &frame.bboxmax);
        sb.write_string(&frame.name, MAX_FRAMENAME);
        for tv in &frame.verts {
            write_trivertx(sb, tv);
        }
    }

    fn validate_topology(&self, num_verts: usize) -> Result<(), ValidationError> {
        for (i, frame) in self.frames.iter().enumerate() {
            for simple in frame.simple_frames() {
                if simple.verts.len() != num_verts {
                    return Err(ValidationError::MismatchedFrameTopology {
                        frame: i,
                        verts: simple.verts.len(),
                        expected: num_verts,
                    });
                }
            }
        }
        for (t, tri) in self.tris.iter().enumerate() {
            for v in tri.vertindex {
                if v < 0 || v as usize >= num_verts {
                    return Err(ValidationError::IndexOutOfRange {
                        tri: t,
                        kind: "vertex",
                        index: v as usize,
                        count: num_verts,
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
