// error.rs -- Error types shared by all model codecs
//
// Two failure classes, surfaced synchronously with no internal retries:
//
//   FormatError     read side. The file on disk is not a model we can
//                   decode. Fatal to the current import; no partial model
//                   is ever returned.
//   ValidationError write side. The in-memory model cannot be expressed in
//                   the target format. Raised before any bytes reach disk,
//                   so export is all-or-nothing.
//
// Over-long name fields are NOT an error on either side: the disk formats
// hard-truncate them and existing tools rely on that, so the codec does the
// same (with a log warning on write).

use thiserror::Error;

/// Fatal problem with the bytes of a model file being read.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Magic or version mismatch. Carries the raw ident string and version
    /// integer so callers can report them verbatim.
    #[error("unrecognized format: {ident} {version}")]
    BadIdent { ident: String, version: i32 },

    /// The stream ended in the middle of a read.
    #[error("unexpected end of file at offset {offset}: wanted {wanted} byte(s), {remaining} left")]
    UnexpectedEof {
        offset: usize,
        wanted: usize,
        remaining: usize,
    },

    /// A header stored a section offset past the end of the file.
    #[error("section offset {offset} out of range (file is {len} bytes)")]
    BadOffset { offset: usize, len: usize },

    /// A compressed normal index does not fit the 162-entry table.
    #[error("normal index {index} out of range (normal table has 162 entries)")]
    BadNormalIndex { index: usize },

    /// A section count in a header is negative.
    #[error("negative count for {section}: {count}")]
    BadCount { section: &'static str, count: i32 },

    /// A stored triangle references a vertex or texcoord slot past the
    /// stored count.
    #[error("triangle {tri} references {kind} index {index}, but only {count} exist")]
    BadIndex {
        tri: usize,
        kind: &'static str,
        index: i32,
        count: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Problem with an in-memory model that prevents export.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more faces are not triangles. Quad-to-triangle conversion is
    /// never done automatically because the split diagonal is not canonical;
    /// the offending face indices are reported instead.
    #[error("faces {faces:?} are not triangles; triangulate them before exporting")]
    NonTriangularFaces { faces: Vec<usize> },

    /// Export needs at least one frame (frame 0 supplies the vertex count
    /// written into the header).
    #[error("model has no frames; at least one frame is required")]
    NoFrames,

    /// MD3 tags are stored frame-major: the same tag set repeats once per
    /// frame, so the tag list length must be a multiple of the frame count.
    #[error("{tags} tags do not divide evenly into {frames} frame(s)")]
    UnevenTagSplit { tags: usize, frames: usize },

    /// An MD3 surface vertex block must split evenly across frames.
    #[error("surface {name:?}: {verts} vertices do not divide evenly into {frames} frame(s)")]
    UnevenVertexSplit {
        name: String,
        verts: usize,
        frames: usize,
    },

    /// Frames of one model must share a single vertex topology; only the
    /// positions vary per frame.
    #[error("frame {frame} has {verts} vertices, expected {expected}")]
    MismatchedFrameTopology {
        frame: usize,
        verts: usize,
        expected: usize,
    },

    /// An MD3 surface stores one texcoord per disk vertex.
    #[error("surface {name:?}: {texcoords} texcoords for {verts} vertices")]
    TexcoordMismatch {
        name: String,
        texcoords: usize,
        verts: usize,
    },

    /// A coordinate left the signed 16-bit range after 1/64 fixed-point
    /// scaling. The original id tools silently wrap here; we refuse instead.
    #[error("coordinate {value} does not fit the int16 fixed-point range after x64 scaling")]
    CoordinateOverflow { value: f32 },

    /// A triangle references a vertex or texcoord slot that does not exist.
    #[error("triangle {tri} references {kind} index {index}, but only {count} exist")]
    IndexOutOfRange {
        tri: usize,
        kind: &'static str,
        index: usize,
        count: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
