// qfmd-formats -- codecs for the Quake-family alias model formats (MDL v6,
// MD2, MD3) plus the geometry conversion layer between host float space and
// each format's quantized disk space.

pub mod convert;
pub mod md2;
pub mod md3;
pub mod mdl;

pub use md2::{Md2, Md2Frame, Md2StVert, Md2Triangle};
pub use md3::{Md3, Md3Frame, Md3Shader, Md3Surface, Md3Tag, Md3TexCoord, Md3Triangle, Md3Vertex};
pub use mdl::{Mdl, MdlFrameKind, MdlSimpleFrame, MdlSkin, MdlStVert, MdlTriangle};
