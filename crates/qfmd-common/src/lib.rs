// qfmd-common -- shared plumbing for the Quake-family model codecs:
// little-endian stream codec, error types, on-disk constants and the
// vertex-normal table.

pub mod anorms;
pub mod error;
pub mod qfiles;
pub mod sizebuf;

pub use anorms::{
    compress_normal, decode_lat_lng, decompress_normal, encode_lat_lng, BYTEDIRS,
    NUMVERTEXNORMALS,
};
pub use error::{FormatError, ValidationError};
pub use sizebuf::SizeBuf;
