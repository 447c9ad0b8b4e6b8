// sizebuf.rs -- Little-endian byte-stream codec over a whole-file buffer
//
// Every Quake-family model format is a packed little-endian image with
// fixed-width NUL-padded name fields and header offsets into out-of-order
// sections, so the codec works against one in-memory buffer:
//
//   import: slurp the file into the buffer once, then walk it with a read
//           cursor (absolute seeks follow the header offsets).
//   export: append into the buffer, then flush to disk in a single write.
//           Nothing touches the filesystem until the image is complete, so
//           a failed export never leaves a partial file behind.
//
// Running off the end of the buffer is a fatal FormatError; all validation
// beyond that is the job of the per-format codecs.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::FormatError;

pub struct SizeBuf {
    data: Vec<u8>,
    readcount: usize,
}

impl SizeBuf {
    /// Empty buffer for writing.
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            readcount: 0,
        }
    }

    /// Wrap an existing file image for reading.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data, readcount: 0 }
    }

    /// Read an entire file into a buffer. The handle is closed before this
    /// returns.
    pub fn from_file(path: &Path) -> Result<Self, FormatError> {
        Ok(Self::from_vec(fs::read(path)?))
    }

    /// Flush the written image to disk in one write.
    pub fn to_file(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, &self.data)
    }

    /// Bytes written so far (write side) or total file size (read side).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Current read cursor position.
    pub fn readcount(&self) -> usize {
        self.readcount
    }

    /// Bytes left after the read cursor.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.readcount
    }

    /// Pre-reserve hint for `count` records of `size` bytes each, capped by
    /// what the stream can still hold. A header claiming a huge count then
    /// fails at end-of-stream instead of in the allocator.
    pub fn reserve_hint(&self, count: usize, size: usize) -> usize {
        count.min(self.remaining() / size.max(1))
    }

    // ============================================================
    // Reading
    // ============================================================

    /// Move the read cursor to an absolute offset. Formats store section
    /// offsets in their headers, so sections are not always read in file
    /// order.
    pub fn seek(&mut self, ofs: usize) -> Result<(), FormatError> {
        if ofs > self.data.len() {
            return Err(FormatError::BadOffset {
                offset: ofs,
                len: self.data.len(),
            });
        }
        self.readcount = ofs;
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<&[u8], FormatError> {
        let remaining = self.data.len() - self.readcount;
        if count > remaining {
            return Err(FormatError::UnexpectedEof {
                offset: self.readcount,
                wanted: count,
                remaining,
            });
        }
        let slice = &self.data[self.readcount..self.readcount + count];
        self.readcount += count;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> Result<u8, FormatError> {
        Ok(self.take(1)?[0])
    }

    pub fn read_short(&mut self) -> Result<i16, FormatError> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_ushort(&mut self) -> Result<u16, FormatError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_long(&mut self) -> Result<i32, FormatError> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_float(&mut self) -> Result<f32, FormatError> {
        let b = self.take(4)?;
        Ok(f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_float3(&mut self) -> Result<[f32; 3], FormatError> {
        Ok([self.read_float()?, self.read_float()?, self.read_float()?])
    }

    pub fn read_data(&mut self, count: usize) -> Result<Vec<u8>, FormatError> {
        Ok(self.take(count)?.to_vec())
    }

    /// Read `count` raw bytes as a string, NULs and all. Name fields on disk
    /// are not guaranteed to be UTF-8, so decoding is lossy.
    pub fn read_string(&mut self, count: usize) -> Result<String, FormatError> {
        let bytes = self.take(count)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a fixed-width NUL-padded name field of `count` bytes. Logical
    /// content stops at the first NUL; the cursor always advances by the
    /// full field width.
    pub fn read_path(&mut self, count: usize) -> Result<String, FormatError> {
        let bytes = self.take(count)?;
        let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    // ============================================================
    // Writing
    // ============================================================

    pub fn write_byte(&mut self, v: u8) {
        self.data.push(v);
    }

    pub fn write_short(&mut self, v: i16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_ushort(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_long(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_float(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_float3(&mut self, v: &[f32; 3]) {
        for &c in v {
            self.write_float(c);
        }
    }

    pub fn write_data(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    /// Write exactly `count` bytes: content hard-truncated to the field
    /// width, NUL-padded to fill it.
    pub fn write_string(&mut self, s: &str, count: usize) {
        let bytes = s.as_bytes();
        let n = bytes.len().min(count);
        self.data.extend_from_slice(&bytes[..n]);
        self.data.resize(self.data.len() + (count - n), 0);
    }

    /// Write a fixed-width name field. Over-long names are truncated
    /// silently for disk-format compatibility; the truncation is logged but
    /// never an error.
    pub fn write_path(&mut self, path: &str, count: usize) {
        if path.len() > count {
            warn!(name = path, width = count, "name truncated to field width");
        }
        self.write_string(path, count);
    }
}

impl Default for SizeBuf {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trip() {
        let mut sb = SizeBuf::new();
        sb.write_byte(0xfe);
        sb.write_short(-12345);
        sb.write_ushort(54321);
        sb.write_long(-123456789);
        sb.write_float(64.5);
        assert_eq!(sb.len(), 1 + 2 + 2 + 4 + 4);

        let mut sb = SizeBuf::from_vec(sb.data().to_vec());
        assert_eq!(sb.read_byte().unwrap(), 0xfe);
        assert_eq!(sb.read_short().unwrap(), -12345);
        assert_eq!(sb.read_ushort().unwrap(), 54321);
        assert_eq!(sb.read_long().unwrap(), -123456789);
        assert_eq!(sb.read_float().unwrap(), 64.5);
    }

    #[test]
    fn little_endian_layout() {
        let mut sb = SizeBuf::new();
        sb.write_long(0x33504449); // "IDP3"
        assert_eq!(sb.data(), b"IDP3");
    }

    #[test]
    fn path_stops_at_first_nul() {
        let mut sb = SizeBuf::new();
        sb.write_path("grunt", 16);
        assert_eq!(sb.len(), 16);

        let mut sb = SizeBuf::from_vec(sb.data().to_vec());
        assert_eq!(sb.read_path(16).unwrap(), "grunt");
        // field width consumed even though content is shorter
        assert_eq!(sb.readcount(), 16);
    }

    #[test]
    fn path_truncates_silently() {
        let mut sb = SizeBuf::new();
        sb.write_path("models/monsters/soldier/tris.md2", 16);
        assert_eq!(sb.len(), 16);

        let mut sb = SizeBuf::from_vec(sb.data().to_vec());
        // No NUL in a full field: content is the whole 16 bytes
        assert_eq!(sb.read_path(16).unwrap(), "models/monsters/");
    }

    #[test]
    fn read_past_end_is_fatal() {
        let mut sb = SizeBuf::from_vec(vec![1, 2, 3]);
        assert_eq!(sb.read_short().unwrap(), 0x0201);
        match sb.read_long() {
            Err(FormatError::UnexpectedEof {
                offset,
                wanted,
                remaining,
            }) => {
                assert_eq!(offset, 2);
                assert_eq!(wanted, 4);
                assert_eq!(remaining, 1);
            }
            other => panic!("expected UnexpectedEof, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn reserve_hint_is_capped_by_remaining_bytes() {
        let mut sb = SizeBuf::from_vec(vec![0; 100]);
        sb.seek(20).unwrap();
        assert_eq!(sb.reserve_hint(3, 8), 3);
        assert_eq!(sb.reserve_hint(usize::MAX, 8), 10);
        // zero record size never divides by zero
        assert_eq!(sb.reserve_hint(5, 0), 5);
    }

    #[test]
    fn seek_bounds() {
        let mut sb = SizeBuf::from_vec(vec![0; 8]);
        sb.seek(8).unwrap(); // end of buffer is a valid position
        assert!(matches!(sb.seek(9), Err(FormatError::BadOffset { .. })));
        sb.seek(4).unwrap();
        assert_eq!(sb.read_long().unwrap(), 0);
    }

    #[test]
    fn string_reads_raw_bytes() {
        let mut sb = SizeBuf::from_vec(b"IDP2xxxx".to_vec());
        assert_eq!(sb.read_string(4).unwrap(), "IDP2");
        assert_eq!(sb.read_string(4).unwrap(), "xxxx");
    }
}
