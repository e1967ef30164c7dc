//! Position-tracking little-endian streams for the container.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use glam::Vec4;

use crate::util::{Error, Result};

/// Output stream that knows its position, so headers can be back-patched.
pub struct OStream<W: Write + Seek> {
    writer: W,
    pos: u64,
}

impl OStream<BufWriter<File>> {
    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(BufWriter::with_capacity(1024 * 1024, file)))
    }

    /// Cut the file to `len` bytes and move there.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().set_len(len)?;
        self.seek(len)?;
        Ok(())
    }
}

impl<W: Write + Seek> OStream<W> {
    /// Wrap a writer positioned at offset 0.
    pub fn new(writer: W) -> Self {
        Self { writer, pos: 0 }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.pos += data.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.writer.write_u8(value)?;
        self.pos += 1;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.writer.write_u32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.writer.write_u64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.writer.write_i64::<LittleEndian>(value)?;
        self.pos += 8;
        Ok(())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.writer.write_f32::<LittleEndian>(value)?;
        self.pos += 4;
        Ok(())
    }

    pub fn write_vec4(&mut self, value: Vec4) -> Result<()> {
        for c in value.to_array() {
            self.write_f32(c)?;
        }
        Ok(())
    }

    /// `u32` length followed by the bytes.
    pub fn write_len_prefixed(&mut self, data: &[u8]) -> Result<()> {
        let len = u32::try_from(data.len())
            .map_err(|_| Error::other(format!("{} bytes do not fit a u32 length", data.len())))?;
        self.write_u32(len)?;
        self.write_bytes(data)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        self.writer.flush()?;
        self.pos = self.writer.seek(SeekFrom::Start(pos))?;
        Ok(self.pos)
    }

    /// Seek to the end and return the position.
    pub fn seek_end(&mut self) -> Result<u64> {
        self.writer.flush()?;
        self.pos = self.writer.seek(SeekFrom::End(0))?;
        Ok(self.pos)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and return the inner writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// Input stream with end-of-file positions in its errors.
pub struct IStream<R: Read + Seek> {
    reader: R,
    pos: u64,
    len: u64,
}

impl IStream<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::open(path, e))?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read + Seek> IStream<R> {
    /// Wrap a reader, rewinding it to offset 0.
    pub fn new(mut reader: R) -> Result<Self> {
        let len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        Ok(Self { reader, pos: 0, len })
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Total stream length.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    fn eof_or_io(&self, e: std::io::Error) -> Error {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(self.pos)
        } else {
            Error::Io(e)
        }
    }

    /// Seek to an absolute position inside the stream.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len {
            return Err(Error::UnexpectedEof(pos));
        }
        self.pos = self.reader.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let v = self.reader.read_u8().map_err(|e| self.eof_or_io(e))?;
        self.pos += 1;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let v = self.reader.read_u32::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.reader.read_u64::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let v = self.reader.read_i64::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 8;
        Ok(v)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let v = self.reader.read_f32::<LittleEndian>().map_err(|e| self.eof_or_io(e))?;
        self.pos += 4;
        Ok(v)
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(self.read_f32()?, self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Exactly `len` bytes; lengths running past the end fail before
    /// allocating.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        if self.pos + len > self.len {
            return Err(Error::UnexpectedEof(self.pos + len));
        }
        let mut buf = vec![0u8; len as usize];
        self.reader.read_exact(&mut buf).map_err(|e| self.eof_or_io(e))?;
        self.pos += len;
        Ok(buf)
    }

    /// `u32` length followed by the bytes.
    pub fn read_len_prefixed(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u32()?;
        self.read_bytes(len as u64)
    }

    pub fn read_string(&mut self) -> Result<String> {
        Ok(String::from_utf8(self.read_len_prefixed()?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_back_patch() {
        let mut out = OStream::new(Cursor::new(Vec::new()));
        out.write_u32(0).unwrap();
        out.write_len_prefixed(b"abc").unwrap();
        let end = out.pos();
        out.seek(0).unwrap();
        out.write_u32(0xDEADBEEF).unwrap();
        out.seek(end).unwrap();
        out.write_i64(-2).unwrap();
        let bytes = out.into_inner().unwrap().into_inner();

        let mut input = IStream::new(Cursor::new(bytes)).unwrap();
        assert_eq!(input.len(), 4 + 4 + 3 + 8);
        assert_eq!(input.read_u32().unwrap(), 0xDEADBEEF);
        assert_eq!(input.read_string().unwrap(), "abc");
        assert_eq!(input.read_i64().unwrap(), -2);
        assert!(matches!(input.read_u8(), Err(Error::UnexpectedEof(19))));
    }

    #[test]
    fn test_oversized_length_fails_early() {
        let mut input = IStream::new(Cursor::new(vec![0xFF, 0xFF, 0xFF, 0x7F])).unwrap();
        assert!(matches!(input.read_len_prefixed(), Err(Error::UnexpectedEof(_))));
    }
}
