//! Read-only virtual filesystem abstractions mounted over a [`crate::pkg`]
//! package, optionally wrapped by the editor's import-aware remap layer.

pub mod editor_fs;
pub mod pkg_fs;

use std::io::{self, Read, Seek, SeekFrom};

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("not supported: {0}")]
    NotSupported(String),
    #[error("io error: {0}")]
    IoError(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum OpenMode {
    Read,
}

/// An open, in-memory file handle. Backed by an owned byte buffer; `write`
/// is a no-op since every mount in this crate is read-only.
pub struct MemoryFile {
    data: Vec<u8>,
    pos: u64,
}

impl MemoryFile {
    pub fn new(data: Vec<u8>) -> Self { Self { data, pos: 0 } }

    pub fn size(&self) -> u64 { self.data.len() as u64 }

    pub fn tell(&self) -> u64 { self.pos }

    pub fn read_all_bytes(&self) -> &[u8] { &self.data }

    pub fn write(&mut self, _buf: &[u8]) -> io::Result<usize> { Ok(0) }
}

impl Read for MemoryFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let start = self.pos as usize;
        if start >= self.data.len() {
            return Ok(0);
        }
        let n = (buf.len()).min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.data.len() as i64 + p,
            SeekFrom::Current(p) => self.pos as i64 + p,
        };
        if new_pos < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start of file"));
        }
        self.pos = new_pos as u64;
        Ok(self.pos)
    }
}

/// A mountable read-only filesystem view.
pub trait FileSystem {
    fn exists(&self, path: &str) -> bool;
    fn is_file(&self, path: &str) -> bool;
    fn is_directory(&self, path: &str) -> bool;
    fn open(&self, path: &str, mode: OpenMode) -> FsResult<MemoryFile>;
}
