//! Editor-only filesystem wrapper that resolves a source path through its
//! `.vimport` descriptor to the cooked output, when one exists.

use crate::{
    fs::{FileSystem, FsError, FsResult, MemoryFile, OpenMode},
    vimport::parse_vimport,
};

pub struct EditorRemapFileSystem<F: FileSystem> {
    base: F,
}

impl<F: FileSystem> EditorRemapFileSystem<F> {
    pub fn new(base: F) -> Self { Self { base } }

    fn vimport_path(path: &str) -> String { format!("{path}.vimport") }

    fn resolve(&self, path: &str) -> Option<Result<String, ()>> {
        let vimport_path = Self::vimport_path(path);
        if !self.base.exists(&vimport_path) {
            return None;
        }
        let text = match self.base.open(&vimport_path, OpenMode::Read) {
            Ok(file) => String::from_utf8_lossy(file.read_all_bytes()).into_owned(),
            Err(_) => return Some(Err(())),
        };
        match parse_vimport(&text) {
            Ok(desc) => Some(Ok(desc.output)),
            Err(_) => Some(Err(())),
        }
    }
}

impl<F: FileSystem> FileSystem for EditorRemapFileSystem<F> {
    fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Some(Ok(output)) => self.base.exists(&output),
            Some(Err(())) => false,
            None => self.base.exists(path),
        }
    }

    fn is_file(&self, path: &str) -> bool {
        match self.resolve(path) {
            Some(Ok(output)) => self.base.is_file(&output),
            Some(Err(())) => false,
            None => self.base.is_file(path),
        }
    }

    fn is_directory(&self, path: &str) -> bool { self.base.is_directory(path) }

    fn open(&self, path: &str, mode: OpenMode) -> FsResult<MemoryFile> {
        match self.resolve(path) {
            Some(Ok(output)) => {
                if !self.base.exists(&output) {
                    return Err(FsError::NotFound(output));
                }
                self.base.open(&output, mode)
            }
            Some(Err(())) => Err(FsError::InvalidPath(path.to_string())),
            None => self.base.open(path, mode),
        }
    }
}
