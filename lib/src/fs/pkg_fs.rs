//! A read-only filesystem view over an opened [`crate::pkg::PkgReadOnly`].

use crate::{
    error::AssetError,
    fs::{FileSystem, FsError, FsResult, MemoryFile, OpenMode},
    pkg::PkgReadOnly,
};

pub struct PackageFileSystem {
    pkg: PkgReadOnly,
}

impl PackageFileSystem {
    pub fn new(pkg: PkgReadOnly) -> Self { Self { pkg } }
}

impl FileSystem for PackageFileSystem {
    fn exists(&self, path: &str) -> bool { self.pkg.exists(path) }

    fn is_file(&self, path: &str) -> bool { self.pkg.exists(path) }

    fn is_directory(&self, _path: &str) -> bool { false }

    fn open(&self, path: &str, mode: OpenMode) -> FsResult<MemoryFile> {
        if mode != OpenMode::Read {
            return Err(FsError::NotSupported("package mounts are read-only".into()));
        }
        match self.pkg.read_file(path) {
            Ok(bytes) => Ok(MemoryFile::new(bytes)),
            Err(AssetError::NotFound(p)) => Err(FsError::NotFound(p)),
            Err(other) => Err(FsError::IoError(std::io::Error::new(std::io::ErrorKind::Other, other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::{open_pkg, write_pkg, WriteItem};

    #[test]
    fn opens_existing_files_and_rejects_write() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_path = dir.path().join("out.pkg");
        let items =
            vec![WriteItem { logical_path: "a.txt".into(), bytes: b"hello", allow_compress: true }];
        write_pkg(&pkg_path, &items, 3).unwrap();

        let fs = PackageFileSystem::new(open_pkg(&pkg_path).unwrap());
        assert!(fs.exists("a.txt"));
        assert!(!fs.is_directory("a.txt"));
        let mut file = fs.open("a.txt", OpenMode::Read).unwrap();
        assert_eq!(file.read_all_bytes(), b"hello");
        assert_eq!(file.write(b"nope").unwrap(), 0);

        assert!(matches!(fs.open("missing.txt", OpenMode::Read), Err(FsError::NotFound(_))));
    }
}
