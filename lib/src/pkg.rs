//! The PKG package format: a random-access archive of `{logical path ->
//! bytes}` with per-entry zstd compression and a hash-bucketed lookup index.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{Read, Seek, SeekFrom, Write},
    path::Path,
};

use crate::error::{AssetError, AssetResult};

const MAGIC: &[u8; 4] = b"VPK\0";
const VERSION: u32 = 1;
const ENTRY_SIZE: u64 = 48;
/// magic(4) + version(4) + flags(4) + fileCount(4) + 5×u64(40) = 56 bytes.
const HEADER_SIZE: usize = 56;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Zstd = 1,
}

impl Compression {
    fn from_u8(v: u8) -> AssetResult<Self> {
        match v {
            0 => Ok(Self::None),
            1 => Ok(Self::Zstd),
            other => Err(AssetError::NotSupported(format!("unknown compression code {other}"))),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    path_hash: u64,
    path_offset: u32,
    path_size: u32,
    data_offset: u64,
    packed_size: u64,
    raw_size: u64,
    compression: Compression,
}

/// A write item: the logical path, its bytes, and whether the writer is
/// allowed to compress it.
pub struct WriteItem<'a> {
    pub logical_path: String,
    pub bytes: &'a [u8],
    pub allow_compress: bool,
}

fn hash64(path: &str) -> u64 { xxhash_rust::xxh3::xxh3_64(path.as_bytes()) }

fn already_compressed(path: &str, bytes: &[u8]) -> bool {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".ktx2") || lower.ends_with(".dds") || lower.ends_with(".jpg") || lower.ends_with(".jpeg")
    {
        return true;
    }
    is_vmesh_already_compressed(bytes)
}

fn is_vmesh_already_compressed(bytes: &[u8]) -> bool {
    if bytes.len() < 24 {
        return false;
    }
    if &bytes[0..5] != b"VMESH" {
        return false;
    }
    let flags = u32::from_le_bytes(bytes[20..24].try_into().unwrap());
    flags & 1 == 1
}

/// Writes a new `.pkg` file. Entries keep the order they were given in; the
/// writer interleaves each item's data immediately after the previous one,
/// then appends the string table, then the entry index, then patches the
/// header.
pub fn write_pkg<P: AsRef<Path>>(out_path: P, items: &[WriteItem], zstd_level: i32) -> AssetResult<()> {
    let out_path = out_path.as_ref();
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(out_path)?;

    // Placeholder header; patched once final offsets/sizes are known.
    file.write_all(&[0u8; HEADER_SIZE])?;
    let data_offset = file.stream_position()?;

    let mut entries = Vec::with_capacity(items.len());
    let mut string_table = Vec::new();

    for item in items {
        let compress = item.allow_compress && !item.bytes.is_empty() && !already_compressed(&item.logical_path, item.bytes);
        let (packed, compression, raw_size) = if compress {
            let packed = zstd::encode_all(item.bytes, zstd_level).map_err(AssetError::IoError)?;
            (packed, Compression::Zstd, item.bytes.len() as u64)
        } else {
            (item.bytes.to_vec(), Compression::None, item.bytes.len() as u64)
        };

        let offset = file.stream_position()?;
        file.write_all(&packed)?;

        let path_offset = string_table.len() as u32;
        let path_bytes = item.logical_path.as_bytes();
        string_table.extend_from_slice(path_bytes);
        string_table.push(0);

        entries.push(Entry {
            path_hash: hash64(&item.logical_path),
            path_offset,
            path_size: path_bytes.len() as u32,
            data_offset: offset,
            packed_size: packed.len() as u64,
            raw_size,
            compression,
        });
    }

    let string_offset = file.stream_position()?;
    file.write_all(&string_table)?;

    let index_offset = file.stream_position()?;
    for entry in &entries {
        write_entry(&mut file, entry)?;
    }
    let index_size = entries.len() as u64 * ENTRY_SIZE;

    file.seek(SeekFrom::Start(0))?;
    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&VERSION.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // flags
    header.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    header.extend_from_slice(&index_offset.to_le_bytes());
    header.extend_from_slice(&index_size.to_le_bytes());
    header.extend_from_slice(&string_offset.to_le_bytes());
    header.extend_from_slice(&(string_table.len() as u64).to_le_bytes());
    header.extend_from_slice(&data_offset.to_le_bytes());
    file.write_all(&header)?;
    file.flush()?;
    Ok(())
}

fn write_entry<W: Write>(w: &mut W, e: &Entry) -> AssetResult<()> {
    w.write_all(&e.path_hash.to_le_bytes())?;
    w.write_all(&e.path_offset.to_le_bytes())?;
    w.write_all(&e.path_size.to_le_bytes())?;
    w.write_all(&e.data_offset.to_le_bytes())?;
    w.write_all(&e.packed_size.to_le_bytes())?;
    w.write_all(&e.raw_size.to_le_bytes())?;
    w.write_all(&[e.compression as u8])?;
    w.write_all(&[0u8; 7])?;
    Ok(())
}

fn read_entry<R: Read>(r: &mut R) -> AssetResult<Entry> {
    let mut buf8 = [0u8; 8];
    let mut buf4 = [0u8; 4];
    r.read_exact(&mut buf8)?;
    let path_hash = u64::from_le_bytes(buf8);
    r.read_exact(&mut buf4)?;
    let path_offset = u32::from_le_bytes(buf4);
    r.read_exact(&mut buf4)?;
    let path_size = u32::from_le_bytes(buf4);
    r.read_exact(&mut buf8)?;
    let data_offset = u64::from_le_bytes(buf8);
    r.read_exact(&mut buf8)?;
    let packed_size = u64::from_le_bytes(buf8);
    r.read_exact(&mut buf8)?;
    let raw_size = u64::from_le_bytes(buf8);
    let mut comp_buf = [0u8; 8];
    r.read_exact(&mut comp_buf)?;
    let compression = Compression::from_u8(comp_buf[0])?;
    Ok(Entry { path_hash, path_offset, path_size, data_offset, packed_size, raw_size, compression })
}

/// An opened, read-only package. Immutable once constructed; each
/// `read_file` call opens its own handle to the backing file.
pub struct PkgReadOnly {
    path: std::path::PathBuf,
    entries: Vec<Entry>,
    string_table: Vec<u8>,
    buckets: HashMap<u64, Vec<u32>>,
}

impl PkgReadOnly {
    pub fn file_count(&self) -> usize { self.entries.len() }

    fn entry_path(&self, entry: &Entry) -> &[u8] {
        &self.string_table[entry.path_offset as usize..(entry.path_offset + entry.path_size) as usize]
    }

    /// Returns true if an entry with this exact logical path exists.
    pub fn exists(&self, logical_path: &str) -> bool { self.find_entry(logical_path).is_some() }

    fn find_entry(&self, logical_path: &str) -> Option<&Entry> {
        let stripped = logical_path.strip_prefix('/').unwrap_or(logical_path);
        let hash = hash64(stripped);
        let bucket = self.buckets.get(&hash)?;
        bucket.iter().map(|&i| &self.entries[i as usize]).find(|e| self.entry_path(e) == stripped.as_bytes())
    }

    pub fn read_file(&self, logical_path: &str) -> AssetResult<Vec<u8>> {
        let entry = self
            .find_entry(logical_path)
            .ok_or_else(|| AssetError::NotFound(logical_path.to_string()))?;
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.data_offset))?;
        let mut packed = vec![0u8; entry.packed_size as usize];
        file.read_exact(&mut packed).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                AssetError::InvalidFormat("packedSize extends past end of file".into())
            } else {
                AssetError::IoError(e)
            }
        })?;
        match entry.compression {
            Compression::None => Ok(packed),
            Compression::Zstd => {
                let decompressed = zstd::decode_all(&packed[..]).map_err(AssetError::IoError)?;
                if decompressed.len() as u64 != entry.raw_size {
                    return Err(AssetError::InvalidFormat(
                        "decompressed size does not match rawSize".into(),
                    ));
                }
                Ok(decompressed)
            }
        }
    }
}

pub fn open_pkg<P: AsRef<Path>>(path: P) -> AssetResult<PkgReadOnly> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.display().to_string())
        } else {
            AssetError::IoError(e)
        }
    })?;

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(AssetError::InvalidFormat("bad PKG magic".into()));
    }
    let version = read_u32(&mut file)?;
    if version != VERSION {
        return Err(AssetError::InvalidFormat(format!("unsupported PKG version {version}")));
    }
    let _flags = read_u32(&mut file)?;
    let file_count = read_u32(&mut file)?;
    let index_offset = read_u64(&mut file)?;
    let index_size = read_u64(&mut file)?;
    let string_offset = read_u64(&mut file)?;
    let string_size = read_u64(&mut file)?;
    let _data_offset = read_u64(&mut file)?;

    if index_size != file_count as u64 * ENTRY_SIZE {
        return Err(AssetError::InvalidFormat("PKG indexSize does not match fileCount".into()));
    }

    file.seek(SeekFrom::Start(index_offset))?;
    let mut entries = Vec::with_capacity(file_count as usize);
    for _ in 0..file_count {
        entries.push(read_entry(&mut file)?);
    }

    file.seek(SeekFrom::Start(string_offset))?;
    let mut string_table = vec![0u8; string_size as usize];
    file.read_exact(&mut string_table)?;

    let mut buckets: HashMap<u64, Vec<u32>> = HashMap::new();
    for (i, entry) in entries.iter().enumerate() {
        buckets.entry(entry.path_hash).or_default().push(i as u32);
    }

    Ok(PkgReadOnly { path: path.to_path_buf(), entries, string_table, buckets })
}

fn read_u32<R: Read>(r: &mut R) -> AssetResult<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> AssetResult<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_items() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_path = dir.path().join("out.pkg");
        let items = vec![
            WriteItem { logical_path: "res://sprites/a.png".into(), bytes: &[1, 2, 3, 4], allow_compress: true },
            WriteItem {
                logical_path: "res://meshes/b.vmesh".into(),
                bytes: &[0u8; 256],
                allow_compress: true,
            },
        ];
        write_pkg(&pkg_path, &items, 3).unwrap();

        let pkg = open_pkg(&pkg_path).unwrap();
        assert_eq!(pkg.file_count(), 2);
        assert_eq!(pkg.read_file("res://sprites/a.png").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(pkg.read_file("/res://sprites/a.png").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(pkg.read_file("res://meshes/b.vmesh").unwrap(), vec![0u8; 256]);
    }

    #[test]
    fn png_like_extension_stored_uncompressed() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_path = dir.path().join("out.pkg");
        let bytes = vec![0u8; 64];
        let items =
            vec![WriteItem { logical_path: "a.jpg".into(), bytes: &bytes, allow_compress: true }];
        write_pkg(&pkg_path, &items, 3).unwrap();
        let pkg = open_pkg(&pkg_path).unwrap();
        let entry = pkg.find_entry("a.jpg").unwrap();
        assert_eq!(entry.compression, Compression::None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_path = dir.path().join("out.pkg");
        write_pkg(&pkg_path, &[], 0).unwrap();
        let pkg = open_pkg(&pkg_path).unwrap();
        assert!(matches!(pkg.read_file("nope"), Err(AssetError::NotFound(_))));
    }
}
