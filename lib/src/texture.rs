//! Cooked texture data model and its `VTEXTURE` binary codec.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::{
    binformat::{
        expect_magic, read_bool32, read_bytes_field, read_u32, write_bool32, write_bytes_field,
        write_magic, write_u32,
    },
    error::{AssetError, AssetResult},
    id::Id,
};

pub const MAGIC: &str = "VTEXTURE";

/// Fixed enumeration whose integer values mirror a canonical graphics format
/// table (`VkFormat`); the values are persisted as-is and must not be
/// renumbered.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum TextureFormat {
    #[default]
    Unknown = 0,
    Rgba8 = 37,
    Rgb8 = 23,
    Bgra8 = 44,
    Bgr8 = 30,
    Rgba16F = 97,
    Rgba32F = 109,
    Bc1 = 133,
    Bc3 = 137,
    Bc4 = 139,
    Bc5 = 141,
    Bc7 = 145,
}

impl TextureFormat {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            0 => Self::Unknown,
            37 => Self::Rgba8,
            23 => Self::Rgb8,
            44 => Self::Bgra8,
            30 => Self::Bgr8,
            97 => Self::Rgba16F,
            109 => Self::Rgba32F,
            133 => Self::Bc1,
            137 => Self::Bc3,
            139 => Self::Bc4,
            141 => Self::Bc5,
            145 => Self::Bc7,
            other => return Err(AssetError::InvalidFormat(format!("unknown texture format {other}"))),
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum TextureFileFormat {
    #[default]
    Unknown = 0,
    Ktx2 = 1,
    Png = 2,
    Jpg = 3,
    Hdr = 4,
}

impl TextureFileFormat {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            0 => Self::Unknown,
            1 => Self::Ktx2,
            2 => Self::Png,
            3 => Self::Jpg,
            4 => Self::Hdr,
            other => {
                return Err(AssetError::InvalidFormat(format!("unknown texture file format {other}")))
            }
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum TextureDimension {
    #[default]
    D1 = 1,
    D2 = 2,
    D3 = 3,
}

impl TextureDimension {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            1 => Self::D1,
            2 => Self::D2,
            3 => Self::D3,
            other => return Err(AssetError::InvalidFormat(format!("unknown texture dimension {other}"))),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Texture {
    pub id: Id,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub is_cubemap: bool,
    pub generate_mipmaps: bool,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub file_format: TextureFileFormat,
    pub data: Vec<u8>,
}

impl Default for Texture {
    fn default() -> Self {
        Self {
            id: Id::default(),
            width: 0,
            height: 0,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            is_cubemap: false,
            generate_mipmaps: false,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8,
            file_format: TextureFileFormat::Png,
            data: Vec::new(),
        }
    }
}

impl Texture {
    /// Checks the invariants that a cooked texture must satisfy.
    pub fn validate(&self) -> AssetResult<()> {
        if self.is_cubemap && self.array_layers % 6 != 0 {
            return Err(AssetError::InvalidFormat(
                "cubemap texture array_layers must be a multiple of 6".into(),
            ));
        }
        if matches!(self.dimension, TextureDimension::D1) && (self.height != 1 || self.depth != 1) {
            return Err(AssetError::InvalidFormat(
                "1D texture must have height == 1 and depth == 1".into(),
            ));
        }
        if self.data.is_empty() {
            return Err(AssetError::InvalidFormat("cooked texture data must not be empty".into()));
        }
        Ok(())
    }
}

pub fn save_texture<P: AsRef<Path>>(texture: &Texture, path: P) -> AssetResult<()> {
    texture.validate()?;
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_texture(texture, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn write_texture<W: Write>(texture: &Texture, w: &mut W) -> AssetResult<()> {
    write_magic(w, MAGIC)?;
    w.write_all(texture.id.as_bytes())?;
    write_u32(w, texture.width)?;
    write_u32(w, texture.height)?;
    write_u32(w, texture.depth)?;
    write_u32(w, texture.mip_levels)?;
    write_u32(w, texture.array_layers)?;
    write_bool32(w, texture.is_cubemap)?;
    write_bool32(w, texture.generate_mipmaps)?;
    write_u32(w, texture.dimension as u32)?;
    write_u32(w, texture.format as u32)?;
    write_u32(w, texture.file_format as u32)?;
    write_bytes_field(w, &texture.data)?;
    Ok(())
}

pub fn load_texture<P: AsRef<Path>>(path: P) -> AssetResult<Texture> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.display().to_string())
        } else {
            AssetError::IoError(e)
        }
    })?;
    let mut r = BufReader::new(file);
    read_texture(&mut r)
}

/// Reads a cooked texture directly from an in-memory buffer, as when it has
/// just been produced by an importer and not yet touched disk.
pub fn load_texture_from_memory(data: &[u8]) -> AssetResult<Texture> {
    read_texture(&mut std::io::Cursor::new(data))
}

pub fn read_texture<R: Read>(r: &mut R) -> AssetResult<Texture> {
    expect_magic(r, MAGIC)?;
    let mut id_bytes = [0u8; 16];
    r.read_exact(&mut id_bytes)?;
    let texture = Texture {
        id: Id::from_bytes(id_bytes),
        width: read_u32(r)?,
        height: read_u32(r)?,
        depth: read_u32(r)?,
        mip_levels: read_u32(r)?,
        array_layers: read_u32(r)?,
        is_cubemap: read_bool32(r)?,
        generate_mipmaps: read_bool32(r)?,
        dimension: TextureDimension::from_u32(read_u32(r)?)?,
        format: TextureFormat::from_u32(read_u32(r)?)?,
        file_format: TextureFileFormat::from_u32(read_u32(r)?)?,
        data: read_bytes_field(r)?,
    };
    texture.validate()?;
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample() -> Texture {
        Texture {
            id: crate::id::id_from_path("imported/texture/awesome"),
            width: 4,
            height: 4,
            format: TextureFormat::Rgba8,
            file_format: TextureFileFormat::Png,
            data: vec![0xFFu8; 64],
            ..Default::default()
        }
    }

    #[test]
    fn round_trips_through_memory() {
        let tex = sample();
        let mut buf = Vec::new();
        write_texture(&tex, &mut buf).unwrap();
        let loaded = read_texture(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.width, 4);
        assert_eq!(loaded.height, 4);
        assert_eq!(loaded.data.len(), 64);
        assert_eq!(loaded.format, TextureFormat::Rgba8);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 64];
        buf[0..4].copy_from_slice(b"NOPE");
        assert!(matches!(read_texture(&mut Cursor::new(buf)), Err(AssetError::InvalidFormat(_))));
    }

    #[test]
    fn cubemap_requires_multiple_of_six_layers() {
        let mut tex = sample();
        tex.is_cubemap = true;
        tex.array_layers = 4;
        assert!(tex.validate().is_err());
        tex.array_layers = 6;
        assert!(tex.validate().is_ok());
    }

    #[test]
    fn round_trip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/awesome.vtexture");
        let tex = sample();
        save_texture(&tex, &path).unwrap();
        let loaded = load_texture(&path).unwrap();
        assert_eq!(loaded.width, tex.width);
        assert_eq!(loaded.data, tex.data);
    }
}
