//! Reads source images for the texture importer.
//!
//! GPU-ready containers (`.dds`, `.ktx`, `.ktx2`) are never re-encoded: only
//! their fixed header is read (to recover `width`/`height`) and the whole
//! file is carried through as `container_bytes`, matching the "stored
//! byte-for-byte" rule in the cooked texture format. Everything else goes
//! through the `image` crate to a plain RGBA buffer.

use std::{fs, path::Path};

use vasset::{
    error::{AssetError, AssetResult},
    importers::{DecodedImage, ImageDecoder},
};

pub struct StdImageDecoder;

impl ImageDecoder for StdImageDecoder {
    fn decode(&self, source_path: &Path) -> AssetResult<DecodedImage> {
        let ext = source_path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "dds" => decode_container(source_path, b"DDS ", 16, 12),
            "ktx" => decode_container(source_path, b"\xABKTX 11\xBB\r\n\x1A\n", 36, 40),
            "ktx2" => decode_container(source_path, b"\xABKTX 20\xBB\r\n\x1A\n", 20, 24),
            "hdr" => decode_hdr(source_path),
            "exr" | "psd" | "pic" => Err(AssetError::ImportFailed(format!(
                "no decoder available for '{ext}' sources (external capability not linked)"
            ))),
            _ => decode_raster(source_path),
        }
    }
}

fn decode_container(
    path: &Path,
    magic: &[u8],
    width_offset: usize,
    height_offset: usize,
) -> AssetResult<DecodedImage> {
    let bytes = fs::read(path)?;
    if bytes.len() < height_offset + 4 || !bytes.starts_with(magic) {
        return Err(AssetError::InvalidFormat(format!("{}: bad container header", path.display())));
    }
    let width = u32::from_le_bytes(bytes[width_offset..width_offset + 4].try_into().unwrap());
    let height = u32::from_le_bytes(bytes[height_offset..height_offset + 4].try_into().unwrap());
    Ok(DecodedImage { width, height, container_bytes: Some(bytes), pixels: Vec::new(), is_hdr: false })
}

fn decode_raster(path: &Path) -> AssetResult<DecodedImage> {
    let img = image::open(path)
        .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", path.display())))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(DecodedImage { width, height, container_bytes: None, pixels: rgba.into_raw(), is_hdr: false })
}

fn decode_hdr(path: &Path) -> AssetResult<DecodedImage> {
    let img = image::open(path)
        .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", path.display())))?;
    let rgba = img.to_rgba32f();
    let (width, height) = rgba.dimensions();
    let mut pixels = Vec::with_capacity(rgba.len() * 4);
    for channel in rgba.into_raw() {
        pixels.extend_from_slice(&channel.to_le_bytes());
    }
    Ok(DecodedImage { width, height, container_bytes: None, pixels, is_hdr: true })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_raster_to_rgba8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solid.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255])).save(&path).unwrap();

        let decoded = StdImageDecoder.decode(&path).unwrap();
        assert_eq!(decoded.width, 3);
        assert_eq!(decoded.height, 2);
        assert!(!decoded.is_hdr);
        assert!(decoded.container_bytes.is_none());
        assert_eq!(decoded.pixels.len(), 3 * 2 * 4);
        assert_eq!(&decoded.pixels[0..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn dds_container_is_carried_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.dds");
        let mut bytes = vec![0u8; 128];
        bytes[0..4].copy_from_slice(b"DDS ");
        bytes[16..20].copy_from_slice(&64u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&32u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let decoded = StdImageDecoder.decode(&path).unwrap();
        assert_eq!(decoded.width, 64);
        assert_eq!(decoded.height, 32);
        assert_eq!(decoded.container_bytes.as_deref(), Some(bytes.as_slice()));
        assert!(decoded.pixels.is_empty());
    }

    #[test]
    fn dds_with_bad_magic_is_invalid_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.dds");
        fs::write(&path, vec![0u8; 128]).unwrap();
        assert!(matches!(StdImageDecoder.decode(&path), Err(AssetError::InvalidFormat(_))));
    }

    #[test]
    fn unsupported_extensions_fail_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.exr");
        fs::write(&path, b"not a real exr").unwrap();
        assert!(matches!(StdImageDecoder.decode(&path), Err(AssetError::ImportFailed(_))));
    }
}
