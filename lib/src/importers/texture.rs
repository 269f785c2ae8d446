//! Source image → cooked `VTEXTURE` import pipeline.

use std::path::Path;

use super::{write_import_sidecar, DecodedImage, ImageDecoder, TextureEncoder};
use crate::{
    error::{AssetError, AssetResult},
    id::{self, Id},
    registry::{AssetKind, Registry},
    texture::{save_texture, Texture, TextureDimension, TextureFileFormat, TextureFormat},
    vimport::Importer,
};

const EXTENSION: &str = "vtexture";

/// What a non-passthrough (decoded-pixel) source is transcoded to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TextureImportTarget {
    /// Re-encode into a BasisU-compressed KTX2 container via the external
    /// [`TextureEncoder`].
    Ktx2,
    /// Keep the decoder's raw pixel buffer as-is; no transcoding.
    Passthrough,
}

#[derive(Clone, Debug)]
pub struct TextureImportOptions {
    pub generate_mipmaps: bool,
    pub flip_y: bool,
    pub target_file_format: TextureImportTarget,
    pub uastc: bool,
    pub no_sse: bool,
    /// 1..255.
    pub quality_level: u8,
    /// 0..4.
    pub compression_level: u8,
    /// 0 means let the encoder pick a thread count.
    pub basis_u_thread_count: u32,
}

impl Default for TextureImportOptions {
    fn default() -> Self {
        Self {
            generate_mipmaps: true,
            flip_y: false,
            target_file_format: TextureImportTarget::Passthrough,
            uastc: false,
            no_sse: false,
            quality_level: 128,
            compression_level: 2,
            basis_u_thread_count: 0,
        }
    }
}

/// Imports source images into cooked `VTEXTURE` assets, delegating actual
/// decode and KTX2 transcode to external collaborators.
pub struct TextureImporter<'a> {
    decoder: &'a dyn ImageDecoder,
    encoder: &'a dyn TextureEncoder,
    options: TextureImportOptions,
}

impl<'a> TextureImporter<'a> {
    pub fn new(
        decoder: &'a dyn ImageDecoder,
        encoder: &'a dyn TextureEncoder,
        options: TextureImportOptions,
    ) -> Self {
        Self { decoder, encoder, options }
    }

    /// Imports `source_path`, returning the id it was (or already is)
    /// registered under. A cache hit (already registered, `reimport ==
    /// false`) is a no-op that still returns the existing id.
    pub fn import(&self, source_path: &Path, reimport: bool, registry: &mut Registry) -> AssetResult<Id> {
        let stem = source_path.file_stem().and_then(|s| s.to_str()).unwrap_or("texture");
        let relative = registry.imported_path(AssetKind::Texture, stem, true);
        let id = id::id_from_path(&relative);

        if !reimport && registry.lookup(id).is_some() {
            log::debug!("texture {relative} already imported, skipping");
            return Ok(id);
        }

        let decoded = self
            .decoder
            .decode(source_path)
            .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", source_path.display())))?;

        let (data, format, file_format) = match decoded.container_bytes {
            Some(container_bytes) => {
                let ext = source_path
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_ascii_lowercase();
                let file_format = if ext == "ktx2" { TextureFileFormat::Ktx2 } else { TextureFileFormat::Unknown };
                (container_bytes, TextureFormat::Unknown, file_format)
            }
            None => match self.options.target_file_format {
                TextureImportTarget::Ktx2 => {
                    let bytes = self
                        .encoder
                        .encode_ktx2(&decoded, &self.options)
                        .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", source_path.display())))?;
                    (bytes, TextureFormat::Unknown, TextureFileFormat::Ktx2)
                }
                TextureImportTarget::Passthrough => {
                    let file_format = if decoded.is_hdr { TextureFileFormat::Hdr } else { TextureFileFormat::Png };
                    let format = if decoded.is_hdr { TextureFormat::Rgba32F } else { TextureFormat::Rgba8 };
                    (decoded.pixels, format, file_format)
                }
            },
        };

        let texture = Texture {
            id,
            width: decoded.width,
            height: decoded.height,
            depth: 1,
            mip_levels: 1,
            array_layers: 1,
            is_cubemap: false,
            generate_mipmaps: self.options.generate_mipmaps,
            dimension: TextureDimension::D2,
            format,
            file_format,
            data,
        };

        let relative_file = format!("{relative}.{EXTENSION}");
        let disk_path = registry.asset_root().join(&relative_file);
        save_texture(&texture, &disk_path)?;
        registry.register(id, relative_file.clone(), AssetKind::Texture)?;
        write_import_sidecar(source_path, registry.asset_root(), Importer::Texture, id, &relative_file)?;
        log::debug!("imported texture {} -> {relative}", source_path.display());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    struct FakeDecoder {
        hdr: bool,
        container: Option<Vec<u8>>,
        calls: Cell<u32>,
    }

    impl ImageDecoder for FakeDecoder {
        fn decode(&self, _source_path: &Path) -> AssetResult<DecodedImage> {
            self.calls.set(self.calls.get() + 1);
            Ok(DecodedImage {
                width: 4,
                height: 4,
                container_bytes: self.container.clone(),
                pixels: vec![0xFFu8; 64],
                is_hdr: self.hdr,
            })
        }
    }

    struct FakeEncoder;

    impl TextureEncoder for FakeEncoder {
        fn encode_ktx2(&self, image: &DecodedImage, _options: &TextureImportOptions) -> AssetResult<Vec<u8>> {
            let mut out = b"KTX2_FAKE".to_vec();
            out.extend_from_slice(&image.pixels);
            Ok(out)
        }
    }

    fn registry_at(dir: &Path) -> Registry {
        let mut reg = Registry::new();
        reg.set_asset_root(dir);
        reg
    }

    #[test]
    fn passthrough_decodes_and_registers() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let decoder = FakeDecoder { hdr: false, container: None, calls: Cell::new(0) };
        let encoder = FakeEncoder;
        let importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

        let source = dir.path().join("textures/rock.png");
        let id = importer.import(&source, false, &mut reg).unwrap();

        let (kind, path) = reg.lookup(id).unwrap();
        assert_eq!(kind, AssetKind::Texture);
        assert!(path.ends_with(".vtexture"));
        assert!(dir.path().join(path).exists());
    }

    #[test]
    fn cache_hit_skips_decode() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let decoder = FakeDecoder { hdr: false, container: None, calls: Cell::new(0) };
        let encoder = FakeEncoder;
        let importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

        let source = dir.path().join("textures/rock.png");
        importer.import(&source, false, &mut reg).unwrap();
        assert_eq!(decoder.calls.get(), 1);
        importer.import(&source, false, &mut reg).unwrap();
        assert_eq!(decoder.calls.get(), 1, "second import without reimport must not decode again");
    }

    #[test]
    fn reimport_forces_redecode() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let decoder = FakeDecoder { hdr: false, container: None, calls: Cell::new(0) };
        let encoder = FakeEncoder;
        let importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

        let source = dir.path().join("textures/rock.png");
        importer.import(&source, false, &mut reg).unwrap();
        importer.import(&source, true, &mut reg).unwrap();
        assert_eq!(decoder.calls.get(), 2);
    }

    #[test]
    fn ktx2_target_invokes_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let decoder = FakeDecoder { hdr: false, container: None, calls: Cell::new(0) };
        let encoder = FakeEncoder;
        let mut options = TextureImportOptions::default();
        options.target_file_format = TextureImportTarget::Ktx2;
        let importer = TextureImporter::new(&decoder, &encoder, options);

        let source = dir.path().join("textures/rock.png");
        let id = importer.import(&source, false, &mut reg).unwrap();
        let (_, path) = reg.lookup(id).unwrap();
        let bytes = std::fs::read(dir.path().join(path)).unwrap();
        let loaded = crate::texture::load_texture_from_memory(&bytes).unwrap();
        assert_eq!(loaded.file_format, TextureFileFormat::Ktx2);
    }

    #[test]
    fn container_source_is_stored_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let container_bytes = vec![0xABu8; 128];
        let decoder = FakeDecoder { hdr: false, container: Some(container_bytes.clone()), calls: Cell::new(0) };
        let encoder = FakeEncoder;
        let importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

        let source = dir.path().join("textures/baked.ktx2");
        let id = importer.import(&source, false, &mut reg).unwrap();
        let (_, path) = reg.lookup(id).unwrap();
        let bytes = std::fs::read(dir.path().join(path)).unwrap();
        let loaded = crate::texture::load_texture_from_memory(&bytes).unwrap();
        assert_eq!(loaded.data, container_bytes);
        assert_eq!(loaded.file_format, TextureFileFormat::Ktx2);
    }
}
