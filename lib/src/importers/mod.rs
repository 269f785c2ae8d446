//! Source-to-cooked import pipeline.
//!
//! The actual image and scene decoding is an external concern (abstracted
//! here as the [`ImageDecoder`], [`TextureEncoder`], [`SceneLoader`] and
//! [`MeshletClusterer`] traits); this module owns everything downstream of
//! decode: cooked-value construction, the codec write, and the registry
//! update.

pub mod material_props;
pub mod mesh;
pub mod texture;

use std::{collections::BTreeMap, path::Path};

use walkdir::WalkDir;

use crate::{
    error::AssetResult,
    id::Id,
    math::{Vec2, Vec3, Vec4},
    registry::Registry,
    vimport::{save_vimport, ImportDescriptor, Importer},
};

pub use material_props::{MaterialPropertyBag, PropKey, PropValue};
pub use mesh::{
    MeshImportOptions, MeshImporter, TEXTURE_KEY, TEX_DIFFUSE, TEX_DIFFUSE_ROUGHNESS, TEX_EMISSIVE,
    TEX_GLTF_METALLIC_ROUGHNESS, TEX_LIGHTMAP, TEX_METALNESS, TEX_NORMALS, TEX_OPACITY, TEX_SPECULAR,
};
pub use texture::{TextureImportOptions, TextureImporter};

const TEXTURE_EXTENSIONS: &[&str] =
    &["exr", "hdr", "png", "jpg", "jpeg", "bmp", "tga", "gif", "psd", "pic", "ktx", "dds", "ktx2"];
const MESH_EXTENSIONS: &[&str] = &["fbx", "obj", "gltf", "dae"];

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ImporterKind {
    Texture,
    Mesh,
}

/// Writes the `.vimport` sidecar co-located with `source_path`, recording
/// the link to its cooked `output`. `source` is stored relative to the
/// asset root when the source lies under it, matching the logical path the
/// `pack` step later uses as the package entry's key.
pub(crate) fn write_import_sidecar(
    source_path: &Path,
    asset_root: &Path,
    importer: Importer,
    uid: Id,
    output_relative: &str,
) -> AssetResult<()> {
    let source = source_path
        .strip_prefix(asset_root)
        .unwrap_or(source_path)
        .to_string_lossy()
        .replace('\\', "/");
    let desc = ImportDescriptor {
        version: 1,
        importer,
        uid,
        source,
        output: output_relative.to_string(),
        params: BTreeMap::new(),
    };
    let sidecar_path = {
        let mut os = source_path.as_os_str().to_owned();
        os.push(".vimport");
        std::path::PathBuf::from(os)
    };
    save_vimport(&desc, sidecar_path)
}

pub fn dispatch_importer(path: &Path) -> Option<ImporterKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    if TEXTURE_EXTENSIONS.contains(&ext.as_str()) {
        Some(ImporterKind::Texture)
    } else if MESH_EXTENSIONS.contains(&ext.as_str()) {
        Some(ImporterKind::Mesh)
    } else {
        None
    }
}

/// A decoded image, already loaded into memory by the external decoder.
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// `Some` when the source was already a GPU-ready container (KTX/DDS/
    /// KTX2); its bytes are stored byte-for-byte rather than re-encoded.
    pub container_bytes: Option<Vec<u8>>,
    /// Raw pixels when `container_bytes` is `None`: tightly packed RGBA,
    /// `f32` per channel when `is_hdr`, `u8` per channel otherwise.
    pub pixels: Vec<u8>,
    pub is_hdr: bool,
}

/// Decodes a source image file. External collaborator; not implemented by
/// this crate.
pub trait ImageDecoder {
    fn decode(&self, source_path: &Path) -> AssetResult<DecodedImage>;
}

/// Re-encodes a decoded image into a KTX2/BasisU container. External
/// collaborator; not implemented by this crate.
pub trait TextureEncoder {
    fn encode_ktx2(&self, image: &DecodedImage, options: &TextureImportOptions) -> AssetResult<Vec<u8>>;
}

/// One mesh as loaded from a source scene, already triangulated,
/// UV-flipped, pre-transformed, tangent-spaced and normal-completed by the
/// external loader.
pub struct SourceMesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub tangents: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub material_index: Option<usize>,
}

pub struct SourceMaterial {
    pub name: String,
    pub properties: MaterialPropertyBag,
}

pub struct Scene {
    pub meshes: Vec<SourceMesh>,
    pub materials: Vec<SourceMaterial>,
}

/// Loads and normalizes a source 3D scene. External collaborator; not
/// implemented by this crate.
pub trait SceneLoader {
    fn load(&self, source_path: &Path) -> AssetResult<Scene>;
}

/// One clustered meshlet, in submesh-local vertex indices.
pub struct MeshletBuild {
    pub local_vertices: Vec<u32>,
    /// Local triangle indices (`0..local_vertices.len()`), 3 per triangle,
    /// unpadded; the importer applies the 4-byte padding rule per meshlet.
    pub local_triangles: Vec<u8>,
    pub center: Vec3,
    pub radius: f32,
}

/// Clusters a submesh's index range into bounded meshlets. External
/// collaborator; not implemented by this crate.
pub trait MeshletClusterer {
    fn build(
        &self,
        positions: &[Vec3],
        indices: &[u32],
        max_verts: u32,
        max_tris: u32,
        cone_weight: f32,
    ) -> Vec<MeshletBuild>;
}

/// Recursively imports every recognized source file under `root`.
///
/// Unrecognized extensions are skipped; a single file's failure is logged
/// and does not abort the walk.
pub fn import_or_reimport_folder(
    root: &Path,
    reimport: bool,
    registry: &mut Registry,
    texture_importer: &TextureImporter,
    mesh_importer: &MeshImporter,
) -> bool {
    let mut all_ok = true;
    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let result = match dispatch_importer(path) {
            Some(ImporterKind::Texture) => texture_importer.import(path, reimport, registry).map(|_| ()),
            Some(ImporterKind::Mesh) => mesh_importer.import(path, reimport, registry).map(|_| ()),
            None => continue,
        };
        if let Err(e) = result {
            log::error!("failed to import {}: {e}", path.display());
            all_ok = false;
        }
    }
    all_ok
}
