//! Source scene → cooked `VMESH` (and, per referenced material, `VMATERIAL`)
//! import pipeline.

use std::path::Path;

use super::{write_import_sidecar, MaterialPropertyBag, MeshletClusterer, SceneLoader, TextureImporter};
use crate::{
    error::{AssetError, AssetResult},
    id::{self, Id},
    material::{AlphaMode, BlendMode, Material, MaterialType, PbrMetallicRoughness, TextureSlots},
    math::Color4,
    mesh::{padded_triangle_bytes, save_mesh, Mesh, Meshlet, MeshletGroup, SubMesh, VertexStreams},
    registry::{AssetKind, Registry},
    vimport::Importer,
};

const MESH_EXTENSION: &str = "vmesh";
const MATERIAL_EXTENSION: &str = "vmaterial";

const MESHLET_MAX_VERTS: u32 = 64;
const MESHLET_MAX_TRIS: u32 = 124;
const MESHLET_CONE_WEIGHT: f32 = 0.5;

/// Reserved property key for texture-channel filenames, mirroring the source
/// material system's own texture-slot property (keyed by `(key, semantic,
/// textureIndex)` exactly like its other properties).
///
/// Public so that `SceneLoader` implementations outside this crate can
/// populate texture-channel properties that `process_material` will find.
pub const TEXTURE_KEY: &str = "$tex.file";

pub const TEX_DIFFUSE: u32 = 1;
pub const TEX_OPACITY: u32 = 2;
pub const TEX_METALNESS: u32 = 3;
pub const TEX_DIFFUSE_ROUGHNESS: u32 = 4;
pub const TEX_SPECULAR: u32 = 5;
pub const TEX_NORMALS: u32 = 6;
pub const TEX_LIGHTMAP: u32 = 7;
pub const TEX_EMISSIVE: u32 = 8;
pub const TEX_GLTF_METALLIC_ROUGHNESS: u32 = 9;

#[derive(Clone, Debug)]
pub struct MeshImportOptions {
    pub generate_meshlets: bool,
    pub zstd_level: i32,
}

impl Default for MeshImportOptions {
    fn default() -> Self { Self { generate_meshlets: true, zstd_level: 3 } }
}

/// Imports source scenes into cooked `VMESH` assets, recursively importing
/// any referenced materials (and, through those, textures).
pub struct MeshImporter<'a> {
    scene_loader: &'a dyn SceneLoader,
    clusterer: &'a dyn MeshletClusterer,
    texture_importer: TextureImporter<'a>,
    options: MeshImportOptions,
}

impl<'a> MeshImporter<'a> {
    pub fn new(
        scene_loader: &'a dyn SceneLoader,
        clusterer: &'a dyn MeshletClusterer,
        texture_importer: TextureImporter<'a>,
        options: MeshImportOptions,
    ) -> Self {
        Self { scene_loader, clusterer, texture_importer, options }
    }

    pub fn import(&self, source_path: &Path, reimport: bool, registry: &mut Registry) -> AssetResult<Id> {
        let stem = source_path.file_stem().and_then(|s| s.to_str()).unwrap_or("mesh");
        let relative = registry.imported_path(AssetKind::Mesh, stem, true);
        let id = id::id_from_path(&relative);

        if !reimport && registry.lookup(id).is_some() {
            log::debug!("mesh {relative} already imported, skipping");
            return Ok(id);
        }

        let scene = self
            .scene_loader
            .load(source_path)
            .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", source_path.display())))?;

        let mesh_dir = source_path.parent().unwrap_or_else(|| Path::new(""));

        let mut materials = Vec::with_capacity(scene.materials.len());
        for (index, source_material) in scene.materials.into_iter().enumerate() {
            let mat_name = format!(
                "{stem}_{}",
                if source_material.name.is_empty() { index.to_string() } else { source_material.name.clone() }
            );
            let mat_relative = registry.imported_path(AssetKind::Material, &mat_name, true);
            let mat_id = id::id_from_path(&mat_relative);

            if registry.lookup(mat_id).is_none() {
                let material = self.process_material(
                    source_material.properties,
                    mat_id,
                    mesh_dir,
                    reimport,
                    registry,
                )?;
                let mat_relative_file = format!("{mat_relative}.{MATERIAL_EXTENSION}");
                let disk_path = registry.asset_root().join(&mat_relative_file);
                crate::material::save_material(&material, &disk_path)?;
                registry.register(mat_id, mat_relative_file, AssetKind::Material)?;
                log::debug!("imported material {mat_name} -> {mat_relative}");
            }
            materials.push(mat_id);
        }

        let mut streams = VertexStreams::default();
        let mut indices = Vec::new();
        let mut sub_meshes = Vec::with_capacity(scene.meshes.len());

        for source_mesh in scene.meshes {
            let vertex_offset = streams.position.len() as u32;
            let vertex_count = source_mesh.positions.len() as u32;
            let index_offset = indices.len() as u32;

            let mut local_indices = source_mesh.indices;
            if local_indices.len() % 3 != 0 {
                log::warn!(
                    "mesh {}: dropping {} trailing non-triangular indices",
                    source_mesh.name,
                    local_indices.len() % 3
                );
                local_indices.truncate(local_indices.len() - local_indices.len() % 3);
            }
            let index_count = local_indices.len() as u32;
            indices.extend(local_indices.iter().map(|&i| i + vertex_offset));

            streams.position.extend(source_mesh.positions);
            streams.normal.extend(source_mesh.normals);
            streams.tex_coord_0.extend(source_mesh.tex_coords);
            streams.tangent.extend(source_mesh.tangents);

            let material_index = source_mesh.material_index.unwrap_or(0) as u32;

            let mut sub_mesh = SubMesh {
                vertex_offset,
                vertex_count,
                index_offset,
                index_count,
                material_index,
                meshlets: MeshletGroup::default(),
                name: source_mesh.name,
            };

            if self.options.generate_meshlets {
                let local_positions = &streams.position[vertex_offset as usize..(vertex_offset + vertex_count) as usize];
                let local_tri_indices: Vec<u32> =
                    indices[index_offset as usize..(index_offset + index_count) as usize]
                        .iter()
                        .map(|&i| i - vertex_offset)
                        .collect();
                sub_mesh.meshlets = self.build_meshlets(local_positions, &local_tri_indices, material_index);
            }

            sub_meshes.push(sub_mesh);
        }

        let mesh = Mesh { id, streams, indices, sub_meshes, materials, name: stem.to_string() };
        mesh.validate()?;

        let relative_file = format!("{relative}.{MESH_EXTENSION}");
        let disk_path = registry.asset_root().join(&relative_file);
        save_mesh(&mesh, &disk_path, self.options.zstd_level)?;
        registry.register(id, relative_file.clone(), AssetKind::Mesh)?;
        write_import_sidecar(source_path, registry.asset_root(), Importer::Mesh, id, &relative_file)?;
        log::debug!("imported mesh {} -> {relative}", source_path.display());
        Ok(id)
    }

    fn build_meshlets(
        &self,
        positions: &[crate::math::Vec3],
        local_indices: &[u32],
        material_index: u32,
    ) -> MeshletGroup {
        let built = self.clusterer.build(
            positions,
            local_indices,
            MESHLET_MAX_VERTS,
            MESHLET_MAX_TRIS,
            MESHLET_CONE_WEIGHT,
        );

        let mut meshlets = Vec::with_capacity(built.len());
        let mut meshlet_vertices = Vec::new();
        let mut meshlet_triangles = Vec::new();
        for b in built {
            let vertex_offset = meshlet_vertices.len() as u32;
            let vertex_count = b.local_vertices.len() as u32;
            let triangle_offset = meshlet_triangles.len() as u32;
            let triangle_count = (b.local_triangles.len() / 3) as u32;

            meshlet_vertices.extend(b.local_vertices);
            let padded_len = padded_triangle_bytes(triangle_count) as usize;
            let mut tri_bytes = b.local_triangles;
            tri_bytes.resize(padded_len, 0);
            meshlet_triangles.extend(tri_bytes);

            meshlets.push(Meshlet {
                vertex_offset,
                vertex_count,
                triangle_offset,
                triangle_count,
                material_index,
                center: b.center,
                radius: b.radius,
            });
        }
        MeshletGroup { meshlets, meshlet_vertices, meshlet_triangles }
    }

    /// Fills the `PBR-MR` block of a newly encountered material from its
    /// generic source property bag, importing any referenced textures along
    /// the way.
    fn process_material(
        &self,
        mut props: MaterialPropertyBag,
        id: Id,
        mesh_dir: &Path,
        reimport: bool,
        registry: &mut Registry,
    ) -> AssetResult<Material> {
        let name = props.try_get_simple::<String>("NAME").unwrap_or_default();

        let kd = props.try_get_simple::<[f32; 3]>("COLOR_DIFFUSE").unwrap_or([1.0, 1.0, 1.0]);
        let ks = props.try_get_simple::<[f32; 3]>("COLOR_SPECULAR").unwrap_or([0.0, 0.0, 0.0]);
        let ke = props.try_get_simple::<[f32; 3]>("COLOR_EMISSIVE").unwrap_or([0.0, 0.0, 0.0]);
        let ka = props.try_get_simple::<[f32; 3]>("COLOR_AMBIENT").unwrap_or([0.0, 0.0, 0.0]);

        let shininess = props.try_get_simple::<f32>("Ns").unwrap_or(0.0);
        let opacity = props.try_get_simple::<f32>("d").unwrap_or(1.0);
        let ior = props.try_get_simple::<f32>("Ni").unwrap_or(1.5);
        let emissive_intensity = props.try_get_simple::<f32>("EMISSIVE_INTENSITY").unwrap_or(1.0);

        let alpha_mode = match props.try_get_simple::<String>("GLTF_ALPHAMODE") {
            Some(mode) if mode == "MASK" => AlphaMode::Mask,
            Some(mode) if mode == "BLEND" => AlphaMode::Blend,
            Some(_) => AlphaMode::Opaque,
            None => AlphaMode::Opaque,
        };
        let alpha_cutoff = props.try_get_simple::<f32>("GLTF_ALPHACUTOFF").unwrap_or(0.5);

        let blend_mode = match props.try_get_simple::<i32>("BLEND_FUNC") {
            Some(tag) => blend_func_to_blend_mode(tag),
            None if opacity < 1.0 => BlendMode::Alpha,
            None => BlendMode::None,
        };

        let mut base_color = [kd[0], kd[1], kd[2], 1.0];
        let metallic_factor_phong =
            ((0.2126 * ks[0] + 0.7152 * ks[1] + 0.0722 * ks[2] - 0.04) / (1.0 - 0.04)).clamp(0.0, 1.0);
        let roughness_factor_phong = (2.0_f32 / (shininess + 2.0)).sqrt().clamp(0.04, 1.0);
        let mut metallic_factor = metallic_factor_phong;
        let mut roughness_factor = roughness_factor_phong;
        let mut emissive_color_intensity = [ke[0], ke[1], ke[2], emissive_intensity];
        let ambient_color = [ka[0], ka[1], ka[2], 1.0];

        if let Some(base) = props.try_get_simple::<[f32; 4]>("BASE_COLOR") {
            base_color = [base[0], base[1], base[2], 1.0];
        }
        if let Some(m) = props.try_get_simple::<f32>("METALLIC_FACTOR") {
            metallic_factor = m;
        }
        if let Some(r) = props.try_get_simple::<f32>("ROUGHNESS_FACTOR") {
            roughness_factor = r;
        }
        if let Some(e) = props.try_get_simple::<[f32; 4]>("EMISSIVE_INTENSITY") {
            emissive_color_intensity = e;
        }

        let mut textures = TextureSlots::default();
        textures.base_color = self.load_texture_slot(&mut props, TEX_DIFFUSE, mesh_dir, reimport, registry)?;
        textures.alpha = self.load_texture_slot(&mut props, TEX_OPACITY, mesh_dir, reimport, registry)?;
        textures.metallic = self.load_texture_slot(&mut props, TEX_METALNESS, mesh_dir, reimport, registry)?;
        textures.roughness =
            self.load_texture_slot(&mut props, TEX_DIFFUSE_ROUGHNESS, mesh_dir, reimport, registry)?;
        textures.specular = self.load_texture_slot(&mut props, TEX_SPECULAR, mesh_dir, reimport, registry)?;
        textures.normal = self.load_texture_slot(&mut props, TEX_NORMALS, mesh_dir, reimport, registry)?;
        textures.ambient_occlusion =
            self.load_texture_slot(&mut props, TEX_LIGHTMAP, mesh_dir, reimport, registry)?;
        textures.emissive = self.load_texture_slot(&mut props, TEX_EMISSIVE, mesh_dir, reimport, registry)?;
        textures.metallic_roughness =
            self.load_texture_slot(&mut props, TEX_GLTF_METALLIC_ROUGHNESS, mesh_dir, reimport, registry)?;

        let double_sided = props.try_get_simple::<bool>("TWOSIDED").unwrap_or(true);

        let unconsumed = props.unconsumed_keys();
        if !unconsumed.is_empty() {
            log::warn!("material {name}: {} unhandled propert(ies)", unconsumed.len());
        }

        Ok(Material {
            id,
            ty: MaterialType::PbrMetallicRoughness,
            pbr: PbrMetallicRoughness {
                base_color: Color4::from(base_color),
                alpha_cutoff,
                alpha_mode,
                opacity,
                blend_mode,
                metallic_factor,
                roughness_factor,
                emissive_color_intensity: Color4::from(emissive_color_intensity),
                ambient_color: Color4::from(ambient_color),
                ior,
                double_sided,
                textures,
            },
            name,
        })
    }

    fn load_texture_slot(
        &self,
        props: &mut MaterialPropertyBag,
        semantic: u32,
        mesh_dir: &Path,
        reimport: bool,
        registry: &mut Registry,
    ) -> AssetResult<Id> {
        match props.try_get::<String>(TEXTURE_KEY, semantic, 0) {
            Some(relative) => {
                let tex_path = mesh_dir.join(relative);
                self.texture_importer.import(&tex_path, reimport, registry)
            }
            None => Ok(Id::NIL),
        }
    }
}

/// Mirrors the source library's blend-func enum: `Default` blends, `Additive`
/// adds, anything else disables blending.
const BLEND_FUNC_DEFAULT: i32 = 0;
const BLEND_FUNC_ADDITIVE: i32 = 1;

fn blend_func_to_blend_mode(tag: i32) -> BlendMode {
    match tag {
        BLEND_FUNC_DEFAULT => BlendMode::Alpha,
        BLEND_FUNC_ADDITIVE => BlendMode::Additive,
        _ => BlendMode::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        importers::{material_props::PropKey, DecodedImage, ImageDecoder, MeshletBuild, PropValue, Scene,
            SourceMaterial, SourceMesh, TextureEncoder},
        importers::texture::{TextureImportOptions, TextureImporter},
        math::{Vec2, Vec3, Vec4},
    };

    struct FakeImageDecoder;

    impl ImageDecoder for FakeImageDecoder {
        fn decode(&self, _source_path: &Path) -> AssetResult<DecodedImage> {
            Ok(DecodedImage { width: 2, height: 2, container_bytes: None, pixels: vec![1u8; 16], is_hdr: false })
        }
    }

    struct FakeTextureEncoder;

    impl TextureEncoder for FakeTextureEncoder {
        fn encode_ktx2(&self, image: &DecodedImage, _options: &TextureImportOptions) -> AssetResult<Vec<u8>> {
            Ok(image.pixels.clone())
        }
    }

    struct FakeSceneLoader {
        with_texture: bool,
    }

    impl SceneLoader for FakeSceneLoader {
        fn load(&self, _source_path: &Path) -> AssetResult<Scene> {
            let mut props = MaterialPropertyBag::new();
            props.insert(PropKey::simple("COLOR_DIFFUSE"), PropValue::Color3([0.8, 0.2, 0.2]));
            props.insert(PropKey::simple("Ns"), PropValue::Float(32.0));
            if self.with_texture {
                props.insert(PropKey::new(TEXTURE_KEY, TEX_DIFFUSE, 0), PropValue::String("diffuse.png".into()));
            }

            let mesh = SourceMesh {
                name: "Cube".into(),
                positions: vec![
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
                normals: vec![Vec3::new(0.0, 0.0, 1.0); 3],
                tex_coords: vec![Vec2::new(0.0, 0.0); 3],
                tangents: vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 3],
                indices: vec![0, 1, 2],
                material_index: Some(0),
            };
            Ok(Scene {
                meshes: vec![mesh],
                materials: vec![SourceMaterial { name: "Red".into(), properties: props }],
            })
        }
    }

    struct FakeClusterer;

    impl MeshletClusterer for FakeClusterer {
        fn build(
            &self,
            positions: &[Vec3],
            indices: &[u32],
            _max_verts: u32,
            _max_tris: u32,
            _cone_weight: f32,
        ) -> Vec<MeshletBuild> {
            vec![MeshletBuild {
                local_vertices: (0..positions.len() as u32).collect(),
                local_triangles: indices.iter().map(|&i| i as u8).collect(),
                center: Vec3::default(),
                radius: 1.0,
            }]
        }
    }

    fn registry_at(dir: &Path) -> Registry {
        let mut reg = Registry::new();
        reg.set_asset_root(dir);
        reg
    }

    #[test]
    fn imports_mesh_and_material_without_textures() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let scene_loader = FakeSceneLoader { with_texture: false };
        let clusterer = FakeClusterer;
        let decoder = FakeImageDecoder;
        let encoder = FakeTextureEncoder;
        let texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
        let importer = MeshImporter::new(&scene_loader, &clusterer, texture_importer, MeshImportOptions::default());

        let source = dir.path().join("models/cube.gltf");
        let id = importer.import(&source, false, &mut reg).unwrap();

        let (kind, path) = reg.lookup(id).unwrap();
        assert_eq!(kind, AssetKind::Mesh);
        let bytes = std::fs::read(dir.path().join(path)).unwrap();
        let mesh = crate::mesh::load_mesh_from_memory(&bytes).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.sub_meshes.len(), 1);
        assert_eq!(mesh.materials.len(), 1);
        assert_eq!(mesh.sub_meshes[0].meshlets.meshlets.len(), 1);

        let (mat_kind, _) = reg.lookup(mesh.materials[0]).unwrap();
        assert_eq!(mat_kind, AssetKind::Material);
    }

    #[test]
    fn material_texture_slot_triggers_recursive_import() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("diffuse.png"), b"n/a").unwrap();
        let mut reg = registry_at(dir.path());
        let scene_loader = FakeSceneLoader { with_texture: true };
        let clusterer = FakeClusterer;
        let decoder = FakeImageDecoder;
        let encoder = FakeTextureEncoder;
        let texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
        let importer = MeshImporter::new(&scene_loader, &clusterer, texture_importer, MeshImportOptions::default());

        let source = dir.path().join("cube.gltf");
        let id = importer.import(&source, false, &mut reg).unwrap();
        let (_, path) = reg.lookup(id).unwrap();
        let bytes = std::fs::read(dir.path().join(path)).unwrap();
        let mesh = crate::mesh::load_mesh_from_memory(&bytes).unwrap();

        let (_, mat_path) = reg.lookup(mesh.materials[0]).unwrap();
        let mat_bytes = std::fs::read(dir.path().join(mat_path)).unwrap();
        let material = crate::material::read_material(&mut std::io::Cursor::new(mat_bytes)).unwrap();
        assert!(!material.pbr.textures.base_color.is_nil());
    }

    #[test]
    fn cache_hit_skips_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let scene_loader = FakeSceneLoader { with_texture: false };
        let clusterer = FakeClusterer;
        let decoder = FakeImageDecoder;
        let encoder = FakeTextureEncoder;
        let texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
        let importer = MeshImporter::new(&scene_loader, &clusterer, texture_importer, MeshImportOptions::default());

        let source = dir.path().join("models/cube.gltf");
        let first = importer.import(&source, false, &mut reg).unwrap();
        let second = importer.import(&source, false, &mut reg).unwrap();
        assert_eq!(first, second);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn blend_func_mapping_matches_source_enum() {
        assert_eq!(blend_func_to_blend_mode(BLEND_FUNC_DEFAULT), BlendMode::Alpha);
        assert_eq!(blend_func_to_blend_mode(BLEND_FUNC_ADDITIVE), BlendMode::Additive);
        assert_eq!(blend_func_to_blend_mode(99), BlendMode::None);
    }

    struct BlendFuncSceneLoader;

    impl SceneLoader for BlendFuncSceneLoader {
        fn load(&self, _source_path: &Path) -> AssetResult<Scene> {
            let mut props = MaterialPropertyBag::new();
            props.insert(PropKey::simple("COLOR_DIFFUSE"), PropValue::Color3([0.8, 0.2, 0.2]));
            // Fully opaque, so the `d < 1` fallback alone would pick `None`;
            // an explicit additive BLEND_FUNC must still win.
            props.insert(PropKey::simple("d"), PropValue::Float(1.0));
            props.insert(PropKey::simple("BLEND_FUNC"), PropValue::Int(BLEND_FUNC_ADDITIVE));

            let mesh = SourceMesh {
                name: "Cube".into(),
                positions: vec![
                    Vec3::new(0.0, 0.0, 0.0),
                    Vec3::new(1.0, 0.0, 0.0),
                    Vec3::new(0.0, 1.0, 0.0),
                ],
                normals: vec![Vec3::new(0.0, 0.0, 1.0); 3],
                tex_coords: vec![Vec2::new(0.0, 0.0); 3],
                tangents: vec![Vec4::new(1.0, 0.0, 0.0, 1.0); 3],
                indices: vec![0, 1, 2],
                material_index: Some(0),
            };
            Ok(Scene {
                meshes: vec![mesh],
                materials: vec![SourceMaterial { name: "Glow".into(), properties: props }],
            })
        }
    }

    #[test]
    fn explicit_blend_func_overrides_opacity_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let mut reg = registry_at(dir.path());
        let scene_loader = BlendFuncSceneLoader;
        let clusterer = FakeClusterer;
        let decoder = FakeImageDecoder;
        let encoder = FakeTextureEncoder;
        let texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
        let importer = MeshImporter::new(&scene_loader, &clusterer, texture_importer, MeshImportOptions::default());

        let source = dir.path().join("models/glow.gltf");
        let id = importer.import(&source, false, &mut reg).unwrap();
        let (_, path) = reg.lookup(id).unwrap();
        let bytes = std::fs::read(dir.path().join(path)).unwrap();
        let mesh = crate::mesh::load_mesh_from_memory(&bytes).unwrap();

        let (_, mat_path) = reg.lookup(mesh.materials[0]).unwrap();
        let mat_bytes = std::fs::read(dir.path().join(mat_path)).unwrap();
        let material = crate::material::read_material(&mut std::io::Cursor::new(mat_bytes)).unwrap();
        assert_eq!(material.pbr.blend_mode, BlendMode::Additive);
    }
}
