//! Full pipeline integration test: import a texture and a mesh (with an
//! embedded material texture reference), pack both into a `.pkg`, then read
//! the cooked bytes back out through `PackageFileSystem` and decode them.

use std::{cell::Cell, fs, path::Path};

use vasset::{
    fs::{pkg_fs::PackageFileSystem, FileSystem, OpenMode},
    importers::{
        material_props::{MaterialPropertyBag, PropKey, PropValue},
        mesh::{MeshImportOptions, MeshImporter, TEXTURE_KEY, TEX_DIFFUSE},
        texture::{TextureImportOptions, TextureImporter},
        DecodedImage, ImageDecoder, MeshletBuild, MeshletClusterer, Scene, SceneLoader, SourceMaterial,
        SourceMesh, TextureEncoder,
    },
    math::Vec3,
    pkg::{open_pkg, write_pkg, WriteItem},
    registry::Registry,
    texture::load_texture_from_memory,
    vimport::load_vimport,
};
use walkdir::WalkDir;

struct FakeImageDecoder {
    calls: Cell<u32>,
}

impl ImageDecoder for FakeImageDecoder {
    fn decode(&self, _source_path: &Path) -> vasset::AssetResult<DecodedImage> {
        self.calls.set(self.calls.get() + 1);
        Ok(DecodedImage { width: 2, height: 2, container_bytes: None, pixels: vec![0x7Fu8; 16], is_hdr: false })
    }
}

struct FakeTextureEncoder;

impl TextureEncoder for FakeTextureEncoder {
    fn encode_ktx2(&self, image: &DecodedImage, _options: &TextureImportOptions) -> vasset::AssetResult<Vec<u8>> {
        Ok(image.pixels.clone())
    }
}

struct FakeSceneLoader;

impl SceneLoader for FakeSceneLoader {
    fn load(&self, _source_path: &Path) -> vasset::AssetResult<Scene> {
        let mut props = MaterialPropertyBag::new();
        props.insert(PropKey::simple("COLOR_DIFFUSE"), PropValue::Color3([0.9, 0.1, 0.1]));
        props.insert(PropKey::simple("Ns"), PropValue::Float(16.0));
        props.insert(PropKey::new(TEXTURE_KEY, TEX_DIFFUSE, 0), PropValue::String("albedo.png".into()));

        let mesh = SourceMesh {
            name: "Quad".into(),
            positions: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            normals: vec![Vec3::new(0.0, 0.0, 1.0); 4],
            tex_coords: vec![],
            tangents: vec![],
            indices: vec![0, 1, 2, 0, 2, 3],
            material_index: Some(0),
        };

        Ok(Scene {
            meshes: vec![mesh],
            materials: vec![SourceMaterial { name: "Quad_mat".into(), properties: props }],
        })
    }
}

struct FlatClusterer;

impl MeshletClusterer for FlatClusterer {
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

/// Mirrors `retrotool`'s `pack` subcommand: walk for `.vimport` sidecars and
/// feed their cooked output into the package writer.
fn pack_asset_root(asset_root: &Path, out_pkg: &Path) {
    let mut items_data = Vec::new();
    for entry in WalkDir::new(asset_root).into_iter().filter_map(|e| e.ok()) {
        if entry.path().extension().and_then(|e| e.to_str()) != Some("vimport") {
            continue;
        }
        let desc = load_vimport(entry.path()).unwrap();
        let bytes = fs::read(asset_root.join(&desc.output)).unwrap();
        items_data.push((desc.source, bytes));
    }
    let items: Vec<WriteItem> = items_data
        .iter()
        .map(|(source, bytes)| WriteItem { logical_path: source.clone(), bytes, allow_compress: true })
        .collect();
    write_pkg(out_pkg, &items, 3).unwrap();
}

#[test]
fn imports_texture_and_mesh_then_packs_and_reads_back() {
    let asset_root = tempfile::tempdir().unwrap();
    let root = asset_root.path();
    fs::write(root.join("albedo.png"), b"not a real png, decode is faked").unwrap();
    fs::write(root.join("quad.gltf"), b"not a real gltf either").unwrap();

    let mut registry = Registry::new();
    registry.set_asset_root(root);

    let decoder = FakeImageDecoder { calls: Cell::new(0) };
    let encoder = FakeTextureEncoder;
    let standalone_texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
    let mesh_texture_importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());

    let scene_loader = FakeSceneLoader;
    let clusterer = FlatClusterer;
    let mesh_importer = MeshImporter::new(
        &scene_loader,
        &clusterer,
        mesh_texture_importer,
        MeshImportOptions { generate_meshlets: true, zstd_level: 3 },
    );

    // Import the mesh first; it recursively imports its referenced texture.
    let mesh_id = mesh_importer.import(&root.join("quad.gltf"), false, &mut registry).unwrap();
    assert_eq!(decoder.calls.get(), 1, "texture decode should run exactly once from the recursive import");

    // Re-importing the same texture standalone should hit the registry cache, not redecode.
    standalone_texture_importer.import(&root.join("albedo.png"), false, &mut registry).unwrap();
    assert_eq!(decoder.calls.get(), 1, "standalone import of the same texture must be a cache hit");

    assert_eq!(registry.len(), 3, "registry should hold the texture, the material and the mesh");

    let registry_path = root.join("imported").join("asset_registry.vreg");
    registry.save(&registry_path).unwrap();
    registry.cleanup();
    assert_eq!(registry.len(), 3, "cleanup must not evict entries whose cooked files still exist");

    let pkg_path = root.join("assets.pkg");
    pack_asset_root(root, &pkg_path);

    let pkg = open_pkg(&pkg_path).unwrap();
    assert_eq!(pkg.file_count(), 2);

    let fs_view = PackageFileSystem::new(pkg);
    assert!(fs_view.exists("albedo.png"));
    assert!(fs_view.exists("quad.gltf"));
    assert!(!fs_view.exists("missing.png"));

    let mut mesh_file = fs_view.open("quad.gltf", OpenMode::Read).unwrap();
    let mut mesh_bytes = Vec::new();
    std::io::Read::read_to_end(&mut mesh_file, &mut mesh_bytes).unwrap();
    let mesh = vasset::mesh::read_mesh(&mut std::io::Cursor::new(&mesh_bytes)).unwrap();
    assert_eq!(mesh.sub_meshes.len(), 1);
    assert_eq!(mesh.streams.position.len(), 4);
    assert_eq!(mesh.indices.len(), 6);
    assert_eq!(mesh.sub_meshes[0].meshlets.meshlets.len(), 1);

    let (_kind, cooked_mesh_relative) = registry.lookup(mesh_id).unwrap();
    let cooked_mesh_bytes = fs::read(root.join(cooked_mesh_relative)).unwrap();
    assert_eq!(cooked_mesh_bytes, mesh_bytes, "package entry must round-trip the exact cooked bytes on disk");

    let mut texture_file = fs_view.open("albedo.png", OpenMode::Read).unwrap();
    let mut texture_bytes = Vec::new();
    std::io::Read::read_to_end(&mut texture_file, &mut texture_bytes).unwrap();
    let texture = load_texture_from_memory(&texture_bytes).unwrap();
    assert_eq!(texture.width, 2);
    assert_eq!(texture.height, 2);
}

#[test]
fn cleanup_evicts_entries_whose_cooked_file_was_deleted() {
    let asset_root = tempfile::tempdir().unwrap();
    let root = asset_root.path();
    fs::write(root.join("albedo.png"), b"source bytes").unwrap();

    let mut registry = Registry::new();
    registry.set_asset_root(root);

    let decoder = FakeImageDecoder { calls: Cell::new(0) };
    let encoder = FakeTextureEncoder;
    let importer = TextureImporter::new(&decoder, &encoder, TextureImportOptions::default());
    importer.import(&root.join("albedo.png"), false, &mut registry).unwrap();
    assert_eq!(registry.len(), 1);

    let (id, _kind, cooked_relative) = registry.iter().next().unwrap();
    let cooked_relative = cooked_relative.to_string();
    fs::remove_file(root.join(&cooked_relative)).unwrap();

    registry.cleanup();
    assert!(registry.lookup(id).is_none(), "cleanup must evict an entry whose cooked file is missing");
    assert!(registry.is_empty());
}
