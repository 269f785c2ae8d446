//! Loads source 3D scenes for the mesh importer.
//!
//! Supports Wavefront OBJ (with its companion `.mtl` library) by hand, and
//! glTF/GLB through the `gltf` crate. `.fbx` and `.dae` have no decoder
//! linked in — the spec treats the scene loader as an external capability,
//! and this binary only carries the two formats it has a real decoder for.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use vasset::{
    error::{AssetError, AssetResult},
    importers::{
        MaterialPropertyBag, PropKey, PropValue, Scene, SceneLoader, SourceMaterial, SourceMesh,
        TEXTURE_KEY, TEX_DIFFUSE,
    },
    math::{Vec2, Vec3, Vec4},
};

pub struct DefaultSceneLoader;

impl SceneLoader for DefaultSceneLoader {
    fn load(&self, source_path: &Path) -> AssetResult<Scene> {
        let ext = source_path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
        match ext.as_str() {
            "obj" => load_obj(source_path),
            "gltf" | "glb" => load_gltf(source_path),
            other => Err(AssetError::ImportFailed(format!(
                "no scene loader available for '.{other}' sources (external capability not linked)"
            ))),
        }
    }
}

// ---- Wavefront OBJ -------------------------------------------------------

#[derive(Default)]
struct ObjGroup {
    name: String,
    material: String,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    tex_coords: Vec<Vec2>,
    indices: Vec<u32>,
}

fn load_obj(source_path: &Path) -> AssetResult<Scene> {
    let text = fs::read_to_string(source_path)?;
    let dir = source_path.parent().unwrap_or_else(|| Path::new(""));

    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut tex_coords: Vec<Vec2> = Vec::new();

    // Order-preserving groups keyed by (object name, material name); a new
    // group starts whenever either changes, mirroring an engine that splits
    // a mesh into one submesh per source mesh/material combination.
    let mut groups: Vec<ObjGroup> = Vec::new();
    let mut current_object = "Default".to_string();
    let mut current_material = "Default".to_string();
    let mut materials: BTreeMap<String, MaterialPropertyBag> = BTreeMap::new();
    materials.entry("Default".to_string()).or_default();

    macro_rules! current_group {
        () => {{
            let needs_new = match groups.last() {
                Some(g) => g.name != current_object || g.material != current_material,
                None => true,
            };
            if needs_new {
                groups.push(ObjGroup {
                    name: current_object.clone(),
                    material: current_material.clone(),
                    ..Default::default()
                });
            }
            groups.last_mut().unwrap()
        }};
    }

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else { continue };
        let rest: Vec<&str> = parts.collect();
        match tag {
            "v" => positions.push(parse_vec3(&rest)?),
            "vn" => normals.push(parse_vec3(&rest)?),
            "vt" => tex_coords.push(parse_vec2(&rest)?),
            "o" | "g" => {
                current_object = rest.first().map(|s| s.to_string()).unwrap_or_else(|| "Default".into());
            }
            "usemtl" => {
                current_material = rest.first().map(|s| s.to_string()).unwrap_or_else(|| "Default".into());
                materials.entry(current_material.clone()).or_default();
            }
            "mtllib" => {
                if let Some(name) = rest.first() {
                    load_mtl(&dir.join(name), &mut materials)?;
                }
            }
            "f" => {
                let face_verts: Vec<(i64, Option<i64>, Option<i64>)> =
                    rest.iter().map(|tok| parse_face_token(tok)).collect::<AssetResult<_>>()?;
                if face_verts.len() < 3 {
                    continue;
                }
                let group = current_group!();
                // Fan-triangulate polygons with more than 3 vertices.
                for i in 1..face_verts.len() - 1 {
                    for &(pi, ti, ni) in &[face_verts[0], face_verts[i], face_verts[i + 1]] {
                        let p = resolve_index(pi, positions.len())?;
                        group.positions.push(positions[p]);
                        group.normals.push(
                            ni.map(|n| resolve_index(n, normals.len())).transpose()?
                                .map(|n| normals[n])
                                .unwrap_or_default(),
                        );
                        group.tex_coords.push(
                            ti.map(|t| resolve_index(t, tex_coords.len())).transpose()?
                                .map(|t| tex_coords[t])
                                .unwrap_or_default(),
                        );
                        group.indices.push(group.indices.len() as u32);
                    }
                }
            }
            _ => {}
        }
    }

    if groups.is_empty() {
        return Err(AssetError::ImportFailed(format!("{}: no faces found", source_path.display())));
    }

    let material_names: Vec<String> = materials.keys().cloned().collect();
    let meshes = groups
        .into_iter()
        .map(|g| {
            let material_index = material_names.iter().position(|n| *n == g.material);
            let vertex_count = g.positions.len();
            SourceMesh {
                name: g.name,
                positions: g.positions,
                normals: g.normals,
                tex_coords: g.tex_coords,
                tangents: vec![Vec4::new(1.0, 0.0, 0.0, 1.0); vertex_count],
                indices: g.indices,
                material_index,
            }
        })
        .collect();

    let source_materials = material_names
        .into_iter()
        .map(|name| {
            let mut properties = materials.remove(&name).unwrap_or_default();
            properties.insert(PropKey::simple("NAME"), PropValue::String(name.clone()));
            SourceMaterial { name, properties }
        })
        .collect();

    Ok(Scene { meshes, materials: source_materials })
}

fn load_mtl(path: &Path, materials: &mut BTreeMap<String, MaterialPropertyBag>) -> AssetResult<()> {
    let Ok(text) = fs::read_to_string(path) else { return Ok(()) };
    let mut current: Option<String> = None;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let Some(tag) = parts.next() else { continue };
        let rest: Vec<&str> = parts.collect();
        match tag {
            "newmtl" => {
                let name = rest.first().map(|s| s.to_string()).unwrap_or_default();
                materials.entry(name.clone()).or_default();
                current = Some(name);
            }
            "Kd" | "Ks" | "Ke" | "Ka" if current.is_some() => {
                if let Ok(color) = parse_vec3(&rest) {
                    let key = match tag {
                        "Kd" => "COLOR_DIFFUSE",
                        "Ks" => "COLOR_SPECULAR",
                        "Ke" => "COLOR_EMISSIVE",
                        _ => "COLOR_AMBIENT",
                    };
                    let bag = materials.get_mut(current.as_ref().unwrap()).unwrap();
                    bag.insert(PropKey::simple(key), PropValue::Color3(color.to_array()));
                }
            }
            "Ns" | "d" | "Ni" if current.is_some() => {
                if let Some(v) = rest.first().and_then(|s| s.parse::<f32>().ok()) {
                    let bag = materials.get_mut(current.as_ref().unwrap()).unwrap();
                    bag.insert(PropKey::simple(tag), PropValue::Float(v));
                }
            }
            "map_Kd" if current.is_some() => {
                if let Some(file) = rest.last() {
                    let bag = materials.get_mut(current.as_ref().unwrap()).unwrap();
                    bag.insert(PropKey::new(TEXTURE_KEY, TEX_DIFFUSE, 0), PropValue::String(file.to_string()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_vec3(fields: &[&str]) -> AssetResult<Vec3> {
    if fields.len() < 3 {
        return Err(AssetError::ImportFailed("malformed OBJ vector".into()));
    }
    let v: Vec<f32> = fields[..3]
        .iter()
        .map(|s| s.parse::<f32>().map_err(|_| AssetError::ImportFailed("malformed OBJ float".into())))
        .collect::<AssetResult<_>>()?;
    Ok(Vec3::new(v[0], v[1], v[2]))
}

fn parse_vec2(fields: &[&str]) -> AssetResult<Vec2> {
    if fields.len() < 2 {
        return Err(AssetError::ImportFailed("malformed OBJ uv".into()));
    }
    let v: Vec<f32> = fields[..2]
        .iter()
        .map(|s| s.parse::<f32>().map_err(|_| AssetError::ImportFailed("malformed OBJ float".into())))
        .collect::<AssetResult<_>>()?;
    Ok(Vec2::new(v[0], v[1]))
}

/// Parses `v`, `v/vt`, `v//vn` or `v/vt/vn`. Indices are 1-based, negative
/// means relative-to-end as the OBJ spec allows.
fn parse_face_token(tok: &str) -> AssetResult<(i64, Option<i64>, Option<i64>)> {
    let mut parts = tok.split('/');
    let v = parts
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| AssetError::ImportFailed(format!("malformed OBJ face token '{tok}'")))?;
    let t = parts.next().filter(|s| !s.is_empty()).and_then(|s| s.parse::<i64>().ok());
    let n = parts.next().filter(|s| !s.is_empty()).and_then(|s| s.parse::<i64>().ok());
    Ok((v, t, n))
}

fn resolve_index(idx: i64, len: usize) -> AssetResult<usize> {
    let resolved = if idx > 0 { idx - 1 } else { len as i64 + idx };
    if resolved < 0 || resolved as usize >= len {
        return Err(AssetError::ImportFailed(format!("OBJ index {idx} out of range")));
    }
    Ok(resolved as usize)
}

// ---- glTF -----------------------------------------------------------------

fn load_gltf(source_path: &Path) -> AssetResult<Scene> {
    let (document, buffers, _images) = gltf::import(source_path)
        .map_err(|e| AssetError::ImportFailed(format!("{}: {e}", source_path.display())))?;

    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|b| buffers.get(b.index()).map(|d| d.0.as_slice()));
            let positions: Vec<Vec3> =
                reader.read_positions().map(|it| it.map(Vec3::from).collect()).unwrap_or_default();
            let normals: Vec<Vec3> =
                reader.read_normals().map(|it| it.map(Vec3::from).collect()).unwrap_or_default();
            let tex_coords: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|it| it.into_f32().map(Vec2::from).collect())
                .unwrap_or_default();
            let tangents: Vec<Vec4> =
                reader.read_tangents().map(|it| it.map(Vec4::from).collect()).unwrap_or_default();
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|it| it.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            meshes.push(SourceMesh {
                name: mesh.name().unwrap_or("mesh").to_string(),
                positions,
                normals,
                tex_coords,
                tangents,
                indices,
                material_index: primitive.material().index(),
            });
        }
    }

    let mut materials = Vec::new();
    for material in document.materials() {
        let mut props = MaterialPropertyBag::new();
        let name = material.name().unwrap_or("material").to_string();
        props.insert(PropKey::simple("NAME"), PropValue::String(name.clone()));
        let pbr = material.pbr_metallic_roughness();
        let base = pbr.base_color_factor();
        props.insert(PropKey::simple("BASE_COLOR"), PropValue::Color4(base));
        props.insert(PropKey::simple("METALLIC_FACTOR"), PropValue::Float(pbr.metallic_factor()));
        props.insert(PropKey::simple("ROUGHNESS_FACTOR"), PropValue::Float(pbr.roughness_factor()));
        let emissive = material.emissive_factor();
        props.insert(
            PropKey::simple("EMISSIVE_INTENSITY"),
            PropValue::Color4([emissive[0], emissive[1], emissive[2], 1.0]),
        );
        props.insert(
            PropKey::simple("GLTF_ALPHAMODE"),
            PropValue::String(
                match material.alpha_mode() {
                    gltf::material::AlphaMode::Mask => "MASK",
                    gltf::material::AlphaMode::Blend => "BLEND",
                    gltf::material::AlphaMode::Opaque => "OPAQUE",
                }
                .to_string(),
            ),
        );
        props.insert(PropKey::simple("GLTF_ALPHACUTOFF"), PropValue::Float(material.alpha_cutoff().unwrap_or(0.5)));
        props.insert(PropKey::simple("TWOSIDED"), PropValue::Bool(material.double_sided()));
        if let Some(tex) = pbr.base_color_texture() {
            if let Some(source) = source_uri(&document, tex.texture()) {
                props.insert(PropKey::new(TEXTURE_KEY, TEX_DIFFUSE, 0), PropValue::String(source));
            }
        }
        materials.push(SourceMaterial { name, properties: props });
    }

    Ok(Scene { meshes, materials })
}

fn source_uri(_document: &gltf::Document, texture: gltf::Texture) -> Option<String> {
    match texture.source().source() {
        gltf::image::Source::Uri { uri, .. } => Some(uri.to_string()),
        gltf::image::Source::View { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_OBJ: &str = "\
v 0.0 0.0 0.0\n\
v 1.0 0.0 0.0\n\
v 1.0 1.0 0.0\n\
v 0.0 1.0 0.0\n\
vt 0.0 0.0\n\
vt 1.0 0.0\n\
vt 1.0 1.0\n\
vt 0.0 1.0\n\
mtllib quad.mtl\n\
o Quad\n\
usemtl Red\n\
f 1/1 2/2 3/3 4/4\n\
";

    const QUAD_MTL: &str = "\
newmtl Red\n\
Kd 0.8 0.1 0.1\n\
Ns 32.0\n\
d 1.0\n\
map_Kd albedo.png\n\
";

    #[test]
    fn loads_quad_obj_with_fan_triangulation_and_mtl() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("quad.obj"), QUAD_OBJ).unwrap();
        fs::write(dir.path().join("quad.mtl"), QUAD_MTL).unwrap();

        let mut scene = load_obj(&dir.path().join("quad.obj")).unwrap();
        assert_eq!(scene.meshes.len(), 1);
        let mesh = &scene.meshes[0];
        assert_eq!(mesh.name, "Quad");
        // A 4-gon fan-triangulates into 2 triangles of 3 verts each.
        assert_eq!(mesh.positions.len(), 6);
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.material_index, Some(1), "Default is registered before Red");

        assert_eq!(scene.materials.len(), 2);
        let red = scene.materials.iter_mut().find(|m| m.name == "Red").unwrap();
        let props = &mut red.properties;
        assert_eq!(props.try_get_simple::<[f32; 3]>("COLOR_DIFFUSE"), Some([0.8, 0.1, 0.1]));
        assert_eq!(props.try_get_simple::<f32>("Ns"), Some(32.0));
        assert_eq!(
            props.try_get::<String>(TEXTURE_KEY, TEX_DIFFUSE, 0),
            Some("albedo.png".to_string())
        );
    }

    #[test]
    fn missing_faces_is_import_failed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.obj"), "v 0 0 0\n").unwrap();
        assert!(matches!(load_obj(&dir.path().join("empty.obj")), Err(AssetError::ImportFailed(_))));
    }

    #[test]
    fn resolve_index_rejects_out_of_range() {
        assert!(resolve_index(5, 3).is_err());
        assert!(resolve_index(-4, 3).is_err());
        assert_eq!(resolve_index(1, 3).unwrap(), 0);
        assert_eq!(resolve_index(-1, 3).unwrap(), 2);
    }

    #[test]
    fn unsupported_scene_extension_is_import_failed() {
        assert!(matches!(DefaultSceneLoader.load(Path::new("model.fbx")), Err(AssetError::ImportFailed(_))));
    }
}
