//! Cooked material data model and its `VMATERIAL` binary codec.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use crate::{
    binformat::{
        expect_magic, read_bool32, read_name, read_u32, write_bool32, write_magic, write_name,
        write_u32,
    },
    error::{AssetError, AssetResult},
    id::Id,
    math::Color4,
};

pub const MAGIC: &str = "VMATERIAL";

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum MaterialType {
    #[default]
    None = 0,
    PbrMetallicRoughness = 1,
}

impl MaterialType {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            0 => Self::None,
            1 => Self::PbrMetallicRoughness,
            other => return Err(AssetError::InvalidFormat(format!("unknown material type {other}"))),
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum AlphaMode {
    #[default]
    Opaque = 0,
    Mask = 1,
    Blend = 2,
}

impl AlphaMode {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            0 => Self::Opaque,
            1 => Self::Mask,
            2 => Self::Blend,
            other => return Err(AssetError::InvalidFormat(format!("unknown alpha mode {other}"))),
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[repr(u32)]
pub enum BlendMode {
    #[default]
    None = 0,
    Alpha = 1,
    Additive = 2,
    Multiply = 3,
}

impl BlendMode {
    pub fn from_u32(v: u32) -> AssetResult<Self> {
        Ok(match v {
            0 => Self::None,
            1 => Self::Alpha,
            2 => Self::Additive,
            3 => Self::Multiply,
            other => return Err(AssetError::InvalidFormat(format!("unknown blend mode {other}"))),
        })
    }
}

/// Texture reference slots, in the exact order they are persisted.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextureSlots {
    pub base_color: Id,
    pub alpha: Id,
    pub metallic: Id,
    pub roughness: Id,
    pub specular: Id,
    pub normal: Id,
    pub ambient_occlusion: Id,
    pub emissive: Id,
    pub metallic_roughness: Id,
}

impl TextureSlots {
    fn write<W: Write>(&self, w: &mut W) -> AssetResult<()> {
        for id in [
            self.base_color,
            self.alpha,
            self.metallic,
            self.roughness,
            self.specular,
            self.normal,
            self.ambient_occlusion,
            self.emissive,
            self.metallic_roughness,
        ] {
            w.write_all(id.as_bytes())?;
        }
        Ok(())
    }

    fn read<R: Read>(r: &mut R) -> AssetResult<Self> {
        let mut read_one = || -> AssetResult<Id> {
            let mut buf = [0u8; 16];
            r.read_exact(&mut buf)?;
            Ok(Id::from_bytes(buf))
        };
        Ok(Self {
            base_color: read_one()?,
            alpha: read_one()?,
            metallic: read_one()?,
            roughness: read_one()?,
            specular: read_one()?,
            normal: read_one()?,
            ambient_occlusion: read_one()?,
            emissive: read_one()?,
            metallic_roughness: read_one()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PbrMetallicRoughness {
    pub base_color: Color4,
    pub alpha_cutoff: f32,
    pub alpha_mode: AlphaMode,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_color_intensity: Color4,
    pub ambient_color: Color4,
    pub ior: f32,
    pub double_sided: bool,
    pub textures: TextureSlots,
}

impl Default for PbrMetallicRoughness {
    fn default() -> Self {
        Self {
            base_color: Color4::new(1.0, 1.0, 1.0, 1.0),
            alpha_cutoff: 0.5,
            alpha_mode: AlphaMode::Opaque,
            opacity: 1.0,
            blend_mode: BlendMode::None,
            metallic_factor: 0.0,
            roughness_factor: 0.0,
            emissive_color_intensity: Color4::new(0.0, 0.0, 0.0, 1.0),
            ambient_color: Color4::new(0.0, 0.0, 0.0, 1.0),
            ior: 1.0,
            double_sided: true,
            textures: TextureSlots::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Material {
    pub id: Id,
    pub ty: MaterialType,
    pub pbr: PbrMetallicRoughness,
    pub name: String,
}

pub fn save_material<P: AsRef<Path>>(material: &Material, path: P) -> AssetResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_material(material, &mut w)?;
    w.flush()?;
    Ok(())
}

pub fn write_material<W: Write>(material: &Material, w: &mut W) -> AssetResult<()> {
    write_magic(w, MAGIC)?;
    w.write_all(material.id.as_bytes())?;
    write_u32(w, material.ty as u32)?;
    let pbr = &material.pbr;
    for v in pbr.base_color.to_array() {
        w.write_all(&v.to_le_bytes())?;
    }
    w.write_all(&pbr.alpha_cutoff.to_le_bytes())?;
    write_u32(w, pbr.alpha_mode as u32)?;
    w.write_all(&pbr.opacity.to_le_bytes())?;
    write_u32(w, pbr.blend_mode as u32)?;
    w.write_all(&pbr.metallic_factor.to_le_bytes())?;
    w.write_all(&pbr.roughness_factor.to_le_bytes())?;
    for v in pbr.emissive_color_intensity.to_array() {
        w.write_all(&v.to_le_bytes())?;
    }
    for v in pbr.ambient_color.to_array() {
        w.write_all(&v.to_le_bytes())?;
    }
    w.write_all(&pbr.ior.to_le_bytes())?;
    write_bool32(w, pbr.double_sided)?;
    write_name(w, &material.name)?;
    pbr.textures.write(w)?;
    Ok(())
}

pub fn load_material<P: AsRef<Path>>(path: P) -> AssetResult<Material> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.display().to_string())
        } else {
            AssetError::IoError(e)
        }
    })?;
    let mut r = BufReader::new(file);
    read_material(&mut r)
}

pub fn read_material<R: Read>(r: &mut R) -> AssetResult<Material> {
    expect_magic(r, MAGIC)?;
    let mut id_bytes = [0u8; 16];
    r.read_exact(&mut id_bytes)?;
    let ty = MaterialType::from_u32(read_u32(r)?)?;
    let base_color = read_color4(r)?;
    let alpha_cutoff = read_f32(r)?;
    let alpha_mode = AlphaMode::from_u32(read_u32(r)?)?;
    let opacity = read_f32(r)?;
    let blend_mode = BlendMode::from_u32(read_u32(r)?)?;
    let metallic_factor = read_f32(r)?;
    let roughness_factor = read_f32(r)?;
    let emissive_color_intensity = read_color4(r)?;
    let ambient_color = read_color4(r)?;
    let ior = read_f32(r)?;
    let double_sided = read_bool32(r)?;
    let name = read_name(r)?;
    let textures = TextureSlots::read(r)?;
    Ok(Material {
        id: Id::from_bytes(id_bytes),
        ty,
        pbr: PbrMetallicRoughness {
            base_color,
            alpha_cutoff,
            alpha_mode,
            opacity,
            blend_mode,
            metallic_factor,
            roughness_factor,
            emissive_color_intensity,
            ambient_color,
            ior,
            double_sided,
            textures,
        },
        name,
    })
}

fn read_f32<R: Read>(r: &mut R) -> AssetResult<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_color4<R: Read>(r: &mut R) -> AssetResult<Color4> {
    Ok(Color4::new(read_f32(r)?, read_f32(r)?, read_f32(r)?, read_f32(r)?))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn round_trips_defaults() {
        let mat = Material {
            id: crate::id::id_from_path("imported/material/box_default"),
            ty: MaterialType::PbrMetallicRoughness,
            name: "box_Default".into(),
            ..Default::default()
        };
        let mut buf = Vec::new();
        write_material(&mat, &mut buf).unwrap();
        let loaded = read_material(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.name, "box_Default");
        assert_eq!(loaded.pbr.base_color.to_array(), [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(loaded.pbr.alpha_mode, AlphaMode::Opaque);
        assert!(loaded.pbr.textures.base_color.is_nil());
    }

    #[test]
    fn texture_slots_round_trip_non_nil_ids() {
        let mut mat = Material::default();
        mat.pbr.textures.base_color = crate::id::id_from_path("imported/texture/diffuse");
        mat.pbr.textures.normal = crate::id::id_from_path("imported/texture/normal");
        let mut buf = Vec::new();
        write_material(&mat, &mut buf).unwrap();
        let loaded = read_material(&mut Cursor::new(buf)).unwrap();
        assert_eq!(loaded.pbr.textures.base_color, mat.pbr.textures.base_color);
        assert_eq!(loaded.pbr.textures.normal, mat.pbr.textures.normal);
        assert!(loaded.pbr.textures.metallic.is_nil());
    }
}
