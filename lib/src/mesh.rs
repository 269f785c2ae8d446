//! Cooked mesh data model and its `VMESH` binary codec.
//!
//! The on-disk file is a small container (`magic`, `version`, `flags`,
//! `rawSize`) wrapping an inner, optionally zstd-compressed payload that is
//! itself `VMESH`-magic-prefixed. See the format notes in the crate's design
//! document for the full field layout.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

use crate::{
    binformat::{
        expect_magic, read_bytes_field, read_name, read_u32, read_u32_vec, write_bytes_field,
        write_magic, write_name, write_u32, write_u32_vec,
    },
    error::{AssetError, AssetResult},
    id::Id,
    math::{Vec2, Vec3, Vec4},
};

pub const MAGIC: &str = "VMESH";
const CONTAINER_VERSION: u32 = 1;
const FLAG_COMPRESSED: u32 = 1 << 0;

/// Minimal bitflags implementation matching the flag set the original format
/// uses (`eNone`, `eGeneral`, `eAll`), without pulling in the `bitflags`
/// crate for eight fixed bits.
macro_rules! bitflags_like {
    (
        $(#[$meta:meta])*
        pub struct $name:ident: $ty:ty {
            $(const $variant:ident = $value:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
        pub struct $name(pub $ty);

        impl $name {
            pub const NONE: Self = Self(0);
            $(pub const $variant: Self = Self($value);)*

            pub fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

            pub fn insert(&mut self, other: Self) { self.0 |= other.0; }

            pub fn bits(self) -> $ty { self.0 }

            pub fn from_bits(bits: $ty) -> Self { Self(bits) }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
        }
    };
}

bitflags_like! {
    /// Which parallel vertex attribute streams are present, and in which
    /// order they appear in the interleaved-by-kind payload.
    pub struct VertexFlags: u32 {
        const POSITION = 1 << 0;
        const NORMAL = 1 << 1;
        const COLOR = 1 << 2;
        const TEX_COORD_0 = 1 << 3;
        const TEX_COORD_1 = 1 << 4;
        const TANGENT = 1 << 5;
        const JOINT_INDICES = 1 << 6;
        const JOINT_WEIGHTS = 1 << 7;
    }
}

impl VertexFlags {
    pub const GENERAL: Self =
        Self(Self::POSITION.0 | Self::NORMAL.0 | Self::TEX_COORD_0.0 | Self::TANGENT.0);
    pub const ALL: Self = Self(
        Self::POSITION.0
            | Self::NORMAL.0
            | Self::COLOR.0
            | Self::TEX_COORD_0.0
            | Self::TEX_COORD_1.0
            | Self::TANGENT.0
            | Self::JOINT_INDICES.0
            | Self::JOINT_WEIGHTS.0,
    );
}

/// Fixed order attribute streams are read/written in, matching the
/// declaration order of [`VertexFlags`].
const ATTRIBUTE_ORDER: [VertexFlags; 8] = [
    VertexFlags::POSITION,
    VertexFlags::NORMAL,
    VertexFlags::COLOR,
    VertexFlags::TEX_COORD_0,
    VertexFlags::TEX_COORD_1,
    VertexFlags::TANGENT,
    VertexFlags::JOINT_INDICES,
    VertexFlags::JOINT_WEIGHTS,
];

#[derive(Clone, Debug, Default)]
pub struct VertexStreams {
    pub position: Vec<Vec3>,
    pub normal: Vec<Vec3>,
    pub color: Vec<Vec3>,
    pub tex_coord_0: Vec<Vec2>,
    pub tex_coord_1: Vec<Vec2>,
    /// `w` encodes handedness and must be `-1.0` or `1.0`.
    pub tangent: Vec<Vec4>,
    pub joint_indices: Vec<Vec4>,
    pub joint_weights: Vec<Vec4>,
}

impl VertexStreams {
    fn flags(&self) -> VertexFlags {
        let mut flags = VertexFlags::NONE;
        if !self.position.is_empty() {
            flags.insert(VertexFlags::POSITION);
        }
        if !self.normal.is_empty() {
            flags.insert(VertexFlags::NORMAL);
        }
        if !self.color.is_empty() {
            flags.insert(VertexFlags::COLOR);
        }
        if !self.tex_coord_0.is_empty() {
            flags.insert(VertexFlags::TEX_COORD_0);
        }
        if !self.tex_coord_1.is_empty() {
            flags.insert(VertexFlags::TEX_COORD_1);
        }
        if !self.tangent.is_empty() {
            flags.insert(VertexFlags::TANGENT);
        }
        if !self.joint_indices.is_empty() {
            flags.insert(VertexFlags::JOINT_INDICES);
        }
        if !self.joint_weights.is_empty() {
            flags.insert(VertexFlags::JOINT_WEIGHTS);
        }
        flags
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct Meshlet {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub triangle_offset: u32,
    pub triangle_count: u32,
    pub material_index: u32,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Clone, Debug, Default)]
pub struct MeshletGroup {
    pub meshlets: Vec<Meshlet>,
    /// Indirection table into the submesh's (and mesh's) vertex streams.
    pub meshlet_vertices: Vec<u32>,
    /// Local `0..vertexCount-1` indices, 3 per triangle. Each meshlet's
    /// region is padded so its byte length is a multiple of 4.
    pub meshlet_triangles: Vec<u8>,
}

#[derive(Clone, Debug, Default)]
pub struct SubMesh {
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub index_offset: u32,
    pub index_count: u32,
    pub material_index: u32,
    pub meshlets: MeshletGroup,
    pub name: String,
}

#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub id: Id,
    pub streams: VertexStreams,
    pub indices: Vec<u32>,
    pub sub_meshes: Vec<SubMesh>,
    pub materials: Vec<Id>,
    pub name: String,
}

impl Mesh {
    pub fn vertex_count(&self) -> u32 { self.streams.position.len() as u32 }

    /// Checks the range/length invariants a cooked mesh must satisfy.
    pub fn validate(&self) -> AssetResult<()> {
        let vertex_count = self.vertex_count();
        let flags = self.streams.flags();
        for flag in ATTRIBUTE_ORDER {
            let len = self.stream_len(flag);
            if flags.contains(flag) && len != vertex_count as usize {
                return Err(AssetError::InvalidFormat(format!(
                    "vertex stream length {len} does not match vertexCount {vertex_count}"
                )));
            }
        }
        if self.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidFormat("index count is not a multiple of 3".into()));
        }
        for sub in &self.sub_meshes {
            if sub.vertex_offset + sub.vertex_count > vertex_count {
                return Err(AssetError::InvalidFormat("submesh vertex range out of bounds".into()));
            }
            let index_end = sub.index_offset as usize + sub.index_count as usize;
            if index_end > self.indices.len() {
                return Err(AssetError::InvalidFormat("submesh index range out of bounds".into()));
            }
            for &idx in &self.indices[sub.index_offset as usize..index_end] {
                if idx >= vertex_count {
                    return Err(AssetError::InvalidFormat("index out of vertex range".into()));
                }
            }
            if sub.material_index as usize >= self.materials.len() {
                return Err(AssetError::InvalidFormat("submesh materialIndex out of range".into()));
            }
        }
        Ok(())
    }

    fn stream_len(&self, flag: VertexFlags) -> usize {
        match flag {
            VertexFlags::POSITION => self.streams.position.len(),
            VertexFlags::NORMAL => self.streams.normal.len(),
            VertexFlags::COLOR => self.streams.color.len(),
            VertexFlags::TEX_COORD_0 => self.streams.tex_coord_0.len(),
            VertexFlags::TEX_COORD_1 => self.streams.tex_coord_1.len(),
            VertexFlags::TANGENT => self.streams.tangent.len(),
            VertexFlags::JOINT_INDICES => self.streams.joint_indices.len(),
            VertexFlags::JOINT_WEIGHTS => self.streams.joint_weights.len(),
            _ => 0,
        }
    }
}

/// Rounds a meshlet's triangle byte count up to a multiple of 4.
///
/// The source format is ambiguous about whether padding is computed per
/// meshlet or over the whole stream; this crate rounds per meshlet, which is
/// the only choice that keeps each meshlet's triangle region independently
/// addressable.
pub fn padded_triangle_bytes(triangle_count: u32) -> u32 {
    let raw = triangle_count * 3;
    (raw + 3) & !3
}

pub fn save_mesh<P: AsRef<Path>>(mesh: &Mesh, path: P, zstd_level: i32) -> AssetResult<()> {
    mesh.validate()?;
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut w = BufWriter::new(File::create(path)?);
    write_mesh(mesh, &mut w, zstd_level)?;
    w.flush()?;
    Ok(())
}

pub fn write_mesh<W: Write>(mesh: &Mesh, w: &mut W, zstd_level: i32) -> AssetResult<()> {
    let mut payload = Vec::new();
    write_payload(mesh, &mut payload)?;

    write_magic(w, MAGIC)?;
    write_u32(w, CONTAINER_VERSION)?;
    if zstd_level > 0 {
        let compressed = zstd::encode_all(Cursor::new(&payload), zstd_level)
            .map_err(AssetError::IoError)?;
        write_u32(w, FLAG_COMPRESSED)?;
        w.write_all(&(payload.len() as u64).to_le_bytes())?;
        w.write_all(&compressed)?;
    } else {
        write_u32(w, 0)?;
        w.write_all(&(payload.len() as u64).to_le_bytes())?;
        w.write_all(&payload)?;
    }
    Ok(())
}

fn write_payload<W: Write>(mesh: &Mesh, w: &mut W) -> AssetResult<()> {
    write_magic(w, MAGIC)?;
    w.write_all(mesh.id.as_bytes())?;
    let vertex_count = mesh.vertex_count();
    write_u32(w, vertex_count)?;
    let flags = mesh.streams.flags();
    write_u32(w, flags.bits())?;
    if flags.contains(VertexFlags::POSITION) {
        write_vec3_stream(w, &mesh.streams.position)?;
    }
    if flags.contains(VertexFlags::NORMAL) {
        write_vec3_stream(w, &mesh.streams.normal)?;
    }
    if flags.contains(VertexFlags::COLOR) {
        write_vec3_stream(w, &mesh.streams.color)?;
    }
    if flags.contains(VertexFlags::TEX_COORD_0) {
        write_vec2_stream(w, &mesh.streams.tex_coord_0)?;
    }
    if flags.contains(VertexFlags::TEX_COORD_1) {
        write_vec2_stream(w, &mesh.streams.tex_coord_1)?;
    }
    if flags.contains(VertexFlags::TANGENT) {
        write_vec4_stream(w, &mesh.streams.tangent)?;
    }
    if flags.contains(VertexFlags::JOINT_INDICES) {
        write_vec4_stream(w, &mesh.streams.joint_indices)?;
    }
    if flags.contains(VertexFlags::JOINT_WEIGHTS) {
        write_vec4_stream(w, &mesh.streams.joint_weights)?;
    }
    write_u32_vec(w, &mesh.indices)?;
    write_u32(w, mesh.sub_meshes.len() as u32)?;
    for sub in &mesh.sub_meshes {
        write_submesh(w, sub)?;
    }
    write_u32(w, mesh.materials.len() as u32)?;
    for id in &mesh.materials {
        w.write_all(id.as_bytes())?;
    }
    write_name(w, &mesh.name)?;
    Ok(())
}

fn write_submesh<W: Write>(w: &mut W, sub: &SubMesh) -> AssetResult<()> {
    write_u32(w, sub.vertex_offset)?;
    write_u32(w, sub.vertex_count)?;
    write_u32(w, sub.index_offset)?;
    write_u32(w, sub.index_count)?;
    write_u32(w, sub.material_index)?;
    write_u32(w, sub.meshlets.meshlets.len() as u32)?;
    for m in &sub.meshlets.meshlets {
        write_meshlet(w, m)?;
    }
    write_u32_vec(w, &sub.meshlets.meshlet_vertices)?;
    write_bytes_field(w, &sub.meshlets.meshlet_triangles)?;
    write_name(w, &sub.name)?;
    Ok(())
}

fn write_meshlet<W: Write>(w: &mut W, m: &Meshlet) -> AssetResult<()> {
    write_u32(w, m.vertex_offset)?;
    write_u32(w, m.vertex_count)?;
    write_u32(w, m.triangle_offset)?;
    write_u32(w, m.triangle_count)?;
    write_u32(w, m.material_index)?;
    for v in m.center.to_array() {
        w.write_all(&v.to_le_bytes())?;
    }
    w.write_all(&m.radius.to_le_bytes())?;
    Ok(())
}

fn write_vec3_stream<W: Write>(w: &mut W, values: &[Vec3]) -> AssetResult<()> {
    for v in values {
        for c in v.to_array() {
            w.write_all(&c.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_vec2_stream<W: Write>(w: &mut W, values: &[Vec2]) -> AssetResult<()> {
    for v in values {
        for c in v.to_array() {
            w.write_all(&c.to_le_bytes())?;
        }
    }
    Ok(())
}

fn write_vec4_stream<W: Write>(w: &mut W, values: &[Vec4]) -> AssetResult<()> {
    for v in values {
        for c in v.to_array() {
            w.write_all(&c.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn load_mesh<P: AsRef<Path>>(path: P) -> AssetResult<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.display().to_string())
        } else {
            AssetError::IoError(e)
        }
    })?;
    let mut r = BufReader::new(file);
    read_mesh(&mut r)
}

/// Reads a cooked mesh directly from an in-memory buffer, as when it has
/// just been produced by an importer and not yet touched disk.
pub fn load_mesh_from_memory(data: &[u8]) -> AssetResult<Mesh> { read_mesh(&mut Cursor::new(data)) }

pub fn read_mesh<R: Read>(r: &mut R) -> AssetResult<Mesh> {
    expect_magic(r, MAGIC)?;
    let version = read_u32(r)?;
    if version != CONTAINER_VERSION {
        return Err(AssetError::InvalidFormat(format!("unsupported VMESH container version {version}")));
    }
    let flags = read_u32(r)?;
    let raw_size = {
        let mut buf = [0u8; 8];
        r.read_exact(&mut buf)?;
        u64::from_le_bytes(buf)
    };
    let mut rest = Vec::new();
    r.read_to_end(&mut rest)?;
    let payload = if flags & FLAG_COMPRESSED != 0 {
        let decompressed = zstd::decode_all(Cursor::new(&rest)).map_err(AssetError::IoError)?;
        if decompressed.len() as u64 != raw_size {
            return Err(AssetError::InvalidFormat(
                "decompressed VMESH payload size does not match rawSize".into(),
            ));
        }
        decompressed
    } else {
        if rest.len() as u64 != raw_size {
            return Err(AssetError::InvalidFormat("raw VMESH payload size does not match rawSize".into()));
        }
        rest
    };
    let mut cursor = Cursor::new(payload);
    let mesh = read_payload(&mut cursor)?;
    mesh.validate()?;
    Ok(mesh)
}

fn read_payload<R: Read>(r: &mut R) -> AssetResult<Mesh> {
    expect_magic(r, MAGIC)?;
    let mut id_bytes = [0u8; 16];
    r.read_exact(&mut id_bytes)?;
    let vertex_count = read_u32(r)?;
    let flags = VertexFlags::from_bits(read_u32(r)?);

    let mut streams = VertexStreams::default();
    if flags.contains(VertexFlags::POSITION) {
        streams.position = read_vec3_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::NORMAL) {
        streams.normal = read_vec3_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::COLOR) {
        streams.color = read_vec3_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::TEX_COORD_0) {
        streams.tex_coord_0 = read_vec2_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::TEX_COORD_1) {
        streams.tex_coord_1 = read_vec2_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::TANGENT) {
        streams.tangent = read_vec4_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::JOINT_INDICES) {
        streams.joint_indices = read_vec4_stream(r, vertex_count)?;
    }
    if flags.contains(VertexFlags::JOINT_WEIGHTS) {
        streams.joint_weights = read_vec4_stream(r, vertex_count)?;
    }

    let indices = read_u32_vec(r)?;
    let sub_mesh_count = read_u32(r)?;
    let mut sub_meshes = Vec::with_capacity(sub_mesh_count as usize);
    for _ in 0..sub_mesh_count {
        sub_meshes.push(read_submesh(r)?);
    }
    let material_count = read_u32(r)?;
    let mut materials = Vec::with_capacity(material_count as usize);
    for _ in 0..material_count {
        let mut buf = [0u8; 16];
        r.read_exact(&mut buf)?;
        materials.push(Id::from_bytes(buf));
    }
    let name = read_name(r)?;

    Ok(Mesh { id: Id::from_bytes(id_bytes), streams, indices, sub_meshes, materials, name })
}

fn read_submesh<R: Read>(r: &mut R) -> AssetResult<SubMesh> {
    let vertex_offset = read_u32(r)?;
    let vertex_count = read_u32(r)?;
    let index_offset = read_u32(r)?;
    let index_count = read_u32(r)?;
    let material_index = read_u32(r)?;
    let meshlet_count = read_u32(r)?;
    let mut meshlets = Vec::with_capacity(meshlet_count as usize);
    for _ in 0..meshlet_count {
        meshlets.push(read_meshlet(r)?);
    }
    let meshlet_vertices = read_u32_vec(r)?;
    let meshlet_triangles = read_bytes_field(r)?;
    let name = read_name(r)?;
    Ok(SubMesh {
        vertex_offset,
        vertex_count,
        index_offset,
        index_count,
        material_index,
        meshlets: MeshletGroup { meshlets, meshlet_vertices, meshlet_triangles },
        name,
    })
}

fn read_meshlet<R: Read>(r: &mut R) -> AssetResult<Meshlet> {
    let vertex_offset = read_u32(r)?;
    let vertex_count = read_u32(r)?;
    let triangle_offset = read_u32(r)?;
    let triangle_count = read_u32(r)?;
    let material_index = read_u32(r)?;
    let center = Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?);
    let radius = read_f32(r)?;
    Ok(Meshlet { vertex_offset, vertex_count, triangle_offset, triangle_count, material_index, center, radius })
}

fn read_f32<R: Read>(r: &mut R) -> AssetResult<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_vec3_stream<R: Read>(r: &mut R, count: u32) -> AssetResult<Vec<Vec3>> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(Vec3::new(read_f32(r)?, read_f32(r)?, read_f32(r)?));
    }
    Ok(out)
}

fn read_vec2_stream<R: Read>(r: &mut R, count: u32) -> AssetResult<Vec<Vec2>> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(Vec2::new(read_f32(r)?, read_f32(r)?));
    }
    Ok(out)
}

fn read_vec4_stream<R: Read>(r: &mut R, count: u32) -> AssetResult<Vec<Vec4>> {
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(Vec4::new(read_f32(r)?, read_f32(r)?, read_f32(r)?, read_f32(r)?));
    }
    Ok(out)
}
