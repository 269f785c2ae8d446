//! Shared binary codec helpers used by the cooked asset formats.
//!
//! Every cooked file is little-endian and opens with a 16-byte zero-padded
//! ASCII magic. Length-prefixed strings and byte buffers are written with a
//! `u32` count immediately followed by the raw bytes, mirroring the
//! `CStringFixed` idiom used elsewhere in this codebase.

use std::io::{self, Read, Write};

use crate::{
    error::{AssetError, AssetResult},
    id::Id,
};

/// A 16-byte, NUL-padded ASCII magic value.
pub fn write_magic<W: Write>(writer: &mut W, magic: &str) -> io::Result<()> {
    let mut buf = [0u8; 16];
    let bytes = magic.as_bytes();
    buf[..bytes.len()].copy_from_slice(bytes);
    writer.write_all(&buf)
}

pub fn read_magic<R: Read>(reader: &mut R) -> AssetResult<String> {
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(16);
    String::from_utf8(buf[..end].to_vec())
        .map_err(|_| AssetError::InvalidFormat("magic is not valid ASCII".into()))
}

pub fn expect_magic<R: Read>(reader: &mut R, expected: &str) -> AssetResult<()> {
    let found = read_magic(reader)?;
    if found != expected {
        return Err(AssetError::InvalidFormat(format!(
            "expected magic '{expected}', found '{found}'"
        )));
    }
    Ok(())
}

pub fn write_name<W: Write>(writer: &mut W, name: &str) -> io::Result<()> {
    let bytes = name.as_bytes();
    writer.write_all(&(bytes.len() as u32).to_le_bytes())?;
    writer.write_all(bytes)
}

pub fn read_name<R: Read>(reader: &mut R) -> AssetResult<String> {
    let len = read_u32(reader)?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| AssetError::InvalidFormat(e.to_string()))
}

pub fn write_bytes_field<W: Write>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    writer.write_all(&(data.len() as u32).to_le_bytes())?;
    writer.write_all(data)
}

pub fn read_bytes_field<R: Read>(reader: &mut R) -> AssetResult<Vec<u8>> {
    let len = read_u32(reader)?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn write_u32_vec<W: Write>(writer: &mut W, values: &[u32]) -> io::Result<()> {
    writer.write_all(&(values.len() as u32).to_le_bytes())?;
    for v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

pub fn read_u32_vec<R: Read>(reader: &mut R) -> AssetResult<Vec<u32>> {
    let count = read_u32(reader)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(read_u32(reader)?);
    }
    Ok(out)
}

pub fn write_u32<W: Write>(writer: &mut W, v: u32) -> io::Result<()> {
    writer.write_all(&v.to_le_bytes())
}

pub fn read_u32<R: Read>(reader: &mut R) -> AssetResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn write_u64<W: Write>(writer: &mut W, v: u64) -> io::Result<()> {
    writer.write_all(&v.to_le_bytes())
}

pub fn read_u64<R: Read>(reader: &mut R) -> AssetResult<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn write_bool32<W: Write>(writer: &mut W, v: bool) -> io::Result<()> {
    write_u32(writer, if v { 1 } else { 0 })
}

pub fn read_bool32<R: Read>(reader: &mut R) -> AssetResult<bool> { Ok(read_u32(reader)? != 0) }

pub fn write_id<W: Write>(writer: &mut W, id: Id) -> io::Result<()> { writer.write_all(&id.0) }

pub fn read_id<R: Read>(reader: &mut R) -> AssetResult<Id> {
    let mut buf = [0u8; 16];
    reader.read_exact(&mut buf)?;
    Ok(Id::from_bytes(buf))
}
