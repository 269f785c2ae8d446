//! `.vimport` import descriptor: a small INI dialect recording the link
//! from a source file to its cooked output.

use std::{
    collections::BTreeMap,
    fs,
    path::Path,
};

use crate::{
    error::{AssetError, AssetResult},
    id::{self, Id},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Importer {
    Texture,
    Mesh,
}

impl Importer {
    fn as_str(&self) -> &'static str {
        match self {
            Importer::Texture => "texture",
            Importer::Mesh => "mesh",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "texture" => Some(Importer::Texture),
            "mesh" => Some(Importer::Mesh),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImportDescriptor {
    pub version: u32,
    pub importer: Importer,
    pub uid: Id,
    pub source: String,
    pub output: String,
    pub params: BTreeMap<String, String>,
}

#[derive(Copy, Clone, Eq, PartialEq)]
enum Section {
    None,
    VImport,
    Source,
    Output,
    Params,
}

pub fn parse_vimport(text: &str) -> AssetResult<ImportDescriptor> {
    let mut section = Section::None;
    let mut version: Option<u32> = None;
    let mut importer: Option<Importer> = None;
    let mut uid: Option<Id> = None;
    let mut source: Option<String> = None;
    let mut output: Option<String> = None;
    let mut params = BTreeMap::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "vimport" => Section::VImport,
                "source" => Section::Source,
                "output" => Section::Output,
                "params" => Section::Params,
                _ => Section::None,
            };
            continue;
        }
        let Some((key, value)) = line.split_once('=') else { continue };
        let key = key.trim();
        let value = strip_quotes(value.trim());
        match section {
            Section::VImport => match key {
                "version" => version = value.parse().ok(),
                "importer" => importer = Importer::parse(value),
                "uid" => uid = id::try_parse(value).ok(),
                _ => {}
            },
            Section::Source => {
                if key == "file" {
                    source = Some(value.to_string());
                }
            }
            Section::Output => {
                if key == "file" {
                    output = Some(value.to_string());
                }
            }
            Section::Params => {
                params.insert(key.to_string(), value.to_string());
            }
            Section::None => {}
        }
    }

    let importer = importer.ok_or_else(|| invalid("missing or unknown [vimport] importer"))?;
    let uid = uid.filter(|u| !u.is_nil()).ok_or_else(|| invalid("missing or invalid [vimport] uid"))?;
    let source = source.filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing [source] file"))?;
    let output = output.filter(|s| !s.is_empty()).ok_or_else(|| invalid("missing [output] file"))?;

    Ok(ImportDescriptor { version: version.unwrap_or(1), importer, uid, source, output, params })
}

fn invalid(msg: &str) -> AssetError { AssetError::InvalidImportFile(msg.to_string()) }

fn strip_quotes(s: &str) -> &str {
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        if (bytes[0] == b'"' && bytes[s.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[s.len() - 1] == b'\'')
        {
            return &s[1..s.len() - 1];
        }
    }
    s
}

pub fn save_vimport_string(desc: &ImportDescriptor) -> String {
    let mut out = String::new();
    out.push_str("[vimport]\n");
    out.push_str(&format!("version={}\n", desc.version));
    out.push_str(&format!("importer=\"{}\"\n", desc.importer.as_str()));
    out.push_str(&format!("uid=\"{}\"\n\n", desc.uid));
    out.push_str("[source]\n");
    out.push_str(&format!("file=\"{}\"\n\n", desc.source));
    out.push_str("[output]\n");
    out.push_str(&format!("file=\"{}\"\n\n", desc.output));
    out.push_str("[params]\n");
    for (k, v) in &desc.params {
        out.push_str(&format!("{k}={v}\n"));
    }
    out
}

pub fn load_vimport<P: AsRef<Path>>(path: P) -> AssetResult<ImportDescriptor> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AssetError::NotFound(path.display().to_string())
        } else {
            AssetError::IoError(e)
        }
    })?;
    parse_vimport(&text)
}

pub fn save_vimport<P: AsRef<Path>>(desc: &ImportDescriptor, path: P) -> AssetResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, save_vimport_string(desc))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_descriptor() {
        let text = r#"
            # comment
            [vimport]
            version=1
            importer="mesh"
            uid="f47ac10b-58cc-4372-a567-0e02b2c3d479"

            [source]
            file="models/box.obj"

            [output]
            file="imported/mesh/box.vmesh"

            [params]
            generateMeshlets=true
        "#;
        let desc = parse_vimport(text).unwrap();
        assert_eq!(desc.importer, Importer::Mesh);
        assert_eq!(desc.source, "models/box.obj");
        assert_eq!(desc.output, "imported/mesh/box.vmesh");
        assert_eq!(desc.params.get("generateMeshlets").map(String::as_str), Some("true"));
    }

    #[test]
    fn rejects_missing_uid() {
        let text = "[vimport]\nimporter=\"mesh\"\n[source]\nfile=\"a\"\n[output]\nfile=\"b\"\n";
        assert!(matches!(parse_vimport(text), Err(AssetError::InvalidImportFile(_))));
    }

    #[test]
    fn rejects_nil_uid() {
        let text = "[vimport]\nimporter=\"mesh\"\nuid=\"00000000-0000-0000-0000-000000000000\"\n[source]\nfile=\"a\"\n[output]\nfile=\"b\"\n";
        assert!(matches!(parse_vimport(text), Err(AssetError::InvalidImportFile(_))));
    }

    #[test]
    fn round_trips_through_save_and_parse() {
        let desc = ImportDescriptor {
            version: 1,
            importer: Importer::Texture,
            uid: id::id_from_path("tex/awesome.png"),
            source: "tex/awesome.png".into(),
            output: "imported/texture/awesome".into(),
            params: BTreeMap::from([("generateMipmaps".to_string(), "false".to_string())]),
        };
        let text = save_vimport_string(&desc);
        let parsed = parse_vimport(&text).unwrap();
        assert_eq!(parsed.uid, desc.uid);
        assert_eq!(parsed.source, desc.source);
        assert_eq!(parsed.params, desc.params);
    }
}
