//! The asset registry: the persistent mapping from a stable [`Id`] to the
//! `(kind, cooked path)` pair that identity resolves to.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    error::{AssetError, AssetResult},
    id::{self, Id},
};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Unknown,
    Texture,
    Material,
    Mesh,
}

#[derive(Clone, Debug)]
struct Entry {
    kind: AssetKind,
    path: String,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<Id, Entry>,
    asset_root: PathBuf,
    imported_folder_name: String,
}

impl Registry {
    pub fn new() -> Self { Self { imported_folder_name: "imported".to_string(), ..Default::default() } }

    pub fn set_asset_root<P: Into<PathBuf>>(&mut self, root: P) { self.asset_root = root.into(); }

    pub fn asset_root(&self) -> &Path { &self.asset_root }

    pub fn set_imported_folder_name<S: Into<String>>(&mut self, name: S) {
        self.imported_folder_name = name.into();
    }

    pub fn register(&mut self, id: Id, path: impl Into<String>, kind: AssetKind) -> AssetResult<()> {
        self.entries.insert(id, Entry { kind, path: path.into() });
        Ok(())
    }

    pub fn update(&mut self, id: Id, new_path: impl Into<String>) -> AssetResult<()> {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.path = new_path.into();
                Ok(())
            }
            None => Err(AssetError::NotFound(id.to_string())),
        }
    }

    pub fn unregister(&mut self, id: Id) -> AssetResult<()> {
        if self.entries.remove(&id).is_some() {
            Ok(())
        } else {
            Err(AssetError::NotFound(id.to_string()))
        }
    }

    pub fn lookup(&self, id: Id) -> Option<(AssetKind, &str)> {
        self.entries.get(&id).map(|e| (e.kind, e.path.as_str()))
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Resolves a logical path recorded by the registry to a path on disk.
    pub fn source_path(&self, full_path: &Path, relative: bool) -> PathBuf {
        if relative {
            full_path.to_path_buf()
        } else {
            self.asset_root.join(full_path)
        }
    }

    /// `"<imported>/<kind>/<name>"`, optionally prefixed with the asset
    /// root. An empty `name` is replaced with a fresh random id so callers
    /// always get a unique path.
    pub fn imported_path(&self, kind: AssetKind, name: &str, relative: bool) -> String {
        let name = if name.is_empty() { id::id_random().to_string() } else { name.to_string() };
        let rel = format!("{}/{}/{}", self.imported_folder_name, kind, name);
        if relative {
            rel
        } else {
            self.asset_root.join(&rel).to_string_lossy().into_owned()
        }
    }

    /// Writes the registry as tab-separated `<uuid>\t<kind>\t<path>` lines.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> AssetResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::from("# vasset registry\n");
        for (id, entry) in &self.entries {
            out.push_str(&format!("{}\t{}\t{}\n", id, entry.kind, entry.path));
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Loads a tab-separated registry file. Malformed lines are skipped.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> AssetResult<()> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AssetError::NotFound(path.display().to_string())
            } else {
                AssetError::IoError(e)
            }
        })?;
        self.entries.clear();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.splitn(3, '\t');
            let (Some(id_str), Some(kind_str), Some(path_str)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let Ok(id) = id::try_parse(id_str) else { continue };
            let Ok(kind) = kind_str.parse::<AssetKind>() else { continue };
            self.entries.insert(id, Entry { kind, path: path_str.to_string() });
        }
        Ok(())
    }

    /// Removes entries whose cooked file no longer exists under the asset
    /// root. Never deletes a file.
    pub fn cleanup(&mut self) {
        let root = self.asset_root.clone();
        self.entries.retain(|id, entry| {
            let exists = root.join(&entry.path).exists();
            if !exists {
                log::warn!("registry entry {id} ({}) has no cooked file; removing", entry.path);
            }
            exists
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, AssetKind, &str)> {
        self.entries.iter().map(|(id, e)| (*id, e.kind, e.path.as_str()))
    }
}
