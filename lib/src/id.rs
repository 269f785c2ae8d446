use std::fmt;

use uuid::Uuid;

/// Stable 128-bit identity for a cooked asset.
///
/// Derived either from a path (`id_from_path`), from a bare name
/// (`id_from_name`), or drawn uniformly at random (`id_random`). The textual
/// form reuses UUID's canonical 8-4-4-4-12 grouping purely for its layout;
/// the bytes themselves are never produced by a UUID generator except in the
/// `id_random` case.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct Id(pub [u8; 16]);

impl Id {
    pub const NIL: Id = Id([0; 16]);

    pub fn is_nil(self) -> bool { self.0 == [0; 16] }

    pub fn from_bytes(bytes: [u8; 16]) -> Self { Id(bytes) }

    pub fn as_bytes(&self) -> &[u8; 16] { &self.0 }
}

/// Draws a uniformly distributed id from OS entropy.
pub fn id_random() -> Id { Id(*Uuid::new_v4().as_bytes()) }

/// Derives a stable id from a filesystem-like path.
///
/// The path is normalized (backslashes become forward slashes, ASCII is
/// lower-cased) before hashing so that two spellings of the same path always
/// collapse to the same identity.
pub fn id_from_path<S: AsRef<str>>(path: S) -> Id {
    let normalized = normalize_path(path.as_ref());
    hash_bytes(normalized.as_bytes())
}

/// Derives a stable id from a bare name, without path normalization.
pub fn id_from_name<S: AsRef<str>>(name: S) -> Id { hash_bytes(name.as_ref().as_bytes()) }

fn normalize_path(path: &str) -> String {
    path.chars()
        .map(|c| if c == '\\' { '/' } else { c })
        .collect::<String>()
        .to_ascii_lowercase()
}

fn hash_bytes(bytes: &[u8]) -> Id {
    let hash = xxhash_rust::xxh3::xxh3_128(bytes);
    Id(hash.to_le_bytes())
}

#[derive(thiserror::Error, Debug)]
#[error("invalid id string: {0}")]
pub struct ParseIdError(String);

/// Parses the canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` text form.
pub fn try_parse(s: &str) -> Result<Id, ParseIdError> {
    Uuid::parse_str(s).map(|u| Id(*u.as_bytes())).map_err(|_| ParseIdError(s.to_string()))
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Id({})", self) }
}

impl std::str::FromStr for Id {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { try_parse(s) }
}
