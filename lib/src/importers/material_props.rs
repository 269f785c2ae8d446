//! A generic, consumption-tracking bag for a source material's raw
//! properties.
//!
//! The external scene loader hands material data to this crate as a
//! dynamically-typed property bag (mirroring the loader library's own
//! runtime-typed material property store). Rather than threading that
//! loader-specific type through the importer, properties are normalized
//! into this tagged variant, keyed by `(key, semantic, index)` exactly as
//! the source stores them. Each successful typed read marks the property
//! consumed so the importer can emit one aggregated "unhandled property"
//! warning per material instead of one line per property.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    String(String),
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Color3([f32; 3]),
    Color4([f32; 4]),
    Blob(Vec<u8>),
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct PropKey {
    pub key: String,
    pub semantic: u32,
    pub index: u32,
}

impl PropKey {
    pub fn new(key: impl Into<String>, semantic: u32, index: u32) -> Self {
        Self { key: key.into(), semantic, index }
    }

    /// Shorthand for material-global properties (no texture semantic/slot).
    pub fn simple(key: impl Into<String>) -> Self { Self::new(key, 0, 0) }
}

struct BagEntry {
    value: PropValue,
    consumed: bool,
}

/// A source material's properties, keyed by `(key, semantic, index)`.
#[derive(Default)]
pub struct MaterialPropertyBag {
    entries: HashMap<PropKey, BagEntry>,
}

impl MaterialPropertyBag {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, key: PropKey, value: PropValue) {
        self.entries.insert(key, BagEntry { value, consumed: false });
    }

    /// Looks up a property and, if present and of the expected shape, marks
    /// it consumed and returns it.
    pub fn try_get<T: FromPropValue>(&mut self, key: &str, semantic: u32, index: u32) -> Option<T> {
        let k = PropKey::new(key, semantic, index);
        let entry = self.entries.get_mut(&k)?;
        let value = T::from_prop_value(&entry.value)?;
        entry.consumed = true;
        Some(value)
    }

    pub fn try_get_simple<T: FromPropValue>(&mut self, key: &str) -> Option<T> {
        self.try_get(key, 0, 0)
    }

    /// Keys that were never successfully consumed by a typed getter.
    pub fn unconsumed_keys(&self) -> Vec<&PropKey> {
        self.entries.iter().filter(|(_, e)| !e.consumed).map(|(k, _)| k).collect()
    }
}

pub trait FromPropValue: Sized {
    fn from_prop_value(value: &PropValue) -> Option<Self>;
}

impl FromPropValue for String {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromPropValue for i32 {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropValue for f32 {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Float(v) => Some(*v),
            PropValue::Double(v) => Some(*v as f32),
            _ => None,
        }
    }
}

impl FromPropValue for f64 {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Double(v) => Some(*v),
            PropValue::Float(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl FromPropValue for bool {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropValue for [f32; 3] {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Color3(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromPropValue for [f32; 4] {
    fn from_prop_value(value: &PropValue) -> Option<Self> {
        match value {
            PropValue::Color4(v) => Some(*v),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_on_successful_typed_read() {
        let mut bag = MaterialPropertyBag::new();
        bag.insert(PropKey::simple("Ns"), PropValue::Float(32.0));
        bag.insert(PropKey::simple("unused"), PropValue::Bool(true));

        let ns: Option<f32> = bag.try_get_simple("Ns");
        assert_eq!(ns, Some(32.0));

        let unconsumed = bag.unconsumed_keys();
        assert_eq!(unconsumed.len(), 1);
        assert_eq!(unconsumed[0].key, "unused");
    }

    #[test]
    fn wrong_type_read_does_not_consume() {
        let mut bag = MaterialPropertyBag::new();
        bag.insert(PropKey::simple("Ns"), PropValue::Float(32.0));
        let wrong: Option<String> = bag.try_get_simple("Ns");
        assert_eq!(wrong, None);
        assert_eq!(bag.unconsumed_keys().len(), 1);
    }
}
