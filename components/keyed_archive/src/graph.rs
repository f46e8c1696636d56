//! Expanded object graph
//!
//! The graph is an arena indexed by original `$objects` position. Following
//! a [`ArchiveValue::Ref`] always lands on the same slot, so shared and
//! cyclic structures are represented without duplication.

use crate::value::{ArchiveValue, ObjectRef};

static NULL: ArchiveValue = ArchiveValue::Null;

/// Result of expanding a keyed archive
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectGraph {
    objects: Vec<ArchiveValue>,
    top: ArchiveValue,
}

impl ObjectGraph {
    /// Build a graph from already validated parts
    pub(crate) fn new(objects: Vec<ArchiveValue>, top: ArchiveValue) -> Self {
        Self { objects, top }
    }

    /// The archive's `$top` entry point
    pub fn top(&self) -> &ArchiveValue {
        &self.top
    }

    /// Field of `$top`, dereferenced
    pub fn top_field(&self, key: &str) -> Option<&ArchiveValue> {
        self.get(&self.top, key)
    }

    pub fn objects(&self) -> &[ArchiveValue] {
        &self.objects
    }

    pub fn object(&self, r: ObjectRef) -> Option<&ArchiveValue> {
        self.objects.get(r.index())
    }

    /// Follow references until a non-reference value is reached
    ///
    /// A reference cycle made only of references resolves to `Null`.
    pub fn resolve<'a>(&'a self, value: &'a ArchiveValue) -> &'a ArchiveValue {
        let mut current = value;
        for _ in 0..=self.objects.len() {
            match current {
                ArchiveValue::Ref(r) => match self.objects.get(r.index()) {
                    Some(next) => current = next,
                    None => return &NULL,
                },
                other => return other,
            }
        }
        &NULL
    }

    /// Named field of a dictionary or record, dereferenced
    pub fn get<'a>(&'a self, value: &'a ArchiveValue, key: &str) -> Option<&'a ArchiveValue> {
        let field = match self.resolve(value) {
            ArchiveValue::Dictionary(map) => map.get(key),
            ArchiveValue::Record(record) => record.fields.get(key),
            _ => None,
        }?;
        Some(self.resolve(field))
    }

    /// Dereferenced elements of an array
    pub fn array<'a>(&'a self, value: &'a ArchiveValue) -> Option<Vec<&'a ArchiveValue>> {
        match self.resolve(value) {
            ArchiveValue::Array(items) => Some(items.iter().map(|item| self.resolve(item)).collect()),
            _ => None,
        }
    }

    /// Dereferenced key/value pairs of a map or dictionary
    pub fn entries<'a>(
        &'a self,
        value: &'a ArchiveValue,
    ) -> Option<Vec<(MapKey<'a>, &'a ArchiveValue)>> {
        match self.resolve(value) {
            ArchiveValue::Map(entries) => Some(
                entries
                    .iter()
                    .map(|(key, value)| (MapKey::Value(self.resolve(key)), self.resolve(value)))
                    .collect(),
            ),
            ArchiveValue::Dictionary(map) => Some(
                map.iter()
                    .map(|(key, value)| (MapKey::Name(key), self.resolve(value)))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Value stored under an integer key of a map
    pub fn map_get_int<'a>(&'a self, value: &'a ArchiveValue, key: i64) -> Option<&'a ArchiveValue> {
        self.entries(value)?
            .into_iter()
            .find(|(k, _)| k.as_integer() == Some(key))
            .map(|(_, v)| v)
    }

    /// Value stored under a string key of a map or dictionary
    pub fn map_get_str<'a>(&'a self, value: &'a ArchiveValue, key: &str) -> Option<&'a ArchiveValue> {
        self.entries(value)?
            .into_iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn str<'a>(&'a self, value: &'a ArchiveValue) -> Option<&'a str> {
        match self.resolve(value) {
            ArchiveValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value; integral reals are accepted
    pub fn integer(&self, value: &ArchiveValue) -> Option<i64> {
        match self.resolve(value) {
            ArchiveValue::Integer(i) => Some(*i),
            ArchiveValue::Real(r) if r.fract() == 0.0 && r.is_finite() => Some(*r as i64),
            _ => None,
        }
    }

    /// True if both values reference the same arena slot
    pub fn same_object(&self, a: &ArchiveValue, b: &ArchiveValue) -> bool {
        match (a.as_object_ref(), b.as_object_ref()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Key of a map entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapKey<'a> {
    Name(&'a str),
    Value(&'a ArchiveValue),
}

impl<'a> MapKey<'a> {
    pub fn as_str(&self) -> Option<&'a str> {
        match *self {
            MapKey::Name(name) => Some(name),
            MapKey::Value(ArchiveValue::String(s)) => Some(s.as_str()),
            MapKey::Value(_) => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            MapKey::Value(ArchiveValue::Integer(i)) => Some(*i),
            MapKey::Value(ArchiveValue::Real(r)) if r.fract() == 0.0 => Some(*r as i64),
            _ => None,
        }
    }
}
