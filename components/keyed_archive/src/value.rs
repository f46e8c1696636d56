//! Values of an expanded keyed archive

use plist_reader::PlistValue;
use std::collections::BTreeMap;

/// Index of an object in the archive's `$objects` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef(pub(crate) usize);

impl ObjectRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A class-specific record produced by a class interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub class_name: String,
    pub fields: BTreeMap<String, ArchiveValue>,
}

impl Record {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field insertion
    pub fn with_field(mut self, name: &str, value: ArchiveValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }
}

/// One node of the expanded object graph
///
/// Cross-object links are `Ref`s into the graph's arena; everything else is
/// owned inline.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    /// Seconds since 2001-01-01T00:00:00Z
    Date(f64),
    Data(Vec<u8>),
    String(String),
    Ref(ObjectRef),
    Array(Vec<ArchiveValue>),
    /// String-keyed mapping; also the shape of objects no interpreter claimed
    Dictionary(BTreeMap<String, ArchiveValue>),
    /// Ordered key/value pairs with arbitrary keys
    Map(Vec<(ArchiveValue, ArchiveValue)>),
    Record(Record),
}

impl ArchiveValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ArchiveValue::Null => "null",
            ArchiveValue::Bool(_) => "bool",
            ArchiveValue::Integer(_) => "integer",
            ArchiveValue::Real(_) => "real",
            ArchiveValue::Date(_) => "date",
            ArchiveValue::Data(_) => "data",
            ArchiveValue::String(_) => "string",
            ArchiveValue::Ref(_) => "ref",
            ArchiveValue::Array(_) => "array",
            ArchiveValue::Dictionary(_) => "dictionary",
            ArchiveValue::Map(_) => "map",
            ArchiveValue::Record(_) => "record",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArchiveValue::Null)
    }

    pub fn as_object_ref(&self) -> Option<ObjectRef> {
        match self {
            ArchiveValue::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Collect every arena reference held inline by this value
    pub fn collect_refs(&self, out: &mut Vec<ObjectRef>) {
        match self {
            ArchiveValue::Ref(r) => out.push(*r),
            ArchiveValue::Array(items) => items.iter().for_each(|item| item.collect_refs(out)),
            ArchiveValue::Dictionary(map) => map.values().for_each(|value| value.collect_refs(out)),
            ArchiveValue::Map(entries) => {
                for (key, value) in entries {
                    key.collect_refs(out);
                    value.collect_refs(out);
                }
            }
            ArchiveValue::Record(record) => {
                record.fields.values().for_each(|value| value.collect_refs(out))
            }
            _ => {}
        }
    }
}

impl From<PlistValue> for ArchiveValue {
    fn from(value: PlistValue) -> Self {
        match value {
            PlistValue::Null => ArchiveValue::Null,
            PlistValue::Bool(b) => ArchiveValue::Bool(b),
            PlistValue::Integer(i) => ArchiveValue::Integer(i),
            PlistValue::Real(r) => ArchiveValue::Real(r),
            PlistValue::Date(d) => ArchiveValue::Date(d),
            PlistValue::Data(bytes) => ArchiveValue::Data(bytes),
            PlistValue::String(s) => ArchiveValue::String(s),
            // Oversized UIDs become unreachable indices and fail range validation
            PlistValue::Uid(uid) => ArchiveValue::Ref(ObjectRef(usize::try_from(uid).unwrap_or(usize::MAX))),
            PlistValue::Array(items) => ArchiveValue::Array(items.into_iter().map(Into::into).collect()),
            PlistValue::Dictionary(map) => ArchiveValue::Dictionary(
                map.into_iter().map(|(key, value)| (key, value.into())).collect(),
            ),
        }
    }
}

impl From<Record> for ArchiveValue {
    fn from(record: Record) -> Self {
        ArchiveValue::Record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_becomes_ref() {
        let value = ArchiveValue::from(PlistValue::Uid(4));
        assert_eq!(value.as_object_ref(), Some(ObjectRef(4)));
    }

    #[test]
    fn test_collect_refs_recurses() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), ArchiveValue::Ref(ObjectRef(1)));
        let value = ArchiveValue::Array(vec![
            ArchiveValue::Dictionary(map),
            ArchiveValue::Map(vec![(ArchiveValue::Ref(ObjectRef(2)), ArchiveValue::Ref(ObjectRef(3)))]),
            ArchiveValue::Record(Record::new("X").with_field("f", ArchiveValue::Ref(ObjectRef(5)))),
            ArchiveValue::Integer(7),
        ]);

        let mut refs = Vec::new();
        value.collect_refs(&mut refs);
        assert_eq!(refs, vec![ObjectRef(1), ObjectRef(2), ObjectRef(3), ObjectRef(5)]);
    }
}
