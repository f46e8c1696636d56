//! Primitive plist values

use std::collections::BTreeMap;

/// Seconds between the Unix epoch and the plist reference date (2001-01-01T00:00:00Z)
pub const APPLE_EPOCH_OFFSET_SECS: f64 = 978_307_200.0;

/// A decoded binary plist object
///
/// `Uid` is kept distinct from `Integer` so keyed-archive back-references
/// can be told apart from ordinary numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum PlistValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    /// Seconds since 2001-01-01T00:00:00Z
    Date(f64),
    Data(Vec<u8>),
    String(String),
    Array(Vec<PlistValue>),
    Dictionary(BTreeMap<String, PlistValue>),
    Uid(u64),
}

impl PlistValue {
    /// Short name of the value's type, used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            PlistValue::Null => "null",
            PlistValue::Bool(_) => "bool",
            PlistValue::Integer(_) => "integer",
            PlistValue::Real(_) => "real",
            PlistValue::Date(_) => "date",
            PlistValue::Data(_) => "data",
            PlistValue::String(_) => "string",
            PlistValue::Array(_) => "array",
            PlistValue::Dictionary(_) => "dictionary",
            PlistValue::Uid(_) => "uid",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PlistValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PlistValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uid(&self) -> Option<u64> {
        match self {
            PlistValue::Uid(uid) => Some(*uid),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[PlistValue]> {
        match self {
            PlistValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&BTreeMap<String, PlistValue>> {
        match self {
            PlistValue::Dictionary(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key if this value is a dictionary
    pub fn get(&self, key: &str) -> Option<&PlistValue> {
        self.as_dictionary().and_then(|map| map.get(key))
    }

    /// Convert a `Date` into seconds since the Unix epoch
    pub fn unix_timestamp(&self) -> Option<f64> {
        match self {
            PlistValue::Date(secs) => Some(secs + APPLE_EPOCH_OFFSET_SECS),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let mut map = BTreeMap::new();
        map.insert("answer".to_string(), PlistValue::Integer(42));
        let value = PlistValue::Dictionary(map);

        assert_eq!(value.get("answer").and_then(PlistValue::as_integer), Some(42));
        assert!(value.get("missing").is_none());
        assert_eq!(PlistValue::Uid(3).as_integer(), None);
        assert_eq!(PlistValue::Uid(3).as_uid(), Some(3));
    }

    #[test]
    fn test_unix_timestamp() {
        let date = PlistValue::Date(0.0);
        assert_eq!(date.unix_timestamp(), Some(APPLE_EPOCH_OFFSET_SECS));
        assert_eq!(PlistValue::Real(0.0).unix_timestamp(), None);
    }
}
