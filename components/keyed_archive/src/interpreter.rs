//! Class reinterpretation hook
//!
//! Foundation classes are handled by the expander itself; every other
//! class-tagged object is offered to a [`ClassInterpreter`] before it falls
//! back to a plain dictionary.

use plist_reader::PlistValue;
use std::collections::BTreeMap;

use crate::error::{ArchiveError, Result};
use crate::value::{ArchiveValue, ObjectRef};

/// Outcome of offering an object to a [`ClassInterpreter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    /// Use this value in place of the archived object
    Replace(ArchiveValue),
    /// Keep the object as a generic dictionary
    Unchanged,
}

/// Domain-specific reinterpretation of archived classes
pub trait ClassInterpreter {
    fn interpret(
        &self,
        class_name: &str,
        fields: &ObjectFields,
        context: &ClassContext<'_>,
    ) -> Result<Interpretation>;
}

/// Interpreter that leaves every non-Foundation class untouched
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ClassInterpreter for PassThrough {
    fn interpret(&self, _: &str, _: &ObjectFields, _: &ClassContext<'_>) -> Result<Interpretation> {
        Ok(Interpretation::Unchanged)
    }
}

impl<F> ClassInterpreter for F
where
    F: Fn(&str, &ObjectFields, &ClassContext<'_>) -> Result<Interpretation>,
{
    fn interpret(
        &self,
        class_name: &str,
        fields: &ObjectFields,
        context: &ClassContext<'_>,
    ) -> Result<Interpretation> {
        self(class_name, fields, context)
    }
}

/// Fields of one class-tagged object, with UIDs still unresolved
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectFields {
    fields: BTreeMap<String, ArchiveValue>,
}

impl ObjectFields {
    pub fn new(fields: BTreeMap<String, ArchiveValue>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&ArchiveValue> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Field value, or `Null` when absent
    pub fn value(&self, key: &str) -> ArchiveValue {
        self.fields.get(key).cloned().unwrap_or(ArchiveValue::Null)
    }

    /// Field named `{prefix}{index}`, as used by positional encodings
    pub fn indexed(&self, prefix: &str, index: usize) -> Option<&ArchiveValue> {
        self.fields.get(&format!("{}{}", prefix, index))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, ArchiveValue> {
        self.fields
    }
}

/// Read access to the raw `$objects` table during reinterpretation
///
/// Lets interpreters read primitives that sit behind a UID before the
/// reference resolution pass has run.
#[derive(Debug, Clone, Copy)]
pub struct ClassContext<'a> {
    objects: &'a [PlistValue],
}

impl<'a> ClassContext<'a> {
    pub fn new(objects: &'a [PlistValue]) -> Self {
        Self { objects }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Raw table entry behind a reference
    pub fn raw(&self, r: ObjectRef) -> Result<&'a PlistValue> {
        self.objects.get(r.index()).ok_or(ArchiveError::UidOutOfRange {
            index: r.index() as u64,
            count: self.objects.len(),
        })
    }

    /// Class name of the descriptor at `class_ref`
    pub fn class_name(&self, class_ref: ObjectRef, object_index: usize) -> Result<&'a str> {
        self.raw(class_ref)?
            .get("$classname")
            .and_then(PlistValue::as_str)
            .ok_or(ArchiveError::InvalidClass { index: object_index })
    }

    fn primitive<'v>(&self, value: &'v ArchiveValue) -> Primitive<'v, 'a> {
        match value {
            ArchiveValue::Ref(r) => match self.objects.get(r.index()) {
                Some(raw) => Primitive::Raw(raw),
                None => Primitive::Missing,
            },
            other => Primitive::Inline(other),
        }
    }

    pub fn integer(&self, value: &ArchiveValue) -> Option<i64> {
        match self.primitive(value) {
            Primitive::Inline(ArchiveValue::Integer(i)) => Some(*i),
            Primitive::Raw(PlistValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn boolean(&self, value: &ArchiveValue) -> Option<bool> {
        match self.primitive(value) {
            Primitive::Inline(ArchiveValue::Bool(b)) => Some(*b),
            Primitive::Raw(PlistValue::Bool(b)) => Some(*b),
            Primitive::Inline(ArchiveValue::Integer(i)) => Some(*i != 0),
            Primitive::Raw(PlistValue::Integer(i)) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn bytes(&self, value: &ArchiveValue) -> Option<Vec<u8>> {
        match self.primitive(value) {
            Primitive::Inline(ArchiveValue::Data(bytes)) => Some(bytes.clone()),
            Primitive::Raw(PlistValue::Data(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    pub fn string(&self, value: &ArchiveValue) -> Option<String> {
        match self.primitive(value) {
            Primitive::Inline(ArchiveValue::String(s)) => Some(s.clone()),
            Primitive::Raw(PlistValue::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// Elements of an inline array, or of a plain array stored behind a UID
    pub fn array(&self, value: &ArchiveValue) -> Option<Vec<ArchiveValue>> {
        match self.primitive(value) {
            Primitive::Inline(ArchiveValue::Array(items)) => Some(items.clone()),
            Primitive::Raw(PlistValue::Array(items)) => {
                Some(items.iter().cloned().map(ArchiveValue::from).collect())
            }
            _ => None,
        }
    }
}

enum Primitive<'v, 'a> {
    Inline(&'v ArchiveValue),
    Raw(&'a PlistValue),
    Missing,
}
