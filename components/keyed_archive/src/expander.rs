//! NSKeyedArchiver expansion
//!
//! Two passes over the `$objects` table: class-tagged dictionaries are first
//! reinterpreted (Foundation classes, then the caller's interpreter), and
//! every reference is then validated by a visited-once walk starting at
//! `$top` and covering the whole table.

use plist_reader::{parse_binary_plist, PlistValue};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{ArchiveError, Result};
use crate::foundation;
use crate::graph::ObjectGraph;
use crate::interpreter::{ClassContext, ClassInterpreter, Interpretation, ObjectFields};
use crate::value::{ArchiveValue, ObjectRef};

/// Required `$version` of a keyed archive
pub const ARCHIVE_VERSION: i64 = 100_000;

/// Required `$archiver` of a keyed archive
pub const ARCHIVER_NAME: &str = "NSKeyedArchiver";

/// Decode a binary plist and expand it as a keyed archive
pub fn read_keyed_archive(bytes: &[u8], interpreter: &dyn ClassInterpreter) -> Result<ObjectGraph> {
    let root = parse_binary_plist(bytes)?;
    expand_keyed_archive(root, interpreter)
}

/// Expand a decoded keyed archive into an [`ObjectGraph`]
pub fn expand_keyed_archive(root: PlistValue, interpreter: &dyn ClassInterpreter) -> Result<ObjectGraph> {
    let (top, mut raw_objects) = validate_header(root)?;

    if raw_objects.first().and_then(PlistValue::as_str) == Some("$null") {
        raw_objects[0] = PlistValue::Null;
    }

    let objects = reinterpret_objects(&raw_objects, interpreter)?;
    let top = ArchiveValue::from(top);
    let reachable = resolve_references(&objects, &top)?;

    debug!(
        "Expanded keyed archive: {} objects, {} reachable from $top",
        objects.len(),
        reachable
    );

    Ok(ObjectGraph::new(objects, top))
}

fn validate_header(root: PlistValue) -> Result<(PlistValue, Vec<PlistValue>)> {
    let mut root = match root {
        PlistValue::Dictionary(map) => map,
        other => return Err(ArchiveError::NotAnArchive(other.type_name())),
    };

    match root.get("$version") {
        Some(PlistValue::Integer(ARCHIVE_VERSION)) => {}
        Some(other) => return Err(ArchiveError::InvalidVersion(format!("{:?}", other))),
        None => return Err(ArchiveError::InvalidVersion("missing".to_string())),
    }

    match root.get("$archiver").and_then(PlistValue::as_str) {
        Some(ARCHIVER_NAME) => {}
        Some(other) => return Err(ArchiveError::InvalidArchiver(other.to_string())),
        None => return Err(ArchiveError::InvalidArchiver("missing".to_string())),
    }

    let top = match root.remove("$top") {
        Some(top @ PlistValue::Dictionary(_)) => top,
        _ => return Err(ArchiveError::MissingField("$top")),
    };
    let objects = match root.remove("$objects") {
        Some(PlistValue::Array(objects)) => objects,
        _ => return Err(ArchiveError::MissingField("$objects")),
    };

    Ok((top, objects))
}

fn reinterpret_objects(
    raw_objects: &[PlistValue],
    interpreter: &dyn ClassInterpreter,
) -> Result<Vec<ArchiveValue>> {
    let context = ClassContext::new(raw_objects);
    let mut objects = Vec::with_capacity(raw_objects.len());
    let mut class_counts: BTreeMap<&str, usize> = BTreeMap::new();

    for (index, raw) in raw_objects.iter().enumerate() {
        let class_ref = match raw.get("$class") {
            Some(PlistValue::Uid(uid)) => *uid,
            Some(_) => return Err(ArchiveError::InvalidClass { index }),
            None => {
                objects.push(ArchiveValue::from(raw.clone()));
                continue;
            }
        };

        let class_ref = ObjectRef(usize::try_from(class_ref).unwrap_or(usize::MAX));
        let class_name = context.class_name(class_ref, index)?;
        *class_counts.entry(class_name).or_default() += 1;

        let mut fields: BTreeMap<String, ArchiveValue> = raw
            .as_dictionary()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), ArchiveValue::from(v.clone()))).collect())
            .unwrap_or_default();
        let class_field = fields.remove("$class");
        let fields = ObjectFields::new(fields);

        let value = match foundation::reinterpret(class_name, &fields, &context)? {
            Some(value) => value,
            None => match interpreter.interpret(class_name, &fields, &context)? {
                Interpretation::Replace(value) => value,
                Interpretation::Unchanged => {
                    let mut map = fields.into_inner();
                    if let Some(class_field) = class_field {
                        map.insert("$class".to_string(), class_field);
                    }
                    ArchiveValue::Dictionary(map)
                }
            },
        };
        objects.push(value);
    }

    debug!("Archive classes: {:?}", class_counts);
    Ok(objects)
}

/// Validate every reference, visiting each arena slot at most once
///
/// Returns the number of objects reachable from `$top`.
fn resolve_references(objects: &[ArchiveValue], top: &ArchiveValue) -> Result<usize> {
    let mut visited = vec![false; objects.len()];
    let mut pending = Vec::new();

    top.collect_refs(&mut pending);
    let reachable = visit(objects, &mut visited, &mut pending)?;

    for (index, object) in objects.iter().enumerate() {
        if !visited[index] {
            visited[index] = true;
            object.collect_refs(&mut pending);
            visit(objects, &mut visited, &mut pending)?;
        }
    }

    Ok(reachable)
}

fn visit(objects: &[ArchiveValue], visited: &mut [bool], pending: &mut Vec<ObjectRef>) -> Result<usize> {
    let mut newly_visited = 0;
    while let Some(r) = pending.pop() {
        let object = objects.get(r.index()).ok_or(ArchiveError::UidOutOfRange {
            index: r.index() as u64,
            count: objects.len(),
        })?;
        if visited[r.index()] {
            continue;
        }
        visited[r.index()] = true;
        newly_visited += 1;
        object.collect_refs(pending);
    }
    Ok(newly_visited)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::PassThrough;
    use plist_reader::test_support::{ArchiveField, KeyedArchiveBuilder};

    #[test]
    fn test_null_entry_remapped() {
        let mut builder = KeyedArchiveBuilder::new();
        let name = builder.string("value");
        let bytes = builder.build(&[("root", name), ("nothing", 0)]);

        let graph = read_keyed_archive(&bytes, &PassThrough).unwrap();
        assert!(graph.objects()[0].is_null());
        assert!(graph.top_field("nothing").unwrap().is_null());
        assert_eq!(graph.top_field("root").and_then(|v| graph.str(v)), Some("value"));
    }

    #[test]
    fn test_invalid_version() {
        let builder = KeyedArchiveBuilder::new().with_version(99);
        let err = read_keyed_archive(&builder.build(&[]), &PassThrough).unwrap_err();
        assert!(matches!(err, ArchiveError::InvalidVersion(_)));
    }

    #[test]
    fn test_invalid_archiver() {
        let builder = KeyedArchiveBuilder::new().with_archiver("NSArchiver");
        let err = read_keyed_archive(&builder.build(&[]), &PassThrough).unwrap_err();
        assert_eq!(err, ArchiveError::InvalidArchiver("NSArchiver".to_string()));
    }

    #[test]
    fn test_uid_out_of_range() {
        let mut builder = KeyedArchiveBuilder::new();
        let holder = builder.plain_dictionary(vec![("dangling", ArchiveField::Uid(42))]);
        let err = read_keyed_archive(&builder.build(&[("root", holder)]), &PassThrough).unwrap_err();
        assert!(matches!(err, ArchiveError::UidOutOfRange { index: 42, .. }));
    }

    #[test]
    fn test_unclaimed_class_keeps_fields() {
        let mut builder = KeyedArchiveBuilder::new();
        let object = builder.object("XRUnknown", vec![("$0", ArchiveField::Integer(5))]);
        let graph = read_keyed_archive(&builder.build(&[("root", object)]), &PassThrough).unwrap();

        let root = graph.top_field("root").unwrap();
        assert_eq!(graph.get(root, "$0").and_then(|v| graph.integer(v)), Some(5));
        assert!(graph.get(root, "$class").is_some());
    }

    #[test]
    fn test_not_an_archive() {
        let err = expand_keyed_archive(PlistValue::Integer(1), &PassThrough).unwrap_err();
        assert_eq!(err, ArchiveError::NotAnArchive("integer"));
    }
}
