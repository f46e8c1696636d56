//! Integration tests for keyed-archive expansion

use keyed_archive::{
    read_keyed_archive, ArchiveError, ArchiveValue, ClassContext, Interpretation, ObjectFields,
    PassThrough, Record,
};
use plist_reader::test_support::{ArchiveField, KeyedArchiveBuilder};
use pretty_assertions::assert_eq;

#[test]
fn test_cyclic_objects_terminate_and_share() {
    let mut builder = KeyedArchiveBuilder::new();
    let a = builder.reserve();
    let b = builder.reserve();
    let name_a = builder.string("A");
    let name_b = builder.string("B");
    builder.define_object(
        a,
        "Node",
        vec![("name", ArchiveField::Uid(name_a)), ("next", ArchiveField::Uid(b))],
    );
    builder.define_object(
        b,
        "Node",
        vec![("name", ArchiveField::Uid(name_b)), ("next", ArchiveField::Uid(a))],
    );

    let graph = read_keyed_archive(&builder.build(&[("root", a)]), &PassThrough).unwrap();

    let node_a = graph.top_field("root").unwrap();
    let node_b = graph.get(node_a, "next").unwrap();
    let back_to_a = graph.get(node_b, "next").unwrap();

    assert_eq!(graph.get(node_a, "name").and_then(|v| graph.str(v)), Some("A"));
    assert_eq!(graph.get(node_b, "name").and_then(|v| graph.str(v)), Some("B"));
    assert!(std::ptr::eq(node_a, back_to_a));
    assert_eq!(graph.objects().len(), 6);
}

#[test]
fn test_shared_reference_is_not_duplicated() {
    let mut builder = KeyedArchiveBuilder::new();
    let shared = builder.string("shared");
    let list = builder.ns_array(&[shared, shared]);
    let graph = read_keyed_archive(&builder.build(&[("list", list)]), &PassThrough).unwrap();

    let raw_list = graph.top_field("list").unwrap();
    match raw_list {
        ArchiveValue::Array(items) => {
            assert_eq!(items.len(), 2);
            assert!(graph.same_object(&items[0], &items[1]));
        }
        other => panic!("expected array, got {:?}", other),
    }
}

#[test]
fn test_foundation_containers() {
    let mut builder = KeyedArchiveBuilder::new();
    let key = builder.string("answer");
    let value = builder.integer(42);
    let dict = builder.ns_dictionary(&[(key, value)]);
    let text = builder.object(
        "NSMutableString",
        vec![("NS.bytes", ArchiveField::Data(b"hello\0".to_vec()))],
    );
    let data = builder.object("NSData", vec![("NS.data", ArchiveField::Data(vec![9, 8]))]);

    let graph = read_keyed_archive(
        &builder.build(&[("dict", dict), ("text", text), ("data", data)]),
        &PassThrough,
    )
    .unwrap();

    let dict = graph.top_field("dict").unwrap();
    assert_eq!(graph.map_get_str(dict, "answer").and_then(|v| graph.integer(v)), Some(42));
    assert_eq!(graph.top_field("text").and_then(|v| graph.str(v)), Some("hello"));
    assert_eq!(graph.top_field("data"), Some(&ArchiveValue::Data(vec![9, 8])));
}

#[test]
fn test_decimal_number_placeholder() {
    let mut builder = KeyedArchiveBuilder::new();
    let decimal = |negative: bool| {
        vec![
            ("NS.length", ArchiveField::Integer(1)),
            ("NS.exponent", ArchiveField::Integer(0)),
            ("NS.mantissa.bo", ArchiveField::Integer(1)),
            ("NS.negative", ArchiveField::Bool(negative)),
            ("NS.mantissa", ArchiveField::Data(vec![1, 0, 0, 0, 0, 0, 0, 0])),
        ]
    };
    let positive = builder.object("NSDecimalNumberPlaceholder", decimal(false));
    let negative = builder.object("NSDecimalNumberPlaceholder", decimal(true));

    let graph = read_keyed_archive(
        &builder.build(&[("positive", positive), ("negative", negative)]),
        &PassThrough,
    )
    .unwrap();

    assert_eq!(graph.top_field("positive"), Some(&ArchiveValue::Real(1.0)));
    assert_eq!(graph.top_field("negative"), Some(&ArchiveValue::Real(-1.0)));
}

#[test]
fn test_interpreter_gets_unclaimed_classes() {
    let interpreter = |class_name: &str,
                       fields: &ObjectFields,
                       context: &ClassContext<'_>|
     -> keyed_archive::Result<Interpretation> {
        match class_name {
            "XRCore" => Ok(Interpretation::Replace(ArchiveValue::Record(
                Record::new("XRCore")
                    .with_field("number", fields.value("$0"))
                    .with_field(
                        "doubled",
                        ArchiveValue::Integer(
                            fields.get("$0").and_then(|v| context.integer(v)).unwrap_or(0) * 2,
                        ),
                    ),
            ))),
            "NSFont" => Ok(Interpretation::Replace(ArchiveValue::Null)),
            _ => Ok(Interpretation::Unchanged),
        }
    };

    let mut builder = KeyedArchiveBuilder::new();
    let core = builder.object("XRCore", vec![("$0", ArchiveField::Integer(3))]);
    let font = builder.object("NSFont", vec![("NSSize", ArchiveField::Real(12.0))]);
    let graph = read_keyed_archive(&builder.build(&[("core", core), ("font", font)]), &interpreter)
        .unwrap();

    let core = graph.top_field("core").unwrap();
    assert_eq!(graph.get(core, "number").and_then(|v| graph.integer(v)), Some(3));
    assert_eq!(graph.get(core, "doubled").and_then(|v| graph.integer(v)), Some(6));
    assert!(graph.top_field("font").unwrap().is_null());
}

#[test]
fn test_interpreter_errors_propagate() {
    let interpreter = |_: &str,
                       _: &ObjectFields,
                       _: &ClassContext<'_>|
     -> keyed_archive::Result<Interpretation> {
        Err(ArchiveError::malformed("XRBroken", "always fails"))
    };

    let mut builder = KeyedArchiveBuilder::new();
    let broken = builder.object("XRBroken", vec![]);
    let err = read_keyed_archive(&builder.build(&[("root", broken)]), &interpreter).unwrap_err();
    assert_eq!(err, ArchiveError::malformed("XRBroken", "always fails"));
}

#[test]
fn test_rejects_non_plist_bytes() {
    let err = read_keyed_archive(b"garbage", &PassThrough).unwrap_err();
    assert!(matches!(err, ArchiveError::Plist(_)));
}
