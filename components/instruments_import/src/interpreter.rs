//! Reinterpretation of Instruments archive classes
//!
//! The core-sampler template archives its own classes with positional
//! `$N` fields. Each recognized class becomes a [`Record`] with named fields
//! (or a [`ArchiveValue::Map`] for int-keyed dictionaries) so the template
//! reader can address them by name.

use keyed_archive::{
    ArchiveError, ArchiveValue, ClassContext, ClassInterpreter, Interpretation, ObjectFields,
    Record, Result,
};

pub const SYMBOL_DATA: &str = "PFTSymbolData";
pub const OWNER_DATA: &str = "PFTOwnerData";
pub const PERSISTENT_SYMBOLS: &str = "PFTPersistentSymbols";
pub const RUN_LIST_DATA: &str = "XRRunListData";
pub const INT_KEYED_DICTIONARY: &str = "XRIntKeyedDictionary";
pub const CORE: &str = "XRCore";

/// Styling classes with nothing to contribute to samples
const DISCARDED: &[&str] = &["NSTextStorage", "NSParagraphStyle", "NSFont"];

/// First positional field of a symbol's address/line pairs
const ADDRESS_TO_LINE_START: usize = 3;

/// [`ClassInterpreter`] for core-sampler2 templates
#[derive(Debug, Clone, Copy, Default)]
pub struct InstrumentsInterpreter;

impl ClassInterpreter for InstrumentsInterpreter {
    fn interpret(
        &self,
        class_name: &str,
        fields: &ObjectFields,
        context: &ClassContext<'_>,
    ) -> Result<Interpretation> {
        let value = match class_name {
            SYMBOL_DATA => symbol_data(fields),
            OWNER_DATA => Record::new(OWNER_DATA)
                .with_field("ownerName", fields.value("$0"))
                .with_field("ownerPath", fields.value("$1"))
                .into(),
            PERSISTENT_SYMBOLS => persistent_symbols(fields, context)?,
            RUN_LIST_DATA => Record::new(RUN_LIST_DATA)
                .with_field("runNumbers", fields.value("$0"))
                .with_field("runData", fields.value("$1"))
                .into(),
            INT_KEYED_DICTIONARY => int_keyed_dictionary(fields, context)?,
            CORE => Record::new(CORE)
                .with_field("number", fields.value("$0"))
                .with_field("name", fields.value("$1"))
                .into(),
            name if DISCARDED.contains(&name) => ArchiveValue::Null,
            _ => return Ok(Interpretation::Unchanged),
        };
        Ok(Interpretation::Replace(value))
    }
}

/// Address to line pairs sit at `$3/$4`, `$5/$6`, ... until either is missing
fn symbol_data(fields: &ObjectFields) -> ArchiveValue {
    let mut address_to_line = Vec::new();
    let mut index = ADDRESS_TO_LINE_START;
    while let (Some(address), Some(line)) = (fields.indexed("$", index), fields.indexed("$", index + 1)) {
        address_to_line.push((address.clone(), line.clone()));
        index += 2;
    }

    Record::new(SYMBOL_DATA)
        .with_field("symbolName", fields.value("$0"))
        .with_field("sourcePath", fields.value("$1"))
        .with_field("addressToLine", ArchiveValue::Map(address_to_line))
        .into()
}

/// `$3` holds thread names, `$4` a count, and symbols follow at `$5` onwards
fn persistent_symbols(fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    let count = fields
        .get("$4")
        .and_then(|v| context.integer(v))
        .ok_or_else(|| ArchiveError::malformed(PERSISTENT_SYMBOLS, "missing symbol count $4"))?;

    let mut symbols = Vec::new();
    for i in 1..usize::try_from(count).unwrap_or(0) {
        let symbol = fields.indexed("$", 4 + i).ok_or_else(|| {
            ArchiveError::malformed(PERSISTENT_SYMBOLS, format!("missing symbol ${}", 4 + i))
        })?;
        symbols.push(symbol.clone());
    }

    Ok(Record::new(PERSISTENT_SYMBOLS)
        .with_field("threadNames", fields.value("$3"))
        .with_field("symbols", ArchiveValue::Array(symbols))
        .into())
}

/// `$0` holds the entry count; entry `i` is `$(1+2i)` -> `$(2+2i)`
fn int_keyed_dictionary(fields: &ObjectFields, context: &ClassContext<'_>) -> Result<ArchiveValue> {
    let size = fields
        .get("$0")
        .and_then(|v| context.integer(v))
        .ok_or_else(|| ArchiveError::malformed(INT_KEYED_DICTIONARY, "missing size $0"))?;

    let mut entries = Vec::new();
    for i in 0..usize::try_from(size).unwrap_or(0) {
        let key = fields.indexed("$", 1 + 2 * i);
        let value = fields.indexed("$", 2 + 2 * i);
        match (key, value) {
            (Some(key), Some(value)) => entries.push((key.clone(), value.clone())),
            _ => {
                return Err(ArchiveError::malformed(
                    INT_KEYED_DICTIONARY,
                    format!("entry {} of {} is incomplete", i, size),
                ))
            }
        }
    }
    Ok(ArchiveValue::Map(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyed_archive::read_keyed_archive;
    use plist_reader::test_support::{ArchiveField, KeyedArchiveBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_symbol_data_probes_address_pairs() {
        let mut builder = KeyedArchiveBuilder::new();
        let name = builder.string("main");
        let path = builder.string("/src/main.c");
        let symbol = builder.object(
            SYMBOL_DATA,
            vec![
                ("$0", ArchiveField::Uid(name)),
                ("$1", ArchiveField::Uid(path)),
                ("$2", ArchiveField::Integer(99)),
                ("$3", ArchiveField::Integer(0x1000)),
                ("$4", ArchiveField::Integer(10)),
                ("$5", ArchiveField::Integer(0x1004)),
                ("$6", ArchiveField::Integer(11)),
                ("$7", ArchiveField::Integer(0x2000)),
            ],
        );
        let graph =
            read_keyed_archive(&builder.build(&[("root", symbol)]), &InstrumentsInterpreter).unwrap();

        let symbol = graph.top_field("root").unwrap();
        assert_eq!(graph.get(symbol, "symbolName").and_then(|v| graph.str(v)), Some("main"));
        assert_eq!(graph.get(symbol, "sourcePath").and_then(|v| graph.str(v)), Some("/src/main.c"));

        let lines: Vec<(i64, i64)> = graph
            .entries(graph.get(symbol, "addressToLine").unwrap())
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.as_integer().unwrap(), graph.integer(v).unwrap()))
            .collect();
        assert_eq!(lines, vec![(0x1000, 10), (0x1004, 11)]);
    }

    #[test]
    fn test_persistent_symbols_count_field() {
        let mut builder = KeyedArchiveBuilder::new();
        let names = builder.ns_array(&[]);
        let first = builder.object(SYMBOL_DATA, vec![("$0", ArchiveField::String("a".into()))]);
        let second = builder.object(SYMBOL_DATA, vec![("$0", ArchiveField::String("b".into()))]);
        let symbols = builder.object(
            PERSISTENT_SYMBOLS,
            vec![
                ("$3", ArchiveField::Uid(names)),
                ("$4", ArchiveField::Integer(3)),
                ("$5", ArchiveField::Uid(first)),
                ("$6", ArchiveField::Uid(second)),
            ],
        );
        let graph =
            read_keyed_archive(&builder.build(&[("root", symbols)]), &InstrumentsInterpreter).unwrap();

        let root = graph.top_field("root").unwrap();
        let symbols = graph.array(graph.get(root, "symbols").unwrap()).unwrap();
        let names: Vec<&str> = symbols
            .iter()
            .filter_map(|s| graph.get(s, "symbolName").and_then(|v| graph.str(v)))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_int_keyed_dictionary_and_discarded_classes() {
        let mut builder = KeyedArchiveBuilder::new();
        let value = builder.string("core zero");
        let dict = builder.object(
            INT_KEYED_DICTIONARY,
            vec![
                ("$0", ArchiveField::Integer(2)),
                ("$1", ArchiveField::Integer(7)),
                ("$2", ArchiveField::Uid(value)),
                ("$3", ArchiveField::Integer(9)),
                ("$4", ArchiveField::Integer(90)),
            ],
        );
        let font = builder.object("NSFont", vec![("NSName", ArchiveField::String("Menlo".into()))]);
        let core = builder.object(
            CORE,
            vec![("$0", ArchiveField::Integer(0)), ("$1", ArchiveField::Uid(value))],
        );
        let graph = read_keyed_archive(
            &builder.build(&[("dict", dict), ("font", font), ("core", core)]),
            &InstrumentsInterpreter,
        )
        .unwrap();

        let dict = graph.top_field("dict").unwrap();
        assert_eq!(graph.map_get_int(dict, 7).and_then(|v| graph.str(v)), Some("core zero"));
        assert_eq!(graph.map_get_int(dict, 9).and_then(|v| graph.integer(v)), Some(90));
        assert!(graph.top_field("font").unwrap().is_null());

        let core = graph.top_field("core").unwrap();
        assert_eq!(graph.get(core, "name").and_then(|v| graph.str(v)), Some("core zero"));
    }

    #[test]
    fn test_incomplete_int_keyed_dictionary() {
        let mut builder = KeyedArchiveBuilder::new();
        let dict = builder.object(
            INT_KEYED_DICTIONARY,
            vec![("$0", ArchiveField::Integer(1)), ("$1", ArchiveField::Integer(7))],
        );
        let err = read_keyed_archive(&builder.build(&[("dict", dict)]), &InstrumentsInterpreter)
            .unwrap_err();
        assert!(matches!(err, ArchiveError::MalformedObject { .. }));
    }
}
