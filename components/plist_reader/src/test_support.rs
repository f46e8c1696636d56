//! In-memory builders for binary plist and keyed-archive fixtures
//!
//! Only compiled for tests or with the `test-support` feature.

use std::collections::BTreeMap;

const OFFSET_SIZE: usize = 4;
const REF_SIZE: usize = 2;

/// Builds a binary plist object by object; every method returns the new object's index
#[derive(Debug, Default, Clone)]
pub struct PlistBuilder {
    objects: Vec<Vec<u8>>,
}

impl PlistBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already encoded object
    pub fn raw(&mut self, encoded: &[u8]) -> u64 {
        self.objects.push(encoded.to_vec());
        (self.objects.len() - 1) as u64
    }

    pub fn null(&mut self) -> u64 {
        self.raw(&[0x00])
    }

    pub fn boolean(&mut self, value: bool) -> u64 {
        self.raw(&[if value { 0x09 } else { 0x08 }])
    }

    pub fn integer(&mut self, value: i64) -> u64 {
        let encoded = encode_integer(value);
        self.raw(&encoded)
    }

    pub fn real(&mut self, value: f64) -> u64 {
        let mut encoded = vec![0x23];
        encoded.extend_from_slice(&value.to_be_bytes());
        self.raw(&encoded)
    }

    pub fn date(&mut self, seconds: f64) -> u64 {
        let mut encoded = vec![0x33];
        encoded.extend_from_slice(&seconds.to_be_bytes());
        self.raw(&encoded)
    }

    pub fn data(&mut self, bytes: &[u8]) -> u64 {
        let mut encoded = marker(0x4, bytes.len());
        encoded.extend_from_slice(bytes);
        self.raw(&encoded)
    }

    /// ASCII strings use the single-byte marker, everything else UTF-16BE
    pub fn string(&mut self, value: &str) -> u64 {
        if value.is_ascii() {
            let mut encoded = marker(0x5, value.len());
            encoded.extend_from_slice(value.as_bytes());
            self.raw(&encoded)
        } else {
            let units: Vec<u16> = value.encode_utf16().collect();
            let mut encoded = marker(0x6, units.len());
            for unit in units {
                encoded.extend_from_slice(&unit.to_be_bytes());
            }
            self.raw(&encoded)
        }
    }

    pub fn uid(&mut self, value: u64) -> u64 {
        let bytes = value.to_be_bytes();
        let skip = bytes.iter().take(7).take_while(|&&b| b == 0).count();
        let width = 8 - skip;
        let mut encoded = vec![0x80 | (width as u8 - 1)];
        encoded.extend_from_slice(&bytes[skip..]);
        self.raw(&encoded)
    }

    pub fn array(&mut self, items: &[u64]) -> u64 {
        let mut encoded = marker(0xa, items.len());
        for &item in items {
            encoded.extend_from_slice(&encode_ref(item));
        }
        self.raw(&encoded)
    }

    pub fn dictionary(&mut self, entries: &[(u64, u64)]) -> u64 {
        let mut encoded = marker(0xd, entries.len());
        for (key, _) in entries {
            encoded.extend_from_slice(&encode_ref(*key));
        }
        for (_, value) in entries {
            encoded.extend_from_slice(&encode_ref(*value));
        }
        self.raw(&encoded)
    }

    /// Serialize all objects with `root` as the top object
    pub fn build(&self, root: u64) -> Vec<u8> {
        let mut out = b"bplist00".to_vec();
        let mut offsets = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            offsets.push(out.len());
            out.extend_from_slice(object);
        }

        let table_offset = out.len();
        for offset in offsets {
            out.extend_from_slice(&(offset as u32).to_be_bytes());
        }

        out.extend_from_slice(&[0; 6]);
        out.push(OFFSET_SIZE as u8);
        out.push(REF_SIZE as u8);
        out.extend_from_slice(&(self.objects.len() as u64).to_be_bytes());
        out.extend_from_slice(&root.to_be_bytes());
        out.extend_from_slice(&(table_offset as u64).to_be_bytes());
        out
    }
}

fn marker(kind: u8, len: usize) -> Vec<u8> {
    if len < 15 {
        vec![(kind << 4) | len as u8]
    } else {
        let mut encoded = vec![(kind << 4) | 0x0f, 0x13];
        encoded.extend_from_slice(&(len as u64).to_be_bytes());
        encoded
    }
}

fn encode_integer(value: i64) -> Vec<u8> {
    match value {
        0..=0xff => vec![0x10, value as u8],
        0x100..=0xffff => {
            let mut encoded = vec![0x11];
            encoded.extend_from_slice(&(value as u16).to_be_bytes());
            encoded
        }
        0x1_0000..=0xffff_ffff => {
            let mut encoded = vec![0x12];
            encoded.extend_from_slice(&(value as u32).to_be_bytes());
            encoded
        }
        _ => {
            let mut encoded = vec![0x13];
            encoded.extend_from_slice(&value.to_be_bytes());
            encoded
        }
    }
}

fn encode_ref(index: u64) -> [u8; REF_SIZE] {
    (index as u16).to_be_bytes()
}

/// A field value inside an archived object
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveField {
    Uid(u64),
    Integer(i64),
    Real(f64),
    Bool(bool),
    String(String),
    Data(Vec<u8>),
    UidArray(Vec<u64>),
}

#[derive(Debug, Clone)]
enum ArchiveEntry {
    Reserved,
    Null,
    String(String),
    Integer(i64),
    Class { name: String, classes: Vec<String> },
    Object { fields: Vec<(String, ArchiveField)> },
}

/// Builds an `NSKeyedArchiver` plist; every method returns the archive UID of the new entry
#[derive(Debug, Clone)]
pub struct KeyedArchiveBuilder {
    entries: Vec<ArchiveEntry>,
    classes: BTreeMap<String, u64>,
    version: i64,
    archiver: String,
}

impl Default for KeyedArchiveBuilder {
    fn default() -> Self {
        Self {
            entries: vec![ArchiveEntry::String("$null".to_string())],
            classes: BTreeMap::new(),
            version: 100_000,
            archiver: "NSKeyedArchiver".to_string(),
        }
    }
}

impl KeyedArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `$version`
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = version;
        self
    }

    /// Override `$archiver`
    pub fn with_archiver(mut self, archiver: &str) -> Self {
        self.archiver = archiver.to_string();
        self
    }

    fn push(&mut self, entry: ArchiveEntry) -> u64 {
        self.entries.push(entry);
        (self.entries.len() - 1) as u64
    }

    /// Reserve a UID to be filled later with [`KeyedArchiveBuilder::define_object`]
    pub fn reserve(&mut self) -> u64 {
        self.push(ArchiveEntry::Reserved)
    }

    pub fn null(&mut self) -> u64 {
        self.push(ArchiveEntry::Null)
    }

    pub fn string(&mut self, value: &str) -> u64 {
        self.push(ArchiveEntry::String(value.to_string()))
    }

    pub fn integer(&mut self, value: i64) -> u64 {
        self.push(ArchiveEntry::Integer(value))
    }

    /// Class descriptor for `name`, created once per name
    pub fn class(&mut self, name: &str) -> u64 {
        if let Some(&uid) = self.classes.get(name) {
            return uid;
        }
        let uid = self.push(ArchiveEntry::Class {
            name: name.to_string(),
            classes: vec![name.to_string(), "NSObject".to_string()],
        });
        self.classes.insert(name.to_string(), uid);
        uid
    }

    /// Object of class `class_name` with the given fields (`$class` is added)
    pub fn object(&mut self, class_name: &str, fields: Vec<(&str, ArchiveField)>) -> u64 {
        let uid = self.reserve();
        self.define_object(uid, class_name, fields);
        uid
    }

    /// Dictionary without a `$class` entry
    pub fn plain_dictionary(&mut self, fields: Vec<(&str, ArchiveField)>) -> u64 {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        self.push(ArchiveEntry::Object { fields })
    }

    pub fn define_object(&mut self, uid: u64, class_name: &str, fields: Vec<(&str, ArchiveField)>) {
        let class_uid = self.class(class_name);
        let mut fields: Vec<(String, ArchiveField)> = fields
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        fields.push(("$class".to_string(), ArchiveField::Uid(class_uid)));
        self.entries[uid as usize] = ArchiveEntry::Object { fields };
    }

    /// `NSArray` holding the given UIDs
    pub fn ns_array(&mut self, items: &[u64]) -> u64 {
        self.object("NSArray", vec![("NS.objects", ArchiveField::UidArray(items.to_vec()))])
    }

    /// `NSDictionary` with parallel key and value UIDs
    pub fn ns_dictionary(&mut self, entries: &[(u64, u64)]) -> u64 {
        let keys = entries.iter().map(|(k, _)| *k).collect();
        let values = entries.iter().map(|(_, v)| *v).collect();
        self.object(
            "NSDictionary",
            vec![
                ("NS.keys", ArchiveField::UidArray(keys)),
                ("NS.objects", ArchiveField::UidArray(values)),
            ],
        )
    }

    /// Serialize with `$top` mapping each name to a UID
    pub fn build(&self, top: &[(&str, u64)]) -> Vec<u8> {
        let mut plist = PlistBuilder::new();
        let mut object_refs = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let object = match entry {
                ArchiveEntry::Reserved | ArchiveEntry::Null => plist.null(),
                ArchiveEntry::String(value) => plist.string(value),
                ArchiveEntry::Integer(value) => plist.integer(*value),
                ArchiveEntry::Class { name, classes } => {
                    let name_key = plist.string("$classname");
                    let name_value = plist.string(name);
                    let classes_key = plist.string("$classes");
                    let class_names: Vec<u64> = classes.iter().map(|c| plist.string(c)).collect();
                    let classes_value = plist.array(&class_names);
                    plist.dictionary(&[(name_key, name_value), (classes_key, classes_value)])
                }
                ArchiveEntry::Object { fields } => {
                    let mut encoded = Vec::with_capacity(fields.len());
                    for (key, field) in fields {
                        let key = plist.string(key);
                        let value = encode_field(&mut plist, field);
                        encoded.push((key, value));
                    }
                    plist.dictionary(&encoded)
                }
            };
            object_refs.push(object);
        }

        let mut top_entries = Vec::with_capacity(top.len());
        for (name, uid) in top {
            let key = plist.string(name);
            let value = plist.uid(*uid);
            top_entries.push((key, value));
        }

        let objects = plist.array(&object_refs);
        let top = plist.dictionary(&top_entries);
        let version_key = plist.string("$version");
        let version = plist.integer(self.version);
        let archiver_key = plist.string("$archiver");
        let archiver = plist.string(&self.archiver);
        let top_key = plist.string("$top");
        let objects_key = plist.string("$objects");
        let root = plist.dictionary(&[
            (version_key, version),
            (archiver_key, archiver),
            (top_key, top),
            (objects_key, objects),
        ]);
        plist.build(root)
    }
}

fn encode_field(plist: &mut PlistBuilder, field: &ArchiveField) -> u64 {
    match field {
        ArchiveField::Uid(uid) => plist.uid(*uid),
        ArchiveField::Integer(value) => plist.integer(*value),
        ArchiveField::Real(value) => plist.real(*value),
        ArchiveField::Bool(value) => plist.boolean(*value),
        ArchiveField::String(value) => plist.string(value),
        ArchiveField::Data(bytes) => plist.data(bytes),
        ArchiveField::UidArray(uids) => {
            let items: Vec<u64> = uids.iter().map(|uid| plist.uid(*uid)).collect();
            plist.array(&items)
        }
    }
}
