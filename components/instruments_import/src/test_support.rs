//! Synthetic `.trace` bundles
//!
//! Builds the three artifacts the importer reads (a keyed-archive
//! `form.template`, a time-profile bulkstore and a backtrace uniquer) and
//! lays them out in a [`MemoryFileAccess`] or on disk.

use plist_reader::test_support::{ArchiveField, KeyedArchiveBuilder};
use std::path::{Path, PathBuf};
use trace_store::{MemoryFileAccess, RawSample, DEFAULT_PREAMBLE_WORDS, INDEX_HEADER_SIZE};

use crate::config::TIME_PROFILE_SCHEMA_MARKER;
use crate::form_template::CORE_SAMPLER2;
use crate::interpreter::{INT_KEYED_DICTIONARY, PERSISTENT_SYMBOLS, RUN_LIST_DATA, SYMBOL_DATA};

/// Bulkstore header size used by fixtures
pub const FIXTURE_HEADER_SIZE: u32 = 64;

/// Record stride used by fixtures; two padding bytes sit before the backtrace id
pub const FIXTURE_STRIDE: u32 = 16;

/// One symbol covering a set of addresses
#[derive(Debug, Clone, Default)]
pub struct FixtureSymbol {
    pub name: Option<String>,
    pub source_path: Option<String>,
    /// Address and source line pairs
    pub addresses: Vec<(u64, u32)>,
}

impl FixtureSymbol {
    pub fn new(name: &str, source_path: &str, addresses: &[(u64, u32)]) -> Self {
        Self {
            name: Some(name.to_string()),
            source_path: Some(source_path.to_string()),
            addresses: addresses.to_vec(),
        }
    }
}

/// One recorded run
#[derive(Debug, Clone)]
pub struct FixtureRun {
    pub number: u32,
    pub pid: i64,
    pub symbols: Vec<FixtureSymbol>,
    pub samples: Vec<RawSample>,
    pub backtraces: Vec<Vec<u64>>,
    pub schema_marker: String,
}

impl FixtureRun {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            pid: 501,
            symbols: Vec::new(),
            samples: Vec::new(),
            backtraces: Vec::new(),
            schema_marker: TIME_PROFILE_SCHEMA_MARKER.to_string(),
        }
    }

    pub fn symbol(mut self, symbol: FixtureSymbol) -> Self {
        self.symbols.push(symbol);
        self
    }

    pub fn sample(mut self, timestamp: u64, thread_id: u32, backtrace_id: u32) -> Self {
        self.samples.push(RawSample {
            timestamp,
            thread_id,
            backtrace_id,
        });
        self
    }

    pub fn backtrace(mut self, frames: &[u64]) -> Self {
        self.backtraces.push(frames.to_vec());
        self
    }

    pub fn schema_marker(mut self, marker: &str) -> Self {
        self.schema_marker = marker.to_string();
        self
    }
}

/// A whole `.trace` bundle
#[derive(Debug, Clone)]
pub struct TraceFixture {
    pub bundle: PathBuf,
    pub instrument: String,
    pub template_version: i64,
    pub runs: Vec<FixtureRun>,
}

impl TraceFixture {
    pub fn new(bundle: impl Into<PathBuf>) -> Self {
        Self {
            bundle: bundle.into(),
            instrument: CORE_SAMPLER2.to_string(),
            template_version: 1,
            runs: Vec::new(),
        }
    }

    pub fn instrument(mut self, instrument: &str) -> Self {
        self.instrument = instrument.to_string();
        self
    }

    pub fn run(mut self, run: FixtureRun) -> Self {
        self.runs.push(run);
        self
    }

    /// Keyed archive with the run list and symbol tables
    pub fn form_template(&self) -> Vec<u8> {
        let mut builder = KeyedArchiveBuilder::new();
        let version = builder.integer(self.template_version);
        let instrument = builder.string(&self.instrument);

        let mut run_uids = Vec::new();
        let mut run_entries = Vec::new();
        for run in &self.runs {
            run_uids.push(builder.integer(i64::from(run.number)));
            let symbols_by_pid = symbols_by_pid(&mut builder, run);
            let key = builder.string("symbolsByPid");
            let entry = builder.ns_dictionary(&[(key, symbols_by_pid)]);
            run_entries.push((i64::from(run.number), entry));
        }

        let run_numbers = builder.ns_array(&run_uids);
        let run_data = int_keyed_dictionary(&mut builder, &run_entries);
        let run_list = builder.object(
            RUN_LIST_DATA,
            vec![("$0", ArchiveField::Uid(run_numbers)), ("$1", ArchiveField::Uid(run_data))],
        );

        builder.build(&[
            ("com.apple.xray.owner.template.version", version),
            ("$1", instrument),
            ("com.apple.xray.run.data", run_list),
        ])
    }

    /// Every file of the bundle with its path
    pub fn files(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = vec![(self.bundle.join("form.template"), self.form_template())];
        for run in &self.runs {
            let core = self
                .bundle
                .join("corespace")
                .join(format!("run{}", run.number))
                .join("core");
            let store = core.join("stores").join("time-profile-0");
            files.push((
                store.join("schema.xml"),
                format!("<schema {} />", run.schema_marker).into_bytes(),
            ));
            files.push((store.join("bulkstore"), bulkstore_bytes(&run.samples)));

            let other = core.join("stores").join("kdebug-0");
            files.push((other.join("schema.xml"), b"<schema name=\"kdebug\" />".to_vec()));
            files.push((other.join("bulkstore"), Vec::new()));

            let (index, data) = uniquer_bytes(&run.backtraces);
            let uniquer = core.join("uniquing").join("arrayUniquer");
            files.push((uniquer.join("integeruniquer.index"), index));
            files.push((uniquer.join("integeruniquer.data"), data));
        }
        files
    }

    pub fn memory_access(&self) -> MemoryFileAccess {
        let mut access = MemoryFileAccess::new();
        for (path, contents) in self.files() {
            access.insert(path, contents);
        }
        access
    }

    /// Write the bundle below `parent`, returning the bundle root
    pub async fn write_to(&self, parent: &Path) -> std::io::Result<PathBuf> {
        for (path, contents) in self.files() {
            let path = parent.join(path);
            if let Some(dir) = path.parent() {
                tokio::fs::create_dir_all(dir).await?;
            }
            tokio::fs::write(&path, contents).await?;
        }
        Ok(parent.join(&self.bundle))
    }
}

fn symbols_by_pid(builder: &mut KeyedArchiveBuilder, run: &FixtureRun) -> u64 {
    let mut fields = vec![
        ("$3".to_string(), ArchiveField::Uid(builder.ns_array(&[]))),
        (
            "$4".to_string(),
            ArchiveField::Integer(run.symbols.len() as i64 + 1),
        ),
    ];
    for (i, symbol) in run.symbols.iter().enumerate() {
        let mut symbol_fields = Vec::new();
        if let Some(name) = &symbol.name {
            symbol_fields.push(("$0".to_string(), ArchiveField::Uid(builder.string(name))));
        }
        if let Some(path) = &symbol.source_path {
            symbol_fields.push(("$1".to_string(), ArchiveField::Uid(builder.string(path))));
        }
        for (j, &(address, line)) in symbol.addresses.iter().enumerate() {
            symbol_fields.push((format!("${}", 3 + 2 * j), ArchiveField::Integer(address as i64)));
            symbol_fields.push((format!("${}", 4 + 2 * j), ArchiveField::Integer(i64::from(line))));
        }
        let uid = builder.object(SYMBOL_DATA, borrowed(&symbol_fields));
        fields.push((format!("${}", 5 + i), ArchiveField::Uid(uid)));
    }
    let persistent = builder.object(PERSISTENT_SYMBOLS, borrowed(&fields));
    int_keyed_dictionary(builder, &[(run.pid, persistent)])
}

fn int_keyed_dictionary(builder: &mut KeyedArchiveBuilder, entries: &[(i64, u64)]) -> u64 {
    let mut fields = vec![("$0".to_string(), ArchiveField::Integer(entries.len() as i64))];
    for (i, &(key, value)) in entries.iter().enumerate() {
        fields.push((format!("${}", 1 + 2 * i), ArchiveField::Integer(key)));
        fields.push((format!("${}", 2 + 2 * i), ArchiveField::Uid(value)));
    }
    builder.object(INT_KEYED_DICTIONARY, borrowed(&fields))
}

fn borrowed(fields: &[(String, ArchiveField)]) -> Vec<(&str, ArchiveField)> {
    fields
        .iter()
        .map(|(key, value)| (key.as_str(), value.clone()))
        .collect()
}

/// Bulkstore holding `samples` followed by a zero-timestamp sentinel
pub fn bulkstore_bytes(samples: &[RawSample]) -> Vec<u8> {
    let mut bytes = vec![0u8; DEFAULT_PREAMBLE_WORDS * 4];
    bytes.extend_from_slice(&FIXTURE_HEADER_SIZE.to_le_bytes());
    bytes.extend_from_slice(&FIXTURE_STRIDE.to_le_bytes());
    bytes.resize(FIXTURE_HEADER_SIZE as usize, 0);
    for sample in samples {
        bytes.extend_from_slice(&sample.timestamp.to_le_bytes()[..6]);
        bytes.extend_from_slice(&sample.thread_id.to_le_bytes());
        bytes.extend_from_slice(&[0xcc, 0xcc]);
        bytes.extend_from_slice(&sample.backtrace_id.to_le_bytes());
    }
    bytes.extend_from_slice(&[0u8; FIXTURE_STRIDE as usize]);
    bytes
}

/// Integer uniquer index and data files for `arrays`
pub fn uniquer_bytes(arrays: &[Vec<u64>]) -> (Vec<u8>, Vec<u8>) {
    let mut index = vec![0u8; INDEX_HEADER_SIZE as usize];
    // A zero slot mirrors the header entry real index files carry
    index.extend_from_slice(&[0u8; 8]);
    let mut data = vec![0u8; 16];
    for values in arrays {
        index.extend_from_slice(&(data.len() as u32).to_le_bytes());
        index.extend_from_slice(&0u32.to_le_bytes());
        data.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for value in values {
            data.extend_from_slice(&value.to_le_bytes());
        }
    }
    (index, data)
}
