//! `form.template` extraction
//!
//! The template is a keyed archive describing the recording: which
//! instrument ran, which runs exist, and per run the symbol tables that map
//! sampled addresses to function names and source files.

use keyed_archive::{read_keyed_archive, ArchiveValue, ObjectGraph};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{ImportError, Result};
use crate::interpreter::InstrumentsInterpreter;

/// Instrument type recorded by the CPU core sampler
pub const CORE_SAMPLER2: &str = "com.apple.xray.instrument-type.coresampler2";

const TEMPLATE_VERSION_KEY: &str = "com.apple.xray.owner.template.version";
const OWNER_TEMPLATE_KEY: &str = "com.apple.xray.owner.template";
const RUN_DATA_KEY: &str = "com.apple.xray.run.data";

/// Display and dedup information for one sampled address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameInfo {
    /// Functions with the same key are merged
    pub key: String,
    pub name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl FrameInfo {
    /// Frame for an address with no symbol information
    pub fn raw_address(address: u64) -> Self {
        let name = format_address(address);
        Self {
            key: name.clone(),
            name,
            file: None,
            line: None,
        }
    }
}

/// `0x` followed by the address as 16 lowercase hex digits
pub fn format_address(address: u64) -> String {
    format!("0x{:016x}", address)
}

/// One recorded run and its symbolicated addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub number: u32,
    pub address_to_frame: BTreeMap<u64, FrameInfo>,
}

/// Decoded contents of `form.template`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormTemplate {
    pub version: Option<i64>,
    pub instrument: Option<String>,
    pub selected_run_number: u32,
    pub runs: Vec<RunInfo>,
}

impl FormTemplate {
    /// Decode a `form.template` file
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let graph = read_keyed_archive(bytes, &InstrumentsInterpreter)?;
        Self::from_graph(&graph)
    }

    pub fn from_graph(graph: &ObjectGraph) -> Result<Self> {
        let version = graph
            .top_field(TEMPLATE_VERSION_KEY)
            .and_then(|v| graph.integer(v));

        let selected_run_number = graph
            .top_field(OWNER_TEMPLATE_KEY)
            .and_then(|owner| graph.map_get_str(owner, "_selectedRunNumber"))
            .and_then(|v| graph.integer(v))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1);

        let instrument = instrument_id(graph);
        let runs = read_runs(graph)?;

        debug!(
            "form.template: version {:?}, instrument {:?}, {} runs, selected run {}",
            version,
            instrument,
            runs.len(),
            selected_run_number
        );

        Ok(Self {
            version,
            instrument,
            selected_run_number,
            runs,
        })
    }

    /// Fail unless the recording came from the CPU core sampler
    pub fn ensure_supported_instrument(&self) -> Result<()> {
        match self.instrument.as_deref() {
            Some(CORE_SAMPLER2) => Ok(()),
            other => Err(ImportError::UnsupportedInstrument {
                found: other.unwrap_or("<none>").to_string(),
            }),
        }
    }

    pub fn run_numbers(&self) -> Vec<u32> {
        self.runs.iter().map(|run| run.number).collect()
    }

    pub fn run(&self, number: u32) -> Option<&RunInfo> {
        self.runs.iter().find(|run| run.number == number)
    }
}

/// `stubInfoByUUID`'s first key when present, `$1` otherwise
fn instrument_id(graph: &ObjectGraph) -> Option<String> {
    if let Some(stubs) = graph.top_field("stubInfoByUUID") {
        if let Some((key, _)) = graph.entries(stubs).and_then(|e| e.into_iter().next()) {
            return key.as_str().map(str::to_string);
        }
    }
    graph
        .top_field("$1")
        .and_then(|v| graph.str(v))
        .map(str::to_string)
}

fn read_runs(graph: &ObjectGraph) -> Result<Vec<RunInfo>> {
    let run_list = graph
        .top_field(RUN_DATA_KEY)
        .ok_or(ImportError::MissingTemplateField(RUN_DATA_KEY))?;
    let run_numbers = graph
        .get(run_list, "runNumbers")
        .and_then(|v| graph.array(v))
        .ok_or(ImportError::MissingTemplateField("runNumbers"))?;
    let run_data = graph
        .get(run_list, "runData")
        .ok_or(ImportError::MissingTemplateField("runData"))?;

    let mut runs = Vec::with_capacity(run_numbers.len());
    for number in run_numbers {
        let Some(number) = graph.integer(number) else {
            warn!("Skipping run with non-integer number {:?}", number);
            continue;
        };
        let Ok(run_number) = u32::try_from(number) else {
            warn!("Skipping run with out of range number {}", number);
            continue;
        };

        let symbols_by_pid = graph
            .map_get_int(run_data, number)
            .and_then(|data| graph.map_get_str(data, "symbolsByPid"));
        let address_to_frame = match symbols_by_pid {
            Some(symbols_by_pid) => address_to_frame_map(graph, symbols_by_pid),
            None => {
                warn!("Run {} has no symbol tables; frames will show raw addresses", run_number);
                BTreeMap::new()
            }
        };

        debug!("Run {}: {} symbolicated addresses", run_number, address_to_frame.len());
        runs.push(RunInfo {
            number: run_number,
            address_to_frame,
        });
    }
    Ok(runs)
}

/// Merge every process's symbol table; the first symbol seen for an address wins
fn address_to_frame_map(graph: &ObjectGraph, symbols_by_pid: &ArchiveValue) -> BTreeMap<u64, FrameInfo> {
    let mut frames = BTreeMap::new();

    for (_, persistent) in graph.entries(symbols_by_pid).unwrap_or_default() {
        let Some(symbols) = graph.get(persistent, "symbols").and_then(|v| graph.array(v)) else {
            continue;
        };

        for symbol in symbols {
            let Some(address_to_line) = graph.get(symbol, "addressToLine") else {
                continue;
            };
            let symbol_name = graph.get(symbol, "symbolName").and_then(|v| graph.str(v));
            let source_path = graph.get(symbol, "sourcePath").and_then(|v| graph.str(v));

            for (address, line) in graph.entries(address_to_line).unwrap_or_default() {
                let Some(address) = address.as_integer() else {
                    continue;
                };
                let address = address as u64;
                frames.entry(address).or_insert_with(|| {
                    let name = symbol_name
                        .map(str::to_string)
                        .unwrap_or_else(|| format_address(address));
                    FrameInfo {
                        key: format!("{}:{}", source_path.unwrap_or(""), name),
                        name,
                        file: source_path.map(str::to_string),
                        line: graph.integer(line).and_then(|l| u32::try_from(l).ok()),
                    }
                });
            }
        }
    }
    frames
}
