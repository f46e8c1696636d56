//! Profile, threads and metadata

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::string_table::StringTable;
use crate::tables::{FrameTable, FuncTable, SamplesTable, StackTable};

/// Processed profile format version written into `meta`
pub const PREPROCESSED_PROFILE_VERSION: u32 = 57;

/// Gecko profile version; readers only look at the preprocessed version
pub const GECKO_PROFILE_VERSION: u32 = 24;

/// Sample category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,
    pub color: String,
    pub subcategories: Vec<String>,
}

impl Category {
    pub fn new(name: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            color: color.to_string(),
            subcategories: vec!["Other".to_string()],
        }
    }
}

/// Profile-wide metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMeta {
    /// Sampling interval in milliseconds
    pub interval: f64,
    /// Profile start, milliseconds
    pub start_time: f64,
    pub process_type: u32,
    pub product: String,
    pub platform: String,
    pub oscpu: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imported_from: Option<String>,
    pub categories: Vec<Category>,
    pub marker_schema: Vec<serde_json::Value>,
    pub stackwalk: u32,
    pub debug: bool,
    pub symbolicated: bool,
    pub version: u32,
    pub preprocessed_profile_version: u32,
}

impl Default for ProfileMeta {
    fn default() -> Self {
        Self {
            interval: 1.0,
            start_time: 0.0,
            process_type: 0,
            product: String::new(),
            platform: String::new(),
            oscpu: None,
            imported_from: None,
            categories: vec![Category::new("Other", "grey")],
            marker_schema: Vec::new(),
            stackwalk: 1,
            debug: false,
            symbolicated: true,
            version: GECKO_PROFILE_VERSION,
            preprocessed_profile_version: PREPROCESSED_PROFILE_VERSION,
        }
    }
}

/// One thread with its own function, frame, stack and sample tables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub name: String,
    pub process_type: String,
    pub process_name: Option<String>,
    pub process_startup_time: f64,
    pub process_shutdown_time: Option<f64>,
    pub register_time: f64,
    pub unregister_time: Option<f64>,
    pub is_main_thread: bool,
    pub pid: String,
    pub tid: u32,
    pub func_table: FuncTable,
    pub frame_table: FrameTable,
    pub stack_table: StackTable,
    pub samples: SamplesTable,
}

impl Thread {
    pub fn new(name: impl Into<String>, tid: u32) -> Self {
        Self {
            name: name.into(),
            process_type: "default".to_string(),
            process_name: None,
            process_startup_time: 0.0,
            process_shutdown_time: None,
            register_time: 0.0,
            unregister_time: None,
            is_main_thread: false,
            pid: "0".to_string(),
            tid,
            func_table: FuncTable::new(),
            frame_table: FrameTable::new(),
            stack_table: StackTable::new(),
            samples: SamplesTable::new(),
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.length
    }
}

/// Tables shared by every thread
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SharedTables {
    pub string_array: StringTable,
}

/// A complete processed profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub meta: ProfileMeta,
    pub shared: SharedTables,
    pub threads: Vec<Thread>,
}

impl Profile {
    pub fn new(meta: ProfileMeta) -> Self {
        Self {
            meta,
            shared: SharedTables::default(),
            threads: Vec::new(),
        }
    }

    pub fn string_table(&self) -> &StringTable {
        &self.shared.string_array
    }

    pub fn string_table_mut(&mut self) -> &mut StringTable {
        &mut self.shared.string_array
    }

    /// Resolve a string index from the shared table
    pub fn string(&self, index: usize) -> Option<&str> {
        self.shared.string_array.get_string(index)
    }

    pub fn thread_by_tid(&self, tid: u32) -> Option<&Thread> {
        self.threads.iter().find(|thread| thread.tid == tid)
    }

    /// Function names along a sample's stack, root first
    pub fn stack_function_names(&self, thread: &Thread, stack: usize) -> Vec<&str> {
        thread
            .stack_table
            .frames(stack)
            .into_iter()
            .filter_map(|frame| thread.frame_table.func.get(frame))
            .filter_map(|&func| thread.func_table.name.get(func))
            .filter_map(|&name| self.string(name))
            .collect()
    }

    /// Serialize to the processed profile JSON format
    pub fn to_json(&self) -> serde_json::Result<String> {
        let json = serde_json::to_string(self)?;
        debug!("Serialized profile: {} threads, {} bytes", self.threads.len(), json.len());
        Ok(json)
    }

    pub fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
