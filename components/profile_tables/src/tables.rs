//! Per-thread columnar tables
//!
//! Each table is a struct of parallel column vectors plus a `length` that is
//! the authoritative row count. Rows are append-only and addressed by index.

use serde::{Deserialize, Serialize};

/// Function table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FuncTable {
    /// String index of the function name
    pub name: Vec<usize>,
    #[serde(rename = "isJS")]
    pub is_js: Vec<bool>,
    #[serde(rename = "relevantForJS")]
    pub relevant_for_js: Vec<bool>,
    /// Resource index, -1 for none
    pub resource: Vec<i64>,
    /// String index of the source file
    pub file_name: Vec<Option<usize>>,
    pub line_number: Vec<Option<u32>>,
    pub column_number: Vec<Option<u32>>,
    pub length: usize,
}

impl FuncTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a native function row
    pub fn add_func(&mut self, name: usize, file_name: Option<usize>, line_number: Option<u32>) -> usize {
        self.name.push(name);
        self.is_js.push(false);
        self.relevant_for_js.push(false);
        self.resource.push(-1);
        self.file_name.push(file_name);
        self.line_number.push(line_number);
        self.column_number.push(None);
        self.length += 1;
        self.length - 1
    }
}

/// Frame table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FrameTable {
    /// Instruction address, -1 when unknown
    pub address: Vec<i64>,
    pub inline_depth: Vec<u32>,
    pub category: Vec<Option<usize>>,
    pub subcategory: Vec<Option<usize>>,
    pub func: Vec<usize>,
    pub native_symbol: Vec<Option<usize>>,
    #[serde(rename = "innerWindowID")]
    pub inner_window_id: Vec<Option<u64>>,
    pub line: Vec<Option<u32>>,
    pub column: Vec<Option<u32>>,
    pub length: usize,
}

impl FrameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame row for `func`
    pub fn add_frame(&mut self, func: usize, address: Option<u64>, line: Option<u32>, category: usize) -> usize {
        self.address
            .push(address.and_then(|a| i64::try_from(a).ok()).unwrap_or(-1));
        self.inline_depth.push(0);
        self.category.push(Some(category));
        self.subcategory.push(Some(0));
        self.func.push(func);
        self.native_symbol.push(None);
        self.inner_window_id.push(None);
        self.line.push(line);
        self.column.push(None);
        self.length += 1;
        self.length - 1
    }
}

/// Stack table; each row is a frame on top of an optional prefix row
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StackTable {
    pub frame: Vec<usize>,
    pub prefix: Vec<Option<usize>>,
    pub category: Vec<usize>,
    pub subcategory: Vec<usize>,
    pub length: usize,
}

impl StackTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stack row
    ///
    /// `prefix` must name an existing row, so prefixes always point backwards.
    pub fn add_stack(&mut self, prefix: Option<usize>, frame: usize, category: usize) -> usize {
        debug_assert!(prefix.map_or(true, |p| p < self.length));
        self.frame.push(frame);
        self.prefix.push(prefix);
        self.category.push(category);
        self.subcategory.push(0);
        self.length += 1;
        self.length - 1
    }

    /// Frames of a stack, root first
    pub fn frames(&self, stack: usize) -> Vec<usize> {
        let mut frames = Vec::new();
        let mut current = Some(stack);
        while let Some(index) = current {
            let Some(&frame) = self.frame.get(index) else {
                break;
            };
            frames.push(frame);
            current = self.prefix.get(index).copied().flatten();
        }
        frames.reverse();
        frames
    }

    /// Rows with no prefix
    pub fn roots(&self) -> Vec<usize> {
        (0..self.length)
            .filter(|&index| self.prefix[index].is_none())
            .collect()
    }
}

/// Per-thread samples
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplesTable {
    pub stack: Vec<Option<usize>>,
    /// Sample time in milliseconds
    pub time: Vec<f64>,
    pub weight: Option<Vec<f64>>,
    pub weight_type: String,
    pub length: usize,
}

impl Default for SamplesTable {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            time: Vec::new(),
            weight: None,
            weight_type: "samples".to_string(),
            length: 0,
        }
    }
}

impl SamplesTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sample(&mut self, stack: Option<usize>, time: f64) -> usize {
        self.stack.push(stack);
        self.time.push(time);
        self.length += 1;
        self.length - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stack_frames_root_first() {
        let mut stacks = StackTable::new();
        let root = stacks.add_stack(None, 0, 0);
        let a = stacks.add_stack(Some(root), 1, 0);
        let b = stacks.add_stack(Some(a), 2, 0);
        let sibling = stacks.add_stack(Some(root), 3, 0);

        assert_eq!(stacks.frames(b), vec![0, 1, 2]);
        assert_eq!(stacks.frames(sibling), vec![0, 3]);
        assert_eq!(stacks.roots(), vec![root]);
        assert_eq!(stacks.length, 4);
    }

    #[test]
    fn test_table_lengths_track_rows() {
        let mut funcs = FuncTable::new();
        let mut frames = FrameTable::new();
        let func = funcs.add_func(0, Some(1), None);
        let frame = frames.add_frame(func, Some(0x1000), Some(12), 0);
        let unknown = frames.add_frame(func, Some(u64::MAX), None, 0);

        assert_eq!((funcs.length, frames.length), (1, 2));
        assert_eq!(frames.func[frame], func);
        assert_eq!(frames.address, vec![0x1000, -1]);
        assert_eq!(frames.line[unknown], None);
    }

    #[test]
    fn test_serialized_column_names() {
        let mut funcs = FuncTable::new();
        funcs.add_func(3, None, None);
        let json = serde_json::to_value(&funcs).unwrap();
        assert_eq!(json["isJS"], serde_json::json!([false]));
        assert_eq!(json["fileName"], serde_json::json!([null]));
        assert_eq!(json["length"], 1);

        let samples = SamplesTable::new();
        let json = serde_json::to_value(&samples).unwrap();
        assert_eq!(json["weightType"], "samples");
        assert!(json["weight"].is_null());
    }
}
