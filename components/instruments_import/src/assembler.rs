//! Profile assembly
//!
//! Backtrace ids are expanded into root-first address stacks, then each
//! thread id gets its own function, frame and stack tables. Every thread
//! starts with a synthetic `(root)` stack that all samples hang off.

use profile_tables::{Profile, ProfileMeta, StringTable, Thread};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;
use tracing::{debug, info, warn};
use trace_store::{BacktraceArrays, RawSample};

use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::form_template::FrameInfo;

/// Function key of the synthetic root
pub const ROOT_KEY: &str = "$00000000";

/// Name of the synthetic root function
pub const ROOT_NAME: &str = "(root)";

const OTHER_CATEGORY: usize = 0;

/// A sample together with its resolved stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: u64,
    pub thread_id: u32,
    pub backtrace_id: u32,
    /// Frame addresses, root first; `None` until resolved
    pub backtrace_stack: Option<Rc<[u64]>>,
}

impl From<RawSample> for Sample {
    fn from(raw: RawSample) -> Self {
        Self {
            timestamp: raw.timestamp,
            thread_id: raw.thread_id,
            backtrace_id: raw.backtrace_id,
            backtrace_stack: None,
        }
    }
}

/// Expands backtrace ids into address stacks, once per id
///
/// Ids that are neither a known frame nor an array index are registered as
/// raw-address frames, so the frame map grows while resolving.
pub struct BacktraceResolver<'a> {
    arrays: &'a BacktraceArrays,
    frames: BTreeMap<u64, FrameInfo>,
    stacks: HashMap<u64, Rc<[u64]>>,
    expanding: HashSet<u64>,
}

impl<'a> BacktraceResolver<'a> {
    pub fn new(arrays: &'a BacktraceArrays, frames: BTreeMap<u64, FrameInfo>) -> Self {
        Self {
            arrays,
            frames,
            stacks: HashMap::new(),
            expanding: HashSet::new(),
        }
    }

    /// Root-first stack for a backtrace id
    pub fn resolve(&mut self, id: u64) -> Result<Rc<[u64]>> {
        if let Some(stack) = self.stacks.get(&id) {
            return Ok(Rc::clone(stack));
        }

        let mut stack = Vec::new();
        self.append(id, &mut stack)?;
        stack.reverse();

        let stack: Rc<[u64]> = stack.into();
        self.stacks.insert(id, Rc::clone(&stack));
        Ok(stack)
    }

    fn append(&mut self, id: u64, stack: &mut Vec<u64>) -> Result<()> {
        if self.frames.contains_key(&id) {
            stack.push(id);
            return Ok(());
        }

        let arrays = self.arrays;
        if let Some(elements) = arrays.get(id) {
            if !self.expanding.insert(id) {
                return Err(ImportError::InvalidBacktrace {
                    id,
                    reason: "backtrace array contains itself".to_string(),
                });
            }
            for &element in elements {
                self.append(element, stack)?;
            }
            self.expanding.remove(&id);
            return Ok(());
        }

        self.frames.insert(id, FrameInfo::raw_address(id));
        stack.push(id);
        Ok(())
    }

    pub fn frames(&self) -> &BTreeMap<u64, FrameInfo> {
        &self.frames
    }

    pub fn into_frames(self) -> BTreeMap<u64, FrameInfo> {
        self.frames
    }
}

/// Resolve every sample's stack
pub fn resolve_samples(samples: &[RawSample], resolver: &mut BacktraceResolver<'_>) -> Result<Vec<Sample>> {
    samples
        .iter()
        .map(|&raw| -> Result<Sample> {
            let mut sample = Sample::from(raw);
            sample.backtrace_stack = Some(resolver.resolve(u64::from(raw.backtrace_id))?);
            Ok(sample)
        })
        .collect()
}

/// Profile metadata for an Instruments import
pub fn profile_meta(config: &ImportConfig, imported_from: Option<&str>) -> ProfileMeta {
    ProfileMeta {
        interval: config.interval_ms(),
        start_time: 0.0,
        product: "Instruments".to_string(),
        platform: "macOS".to_string(),
        oscpu: Some("macOS".to_string()),
        imported_from: imported_from.map(str::to_string),
        ..ProfileMeta::default()
    }
}

/// Build a profile with one thread per distinct thread id
pub fn assemble_profile(
    samples: &[RawSample],
    backtraces: &BacktraceArrays,
    frames: BTreeMap<u64, FrameInfo>,
    config: &ImportConfig,
    meta: ProfileMeta,
) -> Result<Profile> {
    let symbolicated = frames.len();
    let mut resolver = BacktraceResolver::new(backtraces, frames);
    let samples = resolve_samples(samples, &mut resolver)?;
    let frames = resolver.into_frames();
    debug!(
        "Resolved {} samples: {} symbolicated and {} raw frames",
        samples.len(),
        symbolicated,
        frames.len() - symbolicated
    );

    let mut profile = Profile::new(meta);
    if samples.is_empty() {
        warn!("Time profile store holds no samples");
        return Ok(profile);
    }

    for (thread_id, thread_samples) in group_by_thread(&samples) {
        let mut builder = ThreadBuilder::new(thread_id, &mut profile.shared.string_array);
        builder.register_frames(&frames);
        for sample in thread_samples {
            builder.add_sample(sample, config.timestamp_divisor())?;
        }
        let thread = builder.finish();
        profile.threads.push(thread);
    }

    mark_main_thread(&mut profile.threads);
    info!(
        "Assembled profile: {} threads, {} strings",
        profile.threads.len(),
        profile.string_table().len()
    );
    Ok(profile)
}

/// Samples per thread id, threads in order of first appearance
fn group_by_thread(samples: &[Sample]) -> Vec<(u32, Vec<&Sample>)> {
    let mut groups: Vec<(u32, Vec<&Sample>)> = Vec::new();
    let mut index_of: HashMap<u32, usize> = HashMap::new();
    for sample in samples {
        let index = *index_of.entry(sample.thread_id).or_insert_with(|| {
            groups.push((sample.thread_id, Vec::new()));
            groups.len() - 1
        });
        groups[index].1.push(sample);
    }
    groups
}

/// The busiest thread is the main thread; ties go to the earliest
fn mark_main_thread(threads: &mut [Thread]) {
    let mut busiest: Option<usize> = None;
    for (index, thread) in threads.iter().enumerate() {
        if busiest.map_or(true, |b| thread.sample_count() > threads[b].sample_count()) {
            busiest = Some(index);
        }
    }
    if let Some(index) = busiest {
        threads[index].is_main_thread = true;
    }
}

struct ThreadBuilder<'s> {
    thread: Thread,
    strings: &'s mut StringTable,
    func_by_key: HashMap<String, usize>,
    frame_by_address: HashMap<u64, usize>,
    stack_by_prefix_and_address: HashMap<(usize, u64), usize>,
    root_stack: usize,
}

impl<'s> ThreadBuilder<'s> {
    fn new(thread_id: u32, strings: &'s mut StringTable) -> Self {
        let mut thread = Thread::new(format!("Thread {}", thread_id), thread_id);

        let root_name = strings.index_for_string(ROOT_NAME);
        let root_func = thread.func_table.add_func(root_name, None, None);
        let root_frame = thread
            .frame_table
            .add_frame(root_func, None, None, OTHER_CATEGORY);
        let root_stack = thread
            .stack_table
            .add_stack(None, root_frame, OTHER_CATEGORY);

        let mut func_by_key = HashMap::new();
        func_by_key.insert(ROOT_KEY.to_string(), root_func);

        Self {
            thread,
            strings,
            func_by_key,
            frame_by_address: HashMap::new(),
            stack_by_prefix_and_address: HashMap::new(),
            root_stack,
        }
    }

    /// One frame per address; functions are shared by frames with the same key
    fn register_frames(&mut self, frames: &BTreeMap<u64, FrameInfo>) {
        for (&address, info) in frames {
            let func = match self.func_by_key.get(&info.key) {
                Some(&func) => func,
                None => {
                    let name = self.strings.index_for_string(&info.name);
                    let file = info.file.as_deref().map(|f| self.strings.index_for_string(f));
                    let func = self.thread.func_table.add_func(name, file, None);
                    self.func_by_key.insert(info.key.clone(), func);
                    func
                }
            };
            let frame = self
                .thread
                .frame_table
                .add_frame(func, Some(address), info.line, OTHER_CATEGORY);
            self.frame_by_address.insert(address, frame);
        }
    }

    fn add_sample(&mut self, sample: &Sample, timestamp_divisor: f64) -> Result<()> {
        let mut prefix = self.root_stack;
        for &address in sample.backtrace_stack.as_deref().unwrap_or(&[]) {
            let frame = *self
                .frame_by_address
                .get(&address)
                .ok_or_else(|| ImportError::InvalidBacktrace {
                    id: u64::from(sample.backtrace_id),
                    reason: format!("address {:#x} has no frame", address),
                })?;
            let parent = prefix;
            let stack_table = &mut self.thread.stack_table;
            prefix = *self
                .stack_by_prefix_and_address
                .entry((parent, address))
                .or_insert_with(|| stack_table.add_stack(Some(parent), frame, OTHER_CATEGORY));
        }

        self.thread
            .samples
            .add_sample(Some(prefix), sample.timestamp as f64 / timestamp_divisor);
        Ok(())
    }

    fn finish(self) -> Thread {
        debug!(
            "Thread {}: {} samples, {} stacks, {} functions",
            self.thread.tid,
            self.thread.samples.length,
            self.thread.stack_table.length,
            self.thread.func_table.length
        );
        self.thread
    }
}
