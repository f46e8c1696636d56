//! Format Tests for the layers below the import pipeline
//!
//! Each layer is driven with bytes produced by the fixture builders so the
//! on-disk formats stay consistent with what the importer expects.

use instruments_import::test_support::{bulkstore_bytes, uniquer_bytes, FixtureRun, FixtureSymbol, TraceFixture};
use instruments_import::{
    import_instruments_trace, is_instruments_profile, FormTemplate, ImportConfig, InstrumentsInterpreter,
    CORE_SAMPLER2,
};
use keyed_archive::read_keyed_archive;
use plist_reader::{is_binary_plist, parse_binary_plist, PlistValue};
use pretty_assertions::assert_eq;
use std::path::Path;
use trace_store::{parse_bulkstore, parse_integer_uniquer, RawSample, DEFAULT_PREAMBLE_WORDS};

fn fixture() -> TraceFixture {
    TraceFixture::new("Format.trace")
        .run(
            FixtureRun::new(3)
                .symbol(FixtureSymbol::new("draw", "/src/ui.m", &[(0xa0, 5), (0xa8, 6)]))
                .backtrace(&[0xa0]),
        )
        .run(FixtureRun::new(4))
}

/// Test 1: Bundle name detection
#[test]
fn test_bundle_names() {
    for name in ["Launch.trace", "a.b.trace", "Time Profiler.trace"] {
        assert!(is_instruments_profile(name), "{}", name);
    }
    for name in ["", "trace", ".trace", "Launch.json", "Launch.trace.zip"] {
        assert!(!is_instruments_profile(name), "{}", name);
    }
}

/// Test 2: form.template is a keyed archive inside a binary plist
#[test]
fn test_template_plist_layout() {
    let bytes = fixture().form_template();
    assert!(is_binary_plist(&bytes));

    let PlistValue::Dictionary(root) = parse_binary_plist(&bytes).unwrap() else {
        panic!("archive root is not a dictionary");
    };
    assert_eq!(root.get("$archiver"), Some(&PlistValue::String("NSKeyedArchiver".to_string())));
    assert!(matches!(root.get("$objects"), Some(PlistValue::Array(_))));
    assert!(matches!(root.get("$top"), Some(PlistValue::Dictionary(_))));
}

/// Test 3: Template runs and symbols
#[test]
fn test_template_runs() {
    let bytes = fixture().form_template();
    let graph = read_keyed_archive(&bytes, &InstrumentsInterpreter).unwrap();
    let template = FormTemplate::from_graph(&graph).unwrap();

    assert_eq!(template.version, Some(1));
    assert_eq!(template.instrument.as_deref(), Some(CORE_SAMPLER2));
    assert_eq!(template.run_numbers(), vec![3, 4]);

    let run = template.run(3).unwrap();
    let draw = &run.address_to_frame[&0xa8];
    assert_eq!(draw.key, "/src/ui.m:draw");
    assert_eq!(draw.name, "draw");
    assert_eq!(draw.line, Some(6));
    assert!(template.run(4).unwrap().address_to_frame.is_empty());
}

/// Test 4: Sample records stop at the sentinel
#[test]
fn test_bulkstore_records() {
    let samples = vec![
        RawSample {
            timestamp: 0xffff_ffff_ffff,
            thread_id: 1,
            backtrace_id: 7,
        },
        RawSample {
            timestamp: 12,
            thread_id: u32::MAX,
            backtrace_id: 0,
        },
    ];
    let mut bytes = bulkstore_bytes(&samples);
    // Trailing garbage after the sentinel is never read
    bytes.extend_from_slice(&[0xff; 5]);

    assert_eq!(parse_bulkstore(&bytes, DEFAULT_PREAMBLE_WORDS).unwrap(), samples);
}

/// Test 5: Backtrace arrays keep their ids
#[test]
fn test_uniquer_arrays() {
    let arrays = vec![vec![0x10, 0x20], vec![], vec![0, 0x30]];
    let (index, data) = uniquer_bytes(&arrays);

    let parsed = parse_integer_uniquer(&index, &data).unwrap();
    assert_eq!(parsed.len(), 3);
    assert_eq!(parsed.get(2), Some(&[0u64, 0x30][..]));
    assert_eq!(parsed.get(1), Some(&[][..]));
}

/// Test 6: In-memory bundle through the whole pipeline
#[test]
fn test_memory_bundle_import() {
    let fixture = TraceFixture::new("Memory.trace").run(
        FixtureRun::new(1)
            .symbol(FixtureSymbol::new("main", "/src/main.c", &[(0x10, 1)]))
            .backtrace(&[0x10])
            .sample(1_000_000, 5, 0)
            .sample(2_000_000, 6, 0),
    );
    let access = fixture.memory_access();

    let profile = tokio_test::block_on(import_instruments_trace(
        &access,
        Path::new("Memory.trace"),
        &ImportConfig::default(),
    ))
    .unwrap();

    assert_eq!(profile.threads.len(), 2);
    for thread in &profile.threads {
        assert_eq!(thread.stack_table.roots(), vec![0]);
        assert_eq!(thread.samples.length, 1);
    }
    assert_eq!(profile.threads[0].samples.time, vec![1.0]);
    assert_eq!(profile.threads[1].samples.time, vec![2.0]);
}
