//! Pipeline tests over in-memory bundles

use instruments_import::test_support::{FixtureRun, FixtureSymbol, TraceFixture};
use instruments_import::{import_instruments_trace, ErrorKind, ImportConfig, ImportError};
use pretty_assertions::assert_eq;
use std::path::Path;

fn single_run() -> TraceFixture {
    TraceFixture::new("Recording.trace").run(
        FixtureRun::new(1)
            .symbol(FixtureSymbol::new("main", "/src/main.c", &[(0x1000, 3)]))
            .symbol(FixtureSymbol::new("work", "/src/work.c", &[(0x2000, 10), (0x2004, 11)]))
            .backtrace(&[0x2000, 0x1000])
            .backtrace(&[0x2004, 0x1000])
            .backtrace(&[0xfeed, 1])
            .sample(1_000_000, 1, 0)
            .sample(2_000_000, 1, 1)
            .sample(3_000_000, 1, 2)
            .sample(4_000_000, 2, 0),
    )
}

#[tokio::test]
async fn test_imports_threads_and_symbols() {
    let fixture = single_run();
    let access = fixture.memory_access();
    let profile = import_instruments_trace(&access, Path::new("Recording.trace"), &ImportConfig::default())
        .await
        .unwrap();

    assert_eq!(profile.meta.product, "Instruments");
    assert_eq!(profile.meta.imported_from.as_deref(), Some("Recording.trace"));
    assert_eq!(profile.threads.len(), 2);

    let thread = &profile.threads[0];
    assert_eq!(thread.name, "Thread 1");
    assert!(thread.is_main_thread);
    assert_eq!(thread.samples.time, vec![1.0, 2.0, 3.0]);

    let names: Vec<Vec<&str>> = thread
        .samples
        .stack
        .iter()
        .map(|stack| profile.stack_function_names(thread, stack.unwrap()))
        .collect();
    assert_eq!(
        names,
        vec![
            vec!["(root)", "main", "work"],
            vec!["(root)", "main", "work"],
            vec!["(root)", "main", "work", "0x000000000000feed"],
        ]
    );

    // Two addresses of `work` share one function but keep separate frames
    assert_eq!(thread.func_table.length, 4);
    assert_eq!(thread.frame_table.length, 5);
}

#[tokio::test]
async fn test_run_override_must_exist() {
    let fixture = single_run();
    let access = fixture.memory_access();
    let config = ImportConfig::builder().run_number(4).build().unwrap();

    let err = import_instruments_trace(&access, Path::new("Recording.trace"), &config)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_second_run_selected_by_config() {
    let fixture = single_run().run(
        FixtureRun::new(2)
            .backtrace(&[0x4000])
            .sample(9_000_000, 7, 0),
    );
    let access = fixture.memory_access();
    let config = ImportConfig::builder().run_number(2).build().unwrap();

    let profile = import_instruments_trace(&access, Path::new("Recording.trace"), &config)
        .await
        .unwrap();
    assert_eq!(profile.threads.len(), 1);
    assert_eq!(profile.threads[0].tid, 7);
    assert_eq!(profile.threads[0].samples.time, vec![9.0]);
}

#[tokio::test]
async fn test_unsupported_instrument() {
    let fixture = single_run().instrument("com.apple.xray.instrument-type.activity");
    let access = fixture.memory_access();

    let err = import_instruments_trace(&access, Path::new("Recording.trace"), &ImportConfig::default())
        .await
        .unwrap_err();
    match err {
        ImportError::UnsupportedInstrument { found } => {
            assert_eq!(found, "com.apple.xray.instrument-type.activity");
        }
        other => panic!("expected unsupported instrument, got {:?}", other),
    }

    let lenient = ImportConfig::builder()
        .require_supported_instrument(false)
        .build()
        .unwrap();
    let profile = import_instruments_trace(&access, Path::new("Recording.trace"), &lenient)
        .await
        .unwrap();
    assert_eq!(profile.threads.len(), 2);
}

#[tokio::test]
async fn test_missing_schema_match() {
    let fixture = TraceFixture::new("Recording.trace").run(
        FixtureRun::new(1)
            .schema_marker("name=\"thread-state\"")
            .backtrace(&[0x10])
            .sample(1, 1, 0),
    );
    let access = fixture.memory_access();

    let err = import_instruments_trace(&access, Path::new("Recording.trace"), &ImportConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_missing_form_template() {
    let mut access = single_run().memory_access();
    access.insert("Other.trace/corespace/run1/core/placeholder", vec![0]);

    let err = import_instruments_trace(&access, Path::new("Other.trace"), &ImportConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().contains("form.template"));
}

#[test]
fn test_truncated_template_is_format_error() {
    let fixture = single_run();
    let mut access = fixture.memory_access();
    let mut template = fixture.form_template();
    template.truncate(template.len() / 2);
    access.insert("Recording.trace/form.template", template);

    let result = tokio_test::block_on(import_instruments_trace(
        &access,
        Path::new("Recording.trace"),
        &ImportConfig::default(),
    ));
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Format);
}
