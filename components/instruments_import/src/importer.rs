//! Import pipeline
//!
//! `form.template` → run selection → `corespace/run{N}/core` stores →
//! assembled profile. Every file read goes through the caller's
//! [`FileAccess`].

use profile_tables::Profile;
use std::path::Path;
use tracing::{info, warn};
use trace_store::{read_directory_tree, read_run_stores, FileAccess, TraceDirectoryTree};

use crate::assembler::{assemble_profile, profile_meta};
use crate::config::ImportConfig;
use crate::error::{ImportError, Result};
use crate::form_template::{FormTemplate, RunInfo};

/// Name of the keyed archive describing the recording
pub const FORM_TEMPLATE: &str = "form.template";

/// True for names like `Recording.trace`
///
/// A name needs a non-empty part before its first dot and must end in
/// `.trace`.
pub fn is_instruments_profile(file_name: &str) -> bool {
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() < 2 || parts[0].is_empty() {
        return false;
    }
    parts.last() == Some(&"trace")
}

/// Import the `.trace` bundle rooted at `root`
pub async fn import_instruments_trace(
    access: &dyn FileAccess,
    root: &Path,
    config: &ImportConfig,
) -> Result<Profile> {
    let tree = read_directory_tree(access, root).await?;
    info!(
        "Read {}: {} files",
        tree.path.display(),
        tree.file_count()
    );
    import_from_tree(access, &tree, config).await
}

/// Import from an already materialized bundle tree
pub async fn import_from_tree(
    access: &dyn FileAccess,
    tree: &TraceDirectoryTree,
    config: &ImportConfig,
) -> Result<Profile> {
    let bytes = access.read_bytes(tree.file(FORM_TEMPLATE)?).await?;
    let template = FormTemplate::parse(&bytes)?;
    info!(
        "form.template version {:?}, instrument {}",
        template.version,
        template.instrument.as_deref().unwrap_or("<none>")
    );

    if config.require_supported_instrument() {
        template.ensure_supported_instrument()?;
    }

    let run = select_run(&template, config)?;
    info!(
        "Importing run {} of {:?}",
        run.number,
        template.run_numbers()
    );

    let core = tree.core_dir_for_run(run.number)?;
    let stores = read_run_stores(
        access,
        core,
        config.schema_marker(),
        config.bulkstore_preamble_words(),
    )
    .await?;

    let meta = profile_meta(config, Some(tree.name.as_str()).filter(|name| !name.is_empty()));
    assemble_profile(
        &stores.samples,
        &stores.backtraces,
        run.address_to_frame,
        config,
        meta,
    )
}

/// Pick the run to convert
///
/// An explicit run must be listed in the template. Otherwise the first listed
/// run is used; a template that lists none falls back to its selected run
/// without symbols.
pub fn select_run(template: &FormTemplate, config: &ImportConfig) -> Result<RunInfo> {
    if let Some(number) = config.run_number() {
        return template
            .run(number)
            .cloned()
            .ok_or_else(|| ImportError::RunNotFound {
                run: number,
                available: template.run_numbers(),
            });
    }

    if let Some(first) = template.runs.first() {
        if template.runs.len() > 1 {
            warn!(
                "Trace holds {} runs; only run {} is imported",
                template.runs.len(),
                first.number
            );
        }
        return Ok(first.clone());
    }

    warn!(
        "form.template lists no runs; using selected run {}",
        template.selected_run_number
    );
    Ok(RunInfo {
        number: template.selected_run_number,
        ..RunInfo::default()
    })
}
