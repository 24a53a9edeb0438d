//! Archive entry points: export, import and the attribution scan.
//!
//! These free functions bind the pipelines to a scene instance for one
//! call; no state outlives a call except the attribution table behind
//! its store handle.

pub mod read;
pub mod scan;
pub mod write;

use std::io::Read;

use crate::filter::AttributionStore;
use crate::scene::{Scene, UserDirectory};
use crate::store::AssetStore;
use crate::util::Result;

pub use read::{ImportOptions, ImportRun, ImportSummary};
pub use scan::scan_asset_creators;
pub use write::{export_archive, ExportOptions, ExportSummary};

/// Import a container into a scene.
///
/// Always returns a summary when the stream was reached; the summary's
/// `error` field carries any stream-fatal failure alongside the partial
/// statistics.
pub fn import_archive(
    scene: &mut dyn Scene,
    store: &dyn AssetStore,
    users: &dyn UserDirectory,
    attribution: &dyn AttributionStore,
    source: impl Read,
    opts: ImportOptions,
) -> Result<ImportSummary> {
    ImportRun::new(scene, store, users, attribution, opts).run(source)
}
