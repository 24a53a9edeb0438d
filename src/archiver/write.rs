//! Archive writer pipeline.
//!
//! Collect scene objects, compute the asset closure, fetch and write
//! every asset, then settings, terrain and object entries, and finally
//! the control file.

use std::collections::HashSet;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::container::{format, ContainerWriter, ControlFile};
use crate::gather::{AssetRefs, Gatherer};
use crate::model::{object_to_xml, Asset};
use crate::scene::Scene;
use crate::store::AssetStore;
use crate::util::Result;

/// Options for one export call.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Skip the `assets/` sub-tree entirely when false.
    pub skip_assets: bool,
    /// When set, top-level objects whose root part creator is absent
    /// are excluded from the archive.
    pub creator_whitelist: Option<HashSet<Uuid>>,
}

/// What an export accomplished; advisory, never fatal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub objects_written: usize,
    pub objects_excluded: usize,
    pub assets_written: usize,
    pub assets_missing: usize,
}

/// Export a scene into a container stream.
pub fn export_archive(
    scene: &dyn Scene,
    store: &dyn AssetStore,
    dest: impl Write,
    opts: &ExportOptions,
) -> Result<ExportSummary> {
    let mut summary = ExportSummary::default();
    let region = scene.region().clone();
    let mut writer = ContainerWriter::new(dest);

    for dir in [
        format::ASSETS_PATH,
        format::OBJECTS_PATH,
        format::TERRAINS_PATH,
        format::SETTINGS_PATH,
    ] {
        writer.write_dir(dir)?;
    }

    // Select objects, applying the export whitelist if any.
    let mut objects = scene.objects();
    if let Some(whitelist) = &opts.creator_whitelist {
        let before = objects.len();
        objects.retain(|obj| whitelist.contains(&obj.root().creator_id));
        summary.objects_excluded = before - objects.len();
        if summary.objects_excluded > 0 {
            info!(
                "excluding {} object(s) outside the creator whitelist",
                summary.objects_excluded
            );
        }
    }

    if !opts.skip_assets {
        let mut refs = AssetRefs::new();
        let mut gatherer = Gatherer::new(store);
        for obj in &objects {
            gatherer.gather_object(obj, &mut refs);
        }

        // Independent fetches, no ordering requirement: fan out, then
        // write sequentially in closure order.
        let fetched: Vec<(Uuid, Option<Asset>)> = refs
            .par_iter()
            .map(|(&id, _)| (id, store.get(id).ok()))
            .collect();
        let mut by_id: std::collections::BTreeMap<Uuid, Option<Asset>> =
            fetched.into_iter().collect();

        for (&id, &declared_kind) in &refs {
            match by_id.remove(&id).flatten() {
                Some(asset) => {
                    writer.write_file(&format::asset_path(id, asset.kind), &asset.data)?;
                    summary.assets_written += 1;
                }
                None => {
                    debug!("asset {id} ({declared_kind:?}) not in store, skipped");
                }
            }
        }
        // Misses found at write time (asset vanished between gather and
        // fetch) fold into the same advisory count.
        summary.assets_missing = refs.len() - summary.assets_written;
        if summary.assets_missing > 0 {
            warn!(
                "{} of {} referenced assets missing from the store",
                summary.assets_missing,
                refs.len()
            );
        }
    }

    writer.write_file(
        &format::settings_path(&region.name),
        &scene.settings_blob(),
    )?;
    writer.write_file(&format::terrain_path(&region.name), &scene.terrain_blob())?;

    for obj in &objects {
        let path = format::object_path(&obj.name, obj.position, obj.id);
        writer.write_file(&path, object_to_xml(obj).as_bytes())?;
        summary.objects_written += 1;
    }

    let create_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let control = ControlFile::new(
        region.id,
        create_time,
        !opts.skip_assets,
        (region.size_x, region.size_y),
    );
    writer.write_file(format::CONTROL_FILE_PATH, control.to_xml().as_bytes())?;
    writer.finish()?;

    info!(
        "exported {} object(s), {} asset(s) from {}",
        summary.objects_written, summary.assets_written, region.name
    );
    Ok(summary)
}
