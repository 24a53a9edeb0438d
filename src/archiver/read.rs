//! Archive reader pipeline.
//!
//! One import call moves through: stream entries (assets stored,
//! object payloads buffered, terrain/settings applied) → deserialize
//! and filter buffered objects → merge into the destination scene →
//! persist attribution and report. A stream-level error aborts the
//! remaining phases; state already applied is kept, never rolled back.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::container::{format, ContainerEntry, ContainerReader, ControlFile, EntryClass, EntryKind};
use crate::filter::{AttributionStore, AttributionTable, ContentPolicy, FilterAction, FilterCounters};
use crate::model::{object_from_xml, Asset, SceneObject};
use crate::scene::{Scene, UserDirectory};
use crate::store::AssetStore;
use crate::util::{Error, Result};

/// Options for one import call.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Keep existing scene content, terrain and settings.
    pub merge: bool,
    /// Re-resolve object ownership against the destination instead of
    /// trusting archive-declared owners.
    pub reassign_owners: bool,
    /// Preferred owner when reassigning.
    pub owner_override: Option<Uuid>,
    /// Skip objects that fail to decode instead of aborting.
    pub skip_error_objects: bool,
    /// Creator/owner allow-list; `None` disables filtering.
    pub allowed_creators: Option<HashSet<Uuid>>,
}

/// What an import accomplished, returned to the caller even after a
/// stream-fatal abort.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub objects_restored: usize,
    /// Entries that failed to decode and were skipped.
    pub objects_skipped: usize,
    /// No-copy objects reconciled by pose update instead of insertion.
    pub objects_merged: usize,
    pub assets_restored: usize,
    pub assets_failed: usize,
    pub filter: FilterCounters,
    /// Set when the stream aborted; partial counts above still apply.
    pub error: Option<String>,
}

/// One import call, binding the pipelines to a destination scene.
pub struct ImportRun<'a> {
    scene: &'a mut dyn Scene,
    store: &'a dyn AssetStore,
    users: &'a dyn UserDirectory,
    attribution_store: &'a dyn AttributionStore,
    opts: ImportOptions,
    control: Option<ControlFile>,
    /// Buffered `objects/` payloads: deserialization is deferred until
    /// every asset entry has been stored.
    object_texts: Vec<(String, String)>,
    summary: ImportSummary,
}

impl<'a> ImportRun<'a> {
    pub fn new(
        scene: &'a mut dyn Scene,
        store: &'a dyn AssetStore,
        users: &'a dyn UserDirectory,
        attribution_store: &'a dyn AttributionStore,
        opts: ImportOptions,
    ) -> Self {
        Self {
            scene,
            store,
            users,
            attribution_store,
            opts,
            control: None,
            object_texts: Vec::new(),
            summary: ImportSummary::default(),
        }
    }

    /// Drive the import to completion.
    ///
    /// Returns `Err` only for setup failures before the stream opens;
    /// anything later is captured in the summary so the caller always
    /// receives the accumulated statistics.
    pub fn run(mut self, source: impl Read) -> Result<ImportSummary> {
        let mut attribution = self.attribution_store.load()?;

        if let Err(e) = self.execute(source, &mut attribution) {
            warn!("import aborted: {e}");
            self.summary.error = Some(e.to_string());
        }
        Ok(self.summary)
    }

    fn execute(&mut self, source: impl Read, attribution: &mut AttributionTable) -> Result<()> {
        self.stream(source)?;
        let incoming = self.materialize(attribution)?;
        let filtering = self.opts.allowed_creators.is_some();
        let incoming = self.filter(incoming, attribution)?;
        self.merge(incoming);
        if filtering {
            self.attribution_store.save(attribution)?;
        }
        info!(
            "import complete: {} restored, {} merged, {} skipped, {} assets",
            self.summary.objects_restored,
            self.summary.objects_merged,
            self.summary.objects_skipped,
            self.summary.assets_restored
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Streaming
    // ------------------------------------------------------------------

    fn stream(&mut self, source: impl Read) -> Result<()> {
        let mut reader = ContainerReader::new(source);
        for entry in reader.entries()? {
            let entry = entry?;
            if entry.kind == EntryKind::Directory {
                continue;
            }
            match format::classify(&entry.path) {
                EntryClass::Control => {
                    let text = std::str::from_utf8(&entry.data)
                        .map_err(|e| Error::ControlFile(format!("not UTF-8: {e}")))?;
                    self.control = Some(ControlFile::from_xml(text)?);
                }
                EntryClass::Asset => match self.load_asset(&entry) {
                    Ok(()) => self.summary.assets_restored += 1,
                    Err(e) if e.is_stream_fatal() => return Err(e),
                    Err(e) => {
                        warn!("skipping asset entry {}: {e}", entry.path);
                        self.summary.assets_failed += 1;
                    }
                },
                EntryClass::Object => match String::from_utf8(entry.data) {
                    Ok(text) => self.object_texts.push((entry.path, text)),
                    Err(e) => self.object_entry_failed(&entry.path, &e.to_string())?,
                },
                EntryClass::Terrain => {
                    if !self.opts.merge {
                        self.scene.apply_terrain(&entry.data);
                    }
                }
                EntryClass::Settings => {
                    if !self.opts.merge {
                        self.scene.apply_settings(&entry.data);
                    }
                }
                EntryClass::Reserved | EntryClass::Unknown => {
                    debug!("ignoring entry {}", entry.path);
                }
            }
        }
        if self.control.is_none() {
            warn!("container carried no control file");
        }
        Ok(())
    }

    fn load_asset(&mut self, entry: &ContainerEntry) -> Result<()> {
        let (id, kind) = format::parse_asset_path(&entry.path)?;
        self.store.put(Asset::new(id, kind, entry.data.clone()))
    }

    fn object_entry_failed(&mut self, path: &str, reason: &str) -> Result<()> {
        let err = Error::ObjectDecode {
            name: path.to_string(),
            reason: reason.to_string(),
        };
        if self.opts.skip_error_objects {
            warn!("skipping entry: {err}");
            self.summary.objects_skipped += 1;
            Ok(())
        } else {
            Err(Error::ImportAborted(err.to_string()))
        }
    }

    // ------------------------------------------------------------------
    // Materialization: deferred deserialization + attribution harvest
    // ------------------------------------------------------------------

    fn materialize(&mut self, attribution: &mut AttributionTable) -> Result<Vec<SceneObject>> {
        let texts = std::mem::take(&mut self.object_texts);
        let mut objects = Vec::with_capacity(texts.len());
        for (path, text) in texts {
            match object_from_xml(&text) {
                Ok(obj) => objects.push(obj),
                Err(e) => self.object_entry_failed(&path, &e.to_string())?,
            }
        }

        // Fresh attributions discovered in this archive are merged into
        // the snapshot; existing rows win.
        for obj in &objects {
            for part in &obj.parts {
                for item in &part.inventory {
                    if !item.asset_id.is_nil() && !item.creator_id.is_nil() {
                        attribution.entry(item.asset_id).or_insert(item.creator_id);
                    }
                }
            }
        }
        Ok(objects)
    }

    // ------------------------------------------------------------------
    // Filtering
    // ------------------------------------------------------------------

    /// Regenerate ids, resolve effective ownership and apply the filter
    /// policy. Returns each surviving object with its original root id.
    fn filter(
        &mut self,
        objects: Vec<SceneObject>,
        attribution: &AttributionTable,
    ) -> Result<Vec<(Uuid, SceneObject)>> {
        let mut policy = ContentPolicy::new(
            self.store,
            self.opts.allowed_creators.clone(),
            attribution.clone(),
            self.scene.library_asset_ids(),
        );

        let mut incoming = Vec::with_capacity(objects.len());
        for mut obj in objects {
            let original_id = obj.regenerate_ids();
            self.resolve_owner(&mut obj);
            match policy.filter_object(&mut obj)? {
                FilterAction::Drop => {}
                FilterAction::Keep { .. } => incoming.push((original_id, obj)),
            }
        }
        self.summary.filter = policy.counters;
        Ok(incoming)
    }

    /// Effective owner: archive-declared unless reassignment was
    /// requested; then the explicit override, then the declared owner
    /// when the directory knows it, then the estate owner.
    fn resolve_owner(&self, obj: &mut SceneObject) {
        if !self.opts.reassign_owners {
            return;
        }
        let declared = obj.owner_id();
        let effective = self.opts.owner_override.unwrap_or_else(|| {
            if self.users.knows(declared) {
                declared
            } else {
                debug!("owner {declared} unknown here, assigning estate owner");
                self.scene.estate_owner()
            }
        });
        for part in &mut obj.parts {
            part.owner_id = effective;
            for item in &mut part.inventory {
                item.owner_id = effective;
            }
        }
    }

    // ------------------------------------------------------------------
    // Merging
    // ------------------------------------------------------------------

    fn merge(&mut self, incoming: Vec<(Uuid, SceneObject)>) {
        // Outside merge mode the destination is cleared, except no-copy
        // non-attachment objects which survive, indexed by their
        // original id for positional reconciliation.
        let mut retained: HashMap<Uuid, ()> = HashMap::new();
        if !self.opts.merge {
            for existing in self.scene.objects() {
                if existing.is_no_copy() && !existing.is_attachment() {
                    retained.insert(existing.id, ());
                } else {
                    self.scene.remove_object(existing.id);
                }
            }
        }

        let unfiltered = self.opts.allowed_creators.is_none();
        for (original_id, obj) in incoming {
            if unfiltered && obj.is_no_copy() && retained.contains_key(&original_id) {
                // The destination already holds this non-duplicable
                // object; take the archived pose, discard the copy.
                self.scene.update_pose(original_id, obj.position, obj.rotation);
                self.summary.objects_merged += 1;
            } else {
                let id = obj.id;
                self.scene.insert_object(obj);
                self.scene.start_scripts(id);
                self.summary.objects_restored += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::write::{export_archive, ExportOptions};
    use crate::filter::MemoryAttributionStore;
    use crate::model::{AssetKind, TaskItem, TextureFace, PERM_COPY};
    use crate::scene::{MemoryDirectory, MemoryScene, RegionInfo};
    use crate::store::MemoryAssetStore;
    use glam::Vec3;

    fn export_to_buf(scene: &MemoryScene, store: &MemoryAssetStore) -> Vec<u8> {
        let mut buf = Vec::new();
        export_archive(scene, store, &mut buf, &ExportOptions::default()).unwrap();
        buf
    }

    fn import(
        scene: &mut MemoryScene,
        store: &MemoryAssetStore,
        buf: &[u8],
        opts: ImportOptions,
    ) -> ImportSummary {
        let users = MemoryDirectory::default();
        let attribution = MemoryAttributionStore::new();
        ImportRun::new(scene, store, &users, &attribution, opts)
            .run(buf)
            .unwrap()
    }

    #[test]
    fn test_roundtrip_preserves_content() {
        let source_store = MemoryAssetStore::new();
        let texture = Uuid::new_v4();
        let script_asset = Uuid::new_v4();
        source_store
            .put(Asset::new(texture, AssetKind::Texture, vec![9; 32]))
            .unwrap();
        source_store
            .put(Asset::new(
                script_asset,
                AssetKind::LslText,
                b"default{}".to_vec(),
            ))
            .unwrap();

        let owner = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let mut source = MemoryScene::new(RegionInfo::new("Source"), owner)
            .with_terrain(crate::model::terrain::flat(16, 20.0))
            .with_settings(b"<RegionSettings/>".to_vec());
        let mut obj = SceneObject::single("lamp", owner, creator);
        obj.position = Vec3::new(12.5, 33.25, 21.125);
        obj.parts[0].shape.face_textures = vec![Some(TextureFace::new(texture))];
        obj.parts[0].sound_id = Some(Uuid::new_v4());
        obj.parts[0].inventory.push(TaskItem {
            item_id: Uuid::new_v4(),
            asset_id: script_asset,
            kind: AssetKind::LslText,
            name: "greeter".into(),
            description: String::new(),
            owner_id: owner,
            creator_id: creator,
            coalesced: false,
        });
        let exported = obj.clone();
        source.add_object(obj);

        let buf = export_to_buf(&source, &source_store);

        let dest_store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(&mut dest, &dest_store, &buf, ImportOptions::default());

        assert!(summary.error.is_none());
        assert_eq!(summary.objects_restored, 1);
        assert_eq!(summary.assets_restored, 2);
        assert_eq!(dest.len(), 1);

        let restored = &dest.objects()[0];
        // Container ids change, content does not.
        assert_ne!(restored.id, exported.id);
        assert_eq!(restored.name, exported.name);
        assert_eq!(restored.position, exported.position);
        assert_eq!(restored.parts[0].shape, exported.parts[0].shape);
        assert_eq!(restored.parts[0].sound_id, exported.parts[0].sound_id);
        assert_eq!(
            restored.parts[0].inventory[0].asset_id,
            exported.parts[0].inventory[0].asset_id
        );
        assert_eq!(restored.parts[0].owner_id, owner);

        // Terrain and settings were applied, scripts scheduled.
        assert_eq!(dest.terrain_blob(), source.terrain_blob());
        assert_eq!(dest.settings_blob(), source.settings_blob());
        assert_eq!(dest.started_scripts, vec![restored.id]);

        // Assets landed in the destination store.
        assert!(dest_store.contains(texture).unwrap());
        assert!(dest_store.contains(script_asset).unwrap());
    }

    #[test]
    fn test_merge_skips_terrain_and_keeps_existing() {
        let source_store = MemoryAssetStore::new();
        let mut source = MemoryScene::new(RegionInfo::new("Source"), Uuid::new_v4())
            .with_terrain(vec![1, 2, 3, 4]);
        source.add_object(SceneObject::single("incoming", Uuid::new_v4(), Uuid::new_v4()));
        let buf = export_to_buf(&source, &source_store);

        let dest_store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4())
            .with_terrain(vec![9, 9, 9, 9]);
        dest.add_object(SceneObject::single("resident", Uuid::new_v4(), Uuid::new_v4()));

        let summary = import(
            &mut dest,
            &dest_store,
            &buf,
            ImportOptions {
                merge: true,
                ..Default::default()
            },
        );
        assert!(summary.error.is_none());
        assert_eq!(dest.len(), 2);
        assert_eq!(dest.terrain_blob(), vec![9, 9, 9, 9]);
    }

    #[test]
    fn test_non_merge_clears_destination() {
        let source_store = MemoryAssetStore::new();
        let mut source = MemoryScene::new(RegionInfo::new("Source"), Uuid::new_v4());
        source.add_object(SceneObject::single("incoming", Uuid::new_v4(), Uuid::new_v4()));
        let buf = export_to_buf(&source, &source_store);

        let dest_store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        dest.add_object(SceneObject::single("doomed", Uuid::new_v4(), Uuid::new_v4()));

        import(&mut dest, &dest_store, &buf, ImportOptions::default());
        assert_eq!(dest.len(), 1);
        assert_eq!(dest.objects()[0].name, "incoming");
    }

    #[test]
    fn test_no_copy_preservation() {
        // Build a no-copy object, export it, keep the same object (same
        // id) in the destination, and re-import elsewhere-positioned.
        let store = MemoryAssetStore::new();
        let owner = Uuid::new_v4();
        let mut obj = SceneObject::single("heirloom", owner, owner);
        obj.parts[0].owner_mask &= !PERM_COPY;
        obj.position = Vec3::new(100.0, 100.0, 25.0);

        let mut source = MemoryScene::new(RegionInfo::new("Source"), owner);
        source.add_object(obj.clone());
        let buf = export_to_buf(&source, &store);

        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), owner);
        let mut existing = obj.clone();
        existing.position = Vec3::new(1.0, 2.0, 3.0);
        dest.add_object(existing);

        let summary = import(&mut dest, &store, &buf, ImportOptions::default());
        assert_eq!(summary.objects_merged, 1);
        assert_eq!(summary.objects_restored, 0);

        // Exactly one object with the original identity, at the
        // imported coordinates.
        assert_eq!(dest.len(), 1);
        let survivor = dest.object(obj.id).unwrap();
        assert_eq!(survivor.position, Vec3::new(100.0, 100.0, 25.0));
    }

    #[test]
    fn test_owner_reassignment_fallbacks() {
        let store = MemoryAssetStore::new();
        let stranger = Uuid::new_v4();
        let mut source = MemoryScene::new(RegionInfo::new("Source"), Uuid::new_v4());
        source.add_object(SceneObject::single("drifter", stranger, stranger));
        let buf = export_to_buf(&source, &store);

        // Unknown owner falls back to the estate owner.
        let estate = Uuid::new_v4();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), estate);
        let users = MemoryDirectory::default();
        let attribution = MemoryAttributionStore::new();
        let opts = ImportOptions {
            reassign_owners: true,
            ..Default::default()
        };
        ImportRun::new(&mut dest, &store, &users, &attribution, opts.clone())
            .run(buf.as_slice())
            .unwrap();
        assert_eq!(dest.objects()[0].owner_id(), estate);

        // A known owner is kept.
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), estate);
        let users = MemoryDirectory::new([stranger]);
        ImportRun::new(&mut dest, &store, &users, &attribution, opts.clone())
            .run(buf.as_slice())
            .unwrap();
        assert_eq!(dest.objects()[0].owner_id(), stranger);

        // An explicit override wins over everything.
        let override_owner = Uuid::new_v4();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), estate);
        let users = MemoryDirectory::new([stranger]);
        let opts = ImportOptions {
            reassign_owners: true,
            owner_override: Some(override_owner),
            ..Default::default()
        };
        ImportRun::new(&mut dest, &store, &users, &attribution, opts)
            .run(buf.as_slice())
            .unwrap();
        assert_eq!(dest.objects()[0].owner_id(), override_owner);
    }

    #[test]
    fn test_truncated_stream_reports_partial() {
        let store = MemoryAssetStore::new();
        let texture = Uuid::new_v4();
        store
            .put(Asset::new(texture, AssetKind::Texture, vec![7; 2048]))
            .unwrap();
        let mut source = MemoryScene::new(RegionInfo::new("Source"), Uuid::new_v4());
        let mut obj = SceneObject::single("statue", Uuid::new_v4(), Uuid::new_v4());
        obj.parts[0].shape.default_texture = Some(TextureFace::new(texture));
        source.add_object(obj);
        let buf = export_to_buf(&source, &store);

        // Cut after decompression will have produced the asset entry
        // but not the tail of the archive.
        let truncated = &buf[..buf.len() - buf.len() / 4];

        let dest_store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(&mut dest, &dest_store, truncated, ImportOptions::default());

        assert!(summary.error.is_some());
        // Nothing merged after a stream abort.
        assert_eq!(summary.objects_restored, 0);
        assert!(dest.is_empty());
    }

    #[test]
    fn test_strict_mode_aborts_on_bad_object() {
        let mut buf = Vec::new();
        {
            let mut writer = crate::container::ContainerWriter::new(&mut buf);
            writer
                .write_file("objects/bad_000-000-000__x.xml", b"<SceneObject>")
                .unwrap();
            writer.finish().unwrap();
        }

        let store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(
            &mut dest,
            &store,
            &buf,
            ImportOptions {
                skip_error_objects: false,
                ..Default::default()
            },
        );
        assert!(summary.error.is_some());

        // Tolerant mode skips and counts instead.
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(
            &mut dest,
            &store,
            &buf,
            ImportOptions {
                skip_error_objects: true,
                ..Default::default()
            },
        );
        assert!(summary.error.is_none());
        assert_eq!(summary.objects_skipped, 1);
    }

    #[test]
    fn test_unknown_entries_ignored() {
        let mut buf = Vec::new();
        {
            let mut writer = crate::container::ContainerWriter::new(&mut buf);
            writer.write_file("userlist.txt", b"alice\n").unwrap();
            writer.write_file("landdata/parcel.xml", b"<xml/>").unwrap();
            writer.finish().unwrap();
        }
        let store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(&mut dest, &store, &buf, ImportOptions::default());
        assert!(summary.error.is_none());
        assert_eq!(summary.objects_restored, 0);
    }

    #[test]
    fn test_bad_asset_entry_counted_not_fatal() {
        let id = Uuid::new_v4();
        let mut buf = Vec::new();
        {
            let mut writer = crate::container::ContainerWriter::new(&mut buf);
            writer
                .write_file(&format!("assets/{id}_video.mp4"), b"data")
                .unwrap();
            writer
                .write_file(&format!("assets/{id}_texture.jp2"), b"data")
                .unwrap();
            writer.finish().unwrap();
        }
        let store = MemoryAssetStore::new();
        let mut dest = MemoryScene::new(RegionInfo::new("Dest"), Uuid::new_v4());
        let summary = import(&mut dest, &store, &buf, ImportOptions::default());
        assert!(summary.error.is_none());
        assert_eq!(summary.assets_failed, 1);
        assert_eq!(summary.assets_restored, 1);
    }
}
