//! Creator attribution scan.
//!
//! A read-only pass over a container that harvests asset-to-creator
//! pairs from every object entry's task inventory and persists them,
//! independent of any filtering. Run it before a filtered import so the
//! policy can resolve provenance for assets whose items are long gone.

use std::io::Read;

use tracing::{debug, warn};

use crate::container::{format, ContainerReader, EntryClass, EntryKind};
use crate::filter::AttributionStore;
use crate::model::object_from_xml;
use crate::util::Result;

/// Stream a container, harvest attributions, merge and persist.
/// Returns the number of newly attributed assets.
pub fn scan_asset_creators(
    attribution: &dyn AttributionStore,
    source: impl Read,
) -> Result<usize> {
    let mut table = attribution.load()?;
    let before = table.len();

    let mut reader = ContainerReader::new(source);
    for entry in reader.entries()? {
        let entry = entry?;
        if entry.kind == EntryKind::Directory
            || format::classify(&entry.path) != EntryClass::Object
        {
            continue;
        }
        let text = String::from_utf8_lossy(&entry.data);
        let obj = match object_from_xml(&text) {
            Ok(obj) => obj,
            Err(e) => {
                warn!("scan skipping {}: {e}", entry.path);
                continue;
            }
        };
        for part in &obj.parts {
            for item in &part.inventory {
                if !item.asset_id.is_nil() && !item.creator_id.is_nil() {
                    table.entry(item.asset_id).or_insert(item.creator_id);
                }
            }
        }
    }

    let discovered = table.len() - before;
    debug!("scan discovered {discovered} new attribution(s)");
    attribution.save(&table)?;
    Ok(discovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archiver::write::{export_archive, ExportOptions};
    use crate::filter::MemoryAttributionStore;
    use crate::model::{AssetKind, SceneObject, TaskItem};
    use crate::scene::{MemoryScene, RegionInfo};
    use crate::store::MemoryAssetStore;
    use uuid::Uuid;

    #[test]
    fn test_scan_harvests_and_merges() {
        let store = MemoryAssetStore::new();
        let owner = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let asset_a = Uuid::new_v4();
        let asset_b = Uuid::new_v4();

        let mut scene = MemoryScene::new(RegionInfo::new("Source"), owner);
        let mut obj = SceneObject::single("vendor", owner, owner);
        for (asset_id, name) in [(asset_a, "a"), (asset_b, "b")] {
            obj.parts[0].inventory.push(TaskItem {
                item_id: Uuid::new_v4(),
                asset_id,
                kind: AssetKind::Notecard,
                name: name.into(),
                description: String::new(),
                owner_id: owner,
                creator_id: creator,
                coalesced: false,
            });
        }
        scene.add_object(obj);

        let mut buf = Vec::new();
        export_archive(&scene, &store, &mut buf, &ExportOptions::default()).unwrap();

        // Pre-existing rows win over archive-declared ones.
        let prior_creator = Uuid::new_v4();
        let attribution = MemoryAttributionStore::with_entries([(asset_a, prior_creator)]);

        let discovered = scan_asset_creators(&attribution, buf.as_slice()).unwrap();
        assert_eq!(discovered, 1);

        let table = attribution.load().unwrap();
        assert_eq!(table.get(&asset_a), Some(&prior_creator));
        assert_eq!(table.get(&asset_b), Some(&creator));
    }

    #[test]
    fn test_scan_garbage_is_error() {
        let attribution = MemoryAttributionStore::new();
        assert!(scan_asset_creators(&attribution, &b"not a container"[..]).is_err());
    }
}
