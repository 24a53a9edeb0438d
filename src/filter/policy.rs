//! Creator/owner filtering and substitution.
//!
//! Applied top-down during import: owner exclusion drops whole objects,
//! creator checks replace part geometry, asset checks substitute
//! textures and clear sounds, and nested inventory objects are
//! recursively filtered with bottom-up re-serialization of anything
//! that changed.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::defaults::{self, LIBRARY_OWNER, PLYWOOD_TEXTURE};
use crate::model::{
    coalesced_to_xml, object_to_xml, Asset, AssetKind, CoalescedObject, ObjectPayload, Part,
    SceneObject, Shape,
};
use crate::store::AssetStore;
use crate::util::{Error, Result};

use super::attribution::AttributionTable;

/// Audit counters, reported to the operator after every filtered import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounters {
    pub objects_dropped: usize,
    pub parts_kept: usize,
    pub parts_replaced: usize,
    pub textures_replaced: usize,
    pub sounds_cleared: usize,
    pub items_removed: usize,
    /// Nested containers re-serialized under a fresh asset id.
    pub nested_repacked: usize,
    /// Nested payloads that could not be decoded and were left alone.
    pub nested_undecodable: usize,
    /// Assets referenced during filtering but absent from the store.
    pub assets_missing: usize,
}

/// Outcome of filtering one object tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// Owner is excluded; the object must not be imported.
    Drop,
    /// Object survives; `changed` records whether anything was
    /// substituted inside it.
    Keep { changed: bool },
}

/// Allow-list-driven content policy for one import call.
pub struct ContentPolicy<'a> {
    store: &'a dyn AssetStore,
    /// `None` disables filtering entirely.
    allowed: Option<HashSet<Uuid>>,
    exempt: HashSet<Uuid>,
    attribution: AttributionTable,
    pub counters: FilterCounters,
}

impl<'a> ContentPolicy<'a> {
    /// Build a policy for one import. `library` extends the fixed
    /// well-known exemptions with everything reachable from the
    /// destination's content library.
    pub fn new(
        store: &'a dyn AssetStore,
        allowed: Option<HashSet<Uuid>>,
        attribution: AttributionTable,
        library: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        let mut exempt = defaults::well_known_assets();
        exempt.extend(library);
        Self {
            store,
            allowed,
            exempt,
            attribution,
            counters: FilterCounters::default(),
        }
    }

    /// True when an allow-list is in effect.
    pub fn filtering_enabled(&self) -> bool {
        self.allowed.is_some()
    }

    /// True iff the owner is absent from the allow-list.
    pub fn exclude_by_owner(&self, owner: Uuid) -> bool {
        match &self.allowed {
            Some(allowed) => !allowed.contains(&owner),
            None => false,
        }
    }

    /// True iff the creator is absent from the allow-list. The system
    /// library identity is always permitted.
    pub fn substitute_by_creator(&self, creator: Uuid) -> bool {
        match &self.allowed {
            Some(allowed) => creator != LIBRARY_OWNER && !allowed.contains(&creator),
            None => false,
        }
    }

    /// Decide whether an asset reference must be substituted.
    ///
    /// Fail-open: an asset whose creator cannot be determined at all is
    /// kept — provenance-unknown but ownership-known content is not
    /// worth destroying.
    pub fn substitute_by_asset(&self, asset: Uuid, owner: Uuid, creator: Option<Uuid>) -> bool {
        if asset.is_nil() || self.exempt.contains(&asset) {
            return false;
        }
        if self.exclude_by_owner(owner) {
            return true;
        }
        let creator = creator
            .filter(|c| !c.is_nil())
            .or_else(|| self.attribution.get(&asset).copied());
        match creator {
            Some(creator) => self.substitute_by_creator(creator),
            None => false,
        }
    }

    /// Filter one object tree in place.
    pub fn filter_object(&mut self, obj: &mut SceneObject) -> Result<FilterAction> {
        if self.exclude_by_owner(obj.owner_id()) {
            debug!("dropping object {} (owner {} excluded)", obj.name, obj.owner_id());
            self.counters.objects_dropped += 1;
            return Ok(FilterAction::Drop);
        }
        let mut changed = false;
        for part in &mut obj.parts {
            changed |= self.filter_part(part)?;
        }
        Ok(FilterAction::Keep { changed })
    }

    fn filter_part(&mut self, part: &mut Part) -> Result<bool> {
        let mut changed = false;

        if self.substitute_by_creator(part.creator_id) {
            // Whole-shape replacement; face texturing becomes moot.
            let prefix = if part.description.is_empty() {
                String::new()
            } else {
                format!("{} ", part.description)
            };
            part.description = format!("{prefix}[substituted; original creator {}]", part.creator_id);
            part.shape = Shape::default_box();
            self.counters.parts_replaced += 1;
            changed = true;
        } else {
            self.counters.parts_kept += 1;
            changed |= self.filter_shape_textures(part);
        }

        if let Some(id) = part.sound_id {
            if self.substitute_by_asset(id, part.owner_id, None) {
                part.sound_id = None;
                self.counters.sounds_cleared += 1;
                changed = true;
            }
        }
        if let Some(id) = part.collision_sound_id {
            if self.substitute_by_asset(id, part.owner_id, None) {
                part.collision_sound_id = None;
                self.counters.sounds_cleared += 1;
                changed = true;
            }
        }

        changed |= self.filter_inventory(part)?;
        Ok(changed)
    }

    /// Substitute disallowed face texture/material pairs.
    fn filter_shape_textures(&mut self, part: &mut Part) -> bool {
        let owner = part.owner_id;
        let shape = &mut part.shape;
        let mut changed = false;

        let mut faces: Vec<&mut crate::model::TextureFace> = Vec::new();
        if let Some(face) = shape.default_texture.as_mut() {
            faces.push(face);
        }
        faces.extend(shape.face_textures.iter_mut().flatten());

        let materials = &shape.materials;
        for face in faces {
            let material = face.material_id.and_then(|id| materials.iter().find(|m| m.id == id));
            let fails = self.substitute_by_asset(face.texture_id, owner, None)
                || material.is_some_and(|m| {
                    m.normal_map.is_some_and(|id| self.substitute_by_asset(id, owner, None))
                        || m.specular_map.is_some_and(|id| self.substitute_by_asset(id, owner, None))
                });
            if fails {
                face.texture_id = PLYWOOD_TEXTURE;
                face.material_id = None;
                self.counters.textures_replaced += 1;
                changed = true;
            }
        }

        if changed {
            // Drop materials no longer referenced by any face.
            let referenced: HashSet<Uuid> = shape
                .default_texture
                .iter()
                .chain(shape.face_textures.iter().flatten())
                .filter_map(|f| f.material_id)
                .collect();
            shape.materials.retain(|m| referenced.contains(&m.id));
        }
        changed
    }

    fn filter_inventory(&mut self, part: &mut Part) -> Result<bool> {
        let mut changed = false;
        let mut kept = Vec::with_capacity(part.inventory.len());

        for mut item in std::mem::take(&mut part.inventory) {
            if item.kind == AssetKind::Object {
                match self.filter_nested_object(&mut item)? {
                    NestedOutcome::Keep { changed: c } => {
                        changed |= c;
                        kept.push(item);
                    }
                    NestedOutcome::Remove => {
                        self.counters.items_removed += 1;
                        changed = true;
                    }
                }
            } else if self.substitute_by_asset(item.asset_id, item.owner_id, Some(item.creator_id))
            {
                debug!("removing inventory item {} ({:?})", item.name, item.kind);
                self.counters.items_removed += 1;
                changed = true;
            } else {
                kept.push(item);
            }
        }

        part.inventory = kept;
        Ok(changed)
    }

    /// Recursively filter an object-kind inventory item, re-serializing
    /// its asset under a fresh id when anything inside changed. The
    /// ripple stops at the item: callers learn only `changed`.
    fn filter_nested_object(&mut self, item: &mut crate::model::TaskItem) -> Result<NestedOutcome> {
        let asset = match self.store.get(item.asset_id) {
            Ok(asset) => asset,
            Err(Error::AssetMissing(_)) => {
                self.counters.assets_missing += 1;
                return Ok(NestedOutcome::Keep { changed: false });
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&asset.data);
        let payload = match crate::model::payload_from_xml(&text) {
            Ok((payload, _skipped)) => payload,
            Err(e) => {
                warn!("undecodable nested object asset {}: {e}", item.asset_id);
                self.counters.nested_undecodable += 1;
                return Ok(NestedOutcome::Keep { changed: false });
            }
        };

        match payload {
            ObjectPayload::Single(mut obj) => match self.filter_object(&mut obj)? {
                FilterAction::Drop => Ok(NestedOutcome::Remove),
                FilterAction::Keep { changed: false } => Ok(NestedOutcome::Keep { changed: false }),
                FilterAction::Keep { changed: true } => {
                    self.repack(item, object_to_xml(&obj).into_bytes())?;
                    Ok(NestedOutcome::Keep { changed: true })
                }
            },
            ObjectPayload::Coalesced(mut coalesced) => {
                let mut inner_changed = false;
                let mut members = Vec::with_capacity(coalesced.members.len());
                for mut member in std::mem::take(&mut coalesced.members) {
                    match self.filter_object(&mut member.object)? {
                        FilterAction::Drop => inner_changed = true,
                        FilterAction::Keep { changed } => {
                            inner_changed |= changed;
                            members.push(member);
                        }
                    }
                }
                if members.is_empty() {
                    return Ok(NestedOutcome::Remove);
                }
                if inner_changed {
                    let repacked = CoalescedObject::new(members);
                    self.repack(item, coalesced_to_xml(&repacked).into_bytes())?;
                }
                Ok(NestedOutcome::Keep {
                    changed: inner_changed,
                })
            }
        }
    }

    fn repack(&mut self, item: &mut crate::model::TaskItem, data: Vec<u8>) -> Result<()> {
        let new_id = Uuid::new_v4();
        let mut asset = Asset::new(new_id, AssetKind::Object, data);
        asset.name = item.name.clone();
        self.store.put(asset)?;
        item.asset_id = new_id;
        self.counters.nested_repacked += 1;
        Ok(())
    }
}

enum NestedOutcome {
    Keep { changed: bool },
    Remove,
}
