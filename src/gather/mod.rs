//! Asset dependency closure computation.
//!
//! Walks a scene object (or a single asset) and collects every asset id
//! it transitively references: textures, materials, sounds, sculpt and
//! mesh data, wearable textures, script-embedded ids and nested
//! inventory objects, including coalesced containers.

use std::collections::BTreeMap;

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::model::{defaults, wearable, AssetKind, ObjectPayload, SceneObject};
use crate::store::AssetStore;

/// Hyphenated UUID, as it appears embedded in script text.
const UUID_PATTERN: &str =
    "[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}";

/// The computed closure: asset id to the kind it was referenced as.
///
/// The map is monotonic during one traversal (ids are inserted before
/// their payloads are opened and never removed), which is what makes
/// cyclic object containment terminate.
pub type AssetRefs = BTreeMap<Uuid, AssetKind>;

/// Transitive asset reference gatherer.
pub struct Gatherer<'a> {
    store: &'a dyn AssetStore,
    uuid_pattern: Regex,
    /// Viewer/library defaults; present on every installation, never
    /// archived.
    exempt: HashSet<Uuid>,
    misses: usize,
}

impl<'a> Gatherer<'a> {
    pub fn new(store: &'a dyn AssetStore) -> Self {
        Self {
            store,
            // The pattern is a string literal; compilation cannot fail.
            uuid_pattern: Regex::new(UUID_PATTERN).unwrap(),
            exempt: defaults::well_known_assets(),
            misses: 0,
        }
    }

    /// Number of referenced assets that could not be fetched.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Collect the closure of an already-materialized object tree.
    pub fn gather_object(&mut self, obj: &SceneObject, refs: &mut AssetRefs) {
        for part in &obj.parts {
            let shape = &part.shape;
            if let Some(face) = shape.default_texture {
                self.gather_asset(face.texture_id, AssetKind::Texture, refs);
            }
            for face in shape.face_textures.iter().flatten() {
                self.gather_asset(face.texture_id, AssetKind::Texture, refs);
            }
            if let Some(id) = shape.sculpt_texture {
                // Mesh prims reference their geometry through the sculpt slot.
                let kind = if shape.sculpt_type == 5 {
                    AssetKind::Mesh
                } else {
                    AssetKind::Texture
                };
                self.gather_asset(id, kind, refs);
            }
            for material in &shape.materials {
                if let Some(id) = material.normal_map {
                    self.gather_asset(id, AssetKind::Texture, refs);
                }
                if let Some(id) = material.specular_map {
                    self.gather_asset(id, AssetKind::Texture, refs);
                }
            }
            if let Some(id) = part.sound_id {
                self.gather_asset(id, AssetKind::Sound, refs);
            }
            if let Some(id) = part.collision_sound_id {
                self.gather_asset(id, AssetKind::Sound, refs);
            }
            for item in &part.inventory {
                self.gather_asset(item.asset_id, item.kind, refs);
            }
        }
    }

    /// Collect the closure rooted at a single asset, dispatching on its
    /// declared kind. Re-entering an id already in `refs` is a no-op.
    pub fn gather_asset(&mut self, id: Uuid, kind: AssetKind, refs: &mut AssetRefs) {
        if id.is_nil() || self.exempt.contains(&id) || refs.contains_key(&id) {
            return;
        }
        refs.insert(id, kind);

        match kind {
            k if k.is_wearable() => {
                if let Some(asset) = self.fetch(id) {
                    for texture in wearable::texture_ids(&asset.data) {
                        self.gather_asset(texture, AssetKind::Texture, refs);
                    }
                }
            }
            AssetKind::LslText => {
                if let Some(asset) = self.fetch(id) {
                    self.gather_script(&asset.data, refs);
                }
            }
            AssetKind::Object => {
                if let Some(asset) = self.fetch(id) {
                    let text = String::from_utf8_lossy(&asset.data);
                    match crate::model::payload_from_xml(&text) {
                        Ok((ObjectPayload::Single(obj), _)) => self.gather_object(&obj, refs),
                        Ok((ObjectPayload::Coalesced(coalesced), _)) => {
                            for member in &coalesced.members {
                                self.gather_object(&member.object, refs);
                            }
                        }
                        Err(e) => warn!("undecodable object asset {id}: {e}"),
                    }
                }
            }
            _ => {}
        }
    }

    /// Scan script text for UUID-shaped substrings. Deliberately
    /// over-inclusive: a false positive only bloats the closure, a
    /// false negative loses content. The referenced kind is unknowable
    /// from the text, so matches are recorded as textures.
    fn gather_script(&mut self, data: &[u8], refs: &mut AssetRefs) {
        let text = String::from_utf8_lossy(data);
        // Collect first: the borrow of `text` must end before recursing.
        let found: Vec<Uuid> = self
            .uuid_pattern
            .find_iter(&text)
            .filter_map(|m| Uuid::parse_str(m.as_str()).ok())
            .collect();
        for id in found {
            self.gather_asset(id, AssetKind::Texture, refs);
        }
    }

    fn fetch(&mut self, id: Uuid) -> Option<crate::model::Asset> {
        match self.store.get(id) {
            Ok(asset) => Some(asset),
            Err(e) => {
                debug!("gather miss for {id}: {e}");
                self.misses += 1;
                None
            }
        }
    }
}
