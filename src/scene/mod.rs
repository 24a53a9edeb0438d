//! Destination scene and identity directory adapters.
//!
//! The simulator's scene graph and user service live outside this
//! crate; the pipelines talk to them through these narrow traits. The
//! memory implementations back the tests and the CLI.

use std::collections::HashSet;

use glam::{Quat, Vec3};
use uuid::Uuid;

use crate::model::SceneObject;

/// Static facts about a region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub name: String,
    pub id: Uuid,
    pub size_x: u32,
    pub size_y: u32,
}

impl RegionInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: Uuid::new_v4(),
            size_x: 256,
            size_y: 256,
        }
    }
}

/// The destination (or source) scene of an archive call.
///
/// Export takes a snapshot through `objects`; import mutates through
/// the `&mut` methods. Taking `&mut self` for mutation is what makes
/// one import's removals and insertions a critical section relative to
/// each other.
pub trait Scene {
    fn region(&self) -> &RegionInfo;

    /// Fallback owner for content whose owner cannot be resolved.
    fn estate_owner(&self) -> Uuid;

    /// Snapshot of every object currently in the scene.
    fn objects(&self) -> Vec<SceneObject>;

    /// Remove an object by id. Returns false when absent.
    fn remove_object(&mut self, id: Uuid) -> bool;

    fn insert_object(&mut self, obj: SceneObject);

    /// Reposition an existing object. Returns false when absent.
    fn update_pose(&mut self, id: Uuid, position: Vec3, rotation: Quat) -> bool;

    /// Schedule the scripts embedded in an object to start.
    fn start_scripts(&mut self, object_id: Uuid);

    fn settings_blob(&self) -> Vec<u8>;
    fn apply_settings(&mut self, data: &[u8]);
    fn terrain_blob(&self) -> Vec<u8>;
    fn apply_terrain(&mut self, data: &[u8]);

    /// Every asset reachable from the built-in content library; these
    /// are exempt from substitution.
    fn library_asset_ids(&self) -> Vec<Uuid>;
}

/// Identity lookup against the destination grid.
pub trait UserDirectory {
    /// True when the id resolves to a known account.
    fn knows(&self, id: Uuid) -> bool;
}

// ============================================================================
// Memory implementations
// ============================================================================

/// A self-contained scene for tests and offline tooling.
pub struct MemoryScene {
    region: RegionInfo,
    estate_owner: Uuid,
    objects: Vec<SceneObject>,
    settings: Vec<u8>,
    terrain: Vec<u8>,
    library: Vec<Uuid>,
    /// Object ids whose scripts were scheduled, in call order.
    pub started_scripts: Vec<Uuid>,
}

impl MemoryScene {
    pub fn new(region: RegionInfo, estate_owner: Uuid) -> Self {
        Self {
            region,
            estate_owner,
            objects: Vec::new(),
            settings: Vec::new(),
            terrain: Vec::new(),
            library: Vec::new(),
            started_scripts: Vec::new(),
        }
    }

    pub fn with_settings(mut self, settings: Vec<u8>) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_terrain(mut self, terrain: Vec<u8>) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn with_library(mut self, library: Vec<Uuid>) -> Self {
        self.library = library;
        self
    }

    pub fn add_object(&mut self, obj: SceneObject) {
        self.objects.push(obj);
    }

    pub fn object(&self, id: Uuid) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Scene for MemoryScene {
    fn region(&self) -> &RegionInfo {
        &self.region
    }

    fn estate_owner(&self) -> Uuid {
        self.estate_owner
    }

    fn objects(&self) -> Vec<SceneObject> {
        self.objects.clone()
    }

    fn remove_object(&mut self, id: Uuid) -> bool {
        let before = self.objects.len();
        self.objects.retain(|o| o.id != id);
        self.objects.len() != before
    }

    fn insert_object(&mut self, obj: SceneObject) {
        self.objects.push(obj);
    }

    fn update_pose(&mut self, id: Uuid, position: Vec3, rotation: Quat) -> bool {
        match self.objects.iter_mut().find(|o| o.id == id) {
            Some(obj) => {
                obj.position = position;
                obj.rotation = rotation;
                true
            }
            None => false,
        }
    }

    fn start_scripts(&mut self, object_id: Uuid) {
        self.started_scripts.push(object_id);
    }

    fn settings_blob(&self) -> Vec<u8> {
        self.settings.clone()
    }

    fn apply_settings(&mut self, data: &[u8]) {
        self.settings = data.to_vec();
    }

    fn terrain_blob(&self) -> Vec<u8> {
        self.terrain.clone()
    }

    fn apply_terrain(&mut self, data: &[u8]) {
        self.terrain = data.to_vec();
    }

    fn library_asset_ids(&self) -> Vec<Uuid> {
        self.library.clone()
    }
}

/// A fixed set of known accounts.
#[derive(Default)]
pub struct MemoryDirectory {
    known: HashSet<Uuid>,
}

impl MemoryDirectory {
    pub fn new(known: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            known: known.into_iter().collect(),
        }
    }
}

impl UserDirectory for MemoryDirectory {
    fn knows(&self, id: Uuid) -> bool {
        self.known.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_scene_object_lifecycle() {
        let mut scene = MemoryScene::new(RegionInfo::new("Sandbox"), Uuid::new_v4());
        let obj = SceneObject::single("box", Uuid::new_v4(), Uuid::new_v4());
        let id = obj.id;
        scene.add_object(obj);

        assert!(scene.update_pose(id, Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY));
        assert_eq!(scene.object(id).unwrap().position, Vec3::new(1.0, 2.0, 3.0));
        assert!(scene.remove_object(id));
        assert!(!scene.remove_object(id));
    }

    #[test]
    fn test_memory_directory() {
        let alice = Uuid::new_v4();
        let directory = MemoryDirectory::new([alice]);
        assert!(directory.knows(alice));
        assert!(!directory.knows(Uuid::new_v4()));
    }
}
