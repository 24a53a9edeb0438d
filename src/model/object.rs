//! Scene object contract types.
//!
//! The scene graph proper (physics, scripting, interest management)
//! lives outside this crate; these types are the structural contract the
//! archive pipelines operate on: a tree of parts, each with ownership,
//! shape, texturing, sounds and a task inventory.

use glam::{Quat, Vec3};
use smallvec::SmallVec;
use uuid::Uuid;

use super::asset::AssetKind;

/// Permission bit: holder may duplicate the object.
pub const PERM_COPY: u32 = 0x0000_8000;
/// Permission bit: holder may modify the object.
pub const PERM_MODIFY: u32 = 0x0000_4000;
/// Permission bit: holder may transfer the object.
pub const PERM_TRANSFER: u32 = 0x0000_2000;
/// Permission bit: holder may move the object.
pub const PERM_MOVE: u32 = 0x0008_0000;
/// All permission bits set.
pub const PERM_ALL: u32 = 0x7FFF_FFFF;

/// One texture slot on a part face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFace {
    pub texture_id: Uuid,
    /// Render material applied to this face, if any.
    pub material_id: Option<Uuid>,
}

impl TextureFace {
    pub fn new(texture_id: Uuid) -> Self {
        Self {
            texture_id,
            material_id: None,
        }
    }
}

/// A render material: legacy diffuse is carried by the face texture,
/// normal and specular maps are extra asset references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderMaterial {
    pub id: Uuid,
    pub normal_map: Option<Uuid>,
    pub specular_map: Option<Uuid>,
}

/// Geometry and texturing of a single part.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub profile_curve: u8,
    pub path_curve: u8,
    pub path_begin: u16,
    pub path_end: u16,
    pub path_scale_x: u8,
    pub path_scale_y: u8,
    pub profile_hollow: u16,
    /// Texture applied to faces without an explicit entry.
    pub default_texture: Option<TextureFace>,
    /// Per-face overrides; `None` slots fall back to the default.
    pub face_textures: Vec<Option<TextureFace>>,
    /// Sculpt or mesh data reference.
    pub sculpt_texture: Option<Uuid>,
    pub sculpt_type: u8,
    /// Render materials referenced by face entries.
    pub materials: SmallVec<[RenderMaterial; 2]>,
}

impl Shape {
    /// The plain box prim used when a shape must be substituted.
    pub fn default_box() -> Self {
        Self {
            profile_curve: 1,
            path_curve: 16,
            path_begin: 0,
            path_end: 0,
            path_scale_x: 100,
            path_scale_y: 100,
            profile_hollow: 0,
            default_texture: Some(TextureFace::new(super::defaults::PLYWOOD_TEXTURE)),
            face_textures: Vec::new(),
            sculpt_texture: None,
            sculpt_type: 0,
            materials: SmallVec::new(),
        }
    }

    /// Look up a material by id.
    pub fn material(&self, id: Uuid) -> Option<&RenderMaterial> {
        self.materials.iter().find(|m| m.id == id)
    }
}

impl Default for Shape {
    fn default() -> Self {
        Self::default_box()
    }
}

/// A task inventory item held by a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskItem {
    pub item_id: Uuid,
    pub asset_id: Uuid,
    pub kind: AssetKind,
    pub name: String,
    pub description: String,
    pub owner_id: Uuid,
    pub creator_id: Uuid,
    /// Set when the asset bundles multiple independent objects.
    pub coalesced: bool,
}

/// A single prim in a scene object tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub creator_id: Uuid,
    pub owner_id: Uuid,
    pub group_id: Uuid,
    /// Offset from the object root (the root part holds the absolute
    /// position duplicated on the object).
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub base_mask: u32,
    pub owner_mask: u32,
    pub group_mask: u32,
    pub everyone_mask: u32,
    pub next_owner_mask: u32,
    pub shape: Shape,
    pub sound_id: Option<Uuid>,
    pub collision_sound_id: Option<Uuid>,
    pub inventory: Vec<TaskItem>,
}

impl Part {
    /// A named part with full permissions and a default box shape.
    pub fn new(name: impl Into<String>, owner_id: Uuid, creator_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            creator_id,
            owner_id,
            group_id: Uuid::nil(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            base_mask: PERM_ALL,
            owner_mask: PERM_ALL,
            group_mask: 0,
            everyone_mask: 0,
            next_owner_mask: PERM_ALL,
            shape: Shape::default_box(),
            sound_id: None,
            collision_sound_id: None,
            inventory: Vec::new(),
        }
    }
}

/// A tree of parts forming one scene object. `parts[0]` is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: Uuid,
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    /// Non-zero when the object is worn rather than rezzed in-world.
    pub attachment_point: u8,
    pub parts: Vec<Part>,
}

impl SceneObject {
    /// A single-part object at the origin.
    pub fn single(name: impl Into<String>, owner_id: Uuid, creator_id: Uuid) -> Self {
        let name = name.into();
        let root = Part::new(name.clone(), owner_id, creator_id);
        Self {
            id: root.id,
            name,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            attachment_point: 0,
            parts: vec![root],
        }
    }

    /// The root part. Serialized objects always carry at least one part.
    pub fn root(&self) -> &Part {
        &self.parts[0]
    }

    /// Owner of the root part, which is the object's effective owner.
    pub fn owner_id(&self) -> Uuid {
        self.root().owner_id
    }

    /// True when the copy permission bit is absent from the root part.
    pub fn is_no_copy(&self) -> bool {
        self.root().owner_mask & PERM_COPY == 0
    }

    /// True when the object is an attachment.
    pub fn is_attachment(&self) -> bool {
        self.attachment_point != 0
    }

    /// Replace every object/part id with a fresh random id, returning
    /// the original root id. Incoming ids are never trusted on import.
    pub fn regenerate_ids(&mut self) -> Uuid {
        let original = self.id;
        self.id = Uuid::new_v4();
        for (i, part) in self.parts.iter_mut().enumerate() {
            part.id = if i == 0 { self.id } else { Uuid::new_v4() };
        }
        original
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_copy_detection() {
        let mut obj = SceneObject::single("lamp", Uuid::new_v4(), Uuid::new_v4());
        assert!(!obj.is_no_copy());
        obj.parts[0].owner_mask &= !PERM_COPY;
        assert!(obj.is_no_copy());
    }

    #[test]
    fn test_regenerate_ids() {
        let mut obj = SceneObject::single("chair", Uuid::new_v4(), Uuid::new_v4());
        obj.parts.push(Part::new("seat", obj.owner_id(), obj.root().creator_id));
        let before_root = obj.id;
        let before_child = obj.parts[1].id;

        let original = obj.regenerate_ids();
        assert_eq!(original, before_root);
        assert_ne!(obj.id, before_root);
        assert_eq!(obj.id, obj.parts[0].id);
        assert_ne!(obj.parts[1].id, before_child);
    }

    #[test]
    fn test_default_box_has_substitute_texture() {
        let shape = Shape::default_box();
        let face = shape.default_texture.unwrap();
        assert_eq!(face.texture_id, crate::model::defaults::PLYWOOD_TEXTURE);
        assert!(face.material_id.is_none());
    }
}
