//! Structural XML serialization of scene objects.
//!
//! This is the payload format of `objects/*.xml` entries and of
//! `Object`-kind assets (task inventory objects, coalesced bundles).
//! The root element name distinguishes a single object tree
//! (`SceneObject`) from a coalesced container (`CoalescedObject`).

use glam::{Quat, Vec3};
use smallvec::SmallVec;
use tracing::warn;
use uuid::Uuid;

use crate::util::xml::{XmlElement, XmlWriter};
use crate::util::{Error, Result};

use super::asset::AssetKind;
use super::coalesced::{CoalescedMember, CoalescedObject};
use super::object::{Part, RenderMaterial, SceneObject, Shape, TaskItem, TextureFace};

/// Decoded payload of an object entry or `Object`-kind asset.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPayload {
    Single(SceneObject),
    Coalesced(CoalescedObject),
}

// ============================================================================
// Writing
// ============================================================================

/// Serialize one object tree as a standalone document.
pub fn object_to_xml(obj: &SceneObject) -> String {
    let mut w = XmlWriter::new();
    w.declaration();
    write_object(&mut w, obj);
    w.finish()
}

/// Serialize a coalesced container as a standalone document.
pub fn coalesced_to_xml(coalesced: &CoalescedObject) -> String {
    let mut w = XmlWriter::new();
    w.declaration();
    w.open("CoalescedObject");
    for member in &coalesced.members {
        w.open("Member");
        w.attr("perms", &member.perms.to_string());
        write_object(&mut w, &member.object);
        w.close();
    }
    w.close();
    w.finish()
}

fn write_object(w: &mut XmlWriter, obj: &SceneObject) {
    w.open("SceneObject");
    w.leaf("Id", &obj.id.to_string());
    w.leaf("Name", &obj.name);
    write_vec3(w, "Position", obj.position);
    write_quat(w, "Rotation", obj.rotation);
    w.leaf("AttachmentPoint", &obj.attachment_point.to_string());
    w.open("Parts");
    for part in &obj.parts {
        write_part(w, part);
    }
    w.close();
    w.close();
}

fn write_part(w: &mut XmlWriter, part: &Part) {
    w.open("Part");
    w.leaf("Id", &part.id.to_string());
    w.leaf("Name", &part.name);
    w.leaf("Description", &part.description);
    w.leaf("CreatorId", &part.creator_id.to_string());
    w.leaf("OwnerId", &part.owner_id.to_string());
    w.leaf("GroupId", &part.group_id.to_string());
    write_vec3(w, "Position", part.position);
    write_quat(w, "Rotation", part.rotation);
    write_vec3(w, "Scale", part.scale);
    w.open("Permissions");
    w.attr("base", &part.base_mask.to_string());
    w.attr("owner", &part.owner_mask.to_string());
    w.attr("group", &part.group_mask.to_string());
    w.attr("everyone", &part.everyone_mask.to_string());
    w.attr("next", &part.next_owner_mask.to_string());
    w.close();
    write_shape(w, &part.shape);
    if let Some(id) = part.sound_id {
        w.leaf("Sound", &id.to_string());
    }
    if let Some(id) = part.collision_sound_id {
        w.leaf("CollisionSound", &id.to_string());
    }
    w.open("Inventory");
    for item in &part.inventory {
        write_item(w, item);
    }
    w.close();
    w.close();
}

fn write_shape(w: &mut XmlWriter, shape: &Shape) {
    w.open("Shape");
    w.leaf("ProfileCurve", &shape.profile_curve.to_string());
    w.leaf("PathCurve", &shape.path_curve.to_string());
    w.leaf("PathBegin", &shape.path_begin.to_string());
    w.leaf("PathEnd", &shape.path_end.to_string());
    w.leaf("PathScaleX", &shape.path_scale_x.to_string());
    w.leaf("PathScaleY", &shape.path_scale_y.to_string());
    w.leaf("ProfileHollow", &shape.profile_hollow.to_string());
    if let Some(face) = shape.default_texture {
        write_face(w, "DefaultTexture", None, face);
    }
    w.open("FaceTextures");
    w.attr("count", &shape.face_textures.len().to_string());
    for (index, face) in shape.face_textures.iter().enumerate() {
        if let Some(face) = face {
            write_face(w, "Face", Some(index), *face);
        }
    }
    w.close();
    if let Some(id) = shape.sculpt_texture {
        w.open("Sculpt");
        w.attr("texture", &id.to_string());
        w.attr("type", &shape.sculpt_type.to_string());
        w.close();
    }
    w.open("Materials");
    for material in &shape.materials {
        w.open("Material");
        w.attr("id", &material.id.to_string());
        if let Some(id) = material.normal_map {
            w.attr("normal", &id.to_string());
        }
        if let Some(id) = material.specular_map {
            w.attr("specular", &id.to_string());
        }
        w.close();
    }
    w.close();
    w.close();
}

fn write_face(w: &mut XmlWriter, name: &str, index: Option<usize>, face: TextureFace) {
    w.open(name);
    if let Some(index) = index {
        w.attr("index", &index.to_string());
    }
    w.attr("texture", &face.texture_id.to_string());
    if let Some(id) = face.material_id {
        w.attr("material", &id.to_string());
    }
    w.close();
}

fn write_item(w: &mut XmlWriter, item: &TaskItem) {
    w.open("Item");
    if item.coalesced {
        w.attr("coalesced", "true");
    }
    w.leaf("ItemId", &item.item_id.to_string());
    w.leaf("AssetId", &item.asset_id.to_string());
    w.leaf("Kind", &item.kind.code().to_string());
    w.leaf("Name", &item.name);
    w.leaf("Description", &item.description);
    w.leaf("OwnerId", &item.owner_id.to_string());
    w.leaf("CreatorId", &item.creator_id.to_string());
    w.close();
}

fn write_vec3(w: &mut XmlWriter, name: &str, v: Vec3) {
    w.open(name);
    w.attr("x", &v.x.to_string());
    w.attr("y", &v.y.to_string());
    w.attr("z", &v.z.to_string());
    w.close();
}

fn write_quat(w: &mut XmlWriter, name: &str, q: Quat) {
    w.open(name);
    w.attr("x", &q.x.to_string());
    w.attr("y", &q.y.to_string());
    w.attr("z", &q.z.to_string());
    w.attr("w", &q.w.to_string());
    w.close();
}

// ============================================================================
// Reading
// ============================================================================

/// Decode an object payload, dispatching on the root element.
///
/// For coalesced containers, a member that fails to decode is skipped
/// and counted rather than failing the bundle; the count is returned
/// alongside the payload.
pub fn payload_from_xml(text: &str) -> Result<(ObjectPayload, usize)> {
    let root = XmlElement::parse(text)?;
    match root.name.as_str() {
        "SceneObject" => Ok((ObjectPayload::Single(read_object(&root)?), 0)),
        "CoalescedObject" => {
            let mut members = Vec::new();
            let mut skipped = 0;
            for member in root.children_named("Member") {
                let perms = attr_u32(member, "perms").unwrap_or(0);
                let Some(obj_elem) = member.child("SceneObject") else {
                    skipped += 1;
                    continue;
                };
                match read_object(obj_elem) {
                    Ok(object) => members.push(CoalescedMember { object, perms }),
                    Err(e) => {
                        warn!("skipping undecodable coalesced member: {e}");
                        skipped += 1;
                    }
                }
            }
            Ok((
                ObjectPayload::Coalesced(CoalescedObject::new(members)),
                skipped,
            ))
        }
        other => Err(Error::xml(format!("unexpected root element <{other}>"))),
    }
}

/// Decode a document that must hold a single object tree.
pub fn object_from_xml(text: &str) -> Result<SceneObject> {
    match payload_from_xml(text)? {
        (ObjectPayload::Single(obj), _) => Ok(obj),
        (ObjectPayload::Coalesced(_), _) => {
            Err(Error::xml("expected a single object, found a coalesced container"))
        }
    }
}

fn read_object(elem: &XmlElement) -> Result<SceneObject> {
    let parts_elem = elem
        .child("Parts")
        .ok_or_else(|| Error::xml("missing <Parts>"))?;
    let mut parts = Vec::new();
    for part_elem in parts_elem.children_named("Part") {
        parts.push(read_part(part_elem)?);
    }
    if parts.is_empty() {
        return Err(Error::xml("object has no parts"));
    }

    Ok(SceneObject {
        id: parse_uuid(elem.require_text("Id")?)?,
        name: elem.child_text("Name").unwrap_or_default().to_string(),
        position: read_vec3(elem, "Position")?,
        rotation: read_quat(elem, "Rotation")?,
        attachment_point: parse_num(elem.child_text("AttachmentPoint").unwrap_or("0"))?,
        parts,
    })
}

fn read_part(elem: &XmlElement) -> Result<Part> {
    let perms = elem
        .child("Permissions")
        .ok_or_else(|| Error::xml("missing <Permissions>"))?;
    let shape_elem = elem
        .child("Shape")
        .ok_or_else(|| Error::xml("missing <Shape>"))?;

    let mut inventory = Vec::new();
    if let Some(inv) = elem.child("Inventory") {
        for item in inv.children_named("Item") {
            inventory.push(read_item(item)?);
        }
    }

    Ok(Part {
        id: parse_uuid(elem.require_text("Id")?)?,
        name: elem.child_text("Name").unwrap_or_default().to_string(),
        description: elem.child_text("Description").unwrap_or_default().to_string(),
        creator_id: parse_uuid(elem.require_text("CreatorId")?)?,
        owner_id: parse_uuid(elem.require_text("OwnerId")?)?,
        group_id: parse_uuid(elem.child_text("GroupId").unwrap_or("00000000-0000-0000-0000-000000000000"))?,
        position: read_vec3(elem, "Position")?,
        rotation: read_quat(elem, "Rotation")?,
        scale: read_vec3(elem, "Scale")?,
        base_mask: attr_u32(perms, "base").unwrap_or(0),
        owner_mask: attr_u32(perms, "owner").unwrap_or(0),
        group_mask: attr_u32(perms, "group").unwrap_or(0),
        everyone_mask: attr_u32(perms, "everyone").unwrap_or(0),
        next_owner_mask: attr_u32(perms, "next").unwrap_or(0),
        shape: read_shape(shape_elem)?,
        sound_id: read_opt_uuid(elem, "Sound")?,
        collision_sound_id: read_opt_uuid(elem, "CollisionSound")?,
        inventory,
    })
}

fn read_shape(elem: &XmlElement) -> Result<Shape> {
    let default_texture = match elem.child("DefaultTexture") {
        Some(face) => Some(read_face(face)?),
        None => None,
    };

    let mut face_textures = Vec::new();
    if let Some(faces) = elem.child("FaceTextures") {
        let count = attr_u32(faces, "count").unwrap_or(0) as usize;
        face_textures = vec![None; count];
        for face in faces.children_named("Face") {
            let index = attr_u32(face, "index")
                .ok_or_else(|| Error::xml("face entry without index"))? as usize;
            if index >= face_textures.len() {
                return Err(Error::xml(format!(
                    "face index {index} outside declared count {count}"
                )));
            }
            face_textures[index] = Some(read_face(face)?);
        }
    }

    let (sculpt_texture, sculpt_type) = match elem.child("Sculpt") {
        Some(sculpt) => (
            Some(parse_uuid(req_attr(sculpt, "texture")?)?),
            attr_u32(sculpt, "type").unwrap_or(0) as u8,
        ),
        None => (None, 0),
    };

    let mut materials = SmallVec::new();
    if let Some(mats) = elem.child("Materials") {
        for mat in mats.children_named("Material") {
            materials.push(RenderMaterial {
                id: parse_uuid(req_attr(mat, "id")?)?,
                normal_map: opt_attr_uuid(mat, "normal")?,
                specular_map: opt_attr_uuid(mat, "specular")?,
            });
        }
    }

    Ok(Shape {
        profile_curve: parse_num(elem.child_text("ProfileCurve").unwrap_or("0"))?,
        path_curve: parse_num(elem.child_text("PathCurve").unwrap_or("0"))?,
        path_begin: parse_num(elem.child_text("PathBegin").unwrap_or("0"))?,
        path_end: parse_num(elem.child_text("PathEnd").unwrap_or("0"))?,
        path_scale_x: parse_num(elem.child_text("PathScaleX").unwrap_or("0"))?,
        path_scale_y: parse_num(elem.child_text("PathScaleY").unwrap_or("0"))?,
        profile_hollow: parse_num(elem.child_text("ProfileHollow").unwrap_or("0"))?,
        default_texture,
        face_textures,
        sculpt_texture,
        sculpt_type,
        materials,
    })
}

fn read_face(elem: &XmlElement) -> Result<TextureFace> {
    Ok(TextureFace {
        texture_id: parse_uuid(req_attr(elem, "texture")?)?,
        material_id: opt_attr_uuid(elem, "material")?,
    })
}

fn read_item(elem: &XmlElement) -> Result<TaskItem> {
    let code: i8 = parse_num(elem.require_text("Kind")?)?;
    Ok(TaskItem {
        item_id: parse_uuid(elem.require_text("ItemId")?)?,
        asset_id: parse_uuid(elem.require_text("AssetId")?)?,
        kind: AssetKind::from_code(code)?,
        name: elem.child_text("Name").unwrap_or_default().to_string(),
        description: elem.child_text("Description").unwrap_or_default().to_string(),
        owner_id: parse_uuid(elem.require_text("OwnerId")?)?,
        creator_id: parse_uuid(elem.require_text("CreatorId")?)?,
        coalesced: elem.attr("coalesced") == Some("true"),
    })
}

fn read_vec3(parent: &XmlElement, name: &str) -> Result<Vec3> {
    let elem = parent
        .child(name)
        .ok_or_else(|| Error::xml(format!("missing <{name}>")))?;
    Ok(Vec3::new(
        attr_f32(elem, "x")?,
        attr_f32(elem, "y")?,
        attr_f32(elem, "z")?,
    ))
}

fn read_quat(parent: &XmlElement, name: &str) -> Result<Quat> {
    let elem = parent
        .child(name)
        .ok_or_else(|| Error::xml(format!("missing <{name}>")))?;
    Ok(Quat::from_xyzw(
        attr_f32(elem, "x")?,
        attr_f32(elem, "y")?,
        attr_f32(elem, "z")?,
        attr_f32(elem, "w")?,
    ))
}

fn read_opt_uuid(parent: &XmlElement, name: &str) -> Result<Option<Uuid>> {
    match parent.child_text(name) {
        Some(text) => Ok(Some(parse_uuid(text)?)),
        None => Ok(None),
    }
}

fn req_attr<'a>(elem: &'a XmlElement, name: &str) -> Result<&'a str> {
    elem.attr(name)
        .ok_or_else(|| Error::xml(format!("missing attribute {name} on <{}>", elem.name)))
}

fn opt_attr_uuid(elem: &XmlElement, name: &str) -> Result<Option<Uuid>> {
    match elem.attr(name) {
        Some(text) => Ok(Some(parse_uuid(text)?)),
        None => Ok(None),
    }
}

fn attr_u32(elem: &XmlElement, name: &str) -> Option<u32> {
    elem.attr(name).and_then(|v| v.parse().ok())
}

fn attr_f32(elem: &XmlElement, name: &str) -> Result<f32> {
    req_attr(elem, name)?
        .parse()
        .map_err(|_| Error::xml(format!("bad float in attribute {name}")))
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text.trim()).map_err(|e| Error::xml(format!("bad uuid {text:?}: {e}")))
}

fn parse_num<T: std::str::FromStr>(text: &str) -> Result<T> {
    text.trim()
        .parse()
        .map_err(|_| Error::xml(format!("bad number {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::object::PERM_ALL;

    fn sample_object() -> SceneObject {
        let owner = Uuid::new_v4();
        let creator = Uuid::new_v4();
        let mut obj = SceneObject::single("garden chair", owner, creator);
        obj.position = Vec3::new(128.25, 64.5, 21.0);
        obj.rotation = Quat::from_xyzw(0.0, 0.70710678, 0.0, 0.70710678);

        let root = &mut obj.parts[0];
        root.shape.face_textures = vec![
            Some(TextureFace::new(Uuid::new_v4())),
            None,
            Some(TextureFace {
                texture_id: Uuid::new_v4(),
                material_id: Some(Uuid::new_v4()),
            }),
        ];
        root.shape.materials.push(RenderMaterial {
            id: Uuid::new_v4(),
            normal_map: Some(Uuid::new_v4()),
            specular_map: None,
        });
        root.sound_id = Some(Uuid::new_v4());
        root.inventory.push(TaskItem {
            item_id: Uuid::new_v4(),
            asset_id: Uuid::new_v4(),
            kind: AssetKind::LslText,
            name: "rocker".into(),
            description: String::new(),
            owner_id: owner,
            creator_id: creator,
            coalesced: false,
        });

        let mut leg = Part::new("leg <1> & \"2\"", owner, creator);
        leg.position = Vec3::new(0.0, 0.0, -0.5);
        leg.owner_mask = PERM_ALL;
        obj.parts.push(leg);
        obj
    }

    #[test]
    fn test_object_roundtrip() {
        let obj = sample_object();
        let xml = object_to_xml(&obj);
        let back = object_from_xml(&xml).unwrap();
        assert_eq!(back, obj);
    }

    #[test]
    fn test_coalesced_roundtrip() {
        let coalesced = CoalescedObject::new(vec![
            CoalescedMember {
                object: sample_object(),
                perms: PERM_ALL,
            },
            CoalescedMember {
                object: SceneObject::single("rug", Uuid::new_v4(), Uuid::new_v4()),
                perms: 0x0000_8000,
            },
        ]);
        let xml = coalesced_to_xml(&coalesced);
        let (payload, skipped) = payload_from_xml(&xml).unwrap();
        assert_eq!(skipped, 0);
        assert_eq!(payload, ObjectPayload::Coalesced(coalesced));
    }

    #[test]
    fn test_coalesced_bad_member_skipped() {
        // Second member is missing its <Parts>, first survives.
        let xml = "<CoalescedObject>\
            <Member perms=\"1\"><SceneObject>\
              <Id>0cc5d60e-b22e-448e-96bd-54e6a33b5907</Id><Name>ok</Name>\
              <Position x=\"0\" y=\"0\" z=\"0\"/><Rotation x=\"0\" y=\"0\" z=\"0\" w=\"1\"/>\
              <Parts><Part><Id>0cc5d60e-b22e-448e-96bd-54e6a33b5907</Id>\
              <CreatorId>8aa9c740-5b7d-4f04-9171-9e1b54b093c4</CreatorId>\
              <OwnerId>8aa9c740-5b7d-4f04-9171-9e1b54b093c4</OwnerId>\
              <Position x=\"0\" y=\"0\" z=\"0\"/><Rotation x=\"0\" y=\"0\" z=\"0\" w=\"1\"/>\
              <Scale x=\"1\" y=\"1\" z=\"1\"/>\
              <Permissions base=\"1\" owner=\"1\" group=\"0\" everyone=\"0\" next=\"0\"/>\
              <Shape/></Part></Parts>\
            </SceneObject></Member>\
            <Member perms=\"1\"><SceneObject><Id>x</Id></SceneObject></Member>\
            </CoalescedObject>";
        let (payload, skipped) = payload_from_xml(xml).unwrap();
        let ObjectPayload::Coalesced(c) = payload else {
            panic!("expected coalesced");
        };
        assert_eq!(c.members.len(), 1);
        assert_eq!(skipped, 1);
        assert_eq!(c.members[0].object.name, "ok");
    }

    #[test]
    fn test_unexpected_root() {
        assert!(payload_from_xml("<Banana/>").is_err());
    }

    #[test]
    fn test_object_with_no_parts_rejected() {
        let xml = "<SceneObject><Id>0cc5d60e-b22e-448e-96bd-54e6a33b5907</Id>\
                   <Position x=\"0\" y=\"0\" z=\"0\"/><Rotation x=\"0\" y=\"0\" z=\"0\" w=\"1\"/>\
                   <Parts/></SceneObject>";
        assert!(object_from_xml(xml).is_err());
    }
}
