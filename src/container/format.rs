//! Container path conventions.
//!
//! These strings are part of the interchange format and must match
//! byte-for-byte. Entries outside the known prefixes are ignored on
//! read and never produced on write.

use glam::Vec3;
use uuid::Uuid;

use crate::model::AssetKind;
use crate::util::{Error, Result};

/// Control/manifest file, always present, written last.
pub const CONTROL_FILE_PATH: &str = "archive.xml";

/// One entry per asset: `<uuid><extension>`.
pub const ASSETS_PATH: &str = "assets/";

/// One entry per top-level object: `<name>_<x>-<y>-<z>__<uuid>.xml`.
pub const OBJECTS_PATH: &str = "objects/";

/// One `.r32` heightmap per region.
pub const TERRAINS_PATH: &str = "terrains/";

/// One settings document per region.
pub const SETTINGS_PATH: &str = "settings/";

/// Reserved sub-trees, opaque to this layer.
pub const INVENTORY_PATH: &str = "inventory/";
pub const USERPROFILES_PATH: &str = "userprofiles/";
pub const USERLIST_PATH: &str = "userlist.txt";

/// Current container format version.
pub const MAJOR_VERSION: u32 = 0;
pub const MINOR_VERSION: u32 = 8;

/// Semantic class of an entry path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryClass {
    Control,
    Asset,
    Object,
    Terrain,
    Settings,
    /// Known prefix, contents opaque to this layer.
    Reserved,
    /// No known prefix; ignored.
    Unknown,
}

/// Classify an entry path by its fixed prefix.
pub fn classify(path: &str) -> EntryClass {
    if path == CONTROL_FILE_PATH {
        EntryClass::Control
    } else if path.starts_with(ASSETS_PATH) {
        EntryClass::Asset
    } else if path.starts_with(OBJECTS_PATH) {
        EntryClass::Object
    } else if path.starts_with(TERRAINS_PATH) {
        EntryClass::Terrain
    } else if path.starts_with(SETTINGS_PATH) {
        EntryClass::Settings
    } else if path.starts_with(INVENTORY_PATH)
        || path.starts_with(USERPROFILES_PATH)
        || path == USERLIST_PATH
    {
        EntryClass::Reserved
    } else {
        EntryClass::Unknown
    }
}

/// Archive path for an asset.
pub fn asset_path(id: Uuid, kind: AssetKind) -> String {
    format!("{ASSETS_PATH}{id}{}", kind.extension())
}

/// Recover an asset id and kind from an `assets/` entry path.
pub fn parse_asset_path(path: &str) -> Result<(Uuid, AssetKind)> {
    let name = path
        .strip_prefix(ASSETS_PATH)
        .ok_or_else(|| Error::BadEntryName(path.to_string()))?;
    // Hyphenated uuids are exactly 36 characters; the rest is the extension.
    if name.len() <= 36 {
        return Err(Error::BadEntryName(path.to_string()));
    }
    let id = Uuid::parse_str(&name[..36]).map_err(|_| Error::BadEntryName(path.to_string()))?;
    let kind = AssetKind::from_extension(&name[36..])?;
    Ok((id, kind))
}

/// Archive path for a top-level object. The position is rounded to
/// whole units for the filename only; the payload keeps full precision.
pub fn object_path(name: &str, position: Vec3, id: Uuid) -> String {
    let name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c.is_control() { '-' } else { c })
        .collect();
    format!(
        "{OBJECTS_PATH}{name}_{:03}-{:03}-{:03}__{id}.xml",
        position.x.round() as i64,
        position.y.round() as i64,
        position.z.round() as i64,
    )
}

/// Archive path for a region's terrain heightmap.
pub fn terrain_path(region_name: &str) -> String {
    format!("{TERRAINS_PATH}{region_name}.r32")
}

/// Archive path for a region's settings document.
pub fn settings_path(region_name: &str) -> String {
    format!("{SETTINGS_PATH}{region_name}.xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify("archive.xml"), EntryClass::Control);
        assert_eq!(classify("assets/x_texture.jp2"), EntryClass::Asset);
        assert_eq!(classify("objects/chair_128-064-021__x.xml"), EntryClass::Object);
        assert_eq!(classify("terrains/Sandbox.r32"), EntryClass::Terrain);
        assert_eq!(classify("settings/Sandbox.xml"), EntryClass::Settings);
        assert_eq!(classify("userlist.txt"), EntryClass::Reserved);
        assert_eq!(classify("userprofiles/alice.xml"), EntryClass::Reserved);
        assert_eq!(classify("landdata/parcel.xml"), EntryClass::Unknown);
    }

    #[test]
    fn test_asset_path_roundtrip() {
        let id = Uuid::new_v4();
        let path = asset_path(id, AssetKind::SoundWav);
        assert_eq!(path, format!("assets/{id}_sound.wav"));
        assert_eq!(parse_asset_path(&path).unwrap(), (id, AssetKind::SoundWav));
    }

    #[test]
    fn test_parse_asset_path_errors() {
        assert!(parse_asset_path("assets/notauuid_texture.jp2").is_err());
        assert!(parse_asset_path("assets/short").is_err());
        let id = Uuid::new_v4();
        assert!(matches!(
            parse_asset_path(&format!("assets/{id}_video.mp4")),
            Err(Error::UnknownExtension(_))
        ));
    }

    #[test]
    fn test_object_path_rounds_and_sanitizes() {
        let id = Uuid::new_v4();
        let path = object_path("my/chair", Vec3::new(128.6, 64.2, 21.0), id);
        assert_eq!(path, format!("objects/my-chair_129-064-021__{id}.xml"));
    }
}
