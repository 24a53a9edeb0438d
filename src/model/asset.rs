//! Asset kinds and the archive extension table.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::util::{Error, Result};

/// Asset type enumeration with platform wire codes.
///
/// The discriminants are the codes carried by task inventory items and
/// serialized object entries; they must stay stable for interoperability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum AssetKind {
    Texture = 0,
    Sound = 1,
    CallingCard = 2,
    Landmark = 3,
    Clothing = 5,
    Object = 6,
    Notecard = 7,
    Folder = 8,
    RootFolder = 9,
    LslText = 10,
    LslBytecode = 11,
    TextureTga = 12,
    Bodypart = 13,
    TrashFolder = 14,
    SnapshotFolder = 15,
    LostAndFoundFolder = 16,
    SoundWav = 17,
    ImageTga = 18,
    ImageJpeg = 19,
    Animation = 20,
    Gesture = 21,
    Simstate = 22,
    Mesh = 49,
}

/// All kinds, in wire-code order. Drives the bidirectional extension
/// lookup and the table tests.
pub const ALL_KINDS: &[AssetKind] = &[
    AssetKind::Texture,
    AssetKind::Sound,
    AssetKind::CallingCard,
    AssetKind::Landmark,
    AssetKind::Clothing,
    AssetKind::Object,
    AssetKind::Notecard,
    AssetKind::Folder,
    AssetKind::RootFolder,
    AssetKind::LslText,
    AssetKind::LslBytecode,
    AssetKind::TextureTga,
    AssetKind::Bodypart,
    AssetKind::TrashFolder,
    AssetKind::SnapshotFolder,
    AssetKind::LostAndFoundFolder,
    AssetKind::SoundWav,
    AssetKind::ImageTga,
    AssetKind::ImageJpeg,
    AssetKind::Animation,
    AssetKind::Gesture,
    AssetKind::Simstate,
    AssetKind::Mesh,
];

impl AssetKind {
    /// Wire code for serialized items.
    #[inline]
    pub const fn code(self) -> i8 {
        self as i8
    }

    /// Resolve a wire code back to a kind.
    pub fn from_code(code: i8) -> Result<Self> {
        for &kind in ALL_KINDS {
            if kind.code() == code {
                return Ok(kind);
            }
        }
        Err(Error::UnknownAssetKind(code))
    }

    /// Archive filename extension, including the `_` separator.
    ///
    /// These strings are part of the container format and must match
    /// byte-for-byte.
    pub const fn extension(self) -> &'static str {
        match self {
            AssetKind::Animation => "_animation.bvh",
            AssetKind::Bodypart => "_bodypart.txt",
            AssetKind::CallingCard => "_callingcard.txt",
            AssetKind::Clothing => "_clothing.txt",
            AssetKind::Folder => "_folder.txt",
            AssetKind::Gesture => "_gesture.txt",
            AssetKind::ImageJpeg => "_image.jpg",
            AssetKind::ImageTga => "_image.tga",
            AssetKind::Landmark => "_landmark.txt",
            AssetKind::LostAndFoundFolder => "_lostandfoundfolder.txt",
            AssetKind::LslBytecode => "_bytecode.lso",
            AssetKind::LslText => "_script.lsl",
            AssetKind::Mesh => "_mesh.llmesh",
            AssetKind::Notecard => "_notecard.txt",
            AssetKind::Object => "_object.xml",
            AssetKind::RootFolder => "_rootfolder.txt",
            AssetKind::Simstate => "_simstate.bin",
            AssetKind::SnapshotFolder => "_snapshotfolder.txt",
            AssetKind::Sound => "_sound.ogg",
            AssetKind::SoundWav => "_sound.wav",
            AssetKind::Texture => "_texture.jp2",
            AssetKind::TextureTga => "_texture.tga",
            AssetKind::TrashFolder => "_trashfolder.txt",
        }
    }

    /// Resolve an archive filename extension back to a kind.
    pub fn from_extension(ext: &str) -> Result<Self> {
        for &kind in ALL_KINDS {
            if kind.extension() == ext {
                return Ok(kind);
            }
        }
        Err(Error::UnknownExtension(ext.to_string()))
    }

    /// Wearable assets decode as textured body records.
    #[inline]
    pub const fn is_wearable(self) -> bool {
        matches!(self, AssetKind::Bodypart | AssetKind::Clothing)
    }
}

/// An immutable content-addressed binary blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub id: Uuid,
    pub kind: AssetKind,
    pub name: String,
    pub data: Vec<u8>,
}

impl Asset {
    /// Create an asset with an empty display name.
    pub fn new(id: Uuid, kind: AssetKind, data: Vec<u8>) -> Self {
        Self {
            id,
            kind,
            name: String::new(),
            data,
        }
    }

    /// Payload interpreted as UTF-8 text (scripts, wearables, notecards).
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.data)
            .map_err(|e| Error::other(format!("asset {} is not valid UTF-8: {e}", self.id)))
    }
}
