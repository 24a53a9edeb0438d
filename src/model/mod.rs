//! Data model for archived region content:
//! - [`Asset`] / [`AssetKind`] - Content-addressed blobs and their kinds
//! - [`SceneObject`] / [`Part`] - Object tree contract types
//! - [`CoalescedObject`] - Multi-object container assets
//! - [`serialize`] - Structural XML codec for object payloads
//! - [`wearable`] - Texture references of bodypart/clothing records
//! - [`terrain`] - Raw `.r32` heightmap helpers
//! - [`defaults`] - Well-known platform identifiers

mod asset;
pub mod coalesced;
pub mod defaults;
mod object;
pub mod serialize;
pub mod terrain;
pub mod wearable;

pub use asset::*;
pub use coalesced::{CoalescedMember, CoalescedObject};
pub use object::*;
pub use serialize::{ObjectPayload, coalesced_to_xml, object_from_xml, object_to_xml, payload_from_xml};
