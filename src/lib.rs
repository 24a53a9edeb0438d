//! # Amphora
//!
//! Region content archive engine for virtual-world simulators: exports
//! a region's scene objects, terrain, settings and every transitively
//! referenced asset into a single portable gzip+tar container, and
//! re-imports such containers while enforcing a creator/owner content
//! policy with substitution and provenance tracking.
//!
//! ## Modules
//!
//! - [`util`] - Errors and the XML helper used by crate-owned documents
//! - [`model`] - Assets, scene objects, coalesced containers, codecs
//! - [`container`] - Path conventions over the tar+gzip entry stream
//! - [`store`] - Content-addressed asset store adapter
//! - [`gather`] - Asset dependency closure computation
//! - [`filter`] - Allow-list policy, substitution, attribution table
//! - [`scene`] - Destination scene and identity directory adapters
//! - [`archiver`] - Export/import pipelines and the attribution scan
//!
//! ## Example
//!
//! ```ignore
//! use amphora::prelude::*;
//!
//! let summary = export_archive(&scene, &store, file, &ExportOptions::default())?;
//! println!("{} objects, {} assets", summary.objects_written, summary.assets_written);
//! ```

pub mod archiver;
pub mod container;
pub mod filter;
pub mod gather;
pub mod model;
pub mod scene;
pub mod store;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::archiver::{
        export_archive, import_archive, scan_asset_creators, ExportOptions, ExportSummary,
        ImportOptions, ImportSummary,
    };
    pub use crate::container::{ContainerReader, ContainerWriter, ControlFile};
    pub use crate::filter::{AttributionStore, ContentPolicy, JsonAttributionStore};
    pub use crate::model::{Asset, AssetKind, SceneObject};
    pub use crate::scene::{MemoryDirectory, MemoryScene, RegionInfo, Scene, UserDirectory};
    pub use crate::store::{AssetStore, FsAssetStore, MemoryAssetStore};
    pub use crate::util::{Error, Result};
}
