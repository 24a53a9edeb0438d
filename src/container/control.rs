//! The `archive.xml` control file.

use uuid::Uuid;

use crate::util::xml::{XmlElement, XmlWriter};
use crate::util::{Error, Result};

use super::format::{MAJOR_VERSION, MINOR_VERSION};

/// Parsed control/manifest file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlFile {
    pub major_version: u32,
    pub minor_version: u32,
    /// Creation time, seconds since the Unix epoch.
    pub create_time: u64,
    /// Identifier of the source region.
    pub region_id: Uuid,
    pub assets_included: bool,
    pub is_megaregion: bool,
    /// Region extent in meters.
    pub size_x: u32,
    pub size_y: u32,
}

impl ControlFile {
    /// A current-version control file for a region.
    pub fn new(region_id: Uuid, create_time: u64, assets_included: bool, size: (u32, u32)) -> Self {
        Self {
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
            create_time,
            region_id,
            assets_included,
            is_megaregion: false,
            size_x: size.0,
            size_y: size.1,
        }
    }

    /// Render the control document.
    pub fn to_xml(&self) -> String {
        let mut w = XmlWriter::new();
        w.declaration();
        w.open("archive");
        w.attr("major_version", &self.major_version.to_string());
        w.attr("minor_version", &self.minor_version.to_string());
        w.open("creation_info");
        w.leaf("datetime", &self.create_time.to_string());
        w.leaf("id", &self.region_id.to_string());
        w.close();
        w.leaf(
            "assets_included",
            if self.assets_included { "True" } else { "False" },
        );
        w.open("region_info");
        w.leaf(
            "is_megaregion",
            if self.is_megaregion { "True" } else { "False" },
        );
        w.leaf("size_in_meters", &format!("{},{}", self.size_x, self.size_y));
        w.close();
        w.close();
        w.finish()
    }

    /// Parse and validate a control document.
    ///
    /// A major version newer than ours is unreadable by contract;
    /// anything else is accepted with per-field defaults so older
    /// archives keep loading.
    pub fn from_xml(text: &str) -> Result<Self> {
        let root = XmlElement::parse(text)
            .map_err(|e| Error::ControlFile(format!("malformed control file: {e}")))?;
        if root.name != "archive" {
            return Err(Error::ControlFile(format!(
                "unexpected root element <{}>",
                root.name
            )));
        }

        let major_version = parse_attr_num(&root, "major_version")?;
        let minor_version = parse_attr_num(&root, "minor_version")?;
        if major_version > MAJOR_VERSION {
            return Err(Error::ControlFile(format!(
                "unsupported container version {major_version}.{minor_version} \
                 (latest readable is {MAJOR_VERSION}.{MINOR_VERSION})"
            )));
        }

        let creation = root.child("creation_info");
        let create_time = creation
            .and_then(|c| c.child_text("datetime"))
            .and_then(|t| t.trim().parse().ok())
            .unwrap_or(0);
        let region_id = creation
            .and_then(|c| c.child_text("id"))
            .and_then(|t| Uuid::parse_str(t.trim()).ok())
            .unwrap_or(Uuid::nil());

        let assets_included = root
            .child_text("assets_included")
            .map(parse_bool)
            .unwrap_or(true);

        let region = root.child("region_info");
        let is_megaregion = region
            .and_then(|r| r.child_text("is_megaregion"))
            .map(parse_bool)
            .unwrap_or(false);
        let (size_x, size_y) = region
            .and_then(|r| r.child_text("size_in_meters"))
            .and_then(parse_size)
            .unwrap_or((256, 256));

        Ok(Self {
            major_version,
            minor_version,
            create_time,
            region_id,
            assets_included,
            is_megaregion,
            size_x,
            size_y,
        })
    }
}

fn parse_attr_num(root: &XmlElement, name: &str) -> Result<u32> {
    root.attr(name)
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| Error::ControlFile(format!("missing or bad attribute {name}")))
}

fn parse_bool(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("true")
}

fn parse_size(text: &str) -> Option<(u32, u32)> {
    let (w, h) = text.trim().split_once(',')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
