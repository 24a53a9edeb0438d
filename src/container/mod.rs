//! Container codec: the path/extension conventions that give entries
//! semantic meaning, layered over a generic gzip+tar named-entry
//! stream.

pub mod control;
pub mod format;
pub mod reader;
pub mod writer;

pub use control::ControlFile;
pub use format::EntryClass;
pub use reader::{ContainerEntry, ContainerReader, EntryKind};
pub use writer::ContainerWriter;
