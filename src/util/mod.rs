//! Utility types shared across the archive engine:
//! - [`Error`] / [`Result`] - Error handling
//! - [`xml`] - Minimal writer/parser for crate-owned XML documents

mod error;
pub mod xml;

pub use error::*;
