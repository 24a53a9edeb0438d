//! Sequential container entry writer: gzip-compressed tar stream.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};

use crate::util::{Error, Result};

/// Writer over a named-entry byte-stream container.
pub struct ContainerWriter<W: Write> {
    builder: Builder<GzEncoder<W>>,
}

impl<W: Write> ContainerWriter<W> {
    /// Wrap a destination stream. Entries are compressed as written.
    pub fn new(dest: W) -> Self {
        let encoder = GzEncoder::new(dest, Compression::default());
        Self {
            builder: Builder::new(encoder),
        }
    }

    /// Append a file entry.
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        header.set_mtime(0);
        self.builder
            .append_data(&mut header, path, data)
            .map_err(|e| Error::container(format!("writing entry {path}: {e}")))
    }

    /// Append a directory entry.
    pub fn write_dir(&mut self, path: &str) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Directory);
        header.set_mode(0o755);
        header.set_size(0);
        header.set_mtime(0);
        self.builder
            .append_data(&mut header, path, &[][..])
            .map_err(|e| Error::container(format!("writing directory {path}: {e}")))
    }

    /// Terminate the tar stream and flush the compressor.
    pub fn finish(self) -> Result<()> {
        let encoder = self
            .builder
            .into_inner()
            .map_err(|e| Error::container(format!("finishing container: {e}")))?;
        encoder
            .finish()
            .map_err(|e| Error::container(format!("finishing compression: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::reader::{ContainerReader, EntryKind};

    #[test]
    fn test_write_then_read_back() {
        let mut buf = Vec::new();
        {
            let mut writer = ContainerWriter::new(&mut buf);
            writer.write_dir("assets/").unwrap();
            writer.write_file("archive.xml", b"<archive/>").unwrap();
            writer.write_file("assets/blob", &[0u8; 1000]).unwrap();
            writer.finish().unwrap();
        }

        let mut reader = ContainerReader::new(buf.as_slice());
        let entries: Vec<_> = reader
            .entries()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].path, "archive.xml");
        assert_eq!(entries[1].data, b"<archive/>");
        assert_eq!(entries[2].data.len(), 1000);
    }

    #[test]
    fn test_long_entry_names_survive() {
        let long = format!("objects/{}__x.xml", "n".repeat(150));
        let mut buf = Vec::new();
        {
            let mut writer = ContainerWriter::new(&mut buf);
            writer.write_file(&long, b"payload").unwrap();
            writer.finish().unwrap();
        }
        let mut reader = ContainerReader::new(buf.as_slice());
        let entries: Vec<_> = reader
            .entries()
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(entries[0].path, long);
    }
}
