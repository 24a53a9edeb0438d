//! Sequential container entry reader: gzip-compressed tar stream.

use std::io::Read;

use flate2::read::GzDecoder;
use tar::Archive;

use crate::util::{Error, Result};

/// Kind of a container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One named entry, fully buffered.
#[derive(Debug, Clone)]
pub struct ContainerEntry {
    pub path: String,
    pub kind: EntryKind,
    pub data: Vec<u8>,
}

/// Reader over a named-entry byte-stream container. Entries are
/// yielded once, in stream order; errors from the iterator are
/// stream-fatal by definition.
pub struct ContainerReader<R: Read> {
    archive: Archive<GzDecoder<R>>,
}

impl<R: Read> ContainerReader<R> {
    /// Wrap a source stream.
    pub fn new(source: R) -> Self {
        Self {
            archive: Archive::new(GzDecoder::new(source)),
        }
    }

    /// Iterate the entries in stream order.
    pub fn entries(&mut self) -> Result<impl Iterator<Item = Result<ContainerEntry>> + '_> {
        let entries = self
            .archive
            .entries()
            .map_err(|e| Error::container(format!("opening container: {e}")))?;
        Ok(entries.map(|entry| {
            let mut entry = entry.map_err(|e| Error::container(format!("reading entry: {e}")))?;
            let path = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            let kind = if entry.header().entry_type().is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::container(format!("reading entry {path}: {e}")))?;
            Ok(ContainerEntry { path, kind, data })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::writer::ContainerWriter;

    fn sample_container() -> Vec<u8> {
        let mut buf = Vec::new();
        let mut writer = ContainerWriter::new(&mut buf);
        writer.write_file("archive.xml", b"<archive/>").unwrap();
        writer.write_file("assets/one", b"1111").unwrap();
        writer.write_file("assets/two", b"2222").unwrap();
        writer.finish().unwrap();
        buf
    }

    #[test]
    fn test_reads_in_stream_order() {
        let buf = sample_container();
        let mut reader = ContainerReader::new(buf.as_slice());
        let paths: Vec<_> = reader
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path)
            .collect();
        assert_eq!(paths, ["archive.xml", "assets/one", "assets/two"]);
    }

    #[test]
    fn test_truncated_stream_is_fatal() {
        let buf = sample_container();
        // Chop the stream mid-entry; earlier entries still stream out.
        let truncated = &buf[..buf.len() / 2];
        let mut reader = ContainerReader::new(truncated);
        let mut saw_error = false;
        if let Ok(entries) = reader.entries() {
            for entry in entries {
                match entry {
                    Ok(_) => {}
                    Err(e) => {
                        assert!(e.is_stream_fatal());
                        saw_error = true;
                        break;
                    }
                }
            }
        } else {
            saw_error = true;
        }
        assert!(saw_error, "truncation must surface a stream error");
    }

    #[test]
    fn test_garbage_stream_is_fatal() {
        let mut reader = ContainerReader::new(&b"this is not a gzip stream"[..]);
        let fatal = match reader.entries() {
            Err(e) => e.is_stream_fatal(),
            Ok(mut entries) => entries.any(|e| e.is_err()),
        };
        assert!(fatal);
    }
}
