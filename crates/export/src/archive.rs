//! In-memory output archive.

use certgen_core::{Error, Result};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Ordered mapping of entry name to content, written out as a ZIP once
/// every entry is in.
///
/// Appending a name that is already present replaces its content but keeps
/// the position of the first append.
#[derive(Debug, Default)]
pub struct OutputArchive {
    entries: Vec<(String, Vec<u8>)>,
    positions: HashMap<String, usize>,
}

impl OutputArchive {
    /// Create an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry. Returns `true` if an entry with that name was replaced.
    pub fn append(&mut self, filename: String, content: Vec<u8>) -> bool {
        match self.positions.get(&filename) {
            Some(&position) => {
                self.entries[position].1 = content;
                true
            }
            None => {
                self.positions.insert(filename.clone(), self.entries.len());
                self.entries.push((filename, content));
                false
            }
        }
    }

    /// Entry names in archive order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Write every entry into a ZIP archive.
    pub fn seal(self) -> Result<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        for (filename, content) in self.entries {
            writer
                .start_file(filename.as_str(), options)
                .map_err(|e| Error::Unexpected(format!("Failed to add '{}': {}", filename, e)))?;
            writer.write_all(&content)?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::Unexpected(format!("Failed to finish archive: {}", e)))?;
        Ok(cursor.into_inner())
    }
}
