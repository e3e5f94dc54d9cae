//! Domain types shared by the template, spreadsheet, converter and export crates.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Output format of each generated certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFormat {
    /// The template's own format (PPTX), no conversion needed.
    #[serde(rename = "pptx")]
    Native,
    /// Fixed-layout printable format (PDF), produced by an external converter.
    #[serde(rename = "pdf")]
    FixedLayout,
}

impl OutputFormat {
    /// All formats, native first.
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Native, OutputFormat::FixedLayout];

    /// File extension used for generated entries.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Native => "pptx",
            Self::FixedLayout => "pdf",
        }
    }

    /// Whether producing this format needs the external converter.
    pub fn requires_conversion(self) -> bool {
        matches!(self, Self::FixedLayout)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A single slide's visible text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedSlide {
    /// 1-based slide number.
    pub number: usize,

    /// Text frames on this slide, in reading order.
    pub lines: Vec<SlideText>,
}

impl ExtractedSlide {
    /// Create a new slide with the given number.
    pub fn new(number: usize) -> Self {
        Self {
            number,
            lines: Vec::new(),
        }
    }

    /// Add a text frame with position information.
    pub fn add_line_with_position(&mut self, text: impl Into<String>, y: f64, x: f64) {
        self.lines.push(SlideText::with_position(text, y, x));
    }

    /// Sort lines by position (top-to-bottom, then left-to-right).
    pub fn sort_by_position(&mut self) {
        self.lines.sort_by(|a, b| {
            a.y_position
                .total_cmp(&b.y_position)
                .then(a.x_position.total_cmp(&b.x_position))
        });
    }

    /// All text on the slide, one text frame per element.
    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }
}

/// Text content of one shape's text frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideText {
    /// Paragraphs joined by newlines.
    pub text: String,

    /// Shape offset in EMU, used for ordering.
    pub y_position: f64,
    pub x_position: f64,
}

impl SlideText {
    /// Create slide text at the given offset.
    pub fn with_position(text: impl Into<String>, y: f64, x: f64) -> Self {
        Self {
            text: text.into(),
            y_position: y,
            x_position: x,
        }
    }
}

/// Rows read from a participant spreadsheet.
///
/// The first row supplies column names; each later row holds one optional
/// value per column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParticipantList {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl ParticipantList {
    /// Create a list from a header and data rows.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    /// Column names in sheet order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The values of `column`, in row order.
    ///
    /// Rows without a cell in that column are skipped. Values are returned
    /// as-is: duplicates and whitespace-only names are kept.
    pub fn names(&self, column: &str) -> Result<Vec<String>> {
        let index = self
            .columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| Error::ColumnNotFound {
                column: column.to_string(),
                available: self.columns.clone(),
            })?;

        let mut names = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            match row.get(index).and_then(|v| v.as_ref()) {
                Some(value) => names.push(value.clone()),
                None => {
                    // +2: one for the header, one for 1-based numbering
                    log::warn!("Row {} has no value in column '{}', skipping", row_idx + 2, column);
                }
            }
        }

        Ok(names)
    }
}

/// What an export produced, for reporting back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Where the archive was written.
    pub archive: String,

    /// Media type of the archive.
    pub content_type: String,

    /// Format of each entry.
    pub format: OutputFormat,

    /// Entry names in archive order.
    pub entries: Vec<String>,
}
