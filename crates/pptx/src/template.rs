//! Placeholder substitution over the text runs of a PPTX template.
//!
//! Only the text of runs (`a:r/a:t`) inside shape text frames
//! (`p:sp/p:txBody`) is touched. Every other part of the package is copied
//! through without being decompressed.
//!
//! A marker split across two runs, e.g. because half of it is bold, is not
//! found. [`Template::split_marker_count`] reports how many of those exist.

use crate::package::{local_name, open_package, read_part, slide_paths};
use certgen_core::{Error, Result};
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{Cursor, Read, Write};
use zip::write::FileOptions;
use zip::ZipWriter;

/// The placeholder replaced by each participant's name.
pub const MARKER: &str = "{{NOMBRE}}";

/// A parsed template, ready to be rendered once per participant.
#[derive(Debug, Clone)]
pub struct Template {
    bytes: Vec<u8>,
    slide_paths: Vec<String>,
    marker_count: usize,
    split_marker_count: usize,
}

impl Template {
    /// Validate a template package and record where its slides are.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let (slide_paths, marker_count, split_marker_count) = {
            let mut archive = open_package(&bytes)?;
            let slide_paths = slide_paths(&mut archive)?;

            let mut markers = 0;
            let mut split = 0;
            for path in &slide_paths {
                let xml = read_part(&mut archive, path)?;
                // rendering the marker as itself validates the XML and counts hits
                let rewritten = rewrite_slide(&xml, MARKER)
                    .map_err(|e| Error::MalformedTemplate(format!("{}: {}", path, e)))?;
                markers += rewritten.replaced;
                split += rewritten.split;
            }

            (slide_paths, markers, split)
        };

        log::debug!(
            "Template has {} slides, {} marker(s)",
            slide_paths.len(),
            marker_count
        );
        if marker_count == 0 {
            log::warn!("Template contains no {} marker in any text run", MARKER);
        }
        if split_marker_count > 0 {
            log::warn!(
                "{} marker(s) are split across formatting runs and will not be replaced",
                split_marker_count
            );
        }

        Ok(Self {
            bytes,
            slide_paths,
            marker_count,
            split_marker_count,
        })
    }

    /// Number of slides in the template.
    pub fn slide_count(&self) -> usize {
        self.slide_paths.len()
    }

    /// Number of marker occurrences that will be replaced.
    pub fn marker_count(&self) -> usize {
        self.marker_count
    }

    /// Number of markers that span several runs and will be left as-is.
    pub fn split_marker_count(&self) -> usize {
        self.split_marker_count
    }

    /// Produce a copy of the template with every marker replaced.
    ///
    /// Zip entries keep their order, compression method, timestamp and
    /// permissions, so the same replacement always yields the same bytes.
    pub fn render(&self, replacement: &str) -> Result<Vec<u8>> {
        let mut archive = open_package(&self.bytes)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for index in 0..archive.len() {
            let name = archive
                .by_index_raw(index)
                .map_err(|e| Error::MalformedTemplate(format!("Bad ZIP entry {}: {}", index, e)))?
                .name()
                .to_string();

            if self.slide_paths.contains(&name) {
                let mut file = archive.by_index(index).map_err(|e| {
                    Error::MalformedTemplate(format!("Failed to open '{}': {}", name, e))
                })?;

                let mut options = FileOptions::default()
                    .compression_method(file.compression())
                    .last_modified_time(file.last_modified());
                if let Some(mode) = file.unix_mode() {
                    options = options.unix_permissions(mode);
                }

                let mut xml = String::new();
                file.read_to_string(&mut xml).map_err(|e| {
                    Error::MalformedTemplate(format!("Failed to read '{}': {}", name, e))
                })?;
                drop(file);

                let rewritten = rewrite_slide(&xml, replacement)
                    .map_err(|e| Error::MalformedTemplate(format!("{}: {}", name, e)))?;

                writer
                    .start_file(name.as_str(), options)
                    .map_err(|e| Error::Unexpected(format!("Failed to add '{}': {}", name, e)))?;
                writer.write_all(&rewritten.xml)?;
            } else {
                let file = archive.by_index_raw(index).map_err(|e| {
                    Error::MalformedTemplate(format!("Failed to open '{}': {}", name, e))
                })?;
                writer
                    .raw_copy_file(file)
                    .map_err(|e| Error::Unexpected(format!("Failed to copy '{}': {}", name, e)))?;
            }
        }

        let cursor = writer
            .finish()
            .map_err(|e| Error::Unexpected(format!("Failed to finish document: {}", e)))?;
        Ok(cursor.into_inner())
    }
}

/// Replace the marker in a single template without keeping the parse around.
pub fn substitute(template_bytes: &[u8], replacement: &str) -> Result<Vec<u8>> {
    Template::parse(template_bytes.to_vec())?.render(replacement)
}

/// Result of rewriting one slide part.
struct RewrittenSlide {
    xml: Vec<u8>,
    /// Markers replaced inside single runs.
    replaced: usize,
    /// Markers only visible when a paragraph's runs are joined.
    split: usize,
}

/// Stream a slide's XML through, replacing the marker in shape text runs.
///
/// Events are written back unchanged except for run text that contains the
/// marker, so untouched runs keep their exact bytes.
fn rewrite_slide(xml: &str, replacement: &str) -> std::result::Result<RewrittenSlide, String> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));

    // local names of the currently open elements
    let mut stack: Vec<Vec<u8>> = Vec::new();
    // run text of the current shape paragraph, and markers found in its runs
    let mut paragraph: Option<(String, usize)> = None;
    let mut replaced = 0;
    let mut split = 0;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("XML error at position {}: {}", reader.buffer_position(), e))?;

        match event {
            Event::Eof => break,
            Event::Start(ref e) => {
                let name = local_name(e.name().as_ref()).to_vec();
                if name == b"p" && in_shape_text_frame(&stack) {
                    paragraph = Some((String::new(), 0));
                }
                stack.push(name);
                writer.write_event(&event).map_err(|e| e.to_string())?;
            }
            Event::End(ref e) => {
                if local_name(e.name().as_ref()) == b"p" {
                    if let Some((text, hits)) = paragraph.take() {
                        split += text.matches(MARKER).count().saturating_sub(hits);
                    }
                }
                stack.pop();
                writer.write_event(&event).map_err(|e| e.to_string())?;
            }
            Event::Text(ref e) if in_shape_run_text(&stack) => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                let hits = text.matches(MARKER).count();
                if let Some((para_text, para_hits)) = paragraph.as_mut() {
                    para_text.push_str(&text);
                    *para_hits += hits;
                }

                if hits > 0 {
                    replaced += hits;
                    let substituted = text.replace(MARKER, replacement);
                    writer
                        .write_event(Event::Text(BytesText::new(&substituted)))
                        .map_err(|e| e.to_string())?;
                } else {
                    writer.write_event(&event).map_err(|e| e.to_string())?;
                }
            }
            _ => {
                writer.write_event(&event).map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(RewrittenSlide {
        xml: writer.into_inner(),
        replaced,
        split,
    })
}

/// Whether the open elements put us inside a shape's text frame.
fn in_shape_text_frame(stack: &[Vec<u8>]) -> bool {
    stack
        .windows(2)
        .any(|w| w[0] == b"sp" && w[1] == b"txBody")
}

/// Whether the open elements end in `r/t` inside a shape's text frame.
fn in_shape_run_text(stack: &[Vec<u8>]) -> bool {
    let n = stack.len();
    n >= 2 && stack[n - 1] == b"t" && stack[n - 2] == b"r" && in_shape_text_frame(stack)
}
