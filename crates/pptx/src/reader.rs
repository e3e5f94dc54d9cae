//! Visible text of a PPTX package, slide by slide.

use crate::package::{local_name, open_package, read_part, slide_paths};
use certgen_core::{Error, ExtractedSlide, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Read the text of every shape text frame, slide by slide.
///
/// Each text frame becomes one line with its paragraphs joined by newlines.
/// Lines are ordered top-to-bottom, then left-to-right.
pub fn read_slides(bytes: &[u8]) -> Result<Vec<ExtractedSlide>> {
    let mut archive = open_package(bytes)?;
    let paths = slide_paths(&mut archive)?;

    let mut slides = Vec::with_capacity(paths.len());
    for (idx, path) in paths.iter().enumerate() {
        let content = read_part(&mut archive, path)?;
        let mut slide = ExtractedSlide::new(idx + 1);

        for shape in extract_shapes_from_xml(&content)
            .map_err(|e| Error::MalformedTemplate(format!("{}: {}", path, e)))?
        {
            slide.add_line_with_position(shape.text, shape.y, shape.x);
        }

        slide.sort_by_position();
        slides.push(slide);
    }

    Ok(slides)
}

/// Information about a shape extracted from XML.
#[derive(Debug, Default)]
struct ShapeInfo {
    text: String,
    x: f64,
    y: f64,
}

/// Extract text frames with their offsets from slide XML.
fn extract_shapes_from_xml(xml_content: &str) -> std::result::Result<Vec<ShapeInfo>, String> {
    let mut shapes = Vec::new();
    let mut reader = Reader::from_str(xml_content);

    // shapes can nest inside group shapes, but only leaf shapes carry text
    let mut current_shape: Option<ShapeInfo> = None;
    let mut in_text_body = false;
    let mut in_text = false;
    let mut paragraph_count = 0;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    current_shape = Some(ShapeInfo::default());
                    paragraph_count = 0;
                }
                b"off" => read_offset(e, current_shape.as_mut()),
                b"txBody" if current_shape.is_some() => in_text_body = true,
                b"p" if in_text_body => {
                    if let Some(ref mut shape) = current_shape {
                        if paragraph_count > 0 {
                            shape.text.push('\n');
                        }
                    }
                    paragraph_count += 1;
                }
                b"t" if in_text_body => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if local_name(e.name().as_ref()) == b"off" {
                    read_offset(e, current_shape.as_mut());
                }
            }
            Ok(Event::Text(ref e)) if in_text => {
                let text = e.unescape().map_err(|e| e.to_string())?;
                if let Some(ref mut shape) = current_shape {
                    shape.text.push_str(&text);
                }
            }
            Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                b"sp" => {
                    if let Some(mut shape) = current_shape.take() {
                        shape.text = shape.text.trim().to_string();
                        if !shape.text.is_empty() {
                            shapes.push(shape);
                        }
                    }
                    in_text_body = false;
                    in_text = false;
                }
                b"txBody" => in_text_body = false,
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "XML error at position {}: {}",
                    reader.buffer_position(),
                    e
                ));
            }
            _ => {}
        }
    }

    Ok(shapes)
}

/// Record the `x`/`y` attributes of an `a:off` element on the open shape.
fn read_offset(e: &BytesStart<'_>, shape: Option<&mut ShapeInfo>) {
    let Some(shape) = shape else {
        return;
    };
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        match attr.key.as_ref() {
            b"x" => {
                if let Ok(x) = value.parse::<f64>() {
                    shape.x = x;
                }
            }
            b"y" => {
                if let Ok(y) = value.parse::<f64>() {
                    shape.y = y;
                }
            }
            _ => {}
        }
    }
}
