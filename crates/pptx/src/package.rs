//! Access to the parts of a PPTX package.

use certgen_core::{Error, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use zip::ZipArchive;

const PRESENTATION_PATH: &str = "ppt/presentation.xml";
const PRESENTATION_RELS_PATH: &str = "ppt/_rels/presentation.xml.rels";
const SLIDE_REL_TYPE_SUFFIX: &str = "/slide";

/// Zip local file header signature.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Check the leading bytes and open the package.
pub(crate) fn open_package(bytes: &[u8]) -> Result<ZipArchive<std::io::Cursor<&[u8]>>> {
    if !bytes.starts_with(&ZIP_MAGIC) {
        return Err(Error::MalformedTemplate(
            "not a PPTX file (missing ZIP signature)".to_string(),
        ));
    }

    ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::MalformedTemplate(format!("Failed to open ZIP: {}", e)))
}

/// Get the slide part paths in presentation order.
///
/// Slides come from the slide relationships of `presentation.xml.rels`,
/// ordered by the slide id list in `presentation.xml`. Slides missing from
/// that list are appended, ordered by the number in their id or file name.
pub(crate) fn slide_paths<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<String>> {
    let rels_content = read_part(archive, PRESENTATION_RELS_PATH)?;
    let slides_by_id = parse_slide_relationships(&rels_content)?;

    // presentation.xml is optional for our purposes; without it we fall back to numbering
    let listed_ids = match read_part(archive, PRESENTATION_PATH) {
        Ok(content) => parse_slide_id_list(&content)?,
        Err(_) => Vec::new(),
    };

    let mut ordered = Vec::with_capacity(slides_by_id.len());
    let mut remaining = slides_by_id;
    for id in listed_ids {
        if let Some(path) = remaining.remove(&id) {
            ordered.push(path);
        }
    }

    let mut rest: Vec<(String, String)> = remaining.into_iter().collect();
    rest.sort_by(|(id_a, path_a), (id_b, path_b)| {
        let a = extract_slide_number(path_a).or_else(|| extract_slide_number(id_a));
        let b = extract_slide_number(path_b).or_else(|| extract_slide_number(id_b));
        match (a, b) {
            (Some(na), Some(nb)) => na.cmp(&nb),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => path_a.cmp(path_b),
        }
    });
    ordered.extend(rest.into_iter().map(|(_, path)| path));

    Ok(ordered)
}

/// Map relationship id to slide part path.
fn parse_slide_relationships(rels_content: &str) -> Result<HashMap<String, String>> {
    let mut slides = HashMap::new();
    let mut reader = Reader::from_str(rels_content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"Relationship" =>
            {
                let mut rel_type = String::new();
                let mut target = String::new();
                let mut id = String::new();

                for attr in e.attributes().flatten() {
                    match attr.key.as_ref() {
                        b"Type" => rel_type = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Target" => target = String::from_utf8_lossy(&attr.value).to_string(),
                        b"Id" => id = String::from_utf8_lossy(&attr.value).to_string(),
                        _ => {}
                    }
                }

                if rel_type.ends_with(SLIDE_REL_TYPE_SUFFIX) {
                    let full_path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("ppt/{}", target),
                    };
                    slides.insert(id, full_path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedTemplate(format!(
                    "Error parsing relationships: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(slides)
}

/// Relationship ids of `p:sldIdLst/p:sldId`, in document order.
fn parse_slide_id_list(content: &str) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    loop {
        match reader.read_event() {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if local_name(e.name().as_ref()) == b"sldId" =>
            {
                // the id attribute is namespaced (r:id); the plain "id" is numeric
                if let Some(attr) = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() != b"id" && local_name(a.key.as_ref()) == b"id")
                {
                    ids.push(String::from_utf8_lossy(&attr.value).to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::MalformedTemplate(format!(
                    "Error parsing presentation.xml: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(ids)
}

/// Read a part from the package as UTF-8 text.
pub(crate) fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String> {
    let mut file = archive.by_name(path).map_err(|e| {
        Error::MalformedTemplate(format!("Part not found in package '{}': {}", path, e))
    })?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::MalformedTemplate(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML element name.
pub(crate) fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}

/// Extract a slide number from a string like "rId2" or "slides/slide3.xml".
fn extract_slide_number(s: &str) -> Option<usize> {
    let s = s.trim_end_matches(".xml").trim_end_matches(".rels");

    let digits: String = s.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    let digits: String = digits.chars().rev().collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster" Target="slideMasters/slideMaster1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="/ppt/slideLayouts/slideLayout1.xml"/>
<Relationship Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="/ppt/slides/slide10.xml"/>
</Relationships>"#;

    #[test]
    fn test_extract_slide_number() {
        assert_eq!(extract_slide_number("rId1"), Some(1));
        assert_eq!(extract_slide_number("rId12"), Some(12));
        assert_eq!(extract_slide_number("slides/slide1.xml"), Some(1));
        assert_eq!(extract_slide_number("slide123.xml"), Some(123));
        assert_eq!(extract_slide_number("nodigits"), None);
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name(b"p:sp"), b"sp");
        assert_eq!(local_name(b"a:t"), b"t");
        assert_eq!(local_name(b"sp"), b"sp");
    }

    #[test]
    fn test_slide_relationships_only() {
        let slides = parse_slide_relationships(RELS).unwrap();
        assert_eq!(slides.len(), 3);
        assert_eq!(slides["rId2"], "ppt/slides/slide1.xml");
        assert_eq!(slides["rId3"], "ppt/slides/slide2.xml");
        assert_eq!(slides["rId5"], "ppt/slides/slide10.xml");
    }

    #[test]
    fn test_slide_id_list_order() {
        let xml = r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst>
<p:sldId id="257" r:id="rId3"/><p:sldId id="256" r:id="rId2"/>
</p:sldIdLst></p:presentation>"#;
        assert_eq!(parse_slide_id_list(xml).unwrap(), vec!["rId3", "rId2"]);
    }

    #[test]
    fn test_malformed_relationships() {
        let result = parse_slide_relationships("<Relationships><Relationship></Relationships>");
        assert!(matches!(result, Err(Error::MalformedTemplate(_))));
    }
}
