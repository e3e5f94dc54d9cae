//! Minimal PPTX packages for tests.

use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub(crate) const SLIDE_HEADER: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main">"#,
);

/// A text shape at vertical offset `y`; each inner slice is one paragraph of runs.
pub(crate) fn text_shape(id: u32, y: i64, paragraphs: &[&[&str]]) -> String {
    let mut xml = format!(
        "<p:sp><p:nvSpPr><p:cNvPr id=\"{id}\" name=\"TextBox {id}\"/><p:cNvSpPr txBox=\"1\"/><p:nvPr/></p:nvSpPr>\
         <p:spPr><a:xfrm><a:off x=\"914400\" y=\"{y}\"/><a:ext cx=\"7315200\" cy=\"914400\"/></a:xfrm>\
         <a:prstGeom prst=\"rect\"><a:avLst/></a:prstGeom></p:spPr><p:txBody><a:bodyPr/><a:lstStyle/>"
    );
    for runs in paragraphs {
        xml.push_str("<a:p>");
        for (i, run) in runs.iter().enumerate() {
            let bold = if i % 2 == 1 { " b=\"1\"" } else { "" };
            xml.push_str(&format!(
                "<a:r><a:rPr lang=\"es-ES\" sz=\"2800\"{bold} dirty=\"0\"/><a:t>{run}</a:t></a:r>"
            ));
        }
        xml.push_str("</a:p>");
    }
    xml.push_str("</p:txBody></p:sp>");
    xml
}

/// Build a package whose slides contain the given shape tree bodies.
pub(crate) fn build_pptx(slides: &[String]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let deflated = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let stored = FileOptions::default().compression_method(CompressionMethod::Stored);

    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/><Override PartName="/ppt/presentation.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml"/>"#,
    );
    for n in 1..=slides.len() {
        content_types.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/>"#
        ));
    }
    content_types.push_str("</Types>");

    let mut presentation = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:sldIdLst>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for n in 1..=slides.len() {
        presentation.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 255 + n, n + 1));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide{}.xml"/>"#,
            n + 1,
            n
        ));
    }
    presentation.push_str(r#"</p:sldIdLst><p:sldSz cx="9144000" cy="6858000"/></p:presentation>"#);
    rels.push_str("</Relationships>");

    let parts: Vec<(String, Vec<u8>)> = vec![
        ("[Content_Types].xml".to_string(), content_types.into_bytes()),
        (
            "_rels/.rels".to_string(),
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/></Relationships>"#.to_vec(),
        ),
        ("ppt/presentation.xml".to_string(), presentation.into_bytes()),
        ("ppt/_rels/presentation.xml.rels".to_string(), rels.into_bytes()),
    ];
    for (path, data) in parts {
        writer.start_file(path, deflated).unwrap();
        writer.write_all(&data).unwrap();
    }

    for (i, body) in slides.iter().enumerate() {
        writer
            .start_file(format!("ppt/slides/slide{}.xml", i + 1), deflated)
            .unwrap();
        let xml = format!("{}<p:cSld><p:spTree>{}</p:spTree></p:cSld></p:sld>", SLIDE_HEADER, body);
        writer.write_all(xml.as_bytes()).unwrap();
    }

    writer.start_file("ppt/media/image1.png", stored).unwrap();
    writer
        .write_all(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0])
        .unwrap();

    writer.finish().unwrap().into_inner()
}
