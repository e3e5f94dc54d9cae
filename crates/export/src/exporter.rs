//! Batch export: one certificate per participant, bundled into one archive.

use crate::archive::OutputArchive;
use certgen_convert::Converter;
use certgen_core::{certificate_filename, Error, OutputFormat, Result};
use certgen_pptx::Template;

/// File name under which the archive is offered for download.
pub const ARCHIVE_FILENAME: &str = "certificados.zip";

/// Media type of the archive.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/zip";

/// Progress of an export, reported once per step.
#[derive(Debug)]
pub enum ExportEvent<'a> {
    /// The batch is about to start.
    Started { total: usize },
    /// A certificate was generated and added to the archive.
    Generated {
        index: usize,
        name: &'a str,
        filename: &'a str,
    },
    /// Generating a certificate failed; the batch stops here.
    Failed {
        index: usize,
        name: &'a str,
        error: &'a Error,
    },
    /// The archive was sealed.
    Finished { entries: &'a [String] },
}

/// Generates certificates from a template parsed once up front.
///
/// Export is fail-fast: the first failing participant aborts the batch and no
/// archive is returned. Nothing is retried.
pub struct Exporter<'c> {
    template: Template,
    converter: Option<&'c dyn Converter>,
}

impl<'c> Exporter<'c> {
    /// Parse the template. Fails with `MalformedTemplate` before any
    /// certificate is generated.
    pub fn new(template_bytes: Vec<u8>) -> Result<Self> {
        let template = Template::parse(template_bytes)?;
        Ok(Self {
            template,
            converter: None,
        })
    }

    /// Attach the converter used for formats that need one.
    pub fn with_converter(mut self, converter: &'c dyn Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Formats that can be exported right now.
    ///
    /// The native format is always available; the others only when an
    /// available converter is attached.
    pub fn available_formats(&self) -> Vec<OutputFormat> {
        available_formats(self.converter)
    }

    /// Generate every certificate and return the sealed archive.
    pub fn export_all<S: AsRef<str>>(&self, names: &[S], format: OutputFormat) -> Result<Vec<u8>> {
        self.export_all_with(names, format, |_| {})
    }

    /// Like [`Exporter::export_all`], reporting progress to `on_event`.
    pub fn export_all_with<S, F>(
        &self,
        names: &[S],
        format: OutputFormat,
        mut on_event: F,
    ) -> Result<Vec<u8>>
    where
        S: AsRef<str>,
        F: FnMut(ExportEvent<'_>),
    {
        if format.requires_conversion() && !self.has_available_converter() {
            return Err(Error::ConverterUnavailable(format!(
                "{} output needs LibreOffice; only {} output is available",
                format,
                OutputFormat::Native
            )));
        }

        log::info!("Generating {} certificate(s) as {}", names.len(), format);
        on_event(ExportEvent::Started { total: names.len() });

        let mut archive = OutputArchive::new();
        for (index, name) in names.iter().enumerate() {
            let name = name.as_ref();

            let content = match self.generate(name, format) {
                Ok(content) => content,
                Err(error) => {
                    log::debug!("Certificate {} ({:?}) failed: {}", index + 1, name, error);
                    on_event(ExportEvent::Failed {
                        index,
                        name,
                        error: &error,
                    });
                    return Err(error);
                }
            };

            let filename = certificate_filename(name, format);
            log::debug!("Generated {} ({} bytes)", filename, content.len());
            on_event(ExportEvent::Generated {
                index,
                name,
                filename: &filename,
            });

            if archive.append(filename, content) {
                log::warn!("Duplicate file name for {:?}, keeping the last one", name);
            }
        }

        let entries: Vec<String> = archive.filenames().map(str::to_string).collect();
        let bytes = archive.seal()?;
        on_event(ExportEvent::Finished { entries: &entries });

        Ok(bytes)
    }

    fn generate(&self, name: &str, format: OutputFormat) -> Result<Vec<u8>> {
        let document = self.template.render(name)?;
        if !format.requires_conversion() {
            return Ok(document);
        }

        match self.converter {
            Some(converter) => converter.convert(&document, format),
            None => Err(Error::ConverterUnavailable(format!(
                "no converter attached for {} output",
                format
            ))),
        }
    }

    fn has_available_converter(&self) -> bool {
        self.converter.is_some_and(|c| c.is_available())
    }
}

/// Formats that can be produced with the given converter.
pub fn available_formats(converter: Option<&dyn Converter>) -> Vec<OutputFormat> {
    let can_convert = converter.is_some_and(|c| c.is_available());
    OutputFormat::ALL
        .into_iter()
        .filter(|format| !format.requires_conversion() || can_convert)
        .collect()
}

/// Export `names` from raw template bytes in a single call.
pub fn export_all<S: AsRef<str>>(
    template_bytes: &[u8],
    names: &[S],
    format: OutputFormat,
    converter: Option<&dyn Converter>,
) -> Result<Vec<u8>> {
    let mut exporter = Exporter::new(template_bytes.to_vec())?;
    if let Some(converter) = converter {
        exporter = exporter.with_converter(converter);
    }
    exporter.export_all(names, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use certgen_pptx::read_slides;
    use std::cell::Cell;
    use std::io::{Cursor, Read, Write};
    use zip::write::FileOptions;
    use zip::{ZipArchive, ZipWriter};

    fn template(text: &str) -> Vec<u8> {
        let slide = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:spPr><a:xfrm><a:off x="0" y="0"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:rPr lang="es-ES"/><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            text
        );
        let parts = [
            (
                "ppt/presentation.xml",
                r#"<p:presentation xmlns:p="p" xmlns:r="r"><p:sldIdLst><p:sldId id="256" r:id="rId2"/></p:sldIdLst></p:presentation>"#.to_string(),
            ),
            (
                "ppt/_rels/presentation.xml.rels",
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide1.xml"/></Relationships>"#.to_string(),
            ),
            ("ppt/slides/slide1.xml", slide),
        ];

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (path, content) in parts {
            writer.start_file(path, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    /// Converter double that prefixes the document and can fail on a given call.
    struct FakeConverter {
        available: bool,
        fail_on_call: Option<usize>,
        calls: Cell<usize>,
    }

    impl FakeConverter {
        fn new() -> Self {
            Self {
                available: true,
                fail_on_call: None,
                calls: Cell::new(0),
            }
        }
    }

    impl Converter for FakeConverter {
        fn is_available(&self) -> bool {
            self.available
        }

        fn convert(&self, document: &[u8], _target: OutputFormat) -> Result<Vec<u8>> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call == Some(call) {
                return Err(Error::ConversionFailed("converter exited with 1".to_string()));
            }
            let mut out = b"%PDF-".to_vec();
            out.extend_from_slice(document);
            Ok(out)
        }
    }

    #[test]
    fn test_entries_in_input_order() {
        let exporter = Exporter::new(template("Dear {{NOMBRE}},")).unwrap();
        let bytes = exporter.export_all(&["A B", "C"], OutputFormat::Native).unwrap();

        let entries = entries(&bytes);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Certificado_A_B.pptx", "Certificado_C.pptx"]);

        let first = read_slides(&entries[0].1).unwrap();
        assert_eq!(first[0].texts(), vec!["Dear A B,"]);
        let second = read_slides(&entries[1].1).unwrap();
        assert_eq!(second[0].texts(), vec!["Dear C,"]);
    }

    #[test]
    fn test_one_entry_per_name() {
        let names: Vec<String> = (0..7).map(|i| format!("Participant {}", i)).collect();
        let bytes = export_all(&template("{{NOMBRE}}"), &names, OutputFormat::Native, None).unwrap();
        assert_eq!(entries(&bytes).len(), 7);
    }

    #[test]
    fn test_empty_names_give_empty_archive() {
        let names: Vec<String> = Vec::new();
        let bytes = export_all(&template("{{NOMBRE}}"), &names, OutputFormat::Native, None).unwrap();
        assert!(entries(&bytes).is_empty());
    }

    #[test]
    fn test_whitespace_only_name() {
        let bytes = export_all(&template("{{NOMBRE}}"), &["  "], OutputFormat::Native, None).unwrap();
        assert_eq!(entries(&bytes)[0].0, "Certificado___.pptx");
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let bytes =
            export_all(&template("{{NOMBRE}}"), &["Ana", "Bo", "Ana"], OutputFormat::Native, None)
                .unwrap();
        let names: Vec<String> = entries(&bytes).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Certificado_Ana.pptx", "Certificado_Bo.pptx"]);
    }

    #[test]
    fn test_malformed_template_fails_before_export() {
        let result = Exporter::new(b"not a pptx".to_vec());
        assert!(matches!(result, Err(Error::MalformedTemplate(_))));
    }

    #[test]
    fn test_converter_unavailable_fails_before_any_name() {
        let converter = FakeConverter {
            available: false,
            ..FakeConverter::new()
        };
        let exporter = Exporter::new(template("{{NOMBRE}}"))
            .unwrap()
            .with_converter(&converter);

        let mut events = 0;
        let result = exporter.export_all_with(&["Ana"], OutputFormat::FixedLayout, |_| events += 1);

        assert!(matches!(result, Err(Error::ConverterUnavailable(_))));
        assert_eq!(events, 0);
        assert_eq!(converter.calls.get(), 0);
    }

    #[test]
    fn test_fixed_layout_without_converter() {
        let result = export_all(&template("{{NOMBRE}}"), &["Ana"], OutputFormat::FixedLayout, None);
        assert!(matches!(result, Err(Error::ConverterUnavailable(_))));
    }

    #[test]
    fn test_fixed_layout_export() {
        let converter = FakeConverter::new();
        let bytes = export_all(
            &template("{{NOMBRE}}"),
            &["Ana Li", "Bo"],
            OutputFormat::FixedLayout,
            Some(&converter as &dyn Converter),
        )
        .unwrap();

        let entries = entries(&bytes);
        assert_eq!(entries[0].0, "Certificado_Ana_Li.pdf");
        assert_eq!(entries[1].0, "Certificado_Bo.pdf");
        assert!(entries[0].1.starts_with(b"%PDF-"));
        assert_eq!(converter.calls.get(), 2);
    }

    #[test]
    fn test_conversion_failure_aborts_batch() {
        let converter = FakeConverter {
            fail_on_call: Some(2),
            ..FakeConverter::new()
        };
        let exporter = Exporter::new(template("{{NOMBRE}}"))
            .unwrap()
            .with_converter(&converter);

        let mut generated = Vec::new();
        let mut failed = None;
        let result = exporter.export_all_with(&["A", "B", "C"], OutputFormat::FixedLayout, |event| {
            match event {
                ExportEvent::Generated { filename, .. } => generated.push(filename.to_string()),
                ExportEvent::Failed { index, name, error } => {
                    failed = Some((index, name.to_string(), error.to_string()))
                }
                ExportEvent::Finished { .. } => panic!("batch should not finish"),
                ExportEvent::Started { .. } => {}
            }
        });

        let error = result.unwrap_err();
        assert!(matches!(error, Error::ConversionFailed(_)));
        assert_eq!(generated, vec!["Certificado_A.pdf"]);
        // the event carries the same error the batch returns
        assert_eq!(failed, Some((1, "B".to_string(), error.to_string())));
        assert_eq!(converter.calls.get(), 2);
    }

    #[test]
    fn test_events_for_successful_batch() {
        let exporter = Exporter::new(template("{{NOMBRE}}")).unwrap();
        let mut started = None;
        let mut finished = Vec::new();
        exporter
            .export_all_with(&["A", "B"], OutputFormat::Native, |event| match event {
                ExportEvent::Started { total } => started = Some(total),
                ExportEvent::Finished { entries } => finished = entries.to_vec(),
                _ => {}
            })
            .unwrap();

        assert_eq!(started, Some(2));
        assert_eq!(finished, vec!["Certificado_A.pptx", "Certificado_B.pptx"]);
    }

    #[test]
    fn test_available_formats() {
        let exporter = Exporter::new(template("{{NOMBRE}}")).unwrap();
        assert_eq!(exporter.available_formats(), vec![OutputFormat::Native]);

        let converter = FakeConverter::new();
        let exporter = exporter.with_converter(&converter);
        assert_eq!(
            exporter.available_formats(),
            vec![OutputFormat::Native, OutputFormat::FixedLayout]
        );
    }
}
