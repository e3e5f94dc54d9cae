//! Batch export of personalized certificates.
//!
//! Renders the template once per participant, optionally converts each
//! document, and collects everything into a single ZIP archive.

pub mod archive;
pub mod exporter;

pub use archive::OutputArchive;
pub use exporter::{
    available_formats, export_all, ExportEvent, Exporter, ARCHIVE_CONTENT_TYPE, ARCHIVE_FILENAME,
};
