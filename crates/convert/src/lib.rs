//! Conversion of generated documents into a fixed-layout format.
//!
//! Conversion is delegated to an external program. The [`Converter`] trait is
//! what the export pipeline depends on; [`LibreOffice`] is the implementation
//! that shells out to `soffice`.

pub mod libreoffice;

pub use libreoffice::LibreOffice;

use certgen_core::{OutputFormat, Result};

/// Something that can turn a PPTX document into another format.
pub trait Converter {
    /// Whether the converter can run in this environment.
    ///
    /// Checked before an export starts, so that a missing converter is
    /// reported before any document is generated.
    fn is_available(&self) -> bool;

    /// Convert a PPTX document to `target`.
    fn convert(&self, document: &[u8], target: OutputFormat) -> Result<Vec<u8>>;
}
