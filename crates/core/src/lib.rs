//! Core domain types, error taxonomy, and output naming for generating
//! certificates from a presentation template.

pub mod error;
pub mod naming;
pub mod types;

pub use error::{Error, Result};
pub use naming::{certificate_filename, filesystem_safe, FILENAME_PREFIX};
pub use types::{ExportSummary, ExtractedSlide, OutputFormat, ParticipantList, SlideText};
