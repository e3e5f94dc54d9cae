//! PPTX (Office Open XML) template handling for certificate generation.
//!
//! Replaces the `{{NOMBRE}}` placeholder in a template's text runs and reads
//! back the visible text of a presentation.

mod package;
pub mod reader;
pub mod template;

#[cfg(test)]
mod fixtures;

pub use reader::read_slides;
pub use template::{substitute, Template, MARKER};
