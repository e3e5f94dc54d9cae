//! XLSX (Office Open XML) backend for reading participant lists.
//!
//! Reads one worksheet of a workbook: the first row names the columns and
//! every following row is a participant.

pub mod parser;

pub use parser::ParticipantReader;
