//! Surgical case extraction from hospital information system exports.
//!
//! The exports are GBK-encoded markup in which each value is identified by what
//! precedes it: a custom container tag, a field attribute, or a label such as
//! "床号:". [`extract`] runs a single streaming pass and returns a
//! [`SurgeryRecord`]; fields the document never signals stay empty.

pub mod db;
pub mod decode;
pub mod error;
pub mod parser;
pub mod record;
pub mod settings;

pub use error::ParseError;
pub use parser::{extract, extract_raw_with, extract_with};
pub use record::{ExtractionResult, SurgeryRecord};
