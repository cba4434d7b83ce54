pub mod machine;
pub mod mapper;
pub mod signals;
pub mod tokenize;

use encoding_rs::{Encoding, GBK};

use crate::decode;
use crate::error::ParseError;
use crate::record::{ExtractionResult, SurgeryRecord};

/// Extract one surgery case from an export buffer in the default legacy encoding.
pub fn extract(bytes: &[u8]) -> Result<SurgeryRecord, ParseError> {
    extract_with(bytes, GBK)
}

/// Pipeline: bytes → text → markup events → raw capture → schedule record.
pub fn extract_with(
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<SurgeryRecord, ParseError> {
    extract_raw_with(bytes, encoding).map(mapper::to_record)
}

/// Raw capture without renaming or age coercion, for callers that need to tell
/// a missing age from a literal zero.
pub fn extract_raw_with(
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<ExtractionResult, ParseError> {
    let text = decode::decode_with(bytes, encoding);
    machine::try_run(tokenize::Tokenizer::new(&text))
}

// ── Tests ──
