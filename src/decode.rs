use std::borrow::Cow;

use encoding_rs::{Encoding, GBK};
use tracing::warn;

/// Label the hospital system's exports are declared with. WHATWG maps it to GBK.
pub const DEFAULT_LABEL: &str = "gb2312";

/// Resolve an encoding label, falling back to GBK for labels nobody knows.
pub fn resolve(label: &str) -> &'static Encoding {
    match Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!(label, "unknown encoding label, falling back to GBK");
            GBK
        }
    }
}

/// Decode an export buffer with the default legacy encoding.
pub fn decode(bytes: &[u8]) -> Cow<'_, str> {
    decode_with(bytes, GBK)
}

/// Decode `bytes` as `encoding`. Malformed sequences become U+FFFD; this never fails.
/// A BOM is not sniffed: the exports are always in one fixed encoding.
pub fn decode_with<'a>(bytes: &'a [u8], encoding: &'static Encoding) -> Cow<'a, str> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        warn!(
            encoding = encoding.name(),
            bytes = bytes.len(),
            "undecodable byte sequences replaced"
        );
    }
    text
}
