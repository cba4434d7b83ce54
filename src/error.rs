use thiserror::Error;

/// Fatal extraction failure. Missing fields are never reported here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The tokenizer could not read the decoded text as markup.
    #[error("malformed markup at byte {position}: {message}")]
    Markup { position: u64, message: String },
}
