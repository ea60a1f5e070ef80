//! Error types surfaced by the resolution pipeline.
//!
//! Only caller bugs reach the caller as a [`ResolveError`]. Provider and
//! network failures are absorbed inside the pipeline and simply
//! contribute no streams.

use thiserror::Error;

/// Errors returned from [`Resolver::resolve`](crate::Resolver::resolve).
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolve request contains no source records")]
    NoSourceRecords,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failures inside the obfuscation codec.
///
/// These never escape the crate's public codec functions, which degrade to
/// the original input or an empty list instead.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("invalid base64 ciphertext: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("no key fragments supplied")]
    EmptyKey,

    #[error("invalid hex key fragment: {0}")]
    KeyFragment(String),

    #[error("ciphertext length {0} is not a multiple of the AES block size")]
    BlockAlignment(usize),

    #[error("decrypted payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("decrypted payload is not a source list: {0}")]
    Json(#[from] serde_json::Error),
}
