//! Reversible transforms for provider-obfuscated source URLs.
//!
//! Two schemes show up in upstream responses:
//!
//! - **XOR-hex**: `-` prefixed strings whose trailing hex payload is XORed
//!   with a single-byte constant ([`decode_xor`]).
//! - **AES-CBC embed sources**: a base64 ciphertext returned by an embed
//!   player's `getSources` endpoint, decrypted with a key assembled from
//!   numeric fragments found in the player's minified script
//!   ([`extract_key_fragments`], [`decrypt_aes_sources`]).
//!
//! Neither function fails: a payload that cannot be decoded degrades to the
//! original input or to an empty list.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use cbc::{
    cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit},
    Decryptor,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::CodecError;

/// Constant every byte of an XOR-obfuscated URL is combined with.
pub const XOR_KEY: u8 = 56;

/// AES-256 key length in bytes.
const KEY_LEN: usize = 32;

/// AES block size in bytes.
const AES_BLOCK_SIZE: usize = 16;

/// `case 0x1f: a = b, c = d;` switch arms that hold key fragment variables.
static CASE_ARM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"case\s*0x[0-9a-fA-F]+:\s*\w+\s*=\s*(\w+)\s*,\s*\w+\s*=\s*(\w+);")
        .expect("static regex")
});

static HEX_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:0x)?[0-9a-fA-F]+$").expect("static regex"));

/// Decode an XOR-hex obfuscated source URL.
///
/// Applies only when `raw` starts with `-`: the text after the final `-` is
/// hex-decoded, every byte is XORed with [`XOR_KEY`], and the result is read
/// as UTF-8 with lossy replacement. Odd-length or non-hex payloads return
/// `raw` unchanged.
#[must_use]
pub fn decode_xor(raw: &str) -> String {
    if !raw.starts_with('-') {
        return raw.to_string();
    }

    let payload = raw.rsplit('-').next().unwrap_or_default();
    if payload.len() % 2 != 0 {
        debug!(payload_len = payload.len(), "odd-length XOR payload, leaving as-is");
        return raw.to_string();
    }

    match hex::decode(payload) {
        Ok(bytes) => {
            let plain: Vec<u8> = bytes.into_iter().map(|b| b ^ XOR_KEY).collect();
            String::from_utf8_lossy(&plain).into_owned()
        }
        Err(e) => {
            debug!(error = %e, "XOR payload is not hex, leaving as-is");
            raw.to_string()
        }
    }
}

/// A pair of hex literals referenced by one `case 0x..:` arm of the player
/// script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFragment {
    pub first: String,
    pub second: String,
}

impl KeyFragment {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

/// Scrape key fragments from a provider's minified player script.
///
/// Each `case 0x..: v1 = X, v2 = Y;` arm names two variables; each variable
/// is resolved to the hex literal it is assigned elsewhere in the script
/// (`,X=0x1a`). Arms touching `partKey` are skipped. Returns an empty list
/// when the script shape does not match.
#[must_use]
pub fn extract_key_fragments(script: &str) -> Vec<KeyFragment> {
    let mut fragments = Vec::new();

    for caps in CASE_ARM_RE.captures_iter(script) {
        let (first_var, second_var) = (&caps[1], &caps[2]);
        if first_var == "partKey" || second_var == "partKey" {
            continue;
        }

        match (
            resolve_hex_literal(first_var, script),
            resolve_hex_literal(second_var, script),
        ) {
            (Some(first), Some(second)) => fragments.push(KeyFragment { first, second }),
            _ => debug!(first_var, second_var, "unresolved key fragment variable"),
        }
    }

    fragments
}

fn resolve_hex_literal(var: &str, script: &str) -> Option<String> {
    if HEX_LITERAL_RE.is_match(var) && var.starts_with("0x") {
        return Some(var.trim_start_matches("0x").to_string());
    }

    let pattern = format!(r",{}=((?:0x)?[0-9a-fA-F]+)", regex::escape(var));
    let re = Regex::new(&pattern).ok()?;
    re.captures(script)
        .map(|caps| caps[1].trim_start_matches("0x").to_string())
}

/// Assemble the 32-byte AES key from fragment pairs.
///
/// Every hex value is rendered in decimal and the renderings are
/// concatenated; the result is truncated to 32 bytes or right-padded with
/// NUL bytes.
pub fn derive_key(fragments: &[KeyFragment]) -> Result<[u8; KEY_LEN], CodecError> {
    if fragments.is_empty() {
        return Err(CodecError::EmptyKey);
    }

    let mut material = String::new();
    for fragment in fragments {
        for hex_value in [&fragment.first, &fragment.second] {
            let value = u64::from_str_radix(hex_value.trim_start_matches("0x"), 16)
                .map_err(|_| CodecError::KeyFragment(hex_value.clone()))?;
            material.push_str(&value.to_string());
        }
    }

    let mut key = [0u8; KEY_LEN];
    let bytes = material.as_bytes();
    let len = bytes.len().min(KEY_LEN);
    key[..len].copy_from_slice(&bytes[..len]);
    Ok(key)
}

/// One decrypted embed source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceFile {
    #[serde(rename = "file")]
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// Decrypt an AES-CBC embed source list.
///
/// Returns an empty list on any failure (bad base64, bad key, non-JSON
/// plaintext); the failure is logged at `warn`.
#[must_use]
pub fn decrypt_aes_sources(ciphertext: &str, fragments: &[KeyFragment]) -> Vec<SourceFile> {
    match try_decrypt_aes_sources(ciphertext, fragments) {
        Ok(sources) => sources,
        Err(e) => {
            warn!(error = %e, "embed source decryption failed");
            Vec::new()
        }
    }
}

/// Fallible form of [`decrypt_aes_sources`].
pub fn try_decrypt_aes_sources(
    ciphertext: &str,
    fragments: &[KeyFragment],
) -> Result<Vec<SourceFile>, CodecError> {
    let mut buf = BASE64.decode(ciphertext.trim())?;
    if buf.is_empty() || buf.len() % AES_BLOCK_SIZE != 0 {
        return Err(CodecError::BlockAlignment(buf.len()));
    }

    let key = derive_key(fragments)?;
    let iv = [0u8; AES_BLOCK_SIZE];

    let len = buf.len();
    let plain = Decryptor::<Aes256>::new((&key).into(), (&iv).into())
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| CodecError::BlockAlignment(len))?;

    // PKCS#7 pad bytes are all below 0x11; strip them with any trailing whitespace.
    let end = plain
        .iter()
        .rposition(|&b| b > 0x10 && !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);

    let text = String::from_utf8(plain[..end].to_vec())?;
    let sources: Vec<SourceFile> = serde_json::from_str(&text)?;
    Ok(sources)
}
