//! Human-transportable backup codes.
//!
//! A backup code is `VM<version>:<payload>`:
//!
//! - version 5 (current): payload is the [`DeflateCodec`] transport string
//! - version 1 (legacy): payload is base64 of the UTF-8 JSON document
//!
//! Codes pasted by hand are normalised before decoding: whitespace and
//! surrounding quotes are dropped, either base64 alphabet is accepted and
//! missing padding is tolerated. Input without a marker is tried as a legacy
//! payload.

use crate::codec::{decode_base64, decode_json, Codec, DeflateCodec};
use crate::error::{DecodeError, Error, Result};
use crate::Aggregate;

/// Marker every backup code starts with.
pub const BACKUP_MARKER: &str = "VM";

/// Version written by [`export_code`].
pub const BACKUP_FORMAT_VERSION: u32 = 5;

/// Oldest version still accepted.
pub const LEGACY_BACKUP_VERSION: u32 = 1;

/// Produce a backup code for `aggregate`.
pub fn export_code(aggregate: &Aggregate) -> Result<String> {
    let payload = DeflateCodec.encode(aggregate)?;
    Ok(format!(
        "{}{}:{}",
        BACKUP_MARKER, BACKUP_FORMAT_VERSION, payload
    ))
}

/// Parse a backup code produced by this or an earlier release.
pub fn parse_code(input: &str) -> Result<Aggregate> {
    let cleaned = clean_input(input);
    if cleaned.is_empty() {
        return Err(Error::EmptyBackup);
    }

    let (version, payload) = split_marker(&cleaned).unwrap_or((LEGACY_BACKUP_VERSION, &cleaned));
    if payload.is_empty() {
        return Err(Error::EmptyBackup);
    }

    match version {
        BACKUP_FORMAT_VERSION => Ok(DeflateCodec.decode(payload)?),
        LEGACY_BACKUP_VERSION => Ok(decode_legacy(payload)?),
        found => Err(Error::UnsupportedBackupVersion {
            found,
            max: BACKUP_FORMAT_VERSION,
        }),
    }
}

fn decode_legacy(payload: &str) -> std::result::Result<Aggregate, DecodeError> {
    let bytes = decode_base64(payload)?;
    let json = String::from_utf8(bytes)
        .map_err(|e| DecodeError::Malformed(format!("invalid UTF-8: {}", e)))?;
    decode_json(&json)
}

/// Drop whitespace anywhere and quotes around the code.
fn clean_input(input: &str) -> String {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .trim_matches(|c| matches!(c, '"' | '\'' | '`' | '«' | '»' | '“' | '”'))
        .to_string()
}

/// `VM<digits>:<rest>` -> `(digits, rest)`.
fn split_marker(code: &str) -> Option<(u32, &str)> {
    let rest = code.strip_prefix(BACKUP_MARKER)?;
    let (version, payload) = rest.split_once(':')?;
    if version.is_empty() || !version.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((version.parse().ok()?, payload))
}
