//! Transport encodings for the aggregate.
//!
//! Two strategies share one contract: `decode(encode(a)) == a`.
//!
//! - [`JsonCodec`]: plain JSON text, used by the durable local store.
//! - [`DeflateCodec`]: JSON, raw-deflated, then base64 (URL-safe alphabet,
//!   no padding). The output is pure ASCII, which is what the remote store
//!   and the clipboard reliably carry.

use crate::error::{DecodeError, Error, Result};
use crate::schema::validate_document;
use crate::Aggregate;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine as _;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

/// URL-safe base64 that writes no padding and accepts input with or without it.
pub const TRANSPORT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A reversible aggregate <-> string encoding.
pub trait Codec: Send + Sync {
    fn kind(&self) -> CodecKind;

    fn encode(&self, aggregate: &Aggregate) -> Result<String>;

    fn decode(&self, input: &str) -> std::result::Result<Aggregate, DecodeError>;
}

/// Identifies a codec in persisted metadata and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    /// Plain JSON. The default, because metadata written before compression
    /// existed carries no codec tag.
    #[default]
    Json,
    Deflate,
}

impl CodecKind {
    pub fn codec(self) -> &'static dyn Codec {
        match self {
            CodecKind::Json => &JsonCodec,
            CodecKind::Deflate => &DeflateCodec,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CodecKind::Json => "json",
            CodecKind::Deflate => "deflate",
        }
    }
}

impl std::fmt::Display for CodecKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CodecKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(CodecKind::Json),
            "deflate" => Ok(CodecKind::Deflate),
            other => Err(format!("unknown codec: {}", other)),
        }
    }
}

/// Plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Json
    }

    fn encode(&self, aggregate: &Aggregate) -> Result<String> {
        serde_json::to_string(aggregate).map_err(|e| Error::Encode(e.to_string()))
    }

    fn decode(&self, input: &str) -> std::result::Result<Aggregate, DecodeError> {
        decode_json(input)
    }
}

/// Deflate + base64.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateCodec;

impl Codec for DeflateCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Deflate
    }

    fn encode(&self, aggregate: &Aggregate) -> Result<String> {
        let json = serde_json::to_vec(aggregate).map_err(|e| Error::Encode(e.to_string()))?;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&json)
            .map_err(|e| Error::Encode(format!("deflate error: {}", e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::Encode(format!("deflate error: {}", e)))?;
        Ok(TRANSPORT_BASE64.encode(compressed))
    }

    fn decode(&self, input: &str) -> std::result::Result<Aggregate, DecodeError> {
        let bytes = decode_base64(input)?;
        let mut decoder = DeflateDecoder::new(bytes.as_slice());
        let mut json = String::new();
        decoder
            .read_to_string(&mut json)
            .map_err(|e| DecodeError::Malformed(format!("inflate error: {}", e)))?;
        decode_json(&json)
    }
}

/// Decode base64 in either alphabet, with or without padding.
pub fn decode_base64(input: &str) -> std::result::Result<Vec<u8>, DecodeError> {
    let normalized: String = input
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    TRANSPORT_BASE64
        .decode(normalized)
        .map_err(|e| DecodeError::Malformed(format!("base64 error: {}", e)))
}

/// Parse JSON text, check the document shape, then deserialize.
pub fn decode_json(input: &str) -> std::result::Result<Aggregate, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_str(input).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    validate_document(&value)?;
    serde_json::from_value(value).map_err(|e| DecodeError::SchemaMismatch(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{CustomWord, WordProgress, WordStatus};
    use proptest::prelude::*;

    fn sample() -> Aggregate {
        let mut agg = Aggregate {
            xp: 120,
            streak: 3,
            user_name: "Ёжик 🦔".into(),
            photo_url: "https://example.com/a.png".into(),
            last_local_update: 1_706_745_600_000,
            ..Default::default()
        };
        agg.word_progress.insert(
            "a1_cat".into(),
            WordProgress {
                interval: 3,
                ease_factor: 2.35,
                status: WordStatus::Mastered,
                next_review_date: 1_706_745_600_000 + 3 * 86_400_000,
                difficulty: Some(0.1),
                stability: None,
            },
        );
        agg.word_comments
            .insert("a1_cat".into(), "кошка — «cat»\nline two".into());
        agg.used_promo_codes.insert("WELCOME".into());
        agg.custom_words.push(CustomWord {
            id: "custom_1".into(),
            term: "naïve".into(),
            ..Default::default()
        });
        agg
    }

    #[test]
    fn json_roundtrip() {
        let agg = sample();
        let encoded = JsonCodec.encode(&agg).unwrap();
        assert_eq!(JsonCodec.decode(&encoded).unwrap(), agg);
    }

    #[test]
    fn deflate_roundtrip_is_ascii() {
        let agg = sample();
        let encoded = DeflateCodec.encode(&agg).unwrap();
        assert!(encoded.is_ascii());
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(DeflateCodec.decode(&encoded).unwrap(), agg);
    }

    #[test]
    fn deflate_accepts_standard_alphabet_and_padding() {
        let agg = sample();
        let encoded = DeflateCodec.encode(&agg).unwrap();
        let standard: String = encoded
            .chars()
            .map(|c| match c {
                '-' => '+',
                '_' => '/',
                other => other,
            })
            .collect();
        let padded = format!("{}{}", standard, "=".repeat((4 - standard.len() % 4) % 4));
        assert_eq!(DeflateCodec.decode(&padded).unwrap(), agg);
    }

    #[test]
    fn empty_aggregate_roundtrip() {
        let agg = Aggregate::default();
        for kind in [CodecKind::Json, CodecKind::Deflate] {
            let codec = kind.codec();
            let encoded = codec.encode(&agg).unwrap();
            assert_eq!(codec.decode(&encoded).unwrap(), agg, "codec {}", kind);
        }
    }

    #[test]
    fn malformed_inputs() {
        assert!(matches!(
            JsonCodec.decode("{not json"),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            DeflateCodec.decode("!!!"),
            Err(DecodeError::Malformed(_))
        ));
        // Valid base64, but not a deflate stream.
        assert!(matches!(
            DeflateCodec.decode("aGVsbG8gd29ybGQ"),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn schema_mismatch_on_foreign_json() {
        assert!(matches!(
            JsonCodec.decode(r#"{"hello": "world"}"#),
            Err(DecodeError::SchemaMismatch(_))
        ));
        assert!(matches!(
            JsonCodec.decode(r#"{"xp": 1, "wordProgress": {"a": {"status": "legendary"}}}"#),
            Err(DecodeError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn codec_kind_parsing() {
        assert_eq!("json".parse::<CodecKind>().unwrap(), CodecKind::Json);
        assert_eq!(" Deflate ".parse::<CodecKind>().unwrap(), CodecKind::Deflate);
        assert!("zstd".parse::<CodecKind>().is_err());
        assert_eq!(serde_json::to_string(&CodecKind::Deflate).unwrap(), "\"deflate\"");
    }

    proptest! {
        #[test]
        fn unicode_text_roundtrips(
            name in "\\PC*",
            comment in "\\PC*",
            xp in 0u64..1_000_000,
            ease in 1.3f64..4.0,
        ) {
            let mut agg = Aggregate { xp, user_name: name, ..Default::default() };
            agg.word_comments.insert("w".into(), comment);
            agg.word_progress.insert("w".into(), WordProgress { ease_factor: ease, ..Default::default() });

            for kind in [CodecKind::Json, CodecKind::Deflate] {
                let codec = kind.codec();
                let encoded = codec.encode(&agg).unwrap();
                prop_assert_eq!(codec.decode(&encoded).unwrap(), agg.clone());
            }
        }
    }
}
