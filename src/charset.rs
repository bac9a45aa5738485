//! Wire charset id -> (symbolic name, host encoding, is-binary) lookup
//! table (SPEC_FULL §2.1+ "Charset table").
//!
//! spec.md treats this as an externally supplied `Charset` directory; this
//! crate ships a small static table covering the charsets a modern default
//! install actually negotiates, grounded on the collation ids MySQL itself
//! assigns (`information_schema.COLLATIONS`), and returns a protocol error
//! for anything else per §4.5's "validate the host encoding is known".

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    pub id: u8,
    pub name: &'static str,
    pub is_binary: bool,
}

const CHARSETS: &[Charset] = &[
    Charset { id: 8, name: "latin1", is_binary: false },
    Charset { id: 11, name: "ascii", is_binary: false },
    Charset { id: 33, name: "utf8", is_binary: false },
    Charset { id: 45, name: "utf8mb4", is_binary: false },
    Charset { id: 46, name: "utf8mb4_bin", is_binary: false },
    Charset { id: 63, name: "binary", is_binary: true },
    Charset { id: 83, name: "utf8_bin", is_binary: false },
    Charset { id: 224, name: "utf8mb4_unicode_ci", is_binary: false },
    Charset { id: 255, name: "utf8mb4_0900_ai_ci", is_binary: false },
];

/// Default charset this driver negotiates when the caller configures none
/// (`utf8mb4`, id 45).
pub const DEFAULT_CHARSET_ID: u8 = 45;

pub fn by_id(id: u8) -> Result<Charset> {
    CHARSETS
        .iter()
        .copied()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::protocol(format!("unknown charset id {}", id)))
}

pub fn by_name(name: &str) -> Result<Charset> {
    CHARSETS
        .iter()
        .copied()
        .find(|c| c.name == name)
        .ok_or_else(|| Error::client(format!("unknown charset name `{}`", name)))
}

impl Charset {
    /// Decode wire bytes for a non-binary column through this charset
    /// (spec.md:105 "decoded through the connection charset"). `latin1` is
    /// decoded byte-for-byte (its code points map 1:1 onto Unicode's first
    /// 256); every other charset this table carries is a UTF-8 superset, so
    /// a lossy UTF-8 decode is exact for well-formed input.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if self.name == "latin1" {
            bytes.iter().map(|&b| b as char).collect()
        } else {
            String::from_utf8_lossy(bytes).into_owned()
        }
    }

    /// Encode outgoing SQL text through this charset (spec.md:128
    /// "`prepare(sql)` converts the SQL through the connection charset" —
    /// applied to `query()` as well since both send SQL as command bytes).
    /// `latin1` transcodes each `char` to its single byte, substituting `?`
    /// for anything outside it; every other charset is UTF-8 already.
    pub fn encode(&self, sql: &str) -> Vec<u8> {
        if self.name == "latin1" {
            sql.chars().map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' }).collect()
        } else {
            sql.as_bytes().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_utf8_by_id() {
        let c = by_id(33).unwrap();
        assert_eq!(c.name, "utf8");
        assert!(!c.is_binary);
    }

    #[test]
    fn unknown_id_is_protocol_error() {
        assert!(by_id(250).is_err());
    }

    #[test]
    fn binary_charset_is_flagged() {
        let c = by_id(63).unwrap();
        assert!(c.is_binary);
    }

    #[test]
    fn latin1_decode_maps_high_bytes_one_to_one() {
        let c = by_name("latin1").unwrap();
        assert_eq!(c.decode(&[0xE9]), "\u{e9}");
    }

    #[test]
    fn utf8mb4_decode_is_utf8_lossy() {
        let c = by_name("utf8mb4").unwrap();
        assert_eq!(c.decode("caf\u{e9}".as_bytes()), "caf\u{e9}");
    }

    #[test]
    fn latin1_encode_transcodes_back_to_single_bytes() {
        let c = by_name("latin1").unwrap();
        assert_eq!(c.encode("\u{e9}"), vec![0xE9]);
    }
}
