//! Text-protocol row decoding (spec §3 "Row (text)", §4.6).
//!
//! Grounded on `mason-mariadb/src/protocol/packets/result_row.rs`'s text
//! branch.

use crate::error::Result;
use crate::io::PacketBuf;

/// Decode one text-mode row: an ordered sequence of nullable byte strings,
/// each an LCS (NULL = the `0xFB` LCB marker, spec §3 "Row (text)").
pub fn decode_text_row(payload: &[u8], column_count: usize) -> Result<Vec<Option<Vec<u8>>>> {
    let mut buf = PacketBuf::new(payload);
    let mut row = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let field = buf.get_lenenc_bytes()?.map(|b| b.to_vec());
        row.push(field);
    }
    Ok(row)
}
