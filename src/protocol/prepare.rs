//! Prepared-statement packet grammars: Prepare-OK, `STMT_EXECUTE` request
//! encoding, and binary result-row decoding (spec §4.3 "Prepare-OK.",
//! "Execute.", §3 "Row (binary)").
//!
//! Grounded on `mason-mariadb/src/protocol/packets/result_row.rs` (binary
//! row null-bitmap handling) and `com_query.rs`-style command encoders,
//! generalised to the prepared-statement wire shape.

use crate::error::{Error, Result};
use crate::io::{PacketBuf, PacketBufMut};
use crate::protocol::column::Field;
use crate::protocol::column_type::ColumnType;
use crate::protocol::command::CommandCode;
use crate::protocol::value::{decode_binary_value, encode_param, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareOk {
    pub statement_id: u32,
    pub field_count: u16,
    pub param_count: u16,
    pub warning_count: u16,
}

impl PrepareOk {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = PacketBuf::new(payload);
        let marker = buf.get_u8()?;
        if marker != 0x00 {
            return Err(Error::protocol(format!(
                "expected prepare-ok marker, got {:#x}",
                marker
            )));
        }
        let statement_id = buf.get_u32()?;
        let field_count = buf.get_u16()?;
        let param_count = buf.get_u16()?;
        buf.skip(1); // filler
        let warning_count = buf.get_u16()?;
        Ok(PrepareOk {
            statement_id,
            field_count,
            param_count,
            warning_count,
        })
    }
}

/// `sql` is already charset-encoded, mirroring `build_query_packet` (spec.md:128).
pub fn build_prepare_packet(sql: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(sql.len() + 1);
    buf.put_u8(CommandCode::StmtPrepare as u8);
    buf.put_bytes(sql);
    buf
}

pub fn build_close_packet(statement_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    buf.put_u8(CommandCode::StmtClose as u8);
    buf.put_u32(statement_id);
    buf
}

/// Build a `STMT_EXECUTE` request (spec §4.3 "Execute.").
pub fn build_execute_packet(statement_id: u32, params: &[Value]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(CommandCode::StmtExecute as u8);
    buf.put_u32(statement_id);
    buf.put_u8(0); // flags: no cursor
    buf.put_u32(1); // iteration count, always 1

    if params.is_empty() {
        return buf;
    }

    let bitmap_len = (params.len() + 7) / 8;
    let mut bitmap = vec![0u8; bitmap_len];
    for (i, p) in params.iter().enumerate() {
        if p.is_null() {
            bitmap[i / 8] |= 1 << (i % 8);
        }
    }
    buf.put_bytes(&bitmap);
    buf.put_u8(1); // new-params-bound flag, always 1

    let mut types = Vec::with_capacity(params.len() * 2);
    let mut values = Vec::new();
    for p in params {
        let (ty, flag) = encode_param(&mut values, p);
        types.push(ty);
        types.push(flag);
    }
    buf.put_bytes(&types);
    buf.put_bytes(&values);
    buf
}

/// Decode a binary-protocol row (spec §3 "Row (binary)"): a `0x00` prefix,
/// a null bitmap offset by 2 bits, then one binary value per non-null
/// column.
pub fn decode_binary_row(payload: &[u8], fields: &[Field]) -> Result<Vec<Value>> {
    let mut buf = PacketBuf::new(payload);
    let marker = buf.get_u8()?;
    if marker != 0x00 {
        return Err(Error::protocol(format!(
            "expected binary row prefix 0x00, got {:#x}",
            marker
        )));
    }

    let bitmap_len = (fields.len() + 7 + 2) / 8;
    let bitmap = buf.get_bytes(bitmap_len)?;

    let mut row = Vec::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        let bit = i + 2;
        let is_null = bitmap[bit / 8] & (1 << (bit % 8)) != 0;
        if is_null {
            row.push(Value::Null);
            continue;
        }
        let unsigned = field.flags.contains(crate::protocol::column::FieldFlags::UNSIGNED);
        row.push(decode_binary_value(&mut buf, field.column_type, unsigned)?);
    }
    Ok(row)
}
