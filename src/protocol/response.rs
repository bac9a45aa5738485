//! OK / ERR / EOF packet grammars and first-byte response discrimination
//! (spec §4.3 "Response discrimination", "OK.", "ERR.", "EOF.").
//!
//! Grounded on `mason-mariadb/src/protocol/packets/{ok,err,eof}.rs`.

use crate::error::{Error, Result};
use crate::io::PacketBuf;
use crate::protocol::status::ServerStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub insert_id: u64,
    pub status: ServerStatus,
    pub warning_count: u16,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    pub code: u16,
    pub sqlstate: [u8; 5],
    pub message: String,
}

impl ErrPacket {
    pub fn into_error(self) -> Error {
        Error::Server {
            code: self.code,
            sqlstate: self.sqlstate,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EofPacket {
    pub warning_count: u16,
    pub status: ServerStatus,
}

/// The decoded shape of the first packet of a command's response.
#[derive(Debug, Clone)]
pub enum ResponseHead {
    Ok(OkPacket),
    Err(ErrPacket),
    Eof(EofPacket),
    LocalInfile(String),
    ResultSetHeader(u64),
}

pub fn decode_response_head(payload: &[u8]) -> Result<ResponseHead> {
    match payload.first().copied() {
        None => Err(Error::protocol("empty response packet")),
        Some(0x00) => Ok(ResponseHead::Ok(decode_ok(payload)?)),
        Some(0xFF) => Ok(ResponseHead::Err(decode_err(payload)?)),
        Some(0xFE) if payload.len() <= 5 => Ok(ResponseHead::Eof(decode_eof(payload)?)),
        Some(0xFB) => {
            let mut buf = PacketBuf::new(&payload[1..]);
            let filename = buf.get_bytes_eof();
            Ok(ResponseHead::LocalInfile(
                String::from_utf8_lossy(filename).into_owned(),
            ))
        }
        Some(_) => {
            let mut buf = PacketBuf::new(payload);
            let count = buf
                .get_lenenc_int()?
                .ok_or_else(|| Error::protocol("result header field count is NULL"))?;
            Ok(ResponseHead::ResultSetHeader(count))
        }
    }
}

pub fn decode_ok(payload: &[u8]) -> Result<OkPacket> {
    let mut buf = PacketBuf::new(payload);
    let marker = buf.get_u8()?;
    if marker != 0x00 {
        return Err(Error::protocol(format!("expected OK marker, got {:#x}", marker)));
    }
    let affected_rows = buf.get_lenenc_int()?.unwrap_or(0);
    let insert_id = buf.get_lenenc_int()?.unwrap_or(0);
    let status = ServerStatus::from_bits_truncate(buf.get_u16()?);
    let warning_count = buf.get_u16()?;
    let info = String::from_utf8_lossy(buf.get_bytes_eof()).into_owned();
    Ok(OkPacket {
        affected_rows,
        insert_id,
        status,
        warning_count,
        info,
    })
}

pub fn decode_err(payload: &[u8]) -> Result<ErrPacket> {
    let mut buf = PacketBuf::new(payload);
    let marker = buf.get_u8()?;
    if marker != 0xFF {
        return Err(Error::protocol(format!("expected ERR marker, got {:#x}", marker)));
    }
    let code = buf.get_u16()?;

    let mut sqlstate = *b"00000";
    if buf.peek_u8() == Some(b'#') {
        buf.skip(1);
        let raw = buf.get_bytes(5)?;
        sqlstate.copy_from_slice(raw);
    }
    let message = String::from_utf8_lossy(buf.get_bytes_eof()).into_owned();
    Ok(ErrPacket { code, sqlstate, message })
}

pub fn decode_eof(payload: &[u8]) -> Result<EofPacket> {
    let mut buf = PacketBuf::new(payload);
    let marker = buf.get_u8()?;
    if marker != 0xFE {
        return Err(Error::protocol(format!("expected EOF marker, got {:#x}", marker)));
    }
    let warning_count = if buf.remaining() >= 2 { buf.get_u16()? } else { 0 };
    let status = if buf.remaining() >= 2 {
        ServerStatus::from_bits_truncate(buf.get_u16()?)
    } else {
        ServerStatus::empty()
    };
    Ok(EofPacket { warning_count, status })
}
