//! Field (column) descriptor packet (spec §4.3 "Field packet", §3 "Field
//! descriptor").
//!
//! Grounded on `mason-mariadb/src/protocol/packets/column_def.rs`.

use crate::error::Result;
use crate::io::PacketBuf;
use crate::protocol::column_type::ColumnType;

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u16 {
        const NOT_NULL       = 0x0001;
        const PRIMARY_KEY    = 0x0002;
        const UNIQUE_KEY     = 0x0004;
        const MULTIPLE_KEY   = 0x0008;
        const BLOB           = 0x0010;
        const UNSIGNED       = 0x0020;
        const ZEROFILL       = 0x0040;
        const BINARY         = 0x0080;
        const ENUM           = 0x0100;
        const AUTO_INCREMENT = 0x0200;
        const TIMESTAMP      = 0x0400;
        const SET            = 0x0800;
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub database: String,
    pub table: String,
    pub original_table: String,
    pub name: String,
    pub original_name: String,
    pub charset: u16,
    pub length: u32,
    pub column_type: ColumnType,
    pub flags: FieldFlags,
    pub decimals: u8,
    pub default: Option<Vec<u8>>,
    /// Running maximum observed value length in bytes (spec §4.6
    /// "`max_length` per field").
    pub max_length: u64,
}

impl Field {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = PacketBuf::new(payload);

        let _catalog = buf.get_lenenc_bytes()?;
        let database = lenenc_string(&mut buf)?;
        let table = lenenc_string(&mut buf)?;
        let original_table = lenenc_string(&mut buf)?;
        let name = lenenc_string(&mut buf)?;
        let original_name = lenenc_string(&mut buf)?;

        buf.skip(1); // filler, 0x0C
        let charset = buf.get_u16()?;
        let length = buf.get_u32()?;
        let column_type = ColumnType::from_u8(buf.get_u8()?)?;
        let flags = FieldFlags::from_bits_truncate(buf.get_u16()?);
        let decimals = buf.get_u8()?;
        buf.skip(2); // filler

        let default = if !buf.eof() {
            buf.get_lenenc_bytes()?.map(|b| b.to_vec())
        } else {
            None
        };

        Ok(Field {
            database,
            table,
            original_table,
            name,
            original_name,
            charset,
            length,
            column_type,
            flags,
            decimals,
            default,
            max_length: 0,
        })
    }

    /// Spec §3: "Derived: `is_num` flag forced on for decimal/tiny/short/
    /// long/float/double/longlong/int24, and for timestamp with length 8
    /// or 14."
    pub fn is_num(&self) -> bool {
        self.column_type.is_always_num()
            || (self.column_type == ColumnType::Timestamp && (self.length == 8 || self.length == 14))
    }

    /// Whether this column's LCS value is opaque binary data rather than
    /// charset-encoded text (spec.md:105 "BIT and binary-flagged ->
    /// binary").
    pub fn is_binary(&self) -> bool {
        self.flags.contains(FieldFlags::BINARY) || self.column_type == ColumnType::Bit
    }
}

fn lenenc_string(buf: &mut PacketBuf<'_>) -> Result<String> {
    Ok(buf
        .get_lenenc_bytes()?
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::PacketBufMut;

    fn sample_field_payload() -> Vec<u8> {
        let mut p = Vec::new();
        p.put_lenenc_bytes(Some(b"def"));
        p.put_lenenc_bytes(Some(b""));
        p.put_lenenc_bytes(Some(b"t"));
        p.put_lenenc_bytes(Some(b"t"));
        p.put_lenenc_bytes(Some(b"c"));
        p.put_lenenc_bytes(Some(b"c"));
        p.put_u8(0x0C);
        p.put_u16(33);
        p.put_u32(11);
        p.put_u8(0x03); // LONG
        p.put_u16(0);
        p.put_u8(0);
        p.put_u16(0);
        p
    }

    #[test]
    fn decodes_field_and_derives_is_num() {
        let payload = sample_field_payload();
        let field = Field::decode(&payload).unwrap();
        assert_eq!(field.name, "c");
        assert_eq!(field.column_type, ColumnType::Long);
        assert!(field.is_num());
    }

    #[test]
    fn binary_flag_marks_column_binary() {
        let mut payload = sample_field_payload();
        let field = Field::decode(&payload).unwrap();
        assert!(!field.is_binary());

        // flags(2) LE sit right after catalog/db/table/origtable/name/
        // origname lenenc-strings (4+1+2+2+2+2=13 bytes), filler(1),
        // charset(2), length(4), type(1) -> offset 21.
        let flags_offset = 21;
        payload[flags_offset] = 0x80; // BINARY flag, low byte
        let field = Field::decode(&payload).unwrap();
        assert!(field.is_binary());
    }
}
