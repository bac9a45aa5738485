//! Binary protocol value codec (spec §4.4) and the `Time` value (spec §3
//! "Time value").
//!
//! Grounded on `mason-mariadb/src/protocol/packets/result_row.rs`'s
//! per-type binary decoding, generalised to the full type table and to
//! encoding (for `STMT_EXECUTE` parameters).

use crate::error::{Error, Result};
use crate::io::{PacketBuf, PacketBufMut};
use crate::protocol::column_type::ColumnType;

/// A MySQL date/time/duration value (spec §3 "Time value").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MySqlTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u32,
    pub minute: u8,
    pub second: u8,
    pub neg: bool,
    pub microseconds: u32,
}

impl MySqlTime {
    /// Whether this is a zero date (`0000-00-00`), which renders as a
    /// signed `HH:MM:SS` duration rather than a calendar date.
    pub fn is_zero_date(&self) -> bool {
        self.year == 0 && self.month == 0 && self.day == 0
    }
}

impl std::fmt::Display for MySqlTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_zero_date() {
            let sign = if self.neg { "-" } else { "" };
            write!(f, "{}{:02}:{:02}:{:02}", sign, self.hour, self.minute, self.second)
        } else {
            write!(
                f,
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute, self.second
            )
        }
    }
}

/// A decoded or to-be-encoded column value (spec §9 "tagged variant over
/// the column-type set").
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Signed(i64),
    Unsigned(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Time(MySqlTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Best-effort integer view: numeric variants convert directly, text
    /// (incl. text-protocol numeric columns, which arrive as
    /// `Value::Bytes` ASCII digits) is parsed with `atoi`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Signed(v) => Some(*v),
            Value::Unsigned(v) => i64::try_from(*v).ok(),
            Value::Bytes(b) => atoi::atoi::<i64>(b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Renders a numeric value back to its ASCII text form using `itoa`,
    /// the inverse of the `atoi` parse `as_i64` does for text-protocol
    /// columns.
    pub fn to_text(&self) -> String {
        let mut buf = itoa::Buffer::new();
        match self {
            Value::Null => String::new(),
            Value::Signed(v) => buf.format(*v).to_string(),
            Value::Unsigned(v) => buf.format(*v).to_string(),
            Value::Float(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            Value::Time(t) => t.to_string(),
        }
    }
}

/// Decode one binary-protocol value for `column_type`, consuming it from
/// `buf`. `unsigned` comes from the field's `UNSIGNED` flag.
pub fn decode_binary_value(
    buf: &mut PacketBuf<'_>,
    column_type: ColumnType,
    unsigned: bool,
) -> Result<Value> {
    use ColumnType::*;
    Ok(match column_type {
        Tiny => {
            let v = buf.get_u8()?;
            if unsigned {
                Value::Unsigned(v as u64)
            } else {
                Value::Signed(v as i8 as i64)
            }
        }
        Short | Year => {
            let v = buf.get_u16()?;
            if unsigned {
                Value::Unsigned(v as u64)
            } else {
                Value::Signed(v as i16 as i64)
            }
        }
        Long | Int24 => {
            let v = buf.get_u32()?;
            if unsigned {
                Value::Unsigned(v as u64)
            } else {
                Value::Signed(v as i32 as i64)
            }
        }
        LongLong => {
            let v = buf.get_u64()?;
            if unsigned {
                Value::Unsigned(v)
            } else {
                Value::Signed(v as i64)
            }
        }
        Float => Value::Float(buf.get_f32()?),
        Double => Value::Double(buf.get_f64()?),
        Decimal | NewDecimal | VarChar | VarString | String | TinyBlob | MediumBlob | LongBlob
        | Blob | Bit | Enum | Set | Geometry => {
            let bytes = buf
                .get_lenenc_bytes()?
                .ok_or_else(|| Error::protocol("unexpected NULL value for non-null column"))?;
            Value::Bytes(bytes.to_vec())
        }
        Date | DateTime | Timestamp => Value::Time(decode_binary_date(buf)?),
        Time => Value::Time(decode_binary_time(buf)?),
        Null => Value::Null,
        NewDate => return Err(Error::protocol("NEWDATE is not sent over the wire")),
    })
}

fn decode_binary_date(buf: &mut PacketBuf<'_>) -> Result<MySqlTime> {
    let len = buf.get_u8()?;
    let mut t = MySqlTime::default();
    if len == 0 {
        return Ok(t);
    }
    t.year = buf.get_u16()?;
    t.month = buf.get_u8()?;
    t.day = buf.get_u8()?;
    if len >= 7 {
        t.hour = buf.get_u8()? as u32;
        t.minute = buf.get_u8()?;
        t.second = buf.get_u8()?;
    }
    if len >= 11 {
        t.microseconds = buf.get_u32()?;
    }
    Ok(t)
}

fn decode_binary_time(buf: &mut PacketBuf<'_>) -> Result<MySqlTime> {
    let len = buf.get_u8()?;
    let mut t = MySqlTime::default();
    if len == 0 {
        return Ok(t);
    }
    t.neg = buf.get_u8()? != 0;
    let days = buf.get_u32()?;
    let hour = buf.get_u8()? as u32;
    t.minute = buf.get_u8()?;
    t.second = buf.get_u8()?;
    t.hour = days * 24 + hour;
    if len >= 12 {
        t.microseconds = buf.get_u32()?;
    }
    Ok(t)
}

/// Encode a parameter value for `STMT_EXECUTE` (spec §4.4 "Parameter
/// encoding is the same mapping inverted"). Returns the column-type byte
/// pair `(type, unsigned_flag)` the execute packet's type block needs,
/// alongside the encoded bytes appended to `out`.
pub fn encode_param(out: &mut Vec<u8>, value: &Value) -> (u8, u8) {
    match value {
        Value::Null => (ColumnType::Null.as_u8(), 0),
        Value::Signed(v) => {
            out.put_u64(*v as u64);
            (ColumnType::LongLong.as_u8(), 0)
        }
        Value::Unsigned(v) => {
            out.put_u64(*v);
            (ColumnType::LongLong.as_u8(), 0x80)
        }
        Value::Float(v) => {
            out.put_f64(*v as f64);
            (ColumnType::Double.as_u8(), 0)
        }
        Value::Double(v) => {
            out.put_f64(*v);
            (ColumnType::Double.as_u8(), 0)
        }
        Value::Bytes(b) => {
            out.put_lenenc_bytes(Some(b));
            (ColumnType::VarString.as_u8(), 0)
        }
        Value::Time(t) => {
            encode_datetime(out, t);
            (ColumnType::DateTime.as_u8(), 0)
        }
    }
}

fn encode_datetime(out: &mut Vec<u8>, t: &MySqlTime) {
    if t.is_zero_date() && t.hour == 0 && t.minute == 0 && t.second == 0 && t.microseconds == 0 {
        out.put_u8(0);
        return;
    }
    let has_time = t.hour != 0 || t.minute != 0 || t.second != 0 || t.microseconds != 0;
    if t.microseconds != 0 {
        out.put_u8(11);
        out.put_u16(t.year);
        out.put_u8(t.month);
        out.put_u8(t.day);
        out.put_u8(t.hour as u8);
        out.put_u8(t.minute);
        out.put_u8(t.second);
        out.put_u32(t.microseconds);
    } else if has_time {
        out.put_u8(7);
        out.put_u16(t.year);
        out.put_u8(t.month);
        out.put_u8(t.day);
        out.put_u8(t.hour as u8);
        out.put_u8(t.minute);
        out.put_u8(t.second);
    } else {
        out.put_u8(4);
        out.put_u16(t.year);
        out.put_u8(t.month);
        out.put_u8(t.day);
    }
}
