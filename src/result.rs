//! Result set: eager row buffer + cursor (spec §3 "Result set", §4.6).
//!
//! Grounded on `mason-mariadb/src/protocol/packets/result_set.rs`'s
//! field-vector + row-vector shape, generalised to carry either text or
//! binary rows behind one `Row` type and to expose the cursor operations
//! spec §4.6 names.

use crate::charset::Charset;
use crate::error::{Error, Result};
use crate::protocol::{Field, Value};

/// One decoded row, text or binary, normalized to `Value` so callers don't
/// need to branch on protocol mode.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    lengths: Vec<u64>,
}

impl Row {
    pub(crate) fn from_text(fields: &mut [Field], raw: Vec<Option<Vec<u8>>>) -> Self {
        let mut values = Vec::with_capacity(raw.len());
        let mut lengths = Vec::with_capacity(raw.len());
        for (field, cell) in fields.iter_mut().zip(raw.into_iter()) {
            let len = cell.as_ref().map_or(0, |b| b.len() as u64);
            field.max_length = field.max_length.max(len);
            lengths.push(len);
            values.push(match cell {
                None => Value::Null,
                Some(bytes) => Value::Bytes(bytes),
            });
        }
        Row { values, lengths }
    }

    pub(crate) fn from_binary(fields: &mut [Field], raw: Vec<Value>) -> Self {
        let mut lengths = Vec::with_capacity(raw.len());
        for (field, v) in fields.iter_mut().zip(raw.iter()) {
            let len = value_byte_len(v);
            field.max_length = field.max_length.max(len);
            lengths.push(len);
        }
        Row { values: raw, lengths }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn lengths(&self) -> &[u64] {
        &self.lengths
    }
}

fn value_byte_len(v: &Value) -> u64 {
    match v {
        Value::Null => 0,
        Value::Bytes(b) => b.len() as u64,
        Value::Time(t) => t.to_string().len() as u64,
        Value::Signed(_) | Value::Unsigned(_) | Value::Float(_) | Value::Double(_) => 8,
    }
}

/// An eagerly materialised result set: field metadata + row buffer +
/// cursor index (spec §4.6).
#[derive(Debug, Clone)]
pub struct ResultSet {
    fields: Vec<Field>,
    rows: Vec<Row>,
    cursor: usize,
    last_fetched: Option<usize>,
    charset: Charset,
}

impl ResultSet {
    pub(crate) fn new(fields: Vec<Field>, rows: Vec<Row>, charset: Charset) -> Self {
        ResultSet { fields, rows, cursor: 0, last_fetched: None, charset }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Like `field_by_name`, but raises `Error::ColumnNotFound` instead of
    /// `None` for callers that treat a missing column as a hard error.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.field_by_name(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    /// Decode column `index` of `row` as text through this result set's
    /// connection charset (spec.md:105 "decoded through the connection
    /// charset"). Returns `None` for NULL, a non-`Bytes` value, or a
    /// column flagged binary (BIT or the `BINARY` field flag) — callers
    /// wanting the raw bytes for those should use `Row::get` instead.
    pub fn column_text(&self, row: &Row, index: usize) -> Option<String> {
        let field = self.fields.get(index)?;
        if field.is_binary() {
            return None;
        }
        match row.get(index)? {
            Value::Bytes(b) => Some(self.charset.decode(b)),
            _ => None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Advance the cursor and return the next row, or `None` at the end
    /// (spec §4.6 "Cursor operations").
    pub fn fetch_row(&mut self) -> Option<&Row> {
        if self.cursor >= self.rows.len() {
            self.last_fetched = None;
            return None;
        }
        let idx = self.cursor;
        self.cursor += 1;
        self.last_fetched = Some(idx);
        Some(&self.rows[idx])
    }

    /// Like `fetch_row`, but raises `Error::RowNotFound` at the end instead
    /// of `None`, for callers that expect at least one more row.
    pub fn fetch_row_required(&mut self) -> Result<&Row> {
        if self.cursor >= self.rows.len() {
            self.last_fetched = None;
            return Err(Error::RowNotFound);
        }
        let idx = self.cursor;
        self.cursor += 1;
        self.last_fetched = Some(idx);
        Ok(&self.rows[idx])
    }

    /// Jump the cursor to an absolute row index.
    pub fn data_seek(&mut self, index: usize) {
        self.cursor = index.min(self.rows.len());
    }

    /// Current cursor position.
    pub fn row_tell(&self) -> usize {
        self.cursor
    }

    /// Alias of `data_seek`, matching the legacy `mysql_row_seek` naming.
    pub fn row_seek(&mut self, index: usize) {
        self.data_seek(index);
    }

    /// Field-vector position is purely local bookkeeping for callers that
    /// iterate fields sequentially; the result set itself holds no
    /// per-field cursor beyond the returned index.
    pub fn field_seek(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Byte lengths of the last fetched row, or `None` if no row has been
    /// fetched since the last reset (spec §4.6 "`fetch_lengths`").
    pub fn fetch_lengths(&self) -> Option<&[u64]> {
        self.last_fetched.map(|idx| self.rows[idx].lengths())
    }

    pub fn row(&self, index: usize) -> Result<&Row> {
        self.rows
            .get(index)
            .ok_or_else(|| Error::client(format!("row index {} out of range", index)))
    }
}
