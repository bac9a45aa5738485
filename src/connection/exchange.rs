//! Generic command-exchange helpers: write a command packet, read its
//! response to completion, and materialise whatever result it produced
//! (spec §4.5 "Any command resets the sequence counter...").
//!
//! Grounded on `mason-mariadb/src/connection/mod.rs`'s command-dispatch
//! loop, generalised into free functions operating on `&mut Connection`
//! so both the command façade and `Statement::execute` can share it.

use tracing::instrument;

use crate::error::{Error, Result};
use crate::protocol::column::Field;
use crate::protocol::prepare::{decode_binary_row, PrepareOk};
use crate::protocol::{decode_response_head, EofPacket, OkPacket, ResponseHead, Value};
use crate::result::{ResultSet, Row};

use super::{load_data, Connection, LastOk};

/// What a command produced: a void acknowledgement or a materialised
/// result set (spec §4.6).
#[derive(Debug)]
pub enum CommandOutcome {
    Ok(OkPacket),
    ResultSet(ResultSet),
}

impl CommandOutcome {
    pub fn into_result_set(self) -> Result<ResultSet> {
        match self {
            CommandOutcome::ResultSet(rs) => Ok(rs),
            CommandOutcome::Ok(_) => Err(Error::client("command did not produce a result set")),
        }
    }

    pub fn affected_rows(&self) -> u64 {
        match self {
            CommandOutcome::Ok(ok) => ok.affected_rows,
            CommandOutcome::ResultSet(_) => 0,
        }
    }
}

fn record_ok(conn: &mut Connection, ok: &OkPacket) {
    conn.set_last_ok(LastOk {
        affected_rows: ok.affected_rows,
        insert_id: ok.insert_id,
        status: ok.status,
        warning_count: ok.warning_count,
        info: ok.info.clone(),
    });
}

fn record_eof_as_ok(conn: &mut Connection, eof: &EofPacket) {
    conn.set_last_ok(LastOk {
        affected_rows: 0,
        insert_id: 0,
        status: eof.status,
        warning_count: eof.warning_count,
        info: String::new(),
    });
}

fn handle_err(conn: &mut Connection, err: crate::protocol::ErrPacket) -> Error {
    conn.set_last_error(err.code, err.sqlstate, err.message.clone());
    err.into_error()
}

/// Begin a fresh command exchange: reset the sequence counter and clear
/// the last-error snapshot (spec §7 "cleared at the start of every new
/// command").
fn begin_command(conn: &mut Connection) {
    conn.framer_mut().begin_command();
    conn.clear_last_error();
}

#[instrument(skip(conn))]
pub(super) fn run_void_command(conn: &mut Connection, packet: Vec<u8>) -> Result<()> {
    begin_command(conn);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;
    let reply = conn.framer_mut().read_packet(conn.stream_mut())?;
    match decode_response_head(&reply)? {
        ResponseHead::Ok(ok) => {
            record_ok(conn, &ok);
            Ok(())
        }
        ResponseHead::Err(err) => Err(handle_err(conn, err)),
        other => Err(Error::protocol(format!("unexpected response to void command: {:?}", other))),
    }
}

pub(super) fn run_statistics(conn: &mut Connection) -> Result<String> {
    begin_command(conn);
    let packet = crate::protocol::command::build_statistics_packet();
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;
    let reply = conn.framer_mut().read_packet(conn.stream_mut())?;
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

pub(super) fn send_quit(conn: &mut Connection) -> Result<()> {
    begin_command(conn);
    let packet = crate::protocol::command::build_quit_packet();
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)
}

pub(super) fn send_statement_close(conn: &mut Connection, statement_id: u32) -> Result<()> {
    begin_command(conn);
    let packet = crate::protocol::prepare::build_close_packet(statement_id);
    // Spec §4.7: "the server sends no reply."
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)
}

#[instrument(skip(conn, sql), fields(sql))]
pub(super) fn run_query(conn: &mut Connection, sql: &str) -> Result<CommandOutcome> {
    begin_command(conn);
    let encoded = conn.charset().encode(sql);
    let packet = crate::protocol::command::build_query_packet(&encoded);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;
    read_command_response(conn, RowMode::Text)
}

/// Read the next result header on the current exchange without resetting
/// the sequence id (spec §4.5 "`next_result`").
pub(super) fn read_next_result(conn: &mut Connection) -> Result<CommandOutcome> {
    read_command_response(conn, RowMode::Text)
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) enum RowMode {
    Text,
    Binary,
}

/// Shared response-reading loop used by both text queries and prepared
/// `STMT_EXECUTE` (spec §4.6).
pub(super) fn read_command_response(conn: &mut Connection, mode: RowMode) -> Result<CommandOutcome> {
    let head_payload = conn.framer_mut().read_packet(conn.stream_mut())?;
    match decode_response_head(&head_payload)? {
        ResponseHead::Ok(ok) => {
            record_ok(conn, &ok);
            Ok(CommandOutcome::Ok(ok))
        }
        ResponseHead::Err(err) => Err(handle_err(conn, err)),
        ResponseHead::LocalInfile(filename) => {
            if !conn.local_infile_enabled() {
                return Err(Error::protocol(
                    "server requested LOAD DATA LOCAL INFILE but local_infile is disabled",
                ));
            }
            load_data::stream_local_infile(conn, &filename)?;
            let reply = conn.framer_mut().read_packet(conn.stream_mut())?;
            match decode_response_head(&reply)? {
                ResponseHead::Ok(ok) => {
                    record_ok(conn, &ok);
                    Ok(CommandOutcome::Ok(ok))
                }
                ResponseHead::Err(err) => Err(handle_err(conn, err)),
                other => Err(Error::protocol(format!(
                    "unexpected packet after LOAD DATA LOCAL INFILE: {:?}",
                    other
                ))),
            }
        }
        ResponseHead::ResultSetHeader(field_count) => {
            read_result_set(conn, mode, field_count as usize)
        }
        ResponseHead::Eof(eof) => {
            record_eof_as_ok(conn, &eof);
            Err(Error::protocol("unexpected EOF as first response packet"))
        }
    }
}

fn read_result_set(conn: &mut Connection, mode: RowMode, field_count: usize) -> Result<CommandOutcome> {
    let mut fields = Vec::with_capacity(field_count);
    for _ in 0..field_count {
        let payload = conn.framer_mut().read_packet(conn.stream_mut())?;
        fields.push(Field::decode(&payload)?);
    }
    read_eof(conn)?;

    let mut rows = Vec::new();
    loop {
        let payload = conn.framer_mut().read_packet(conn.stream_mut())?;
        if is_eof_packet(&payload) {
            let eof = crate::protocol::response::decode_eof(&payload)?;
            record_eof_as_ok(conn, &eof);
            break;
        }
        if payload.first() == Some(&0xFF) {
            let err = crate::protocol::response::decode_err(&payload)?;
            return Err(handle_err(conn, err));
        }

        let row = match mode {
            RowMode::Text => {
                let raw = crate::protocol::text::decode_text_row(&payload, field_count)?;
                Row::from_text(&mut fields, raw)
            }
            RowMode::Binary => {
                let raw: Vec<Value> = decode_binary_row(&payload, &fields)?;
                Row::from_binary(&mut fields, raw)
            }
        };
        rows.push(row);
    }

    Ok(CommandOutcome::ResultSet(ResultSet::new(fields, rows, conn.charset())))
}

fn is_eof_packet(payload: &[u8]) -> bool {
    payload.first() == Some(&0xFE) && payload.len() <= 5
}

fn read_eof(conn: &mut Connection) -> Result<EofPacket> {
    let payload = conn.framer_mut().read_packet(conn.stream_mut())?;
    crate::protocol::response::decode_eof(&payload)
}

/// Run a prepared statement's `STMT_EXECUTE` exchange against already-known
/// field metadata (spec §4.7 "`execute(args…)`").
pub(crate) fn run_execute(
    conn: &mut Connection,
    packet: Vec<u8>,
    field_count: usize,
) -> Result<CommandOutcome> {
    begin_command(conn);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;

    if field_count == 0 {
        let head_payload = conn.framer_mut().read_packet(conn.stream_mut())?;
        return match decode_response_head(&head_payload)? {
            ResponseHead::Ok(ok) => {
                record_ok(conn, &ok);
                Ok(CommandOutcome::Ok(ok))
            }
            ResponseHead::Err(err) => Err(handle_err(conn, err)),
            other => Err(Error::protocol(format!("unexpected response to execute: {:?}", other))),
        };
    }

    read_command_response(conn, RowMode::Binary)
}

/// Run `STMT_PREPARE` and consume its Prepare-OK plus parameter and field
/// metadata (spec §4.7 "`prepare(sql)`", §4.3 "Prepare-OK.").
pub(super) fn run_prepare(conn: &mut Connection, sql: &str) -> Result<(PrepareOk, Vec<Field>)> {
    begin_command(conn);
    let encoded = conn.charset().encode(sql);
    let packet = crate::protocol::prepare::build_prepare_packet(&encoded);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;

    let head_payload = conn.framer_mut().read_packet(conn.stream_mut())?;
    if head_payload.first() == Some(&0xFF) {
        let err = crate::protocol::response::decode_err(&head_payload)?;
        return Err(handle_err(conn, err));
    }
    let prepare_ok = PrepareOk::decode(&head_payload)?;

    for _ in 0..prepare_ok.param_count {
        conn.framer_mut().read_packet(conn.stream_mut())?;
    }
    if prepare_ok.param_count > 0 {
        read_eof(conn)?;
    }

    let mut fields = Vec::with_capacity(prepare_ok.field_count as usize);
    for _ in 0..prepare_ok.field_count {
        let payload = conn.framer_mut().read_packet(conn.stream_mut())?;
        fields.push(Field::decode(&payload)?);
    }
    if prepare_ok.field_count > 0 {
        read_eof(conn)?;
    }

    Ok((prepare_ok, fields))
}

/// Run `COM_FIELD_LIST`: a stream of `Field` packets terminated by `EOF`,
/// with no preceding result-set header (spec.md's §4.3 packet-grammar
/// table).
pub(super) fn run_field_list(conn: &mut Connection, table: &str, wildcard: &str) -> Result<Vec<Field>> {
    begin_command(conn);
    let packet = crate::protocol::command::build_field_list_packet(table, wildcard);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;

    let mut fields = Vec::new();
    loop {
        let payload = conn.framer_mut().read_packet(conn.stream_mut())?;
        if is_eof_packet(&payload) {
            let eof = crate::protocol::response::decode_eof(&payload)?;
            record_eof_as_ok(conn, &eof);
            break;
        }
        if payload.first() == Some(&0xFF) {
            let err = crate::protocol::response::decode_err(&payload)?;
            return Err(handle_err(conn, err));
        }
        fields.push(Field::decode(&payload)?);
    }
    Ok(fields)
}

/// Run `COM_PROCESS_INFO`: replies like a text query (result-set header +
/// field list + row stream).
pub(super) fn run_process_info(conn: &mut Connection) -> Result<CommandOutcome> {
    begin_command(conn);
    let packet = crate::protocol::command::build_process_info_packet();
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;
    read_command_response(conn, RowMode::Text)
}

/// Run `COM_SET_OPTION`: replies with a bare `EOF` rather than `OK`.
pub(super) fn run_set_option(conn: &mut Connection, option: u16) -> Result<()> {
    begin_command(conn);
    let packet = crate::protocol::command::build_set_option_packet(option);
    conn.framer_mut().write_packet(conn.stream_mut(), &packet)?;
    let reply = conn.framer_mut().read_packet(conn.stream_mut())?;
    match decode_response_head(&reply)? {
        ResponseHead::Eof(eof) => {
            record_eof_as_ok(conn, &eof);
            Ok(())
        }
        ResponseHead::Err(err) => Err(handle_err(conn, err)),
        other => Err(Error::protocol(format!("unexpected response to COM_SET_OPTION: {:?}", other))),
    }
}
