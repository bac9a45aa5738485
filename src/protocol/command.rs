//! Command packet byte codes (spec §4.3 "Command packets.") and the
//! simple void/LCS-argument command encoders.
//!
//! Grounded on `mason-mariadb/src/protocol/packets/com_*.rs`, one struct
//! per command collapsed here since most carry no payload beyond the
//! code byte.

use crate::io::PacketBufMut;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    Quit = 0x01,
    InitDb = 0x02,
    Query = 0x03,
    FieldList = 0x04,
    Refresh = 0x07,
    Shutdown = 0x08,
    Statistics = 0x09,
    ProcessInfo = 0x0A,
    ProcessKill = 0x0C,
    Ping = 0x0E,
    StmtPrepare = 0x16,
    StmtExecute = 0x17,
    StmtClose = 0x19,
    StmtReset = 0x1A,
    SetOption = 0x1B,
    Debug = 0x0D,
}

fn command_with_bytes(code: CommandCode, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.put_u8(code as u8);
    buf.put_bytes(payload);
    buf
}

/// `sql` is already charset-encoded (spec.md:128's "converts the SQL
/// through the connection charset" applies at the caller, which holds the
/// negotiated `Charset`).
pub fn build_query_packet(sql: &[u8]) -> Vec<u8> {
    command_with_bytes(CommandCode::Query, sql)
}

pub fn build_init_db_packet(db: &str) -> Vec<u8> {
    command_with_bytes(CommandCode::InitDb, db.as_bytes())
}

pub fn build_field_list_packet(table: &str, wildcard: &str) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.put_u8(CommandCode::FieldList as u8);
    buf.put_str_nul(table.as_bytes());
    buf.put_bytes(wildcard.as_bytes());
    buf
}

pub fn build_quit_packet() -> Vec<u8> {
    vec![CommandCode::Quit as u8]
}

pub fn build_ping_packet() -> Vec<u8> {
    vec![CommandCode::Ping as u8]
}

pub fn build_statistics_packet() -> Vec<u8> {
    vec![CommandCode::Statistics as u8]
}

pub fn build_process_info_packet() -> Vec<u8> {
    vec![CommandCode::ProcessInfo as u8]
}

pub fn build_process_kill_packet(thread_id: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(5);
    buf.put_u8(CommandCode::ProcessKill as u8);
    buf.put_u32(thread_id);
    buf
}

pub fn build_refresh_packet(sub_command: u8) -> Vec<u8> {
    vec![CommandCode::Refresh as u8, sub_command]
}

pub fn build_set_option_packet(option: u16) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3);
    buf.put_u8(CommandCode::SetOption as u8);
    buf.put_u16(option);
    buf
}
