//! End-to-end scenario tests driving `Connection` over a scripted
//! in-memory duplex stream instead of a live server, matching the six
//! scenarios enumerated for this protocol (handshake + native auth, text
//! query, prepared-statement lifecycle, LOAD DATA LOCAL INFILE, a server
//! `ERR`, and a multi-result `CALL`).

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::rc::Rc;

use mysql_native::{Connection, MySqlConnectOptions, Value};

/// A scripted duplex stream: reads come from a pre-loaded inbound byte
/// sequence; writes are appended to a shared outbound buffer the test can
/// inspect afterwards.
struct ScriptedStream {
    inbound: Vec<u8>,
    inbound_pos: usize,
    outbound: Rc<RefCell<Vec<u8>>>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.inbound[self.inbound_pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.inbound_pos += n;
        if n == 0 && !buf.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "scripted stream exhausted"));
        }
        Ok(n)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn packet(seq: u8, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut out = vec![(len & 0xFF) as u8, ((len >> 8) & 0xFF) as u8, ((len >> 16) & 0xFF) as u8, seq];
    out.extend_from_slice(payload);
    out
}

fn lenenc(n: u64) -> Vec<u8> {
    assert!(n < 0xFB, "test helper only covers single-byte lenenc ints");
    vec![n as u8]
}

fn lcs(bytes: &[u8]) -> Vec<u8> {
    let mut out = lenenc(bytes.len() as u64);
    out.extend_from_slice(bytes);
    out
}

fn field_payload(name: &[u8], column_type: u8) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend(lcs(b"def"));
    p.extend(lcs(b""));
    p.extend(lcs(b"t"));
    p.extend(lcs(b"t"));
    p.extend(lcs(name));
    p.extend(lcs(name));
    p.push(0x0C);
    p.extend_from_slice(&33u16.to_le_bytes());
    p.extend_from_slice(&11u32.to_le_bytes());
    p.push(column_type);
    p.extend_from_slice(&0u16.to_le_bytes());
    p.push(0);
    p.extend_from_slice(&0u16.to_le_bytes());
    p
}

fn handshake_payload() -> Vec<u8> {
    let mut p = Vec::new();
    p.push(10);
    p.extend_from_slice(b"5.1.34\0");
    p.extend_from_slice(&42u32.to_le_bytes());
    p.extend_from_slice(b"12345678");
    p.push(0);
    p.extend_from_slice(&0xFFFFu16.to_le_bytes());
    p.push(33);
    p.extend_from_slice(&0x0002u16.to_le_bytes());
    p.extend_from_slice(&0xFFFFu16.to_le_bytes());
    p.push(21);
    p.extend_from_slice(&[0u8; 10]);
    p.extend_from_slice(b"9ABCDEFGHIJK\0");
    p
}

fn ok_payload(affected_rows: u64, status: u16, info: &[u8]) -> Vec<u8> {
    let mut p = vec![0x00];
    p.extend(lenenc(affected_rows));
    p.extend(lenenc(0));
    p.extend_from_slice(&status.to_le_bytes());
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(info);
    p
}

fn eof_payload(status: u16) -> Vec<u8> {
    let mut p = vec![0xFE];
    p.extend_from_slice(&0u16.to_le_bytes());
    p.extend_from_slice(&status.to_le_bytes());
    p
}

fn connect_with_script(inbound: Vec<u8>, local_infile: bool) -> (Connection, Rc<RefCell<Vec<u8>>>) {
    let outbound = Rc::new(RefCell::new(Vec::new()));

    let mut options = MySqlConnectOptions::default_for_test();
    options.username = "u".into();
    options.password = Some("p".into());
    options.database = Some("d".into());
    options.local_infile = local_infile;

    let mut full_script = packet(0, &handshake_payload());
    full_script.extend(packet(2, &ok_payload(0, 0x0002, b"")));
    // handshake() issues `SET NAMES <charset>` right after auth succeeds;
    // that query resets the sequence id, so its OK response is seq 1.
    full_script.extend(packet(1, &ok_payload(0, 0x0002, b"")));
    full_script.extend(inbound);

    let stream = ScriptedStream { inbound: full_script, inbound_pos: 0, outbound: Rc::clone(&outbound) };
    let conn = Connection::connect_with_stream(stream, &options).expect("handshake should succeed");
    (conn, outbound)
}

trait ConnectOptionsTestExt {
    fn default_for_test() -> Self;
}

impl ConnectOptionsTestExt for MySqlConnectOptions {
    fn default_for_test() -> Self {
        MySqlConnectOptions::parse("mysql://u:p@example.invalid/d").unwrap()
    }
}

#[test]
fn scenario_handshake_computes_expected_auth_token() {
    let (conn, outbound) = connect_with_script(Vec::new(), false);

    assert_eq!(conn.thread_id(), 42);
    assert_eq!(conn.server_version(), "5.1.34");
    assert_eq!(conn.server_version_parts(), (5, 1, 34));

    let written = outbound.borrow();
    // Skip the 4-byte packet header to get at the auth-response payload.
    let payload = &written[4..];
    // flags(4) + max_packet(4) + charset(1) + filler(23) + "u\0"(2) = 34
    // bytes before the scrambled-password LCS.
    let lenenc_tag_offset = 4 + 4 + 1 + 23 + 2;
    assert_eq!(payload[lenenc_tag_offset], 20, "scrambled password LCS length should be 20");
    let token = &payload[lenenc_tag_offset + 1..lenenc_tag_offset + 1 + 20];

    let salt: [u8; 20] = *b"123456789ABCDEFGHIJK";
    let expected = mysql_native::protocol::auth::scramble(b"p", &salt);
    assert_eq!(token, &expected[..]);
}

#[test]
fn scenario_text_query_decodes_row_and_lengths() {
    let mut script = Vec::new();
    script.extend(packet(1, &lenenc(3)));
    script.extend(packet(2, &field_payload(b"a", 0x03)));
    script.extend(packet(3, &field_payload(b"b", 0x03)));
    script.extend(packet(4, &field_payload(b"c", 0xFD)));
    script.extend(packet(5, &eof_payload(0)));
    script.extend(packet(6, &[0x03, b'1', 0xFB, 0x03, b'a', b'b', b'c']));
    script.extend(packet(7, &eof_payload(0)));

    let (mut conn, _outbound) = connect_with_script(script, false);

    let mut rs = conn.query("select 1,NULL,'abc'").unwrap().into_result_set().unwrap();
    assert_eq!(rs.row_count(), 1);

    let row = rs.fetch_row().unwrap();
    assert_eq!(row.get(0), Some(&Value::Bytes(b"1".to_vec())));
    assert_eq!(row.get(1), Some(&Value::Null));
    assert_eq!(row.get(2), Some(&Value::Bytes(b"abc".to_vec())));
    assert_eq!(rs.fetch_lengths(), Some(&[1u64, 0, 3][..]));
}

#[test]
fn scenario_prepared_statement_lifecycle() {
    let mut prepare_ok = vec![0x00];
    prepare_ok.extend_from_slice(&1u32.to_le_bytes()); // statement id
    prepare_ok.extend_from_slice(&1u16.to_le_bytes()); // field_count
    prepare_ok.extend_from_slice(&2u16.to_le_bytes()); // param_count
    prepare_ok.push(0);
    prepare_ok.extend_from_slice(&0u16.to_le_bytes());

    let mut script = Vec::new();
    script.extend(packet(1, &prepare_ok));
    script.extend(packet(2, &field_payload(b"p1", 0x08)));
    script.extend(packet(3, &field_payload(b"p2", 0x08)));
    script.extend(packet(4, &eof_payload(0)));
    script.extend(packet(5, &field_payload(b"sum", 0xF6)));
    script.extend(packet(6, &eof_payload(0)));

    // STMT_EXECUTE response: field header + field + EOF + one binary row + EOF.
    // The execute packet itself consumes seq 0, so the response starts at 1.
    script.extend(packet(1, &lenenc(1)));
    script.extend(packet(2, &field_payload(b"sum", 0xF6)));
    script.extend(packet(3, &eof_payload(0)));
    let mut row = vec![0x00, 0x00];
    row.extend(lcs(b"5"));
    script.extend(packet(4, &row));
    script.extend(packet(5, &eof_payload(0)));

    let (mut conn, outbound) = connect_with_script(script, false);

    let mut stmt = conn.prepare("select ? + ?").unwrap();
    assert_eq!(stmt.statement_id(), 1);
    assert_eq!(stmt.param_count(), 2);
    assert_eq!(stmt.field_count(), 1);

    outbound.borrow_mut().clear();
    let mut rs = stmt
        .execute(&mut conn, &[Value::Signed(2), Value::Signed(3)])
        .unwrap()
        .into_result_set()
        .unwrap();

    let written = outbound.borrow();
    let execute_payload = &written[4..];
    assert_eq!(execute_payload[0], 0x17); // STMT_EXECUTE
    assert_eq!(&execute_payload[1..5], &1u32.to_le_bytes()); // statement id
    assert_eq!(execute_payload[5], 0); // flags
    assert_eq!(&execute_payload[6..10], &1u32.to_le_bytes()); // iteration count
    assert_eq!(execute_payload[10], 0x00); // null bitmap, no nulls
    assert_eq!(execute_payload[11], 0x01); // new-params-bound
    assert_eq!(&execute_payload[12..14], &[0x08, 0x00]); // LONGLONG, signed
    assert_eq!(&execute_payload[14..16], &[0x08, 0x00]);
    assert_eq!(&execute_payload[16..24], &2u64.to_le_bytes());
    assert_eq!(&execute_payload[24..32], &3u64.to_le_bytes());
    drop(written);

    let row = rs.fetch_row().unwrap();
    assert_eq!(row.get(0).and_then(Value::as_i64), Some(5));

    outbound.borrow_mut().clear();
    stmt.close(&mut conn).unwrap();
    let written = outbound.borrow();
    let close_payload = &written[4..];
    assert_eq!(close_payload[0], 0x19); // STMT_CLOSE
    assert_eq!(&close_payload[1..5], &1u32.to_le_bytes());
}

#[test]
fn scenario_load_data_local_infile_streams_file_and_reads_final_ok() {
    let path = std::env::temp_dir().join(format!("mysql_native_load_data_{}.csv", std::process::id()));
    std::fs::write(&path, b"1,2\n3,4\n").unwrap();

    let mut script = Vec::new();
    let mut local_infile_request = vec![0xFB];
    local_infile_request.extend_from_slice(path.to_str().unwrap().as_bytes());
    // query packet consumes seq 0; the LOCAL INFILE request is seq 1.
    script.extend(packet(1, &local_infile_request));
    // the client then streams the file as seq 2 (one small chunk) and a
    // trailing empty packet as seq 3, so the final OK lands on seq 4.
    script.extend(packet(4, &ok_payload(2, 0x0002, b"")));

    let (mut conn, outbound) = connect_with_script(script, true);

    let sql = format!("LOAD DATA LOCAL INFILE '{}' INTO TABLE t", path.to_str().unwrap());
    let outcome = conn.query(&sql).unwrap();
    assert_eq!(outcome.affected_rows(), 2);

    let written = outbound.borrow();
    assert!(written.windows(7).any(|w| w == b"1,2\n3,4"));
    // trailing zero-length packet: 3-byte length field of all zeros.
    assert_eq!(&written[written.len() - 4..written.len() - 1], &[0, 0, 0]);

    std::fs::remove_file(&path).ok();
}

#[test]
fn scenario_server_err_surfaces_errno_and_sqlstate() {
    let mut err_payload = vec![0xFF, 0x15, 0x04, b'#', b'4', b'2', b'0', b'0', b'0'];
    err_payload.extend_from_slice(b"Unknown table");
    let script = packet(1, &err_payload);

    let (mut conn, _outbound) = connect_with_script(script, false);

    let err = conn.query("select * from missing").unwrap_err();
    assert_eq!(err.errno(), 1045);
    assert_eq!(err.sqlstate(), "42000");
    assert_eq!(conn.errno(), 1045);
    assert_eq!(conn.sqlstate(), "42000");

    // connection remains usable: a second command is still dispatchable
    // (it will simply hit end-of-script here, proving no panic/poisoning
    // happened on the first error).
    let _ = conn.ping();
}

#[test]
fn scenario_multi_result_call_advances_without_resetting_sequence() {
    let mut script = Vec::new();
    // query packet consumes seq 0.
    script.extend(packet(1, &lenenc(1)));
    script.extend(packet(2, &field_payload(b"x", 0x03)));
    script.extend(packet(3, &eof_payload(0x0008)));
    script.extend(packet(4, &[0x01, b'1']));
    script.extend(packet(5, &eof_payload(0x0008)));
    // next_result: final OK for the CALL itself, continuing the same
    // exchange (sequence id continues from 5 -> 6, not reset to 0).
    script.extend(packet(6, &ok_payload(0, 0x0000, b"")));

    let (mut conn, _outbound) = connect_with_script(script, false);

    let mut rs = conn.query("CALL proc()").unwrap().into_result_set().unwrap();
    assert!(conn.more_results());
    assert_eq!(rs.fetch_row().unwrap().get(0), Some(&Value::Bytes(b"1".to_vec())));

    let next = conn.next_result().unwrap();
    assert!(matches!(next, Some(mysql_native::CommandOutcome::Ok(_))));
    assert!(!conn.more_results());
}
