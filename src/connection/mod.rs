//! Connection state machine (spec §4.5, §3 "Connection").
//!
//! Grounded on `mason-mariadb/src/connection/mod.rs`'s `Connection` struct
//! shape (socket handle + negotiated metadata fields), rewired onto
//! blocking `std::net`/`std::os::unix::net` streams instead of that
//! crate's `runtime::net::TcpStream`, and onto this crate's `Framer`/
//! `PacketBuf` instead of its `Decoder`/`Encoder` traits.

mod establish;
mod exchange;
mod load_data;

use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::time::Duration;

use tracing::instrument;

use crate::charset::Charset;
use crate::error::{Error, Result};
use crate::io::Framer;
use crate::options::{MySqlConnectOptions, Transport};
use crate::protocol::{Capabilities, ServerStatus};

pub use exchange::CommandOutcome;

/// Any duplex byte stream this driver can speak the wire protocol over:
/// a real socket, or (for tests, and for callers fronting their own
/// transport such as an SSH tunnel) anything else that's `Read + Write`.
pub trait DuplexStream: Read + Write {}
impl<T: Read + Write> DuplexStream for T {}

/// Either side of the transport this driver supports (spec §6
/// "Transport"), or an injected stream for testing.
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Boxed(Box<dyn DuplexStream>),
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
            Stream::Boxed(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
            Stream::Boxed(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
            Stream::Boxed(s) => s.flush(),
        }
    }
}

/// Snapshot of the last `OK` packet observed (spec §3 "last OK snapshot").
#[derive(Debug, Clone, Default)]
pub struct LastOk {
    pub affected_rows: u64,
    pub insert_id: u64,
    pub status: ServerStatus,
    pub warning_count: u16,
    pub info: String,
}

/// A connection to a MySQL 4.1+ server (spec §3 "Connection", §4.5
/// "Connection state machine").
pub struct Connection {
    stream: Stream,
    framer: Framer,

    charset: Charset,
    server_version: String,
    server_version_num: u32,
    thread_id: u32,
    capabilities: Capabilities,

    last_ok: LastOk,
    last_error: Option<(u16, [u8; 5], String)>,

    init_command: Option<String>,
    reconnect: bool,
    local_infile: bool,

    /// Deferred `STMT_CLOSE` queue: a dropped `Statement` pushes its id
    /// here via a non-owning handle rather than racing the connection's
    /// in-flight command (spec §5, §9 "Finalizer for statement close").
    pending_statement_closes: Rc<RefCell<Vec<u32>>>,
}

impl Connection {
    /// Open the transport, perform handshake + auth, and run the
    /// configured init-command, if any (spec §4.5 "`connect()`").
    #[instrument(skip_all)]
    pub fn connect(options: &MySqlConnectOptions) -> Result<Connection> {
        let stream = open_transport(&options.transport, options.connect_timeout)?;
        establish::handshake(stream, options)
    }

    /// Perform handshake + auth over an already-connected duplex stream
    /// instead of opening one of the built-in transports. Intended for
    /// tests driving a scripted in-memory server and for callers fronting
    /// their own transport (e.g. an SSH tunnel).
    pub fn connect_with_stream<S: DuplexStream + 'static>(
        stream: S,
        options: &MySqlConnectOptions,
    ) -> Result<Connection> {
        establish::handshake(Stream::Boxed(Box::new(stream)), options)
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    /// `(major, minor, patch)`, decoded from the packed
    /// `major*10000 + minor*100 + patch` integer (spec §3 "Connection").
    pub fn server_version_parts(&self) -> (u32, u32, u32) {
        (
            self.server_version_num / 10000,
            (self.server_version_num / 100) % 100,
            self.server_version_num % 100,
        )
    }

    pub fn thread_id(&self) -> u32 {
        self.thread_id
    }

    pub fn charset_name(&self) -> &str {
        self.charset.name
    }

    pub fn last_ok(&self) -> &LastOk {
        &self.last_ok
    }

    /// Spec §7 "dedicated accessors (`errno`, `error`, `sqlstate`)".
    pub fn errno(&self) -> u16 {
        self.last_error.as_ref().map_or(0, |(code, _, _)| *code)
    }

    pub fn sqlstate(&self) -> String {
        self.last_error
            .as_ref()
            .map(|(_, s, _)| String::from_utf8_lossy(s).into_owned())
            .unwrap_or_else(|| "00000".to_string())
    }

    pub fn error(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, _, m)| m.as_str())
    }

    /// Spec §4.5 "`more_results` is the `SERVER_MORE_RESULTS_EXISTS` bit
    /// of the last EOF/OK's server_status".
    pub fn more_results(&self) -> bool {
        self.last_ok.status.more_results_exists()
    }

    /// Run a text query and return either a materialised `ResultSet` or a
    /// void `OK` (spec §4.5, §4.6).
    pub fn query(&mut self, sql: &str) -> Result<CommandOutcome> {
        self.drain_pending_statement_closes()?;
        exchange::run_query(self, sql)
    }

    /// Read the next result of a multi-result exchange (e.g. after a
    /// `CALL`) without resetting the command sequence id (spec §4.5
    /// "`next_result`").
    pub fn next_result(&mut self) -> Result<Option<CommandOutcome>> {
        if !self.more_results() {
            return Ok(None);
        }
        exchange::read_next_result(self).map(Some)
    }

    pub fn ping(&mut self) -> Result<()> {
        self.drain_pending_statement_closes()?;
        exchange::run_void_command(self, crate::protocol::command::build_ping_packet())
    }

    pub fn select_db(&mut self, db: &str) -> Result<()> {
        self.drain_pending_statement_closes()?;
        exchange::run_void_command(self, crate::protocol::command::build_init_db_packet(db))
    }

    pub fn stat(&mut self) -> Result<String> {
        self.drain_pending_statement_closes()?;
        exchange::run_statistics(self)
    }

    pub fn kill(&mut self, thread_id: u32) -> Result<()> {
        self.drain_pending_statement_closes()?;
        exchange::run_void_command(self, crate::protocol::command::build_process_kill_packet(thread_id))
    }

    pub fn refresh(&mut self, sub_command: u8) -> Result<()> {
        self.drain_pending_statement_closes()?;
        exchange::run_void_command(self, crate::protocol::command::build_refresh_packet(sub_command))
    }

    /// `COM_FIELD_LIST`: field metadata for `table`'s columns matching
    /// `wildcard` (an empty string matches all), without running a query
    /// (spec.md's §4.3 packet-grammar table).
    pub fn field_list(&mut self, table: &str, wildcard: &str) -> Result<Vec<crate::protocol::Field>> {
        self.drain_pending_statement_closes()?;
        exchange::run_field_list(self, table, wildcard)
    }

    /// `COM_PROCESS_INFO`: the server's process list, shaped like a text
    /// query's result set.
    pub fn process_info(&mut self) -> Result<CommandOutcome> {
        self.drain_pending_statement_closes()?;
        exchange::run_process_info(self)
    }

    /// `COM_SET_OPTION`: toggle a per-connection protocol option (e.g.
    /// multi-statements); the server replies with a bare `EOF`.
    pub fn set_option(&mut self, option: u16) -> Result<()> {
        self.drain_pending_statement_closes()?;
        exchange::run_set_option(self, option)
    }

    pub fn commit(&mut self) -> Result<()> {
        self.query("COMMIT").map(|_| ())
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.query("ROLLBACK").map(|_| ())
    }

    pub fn set_autocommit(&mut self, enabled: bool) -> Result<()> {
        let sql = if enabled { "SET autocommit=1" } else { "SET autocommit=0" };
        self.query(sql).map(|_| ())
    }

    pub fn list_dbs(&mut self) -> Result<Vec<String>> {
        self.single_text_column("SHOW DATABASES")
    }

    pub fn list_tables(&mut self) -> Result<Vec<String>> {
        self.single_text_column("SHOW TABLES")
    }

    pub fn create_db(&mut self, name: &str) -> Result<()> {
        self.query(&format!("CREATE DATABASE `{}`", escape_identifier(name))).map(|_| ())
    }

    pub fn drop_db(&mut self, name: &str) -> Result<()> {
        self.query(&format!("DROP DATABASE `{}`", escape_identifier(name))).map(|_| ())
    }

    /// Backslash-escapes a string for safe inclusion inside a single-quoted
    /// SQL literal (SPEC_FULL §4.9+ "`escape_string`").
    pub fn escape_string(&self, s: &str) -> String {
        let mut out = String::with_capacity(s.len());
        for c in s.chars() {
            match c {
                '\0' => out.push_str("\\0"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\\' | '\'' | '"' => {
                    out.push('\\');
                    out.push(c);
                }
                '\x1a' => out.push_str("\\Z"),
                other => out.push(other),
            }
        }
        out
    }

    fn single_text_column(&mut self, sql: &str) -> Result<Vec<String>> {
        self.drain_pending_statement_closes()?;
        match exchange::run_query(self, sql)? {
            CommandOutcome::ResultSet(mut rs) => {
                let mut out = Vec::with_capacity(rs.row_count());
                while let Some(row) = rs.fetch_row() {
                    if let Some(crate::protocol::Value::Bytes(b)) = row.get(0) {
                        out.push(self.charset.decode(b));
                    }
                }
                Ok(out)
            }
            CommandOutcome::Ok(_) => Ok(Vec::new()),
        }
    }

    /// Send `QUIT` and release the transport. Best-effort: socket errors
    /// during close are swallowed (spec §4.5 "`close()`").
    pub fn close(mut self) {
        let _ = exchange::send_quit(&mut self);
    }

    /// Prepare `sql` and return a handle bound to this connection's
    /// negotiated charset and the server-assigned statement id (spec
    /// §4.7 "`prepare(sql)`").
    pub fn prepare(&mut self, sql: &str) -> Result<crate::statement::Statement> {
        self.drain_pending_statement_closes()?;
        let (prepare_ok, fields) = exchange::run_prepare(self, sql)?;
        Ok(crate::statement::Statement::new(prepare_ok, fields, self.pending_statement_closes()))
    }

    pub(crate) fn execute_statement(
        &mut self,
        packet: Vec<u8>,
        field_count: usize,
    ) -> Result<CommandOutcome> {
        self.drain_pending_statement_closes()?;
        exchange::run_execute(self, packet, field_count)
    }

    pub(crate) fn close_statement(&mut self, statement_id: u32) -> Result<()> {
        exchange::send_statement_close(self, statement_id)
    }

    pub(crate) fn pending_statement_closes(&self) -> Rc<RefCell<Vec<u32>>> {
        Rc::clone(&self.pending_statement_closes)
    }

    fn drain_pending_statement_closes(&mut self) -> Result<()> {
        let pending: Vec<u32> = self.pending_statement_closes.borrow_mut().drain(..).collect();
        for statement_id in pending {
            exchange::send_statement_close(self, statement_id)?;
        }
        Ok(())
    }
}

fn escape_identifier(name: &str) -> String {
    name.replace('`', "``")
}

/// Resolve the configured transport into a connected stream (spec §6
/// "Transport").
pub(crate) fn open_transport(transport: &Transport, connect_timeout: Option<Duration>) -> Result<Stream> {
    match transport {
        Transport::Tcp { host, port } => {
            use std::net::ToSocketAddrs;
            let addr = (host.as_str(), *port)
                .to_socket_addrs()?
                .next()
                .ok_or_else(|| Error::client(format!("could not resolve host `{}`", host)))?;
            let stream = match connect_timeout {
                Some(d) => TcpStream::connect_timeout(&addr, d)?,
                None => TcpStream::connect(addr)?,
            };
            stream.set_nodelay(true).ok();
            Ok(Stream::Tcp(stream))
        }
        #[cfg(unix)]
        Transport::Unix { path } => Ok(Stream::Unix(UnixStream::connect(path)?)),
        #[cfg(not(unix))]
        Transport::Unix { .. } => {
            Err(Error::client("unix-domain sockets are not supported on this platform"))
        }
    }
}

/// Fields gathered by `establish::connect` before the `Connection` itself
/// can be constructed.
pub(crate) struct NewConnection {
    pub stream: Stream,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub charset: Charset,
    pub server_version: String,
    pub server_version_num: u32,
    pub thread_id: u32,
    pub capabilities: Capabilities,
    pub init_command: Option<String>,
    pub reconnect: bool,
    pub local_infile: bool,
}

impl Connection {
    pub(crate) fn from_parts(parts: NewConnection) -> Result<Connection> {
        if let Stream::Tcp(ref s) = parts.stream {
            s.set_read_timeout(parts.read_timeout)?;
            s.set_write_timeout(parts.write_timeout)?;
        }
        Ok(Connection {
            stream: parts.stream,
            framer: Framer::new(),
            charset: parts.charset,
            server_version: parts.server_version,
            server_version_num: parts.server_version_num,
            thread_id: parts.thread_id,
            capabilities: parts.capabilities,
            last_ok: LastOk::default(),
            last_error: None,
            init_command: parts.init_command,
            reconnect: parts.reconnect,
            local_infile: parts.local_infile,
            pending_statement_closes: Rc::new(RefCell::new(Vec::new())),
        })
    }

    pub(crate) fn stream_mut(&mut self) -> &mut (impl Read + Write) {
        &mut self.stream
    }

    pub(crate) fn framer_mut(&mut self) -> &mut Framer {
        &mut self.framer
    }

    pub(crate) fn local_infile_enabled(&self) -> bool {
        self.local_infile
    }

    pub(crate) fn run_init_command_if_configured(&mut self) -> Result<()> {
        if let Some(cmd) = self.init_command.clone() {
            self.query(&cmd)?;
        }
        Ok(())
    }

    pub(crate) fn set_last_ok(&mut self, ok: LastOk) {
        self.last_ok = ok;
    }

    pub(crate) fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    pub(crate) fn set_last_error(&mut self, code: u16, sqlstate: [u8; 5], message: String) {
        self.last_error = Some((code, sqlstate, message));
    }

    /// This connection's negotiated charset, consulted by the outgoing
    /// SQL-encode path (`exchange::run_query`/`run_prepare`) and the
    /// text/blob decode path (`single_text_column`, `ResultSet::column_text`).
    pub(crate) fn charset(&self) -> Charset {
        self.charset
    }

    /// The advisory `reconnect` flag from the connection options, stored
    /// for higher layers (e.g. a pool) to act on; this driver does not
    /// reconnect on its own (spec §6 "reconnect policy flag").
    pub fn reconnect_flag(&self) -> bool {
        self.reconnect
    }
}
