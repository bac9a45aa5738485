//! Handshake + authentication flow (spec §4.5 "`connect()`").
//!
//! Grounded on `mason-mariadb/src/connection/establish.rs`'s handshake ->
//! auth-response -> OK/ERR sequencing, rewritten against blocking I/O and
//! this crate's `Framer`.

use tracing::debug;

use crate::charset::{self, DEFAULT_CHARSET_ID};
use crate::error::{Error, Result};
use crate::io::Framer;
use crate::options::MySqlConnectOptions;
use crate::protocol::{
    auth, decode_response_head, HandshakeResponse, InitialHandshake, ResponseHead,
    BASE_CAPABILITIES,
};

use super::{Connection, NewConnection, Stream};

pub(super) fn handshake(stream: Stream, options: &MySqlConnectOptions) -> Result<Connection> {
    let mut framer = Framer::new();
    let mut stream = stream;

    let handshake_payload = framer.read_packet(&mut stream)?;
    let handshake = InitialHandshake::decode(&handshake_payload)?;
    debug!(server_version = %handshake.server_version, thread_id = handshake.thread_id, "received handshake");

    let charset = match &options.charset {
        Some(name) => charset::by_name(name)?,
        None => {
            // Spec §4.5: "setting charset to the server default if none
            // configured, validating that the host encoding for that
            // charset is known".
            charset::by_id(handshake.charset).unwrap_or(charset::by_id(DEFAULT_CHARSET_ID)?)
        }
    };

    let mut client_flags = BASE_CAPABILITIES;
    if options.database.is_some() {
        client_flags |= crate::protocol::Capabilities::CONNECT_WITH_DB;
    }
    if options.local_infile {
        client_flags |= crate::protocol::Capabilities::LOCAL_FILES;
    }

    let scrambled = options
        .password
        .as_deref()
        .map(|pw| auth::scramble(pw.as_bytes(), &handshake.salt))
        .unwrap_or_default();

    let response = HandshakeResponse {
        client_flags,
        charset: charset.id,
        username: &options.username,
        scrambled_password: scrambled,
        database: options.database.as_deref(),
    };

    framer.write_packet(&mut stream, &response.encode())?;

    let reply = framer.read_packet(&mut stream)?;
    match decode_response_head(&reply)? {
        ResponseHead::Ok(_) => {}
        ResponseHead::Err(err) => return Err(err.into_error()),
        other => {
            return Err(Error::protocol(format!(
                "unexpected packet after auth response: {:?}",
                other
            )))
        }
    }

    let connection = Connection::from_parts(NewConnection {
        stream,
        read_timeout: options.read_timeout,
        write_timeout: options.write_timeout,
        charset,
        server_version: handshake.server_version.clone(),
        server_version_num: parse_version_num(&handshake.server_version),
        thread_id: handshake.thread_id,
        capabilities: client_flags,
        init_command: options.init_command.clone(),
        reconnect: options.reconnect,
        local_infile: options.local_infile,
    })?;

    let mut connection = connection;
    // spec.md:161: the `charset` option "affects handshake and `SET
    // NAMES`" — the handshake-response charset byte only sets the
    // connection's notion of the charset; the server isn't told to
    // actually use it for this session until `SET NAMES` is issued.
    connection.query(&format!("SET NAMES {}", charset.name))?;
    connection.run_init_command_if_configured()?;
    Ok(connection)
}

/// Parse `"major.minor.patch..."` into `major*10000 + minor*100 + patch`
/// (spec §3 "packed int").
fn parse_version_num(version: &str) -> u32 {
    let mut parts = version.split(|c: char| !c.is_ascii_digit()).filter(|s| !s.is_empty());
    let major: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let patch: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    major * 10000 + minor * 100 + patch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_version_string() {
        assert_eq!(parse_version_num("5.1.34"), 50134);
    }

    #[test]
    fn parses_version_with_suffix() {
        assert_eq!(parse_version_num("8.0.34-log"), 80034);
    }
}
