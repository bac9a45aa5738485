//! Initial handshake and client-auth-response packet grammars (spec §4.3).
//!
//! Grounded on `mason-mariadb/src/protocol/packets/initial.rs` and
//! `handshake_response.rs`, rewritten against this crate's `PacketBuf`/
//! `PacketBufMut` instead of that crate's `Decoder`/`Encoder` traits.

use crate::error::{Error, Result};
use crate::io::{PacketBuf, PacketBufMut};
use crate::protocol::capabilities::Capabilities;

/// Server's initial handshake packet.
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub thread_id: u32,
    pub salt: [u8; 20],
    pub capabilities: Capabilities,
    pub charset: u8,
    pub status: u16,
}

impl InitialHandshake {
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut buf = PacketBuf::new(payload);

        let protocol_version = buf.get_u8()?;
        if protocol_version != 10 {
            return Err(Error::protocol(format!(
                "unsupported handshake protocol version {}",
                protocol_version
            )));
        }

        let server_version = String::from_utf8_lossy(buf.get_str_nul()?).into_owned();
        let thread_id = buf.get_u32()?;

        let mut salt = [0u8; 20];
        salt[..8].copy_from_slice(buf.get_bytes(8)?);
        buf.skip(1); // filler 0x00

        let caps_lower = buf.get_u16()?;
        let charset = buf.get_u8()?;
        let status = buf.get_u16()?;
        let caps_upper = buf.get_u16()?;
        buf.skip(1); // scramble length, unused: part 2 is NUL-terminated regardless
        buf.skip(10); // reserved

        // Scramble part 2 is at least 12 bytes, NUL-terminated.
        let part2 = buf.get_str_nul()?;
        let take = part2.len().min(12);
        salt[8..8 + take].copy_from_slice(&part2[..take]);

        let capabilities = Capabilities::from_bits_truncate(
            (caps_lower as u32) | ((caps_upper as u32) << 16),
        );

        Ok(InitialHandshake {
            protocol_version,
            server_version,
            thread_id,
            salt,
            capabilities,
            charset,
            status,
        })
    }
}

/// Client's handshake-response / authentication packet.
pub struct HandshakeResponse<'a> {
    pub client_flags: Capabilities,
    pub charset: u8,
    pub username: &'a str,
    pub scrambled_password: Vec<u8>,
    pub database: Option<&'a str>,
}

impl<'a> HandshakeResponse<'a> {
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = self.client_flags;
        if self.database.is_some() {
            flags |= Capabilities::CONNECT_WITH_DB;
        }

        let mut buf = Vec::new();
        buf.put_u32(flags.bits());
        buf.put_u32(1 << 30); // max packet size, 1 GiB
        buf.put_u8(self.charset);
        buf.put_bytes(&[0u8; 23]);
        buf.put_str_nul(self.username.as_bytes());
        buf.put_lenenc_bytes(Some(&self.scrambled_password));
        if let Some(db) = self.database {
            buf.put_str_nul(db.as_bytes());
        }
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_handshake_payload() -> Vec<u8> {
        let mut p = Vec::new();
        p.put_u8(10);
        p.put_str_nul(b"5.1.34");
        p.put_u32(42);
        p.put_bytes(b"12345678");
        p.put_u8(0);
        p.put_u16(0xFFFF);
        p.put_u8(33);
        p.put_u16(0x0002);
        p.put_u16(0xFFFF);
        p.put_u8(21);
        p.put_bytes(&[0u8; 10]);
        p.put_str_nul(b"9ABCDEFGHIJK");
        p
    }

    #[test]
    fn decodes_scenario_handshake() {
        let payload = sample_handshake_payload();
        let hs = InitialHandshake::decode(&payload).unwrap();
        assert_eq!(hs.protocol_version, 10);
        assert_eq!(hs.server_version, "5.1.34");
        assert_eq!(hs.thread_id, 42);
        assert_eq!(&hs.salt, b"123456789ABCDEFGHIJK");
        assert_eq!(hs.charset, 33);
        assert_eq!(hs.status, 0x0002);
    }

    #[test]
    fn rejects_non_v10_protocol() {
        let mut p = Vec::new();
        p.put_u8(9);
        assert!(InitialHandshake::decode(&p).is_err());
    }

    #[test]
    fn encodes_auth_response_with_db() {
        let resp = HandshakeResponse {
            client_flags: Capabilities::PROTOCOL_41,
            charset: 33,
            username: "u",
            scrambled_password: vec![1; 20],
            database: Some("d"),
        };
        let bytes = resp.encode();
        // flags(4) + max_packet(4) + charset(1) + filler(23) + "u\0"(2) +
        // lenenc tag(1) + 20 scrambled bytes + "d\0"(2)
        assert_eq!(bytes.len(), 4 + 4 + 1 + 23 + 2 + 1 + 20 + 2);
        assert!(Capabilities::from_bits_truncate(u32::from_le_bytes(
            bytes[0..4].try_into().unwrap()
        ))
        .contains(Capabilities::CONNECT_WITH_DB));
    }
}
