//! Client/server capability flags.
//!
//! Grounded on `mason-mariadb`'s `bitflags!` use for `Capabilities` (see
//! `protocol/packets/initial.rs`), values per spec §3/§4.3.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Capabilities: u32 {
        const LONG_PASSWORD     = 0x0000_0001;
        const FOUND_ROWS        = 0x0000_0002;
        const LONG_FLAG         = 0x0000_0004;
        const CONNECT_WITH_DB   = 0x0000_0008;
        const NO_SCHEMA         = 0x0000_0010;
        const COMPRESS          = 0x0000_0020;
        const ODBC              = 0x0000_0040;
        const LOCAL_FILES       = 0x0000_0080;
        const IGNORE_SPACE      = 0x0000_0100;
        const PROTOCOL_41       = 0x0000_0200;
        const INTERACTIVE       = 0x0000_0400;
        const SSL                = 0x0000_0800;
        const TRANSACTIONS      = 0x0000_2000;
        const SECURE_CONNECTION = 0x0000_8000;
        const MULTI_STATEMENTS  = 0x0001_0000;
        const MULTI_RESULTS     = 0x0002_0000;
        const PLUGIN_AUTH       = 0x0008_0000;
        const CONNECT_ATTRS     = 0x0010_0000;
        const PLUGIN_AUTH_LENENC_CLIENT_DATA = 0x0020_0000;
        const CLIENT_DEPRECATE_EOF = 0x0100_0000;
    }
}

/// Capability flags this driver always requests (spec §3).
pub const BASE_CAPABILITIES: Capabilities = Capabilities::LONG_PASSWORD
    .union(Capabilities::LONG_FLAG)
    .union(Capabilities::TRANSACTIONS)
    .union(Capabilities::PROTOCOL_41)
    .union(Capabilities::SECURE_CONNECTION);
