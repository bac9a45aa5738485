//! Error and Result types.
//!
//! Shaped after `sqlx_core::error::Error`: one flat enum covering every way
//! a call into this crate can fail, with a `DatabaseError` carried verbatim
//! from an `ERR` packet rather than stringified at the point of receipt.

use std::io;

use thiserror::Error;

/// A specialized `Result` for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a call into this driver can fail.
///
/// Three kinds, per the error-handling design: client misuse, protocol
/// violations (always fatal to the connection), and server-reported errors
/// (the connection remains usable).
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure (connect/read/write/timeout). Always fatal to the
    /// connection.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The connection URL was malformed.
    #[error("invalid connection url: {0}")]
    UrlParse(#[from] url::ParseError),

    /// An unrecognized or unsupported configuration option was supplied.
    #[error("unknown or unsupported connection option `{0}`")]
    UnknownOption(String),

    /// Received bytes did not conform to the wire grammar. Always fatal to
    /// the connection (marks it unusable).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server returned an `ERR` packet. The connection remains usable.
    #[error("{code}: {message} (sqlstate {})", String::from_utf8_lossy(sqlstate))]
    Server {
        code: u16,
        sqlstate: [u8; 5],
        message: String,
    },

    /// Misuse of the API: wrong arity, fetching before prepare, etc.
    #[error("client error: {0}")]
    Client(String),

    /// No rows were returned by a query that expected at least one.
    #[error("no rows returned")]
    RowNotFound,

    /// A column index or name did not exist on a row.
    #[error("column not found: {0}")]
    ColumnNotFound(String),
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    pub fn client(msg: impl Into<String>) -> Self {
        Error::Client(msg.into())
    }

    /// Whether this error leaves the connection unusable. Transport and
    /// protocol failures are fatal; server errors and client misuse are
    /// not.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Protocol(_))
    }

    /// The five-character SQLSTATE, defaulting to `"00000"` for errors that
    /// did not originate from a server `ERR` packet.
    pub fn sqlstate(&self) -> String {
        match self {
            Error::Server { sqlstate, .. } => {
                String::from_utf8_lossy(sqlstate).into_owned()
            }
            _ => "00000".to_string(),
        }
    }

    /// The server-assigned error number, or 0 if this did not originate
    /// from a server `ERR` packet.
    pub fn errno(&self) -> u16 {
        match self {
            Error::Server { code, .. } => *code,
            _ => 0,
        }
    }
}
