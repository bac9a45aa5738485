//! A native, synchronous driver for the MySQL 4.1+ binary wire protocol.
//!
//! Handshake and native-4.1 authentication, text queries, prepared
//! statements, and result decoding — including the binary row format used
//! by prepared statements — all over a blocking `std::net`/
//! `std::os::unix::net` transport. No TLS, no compression, no connection
//! pooling, no async I/O: see the crate's design notes for the full list
//! of non-goals.
//!
//! ```no_run
//! use mysql_native::{Connection, MySqlConnectOptions};
//!
//! # fn main() -> mysql_native::Result<()> {
//! let options = MySqlConnectOptions::parse("mysql://root@localhost/test")?;
//! let mut conn = Connection::connect(&options)?;
//! let mut rs = conn.query("select 1")?.into_result_set()?;
//! while let Some(row) = rs.fetch_row() {
//!     println!("{:?}", row.get(0));
//! }
//! # Ok(())
//! # }
//! ```

pub mod charset;
pub mod connection;
pub mod error;
pub mod io;
pub mod options;
pub mod protocol;
pub mod result;
pub mod statement;

pub use connection::{CommandOutcome, Connection};
pub use error::{Error, Result};
pub use options::MySqlConnectOptions;
pub use protocol::{MySqlTime, Value};
pub use result::{ResultSet, Row};
pub use statement::Statement;
