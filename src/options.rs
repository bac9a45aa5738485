//! Connection options and URL parsing (spec §6 "Connection URL",
//! "Configuration options").
//!
//! Grounded on the `*ConnectOptions` builder pattern used throughout
//! `sqlx-core`/`sqlx-mysql`'s `options.rs` modules, built on the same
//! `url` + `percent-encoding` crates.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Transport the connection should use (spec §6 "Transport").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

#[derive(Debug, Clone)]
pub struct MySqlConnectOptions {
    pub transport: Transport,
    pub username: String,
    pub password: Option<String>,
    pub database: Option<String>,
    pub charset: Option<String>,
    pub init_command: Option<String>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub local_infile: bool,
    pub reconnect: bool,
}

impl Default for MySqlConnectOptions {
    fn default() -> Self {
        MySqlConnectOptions {
            transport: Transport::Tcp { host: "localhost".into(), port: 3306 },
            username: String::new(),
            password: None,
            database: None,
            charset: None,
            init_command: None,
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
            local_infile: false,
            reconnect: false,
        }
    }
}

impl MySqlConnectOptions {
    /// Parse a `mysql://[user[:password]@]host[:port]/[db][?opt=val...]`
    /// URL (spec §6).
    ///
    /// Host `"localhost"` or absent selects the Unix transport at the
    /// `socket` query option (default `/tmp/mysql.sock`); any other host
    /// selects TCP (default port 3306).
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "mysql" {
            return Err(Error::client(format!(
                "unsupported connection url scheme `{}`",
                parsed.scheme()
            )));
        }

        let mut opts = MySqlConnectOptions::default();

        opts.username = percent_decode(parsed.username());
        opts.password = parsed.password().map(percent_decode);

        let db = parsed.path().trim_start_matches('/');
        if !db.is_empty() {
            opts.database = Some(percent_decode(db));
        }

        let host = parsed.host_str();
        let mut socket_path: Option<String> = None;

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "socket" => socket_path = Some(value.into_owned()),
                "init_command" => opts.init_command = Some(value.into_owned()),
                "connect_timeout" => opts.connect_timeout = Some(parse_seconds(&value)?),
                "read_timeout" => opts.read_timeout = Some(parse_seconds(&value)?),
                "write_timeout" => opts.write_timeout = Some(parse_seconds(&value)?),
                "local_infile" => opts.local_infile = parse_flag(&value)?,
                "charset" => opts.charset = Some(value.into_owned()),
                "reconnect" => opts.reconnect = parse_flag(&value)?,
                other => return Err(Error::UnknownOption(other.to_string())),
            }
        }

        opts.transport = match host {
            None | Some("localhost") | Some("") => Transport::Unix {
                path: socket_path.unwrap_or_else(|| "/tmp/mysql.sock".to_string()),
            },
            Some(h) => Transport::Tcp {
                host: h.to_string(),
                port: parsed.port().unwrap_or(3306),
            },
        };

        Ok(opts)
    }
}

fn percent_decode(s: &str) -> String {
    percent_encoding::percent_decode_str(s)
        .decode_utf8_lossy()
        .into_owned()
}

fn parse_seconds(v: &str) -> Result<Duration> {
    let secs: u64 = v
        .parse()
        .map_err(|_| Error::client(format!("invalid duration `{}`", v)))?;
    Ok(Duration::from_secs(secs))
}

fn parse_flag(v: &str) -> Result<bool> {
    match v {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::client(format!("invalid boolean flag `{}`", other))),
    }
}
