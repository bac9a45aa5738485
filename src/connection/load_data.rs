//! `LOAD DATA LOCAL INFILE` sub-protocol (spec §4.3 "Response
//! discrimination" `0xFB` case, §4.5 "For LOAD DATA LOCAL INFILE...").
//!
//! Grounded on the framing layer's chunking contract (`crate::io::Framer`)
//! plus `mason-mariadb`'s command-response dispatch, extended with the
//! streaming sub-exchange spec.md calls for.

use std::fs::File;
use std::io::Read as _;

use crate::error::Result;
use crate::io::framing::MAX_PACKET_CHUNK;

use super::Connection;

/// Stream `path`'s contents to the server as packet payloads, chunked to
/// the framing layer's limit, followed by a zero-length terminator packet
/// (spec §4.5).
pub(super) fn stream_local_infile(conn: &mut Connection, path: &str) -> Result<()> {
    let mut file = File::open(path)?;
    let mut chunk = vec![0u8; MAX_PACKET_CHUNK];

    loop {
        let n = read_full(&mut file, &mut chunk)?;
        if n == 0 {
            break;
        }
        conn.framer_mut().write_packet(conn.stream_mut(), &chunk[..n])?;
        if n < chunk.len() {
            break;
        }
    }

    conn.framer_mut().write_packet(conn.stream_mut(), &[])
}

/// `Read::read` may return short reads; fill `buf` as much as possible
/// before handing back to the caller, short only at EOF.
fn read_full(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn read_full_reads_until_eof() {
        let mut tmp = tempfile_with_content(b"hello world");
        let mut buf = vec![0u8; 1024];
        let n = read_full(&mut tmp, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"hello world");
    }

    fn tempfile_with_content(content: &[u8]) -> File {
        let path = std::env::temp_dir().join(format!(
            "mysql_native_test_{}_{}.tmp",
            std::process::id(),
            content.len()
        ));
        let mut f = File::create(&path).unwrap();
        f.write_all(content).unwrap();
        drop(f);
        File::open(&path).unwrap()
    }
}
