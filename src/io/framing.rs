//! Packet framing: `[u24 length][u8 seq_id][payload]`, split across
//! continuation packets above 16 MiB, with the per-exchange sequence-id
//! invariant.
//!
//! Grounded on the read/write loop in
//! `other_examples/elbaro-zero-mysql::sync::conn::{read_payload, write_payload}`
//! (chunking + trailing zero-length packet), adapted to this crate's
//! blocking `Read + Write` stream and `Error` type instead of that crate's
//! `zerocopy` buffers.

use std::io::{Read, Write};

use crate::error::{Error, Result};

pub const MAX_PACKET_CHUNK: usize = 0xFF_FFFF;

/// Tracks the per-exchange sequence id and performs the read/write side of
/// framing over a single connection's stream.
///
/// A command exchange resets `next_seq` to 0; every packet read or written
/// thereafter must carry the previous id + 1 (mod 256), in either
/// direction, until the exchange ends. A mismatch is a fatal protocol
/// error (spec §4.2).
pub struct Framer {
    next_seq: u8,
}

impl Framer {
    pub fn new() -> Self {
        Framer { next_seq: 0 }
    }

    /// Reset the sequence counter to 0 at the start of a new command
    /// exchange.
    pub fn begin_command(&mut self) {
        self.next_seq = 0;
    }

    pub fn next_seq(&self) -> u8 {
        self.next_seq
    }

    /// Read one logical packet, concatenating continuation packets whose
    /// length is exactly `0xFFFFFF`. Returns the payload and the sequence
    /// id of the final physical packet read.
    pub fn read_packet<R: Read>(&mut self, reader: &mut R) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header = [0u8; 4];
            reader.read_exact(&mut header)?;
            let length = u32::from(header[0])
                | (u32::from(header[1]) << 8)
                | (u32::from(header[2]) << 16);
            let seq_id = header[3];

            self.check_seq(seq_id)?;

            let mut chunk = vec![0u8; length as usize];
            reader.read_exact(&mut chunk)?;
            payload.extend_from_slice(&chunk);

            if (length as usize) < MAX_PACKET_CHUNK {
                break;
            }
        }
        Ok(payload)
    }

    /// Write one logical packet, splitting into <=16 MiB chunks. If the
    /// final chunk is exactly 16 MiB, a trailing zero-length packet is
    /// emitted so the reader knows the message ended.
    pub fn write_packet<W: Write>(&mut self, writer: &mut W, payload: &[u8]) -> Result<()> {
        let mut offset = 0;
        loop {
            let remaining = payload.len() - offset;
            let chunk_len = remaining.min(MAX_PACKET_CHUNK);
            let chunk = &payload[offset..offset + chunk_len];

            let seq_id = self.take_seq();
            let mut header = [0u8; 4];
            header[0] = (chunk_len & 0xFF) as u8;
            header[1] = ((chunk_len >> 8) & 0xFF) as u8;
            header[2] = ((chunk_len >> 16) & 0xFF) as u8;
            header[3] = seq_id;

            writer.write_all(&header)?;
            writer.write_all(chunk)?;

            offset += chunk_len;

            if chunk_len < MAX_PACKET_CHUNK {
                break;
            }
            if offset == payload.len() {
                // Final chunk was exactly MAX_PACKET_CHUNK: emit the
                // trailing empty packet.
                let seq_id = self.take_seq();
                writer.write_all(&[0, 0, 0, seq_id])?;
                break;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Advance the sequence counter and hand back the id the caller should
    /// stamp on the packet it is about to write.
    fn take_seq(&mut self) -> u8 {
        let id = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        id
    }

    fn check_seq(&mut self, observed: u8) -> Result<()> {
        if observed != self.next_seq {
            return Err(Error::protocol(format!(
                "packet sequence id mismatch: expected {}, got {}",
                self.next_seq, observed
            )));
        }
        self.next_seq = self.next_seq.wrapping_add(1);
        Ok(())
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_single_short_packet() {
        let mut framer = Framer::new();
        let mut data = Cursor::new(vec![3, 0, 0, 0, b'a', b'b', b'c']);
        let payload = framer.read_packet(&mut data).unwrap();
        assert_eq!(payload, b"abc");
        assert_eq!(framer.next_seq(), 1);
    }

    #[test]
    fn rejects_sequence_gap() {
        let mut framer = Framer::new();
        let mut data = Cursor::new(vec![1, 0, 0, 5, b'a']);
        assert!(framer.read_packet(&mut data).is_err());
    }

    #[test]
    fn write_then_read_roundtrip() {
        let mut out = Vec::new();
        let mut writer_framer = Framer::new();
        writer_framer.write_packet(&mut out, b"select 1").unwrap();

        let mut reader_framer = Framer::new();
        let mut cur = Cursor::new(out);
        let payload = reader_framer.read_packet(&mut cur).unwrap();
        assert_eq!(payload, b"select 1");
    }

    #[test]
    fn splits_large_payload_across_chunks() {
        let big = vec![0x42u8; MAX_PACKET_CHUNK + 10];
        let mut out = Vec::new();
        let mut framer = Framer::new();
        framer.write_packet(&mut out, &big).unwrap();

        // Two physical packets: one full 16 MiB chunk, one 10-byte tail.
        assert_eq!(out.len(), 4 + MAX_PACKET_CHUNK + 4 + 10);

        let mut reader_framer = Framer::new();
        let mut cur = Cursor::new(out);
        let payload = reader_framer.read_packet(&mut cur).unwrap();
        assert_eq!(payload, big);
    }

    #[test]
    fn emits_trailing_empty_packet_when_final_chunk_is_exactly_max() {
        let exact = vec![0x01u8; MAX_PACKET_CHUNK];
        let mut out = Vec::new();
        let mut framer = Framer::new();
        framer.write_packet(&mut out, &exact).unwrap();

        assert_eq!(out.len(), 4 + MAX_PACKET_CHUNK + 4);
        // trailing packet header has length 0
        let trailer = &out[4 + MAX_PACKET_CHUNK..];
        assert_eq!(&trailer[..3], &[0, 0, 0]);
    }
}
