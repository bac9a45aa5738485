//! Wire codec and packet framing — the bottom two layers of the protocol
//! engine (spec §4.1, §4.2).

pub mod buf;
pub mod buf_mut;
pub mod framing;

pub use buf::PacketBuf;
pub use buf_mut::PacketBufMut;
pub use framing::Framer;
