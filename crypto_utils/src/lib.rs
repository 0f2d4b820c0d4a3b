pub mod base58;
pub mod buffers;
pub mod hash;
pub mod hmac;

pub use base58::{Base58, Base58Error};
pub use buffers::{Bits32, Bits512, BufferError, ByteReader, Bytes32};
