//! Fixed-length byte containers and a bounds-checked reader.

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("buffer underflow: wanted {wanted} bytes, {remaining} remaining")]
    Underflow { wanted: usize, remaining: usize },
    #[error("invalid hex string")]
    InvalidHex,
}

macro_rules! fixed_buffer {
    ($(#[$meta:meta])* $name:ident, $size:expr) => {
        $(#[$meta])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name([u8; $size]);

        impl $name {
            pub const SIZE: usize = $size;

            pub const fn new(bytes: [u8; $size]) -> Self {
                $name(bytes)
            }

            pub const fn zero() -> Self {
                $name([0u8; $size])
            }

            pub fn from_slice(bytes: &[u8]) -> Result<Self, BufferError> {
                let arr: [u8; $size] = bytes.try_into().map_err(|_| BufferError::InvalidLength {
                    expected: $size,
                    actual: bytes.len(),
                })?;
                Ok($name(arr))
            }

            pub fn from_hex(s: &str) -> Result<Self, BufferError> {
                let bytes = hex::decode(s).map_err(|_| BufferError::InvalidHex)?;
                Self::from_slice(&bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $size] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn is_zero_bytes(&self) -> bool {
                self.0.iter().all(|&b| b == 0)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $size]> for $name {
            fn from(bytes: [u8; $size]) -> Self {
                $name(bytes)
            }
        }

        impl From<$name> for [u8; $size] {
            fn from(buf: $name) -> Self {
                buf.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }
    };
}

fixed_buffer!(
    /// 4-byte big-endian value: version prefixes, child numbers, fingerprints.
    Bits32,
    4
);

fixed_buffer!(
    /// 32-byte value: scalars, chain codes, message hashes.
    Bytes32,
    32
);

fixed_buffer!(
    /// 64-byte HMAC-SHA512 output.
    Bits512,
    64
);

impl Bits32 {
    pub const fn from_u32(value: u32) -> Self {
        Bits32(value.to_be_bytes())
    }

    pub const fn to_u32(&self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl Bits512 {
    /// Left 32 bytes (`IL` in BIP32 terms).
    pub fn left(&self) -> Bytes32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[..32]);
        Bytes32(out)
    }

    /// Right 32 bytes (`IR`, the chain code).
    pub fn right(&self) -> Bytes32 {
        let mut out = [0u8; 32];
        out.copy_from_slice(&self.0[32..]);
        Bytes32(out)
    }
}

// Version prefixes live in config files as 8 hex digits.
impl Serialize for Bits32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Bits32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        Bits32::from_hex(s).map_err(de::Error::custom)
    }
}

/// Sequential reader over a byte slice that reports underflow instead of panicking.
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn next(&mut self, len: usize) -> Result<&'a [u8], BufferError> {
        if len > self.remaining() {
            return Err(BufferError::Underflow {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.next(1)?[0])
    }

    pub fn read_bits32(&mut self) -> Result<Bits32, BufferError> {
        Bits32::from_slice(self.next(4)?)
    }

    pub fn read_u32_be(&mut self) -> Result<u32, BufferError> {
        Ok(self.read_bits32()?.to_u32())
    }

    pub fn read_bytes32(&mut self) -> Result<Bytes32, BufferError> {
        Bytes32::from_slice(self.next(32)?)
    }
}
