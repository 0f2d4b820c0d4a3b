use crate::error::{Bip32Error, Result};
use crypto_utils::{Bits32, ByteReader, Bytes32};

/// The 78-byte BIP32 wire form of an extended key.
///
/// | offset | size | field                    |
/// |--------|------|--------------------------|
/// | 0      | 4    | version                  |
/// | 4      | 1    | depth                    |
/// | 5      | 4    | parent fingerprint       |
/// | 9      | 4    | child number             |
/// | 13     | 32   | chain code               |
/// | 45     | 33   | key data                 |
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SerializedBip32Key([u8; SerializedBip32Key::SIZE]);

/// Fields of a serialized key, before any semantic validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawExtendedKey {
    pub version: Bits32,
    pub depth: u8,
    pub parent_pub_fp: Bits32,
    pub child_num: Bits32,
    pub chain_code: Bytes32,
    pub key_prefix: u8,
    pub key_bytes: Bytes32,
}

impl SerializedBip32Key {
    pub const SIZE: usize = 78;

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; Self::SIZE] = bytes.try_into().map_err(|_| Bip32Error::InvalidLength {
            expected: Self::SIZE,
            actual: bytes.len(),
        })?;
        Ok(SerializedBip32Key(arr))
    }

    pub(crate) fn build(
        version: Bits32,
        depth: u8,
        parent_pub_fp: Bits32,
        child_num: Bits32,
        chain_code: &Bytes32,
        key: &[u8; 33],
    ) -> Self {
        let mut out = [0u8; Self::SIZE];
        out[..4].copy_from_slice(version.as_bytes());
        out[4] = depth;
        out[5..9].copy_from_slice(parent_pub_fp.as_bytes());
        out[9..13].copy_from_slice(child_num.as_bytes());
        out[13..45].copy_from_slice(chain_code.as_bytes());
        out[45..].copy_from_slice(key);
        SerializedBip32Key(out)
    }

    pub fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    pub fn version(&self) -> Bits32 {
        Bits32::new([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    /// Splits the buffer into its fields.
    pub fn parse(&self) -> Result<RawExtendedKey> {
        let mut reader = ByteReader::new(&self.0);
        let raw = RawExtendedKey {
            version: reader.read_bits32()?,
            depth: reader.read_u8()?,
            parent_pub_fp: reader.read_bits32()?,
            child_num: reader.read_bits32()?,
            chain_code: reader.read_bytes32()?,
            key_prefix: reader.read_u8()?,
            key_bytes: reader.read_bytes32()?,
        };
        Ok(raw)
    }
}

impl AsRef<[u8]> for SerializedBip32Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SerializedBip32Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "SerializedBip32Key(version={}, depth={})",
            self.version().to_hex(),
            self.0[4]
        )
    }
}
