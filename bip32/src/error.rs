use crypto_utils::{Base58Error, Bits32, BufferError};
use thiserror::Error;

/// What a caller can do about a failed child derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveHint {
    /// `IL >= n` or the child key is zero/infinity; this index is unusable,
    /// the next one may succeed.
    TryNextIndex,
    /// Hardened derivation was requested from a public-only key.
    PrivateKeyRequired,
    /// The parent already sits at depth 255.
    DepthExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Bip32Error {
    #[error("invalid derivation path: {0}")]
    InvalidPath(String),
    #[error("child index {0:#x} is outside the non-hardened range")]
    InvalidIndex(u32),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("base58: {0}")]
    Base58(Base58Error),
    #[error("invalid network configuration: {0}")]
    Config(String),

    #[error("child key derivation failed: {message}")]
    Derivation { message: String, hint: DeriveHint },
    #[error("seed does not produce a valid master key")]
    InvalidMasterKey,

    #[error("base58check checksum does not match")]
    Checksum,
    #[error("unknown extended key version {0:?}")]
    InvalidVersion(Bits32),
    #[error("cannot unserialize extended key: {0}")]
    Unserialize(String),
    #[error("invalid key data: {0}")]
    InvalidKeyData(String),

    #[error("{op} failed: {source}")]
    Curve {
        op: &'static str,
        source: secp256k1::Error,
    },
    #[error("private key is required to {0}")]
    MissingPrivateKey(&'static str),
    #[error("secure entropy unavailable: {0}")]
    Entropy(String),
}

impl Bip32Error {
    pub(crate) fn derivation(hint: DeriveHint, message: impl Into<String>) -> Self {
        Bip32Error::Derivation {
            message: message.into(),
            hint,
        }
    }

    pub(crate) fn curve(op: &'static str) -> impl FnOnce(secp256k1::Error) -> Self {
        move |source| Bip32Error::Curve { op, source }
    }

    /// The derivation hint, if this is a derivation failure.
    pub fn hint(&self) -> Option<DeriveHint> {
        match self {
            Bip32Error::Derivation { hint, .. } => Some(*hint),
            _ => None,
        }
    }

    /// True when retrying with the next child index is the correct response.
    pub fn is_retryable(&self) -> bool {
        self.hint() == Some(DeriveHint::TryNextIndex)
    }
}

impl From<Base58Error> for Bip32Error {
    fn from(e: Base58Error) -> Self {
        match e {
            Base58Error::InvalidChecksum => Bip32Error::Checksum,
            other => Bip32Error::Base58(other),
        }
    }
}

impl From<BufferError> for Bip32Error {
    fn from(e: BufferError) -> Self {
        match e {
            BufferError::InvalidLength { expected, actual } => {
                Bip32Error::InvalidLength { expected, actual }
            }
            other => Bip32Error::Unserialize(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Bip32Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_try_next_index_is_retryable() {
        assert!(Bip32Error::derivation(DeriveHint::TryNextIndex, "IL >= n").is_retryable());
        assert!(!Bip32Error::derivation(DeriveHint::PrivateKeyRequired, "hardened").is_retryable());
        assert!(!Bip32Error::Checksum.is_retryable());
        assert_eq!(Bip32Error::Checksum.hint(), None);
    }

    #[test]
    fn base58_checksum_maps_to_checksum() {
        assert_eq!(Bip32Error::from(Base58Error::InvalidChecksum), Bip32Error::Checksum);
        assert_eq!(
            Bip32Error::from(Base58Error::InvalidLength),
            Bip32Error::Base58(Base58Error::InvalidLength)
        );
    }

    #[test]
    fn messages_are_readable() {
        let e = Bip32Error::curve("sign")(secp256k1::Error::InvalidSecretKey);
        assert!(e.to_string().starts_with("sign failed"));
        assert_eq!(
            Bip32Error::InvalidIndex(0x8000_0000).to_string(),
            "child index 0x80000000 is outside the non-hardened range"
        );
    }
}
