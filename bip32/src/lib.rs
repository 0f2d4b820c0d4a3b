pub mod context;
pub mod curve;
pub mod derivation;
pub mod error;
pub mod extended_key;
pub mod keys;
pub mod network;
pub mod serialized;
pub mod signature;

pub use context::Bip32;
pub use curve::{Curve, EllipticCurve};
pub use derivation::{ChildIndex, DerivationPath};
pub use error::{Bip32Error, DeriveHint};
pub use extended_key::{ExtendedKeyPair, KeyMaterial, MasterKeyPair};
pub use keys::{PrivateKey, PublicKey};
pub use network::{HARDENED_OFFSET, Network, NetworkConfig};
pub use serialized::SerializedBip32Key;
pub use signature::Signature;
