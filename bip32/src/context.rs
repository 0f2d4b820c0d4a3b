use crate::curve::Curve;
use crate::error::{Bip32Error, Result};
use crate::extended_key::{ExtendedKeyPair, KeyMaterial, MasterKeyPair};
use crate::keys::{PrivateKey, PublicKey};
use crate::network::{Network, NetworkConfig};
use crate::serialized::SerializedBip32Key;
use crypto_utils::{Base58, Bits32, Bits512, Bytes32, hmac::hmac_sha512};
use log::debug;
use secp256k1::rand::{RngCore, rngs::OsRng};
use std::sync::Arc;

/// Entry point tying a network config to a curve and a Base58 codec.
///
/// Every key built through a context carries a clone of it, so cloning must
/// stay cheap: the config sits behind an `Arc`.
#[derive(Clone, Debug)]
pub struct Bip32 {
    config: Arc<NetworkConfig>,
    curve: Curve,
    base58: Base58,
}

impl Bip32 {
    pub fn new(config: impl Into<Arc<NetworkConfig>>, curve: Curve) -> Result<Self> {
        let config = config.into();
        config.validate()?;
        let base58 = config.base58()?;
        Ok(Bip32 {
            config,
            curve,
            base58,
        })
    }

    /// Context for a built-in network on secp256k1.
    pub fn for_network(network: Network) -> Self {
        Bip32 {
            config: network.config(),
            curve: Curve::Secp256k1,
            base58: Base58::bitcoin(),
        }
    }

    pub fn bitcoin() -> Self {
        Bip32::for_network(Network::Bitcoin)
    }

    pub fn bitcoin_testnet() -> Self {
        Bip32::for_network(Network::BitcoinTestnet)
    }

    /// Replaces the codec derived from the config charset.
    pub fn with_base58(mut self, base58: Base58) -> Self {
        self.base58 = base58;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn base58(&self) -> &Base58 {
        &self.base58
    }

    pub(crate) fn same_network(&self, other: &Bip32) -> bool {
        self.curve == other.curve
            && (Arc::ptr_eq(&self.config, &other.config) || self.config == other.config)
    }

    /// 32 bytes from the operating system's CSPRNG.
    pub fn generate_secure_entropy(&self) -> Result<Bytes32> {
        let mut buf = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|e| Bip32Error::Entropy(e.to_string()))?;
        Ok(Bytes32::new(buf))
    }

    pub fn private_key_from_entropy(&self, entropy: &Bytes32) -> Result<PrivateKey> {
        PrivateKey::from_bytes(self.curve, entropy)
    }

    /// Rebuilds a public key from its 33-byte compressed form.
    pub fn public_key_from_incomplete(&self, compressed: &[u8]) -> Result<PublicKey> {
        PublicKey::from_compressed(self.curve, compressed)
    }

    /// Rebuilds a public key from its 65-byte SEC1 uncompressed form.
    pub fn public_key_from_der(&self, uncompressed: &[u8]) -> Result<PublicKey> {
        PublicKey::from_uncompressed(self.curve, uncompressed)
    }

    pub fn public_key_from_uncompressed(&self, uncompressed: &[u8]) -> Result<PublicKey> {
        self.public_key_from_der(uncompressed)
    }

    /// HMAC-SHA512 keyed with the network seed string (or `override_seed`).
    pub fn hmac_entropy(&self, entropy: &[u8], override_seed: Option<&str>) -> Bits512 {
        let key = override_seed.unwrap_or(&self.config.hmac_seed);
        Bits512::new(hmac_sha512(key.as_bytes(), entropy))
    }

    pub fn master_key_from_entropy(&self, entropy: &[u8]) -> Result<MasterKeyPair> {
        self.master_key_from_seed(&self.hmac_entropy(entropy, None))
    }

    /// Splits an expanded seed into master key (`IL`) and chain code (`IR`).
    pub fn master_key_from_seed(&self, seed: &Bits512) -> Result<MasterKeyPair> {
        let key = PrivateKey::from_bytes(self.curve, &seed.left())
            .map_err(|_| Bip32Error::InvalidMasterKey)?;
        debug!("created master key on network {}", self.config.name);
        MasterKeyPair::new(
            self,
            KeyMaterial::Private(key),
            0,
            Bits32::zero(),
            Bits32::zero(),
            seed.right(),
        )
    }

    pub fn extended_key(
        &self,
        key: KeyMaterial,
        chain_code: Bytes32,
        depth: u8,
        child_num: Bits32,
        parent_pub_fp: Bits32,
    ) -> ExtendedKeyPair {
        ExtendedKeyPair::new(self, key, depth, child_num, parent_pub_fp, chain_code)
    }

    pub fn unserialize(&self, ser: &SerializedBip32Key) -> Result<ExtendedKeyPair> {
        ExtendedKeyPair::unserialize(self, ser)
    }

    /// Base58Check-decodes and unserializes an `xprv`/`xpub` string.
    pub fn from_base58(&self, s: &str) -> Result<ExtendedKeyPair> {
        let data = self.base58.check_decode(s)?;
        let ser = SerializedBip32Key::from_slice(&data)?;
        self.unserialize(&ser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn hmac_entropy_uses_network_seed() {
        let bip32 = Bip32::bitcoin();
        let seed = hex!("000102030405060708090a0b0c0d0e0f");
        let out = bip32.hmac_entropy(&seed, None);
        assert_eq!(
            out.left().as_bytes(),
            &hex!("e8f32e723decf4051aefac8e2c93c9c5b214313817cdb01a1494b917c8436b35")
        );
        assert_ne!(bip32.hmac_entropy(&seed, Some("Nist256p1 seed")), out);
    }

    #[test]
    fn master_key_from_seed_layout() {
        let bip32 = Bip32::bitcoin();
        let seed = bip32.hmac_entropy(&hex!("000102030405060708090a0b0c0d0e0f"), None);
        let m = bip32.master_key_from_seed(&seed).unwrap();
        assert_eq!(m.depth(), 0);
        assert!(m.child_num().is_zero_bytes());
        assert!(m.parent_pub_fp().is_zero_bytes());
        assert_eq!(m.chain_code(), &seed.right());
        assert_eq!(m.private_key().unwrap().to_bytes(), seed.left());
    }

    #[test]
    fn invalid_master_scalar() {
        let bip32 = Bip32::bitcoin();
        let mut raw = [0u8; 64];
        raw[32..].fill(1);
        assert_eq!(
            bip32.master_key_from_seed(&Bits512::new(raw)).unwrap_err(),
            Bip32Error::InvalidMasterKey
        );
    }

    #[test]
    fn secure_entropy_is_random() {
        let bip32 = Bip32::bitcoin();
        let a = bip32.generate_secure_entropy().unwrap();
        let b = bip32.generate_secure_entropy().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn custom_config_context() {
        let cfg = NetworkConfig::new("regtest-like", 0x0435_8394, 0x0435_87CF);
        let bip32 = Bip32::new(cfg, Curve::Secp256k1).unwrap();
        assert_eq!(bip32.base58(), &Base58::bitcoin());
        let mut bad = NetworkConfig::bitcoin();
        bad.hardened_index_begins_from = 0;
        assert!(matches!(
            Bip32::new(bad, Curve::Secp256k1),
            Err(Bip32Error::Config(_))
        ));
    }

    #[test]
    fn public_key_constructors() {
        let bip32 = Bip32::bitcoin();
        let sk = bip32
            .private_key_from_entropy(&Bytes32::new([0x33; 32]))
            .unwrap();
        let pk = sk.public_key();
        assert_eq!(bip32.public_key_from_incomplete(&pk.compressed()).unwrap(), pk);
        assert_eq!(bip32.public_key_from_der(&pk.uncompressed()).unwrap(), pk);
        assert!(bip32.public_key_from_incomplete(&[0x02; 32]).is_err());
    }
}
