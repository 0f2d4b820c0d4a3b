//! Per-network parameters for extended key export.

use crate::error::{Bip32Error, Result};
use crypto_utils::{Base58, Bits32, base58::BASE58_ALPHABET};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Index offset for hardened children: 2³¹.
pub const HARDENED_OFFSET: u32 = 0x8000_0000;

/// HMAC key used to expand a seed into the master key.
pub const BITCOIN_SEED: &str = "Bitcoin seed";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    /// Version bytes of serialized private keys (`xprv` on mainnet).
    pub export_private_prefix: Bits32,
    /// Version bytes of serialized public keys (`xpub` on mainnet).
    pub export_public_prefix: Bits32,
    #[serde(default = "default_hardened")]
    pub hardened_index_begins_from: u32,
    #[serde(default = "default_hmac_seed")]
    pub hmac_seed: String,
    #[serde(default = "default_charset")]
    pub base58_charset: String,
    #[serde(default = "default_case_sensitive")]
    pub base58_case_sensitive: bool,
}

fn default_hardened() -> u32 {
    HARDENED_OFFSET
}

fn default_hmac_seed() -> String {
    BITCOIN_SEED.to_string()
}

fn default_charset() -> String {
    String::from_utf8_lossy(BASE58_ALPHABET).into_owned()
}

fn default_case_sensitive() -> bool {
    true
}

impl NetworkConfig {
    pub fn new(name: &str, export_private_prefix: u32, export_public_prefix: u32) -> Self {
        NetworkConfig {
            name: name.to_string(),
            export_private_prefix: Bits32::from_u32(export_private_prefix),
            export_public_prefix: Bits32::from_u32(export_public_prefix),
            hardened_index_begins_from: default_hardened(),
            hmac_seed: default_hmac_seed(),
            base58_charset: default_charset(),
            base58_case_sensitive: default_case_sensitive(),
        }
    }

    pub fn bitcoin() -> Self {
        NetworkConfig::new("bitcoin", 0x0488_ADE4, 0x0488_B21E)
    }

    pub fn bitcoin_testnet() -> Self {
        NetworkConfig::new("bitcoin-testnet", 0x0435_8394, 0x0435_87CF)
    }

    /// Parses a config from JSON, validating it before use.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: NetworkConfig =
            serde_json::from_str(json).map_err(|e| Bip32Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.hardened_index_begins_from == 0 {
            return Err(Bip32Error::Config(
                "hardened index threshold must be non-zero".into(),
            ));
        }
        if self.hmac_seed.is_empty() {
            return Err(Bip32Error::Config("hmac seed must not be empty".into()));
        }
        if self.export_private_prefix == self.export_public_prefix {
            return Err(Bip32Error::Config(
                "private and public export prefixes must differ".into(),
            ));
        }
        self.base58()?;
        Ok(())
    }

    /// Base58 codec described by this config's charset.
    pub fn base58(&self) -> Result<Base58> {
        Base58::new(&self.base58_charset, self.base58_case_sensitive)
            .map_err(|e| Bip32Error::Config(e.to_string()))
    }

    pub fn is_hardened(&self, child_num: u32) -> bool {
        child_num >= self.hardened_index_begins_from
    }

    /// True if `version` is one of this network's export prefixes.
    pub fn knows_version(&self, version: &Bits32) -> bool {
        *version == self.export_private_prefix || *version == self.export_public_prefix
    }
}

/// Built-in networks.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Bitcoin,
    BitcoinTestnet,
}

static BITCOIN: Lazy<Arc<NetworkConfig>> = Lazy::new(|| Arc::new(NetworkConfig::bitcoin()));
static BITCOIN_TESTNET: Lazy<Arc<NetworkConfig>> =
    Lazy::new(|| Arc::new(NetworkConfig::bitcoin_testnet()));

impl Network {
    /// Shared, immutable config for this network, built on first use.
    pub fn config(self) -> Arc<NetworkConfig> {
        match self {
            Network::Bitcoin => Arc::clone(&BITCOIN),
            Network::BitcoinTestnet => Arc::clone(&BITCOIN_TESTNET),
        }
    }
}
