use crate::{Bip32Error, ExtendedKeyPair, error::Result};
use std::fmt;
use std::str::FromStr;

/// One path component: an index below the hardened threshold plus a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildIndex {
    pub index: u32,
    pub hardened: bool,
}

impl ChildIndex {
    pub fn normal(index: u32) -> Self {
        ChildIndex {
            index,
            hardened: false,
        }
    }

    pub fn hardened(index: u32) -> Self {
        ChildIndex {
            index,
            hardened: true,
        }
    }
}

impl fmt::Display for ChildIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hardened {
            write!(f, "{}'", self.index)
        } else {
            write!(f, "{}", self.index)
        }
    }
}

/// A BIP-32 derivation path (e.g., "m/44'/0'/0'/0/1").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivationPath(pub Vec<ChildIndex>);

impl FromStr for DerivationPath {
    type Err = Bip32Error;

    /// Parses `m/44'/0'/0'/0/0`. The root `m` is case-insensitive and
    /// surrounding slashes are ignored; every component must match `[0-9]+'?`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim_matches('/').split('/');
        match parts.next() {
            Some(root) if root.eq_ignore_ascii_case("m") => {}
            _ => {
                return Err(Bip32Error::InvalidPath(
                    "derivation path must start with \"m\"".into(),
                ));
            }
        }

        let mut indices = Vec::new();
        for part in parts {
            let (digits, hardened) = match part.strip_suffix('\'') {
                Some(d) => (d, true),
                None => (part, false),
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(Bip32Error::InvalidPath(format!(
                    "invalid index {:?} in derivation path",
                    part
                )));
            }
            let index: u32 = digits
                .parse()
                .map_err(|_| Bip32Error::InvalidPath(format!("index {} does not fit 32 bits", digits)))?;
            if index >= crate::network::HARDENED_OFFSET {
                return Err(Bip32Error::InvalidPath(format!(
                    "index {} must be below 2^31",
                    index
                )));
            }
            indices.push(ChildIndex { index, hardened });
        }
        Ok(DerivationPath(indices))
    }
}

impl fmt::Display for DerivationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m")?;
        for child in &self.0 {
            write!(f, "/{}", child)?;
        }
        Ok(())
    }
}

impl DerivationPath {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildIndex> {
        self.0.iter()
    }

    /// Applies each component in turn, starting from `root`.
    ///
    /// Hardened components need a private key at every step; a derivation
    /// error aborts the walk and is returned unchanged so callers can inspect
    /// its hint.
    pub fn derive_from(&self, root: &ExtendedKeyPair) -> Result<ExtendedKeyPair> {
        let mut key = root.clone();
        for child in &self.0 {
            key = key.derive(child.index, child.hardened)?;
        }
        Ok(key)
    }
}
