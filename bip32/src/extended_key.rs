use crate::context::Bip32;
use crate::derivation::DerivationPath;
use crate::error::{Bip32Error, DeriveHint, Result};
use crate::keys::{PrivateKey, PublicKey};
use crate::serialized::SerializedBip32Key;
use crate::curve::Curve;
use crypto_utils::{Bits32, Bits512, Bytes32, hmac::hmac_sha512};
use log::{debug, trace};
use once_cell::sync::OnceCell;
use secp256k1::{Scalar, SecretKey};
use std::fmt;
use std::ops::Deref;

/// The key held by an extended key: exactly one of private or public.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMaterial {
    Private(PrivateKey),
    Public(PublicKey),
}

/// A key bundled with its chain code and tree position.
///
/// Derivation never mutates `self`; each child is a new value that copies the
/// parent's fingerprint instead of referencing the parent.
#[derive(Clone)]
pub struct ExtendedKeyPair {
    bip32: Bip32,
    depth: u8,
    child_num: Bits32,
    parent_pub_fp: Bits32,
    chain_code: Bytes32,
    key: KeyMaterial,
    public: OnceCell<PublicKey>,
}

impl ExtendedKeyPair {
    pub fn new(
        bip32: &Bip32,
        key: KeyMaterial,
        depth: u8,
        child_num: Bits32,
        parent_pub_fp: Bits32,
        chain_code: Bytes32,
    ) -> Self {
        ExtendedKeyPair {
            bip32: bip32.clone(),
            depth,
            child_num,
            parent_pub_fp,
            chain_code,
            key,
            public: OnceCell::new(),
        }
    }

    pub fn bip32(&self) -> &Bip32 {
        &self.bip32
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_num(&self) -> Bits32 {
        self.child_num
    }

    pub fn parent_pub_fp(&self) -> Bits32 {
        self.parent_pub_fp
    }

    pub fn chain_code(&self) -> &Bytes32 {
        &self.chain_code
    }

    pub fn key(&self) -> &KeyMaterial {
        &self.key
    }

    pub fn is_hardened(&self) -> bool {
        self.bip32.config().is_hardened(self.child_num.to_u32())
    }

    pub fn has_private_key(&self) -> bool {
        matches!(self.key, KeyMaterial::Private(_))
    }

    pub fn private_key(&self) -> Result<&PrivateKey> {
        match &self.key {
            KeyMaterial::Private(k) => Ok(k),
            KeyMaterial::Public(_) => Err(Bip32Error::MissingPrivateKey("access the private key")),
        }
    }

    /// The public key, computed from the private key on first use.
    pub fn public_key(&self) -> &PublicKey {
        match &self.key {
            KeyMaterial::Public(p) => p,
            KeyMaterial::Private(k) => self.public.get_or_init(|| k.public_key()),
        }
    }

    /// Public-only copy of this key (an `xpub` from an `xprv`).
    pub fn neuter(&self) -> ExtendedKeyPair {
        ExtendedKeyPair::new(
            &self.bip32,
            KeyMaterial::Public(self.public_key().clone()),
            self.depth,
            self.child_num,
            self.parent_pub_fp,
            self.chain_code,
        )
    }

    /// Derives child `index`, hardened or not. `index` must be below the
    /// network's hardened threshold; the offset is added here when
    /// `hardened` is set.
    pub fn derive(&self, index: u32, hardened: bool) -> Result<ExtendedKeyPair> {
        let offset = self.bip32.config().hardened_index_begins_from;
        if index >= offset {
            return Err(Bip32Error::InvalidIndex(index));
        }
        let child_num = if hardened {
            index.checked_add(offset).ok_or(Bip32Error::InvalidIndex(index))?
        } else {
            index
        };
        self.derive_child(child_num)
    }

    /// Derives the child with wire-form number `child_num` (hardened when at
    /// or above the threshold).
    ///
    /// An index whose `IL` is not below the curve order, or that yields a
    /// zero key, fails with [`DeriveHint::TryNextIndex`]. Nothing is skipped
    /// automatically.
    pub fn derive_child(&self, child_num: u32) -> Result<ExtendedKeyPair> {
        let hardened = self.bip32.config().is_hardened(child_num);
        let depth = self.depth.checked_add(1).ok_or_else(|| {
            Bip32Error::derivation(DeriveHint::DepthExceeded, "depth would exceed 255")
        })?;

        // Hardened: 0x00 ‖ k_par ‖ i, normal: serP(K_par) ‖ i
        let mut data = Vec::with_capacity(1 + 32 + 4);
        if hardened {
            let k = self.private_key().map_err(|_| {
                Bip32Error::derivation(
                    DeriveHint::PrivateKeyRequired,
                    "hardened derivation requires a private key",
                )
            })?;
            data.push(0u8);
            data.extend_from_slice(k.to_bytes().as_bytes());
        } else {
            data.extend_from_slice(&self.public_key().compressed());
        }
        data.extend_from_slice(&child_num.to_be_bytes());

        let i = Bits512::new(hmac_sha512(self.chain_code.as_bytes(), &data));
        let il = i.left();
        let curve = self.bip32.curve();

        let key = match &self.key {
            KeyMaterial::Private(k) => {
                KeyMaterial::Private(PrivateKey::from_secret(curve, tweak_private(curve, k.secret(), &il)?))
            }
            KeyMaterial::Public(p) => {
                KeyMaterial::Public(PublicKey::new(curve, tweak_public(curve, p.point(), &il)?, false))
            }
        };

        let parent_pub_fp = self.public_key().fingerprint();
        trace!(
            "derived child {:#010x} at depth {} from parent {}",
            child_num,
            depth,
            parent_pub_fp.to_hex()
        );

        Ok(ExtendedKeyPair::new(
            &self.bip32,
            key,
            depth,
            Bits32::from_u32(child_num),
            parent_pub_fp,
            i.right(),
        ))
    }

    /// Walks a path string such as `m/44'/0'/0'/0/0`. Only valid on a
    /// depth-0 key.
    pub fn derive_path(&self, path: &str) -> Result<ExtendedKeyPair> {
        if self.depth != 0 {
            return Err(Bip32Error::InvalidPath(
                "derivation paths can only be applied to a master key".into(),
            ));
        }
        let path: DerivationPath = path.parse()?;
        debug!("deriving path {}", path);
        path.derive_from(self)
    }

    pub fn serialize_private_key(&self) -> Result<SerializedBip32Key> {
        let k = self.private_key().map_err(|_| Bip32Error::MissingPrivateKey("serialize"))?;
        let mut key = [0u8; 33];
        key[1..].copy_from_slice(k.to_bytes().as_bytes());
        Ok(self.serialize_key(self.bip32.config().export_private_prefix, &key))
    }

    pub fn serialize_public_key(&self) -> SerializedBip32Key {
        self.serialize_key(
            self.bip32.config().export_public_prefix,
            &self.public_key().compressed(),
        )
    }

    fn serialize_key(&self, version: Bits32, key: &[u8; 33]) -> SerializedBip32Key {
        SerializedBip32Key::build(
            version,
            self.depth,
            self.parent_pub_fp,
            self.child_num,
            &self.chain_code,
            key,
        )
    }

    pub fn to_base58_private(&self) -> Result<String> {
        Ok(self
            .bip32
            .base58()
            .check_encode(self.serialize_private_key()?.as_bytes()))
    }

    pub fn to_base58_public(&self) -> String {
        self.bip32
            .base58()
            .check_encode(self.serialize_public_key().as_bytes())
    }

    /// Rebuilds an extended key from its 78-byte form.
    ///
    /// Rejects unknown versions, depth-0 keys with a parent fingerprint or
    /// child number, and key data whose prefix does not match the version.
    pub fn unserialize(bip32: &Bip32, ser: &SerializedBip32Key) -> Result<ExtendedKeyPair> {
        let raw = ser.parse()?;
        let config = bip32.config();
        if !config.knows_version(&raw.version) {
            return Err(Bip32Error::InvalidVersion(raw.version));
        }
        if raw.depth == 0 && !raw.parent_pub_fp.is_zero_bytes() {
            return Err(Bip32Error::Unserialize(
                "zero depth with non-zero parent public key".into(),
            ));
        }
        if raw.depth == 0 && !raw.child_num.is_zero_bytes() {
            return Err(Bip32Error::Unserialize(
                "zero depth with non-zero child index".into(),
            ));
        }

        let key = match raw.key_prefix {
            0x00 if raw.version == config.export_private_prefix => {
                KeyMaterial::Private(PrivateKey::from_bytes(bip32.curve(), &raw.key_bytes)?)
            }
            0x02 | 0x03 if raw.version == config.export_public_prefix => {
                let mut compressed = [0u8; 33];
                compressed[0] = raw.key_prefix;
                compressed[1..].copy_from_slice(raw.key_bytes.as_bytes());
                KeyMaterial::Public(PublicKey::from_compressed(bip32.curve(), &compressed)?)
            }
            prefix => {
                return Err(Bip32Error::InvalidKeyData(format!(
                    "invalid prefix {:#04x} for version {}",
                    prefix,
                    raw.version.to_hex()
                )));
            }
        };
        debug!(
            "unserialized {} key at depth {} child {:#010x}",
            if matches!(key, KeyMaterial::Private(_)) { "private" } else { "public" },
            raw.depth,
            raw.child_num.to_u32()
        );

        Ok(ExtendedKeyPair::new(
            bip32,
            key,
            raw.depth,
            raw.child_num,
            raw.parent_pub_fp,
            raw.chain_code,
        ))
    }
}

/// `(IL + k_par) mod n`
fn tweak_private(curve: Curve, parent: &SecretKey, il: &Bytes32) -> Result<SecretKey> {
    let tweak = scalar_below_order(curve, il)?;
    parent
        .add_tweak(&tweak)
        .map_err(|_| Bip32Error::derivation(DeriveHint::TryNextIndex, "child key is zero"))
}

/// `IL·G + K_par`
fn tweak_public(curve: Curve, parent: &secp256k1::PublicKey, il: &Bytes32) -> Result<secp256k1::PublicKey> {
    let tweak = scalar_below_order(curve, il)?;
    curve.ecc().add_exp_tweak(parent, &tweak).map_err(|_| {
        Bip32Error::derivation(DeriveHint::TryNextIndex, "child key is the point at infinity")
    })
}

fn scalar_below_order(curve: Curve, il: &Bytes32) -> Result<Scalar> {
    // Equal-length big-endian arrays compare like the integers they encode.
    if il.as_bytes() >= curve.order().as_bytes() {
        return Err(Bip32Error::derivation(
            DeriveHint::TryNextIndex,
            "child key exceeds curve order (n)",
        ));
    }
    Scalar::from_be_bytes(*il.as_bytes()).map_err(|_| {
        Bip32Error::derivation(DeriveHint::TryNextIndex, "child key exceeds curve order (n)")
    })
}

impl PartialEq for ExtendedKeyPair {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.child_num == other.child_num
            && self.parent_pub_fp == other.parent_pub_fp
            && self.chain_code == other.chain_code
            && self.key == other.key
            && self.bip32.same_network(&other.bip32)
    }
}

impl Eq for ExtendedKeyPair {}

impl fmt::Debug for ExtendedKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BIP32 Extended Key ({}){}",
            self.depth,
            self.child_num.to_u32()
        )
    }
}

/// A depth-0 extended key. Construction enforces that depth, child number and
/// parent fingerprint are all zero together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MasterKeyPair(ExtendedKeyPair);

impl MasterKeyPair {
    pub fn new(
        bip32: &Bip32,
        key: KeyMaterial,
        depth: u8,
        child_num: Bits32,
        parent_pub_fp: Bits32,
        chain_code: Bytes32,
    ) -> Result<Self> {
        ExtendedKeyPair::new(bip32, key, depth, child_num, parent_pub_fp, chain_code).try_into()
    }

    pub fn unserialize(bip32: &Bip32, ser: &SerializedBip32Key) -> Result<Self> {
        ExtendedKeyPair::unserialize(bip32, ser)?.try_into()
    }

    pub fn into_inner(self) -> ExtendedKeyPair {
        self.0
    }
}

impl TryFrom<ExtendedKeyPair> for MasterKeyPair {
    type Error = Bip32Error;

    fn try_from(key: ExtendedKeyPair) -> Result<Self> {
        if key.depth != 0 || !key.child_num.is_zero_bytes() || !key.parent_pub_fp.is_zero_bytes() {
            return Err(Bip32Error::Unserialize(format!(
                "cannot use child key (depth {}, child {:#010x}, parent {}) as master key pair",
                key.depth,
                key.child_num.to_u32(),
                key.parent_pub_fp.to_hex()
            )));
        }
        Ok(MasterKeyPair(key))
    }
}

impl Deref for MasterKeyPair {
    type Target = ExtendedKeyPair;

    fn deref(&self) -> &ExtendedKeyPair {
        &self.0
    }
}

impl From<MasterKeyPair> for ExtendedKeyPair {
    fn from(m: MasterKeyPair) -> Self {
        m.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::HARDENED_OFFSET;
    use proptest::prelude::*;

    fn master(seed_hex: &str) -> MasterKeyPair {
        let seed = hex::decode(seed_hex).unwrap();
        Bip32::bitcoin().master_key_from_entropy(&seed).unwrap()
    }

    fn assert_pair(key: &ExtendedKeyPair, xprv: &str, xpub: &str) {
        assert_eq!(key.to_base58_private().unwrap(), xprv, "xprv mismatch for {:?}", key);
        assert_eq!(key.to_base58_public(), xpub, "xpub mismatch for {:?}", key);
    }

    /// BIP32 Test vector 1, one derivation step at a time
    #[test]
    fn test_vector1() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        assert_pair(
            &m,
            "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi",
            "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8",
        );

        let m0h = m.derive(0, true).unwrap();
        assert_pair(
            &m0h,
            "xprv9uHRZZhk6KAJC1avXpDAp4MDc3sQKNxDiPvvkX8Br5ngLNv1TxvUxt4cV1rGL5hj6KCesnDYUhd7oWgT11eZG7XnxHrnYeSvkzY7d2bhkJ7",
            "xpub68Gmy5EdvgibQVfPdqkBBCHxA5htiqg55crXYuXoQRKfDBFA1WEjWgP6LHhwBZeNK1VTsfTFUHCdrfp1bgwQ9xv5ski8PX9rL2dZXvgGDnw",
        );
        assert!(m0h.is_hardened());
        assert_eq!(m0h.parent_pub_fp().to_hex(), "3442193e");

        let m0h1 = m0h.derive(1, false).unwrap();
        assert_pair(
            &m0h1,
            "xprv9wTYmMFdV23N2TdNG573QoEsfRrWKQgWeibmLntzniatZvR9BmLnvSxqu53Kw1UmYPxLgboyZQaXwTCg8MSY3H2EU4pWcQDnRnrVA1xe8fs",
            "xpub6ASuArnXKPbfEwhqN6e3mwBcDTgzisQN1wXN9BJcM47sSikHjJf3UFHKkNAWbWMiGj7Wf5uMash7SyYq527Hqck2AxYysAA7xmALppuCkwQ",
        );

        let m0h1_2h = m0h1.derive_child(HARDENED_OFFSET + 2).unwrap();
        assert_pair(
            &m0h1_2h,
            "xprv9z4pot5VBttmtdRTWfWQmoH1taj2axGVzFqSb8C9xaxKymcFzXBDptWmT7FwuEzG3ryjH4ktypQSAewRiNMjANTtpgP4mLTj34bhnZX7UiM",
            "xpub6D4BDPcP2GT577Vvch3R8wDkScZWzQzMMUm3PWbmWvVJrZwQY4VUNgqFJPMM3No2dFDFGTsxxpG5uJh7n7epu4trkrX7x7DogT5Uv6fcLW5",
        );

        let m0h1_2h2 = m0h1_2h.derive(2, false).unwrap();
        assert_pair(
            &m0h1_2h2,
            "xprvA2JDeKCSNNZky6uBCviVfJSKyQ1mDYahRjijr5idH2WwLsEd4Hsb2Tyh8RfQMuPh7f7RtyzTtdrbdqqsunu5Mm3wDvUAKRHSC34sJ7in334",
            "xpub6FHa3pjLCk84BayeJxFW2SP4XRrFd1JYnxeLeU8EqN3vDfZmbqBqaGJAyiLjTAwm6ZLRQUMv1ZACTj37sR62cfN7fe5JnJ7dh8zL4fiyLHV",
        );

        let leaf = m0h1_2h2.derive(1_000_000_000, false).unwrap();
        assert_pair(
            &leaf,
            "xprvA41z7zogVVwxVSgdKUHDy1SKmdb533PjDz7J6N6mV6uS3ze1ai8FHa8kmHScGpWmj4WggLyQjgPie1rFSruoUihUZREPSL39UNdE3BBDu76",
            "xpub6H1LXWLaKsWFhvm6RVpEL9P4KfRZSW7abD2ttkWP3SSQvnyA8FSVqNTEcYFgJS2UaFcxupHiYkro49S8yGasTvXEYBVPamhGW6cFJodrTHy",
        );
        assert_eq!(leaf.depth(), 5);
        assert_eq!(m.derive_path("m/0'/1/2'/2/1000000000").unwrap(), leaf);
    }

    /// BIP32 Test vector 2
    #[test]
    fn test_vector2() {
        let m = master("fffcf9f6f3f0edeae7e4e1dedbd8d5d2cfccc9c6c3c0bdbab7b4b1aeaba8a5a29f9c999693908d8a8784817e7b7875726f6c696663605d5a5754514e4b484542");
        assert_pair(
            &m,
            "xprv9s21ZrQH143K31xYSDQpPDxsXRTUcvj2iNHm5NUtrGiGG5e2DtALGdso3pGz6ssrdK4PFmM8NSpSBHNqPqm55Qn3LqFtT2emdEXVYsCzC2U",
            "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB",
        );

        let m0 = m.derive(0, false).unwrap();
        assert_pair(
            &m0,
            "xprv9vHkqa6EV4sPZHYqZznhT2NPtPCjKuDKGY38FBWLvgaDx45zo9WQRUT3dKYnjwih2yJD9mkrocEZXo1ex8G81dwSM1fwqWpWkeS3v86pgKt",
            "xpub69H7F5d8KSRgmmdJg2KhpAK8SR3DjMwAdkxj3ZuxV27CprR9LgpeyGmXUbC6wb7ERfvrnKZjXoUmmDznezpbZb7ap6r1D3tgFxHmwMkQTPH",
        );

        let m0_max = m0.derive(2_147_483_647, true).unwrap();
        assert_pair(
            &m0_max,
            "xprv9wSp6B7kry3Vj9m1zSnLvN3xH8RdsPP1Mh7fAaR7aRLcQMKTR2vidYEeEg2mUCTAwCd6vnxVrcjfy2kRgVsFawNzmjuHc2YmYRmagcEPdU9",
            "xpub6ASAVgeehLbnwdqV6UKMHVzgqAG8Gr6riv3Fxxpj8ksbH9ebxaEyBLZ85ySDhKiLDBrQSARLq1uNRts8RuJiHjaDMBU4Zn9h8LZNnBC5y4a",
        );

        let leaf = m
            .derive_path("m/0/2147483647'/1/2147483646'/2")
            .unwrap();
        assert_pair(
            &leaf,
            "xprvA2nrNbFZABcdryreWet9Ea4LvTJcGsqrMzxHx98MMrotbir7yrKCEXw7nadnHM8Dq38EGfSh6dqA9QWTyefMLEcBYJUuekgW4BYPJcr9E7j",
            "xpub6FnCn6nSzZAw5Tw7cgR9bi15UV96gLZhjDstkXXxvCLsUXBGXPdSnLFbdpq8p9HmGsApME5hQTZ3emM2rnY5agb9rXpVGyy3bdW6EEgAtqt",
        );
    }

    /// BIP32 Test vector 3: leading zeros in the private key are kept
    #[test]
    fn test_vector3() {
        let m = master("4b381541583be4423346c643850da4b320e46a87ae3d2a4e6da11eba819cd4acba45d239319ac14f863b8d5ab5a0d0c64d2e8a1e7d1457df2e5a3c51c73235be");
        let m0h = m.derive(0, true).unwrap();
        assert_pair(
            &m0h,
            "xprv9uPDJpEQgRQfDcW7BkF7eTya6RPxXeJCqCJGHuCJ4GiRVLzkTXBAJMu2qaMWPrS7AANYqdq6vcBcBUdJCVVFceUvJFjaPdGZ2y9WACViL4L",
            "xpub68NZiKmJWnxxS6aaHmn81bvJeTESw724CRDs6HbuccFQN9Ku14VQrADWgqbhhTHBaohPX4CjNLf9fq9MYo6oDaPPLPxSb7gwQN3ih19Zm4Y",
        );
    }

    /// Public-only derivation agrees with private derivation followed by neutering
    #[test]
    fn public_derivation_matches_private() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let m0h = m.derive(0, true).unwrap();
        let via_private = m0h.derive(1, false).unwrap().derive(2, false).unwrap().neuter();
        let via_public = m0h.neuter().derive(1, false).unwrap().derive(2, false).unwrap();
        assert_eq!(via_private, via_public);
        assert_eq!(via_public.to_base58_public(), via_private.to_base58_public());
        assert!(!via_public.has_private_key());
    }

    #[test]
    fn hardened_on_public_key_fails() {
        let xpub = master("000102030405060708090a0b0c0d0e0f").neuter();
        let err = xpub.derive(0, true).unwrap_err();
        assert_eq!(err.hint(), Some(DeriveHint::PrivateKeyRequired));
        assert!(!err.is_retryable());
        assert!(matches!(
            xpub.derive_child(HARDENED_OFFSET + 5),
            Err(Bip32Error::Derivation { hint: DeriveHint::PrivateKeyRequired, .. })
        ));
        assert!(matches!(
            xpub.serialize_private_key(),
            Err(Bip32Error::MissingPrivateKey(_))
        ));
    }

    #[test]
    fn raw_index_must_be_below_threshold() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        assert_eq!(
            m.derive(HARDENED_OFFSET, false).unwrap_err(),
            Bip32Error::InvalidIndex(HARDENED_OFFSET)
        );
        assert_eq!(
            m.derive(HARDENED_OFFSET, true).unwrap_err(),
            Bip32Error::InvalidIndex(HARDENED_OFFSET)
        );
    }

    #[test]
    fn depth_limit() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let deep = ExtendedKeyPair::new(
            m.bip32(),
            m.key().clone(),
            255,
            Bits32::from_u32(1),
            Bits32::from_u32(1),
            *m.chain_code(),
        );
        assert_eq!(deep.derive(0, false).unwrap_err().hint(), Some(DeriveHint::DepthExceeded));
    }

    #[test]
    fn derive_path_only_from_master() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let child = m.derive(0, false).unwrap();
        assert!(matches!(child.derive_path("m/1"), Err(Bip32Error::InvalidPath(_))));
        assert!(matches!(m.derive_path("x/1"), Err(Bip32Error::InvalidPath(_))));
        assert_eq!(m.derive_path("M/").unwrap(), *m);
    }

    #[test]
    fn out_of_range_il_is_retryable() {
        let curve = Curve::Secp256k1;
        let one = SecretKey::from_slice(&{
            let mut b = [0u8; 32];
            b[31] = 1;
            b
        })
        .unwrap();

        let n = curve.order();
        let err = tweak_private(curve, &one, &n).unwrap_err();
        assert!(err.is_retryable());
        let err = tweak_private(curve, &one, &Bytes32::new([0xFF; 32])).unwrap_err();
        assert!(err.is_retryable());

        // n - 1 + 1 = 0 (mod n)
        let mut n_minus_one = *n.as_bytes();
        n_minus_one[31] -= 1;
        let n_minus_one = Bytes32::new(n_minus_one);
        let err = tweak_private(curve, &one, &n_minus_one).unwrap_err();
        assert_eq!(err.hint(), Some(DeriveHint::TryNextIndex));

        let g = curve.ecc().public_key(&one);
        let err = tweak_public(curve, &g, &n_minus_one).unwrap_err();
        assert!(err.is_retryable());
        assert!(tweak_public(curve, &g, &Bytes32::new([1; 32])).is_ok());
    }

    #[test]
    fn master_invariant_enforced() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let child: ExtendedKeyPair = m.derive(0, false).unwrap();
        assert!(matches!(
            MasterKeyPair::try_from(child.clone()),
            Err(Bip32Error::Unserialize(_))
        ));
        for (depth, child_num, fp) in [(1u8, 0u32, 0u32), (0, 1, 0), (0, 0, 1)] {
            let res = MasterKeyPair::new(
                m.bip32(),
                m.key().clone(),
                depth,
                Bits32::from_u32(child_num),
                Bits32::from_u32(fp),
                *m.chain_code(),
            );
            assert!(res.is_err(), "({depth}, {child_num}, {fp}) accepted");
        }
        let ser = child.serialize_private_key().unwrap();
        assert!(MasterKeyPair::unserialize(m.bip32(), &ser).is_err());
        let ser = m.serialize_public_key();
        assert!(MasterKeyPair::unserialize(m.bip32(), &ser).is_ok());
    }

    #[test]
    fn unserialize_rejects_foreign_network() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let testnet = Bip32::bitcoin_testnet();
        let err = testnet.unserialize(&m.serialize_public_key()).unwrap_err();
        assert_eq!(err, Bip32Error::InvalidVersion(Bits32::from_u32(0x0488_B21E)));
    }

    #[test]
    fn testnet_prefixes() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let m = Bip32::bitcoin_testnet().master_key_from_entropy(&seed).unwrap();
        assert!(m.to_base58_private().unwrap().starts_with("tprv"));
        assert!(m.to_base58_public().starts_with("tpub"));
    }

    #[test]
    fn public_key_cache_is_stable() {
        let m = master("000102030405060708090a0b0c0d0e0f");
        let a = m.public_key().clone();
        let b = m.public_key();
        assert_eq!(&a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_eq!(format!("{:?}", *m), "BIP32 Extended Key (0)0");
    }

    struct Case<'a> {
        key: &'a str,
        expected: fn(&Bip32Error) -> bool,
    }

    /// BIP32 Test vector 5: invalid extended keys
    #[test]
    fn test_vector5() {
        let bip32 = Bip32::bitcoin();
        let key_data = |e: &Bip32Error| matches!(e, Bip32Error::InvalidKeyData(_));
        let format = |e: &Bip32Error| matches!(e, Bip32Error::Unserialize(_));
        let cases = [
            // pubkey version / prvkey mismatch
            Case {
                key: "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6LBpB85b3D2yc8sfvZU521AAwdZafEz7mnzBBsz4wKY5fTtTQBm",
                expected: key_data,
            },
            // prvkey version / pubkey mismatch
            Case {
                key: "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFGTQQD3dC4H2D5GBj7vWvSQaaBv5cxi9gafk7NF3pnBju6dwKvH",
                expected: key_data,
            },
            // invalid pubkey prefix 04
            Case {
                key: "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6Txnt3siSujt9RCVYsx4qHZGc62TG4McvMGcAUjeuwZdduYEvFn",
                expected: key_data,
            },
            // invalid prvkey prefix 04
            Case {
                key: "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFGpWnsj83BHtEy5Zt8CcDr1UiRXuWCmTQLxEK9vbz5gPstX92JQ",
                expected: key_data,
            },
            // invalid pubkey prefix 01
            Case {
                key: "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6N8ZMMXctdiCjxTNq964yKkwrkBJJwpzZS4HS2fxvyYUA4q2Xe4",
                expected: key_data,
            },
            // invalid prvkey prefix 01
            Case {
                key: "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFAzHGBP2UuGCqWLTAPLcMtD9y5gkZ6Eq3Rjuahrv17fEQ3Qen6J",
                expected: key_data,
            },
            // zero depth with non-zero parent fingerprint
            Case {
                key: "xprv9s2SPatNQ9Vc6GTbVMFPFo7jsaZySyzk7L8n2uqKXJen3KUmvQNTuLh3fhZMBoG3G4ZW1N2kZuHEPY53qmbZzCHshoQnNf4GvELZfqTUrcv",
                expected: format,
            },
            Case {
                key: "xpub661no6RGEX3uJkY4bNnPcw4URcQTrSibUZ4NqJEw5eBkv7ovTwgiT91XX27VbEXGENhYRCf7hyEbWrR3FewATdCEebj6znwMfQkhRYHRLpJ",
                expected: format,
            },
            // zero depth with non-zero index
            Case {
                key: "xprv9s21ZrQH4r4TsiLvyLXqM9P7k1K3EYhA1kkD6xuquB5i39AU8KF42acDyL3qsDbU9NmZn6MsGSUYZEsuoePmjzsB3eFKSUEh3Gu1N3cqVUN",
                expected: format,
            },
            Case {
                key: "xpub661MyMwAuDcm6CRQ5N4qiHKrJ39Xe1R1NyfouMKTTWcguwVcfrZJaNvhpebzGerh7gucBvzEQWRugZDuDXjNDRmXzSZe4c7mnTK97pTvGS8",
                expected: format,
            },
            // unknown extended key version
            Case {
                key: "DMwo58pR1QLEFihHiXPVykYB6fJmsTeHvyTp7hRThAtCX8CvYzgPcn8XnmdfHGMQzT7ayAmfo4z3gY5KfbrZWZ6St24UVf2Qgo6oujFktLHdHY4",
                expected: |e| matches!(e, Bip32Error::InvalidVersion(_)),
            },
            Case {
                key: "DMwo58pR1QLEFihHiXPVykYB6fJmsTeHvyTp7hRThAtCX8CvYzgPcn8XnmdfHPmHJiEDXkTiJTVV9rHEBUem2mwVbbNfvT2MTcAqj3nesx8uBf9",
                expected: |e| matches!(e, Bip32Error::InvalidVersion(_)),
            },
            // private key 0 not in 1..n-1
            Case {
                key: "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzF93Y5wvzdUayhgkkFoicQZcP3y52uPPxFnfoLZB21Teqt1VvEHx",
                expected: key_data,
            },
            // private key n not in 1..n-1
            Case {
                key: "xprv9s21ZrQH143K24Mfq5zL5MhWK9hUhhGbd45hLXo2Pq2oqzMMo63oStZzFAzHGBP2UuGCqWLTAPLcMtD5SDKr24z3aiUvKr9bJpdrcLg1y3G",
                expected: key_data,
            },
            // invalid pubkey 020000000000000000000000000000000000000000000000000000000000000007
            Case {
                key: "xpub661MyMwAqRbcEYS8w7XLSVeEsBXy79zSzH1J8vCdxAZningWLdN3zgtU6Q5JXayek4PRsn35jii4veMimro1xefsM58PgBMrvdYre8QyULY",
                expected: key_data,
            },
            // invalid checksum
            Case {
                key: "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHL",
                expected: |e| *e == Bip32Error::Checksum,
            },
        ];

        for case in &cases {
            let err = bip32.from_base58(case.key).unwrap_err();
            assert!((case.expected)(&err), "key=\"{}\" returned {:?}", case.key, err);
        }
    }

    #[test]
    fn base58_errors() {
        let bip32 = Bip32::bitcoin();
        assert!(matches!(bip32.from_base58(""), Err(Bip32Error::Base58(_))));
        assert!(matches!(bip32.from_base58("0"), Err(Bip32Error::Base58(_))));
        let short = bip32.base58().check_encode(&[0u8; 77]);
        assert_eq!(
            bip32.from_base58(&short).unwrap_err(),
            Bip32Error::InvalidLength {
                expected: 78,
                actual: 77
            }
        );
    }

    proptest! {
        #[test]
        fn prop_serialize_roundtrip(
            seed in proptest::collection::vec(any::<u8>(), 16..64),
            steps in proptest::collection::vec((0u32..HARDENED_OFFSET, any::<bool>()), 0..4),
        ) {
            let bip32 = Bip32::bitcoin();
            let mut key: ExtendedKeyPair = bip32.master_key_from_entropy(&seed).unwrap().into();
            for (index, hardened) in steps {
                key = key.derive(index, hardened).unwrap();
            }
            let prv = ExtendedKeyPair::unserialize(&bip32, &key.serialize_private_key().unwrap()).unwrap();
            prop_assert_eq!(&prv, &key);
            let xpub = bip32.from_base58(&key.to_base58_public()).unwrap();
            prop_assert_eq!(xpub, key.neuter());
        }
    }
}
