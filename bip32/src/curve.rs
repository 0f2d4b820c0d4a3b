//! Elliptic curve capability set consumed by the key objects.
//!
//! Key derivation only needs scalar arithmetic, point multiplication and
//! point addition; signing needs ECDSA with public key recovery. All of it is
//! delegated to libsecp256k1 through the [`EllipticCurve`] trait so the key
//! types never touch curve internals directly.

use crate::error::Bip32Error;
use crypto_utils::Bytes32;
use once_cell::sync::Lazy;
use secp256k1::{
    All, Message, PublicKey, Scalar, Secp256k1, SecretKey, constants,
    ecdsa::{RecoverableSignature, Signature},
};

/// Operations the BIP32 engine needs from a curve backend.
pub trait EllipticCurve: Send + Sync {
    /// Group order `n`, big-endian.
    fn order(&self) -> Bytes32;

    /// `secret * G`
    fn public_key(&self, secret: &SecretKey) -> PublicKey;

    /// `point + tweak * G`
    fn add_exp_tweak(&self, point: &PublicKey, tweak: &Scalar) -> Result<PublicKey, secp256k1::Error>;

    fn sign(&self, msg: &Message, secret: &SecretKey, nonce: Option<&[u8; 32]>) -> Signature;

    fn sign_recoverable(
        &self,
        msg: &Message,
        secret: &SecretKey,
        nonce: Option<&[u8; 32]>,
    ) -> RecoverableSignature;

    fn verify(&self, msg: &Message, sig: &Signature, point: &PublicKey) -> bool;

    fn recover(&self, msg: &Message, sig: &RecoverableSignature) -> Result<PublicKey, secp256k1::Error>;
}

/// libsecp256k1 backend.
pub struct Secp256k1Curve {
    secp: Secp256k1<All>,
}

impl Secp256k1Curve {
    pub fn new() -> Self {
        Secp256k1Curve {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for Secp256k1Curve {
    fn default() -> Self {
        Self::new()
    }
}

impl EllipticCurve for Secp256k1Curve {
    fn order(&self) -> Bytes32 {
        Bytes32::new(constants::CURVE_ORDER)
    }

    fn public_key(&self, secret: &SecretKey) -> PublicKey {
        PublicKey::from_secret_key(&self.secp, secret)
    }

    fn add_exp_tweak(&self, point: &PublicKey, tweak: &Scalar) -> Result<PublicKey, secp256k1::Error> {
        point.add_exp_tweak(&self.secp, tweak)
    }

    // The optional nonce is mixed into RFC6979 as extra entropy; libsecp256k1
    // never accepts a raw k.
    fn sign(&self, msg: &Message, secret: &SecretKey, nonce: Option<&[u8; 32]>) -> Signature {
        match nonce {
            Some(extra) => self.secp.sign_ecdsa_with_noncedata(msg, secret, extra),
            None => self.secp.sign_ecdsa(msg, secret),
        }
    }

    fn sign_recoverable(
        &self,
        msg: &Message,
        secret: &SecretKey,
        nonce: Option<&[u8; 32]>,
    ) -> RecoverableSignature {
        match nonce {
            Some(extra) => self
                .secp
                .sign_ecdsa_recoverable_with_noncedata(msg, secret, extra),
            None => self.secp.sign_ecdsa_recoverable(msg, secret),
        }
    }

    fn verify(&self, msg: &Message, sig: &Signature, point: &PublicKey) -> bool {
        self.secp.verify_ecdsa(msg, sig, point).is_ok()
    }

    fn recover(&self, msg: &Message, sig: &RecoverableSignature) -> Result<PublicKey, secp256k1::Error> {
        self.secp.recover_ecdsa(msg, sig)
    }
}

static SECP256K1: Lazy<Secp256k1Curve> = Lazy::new(Secp256k1Curve::new);

/// Curve selector carried by every key.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Curve {
    #[default]
    Secp256k1,
}

impl Curve {
    /// Backend implementing this curve; contexts are built once per process.
    pub fn ecc(self) -> &'static dyn EllipticCurve {
        match self {
            Curve::Secp256k1 => &*SECP256K1,
        }
    }

    pub fn order(self) -> Bytes32 {
        self.ecc().order()
    }
}

impl std::str::FromStr for Curve {
    type Err = Bip32Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("secp256k1") {
            Ok(Curve::Secp256k1)
        } else {
            Err(Bip32Error::Config(format!("unsupported curve {:?}", s)))
        }
    }
}
