use crate::curve::Curve;
use crate::error::{Bip32Error, Result};
use crate::signature::Signature;
use crypto_utils::{Bits32, Bytes32, hash::hash160};
use once_cell::sync::OnceCell;
use secp256k1::{Message, SecretKey, ecdsa::RecoveryId};
use std::fmt;

/// A 32-byte secp256k1 scalar in `1..n`.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    secret: SecretKey,
    curve: Curve,
}

impl PrivateKey {
    pub fn from_bytes(curve: Curve, bytes: &Bytes32) -> Result<Self> {
        let secret = SecretKey::from_slice(bytes.as_bytes())
            .map_err(|_| Bip32Error::InvalidKeyData("private key is not in 1..n-1".into()))?;
        Ok(PrivateKey { secret, curve })
    }

    pub(crate) fn from_secret(curve: Curve, secret: SecretKey) -> Self {
        PrivateKey { secret, curve }
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn to_bytes(&self) -> Bytes32 {
        Bytes32::new(self.secret.secret_bytes())
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// `k * G`, uncached; [`crate::ExtendedKeyPair`] memoizes it.
    pub fn public_key(&self) -> PublicKey {
        PublicKey::new(self.curve, self.curve.ecc().public_key(&self.secret), true)
    }

    /// ECDSA over a 32-byte message hash. `nonce` is extra entropy for
    /// RFC6979 nonce generation, so signatures stay deterministic per input.
    pub fn sign(&self, msg_hash: &Bytes32, nonce: Option<&Bytes32>) -> Result<Signature> {
        let msg = message(msg_hash)?;
        let sig = self
            .curve
            .ecc()
            .sign(&msg, &self.secret, nonce.map(|n| n.as_bytes()));
        Ok(Signature::new(self.curve, sig, None))
    }

    /// Like [`PrivateKey::sign`] but also returns the recovery id.
    pub fn sign_recoverable(&self, msg_hash: &Bytes32, nonce: Option<&Bytes32>) -> Result<Signature> {
        let msg = message(msg_hash)?;
        let rsig = self
            .curve
            .ecc()
            .sign_recoverable(&msg, &self.secret, nonce.map(|n| n.as_bytes()));
        Ok(Signature::from_recoverable(self.curve, &rsig))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("256-bit Private Key")
    }
}

pub(crate) fn message(hash: &Bytes32) -> Result<Message> {
    Message::from_slice(hash.as_bytes()).map_err(Bip32Error::curve("message hash"))
}

/// A curve point with a memoized BIP32 fingerprint.
#[derive(Clone)]
pub struct PublicKey {
    point: secp256k1::PublicKey,
    curve: Curve,
    complete: bool,
    fingerprint: OnceCell<Bits32>,
}

impl PublicKey {
    pub(crate) fn new(curve: Curve, point: secp256k1::PublicKey, complete: bool) -> Self {
        PublicKey {
            point,
            curve,
            complete,
            fingerprint: OnceCell::new(),
        }
    }

    /// Parses a 33-byte SEC1 compressed point (`0x02`/`0x03` ‖ x).
    pub fn from_compressed(curve: Curve, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 33 {
            return Err(Bip32Error::InvalidKeyData(format!(
                "compressed public key must be 33 bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != 0x02 && bytes[0] != 0x03 {
            return Err(Bip32Error::InvalidKeyData(format!(
                "invalid compressed public key prefix {:#04x}",
                bytes[0]
            )));
        }
        let point = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| Bip32Error::InvalidKeyData(format!("public key is not on the curve: {e}")))?;
        Ok(PublicKey::new(curve, point, false))
    }

    /// Parses a 65-byte SEC1 uncompressed point (`0x04` ‖ x ‖ y).
    pub fn from_uncompressed(curve: Curve, bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 || bytes[0] != 0x04 {
            return Err(Bip32Error::InvalidKeyData(
                "uncompressed public key must be 0x04 followed by 64 bytes".into(),
            ));
        }
        let point = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| Bip32Error::InvalidKeyData(format!("public key is not on the curve: {e}")))?;
        Ok(PublicKey::new(curve, point, true))
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub(crate) fn point(&self) -> &secp256k1::PublicKey {
        &self.point
    }

    /// Whether the key was built with its y coordinate known (from a private
    /// key or an uncompressed encoding) rather than recovered from x alone.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// `x ‖ y`, 64 bytes.
    pub fn raw(&self) -> [u8; 64] {
        let full = self.point.serialize_uncompressed();
        let mut out = [0u8; 64];
        out.copy_from_slice(&full[1..]);
        out
    }

    pub fn uncompressed(&self) -> [u8; 65] {
        self.point.serialize_uncompressed()
    }

    /// `0x02` for even y, `0x03` for odd y, followed by x.
    pub fn compressed(&self) -> [u8; 33] {
        let raw = self.raw();
        let mut out = [0u8; 33];
        out[0] = 0x02 | (raw[63] & 1);
        out[1..].copy_from_slice(&raw[..32]);
        out
    }

    /// First four bytes of HASH160(compressed point), computed once.
    pub fn fingerprint(&self) -> Bits32 {
        *self.fingerprint.get_or_init(|| {
            let h = hash160(&self.compressed());
            Bits32::new([h[0], h[1], h[2], h[3]])
        })
    }

    pub fn verify_signature(&self, sig: &Signature, msg_hash: &Bytes32) -> bool {
        match message(msg_hash) {
            Ok(msg) => self.curve.ecc().verify(&msg, sig.ecdsa(), &self.point),
            Err(_) => false,
        }
    }

    /// Recovers a key from `sig` and checks it is this one. Uses `rec_id` when
    /// given, else the id carried by the signature.
    pub fn verify_public_key(&self, sig: &Signature, msg_hash: &Bytes32, rec_id: Option<u8>) -> bool {
        let Some(id) = rec_id.or(sig.recovery_id()) else {
            return false;
        };
        self.recover_with(sig, msg_hash, id)
            .map(|pk| pk == self.point)
            .unwrap_or(false)
    }

    /// Tries all four recovery ids and returns the first that yields this key.
    pub fn find_recovery_id(&self, sig: &Signature, msg_hash: &Bytes32) -> Option<u8> {
        (0u8..4).find(|&id| {
            self.recover_with(sig, msg_hash, id)
                .map(|pk| pk == self.point)
                .unwrap_or(false)
        })
    }

    fn recover_with(&self, sig: &Signature, msg_hash: &Bytes32, id: u8) -> Result<secp256k1::PublicKey> {
        let msg = message(msg_hash)?;
        let rec_id = RecoveryId::from_i32(id as i32).map_err(Bip32Error::curve("recovery id"))?;
        let rsig = sig.with_recovery_id(rec_id)?;
        self.curve
            .ecc()
            .recover(&msg, &rsig)
            .map_err(Bip32Error::curve("public key recovery"))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.curve == other.curve && self.point == other.point
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.compressed()))
    }
}
