use crate::curve::Curve;
use crate::error::{Bip32Error, Result};
use crypto_utils::Bytes32;
use secp256k1::ecdsa::{self, RecoverableSignature, RecoveryId};

/// ECDSA signature `(r, s)` with an optional recovery id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    curve: Curve,
    sig: ecdsa::Signature,
    recovery_id: Option<u8>,
}

impl Signature {
    pub(crate) fn new(curve: Curve, sig: ecdsa::Signature, recovery_id: Option<u8>) -> Self {
        Signature {
            curve,
            sig,
            recovery_id,
        }
    }

    pub(crate) fn from_recoverable(curve: Curve, rsig: &RecoverableSignature) -> Self {
        let (id, _) = rsig.serialize_compact();
        Signature::new(curve, rsig.to_standard(), Some(id.to_i32() as u8))
    }

    pub fn from_der(curve: Curve, bytes: &[u8]) -> Result<Self> {
        let sig = ecdsa::Signature::from_der(bytes).map_err(Bip32Error::curve("DER signature parse"))?;
        Ok(Signature::new(curve, sig, None))
    }

    /// Parses `r ‖ s` (64 bytes) or `r ‖ s ‖ recovery id` (65 bytes).
    pub fn from_compact(curve: Curve, bytes: &[u8]) -> Result<Self> {
        let (rs, recovery_id) = match bytes.len() {
            64 => (bytes, None),
            65 => {
                let id = bytes[64];
                if id > 3 {
                    return Err(Bip32Error::InvalidKeyData(format!("recovery id {id} out of range")));
                }
                (&bytes[..64], Some(id))
            }
            n => {
                return Err(Bip32Error::InvalidLength {
                    expected: 64,
                    actual: n,
                });
            }
        };
        let sig = ecdsa::Signature::from_compact(rs).map_err(Bip32Error::curve("compact signature parse"))?;
        Ok(Signature::new(curve, sig, recovery_id))
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn recovery_id(&self) -> Option<u8> {
        self.recovery_id
    }

    pub(crate) fn ecdsa(&self) -> &ecdsa::Signature {
        &self.sig
    }

    pub(crate) fn with_recovery_id(&self, id: RecoveryId) -> Result<RecoverableSignature> {
        RecoverableSignature::from_compact(&self.sig.serialize_compact(), id)
            .map_err(Bip32Error::curve("recoverable signature"))
    }

    pub fn r(&self) -> Bytes32 {
        let compact = self.sig.serialize_compact();
        let mut r = [0u8; 32];
        r.copy_from_slice(&compact[..32]);
        Bytes32::new(r)
    }

    pub fn s(&self) -> Bytes32 {
        let compact = self.sig.serialize_compact();
        let mut s = [0u8; 32];
        s.copy_from_slice(&compact[32..]);
        Bytes32::new(s)
    }

    pub fn to_der(&self) -> Vec<u8> {
        self.sig.serialize_der().to_vec()
    }

    pub fn to_compact(&self) -> [u8; 64] {
        self.sig.serialize_compact()
    }

    /// `r ‖ s ‖ recovery id`, if the id is known.
    pub fn to_compact_recoverable(&self) -> Option<[u8; 65]> {
        let id = self.recovery_id?;
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.sig.serialize_compact());
        out[64] = id;
        Some(out)
    }
}
