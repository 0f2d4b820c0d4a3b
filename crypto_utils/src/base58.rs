use crate::buffers::Bits32;
use crate::hash::sha256d;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base58Error {
    #[error("invalid base58 character {0:?} at position {1}")]
    InvalidCharacter(char, usize),
    #[error("base58check payload is shorter than its checksum")]
    InvalidLength,
    #[error("base58check checksum does not match")]
    InvalidChecksum,
    #[error("invalid base58 charset: {0}")]
    InvalidCharset(String),
}

pub const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58 codec over a 58-symbol charset.
///
/// Input bytes are read as one big-endian unsigned integer and rewritten in
/// base 58 by repeated long division. Leading `0x00` bytes carry no numeric
/// weight, so each one is emitted as the charset's zero symbol and restored on
/// decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Base58 {
    charset: [u8; 58],
    case_sensitive: bool,
}

impl Default for Base58 {
    fn default() -> Self {
        Base58::bitcoin()
    }
}

impl Base58 {
    pub const fn bitcoin() -> Self {
        Base58 {
            charset: *BASE58_ALPHABET,
            case_sensitive: true,
        }
    }

    /// Builds a codec from a custom charset of 58 distinct ASCII symbols.
    pub fn new(charset: &str, case_sensitive: bool) -> Result<Self, Base58Error> {
        let bytes = charset.as_bytes();
        if !charset.is_ascii() || bytes.len() != 58 {
            return Err(Base58Error::InvalidCharset(format!(
                "expected 58 ascii symbols, got {}",
                charset.chars().count()
            )));
        }
        for (i, &c) in bytes.iter().enumerate() {
            let dup = bytes[..i].iter().any(|&p| {
                if case_sensitive {
                    p == c
                } else {
                    p.eq_ignore_ascii_case(&c)
                }
            });
            if dup {
                return Err(Base58Error::InvalidCharset(format!(
                    "duplicate symbol {:?}",
                    c as char
                )));
            }
        }
        let mut set = [0u8; 58];
        set.copy_from_slice(bytes);
        Ok(Base58 {
            charset: set,
            case_sensitive,
        })
    }

    pub fn charset(&self) -> &[u8; 58] {
        &self.charset
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn zero_symbol(&self) -> u8 {
        self.charset[0]
    }

    fn digit_of(&self, c: u8) -> Option<u8> {
        let pos = if self.case_sensitive {
            self.charset.iter().position(|&s| s == c)
        } else {
            self.charset.iter().position(|&s| s.eq_ignore_ascii_case(&c))
        };
        pos.map(|p| p as u8)
    }

    pub fn encode(&self, data: &[u8]) -> String {
        self.encode_with(data, true)
    }

    /// Encodes `data`; with `convert_leading_zeros` unset, leading zero bytes
    /// are dropped like any other numeric zero.
    pub fn encode_with(&self, data: &[u8], convert_leading_zeros: bool) -> String {
        let zeros = data.iter().take_while(|&&b| b == 0).count();
        let mut input: Vec<u8> = data[zeros..].to_vec();
        let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 138 / 100 + 1);
        while !input.is_empty() {
            let mut remainder: u32 = 0;
            let mut quotient: Vec<u8> = Vec::with_capacity(input.len());
            for &byte in &input {
                let acc = (remainder << 8) | byte as u32;
                let digit = (acc / 58) as u8;
                remainder = acc % 58;
                if !quotient.is_empty() || digit != 0 {
                    quotient.push(digit);
                }
            }
            digits.push(self.charset[remainder as usize]);
            input = quotient;
        }
        if convert_leading_zeros {
            digits.extend(std::iter::repeat(self.zero_symbol()).take(zeros));
        }
        digits.iter().rev().map(|&c| c as char).collect()
    }

    pub fn decode(&self, s: &str) -> Result<Vec<u8>, Base58Error> {
        self.decode_with(s, true)
    }

    pub fn decode_with(&self, s: &str, convert_leading_zeros: bool) -> Result<Vec<u8>, Base58Error> {
        let bytes = s.as_bytes();
        let zeros = if convert_leading_zeros {
            bytes
                .iter()
                .take_while(|&&b| self.digit_of(b) == Some(0))
                .count()
        } else {
            0
        };

        let mut input: Vec<u8> = Vec::with_capacity(bytes.len() - zeros);
        for (i, ch) in s.char_indices().skip_while(|&(i, _)| i < zeros) {
            let digit = u8::try_from(ch)
                .ok()
                .and_then(|b| self.digit_of(b))
                .ok_or(Base58Error::InvalidCharacter(ch, i))?;
            input.push(digit);
        }
        // Symbols past the leading run may still be zero digits; strip them so
        // the division loop only sees significant digits.
        let significant = input.iter().take_while(|&&d| d == 0).count();
        let mut input = input.split_off(significant);

        let mut decoded: Vec<u8> = Vec::with_capacity(bytes.len());
        while !input.is_empty() {
            let mut remainder: u32 = 0;
            let mut quotient: Vec<u8> = Vec::with_capacity(input.len());
            for &digit in &input {
                let acc = remainder * 58 + digit as u32;
                let q = (acc / 256) as u8;
                remainder = acc % 256;
                if !quotient.is_empty() || q != 0 {
                    quotient.push(q);
                }
            }
            decoded.push(remainder as u8);
            input = quotient;
        }

        decoded.extend(std::iter::repeat(0u8).take(zeros));
        decoded.reverse();
        Ok(decoded)
    }

    /// First four bytes of SHA256(SHA256(data)).
    pub fn compute_checksum(&self, data: &[u8]) -> Bits32 {
        compute_checksum(data)
    }

    pub fn check_encode(&self, payload: &[u8]) -> String {
        let mut extended = Vec::with_capacity(payload.len() + 4);
        extended.extend_from_slice(payload);
        extended.extend_from_slice(compute_checksum(payload).as_bytes());
        self.encode(&extended)
    }

    pub fn check_decode(&self, s: &str) -> Result<Vec<u8>, Base58Error> {
        let mut raw = self.decode(s)?;
        if raw.len() < 4 {
            return Err(Base58Error::InvalidLength);
        }
        let checksum = raw.split_off(raw.len() - 4);
        if compute_checksum(&raw).as_bytes()[..] != checksum[..] {
            return Err(Base58Error::InvalidChecksum);
        }
        Ok(raw)
    }
}

pub fn compute_checksum(data: &[u8]) -> Bits32 {
    let digest = sha256d(data);
    Bits32::new([digest[0], digest[1], digest[2], digest[3]])
}

pub fn base58_encode(data: &[u8]) -> String {
    Base58::bitcoin().encode(data)
}

pub fn base58_decode(s: &str) -> Result<Vec<u8>, Base58Error> {
    Base58::bitcoin().decode(s)
}

pub fn base58_check_encode(payload: &[u8]) -> String {
    Base58::bitcoin().check_encode(payload)
}

pub fn base58_check_decode(s: &str) -> Result<Vec<u8>, Base58Error> {
    Base58::bitcoin().check_decode(s)
}
