//! Unguessable 128-bit tokens.
//!
//! A [`Nonce`] forces otherwise identical partition keys into distinct
//! ephemeral partitions, and gives opaque sites their identity. The value is
//! never zero, so a zero token can be used on the wire to mean "absent".

use std::fmt;
use std::str::FromStr;

/// Number of hex digits in the textual form.
const HEX_LEN: usize = 32;

/// Random 128-bit token with a total order.
///
/// Ordering compares the high half first, then the low half, which is the
/// same as comparing the packed `u128`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nonce(u128);

impl Nonce {
    /// Mint a fresh random token.
    #[must_use]
    pub fn create() -> Self {
        loop {
            let v: u128 = rand::random();
            if v != 0 {
                return Self(v);
            }
        }
    }

    /// Rebuild a token from its two halves. Returns `None` for the zero token.
    #[must_use]
    pub const fn from_parts(high: u64, low: u64) -> Option<Self> {
        let v = ((high as u128) << 64) | low as u128;
        if v == 0 {
            None
        } else {
            Some(Self(v))
        }
    }

    /// High 64 bits.
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    #[must_use]
    pub const fn high(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Low 64 bits.
    #[allow(clippy::cast_possible_truncation)]
    #[inline]
    #[must_use]
    pub const fn low(self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0.to_be_bytes()))
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce({self})")
    }
}

/// Error parsing a [`Nonce`] from text.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseNonceError {
    /// Input was not exactly 32 hex digits.
    #[error("nonce must be 32 hex digits, got {0}")]
    Length(usize),
    /// Input contained a non-hex character.
    #[error("nonce is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    /// The all-zero token is reserved.
    #[error("nonce must not be zero")]
    Zero,
}

impl FromStr for Nonce {
    type Err = ParseNonceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HEX_LEN {
            return Err(ParseNonceError::Length(s.len()));
        }
        let mut buf = [0u8; 16];
        hex::decode_to_slice(s, &mut buf)?;
        let v = u128::from_be_bytes(buf);
        if v == 0 {
            return Err(ParseNonceError::Zero);
        }
        Ok(Self(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_upper_hex_high_then_low() {
        let n = Nonce::from_parts(0xAB, 0x01).unwrap();
        assert_eq!(n.to_string(), "00000000000000AB0000000000000001");
        assert_eq!(n.high(), 0xAB);
        assert_eq!(n.low(), 0x01);
    }

    #[test]
    fn parse_roundtrips_display() {
        let n = Nonce::create();
        let back: Nonce = n.to_string().parse().unwrap();
        assert_eq!(n, back);
        // Lower-case input is accepted too.
        let lower: Nonce = n.to_string().to_ascii_lowercase().parse().unwrap();
        assert_eq!(n, lower);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("abc".parse::<Nonce>(), Err(ParseNonceError::Length(3)));
        assert_eq!(
            "zz000000000000000000000000000000".parse::<Nonce>(),
            Err(ParseNonceError::Hex(hex::FromHexError::InvalidHexCharacter {
                c: 'z',
                index: 0
            }))
        );
        assert_eq!(
            "00000000000000000000000000000000".parse::<Nonce>(),
            Err(ParseNonceError::Zero)
        );
    }

    #[test]
    fn zero_parts_are_rejected() {
        assert!(Nonce::from_parts(0, 0).is_none());
        assert!(Nonce::from_parts(0, 1).is_some());
    }

    #[test]
    fn order_follows_high_then_low() {
        let a = Nonce::from_parts(1, u64::MAX).unwrap();
        let b = Nonce::from_parts(2, 0).unwrap();
        assert!(a < b);
    }

    #[test]
    fn created_tokens_differ() {
        assert_ne!(Nonce::create(), Nonce::create());
    }
}
