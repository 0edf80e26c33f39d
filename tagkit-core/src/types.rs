//! Core data model: tag identifiers, key material and token sequences.

use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::Error;

/// Byte width of an NTAG424-class manufacturing UID.
pub const UID_LEN: usize = 7;

/// Byte width of an AES-128 master key.
pub const KEY_LEN: usize = 16;

/// Byte width of a truncated authentication code.
pub const CODE_LEN: usize = 8;

/// Unique identifier of a physical tag.
///
/// Burned in at manufacture and immutable for the tag's lifetime. Obtained
/// by reading the tag or supplied by the caller as hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagUid([u8; UID_LEN]);

impl TagUid {
    /// Wraps raw UID bytes.
    #[must_use]
    pub const fn new(bytes: [u8; UID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a UID from a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHex`] if `hex` is not valid hex, or
    /// [`Error::InvalidUidLength`] if it does not decode to [`UID_LEN`]
    /// bytes.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex).map_err(|err| Error::InvalidHex {
            field: "uid",
            error: err.to_string(),
        })?;
        let bytes: [u8; UID_LEN] =
            bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| Error::InvalidUidLength {
                    expected: UID_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }

    /// Returns the raw UID bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; UID_LEN] {
        &self.0
    }
}

impl fmt::Display for TagUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for TagUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Shared secret used to derive per-counter authentication codes.
///
/// The default value is the all-zero transport key that unprovisioned tags
/// ship with; it is an explicit, documented default rather than a hidden
/// constant, so every call site states which key it derives against. Key
/// bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq, Default, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_LEN]);

impl MasterKey {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a key from a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHex`] if `hex` is not valid hex, or
    /// [`Error::InvalidKeyLength`] if it does not decode to [`KEY_LEN`]
    /// bytes.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex).map_err(|err| Error::InvalidHex {
            field: "key",
            error: err.to_string(),
        })?;
        let bytes: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| Error::InvalidKeyLength {
                    expected: KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(bytes))
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

impl FromStr for MasterKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Single-use authentication code bound to one counter index.
///
/// Rendered as 16 uppercase hex characters, the form the tag emits as its
/// authentication suffix and the verification service expects on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenCode([u8; CODE_LEN]);

impl TokenCode {
    /// Wraps raw code bytes.
    #[must_use]
    pub const fn new(bytes: [u8; CODE_LEN]) -> Self {
        Self(bytes)
    }

    /// Parses a code from a hex string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHex`] if `hex` is not valid hex, or
    /// [`Error::MalformedRecord`] if it does not decode to [`CODE_LEN`]
    /// bytes.
    pub fn from_hex(hex: &str) -> Result<Self, Error> {
        let bytes = hex::decode(hex).map_err(|err| Error::InvalidHex {
            field: "code",
            error: err.to_string(),
        })?;
        let bytes: [u8; CODE_LEN] =
            bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| {
                    Error::MalformedRecord(format!(
                        "code must be {CODE_LEN} bytes, got {}",
                        bytes.len()
                    ))
                })?;
        Ok(Self(bytes))
    }

    /// Returns the raw code bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CODE_LEN] {
        &self.0
    }
}

impl fmt::Display for TokenCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl FromStr for TokenCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for TokenCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(D::Error::custom)
    }
}

/// One authentication code bound to one counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Counter index the code authenticates, starting at 1.
    pub index: u32,
    /// The derived code.
    pub code: TokenCode,
}

/// Ordered collection of token records for one tag.
///
/// Invariant, enforced at construction: non-empty, first index at least 1,
/// indices strictly increasing by 1 with no gaps or duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSequence {
    records: Vec<TokenRecord>,
}

impl TokenSequence {
    /// Validates `records` and wraps them as a sequence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySequence`] for zero records, and
    /// [`Error::MalformedRecord`] when the first index is below 1 or any
    /// index is not exactly one above its predecessor.
    pub fn new(records: Vec<TokenRecord>) -> Result<Self, Error> {
        let Some(first) = records.first() else {
            return Err(Error::EmptySequence);
        };
        if first.index == 0 {
            return Err(Error::MalformedRecord(
                "counter indices start at 1".to_string(),
            ));
        }
        for pair in records.windows(2) {
            if pair[1].index != pair[0].index + 1 {
                return Err(Error::MalformedRecord(format!(
                    "index {} follows {}; indices must be contiguous and strictly increasing",
                    pair[1].index, pair[0].index
                )));
            }
        }
        Ok(Self { records })
    }

    /// Returns the records in counter order.
    #[must_use]
    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }

    /// Number of records in the sequence; always at least 1.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// First counter index covered.
    #[must_use]
    pub fn first_index(&self) -> u32 {
        self.records[0].index
    }

    /// Last counter index covered.
    #[must_use]
    pub fn last_index(&self) -> u32 {
        self.records[self.records.len() - 1].index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u32, fill: u8) -> TokenRecord {
        TokenRecord {
            index,
            code: TokenCode::new([fill; CODE_LEN]),
        }
    }

    #[test]
    fn uid_hex_round_trip() {
        let uid = TagUid::from_hex("04de5f1eacc040").unwrap();
        assert_eq!(uid.to_string(), "04DE5F1EACC040");
        assert_eq!(uid, "04DE5F1EACC040".parse().unwrap());
    }

    #[test]
    fn uid_rejects_wrong_width() {
        let err = TagUid::from_hex("04A1B2C3").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidUidLength {
                expected: UID_LEN,
                actual: 4
            }
        ));
    }

    #[test]
    fn uid_rejects_bad_hex() {
        let err = TagUid::from_hex("zz").unwrap_err();
        assert!(matches!(err, Error::InvalidHex { field: "uid", .. }));
    }

    #[test]
    fn key_default_is_all_zero() {
        assert_eq!(MasterKey::default().as_bytes(), &[0u8; KEY_LEN]);
        assert_eq!(
            MasterKey::from_hex(&"00".repeat(KEY_LEN)).unwrap(),
            MasterKey::default()
        );
    }

    #[test]
    fn key_rejects_wrong_width() {
        let err = MasterKey::from_hex("0011").unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidKeyLength {
                expected: KEY_LEN,
                actual: 2
            }
        ));
    }

    #[test]
    fn key_debug_is_redacted() {
        let key = MasterKey::from_hex("000102030405060708090a0b0c0d0e0f").unwrap();
        assert_eq!(format!("{key:?}"), "MasterKey(..)");
    }

    #[test]
    fn code_display_is_uppercase_hex() {
        let code = TokenCode::new([0x94, 0xEE, 0xD9, 0xEE, 0x65, 0x33, 0x70, 0x86]);
        assert_eq!(code.to_string(), "94EED9EE65337086");
        assert_eq!(TokenCode::from_hex("94eed9ee65337086").unwrap(), code);
    }

    #[test]
    fn sequence_accepts_contiguous_records() {
        let seq =
            TokenSequence::new(vec![record(1, 0xAA), record(2, 0xBB), record(3, 0xCC)]).unwrap();
        assert_eq!(seq.count(), 3);
        assert_eq!(seq.first_index(), 1);
        assert_eq!(seq.last_index(), 3);
    }

    #[test]
    fn sequence_rejects_empty() {
        assert!(matches!(
            TokenSequence::new(vec![]).unwrap_err(),
            Error::EmptySequence
        ));
    }

    #[test]
    fn sequence_rejects_index_zero() {
        assert!(matches!(
            TokenSequence::new(vec![record(0, 0xAA)]).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn sequence_rejects_gap() {
        assert!(matches!(
            TokenSequence::new(vec![record(1, 0xAA), record(3, 0xBB)]).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }

    #[test]
    fn sequence_rejects_duplicate() {
        assert!(matches!(
            TokenSequence::new(vec![record(1, 0xAA), record(1, 0xBB)]).unwrap_err(),
            Error::MalformedRecord(_)
        ));
    }
}
