use crate::{
    Result,
    constants::{INVALID_CARD_IDS, MAX_CARD_ID_BYTES, MAX_CARD_ID_LENGTH, MIN_CARD_ID_LENGTH},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Normalized card identifier (IDm/UID) as uppercase hex.
///
/// Contactless readers surface a FeliCa IDm, contact readers an ISO 14443
/// UID; both are carried as the same uppercase hex string. Construction
/// validates length and filters the well-known invalid patterns that
/// readers return for an empty field, so everything downstream
/// (dedup filter, delivery pipeline, local queue) can trust the value.
///
/// # Security
/// This type implements constant-time comparison to avoid leaking identifier
/// contents through comparison timing.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct CardId(String);

impl CardId {
    /// Create a card identifier from a string with validation.
    ///
    /// The value is normalized (trimmed, uppercased) before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if:
    /// - The identifier is shorter than 8 or longer than 32 hex characters
    /// - The identifier contains non-hex characters
    /// - The identifier matches a known invalid pattern (all-zero, all-F)
    pub fn new(raw: &str) -> Result<Self> {
        let id = raw.trim().to_uppercase();

        let len = id.len();
        if !(MIN_CARD_ID_LENGTH..=MAX_CARD_ID_LENGTH).contains(&len) {
            return Err(Error::InvalidCardId(format!(
                "card id must be {MIN_CARD_ID_LENGTH}-{MAX_CARD_ID_LENGTH} hex chars, got {len}"
            )));
        }

        if !id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidCardId(format!(
                "card id must be hexadecimal: {id}"
            )));
        }

        if INVALID_CARD_IDS.contains(&id.as_str()) {
            return Err(Error::InvalidCardId(format!("placeholder pattern: {id}")));
        }

        Ok(CardId(id))
    }

    /// Create a card identifier from raw reader response bytes.
    ///
    /// At most [`MAX_CARD_ID_BYTES`] bytes are used; longer responses carry
    /// trailing protocol data, not identifier.
    ///
    /// # Errors
    /// Returns `Error::InvalidCardId` if fewer than 4 bytes are provided or
    /// the encoded value fails [`CardId::new`] validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::InvalidCardId(format!(
                "card id needs at least 4 bytes, got {}",
                bytes.len()
            )));
        }

        let take = bytes.len().min(MAX_CARD_ID_BYTES);
        let hex: String = bytes[..take].iter().map(|b| format!("{b:02X}")).collect();
        CardId::new(&hex)
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardId::new(s)
    }
}

/// Constant-time comparison implementation for CardId.
impl PartialEq for CardId {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

/// Hash implementation for CardId, for use in hash-based collections.
impl std::hash::Hash for CardId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Stable per-device terminal identifier.
///
/// Derived once at startup from the hardware network address and attached to
/// every outgoing record for provenance. Immutable for the process lifetime;
/// clones are handed to every worker that needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalId(String);

impl TerminalId {
    /// Derive the terminal identifier from the primary network interface.
    ///
    /// # Errors
    /// Returns `Error::Identity` if no interface reports a hardware address.
    /// Callers typically fall back to [`TerminalId::generated`] and log the
    /// substitution.
    pub fn from_hardware() -> Result<Self> {
        match mac_address::get_mac_address() {
            Ok(Some(mac)) => Ok(Self::from_mac_bytes(mac.bytes())),
            Ok(None) => Err(Error::Identity(
                "no network interface reported a hardware address".to_string(),
            )),
            Err(e) => Err(Error::Identity(e.to_string())),
        }
    }

    /// Derive a terminal identifier from six raw MAC bytes.
    #[must_use]
    pub fn from_mac_bytes(bytes: [u8; 6]) -> Self {
        let formatted = bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(":");
        TerminalId(formatted)
    }

    /// Generate a random locally-administered identifier.
    ///
    /// Fallback for hosts without a readable hardware address. The
    /// locally-administered bit is set so the value can never collide with
    /// a real vendor-assigned address.
    #[must_use]
    pub fn generated() -> Self {
        let uuid = uuid::Uuid::new_v4();
        let raw = uuid.as_bytes();
        let mut bytes = [raw[0], raw[1], raw[2], raw[3], raw[4], raw[5]];
        bytes[0] = (bytes[0] | 0x02) & !0x01;
        Self::from_mac_bytes(bytes)
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TerminalId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("04A1B2C3", "04A1B2C3")]
    #[case("04a1b2c3", "04A1B2C3")]
    #[case("  0123456789abcdef  ", "0123456789ABCDEF")]
    #[case("01140B0017212345", "01140B0017212345")]
    fn test_card_id_valid(#[case] input: &str, #[case] expected: &str) {
        let card = CardId::new(input).unwrap();
        assert_eq!(card.as_str(), expected);
    }

    #[rstest]
    #[case("")] // empty
    #[case("04A1B2")] // too short
    #[case("04A1B2GZ")] // not hex
    fn test_card_id_invalid(#[case] input: &str) {
        assert!(CardId::new(input).is_err());
    }

    #[test]
    fn test_card_id_too_long() {
        let input = "1".repeat(MAX_CARD_ID_LENGTH + 1);
        assert!(CardId::new(&input).is_err());
    }

    #[rstest]
    #[case("00000000")]
    #[case("FFFFFFFF")]
    #[case("ffffffff")]
    #[case("0000000000000000")]
    fn test_card_id_placeholder_patterns_rejected(#[case] input: &str) {
        assert!(CardId::new(input).is_err());
    }

    #[test]
    fn test_card_id_from_bytes() {
        let card = CardId::from_bytes(&[0x04, 0xA1, 0xB2, 0xC3]).unwrap();
        assert_eq!(card.as_str(), "04A1B2C3");
    }

    #[test]
    fn test_card_id_from_bytes_truncates_long_responses() {
        let bytes = [0xABu8; 20];
        let card = CardId::from_bytes(&bytes).unwrap();
        assert_eq!(card.as_str().len(), MAX_CARD_ID_BYTES * 2);
    }

    #[test]
    fn test_card_id_from_bytes_too_short() {
        assert!(CardId::from_bytes(&[0x04, 0xA1]).is_err());
    }

    #[test]
    fn test_card_id_from_bytes_zero_filled_rejected() {
        assert!(CardId::from_bytes(&[0x00, 0x00, 0x00, 0x00]).is_err());
    }

    #[test]
    fn test_card_id_equality() {
        let a = CardId::new("04A1B2C3").unwrap();
        let b = CardId::new("04a1b2c3").unwrap();
        let c = CardId::new("04A1B2C4").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_terminal_id_format() {
        let id = TerminalId::from_mac_bytes([0xAA, 0xBB, 0xCC, 0x0D, 0xEE, 0xFF]);
        assert_eq!(id.as_str(), "AA:BB:CC:0D:EE:FF");
    }

    #[test]
    fn test_terminal_id_generated_is_locally_administered() {
        let id = TerminalId::generated();
        let first_octet = u8::from_str_radix(&id.as_str()[..2], 16).unwrap();
        assert_eq!(first_octet & 0x02, 0x02);
        assert_eq!(first_octet & 0x01, 0x00);
    }

    #[test]
    fn test_terminal_id_generated_unique() {
        assert_ne!(TerminalId::generated(), TerminalId::generated());
    }
}
