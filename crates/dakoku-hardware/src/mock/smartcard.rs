//! Mock contact smartcard reader.

use crate::{
    Result,
    error::HardwareError,
    traits::SmartcardDriver,
    types::{ApduResponse, SW1_SUCCESS, SW2_SUCCESS},
};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Default)]
struct FieldState {
    card: Option<Vec<u8>>,
    failing: bool,
    /// When set, only this exact APDU is answered with the identifier;
    /// every other command gets an error status. Exercises profile
    /// command-order fallback.
    answer_only: Option<Vec<u8>>,
}

/// Mock contact smartcard reader for testing and development.
///
/// Answers identifier APDUs (GET UID / FeliCa IDm families) with the UID of
/// the card currently in the field. The [`MockSmartcardHandle`] controls
/// card presence and failure injection.
///
/// # Examples
///
/// ```
/// use dakoku_hardware::mock::MockSmartcard;
/// use dakoku_hardware::profile::APDU_UID_VARIABLE;
/// use dakoku_hardware::traits::SmartcardDriver;
///
/// #[tokio::main]
/// async fn main() -> dakoku_hardware::Result<()> {
///     let (mut reader, handle) = MockSmartcard::new();
///     handle.present_card(vec![0x04, 0xA1, 0xB2, 0xC3]);
///
///     assert!(reader.connect().await?);
///     let resp = reader.transmit(&APDU_UID_VARIABLE).await?;
///     assert!(resp.is_success());
///     assert_eq!(resp.data, vec![0x04, 0xA1, 0xB2, 0xC3]);
///     reader.disconnect().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSmartcard {
    state: Arc<Mutex<FieldState>>,
    name: String,
    connected: bool,
}

impl MockSmartcard {
    /// Create a new mock reader with the default name.
    pub fn new() -> (Self, MockSmartcardHandle) {
        Self::with_name("Mock Smartcard Reader".to_string())
    }

    /// Create a new mock reader with a custom name.
    pub fn with_name(name: String) -> (Self, MockSmartcardHandle) {
        let state = Arc::new(Mutex::new(FieldState::default()));

        let reader = Self {
            state: state.clone(),
            name,
            connected: false,
        };

        (reader, MockSmartcardHandle { state })
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn is_identifier_command(apdu: &[u8]) -> bool {
        apdu.len() >= 2 && apdu[0] == 0xFF && (apdu[1] == 0xCA || apdu[1] == 0xB0)
    }
}

impl SmartcardDriver for MockSmartcard {
    async fn connect(&mut self) -> Result<bool> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.failing {
            return Err(HardwareError::communication("injected subsystem failure"));
        }

        self.connected = state.card.is_some();
        Ok(self.connected)
    }

    async fn transmit(&mut self, apdu: &[u8]) -> Result<ApduResponse> {
        if !self.connected {
            return Err(HardwareError::disconnected(self.name.clone()));
        }

        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.failing {
            return Err(HardwareError::communication("injected subsystem failure"));
        }

        let Some(uid) = state.card.as_ref() else {
            // Card pulled mid-exchange
            return Ok(ApduResponse::new(Vec::new(), 0x6A, 0x82));
        };

        let answered = match state.answer_only.as_ref() {
            Some(only) => only.as_slice() == apdu,
            None => Self::is_identifier_command(apdu),
        };

        if answered {
            Ok(ApduResponse::new(uid.clone(), SW1_SUCCESS, SW2_SUCCESS))
        } else {
            Ok(ApduResponse::new(Vec::new(), 0x6A, 0x81))
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }
}

/// Handle for controlling a [`MockSmartcard`] field.
#[derive(Debug, Clone)]
pub struct MockSmartcardHandle {
    state: Arc<Mutex<FieldState>>,
}

impl MockSmartcardHandle {
    /// Place a card in the reader's field. It stays until removed.
    pub fn present_card(&self, uid: Vec<u8>) {
        self.lock().card = Some(uid);
    }

    /// Remove the current card from the field.
    pub fn remove_card(&self) {
        self.lock().card = None;
    }

    /// Inject or clear a transport failure.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Restrict identifier answers to one exact APDU; `None` restores the
    /// default behavior of answering the whole GET UID / IDm family.
    pub fn set_answer_only(&self, apdu: Option<Vec<u8>>) {
        self.lock().answer_only = apdu;
    }

    /// Whether a card is currently in the field.
    pub fn is_card_presented(&self) -> bool {
        self.lock().card.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FieldState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{APDU_FELICA_IDM, APDU_UID_4, APDU_UID_VARIABLE};

    #[tokio::test]
    async fn test_connect_without_card() {
        let (mut reader, _handle) = MockSmartcard::new();
        assert!(!reader.connect().await.unwrap());
    }

    #[tokio::test]
    async fn test_transmit_returns_uid() {
        let (mut reader, handle) = MockSmartcard::new();
        handle.present_card(vec![0x01, 0x14, 0x0B, 0x00, 0x17, 0x21, 0x23, 0x45]);

        assert!(reader.connect().await.unwrap());
        let resp = reader.transmit(&APDU_UID_VARIABLE).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.data.len(), 8);
    }

    #[tokio::test]
    async fn test_transmit_without_connect_errors() {
        let (mut reader, handle) = MockSmartcard::new();
        handle.present_card(vec![0x01, 0x02, 0x03, 0x04]);

        let result = reader.transmit(&APDU_UID_VARIABLE).await;
        assert!(matches!(result, Err(HardwareError::Disconnected { .. })));
    }

    #[tokio::test]
    async fn test_answer_only_forces_fallback() {
        let (mut reader, handle) = MockSmartcard::new();
        handle.present_card(vec![0x01, 0x02, 0x03, 0x04]);
        handle.set_answer_only(Some(APDU_FELICA_IDM.to_vec()));

        reader.connect().await.unwrap();

        let first = reader.transmit(&APDU_UID_4).await.unwrap();
        assert!(!first.is_success());

        let second = reader.transmit(&APDU_FELICA_IDM).await.unwrap();
        assert!(second.is_success());
    }

    #[tokio::test]
    async fn test_injected_failure_on_connect() {
        let (mut reader, handle) = MockSmartcard::new();
        handle.set_failing(true);
        assert!(reader.connect().await.is_err());
    }
}
