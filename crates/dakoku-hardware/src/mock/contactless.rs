//! Mock contactless frontend.

use crate::{Result, error::HardwareError, traits::ContactlessDriver};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct FieldState {
    card: Option<Vec<u8>>,
    failing: bool,
}

/// Mock contactless reader for testing and development.
///
/// Simulates a frontend whose field is controlled through a
/// [`MockContactlessHandle`]: a presented card stays in the field (and is
/// returned by every `detect` call) until the handle removes it.
///
/// # Examples
///
/// ```
/// use dakoku_hardware::mock::MockContactless;
/// use dakoku_hardware::traits::ContactlessDriver;
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> dakoku_hardware::Result<()> {
///     let (mut reader, handle) = MockContactless::new();
///
///     handle.present_card(vec![0x04, 0xA1, 0xB2, 0xC3]);
///     let uid = reader.detect(Duration::from_millis(400)).await?;
///     assert_eq!(uid, Some(vec![0x04, 0xA1, 0xB2, 0xC3]));
///
///     handle.remove_card();
///     assert_eq!(reader.detect(Duration::from_millis(400)).await?, None);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockContactless {
    state: Arc<Mutex<FieldState>>,
    name: String,
    closed: bool,
}

impl MockContactless {
    /// Create a new mock frontend with the default name.
    pub fn new() -> (Self, MockContactlessHandle) {
        Self::with_name("Mock Contactless Reader".to_string())
    }

    /// Create a new mock frontend with a custom name.
    pub fn with_name(name: String) -> (Self, MockContactlessHandle) {
        let state = Arc::new(Mutex::new(FieldState::default()));

        let reader = Self {
            state: state.clone(),
            name,
            closed: false,
        };

        (reader, MockContactlessHandle { state })
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ContactlessDriver for MockContactless {
    async fn detect(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        if self.closed {
            return Err(HardwareError::disconnected(self.name.clone()));
        }

        let state = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if state.failing {
            return Err(HardwareError::communication("injected frontend failure"));
        }

        Ok(state.card.clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Handle for controlling a [`MockContactless`] field.
#[derive(Debug, Clone)]
pub struct MockContactlessHandle {
    state: Arc<Mutex<FieldState>>,
}

impl MockContactlessHandle {
    /// Place a card in the reader's field. It stays until removed.
    pub fn present_card(&self, uid: Vec<u8>) {
        self.lock().card = Some(uid);
    }

    /// Remove the current card from the field.
    pub fn remove_card(&self) {
        self.lock().card = None;
    }

    /// Inject or clear a transport failure: while failing, every `detect`
    /// call errors.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
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

    const TIMEOUT: Duration = Duration::from_millis(400);

    #[tokio::test]
    async fn test_detect_empty_field() {
        let (mut reader, _handle) = MockContactless::new();
        assert_eq!(reader.detect(TIMEOUT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_detect_presented_card_until_removed() {
        let (mut reader, handle) = MockContactless::new();
        handle.present_card(vec![0x01, 0x02, 0x03, 0x04]);

        assert!(reader.detect(TIMEOUT).await.unwrap().is_some());
        assert!(reader.detect(TIMEOUT).await.unwrap().is_some());

        handle.remove_card();
        assert_eq!(reader.detect(TIMEOUT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let (mut reader, handle) = MockContactless::new();
        handle.set_failing(true);
        assert!(reader.detect(TIMEOUT).await.is_err());

        handle.set_failing(false);
        assert!(reader.detect(TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_frontend_errors() {
        let (mut reader, _handle) = MockContactless::new();
        reader.close().await.unwrap();
        assert!(matches!(
            reader.detect(TIMEOUT).await,
            Err(HardwareError::Disconnected { .. })
        ));
    }
}
