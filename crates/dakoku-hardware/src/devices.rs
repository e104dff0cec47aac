//! Enum wrappers for reader driver dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) are not object-safe,
//! so drivers cannot be boxed as trait objects. These enums provide concrete
//! type dispatch at compile time instead: zero-cost, type-safe, and open to
//! feature-gated real-driver variants.
//!
//! The `Unavailable` variant replaces runtime "try import, else disable"
//! capability probing: transport availability is resolved exactly once at
//! startup, and a reader on a transport that is not compiled in carries an
//! [`UnavailableDriver`] that fails every operation with a clear error.

use crate::mock::{MockContactless, MockSmartcard};
use crate::traits::{ContactlessDriver, SmartcardDriver};
use crate::types::ApduResponse;
use crate::{HardwareError, Result};
use std::time::Duration;

/// Placeholder driver for a transport that is not available in this build.
///
/// Every operation fails with [`HardwareError::Unsupported`] naming the
/// missing capability, so a misconfigured deployment surfaces immediately
/// in the logs instead of silently polling nothing.
#[derive(Debug)]
pub struct UnavailableDriver {
    capability: String,
}

impl UnavailableDriver {
    /// Create a placeholder for the named missing capability.
    pub fn new(capability: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
        }
    }

    fn unsupported(&self) -> HardwareError {
        HardwareError::unsupported(self.capability.clone())
    }
}

impl ContactlessDriver for UnavailableDriver {
    async fn detect(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>> {
        Err(self.unsupported())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SmartcardDriver for UnavailableDriver {
    async fn connect(&mut self) -> Result<bool> {
        Err(self.unsupported())
    }

    async fn transmit(&mut self, _apdu: &[u8]) -> Result<ApduResponse> {
        Err(self.unsupported())
    }

    async fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Enum wrapper for contactless driver dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyContactlessDriver {
    /// Mock frontend for development and testing.
    Mock(MockContactless),
    /// Transport not compiled into this build.
    Unavailable(UnavailableDriver),
    // Planned variants behind feature flags:
    // - Nfc(NfcFrontend) - hardware-nfc, e.g. Sony RC-S380
}

impl ContactlessDriver for AnyContactlessDriver {
    async fn detect(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        match self {
            Self::Mock(driver) => driver.detect(timeout).await,
            Self::Unavailable(driver) => ContactlessDriver::detect(driver, timeout).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.close().await,
            Self::Unavailable(driver) => ContactlessDriver::close(driver).await,
        }
    }
}

/// Enum wrapper for contact smartcard driver dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnySmartcardDriver {
    /// Mock reader for development and testing.
    Mock(MockSmartcard),
    /// Transport not compiled into this build.
    Unavailable(UnavailableDriver),
    // Planned variants behind feature flags:
    // - Pcsc(PcscReader) - hardware-pcsc
}

impl SmartcardDriver for AnySmartcardDriver {
    async fn connect(&mut self) -> Result<bool> {
        match self {
            Self::Mock(driver) => driver.connect().await,
            Self::Unavailable(driver) => SmartcardDriver::connect(driver).await,
        }
    }

    async fn transmit(&mut self, apdu: &[u8]) -> Result<ApduResponse> {
        match self {
            Self::Mock(driver) => driver.transmit(apdu).await,
            Self::Unavailable(driver) => SmartcardDriver::transmit(driver, apdu).await,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.disconnect().await,
            Self::Unavailable(driver) => SmartcardDriver::disconnect(driver).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unavailable_contactless_fails_detect() {
        let mut driver = AnyContactlessDriver::Unavailable(UnavailableDriver::new(
            "contactless frontend (hardware-nfc)",
        ));

        let result = driver.detect(Duration::from_millis(400)).await;
        assert!(matches!(result, Err(HardwareError::Unsupported { .. })));
        assert!(driver.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_smartcard_fails_connect() {
        let mut driver =
            AnySmartcardDriver::Unavailable(UnavailableDriver::new("pcsc subsystem"));

        assert!(matches!(
            driver.connect().await,
            Err(HardwareError::Unsupported { .. })
        ));
    }

    #[tokio::test]
    async fn test_mock_dispatch() {
        let (mock, handle) = MockContactless::new();
        let mut driver = AnyContactlessDriver::Mock(mock);

        handle.present_card(vec![0x04, 0xA1, 0xB2, 0xC3]);
        let uid = driver.detect(Duration::from_millis(400)).await.unwrap();
        assert_eq!(uid, Some(vec![0x04, 0xA1, 0xB2, 0xC3]));
    }
}
