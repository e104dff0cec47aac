//! APDU command profiles for contact smartcard readers.
//!
//! Different reader families answer different identifier commands, and some
//! answer the wrong one first. Each profile is an ordered command list: the
//! polling worker walks it until a command yields a valid identifier.
//!
//! The profile is resolved exactly once, when a reader is registered, from
//! a static name-substring table. It is never re-evaluated per poll.

/// UID request, variable length.
pub const APDU_UID_VARIABLE: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// UID request, 4 bytes.
pub const APDU_UID_4: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x04];

/// UID request, 7 bytes.
pub const APDU_UID_7: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x07];

/// UID request, 10 bytes.
pub const APDU_UID_10: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x0A];

/// GET DATA request.
pub const APDU_GET_DATA: [u8; 5] = [0xFF, 0xCA, 0x01, 0x00, 0x00];

/// FeliCa IDm read (Read Without Encryption wrapper).
pub const APDU_FELICA_IDM: [u8; 11] = [
    0xFF, 0xB0, 0x00, 0x00, 0x09, 0x06, 0x00, 0xFF, 0xFF, 0x01, 0x00,
];

/// Command profile for a contact smartcard reader family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandProfile {
    /// Sony / PaSoRi family (FeliCa capable).
    SonyFelica,
    /// Circle CIR315 family.
    CircleCir315,
    /// Anything else.
    Generic,
}

/// Name-substring table mapping reader names to profiles.
///
/// Matched case-insensitively against the reader name reported by the
/// smartcard subsystem; first hit wins, no hit means [`CommandProfile::Generic`].
const PROFILE_TABLE: &[(&str, CommandProfile)] = &[
    ("SONY", CommandProfile::SonyFelica),
    ("RC-S", CommandProfile::SonyFelica),
    ("PASORI", CommandProfile::SonyFelica),
    ("CIRCLE", CommandProfile::CircleCir315),
    ("CIR315", CommandProfile::CircleCir315),
    ("CIR-315", CommandProfile::CircleCir315),
];

impl CommandProfile {
    /// Resolve the profile for a reader name.
    #[must_use]
    pub fn for_reader_name(name: &str) -> Self {
        let upper = name.to_uppercase();
        PROFILE_TABLE
            .iter()
            .find(|(needle, _)| upper.contains(needle))
            .map(|(_, profile)| *profile)
            .unwrap_or(CommandProfile::Generic)
    }

    /// Ordered identifier commands for this profile.
    #[must_use]
    pub fn apdus(&self) -> &'static [&'static [u8]] {
        match self {
            CommandProfile::SonyFelica => &[
                &APDU_UID_VARIABLE,
                &APDU_UID_4,
                &APDU_UID_7,
                &APDU_FELICA_IDM,
                &APDU_GET_DATA,
            ],
            CommandProfile::CircleCir315 => &[
                &APDU_UID_VARIABLE,
                &APDU_UID_4,
                &APDU_GET_DATA,
                &APDU_FELICA_IDM,
                &APDU_UID_7,
            ],
            CommandProfile::Generic => &[
                &APDU_UID_VARIABLE,
                &APDU_UID_4,
                &APDU_UID_7,
                &APDU_UID_10,
                &APDU_GET_DATA,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_sony_family() {
        assert_eq!(
            CommandProfile::for_reader_name("SONY FeliCa Port/PaSoRi 3.0"),
            CommandProfile::SonyFelica
        );
        assert_eq!(
            CommandProfile::for_reader_name("Sony RC-S380/P"),
            CommandProfile::SonyFelica
        );
        assert_eq!(
            CommandProfile::for_reader_name("pasori s380"),
            CommandProfile::SonyFelica
        );
    }

    #[test]
    fn test_profile_circle_family() {
        assert_eq!(
            CommandProfile::for_reader_name("CIR315 CL"),
            CommandProfile::CircleCir315
        );
        assert_eq!(
            CommandProfile::for_reader_name("Circle CIR-315 Contactless"),
            CommandProfile::CircleCir315
        );
    }

    #[test]
    fn test_profile_generic_fallback() {
        assert_eq!(
            CommandProfile::for_reader_name("ACS ACR122U PICC Interface"),
            CommandProfile::Generic
        );
    }

    #[test]
    fn test_profile_command_order() {
        let sony = CommandProfile::SonyFelica.apdus();
        assert_eq!(sony[0], &APDU_UID_VARIABLE);
        assert_eq!(sony[3], APDU_FELICA_IDM.as_slice());

        let generic = CommandProfile::Generic.apdus();
        assert_eq!(generic.len(), 5);
        assert!(generic.contains(&APDU_UID_10.as_slice()));
    }
}
