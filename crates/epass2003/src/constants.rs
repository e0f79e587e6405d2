//! Protocol constants for the FTCOS/ePass2003 command set
//!
//! Byte-level constants pulled out of the wrap/unwrap and command-building
//! code so that magic numbers only appear once.

/// CLA byte conventions
pub mod cla {
    /// Plain ISO 7816-4 command
    pub const ISO: u8 = 0x00;
    /// Proprietary (FTCOS) command
    pub const PROPRIETARY: u8 = 0x80;
    /// Secure-messaging bit, OR'd into CLA for SM-wrapped commands
    pub const SM_MASK: u8 = 0x0C;
    /// CLA value the card requires on EXTERNAL AUTHENTICATE during the SCP01
    /// handshake — neither plain ISO nor the general proprietary class.
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x84;
}

/// Instruction bytes used by the driver's command set
pub mod ins {
    pub const SELECT_FILE: u8 = 0xA4;
    pub const CREATE_FILE: u8 = 0xE0;
    pub const DELETE_FILE: u8 = 0xE4;
    pub const LIST_FILES: u8 = 0x34;
    pub const GET_DATA: u8 = 0xCA;
    pub const INITIALIZE_UPDATE: u8 = 0x50;
    pub const EXTERNAL_AUTHENTICATE: u8 = 0x82;
    pub const GET_CHALLENGE: u8 = 0x84;
    pub const SET_SECURITY_ENV: u8 = 0x22;
    pub const PERFORM_SECURITY_OPERATION: u8 = 0x2A;
    pub const GENERATE_RSA_KEY: u8 = 0x46;
    pub const READ_PUBLIC_KEY: u8 = 0xB4;
    pub const WRITE_RSA_FACTOR: u8 = 0xE7;
    pub const INSTALL_SECRET_KEY: u8 = 0xE3;
    pub const UPDATE_SECRET_KEY: u8 = 0xE5;
}

/// Tag values used in the secure-messaging wire format (GlobalPlatform
/// SCP01-style BER-TLV framing, §6 of the protocol).
pub mod sm_tags {
    /// Encrypted command/response data, body prefixed with a 0x01 padding-indicator byte
    pub const DATA: u8 = 0x87;
    /// Cleartext expected response length (Le)
    pub const LE: u8 = 0x97;
    /// 8-byte MAC over the command
    pub const MAC: u8 = 0x8E;
    /// 2-byte SW1/SW2, response only
    pub const PROCESSING_STATUS: u8 = 0x99;
}

/// File Control Information (FCI) tags (§6)
pub mod fci_tags {
    pub const TEMPLATE: u8 = 0x62;
    /// Standard ISO 7816-4 FCI template tag, as actually returned by SELECT
    /// (see [`TEMPLATE`] for the tag [`crate::fci::construct_fci`] emits)
    pub const TEMPLATE_ALT: u8 = 0x6F;
    pub const SIZE: u8 = 0x80;
    pub const SIZE_ALT: u8 = 0x81;
    pub const DESCRIPTOR: u8 = 0x82;
    pub const FID: u8 = 0x83;
    pub const DF_NAME: u8 = 0x84;
    pub const PROPRIETARY: u8 = 0x85;
    pub const PROPRIETARY_ALT: u8 = 0xA5;
    pub const ACL: u8 = 0x86;
    pub const RSA_PUBLIC: u8 = 0x87;
    pub const STATUS: u8 = 0x8A;
}

/// Access-control byte values for tag 0x86 (ACL)
pub mod acl {
    pub const MAC_NOLESS: u8 = 0x80;
    pub const EVERYONE: u8 = 0x00;
    pub const USER: u8 = 0x01;
    pub const SO: u8 = 0x02;
    pub const NOONE: u8 = 0x0F;
    /// Slot not applicable to this file/operation
    pub const NOT_APPLICABLE: u8 = 0xFF;

    /// Operation slot indices within the 8-byte ACL array
    pub mod op {
        pub const LIST_OR_READ: usize = 0;
        pub const CREATE_OR_UPDATE: usize = 1;
        pub const WRITE_OR_CRYPTO: usize = 2;
        pub const DELETE: usize = 3;
    }
}

/// Amount by which a hooked FID's low byte is scaled: the card implements
/// SFI as the lower 5 bits of the FID and forbids duplicate SFIs within a
/// single DF, so colliding directories are remapped at the APDU boundary
/// by multiplying/dividing the low byte by this step.
pub const FID_STEP: u8 = 0x20;

/// High bytes of file identifiers that require [`FID_STEP`] hooking
pub const HOOKED_FID_HIGH_BYTES: [u8; 6] = [0x29, 0x30, 0x31, 0x32, 0x33, 0x34];

/// ATR pattern/mask identifying the FTCOS/ePass2003 card family
pub const ATR_PATTERN: [u8; 23] = [
    0x3B, 0x9F, 0x95, 0x81, 0x31, 0xFE, 0x9F, 0x00, 0x66, 0x46, 0x53, 0x05, 0x10, 0x00, 0x11,
    0x71, 0xDF, 0x00, 0x00, 0x00, 0x6A, 0x82, 0x5E,
];

/// ATR mask paired with [`ATR_PATTERN`]
pub const ATR_MASK: [u8; 23] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x00,
    0xFF, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x00, 0x00,
];

/// Card driver name reported for the ATR pattern above
pub const CARD_TYPE_LABEL: &str = "FTCOS/ePass2003";

/// Whether `atr` matches [`ATR_PATTERN`] under [`ATR_MASK`]. Card lookup and
/// driver registration themselves are out of scope for this crate; this is
/// just the bit-level match test a caller's registry would use.
pub fn matches_atr(atr: &[u8]) -> bool {
    atr.len() == ATR_PATTERN.len()
        && atr
            .iter()
            .zip(ATR_PATTERN.iter())
            .zip(ATR_MASK.iter())
            .all(|((a, p), m)| a & m == p & m)
}

/// P1 value GET DATA expects regardless of which tag is requested
pub const GET_DATA_P1: u8 = 0x01;
/// `get_data` tag identifying the FIPS/non-FIPS (AES vs DES) mode byte
pub const GET_DATA_FIPS_MODE: u8 = 0x86;
/// `get_data` tag identifying the card serial number
pub const GET_DATA_SERIAL: u8 = 0x80;

/// Maximum verification counter value for PIN/PUK secret keys
pub const MAX_PIN_COUNTER: u8 = 0x0F;

/// Length, in bytes, of the SHA-1-based PIN verification image
pub const PIN_IMAGE_LEN: usize = 24;

/// `ktype` values recognized by INSTALL SECRET KEY / UPDATE SECRET KEY; the
/// PIN and PUK types get their ac4..ac7 retry-counter slots populated, all
/// other key types leave them zeroed.
pub mod ktype {
    pub const PIN: u8 = 0x04;
    pub const PUK: u8 = 0x06;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_atr_respects_mask() {
        assert!(matches_atr(&ATR_PATTERN));
        let mut mutated = ATR_PATTERN;
        mutated[5] = 0xAB; // masked-out byte, must still match
        assert!(matches_atr(&mutated));
        let mut wrong = ATR_PATTERN;
        wrong[0] = 0x00; // masked-in byte, must fail
        assert!(!matches_atr(&wrong));
    }

    #[test]
    fn matches_atr_rejects_wrong_length() {
        assert!(!matches_atr(&ATR_PATTERN[..10]));
    }
}
