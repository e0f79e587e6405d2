//! Secure-messaging session state
//!
//! Everything the wrap/unwrap codec needs to carry between APDUs: which
//! algorithm was negotiated, the two session keys, and the running MAC
//! chaining value (ICV).

use zeroize::Zeroize;

pub use crate::crypto::Algorithm;

/// Whether APDUs are sent in the clear or wrapped under the SCP01-style
/// secure-messaging envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmMode {
    /// No secure messaging; APDUs pass through unmodified
    Plain,
    /// SCP01 secure messaging is active
    Scp01Sm,
}

/// The two session keys derived during the handshake. Zeroized on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct Keys {
    /// Session encryption key (S-ENC)
    pub s_enc: [u8; 16],
    /// Session MAC key (S-MAC)
    pub s_mac: [u8; 16],
}

impl core::fmt::Debug for Keys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Keys").finish_non_exhaustive()
    }
}

/// Secure-messaging session state: algorithm, keys, ICV chaining value and
/// current mode. Constructed by [`crate::handshake::establish`] and consumed
/// by the wrap/unwrap codec in [`crate::smcodec`].
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Negotiated cipher algorithm
    pub algorithm: Algorithm,
    /// Session keys
    pub keys: Keys,
    /// Running MAC chaining value. Only the leading `algorithm.block_size()`
    /// bytes are live as a big-endian counter; for the 2-key 3DES path the
    /// upper 8 bytes are unused padding that stays zero for the life of the
    /// session.
    icv: [u8; 16],
    /// Whether secure messaging is currently active
    pub mode: SmMode,
}

impl SessionState {
    /// Build a fresh session state after a successful handshake. `icv_seed`
    /// is the 8-byte MAC computed over the EXTERNAL AUTHENTICATE APDU header
    /// during the handshake, which seeds the chaining value for every
    /// subsequent wrap.
    pub fn new(algorithm: Algorithm, keys: Keys, icv_seed: [u8; 8]) -> Self {
        let mut icv = [0u8; 16];
        icv[0..8].copy_from_slice(&icv_seed);
        Self {
            algorithm,
            keys,
            icv,
            mode: SmMode::Scp01Sm,
        }
    }

    /// Build a session state with secure messaging disabled. Used before a
    /// handshake has happened, or on a card the driver has decided not to
    /// wrap commands for.
    pub fn plain() -> Self {
        Self {
            algorithm: Algorithm::Aes128,
            keys: Keys {
                s_enc: [0; 16],
                s_mac: [0; 16],
            },
            icv: [0; 16],
            mode: SmMode::Plain,
        }
    }

    /// Whether secure messaging is currently active
    pub const fn is_active(&self) -> bool {
        matches!(self.mode, SmMode::Scp01Sm)
    }

    /// Increment the ICV counter by one (big-endian, carrying through the
    /// live prefix) and return the new value. Called exactly once per wrap,
    /// before the MAC is computed over that command.
    pub fn advance_icv(&mut self) -> [u8; 16] {
        let live = self.algorithm.block_size();
        for i in (0..live).rev() {
            if self.icv[i] == 0xFF {
                self.icv[i] = 0;
            } else {
                self.icv[i] += 1;
                break;
            }
        }
        self.icv
    }

    /// Current ICV without advancing it
    pub const fn icv(&self) -> [u8; 16] {
        self.icv
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Keys {
        Keys {
            s_enc: [1; 16],
            s_mac: [2; 16],
        }
    }

    #[test]
    fn advance_icv_increments_big_endian_within_block_size() {
        let mut session = SessionState::new(Algorithm::Aes128, keys(), [0; 8]);
        let first = session.advance_icv();
        assert_eq!(first[15], 1);
        let second = session.advance_icv();
        assert_eq!(second[15], 2);
    }

    #[test]
    fn advance_icv_carries_across_bytes() {
        let mut session = SessionState::new(Algorithm::Aes128, keys(), [0; 8]);
        for _ in 0..255 {
            session.advance_icv();
        }
        let icv = session.advance_icv();
        assert_eq!(icv[15], 0);
        assert_eq!(icv[14], 1);
    }

    #[test]
    fn tdes_session_only_advances_first_eight_bytes() {
        let mut session = SessionState::new(Algorithm::Tdes2Key, keys(), [0xFF; 8]);
        let icv = session.advance_icv();
        assert_eq!(&icv[8..16], &[0u8; 8]);
    }

    #[test]
    fn plain_session_is_inactive() {
        let session = SessionState::plain();
        assert!(!session.is_active());
    }
}
