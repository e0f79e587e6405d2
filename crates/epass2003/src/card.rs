//! Card handle and driver façade
//!
//! [`Card`] owns the transport and the secure-messaging [`SessionState`] and
//! is the single entry point the rest of this crate's callers use: it runs
//! the handshake, wraps/unwraps every command through [`crate::smcodec`], and
//! exposes the card's proprietary command vocabulary (file, key and
//! card-control operations) as methods. [`crate::fileops`] and
//! [`crate::keyops`] implement most of those methods in their own modules —
//! this file owns the struct, construction, and the handful of operations
//! (serial number, erase, generic card-ctl dispatch) that don't fit neatly
//! under either.

use epass2003_apdu_core::{CardTransport, StatusWord};
use tracing::{debug, trace};

use crate::constants::{GET_DATA_FIPS_MODE, GET_DATA_P1, GET_DATA_SERIAL, cla, ins};
use crate::crypto::Algorithm;
use crate::error::{Error, Result};
use crate::handshake;
use crate::keyops::RsaFactorTag;
use crate::session::SessionState;
use crate::smcodec::{self, PlainApdu};

/// A handle to one FTCOS/ePass2003 card session: the transport plus
/// everything [`crate::smcodec`] needs to wrap and unwrap commands.
///
/// Per §5, a `Card` is not `Sync`-safe to share across threads without an
/// external mutex — the MAC chaining counter in [`SessionState`] would
/// desynchronize if two wraps interleaved. A `Card` is meant to be owned by
/// one caller (or wrapped in a mutex) for the life of one session.
#[derive(Debug)]
pub struct Card<T: CardTransport> {
    transport: T,
    session: SessionState,
    /// Logical path of the DF currently selected on the card, if known.
    pub(crate) df_cache: Option<Vec<u8>>,
    /// Logical AID of the application last selected via [`Card::select_by_aid`].
    pub(crate) aid_cache: Option<Vec<u8>>,
}

impl<T: CardTransport> Card<T> {
    /// Wrap a transport in a fresh, unauthenticated `Card`. Secure messaging
    /// is off until [`Card::establish_secure_channel`] succeeds.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            session: SessionState::plain(),
            df_cache: None,
            aid_cache: None,
        }
    }

    /// Current secure-messaging session state
    pub const fn session(&self) -> &SessionState {
        &self.session
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run the mutual-authentication handshake (§4.2) and switch this
    /// session into SCP01 secure-messaging mode. `init_key_enc`/`init_key_mac`
    /// are the card's static (factory or personalization) keys.
    ///
    /// Probes the card's FIPS-mode byte first (§3) to pick AES vs 2-key 3DES
    /// — this probe, like the handshake itself, runs before SM is active.
    pub fn establish_secure_channel(&mut self, init_key_enc: &[u8; 16], init_key_mac: &[u8; 16]) -> Result<()> {
        let algorithm = self.detect_algorithm()?;
        self.session = handshake::establish(&mut self.transport, algorithm, init_key_enc, init_key_mac)?;
        Ok(())
    }

    fn detect_algorithm(&mut self) -> Result<Algorithm> {
        let apdu = PlainApdu::new(cla::ISO, ins::GET_DATA, GET_DATA_P1, GET_DATA_FIPS_MODE).with_le(0);
        let (data, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        let data = data.ok_or(Error::MalformedFrame("FIPS-mode get-data returned no data"))?;
        let mode_byte = *data.get(2).ok_or(Error::MalformedFrame("FIPS-mode response shorter than 3 bytes"))?;
        Ok(if mode_byte == 0x01 { Algorithm::Aes128 } else { Algorithm::Tdes2Key })
    }

    /// Send a plaintext command through the session's current mode (SM if
    /// established, plain otherwise) and unwrap the response. The building
    /// block every other operation in this crate is expressed in terms of.
    pub fn transmit(&mut self, apdu: PlainApdu) -> Result<(Option<Vec<u8>>, StatusWord)> {
        trace!(ins = %hex::encode([apdu.ins]), p1 = %hex::encode([apdu.p1]), p2 = %hex::encode([apdu.p2]), sm_active = self.session.is_active(), "transmitting command");
        let wire = smcodec::wrap(&mut self.session, &apdu)?;
        let raw = self.transport.transmit_raw(&wire)?;
        let result = smcodec::unwrap(&self.session, &raw);
        match &result {
            Ok((_, sw)) => trace!(%sw, "command acknowledged"),
            Err(e) => debug!(error = ?e, "command failed"),
        }
        result
    }

    /// `GET_SERIAL`: read the card's 8-byte serial number (get-data tag `0x80`)
    pub fn serial_number(&mut self) -> Result<[u8; 8]> {
        let apdu = PlainApdu::new(cla::ISO, ins::GET_DATA, GET_DATA_P1, GET_DATA_SERIAL).with_le(8);
        let (data, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        let data = data.ok_or(Error::MalformedFrame("serial number get-data returned no data"))?;
        data.get(..8)
            .ok_or(Error::MalformedFrame("serial number shorter than 8 bytes"))?
            .try_into()
            .map_err(|_| Error::MalformedFrame("serial number not exactly 8 bytes"))
    }

    /// `ERASE`: delete the Master File, wiping the card's file system
    pub fn erase(&mut self) -> Result<()> {
        self.delete_file(&[0x3F, 0x00])
    }

    /// Dispatch a key-write request to the appropriate command: raw RSA
    /// factor upload, static secret/init-key installation, or PIN
    /// installation, per §4.8's `WRITE_KEY` card-ctl operation.
    pub fn write_key(&mut self, request: WriteKeyRequest<'_>) -> Result<()> {
        match request {
            WriteKeyRequest::RsaFactor { fid, tag, bignum_msb_first } => {
                self.write_rsa_factor(fid, tag, bignum_msb_first)
            }
            WriteKeyRequest::InitKey { ktype, kid, use_ac, modify_ac, error_counter, key } => {
                self.install_secret_key(ktype, kid, use_ac, modify_ac, error_counter, None, key)
            }
            WriteKeyRequest::Pin { kid, use_ac, modify_ac, error_counter, pin } => {
                let hash = crate::keyops::hash_pin_material(pin, pin.len());
                self.install_secret_key(
                    crate::constants::ktype::PIN,
                    kid,
                    use_ac,
                    modify_ac,
                    error_counter,
                    Some([0, 0, 0]),
                    &hash,
                )
            }
        }
    }
}

/// The three shapes `WRITE_KEY` card-ctl requests can take (§4.8), each
/// routed to a different underlying command.
#[derive(Debug)]
pub enum WriteKeyRequest<'a> {
    /// Upload one RSA key factor (modulus or private exponent)
    RsaFactor {
        /// Logical fid of the RSA key file
        fid: u16,
        /// Which factor this call is uploading
        tag: RsaFactorTag,
        /// Factor value, most-significant-byte first
        bignum_msb_first: &'a [u8],
    },
    /// Install a raw secret key (e.g. an SCP01 init key pair)
    InitKey {
        /// Card-defined key type
        ktype: u8,
        /// Key identifier/index
        kid: u8,
        /// Use access-condition byte
        use_ac: u8,
        /// Modify access-condition byte
        modify_ac: u8,
        /// Error-counter nibble value (stored in both nibbles of byte 9)
        error_counter: u8,
        /// Raw 16-byte key material
        key: &'a [u8; 16],
    },
    /// Install a PIN or PUK, hashing the plaintext first
    Pin {
        /// Key identifier/index
        kid: u8,
        /// Use access-condition byte
        use_ac: u8,
        /// Modify access-condition byte
        modify_ac: u8,
        /// Error-counter nibble value
        error_counter: u8,
        /// Plaintext PIN/PUK bytes
        pin: &'a [u8],
    },
}

/// Normalize a caller-supplied path to an MF-rooted form, prefixing `3F 00`
/// if missing, and reject lengths the card can't address (§4.6).
pub(crate) fn normalize_path(path: &[u8]) -> Result<Vec<u8>> {
    let full = if path.len() >= 2 && path[0..2] == [0x3F, 0x00] {
        path.to_vec()
    } else {
        let mut prefixed = vec![0x3F, 0x00];
        prefixed.extend_from_slice(path);
        prefixed
    };
    if full.len() > 6 || full.len() % 2 != 0 {
        return Err(Error::InvalidArgument("path must be an even number of bytes, at most 6"));
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_path_prefixes_mf_when_missing() {
        assert_eq!(normalize_path(&[0x50, 0x00]).unwrap(), vec![0x3F, 0x00, 0x50, 0x00]);
    }

    #[test]
    fn normalize_path_leaves_mf_rooted_path_alone() {
        assert_eq!(normalize_path(&[0x3F, 0x00, 0x50, 0x00]).unwrap(), vec![0x3F, 0x00, 0x50, 0x00]);
    }

    #[test]
    fn normalize_path_rejects_odd_length() {
        assert!(normalize_path(&[0x50, 0x00, 0x01]).is_err());
    }

    #[test]
    fn normalize_path_rejects_overlong_path() {
        assert!(normalize_path(&[0x50, 0x00, 0x60, 0x00, 0x70, 0x00, 0x80, 0x00]).is_err());
    }
}
