//! INITIALIZE UPDATE / EXTERNAL AUTHENTICATE mutual authentication
//!
//! This is GlobalPlatform SCP01's handshake, run once per card session:
//!
//! 1. Host sends an 8-byte challenge via INITIALIZE UPDATE; the card
//!    replies with its own challenge and a cryptogram proving it derived
//!    the same session keys from its copy of the static init keys.
//! 2. Host derives S-ENC/S-MAC the same way, verifies the card's
//!    cryptogram, then computes its own cryptogram and an initial MAC
//!    chaining value and sends both via EXTERNAL AUTHENTICATE.
//!
//! A card that accepts EXTERNAL AUTHENTICATE has proven it holds the same
//! static keys as the host; from that point every command is wrapped
//! through [`crate::smcodec`] using the derived session keys.

use epass2003_apdu_core::{CardTransport, Command};
use rand::RngCore;

use crate::constants::{cla, ins};
use crate::crypto::{self, Algorithm};
use crate::error::{Error, Result};
use crate::session::{Keys, SessionState};

const HOST_CHALLENGE_LEN: usize = 8;
const INIT_UPDATE_RESP_LEN: u8 = 28;

/// Run the handshake and return an established [`SessionState`].
/// `init_key_enc`/`init_key_mac` are the card's static (factory) keys.
pub fn establish(
    transport: &mut dyn CardTransport,
    algorithm: Algorithm,
    init_key_enc: &[u8; 16],
    init_key_mac: &[u8; 16],
) -> Result<SessionState> {
    let mut host_random = [0u8; HOST_CHALLENGE_LEN];
    rand::rng().fill_bytes(&mut host_random);

    let card_data = initialize_update(transport, &host_random)?;

    // card_data: [0..12) key diversification data (unused here),
    // [12..20) card challenge, [20..28) card cryptogram
    let card_challenge: [u8; 8] = card_data[12..20].try_into().expect("checked length");
    let card_cryptogram: [u8; 8] = card_data[20..28].try_into().expect("checked length");

    let mut derivation_data = [0u8; 16];
    derivation_data[0..4].copy_from_slice(&card_data[16..20]);
    derivation_data[4..8].copy_from_slice(&host_random[0..4]);
    derivation_data[8..12].copy_from_slice(&card_data[12..16]);
    derivation_data[12..16].copy_from_slice(&host_random[4..8]);

    let s_enc = crypto::derive_key(algorithm, init_key_enc, &derivation_data);
    let s_mac = crypto::derive_key(algorithm, init_key_mac, &derivation_data);

    let block_size = algorithm.block_size();
    let zero_iv = [0u8; 16];

    // The protocol computes a single cryptogram over HR‖CR: the host
    // verifies it against the card's CardCrypt, then reuses the very same
    // value (not a second cryptogram over the swapped order) as the
    // HostCrypt field sent in EXTERNAL AUTHENTICATE.
    let host_cryptogram = padded_cryptogram(algorithm, &s_enc, &zero_iv[..block_size], &host_random, &card_challenge);
    if host_cryptogram != card_cryptogram {
        return Err(Error::AuthenticationFailed("card cryptogram does not match derived session keys"));
    }

    let mut ext_auth_body = Vec::with_capacity(16);
    ext_auth_body.extend_from_slice(b"\x84\x82\x03\x00\x10");
    ext_auth_body.extend_from_slice(&host_cryptogram);
    ext_auth_body.extend_from_slice(&[0x80, 0x00, 0x00]);

    let mac_cbc = crypto::cbc_encrypt(algorithm, &s_mac, &zero_iv[..block_size], &ext_auth_body);
    let icv_seed: [u8; 8] = match algorithm {
        Algorithm::Aes128 => mac_cbc[0..8].try_into().expect("checked length"),
        Algorithm::Tdes2Key => mac_cbc[8..16].try_into().expect("checked length"),
    };

    external_authenticate(transport, &host_cryptogram, &icv_seed)?;

    Ok(SessionState::new(
        algorithm,
        Keys { s_enc, s_mac },
        icv_seed,
    ))
}

/// Build the `host_first‖challenge_second‖0x80‖00...` buffer, CBC-encrypt it
/// under `key` and return the trailing 8 bytes of the final block: this is
/// the shape both the card-cryptogram check and the host-cryptogram
/// computation share, just with the two challenges in opposite order.
fn padded_cryptogram(algorithm: Algorithm, key: &[u8; 16], iv: &[u8], first: &[u8; 8], second: &[u8; 8]) -> [u8; 8] {
    let block_size = algorithm.block_size();
    let mut data = vec![0u8; 16 + block_size];
    data[0..8].copy_from_slice(first);
    data[8..16].copy_from_slice(second);
    data[16] = 0x80;

    let encrypted = crypto::cbc_encrypt(algorithm, key, iv, &data);
    encrypted[16..24].try_into().expect("encrypted output covers at least 24 bytes")
}

fn initialize_update(transport: &mut dyn CardTransport, host_random: &[u8; HOST_CHALLENGE_LEN]) -> Result<Vec<u8>> {
    let command = Command::new_with_data_and_le(
        cla::PROPRIETARY,
        ins::INITIALIZE_UPDATE,
        0x00,
        0x00,
        host_random.to_vec(),
        INIT_UPDATE_RESP_LEN,
    )
    .to_bytes()?;

    let raw = transport.transmit_raw(&command)?;
    if raw.len() < 2 {
        return Err(Error::AuthenticationFailed("truncated INITIALIZE UPDATE response"));
    }
    let (body, sw) = raw.split_at(raw.len() - 2);
    if sw != [0x90, 0x00] {
        return Err(Error::card_cmd_failed(epass2003_apdu_core::StatusWord::new(sw[0], sw[1])));
    }
    if body.len() != INIT_UPDATE_RESP_LEN as usize {
        return Err(Error::AuthenticationFailed("unexpected INITIALIZE UPDATE response length"));
    }
    Ok(body.to_vec())
}

fn external_authenticate(transport: &mut dyn CardTransport, host_cryptogram: &[u8; 8], icv_seed: &[u8; 8]) -> Result<()> {
    let mut data = Vec::with_capacity(16);
    data.extend_from_slice(host_cryptogram);
    data.extend_from_slice(icv_seed);

    let command = Command::new_with_data(cla::EXTERNAL_AUTHENTICATE, ins::EXTERNAL_AUTHENTICATE, 0x03, 0x00, data).to_bytes()?;

    let raw = transport.transmit_raw(&command)?;
    if raw.len() < 2 {
        return Err(Error::AuthenticationFailed("truncated EXTERNAL AUTHENTICATE response"));
    }
    let sw = &raw[raw.len() - 2..];
    if sw != [0x90, 0x00] {
        return Err(Error::card_cmd_failed(epass2003_apdu_core::StatusWord::new(sw[0], sw[1])));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct ScriptedTransport {
        responses: Mutex<Vec<Vec<u8>>>,
    }

    impl CardTransport for ScriptedTransport {
        fn do_transmit_raw(&mut self, _command: &[u8]) -> core::result::Result<epass2003_apdu_core::Bytes, epass2003_apdu_core::Error> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(epass2003_apdu_core::Error::TransportFailed);
            }
            Ok(epass2003_apdu_core::Bytes::from(responses.remove(0)))
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn reset(&mut self) -> core::result::Result<(), epass2003_apdu_core::Error> {
            Ok(())
        }
    }

    #[test]
    fn handshake_rejects_truncated_initialize_update_response() {
        let mut transport = ScriptedTransport {
            responses: Mutex::new(vec![vec![0x90, 0x00]]),
        };
        let result = establish(&mut transport, Algorithm::Aes128, &[0; 16], &[0; 16]);
        assert!(result.is_err());
    }

    #[test]
    fn handshake_rejects_mismatched_card_cryptogram() {
        let mut card_response = vec![0u8; 28];
        card_response.extend_from_slice(&[0x90, 0x00]);
        let mut transport = ScriptedTransport {
            responses: Mutex::new(vec![card_response]),
        };
        let result = establish(&mut transport, Algorithm::Aes128, &[1; 16], &[2; 16]);
        assert!(matches!(result, Err(Error::AuthenticationFailed(_))));
    }
}
