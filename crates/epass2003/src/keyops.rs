//! Key-management commands: RSA generation, factor upload, secret-key/PIN
//! installation, external-key auth, and decipher/sign (§4.7)

use epass2003_apdu_core::CardTransport;

use crate::card::Card;
use crate::constants::{FID_STEP, PIN_IMAGE_LEN, cla, ins};
use crate::crypto;
use crate::error::{Error, Result};
use crate::smcodec::PlainApdu;

/// Which RSA factor a `write_rsa_factor` call is uploading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaFactorTag {
    /// Modulus (n)
    Modulus = 0x02,
    /// Private exponent (d)
    PrivateExponent = 0x03,
}

/// SHA-1-hash PIN/PUK material into the 24-byte verification image the card
/// stores: `SHA1(data) ‖ len` with `len` encoded as a little-endian `u32`
/// (the big-endian length reversed byte-for-byte, per §4.7).
pub fn hash_pin_material(data: &[u8], len: usize) -> [u8; PIN_IMAGE_LEN] {
    let digest = crypto::sha1_digest(data);
    let mut image = [0u8; PIN_IMAGE_LEN];
    image[0..20].copy_from_slice(&digest);
    image[20..24].copy_from_slice(&(len as u32).to_le_bytes());
    image
}

fn split_fid(fid: u16) -> (u8, u8) {
    ((fid >> 8) as u8, fid as u8)
}

impl<T: CardTransport> Card<T> {
    /// GENERATE KEY PAIR: have the card generate an RSA key pair into the
    /// given private/public key files, then read back the modulus.
    pub fn generate_rsa(&mut self, prkey_fid: u16, pukey_fid: u16, bits: u16) -> Result<Vec<u8>> {
        let (pr_hi, pr_lo) = split_fid(prkey_fid);
        let (pu_hi, pu_lo) = split_fid(pukey_fid);
        let data = vec![0x01, (bits >> 8) as u8, bits as u8, pr_hi, pr_lo, pu_hi, pu_lo];
        let apdu = PlainApdu::new(cla::ISO, ins::GENERATE_RSA_KEY, 0x00, 0x00).with_data(data);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }

        let read_apdu =
            PlainApdu::new(cla::PROPRIETARY, ins::READ_PUBLIC_KEY, 0x02, 0x00).with_data(vec![pu_hi, pu_lo]).with_le(0);
        let (modulus, sw2) = self.transmit(read_apdu)?;
        if !sw2.is_success() {
            return Err(Error::card_cmd_failed(sw2));
        }
        modulus.ok_or(Error::MalformedFrame("GENERATE KEY returned no modulus"))
    }

    /// WRITE RSA FACTOR: upload one factor (modulus or private exponent) of
    /// an RSA key, byte-reversed to little-endian as the card requires.
    pub fn write_rsa_factor(&mut self, fid: u16, tag: RsaFactorTag, bignum_msb_first: &[u8]) -> Result<()> {
        let (hi, lo) = split_fid(fid);
        let mut data = vec![hi, lo];
        data.extend(bignum_msb_first.iter().rev().copied());

        let apdu = PlainApdu::new(cla::PROPRIETARY, ins::WRITE_RSA_FACTOR, tag as u8, 0x00).with_data(data);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        Ok(())
    }

    /// INSTALL SECRET KEY: install a secret key, PIN or PUK object. `pin_acs`
    /// supplies the ac4/ac5/ac7 retry-counter bytes for PIN/PUK key types
    /// (§4.7); other key types leave those slots zeroed.
    pub fn install_secret_key(
        &mut self,
        ktype: u8,
        kid: u8,
        use_ac: u8,
        modify_ac: u8,
        error_counter: u8,
        pin_acs: Option<[u8; 3]>,
        data: &[u8],
    ) -> Result<()> {
        let [ac4, ac5, ac7] = pin_acs.unwrap_or_default();
        let mut body = vec![ktype, kid, use_ac, modify_ac, ac4, ac5, 0x00, ac7, 0xFF, (error_counter << 4) | error_counter];
        body.extend_from_slice(data);

        let apdu = PlainApdu::new(cla::PROPRIETARY, ins::INSTALL_SECRET_KEY, 0x00, 0x00).with_data(body);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        Ok(())
    }

    /// UPDATE SECRET KEY (PIN/PUK change): reset the retry counter to its
    /// maximum and install a new verification image.
    pub fn update_secret_key(&mut self, ktype: u8, kid: u8, hash: &[u8; PIN_IMAGE_LEN]) -> Result<()> {
        use crate::constants::MAX_PIN_COUNTER;
        let mut body = vec![(MAX_PIN_COUNTER << 4) | MAX_PIN_COUNTER];
        body.extend_from_slice(hash);

        let apdu = PlainApdu::new(cla::PROPRIETARY, ins::UPDATE_SECRET_KEY, ktype, kid).with_data(body);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        Ok(())
    }

    /// EXTERNAL AUTHENTICATE (key-based, not SCP01): request the card's
    /// 8-byte challenge, 3DES-encrypt it under the hashed PIN material, and
    /// send back the first 8 bytes as the authentication token.
    pub fn external_key_auth(&mut self, kid: u8, pin_material: &[u8], len: usize) -> Result<()> {
        let challenge_apdu = PlainApdu::new(cla::ISO, ins::GET_CHALLENGE, 0x00, 0x00).with_le(8);
        let (challenge, sw) = self.transmit(challenge_apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        let challenge = challenge.ok_or(Error::MalformedFrame("GET CHALLENGE returned no data"))?;
        if challenge.len() != 8 {
            return Err(Error::MalformedFrame("challenge is not 8 bytes"));
        }

        let hash = hash_pin_material(pin_material, len);
        let token = crypto::tdes_cbc_encrypt_24(&hash, &[0u8; 8], &challenge);

        let auth_apdu =
            PlainApdu::new(cla::ISO, ins::EXTERNAL_AUTHENTICATE, 0x01, 0x80 | kid).with_data(token[0..8].to_vec());
        let (_, sw2) = self.transmit(auth_apdu)?;
        if !sw2.is_success() {
            return Err(Error::card_cmd_failed(sw2));
        }
        Ok(())
    }

    /// Request a challenge and attempt (intentionally failing) authentication
    /// to read back the PIN/PUK's remaining retry count from a `63 Cx` SW.
    pub fn get_retries(&mut self, kid: u8) -> Result<u8> {
        let challenge_apdu = PlainApdu::new(cla::ISO, ins::GET_CHALLENGE, 0x00, 0x00).with_le(8);
        let (_, sw) = self.transmit(challenge_apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }

        let probe = PlainApdu::new(cla::ISO, ins::EXTERNAL_AUTHENTICATE, 0x01, 0x80 | kid);
        let (_, sw2) = self.transmit(probe)?;
        sw2.retries_remaining().ok_or_else(|| Error::card_cmd_failed(sw2))
    }

    /// MSE SET: point the security environment at the RSA key file derived
    /// from `key_ref` (`fid = 0x2900 + FID_STEP * key_ref`), ahead of a
    /// decipher or sign operation.
    pub fn set_security_environment(&mut self, key_ref: u8) -> Result<()> {
        let fid = 0x2900u16 + u16::from(FID_STEP) * u16::from(key_ref);
        let data = vec![0x80, 0x01, 0x84, 0x81, 0x02, (fid >> 8) as u8, fid as u8];

        let apdu = PlainApdu::new(cla::ISO, ins::SET_SECURITY_ENV, 0x41, 0xB8).with_data(data);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        Ok(())
    }

    /// PSO DECIPHER
    pub fn decipher(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.perform_security_operation(data)
    }

    /// PSO COMPUTE DIGITAL SIGNATURE
    pub fn compute_signature(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.perform_security_operation(data)
    }

    fn perform_security_operation(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() > 0xFF {
            return Err(Error::InvalidArgument("PSO input must fit in a short-form Lc"));
        }
        let apdu =
            PlainApdu::new(cla::ISO, ins::PERFORM_SECURITY_OPERATION, 0x80, 0x86).with_data(data.to_vec()).with_le(256);
        let (out, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        out.ok_or(Error::MalformedFrame("PSO returned no data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pin_material_appends_little_endian_length() {
        let hash = hash_pin_material(b"1234", 4);
        assert_eq!(hash.len(), PIN_IMAGE_LEN);
        assert_eq!(&hash[20..24], &4u32.to_le_bytes());
    }

    #[test]
    fn hash_pin_material_is_deterministic() {
        let a = hash_pin_material(b"secret", 6);
        let b = hash_pin_material(b"secret", 6);
        assert_eq!(a, b);
    }
}
