//! Symmetric-cryptography primitives backing the SCP01-style secure channel
//!
//! The card authenticates in one of two modes depending on whether it is
//! running in FIPS mode: AES-128 (16-byte blocks) or 2-key Triple DES
//! (8-byte blocks, with the 16-byte key used as K1‖K2‖K1 wherever a genuine
//! 3-key operation is required). Everything above this module - derivation,
//! handshake cryptograms, SM wrap/unwrap MACs - is expressed in terms of the
//! functions here rather than reaching for `aes`/`des` directly, so the two
//! algorithm paths stay in lockstep.

use cipher::block_padding::NoPadding;
use cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use des::{Des, TdesEde3};
use generic_array::GenericArray;
use sha1::{Digest, Sha1};

use aes::Aes128;

/// Which session algorithm is in effect, selected from the card's FIPS-mode
/// byte at handshake time and fixed for the lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// AES-128, used when the card reports FIPS mode
    Aes128,
    /// 2-key (16-byte) Triple DES, used outside FIPS mode
    Tdes2Key,
}

impl Algorithm {
    /// Cipher block size in bytes: 16 for AES, 8 for 3DES
    pub const fn block_size(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Tdes2Key => 8,
        }
    }

    /// Width of the MAC value both algorithms ultimately produce
    pub const fn mac_len(self) -> usize {
        8
    }
}

/// Expand a 16-byte 2-key 3DES key into the 24-byte K1‖K2‖K1 form the
/// underlying triple-DES implementation expects.
fn expand_des3_key(key: &[u8; 16]) -> [u8; 24] {
    let mut expanded = [0u8; 24];
    expanded[0..16].copy_from_slice(key);
    expanded[16..24].copy_from_slice(&key[0..8]);
    expanded
}

/// ECB-encrypt 16 bytes of derivation data with a static key to produce a
/// session key, per the card's key-derivation step. AES processes the 16
/// bytes as a single block; 3DES processes it as two independent 8-byte
/// blocks (there is no chaining in ECB mode).
pub fn derive_key(alg: Algorithm, key: &[u8; 16], derivation_data: &[u8; 16]) -> [u8; 16] {
    let mut out = [0u8; 16];
    match alg {
        Algorithm::Aes128 => {
            let cipher = Aes128::new(GenericArray::from_slice(key));
            let mut block = GenericArray::clone_from_slice(derivation_data);
            cipher.encrypt_block(&mut block);
            out.copy_from_slice(&block);
        }
        Algorithm::Tdes2Key => {
            let cipher = TdesEde3::new(GenericArray::from_slice(&expand_des3_key(key)));
            for (out_chunk, in_chunk) in out.chunks_mut(8).zip(derivation_data.chunks(8)) {
                let mut block = GenericArray::clone_from_slice(in_chunk);
                cipher.encrypt_block(&mut block);
                out_chunk.copy_from_slice(&block);
            }
        }
    }
    out
}

/// CBC-encrypt already block-aligned data under a session key. `iv` must be
/// sized to the algorithm's block (16 bytes for AES, 8 for 3DES); `data` must
/// already be a multiple of the block size - callers own padding.
pub fn cbc_encrypt(alg: Algorithm, key: &[u8; 16], iv: &[u8], data: &[u8]) -> Vec<u8> {
    match alg {
        Algorithm::Aes128 => {
            cbc::Encryptor::<Aes128>::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
                .encrypt_padded_vec_mut::<NoPadding>(data)
        }
        Algorithm::Tdes2Key => {
            let expanded = expand_des3_key(key);
            cbc::Encryptor::<TdesEde3>::new(GenericArray::from_slice(&expanded), GenericArray::from_slice(iv))
                .encrypt_padded_vec_mut::<NoPadding>(data)
        }
    }
}

/// CBC-decrypt already block-aligned ciphertext under a session key. Inverse
/// of [`cbc_encrypt`].
pub fn cbc_decrypt(alg: Algorithm, key: &[u8; 16], iv: &[u8], data: &[u8]) -> Vec<u8> {
    match alg {
        Algorithm::Aes128 => {
            cbc::Decryptor::<Aes128>::new(GenericArray::from_slice(key), GenericArray::from_slice(iv))
                .decrypt_padded_vec_mut::<NoPadding>(data)
                .expect("caller-supplied data is block-aligned")
        }
        Algorithm::Tdes2Key => {
            let expanded = expand_des3_key(key);
            cbc::Decryptor::<TdesEde3>::new(GenericArray::from_slice(&expanded), GenericArray::from_slice(iv))
                .decrypt_padded_vec_mut::<NoPadding>(data)
                .expect("caller-supplied data is block-aligned")
        }
    }
}

/// AES-CBC MAC: encrypt block-aligned `data` under `mac_key` with starting
/// IV `icv`, keep only the leading 8 bytes of the final 16-byte block.
pub fn aes_cbc_mac(mac_key: &[u8; 16], icv: &[u8; 16], data: &[u8]) -> [u8; 8] {
    let encrypted = cbc::Encryptor::<Aes128>::new(GenericArray::from_slice(mac_key), GenericArray::from_slice(icv))
        .encrypt_padded_vec_mut::<NoPadding>(data);
    let last_block = &encrypted[encrypted.len() - 16..];
    let mut out = [0u8; 8];
    out.copy_from_slice(&last_block[0..8]);
    out
}

/// ISO/IEC 9797-1 MAC algorithm 3 ("retail MAC") over block-aligned `data`:
/// single-DES CBC-chain the whole message under K1 starting from `icv`, then
/// run the final block through DES-decrypt(K2) followed by DES-encrypt(K1).
pub fn retail_mac_3des(mac_key: &[u8; 16], icv: &[u8; 8], data: &[u8]) -> [u8; 8] {
    let k1 = GenericArray::clone_from_slice(&mac_key[0..8]);
    let k2 = GenericArray::clone_from_slice(&mac_key[8..16]);

    let chained = cbc::Encryptor::<Des>::new(&k1, GenericArray::from_slice(icv))
        .encrypt_padded_vec_mut::<NoPadding>(data);
    let last = &chained[chained.len() - 8..];

    let mut block = GenericArray::clone_from_slice(last);
    Des::new(&k2).decrypt_block(&mut block);
    Des::new(&k1).encrypt_block(&mut block);

    let mut out = [0u8; 8];
    out.copy_from_slice(&block);
    out
}

/// Dispatch to [`aes_cbc_mac`] or [`retail_mac_3des`] depending on algorithm.
/// `icv` is always the full 16-byte counter; the 3DES path only consumes its
/// first 8 bytes.
pub fn mac(alg: Algorithm, mac_key: &[u8; 16], icv: &[u8; 16], data: &[u8]) -> [u8; 8] {
    match alg {
        Algorithm::Aes128 => aes_cbc_mac(mac_key, icv, data),
        Algorithm::Tdes2Key => {
            let icv8: [u8; 8] = icv[0..8].try_into().expect("slice is 8 bytes");
            retail_mac_3des(mac_key, &icv8, data)
        }
    }
}

/// CBC-encrypt block-aligned `data` under a genuine 3-key (24-byte) Triple
/// DES key. Used by external-key authentication, where the key material is a
/// SHA-1-derived PIN image rather than the handshake's 16-byte 2-key bundle.
pub fn tdes_cbc_encrypt_24(key24: &[u8; 24], iv: &[u8; 8], data: &[u8]) -> Vec<u8> {
    cbc::Encryptor::<TdesEde3>::new(GenericArray::from_slice(key24), GenericArray::from_slice(iv))
        .encrypt_padded_vec_mut::<NoPadding>(data)
}

/// SHA-1 digest, used to build the 24-byte PIN verification image.
pub fn sha1_digest(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_des3_key_repeats_k1_as_k3() {
        let key: [u8; 16] = (0..16u8).collect::<Vec<_>>().try_into().unwrap();
        let expanded = expand_des3_key(&key);
        assert_eq!(&expanded[0..16], &key[..]);
        assert_eq!(&expanded[16..24], &key[0..8]);
    }

    #[test]
    fn aes_cbc_round_trip() {
        let key = [0x11u8; 16];
        let iv = [0u8; 16];
        let data = [0x42u8; 32];
        let ct = cbc_encrypt(Algorithm::Aes128, &key, &iv, &data);
        let pt = cbc_decrypt(Algorithm::Aes128, &key, &iv, &ct);
        assert_eq!(pt, data);
    }

    #[test]
    fn tdes_cbc_round_trip() {
        let key = [0x22u8; 16];
        let iv = [0u8; 8];
        let data = [0x55u8; 24];
        let ct = cbc_encrypt(Algorithm::Tdes2Key, &key, &iv, &data);
        let pt = cbc_decrypt(Algorithm::Tdes2Key, &key, &iv, &ct);
        assert_eq!(pt, data);
    }

    #[test]
    fn mac_is_deterministic_and_eight_bytes() {
        let key = [0x33u8; 16];
        let icv = [0u8; 16];
        let data = [0xAAu8; 32];
        let m1 = mac(Algorithm::Aes128, &key, &icv, &data);
        let m2 = mac(Algorithm::Aes128, &key, &icv, &data);
        assert_eq!(m1, m2);
        assert_eq!(m1.len(), 8);

        let data_des = [0xAAu8; 16];
        let m3 = mac(Algorithm::Tdes2Key, &key, &icv, &data_des);
        let m4 = mac(Algorithm::Tdes2Key, &key, &icv, &data_des);
        assert_eq!(m3, m4);
    }

    #[test]
    fn derive_key_differs_per_algorithm() {
        let key = [0x44u8; 16];
        let dd = [0x01u8; 16];
        let aes_derived = derive_key(Algorithm::Aes128, &key, &dd);
        let des_derived = derive_key(Algorithm::Tdes2Key, &key, &dd);
        assert_ne!(aes_derived, des_derived);
    }

    #[test]
    fn sha1_digest_is_twenty_bytes() {
        let digest = sha1_digest(b"1234");
        assert_eq!(digest.len(), 20);
    }

    #[test]
    fn tdes_cbc_encrypt_24_is_deterministic() {
        let key = [0x66u8; 24];
        let iv = [0u8; 8];
        let data = [0x77u8; 16];
        let a = tdes_cbc_encrypt_24(&key, &iv, &data);
        let b = tdes_cbc_encrypt_24(&key, &iv, &data);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
