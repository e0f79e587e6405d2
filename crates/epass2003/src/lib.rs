//! Secure-messaging protocol engine and command driver for the
//! FTCOS/ePass2003 PKI smart card
//!
//! This crate speaks the card's GlobalPlatform SCP01-style mutual
//! authentication and secure-messaging envelope (§§4.2/4.4 of the wire
//! protocol this driver implements), and layers the card's proprietary file
//! and key command set on top. [`Card`] is the single entry point: build one
//! around any [`CardTransport`], optionally call
//! [`Card::establish_secure_channel`], then use its file
//! ([`crate::fileops`]) and key ([`crate::keyops`]) operations.
//!
//! Module layout mirrors the protocol's own layering, bottom to top:
//! [`crypto`] (symmetric primitives) → [`session`] (keys/ICV state) →
//! [`handshake`] (mutual authentication) → [`smcodec`] (wrap/unwrap) →
//! [`fidhook`]/[`fci`] (file-identifier and FCI plumbing) → [`fileops`] /
//! [`keyops`] (the card's command vocabulary) → [`card`] (the façade tying
//! it together).
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod card;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod fci;
pub mod fidhook;
pub mod fileops;
pub mod handshake;
pub mod keyops;
pub mod session;
pub mod smcodec;
pub mod tlv;

pub use card::{Card, WriteKeyRequest};
pub use crypto::Algorithm;
pub use error::{Error, Result};
pub use fci::{File, FileDescriptor, FileStatus};
pub use keyops::RsaFactorTag;
pub use session::{SessionState, SmMode};
pub use smcodec::PlainApdu;

// Re-exported so callers can depend solely on this crate for the transport trait.
pub use epass2003_apdu_core::CardTransport;

/// Convenience entry points composing a handful of the lower-level
/// operations into the flows a typical caller needs.
pub mod operations {
    use crate::card::{Card, WriteKeyRequest};
    use crate::error::Result;
    use crate::fci::File;
    use epass2003_apdu_core::CardTransport;

    /// Connect to a card and establish the secure channel in one call.
    pub fn connect_and_authenticate<T: CardTransport>(
        transport: T,
        init_key_enc: &[u8; 16],
        init_key_mac: &[u8; 16],
    ) -> Result<Card<T>> {
        let mut card = Card::new(transport);
        card.establish_secure_channel(init_key_enc, init_key_mac)?;
        Ok(card)
    }

    /// Personalize a freshly-generated RSA key pair: generate on-card,
    /// create the public-key EF, and upload the modulus to it.
    pub fn generate_and_publish_rsa<T: CardTransport>(
        card: &mut Card<T>,
        prkey_fid: u16,
        pukey_fid: u16,
        bits: u16,
    ) -> Result<Vec<u8>> {
        card.create_file(&File::working_ef(pukey_fid, 0x00, bits / 8 + 64))?;
        let modulus = card.generate_rsa(prkey_fid, pukey_fid, bits)?;
        Ok(modulus)
    }

    /// Install a PIN via the `write_key` façade, for callers that don't need
    /// the full [`WriteKeyRequest`] vocabulary.
    pub fn set_user_pin<T: CardTransport>(
        card: &mut Card<T>,
        kid: u8,
        pin: &[u8],
        retries: u8,
    ) -> Result<()> {
        card.write_key(WriteKeyRequest::Pin {
            kid,
            use_ac: crate::constants::acl::USER,
            modify_ac: crate::constants::acl::SO,
            error_counter: retries,
            pin,
        })
    }
}
