//! Secure channel abstractions
//!
//! These traits describe the shape of a secure-messaging layer without
//! committing to any particular protocol (SCP01, SCP02, a card's own
//! proprietary scheme, ...). The concrete FTCOS/ePass2003 implementation
//! lives in the `epass2003` crate.

use crate::Error;
use crate::transport::CardTransport;

/// Security level applied to a transport by a secure channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityLevel {
    /// Whether encryption is enabled
    pub encryption: bool,
    /// Whether integrity (MAC) is enabled
    pub integrity: bool,
    /// Whether authentication is enabled
    pub authentication: bool,
}

impl SecurityLevel {
    /// Create a new security level
    pub const fn new(encryption: bool, integrity: bool, authentication: bool) -> Self {
        Self {
            encryption,
            integrity,
            authentication,
        }
    }

    /// No protection
    pub const fn none() -> Self {
        Self::new(false, false, false)
    }

    /// Full protection: encryption, integrity and authentication
    pub const fn full() -> Self {
        Self::new(true, true, true)
    }

    /// Whether this level satisfies a required level
    pub const fn satisfies(&self, required: &Self) -> bool {
        (self.encryption || !required.encryption)
            && (self.integrity || !required.integrity)
            && (self.authentication || !required.authentication)
    }

    /// Whether this level has no protection at all
    pub const fn is_none(&self) -> bool {
        !self.encryption && !self.integrity && !self.authentication
    }
}

/// Trait for secure channel implementations
pub trait SecureChannel: CardTransport + Sized {
    /// Underlying raw transport
    type UnderlyingTransport: CardTransport;

    /// Get the inner transport
    fn transport(&self) -> &Self::UnderlyingTransport;

    /// Get the mutable inner transport
    fn transport_mut(&mut self) -> &mut Self::UnderlyingTransport;

    /// Establish the secure channel (mutual authentication)
    fn open(&mut self) -> Result<(), Error>;

    /// Check if the secure channel is established
    fn is_established(&self) -> bool;

    /// Tear down the secure channel. Most card protocols, including
    /// FTCOS/ePass2003's, cannot re-establish a desynced session in place;
    /// callers should expect to need a fresh `open()`.
    fn close(&mut self) -> Result<(), Error>;

    /// Get the current security level
    fn security_level(&self) -> SecurityLevel;
}
