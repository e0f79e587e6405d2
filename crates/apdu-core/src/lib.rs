//! Core traits and types for APDU (Application Protocol Data Unit) operations
//!
//! This crate provides the foundational types and traits for working with smart card
//! APDU commands and responses according to ISO/IEC 7816-4. It is transport- and
//! protocol-agnostic: it knows nothing about PC/SC, secure messaging, or any
//! particular card's command vocabulary.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub use bytes::{Bytes, BytesMut};

pub mod command;
pub mod error;
pub mod response;
pub mod secure_channel;
pub mod transport;

pub use command::{Command, ExpectedLength};
pub use error::{Error, ResultExt};
pub use response::status::StatusWord;
pub use response::{ApduResponse, Response};
pub use secure_channel::{SecureChannel, SecurityLevel};
pub use transport::CardTransport;

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut, Command, Error, ExpectedLength, ResultExt};
    pub use crate::{Response, response::ApduResponse};
    pub use crate::{SecureChannel, SecurityLevel};
    pub use crate::{StatusWord, CardTransport};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let cmd = Command::new(0x00, 0xA4, 0x04, 0x00);
        assert_eq!(cmd.cla, 0x00);
        assert_eq!(cmd.ins, 0xA4);

        let data = Bytes::from_static(&[0x01, 0x02, 0x03]);
        let resp = Response::success(Some(data.clone()));
        assert!(resp.is_success());
        assert_eq!(resp.payload(), &Some(data));
        assert_eq!(resp.status(), StatusWord::new(0x90, 0x00));
    }
}
