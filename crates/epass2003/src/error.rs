//! Error type for the FTCOS/ePass2003 driver

use epass2003_apdu_core::StatusWord;

/// Result alias for this crate
pub type Result<T> = core::result::Result<T, Error>;

/// Errors produced by the secure-messaging engine and command driver
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying transport failed to deliver or receive an APDU
    #[error("transport failed")]
    TransportFailed,

    /// The card rejected a command with a non-9000 status word
    #[error("card command failed: {status}")]
    CardCmdFailed {
        /// Status word returned by the card
        status: StatusWord,
    },

    /// A caller-supplied argument was invalid
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The requested operation is not supported by this card/driver
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// The card reported it is out of storage
    #[error("out of memory")]
    OutOfMemory,

    /// The referenced file or key object was not found
    #[error("object not found")]
    ObjectNotFound,

    /// A caller-supplied buffer was too small to hold the result
    #[error("buffer too small")]
    BufferTooSmall,

    /// Mutual authentication with the card failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    /// A secure-messaging APDU could not be parsed (malformed TLV, missing
    /// padding, all-zero cipher, etc)
    #[error("malformed secure-messaging frame: {0}")]
    MalformedFrame(&'static str),
}

impl Error {
    /// Create a card-command-failed error from a status word
    pub const fn card_cmd_failed(status: StatusWord) -> Self {
        Self::CardCmdFailed { status }
    }

    /// Translate a core-crate error into this crate's error type, preserving
    /// status-word information where present
    pub fn from_core(err: epass2003_apdu_core::Error) -> Self {
        match err {
            epass2003_apdu_core::Error::CardCmdFailed { status } => Self::card_cmd_failed(status),
            epass2003_apdu_core::Error::TransportFailed | epass2003_apdu_core::Error::Timeout => {
                Self::TransportFailed
            }
            epass2003_apdu_core::Error::BufferTooSmall => Self::BufferTooSmall,
            epass2003_apdu_core::Error::ParseError(msg)
            | epass2003_apdu_core::Error::InvalidCommandData(msg) => Self::MalformedFrame(msg),
            _ => Self::MalformedFrame("core APDU error"),
        }
    }
}

/// From-impl so that `?` works directly against core transport/response errors
impl From<epass2003_apdu_core::Error> for Error {
    fn from(err: epass2003_apdu_core::Error) -> Self {
        Self::from_core(err)
    }
}
