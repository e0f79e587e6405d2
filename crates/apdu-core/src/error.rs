//! Core error type for all APDU operations
//!
//! This module provides a centralized error type used throughout the crate.
//! All error variants are consolidated here to simplify error handling and
//! facilitate context bubbling up through the call stack.

use crate::response::status::StatusWord;

/// Core error type that encompasses all possible errors in the crate
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    //
    // Transport related errors
    //
    /// Failed to communicate with the card through the transport
    #[error("transport failed")]
    TransportFailed,

    /// Buffer too small
    #[error("buffer too small")]
    BufferTooSmall,

    /// Operation timed out
    #[error("operation timed out")]
    Timeout,

    //
    // Response related errors
    //
    /// Card returned a non-success status word and reported a failed command
    #[error("card command failed: {status}")]
    CardCmdFailed {
        /// Status word returned by the card
        status: StatusWord,
    },

    /// Parse error when processing a response or TLV structure
    #[error("parse error: {0}")]
    ParseError(&'static str),

    //
    // Command related errors
    //
    /// Invalid command data
    #[error("invalid command data: {0}")]
    InvalidCommandData(&'static str),

    /// Invalid argument supplied by the caller
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Requested operation is not supported by this driver
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// Card reported it is out of storage
    #[error("out of memory")]
    OutOfMemory,

    /// Referenced object (file, key) was not found
    #[error("object not found")]
    ObjectNotFound,

    //
    // Secure channel related errors
    //
    /// Secure channel is not established
    #[error("secure channel not established")]
    SecureChannelNotEstablished,

    /// Mutual authentication with the card failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(&'static str),

    //
    // General errors
    //
    /// Context error with message and source error
    #[error("{context}: {source}")]
    Context {
        /// Contextual message
        context: String,
        /// Source error
        source: Box<Self>,
    },

    /// Generic dynamic error with a string message
    #[error("{0}")]
    Message(String),
}

impl Error {
    /// Attach contextual information to an existing error
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a new error with a dynamic message
    pub fn message<S: Into<String>>(message: S) -> Self {
        Self::Message(message.into())
    }

    /// Create a new card-command-failed error from a status word
    pub const fn card_cmd_failed(status: StatusWord) -> Self {
        Self::CardCmdFailed { status }
    }
}

/// Extension trait for attaching context to a `Result<T, Error>`
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, context: S) -> Result<T, Error>;
}

impl<T> ResultExt<T> for Result<T, Error> {
    fn context<S: Into<String>>(self, context: S) -> Self {
        self.map_err(|e| e.with_context(context))
    }
}
