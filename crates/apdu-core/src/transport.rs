//! Transport trait for APDU communication with cards
//!
//! A transport is responsible for sending and receiving raw APDU bytes over
//! whatever physical or logical channel connects to the card (PC/SC, a
//! virtual smart-card socket, etc). It has no knowledge of command
//! structure, secure channels, or protocol details - that is layered on top
//! by [`crate::secure_channel::SecureChannel`] and the card's own command
//! driver.

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::Error;

/// Trait for basic card transports
pub trait CardTransport: Send + Sync + fmt::Debug {
    /// Send raw APDU bytes to the card and return the raw response bytes
    /// (including the trailing SW1/SW2)
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        trace!(command = %hex::encode(command), "transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "received raw response"),
            Err(e) => debug!(error = ?e, "transport error during transmission"),
        }
        result
    }

    /// Internal implementation of `transmit_raw`; concrete implementations
    /// override this rather than `transmit_raw` itself
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error>;

    /// Check if the transport is connected to a physical card
    fn is_connected(&self) -> bool;

    /// Reset the transport connection
    fn reset(&mut self) -> Result<(), Error>;
}

#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct MockTransport {
    pub responses: Vec<Bytes>,
    pub commands: Vec<Bytes>,
    pub connected: bool,
}

#[cfg(test)]
impl MockTransport {
    pub fn new(responses: Vec<Bytes>) -> Self {
        Self {
            responses,
            commands: Vec::new(),
            connected: true,
        }
    }

    pub fn with_response(response: Bytes) -> Self {
        Self::new(vec![response])
    }
}

#[cfg(test)]
impl CardTransport for MockTransport {
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, Error> {
        if !self.connected {
            return Err(Error::TransportFailed);
        }
        self.commands.push(Bytes::copy_from_slice(command));
        if self.responses.is_empty() {
            return Err(Error::TransportFailed);
        }
        if self.responses.len() == 1 {
            Ok(self.responses[0].clone())
        } else {
            Ok(self.responses.remove(0))
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) -> Result<(), Error> {
        self.connected = true;
        self.commands.clear();
        Ok(())
    }
}
