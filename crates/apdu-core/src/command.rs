//! APDU command definitions
//!
//! This module provides a minimal, protocol-agnostic representation of an
//! ISO/IEC 7816-4 command APDU. It only supports the short (single-byte
//! Lc/Le) forms; protocols that need extended-length framing (such as the
//! secure-messaging codec) build their wire bytes directly rather than
//! going through [`Command::to_bytes`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::Error;

/// Expected response length (Le) type
pub type ExpectedLength = u8;

/// A plain-text command APDU: CLA, INS, P1, P2, optional data, optional Le.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command class byte
    pub cla: u8,
    /// Instruction byte
    pub ins: u8,
    /// Parameter 1
    pub p1: u8,
    /// Parameter 2
    pub p2: u8,
    /// Command data (optional)
    pub data: Option<Bytes>,
    /// Expected length (optional)
    pub le: Option<ExpectedLength>,
}

impl Command {
    /// Create a new command with just the header bytes
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: None,
        }
    }

    /// Create a new command with expected response length (Le)
    pub const fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: ExpectedLength) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: None,
            le: Some(le),
        }
    }

    /// Create a new command with data payload
    pub fn new_with_data<T: Into<Bytes>>(cla: u8, ins: u8, p1: u8, p2: u8, data: T) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: None,
        }
    }

    /// Create a new command with both data and expected length
    pub fn new_with_data_and_le<T: Into<Bytes>>(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: T,
        le: ExpectedLength,
    ) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Some(data.into()),
            le: Some(le),
        }
    }

    /// Set the data field
    pub fn with_data<T: Into<Bytes>>(mut self, data: T) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the expected length field
    pub const fn with_le(mut self, le: ExpectedLength) -> Self {
        self.le = Some(le);
        self
    }

    /// Data payload length, 0 if absent
    pub fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, Bytes::len)
    }

    /// Serialize to raw wire bytes (short form only: Lc/Le single byte,
    /// data length must not exceed 255 bytes)
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let data_len = self.data_len();
        if data_len > 0xFF {
            return Err(Error::InvalidCommandData(
                "data too large for short-form APDU",
            ));
        }

        let mut buffer = BytesMut::with_capacity(4 + data_len + 2);
        buffer.put_u8(self.cla);
        buffer.put_u8(self.ins);
        buffer.put_u8(self.p1);
        buffer.put_u8(self.p2);

        if let Some(data) = &self.data {
            buffer.put_u8(data_len as u8);
            buffer.put_slice(data);
        }

        if let Some(le) = self.le {
            buffer.put_u8(le);
        }

        Ok(buffer.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_serialization() {
        let data = Bytes::from_static(&[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00]);
        let cmd = Command::new_with_data_and_le(0x00, 0xA4, 0x04, 0x00, data, 0);
        let bytes = cmd.to_bytes().unwrap();

        assert_eq!(bytes[0], 0x00);
        assert_eq!(bytes[1], 0xA4);
        assert_eq!(bytes[2], 0x04);
        assert_eq!(bytes[3], 0x00);
        assert_eq!(bytes[4], 0x06);
        assert_eq!(&bytes[5..11], &[0xA0, 0x00, 0x00, 0x01, 0x51, 0x00]);
        assert_eq!(bytes[11], 0x00);
    }

    #[test]
    fn test_command_no_data_no_le() {
        let cmd = Command::new(0x00, 0xA4, 0x00, 0x00);
        assert_eq!(cmd.to_bytes().unwrap().as_ref(), &[0x00, 0xA4, 0x00, 0x00]);
    }

    #[test]
    fn test_oversized_data_rejected() {
        let data = Bytes::from(vec![0u8; 256]);
        let cmd = Command::new_with_data(0x00, 0xD6, 0x00, 0x00, data);
        assert!(cmd.to_bytes().is_err());
    }
}
