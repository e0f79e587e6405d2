//! File Control Information: parsing and construction
//!
//! SELECT and CREATE FILE both carry an FCI — a `0x62`-tagged BER-TLV
//! template describing a file's size, type, access rules and identity (§6).
//! This module is the single place that knows the tag alphabet; [`crate::fileops`]
//! builds [`File`] values and hands them here rather than poking at TLV bytes
//! itself.

use crate::constants::fci_tags;
use crate::error::{Error, Result};
use crate::tlv;

/// Card-side file type, decoded from FCI tag `0x82` (descriptor byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileDescriptor {
    /// Dedicated File (directory), descriptor byte `0x38`
    Df,
    /// Working Elementary File; `structure` is the low 3 bits of the descriptor byte
    WorkingEf {
        /// EF structure (transparent, linear-fixed, etc — card-specific encoding)
        structure: u8,
    },
    /// Binary Secret Object (PIN/key container), descriptor byte `0x10`
    Bso,
    /// Internal EF holding an RSA private key in CRT form, descriptor byte `0x11`
    InternalRsaCrt,
    /// Internal EF holding an RSA public key, descriptor byte `0x12`
    InternalRsaPublic,
}

impl FileDescriptor {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x38 => Ok(Self::Df),
            0x01..=0x07 => Ok(Self::WorkingEf { structure: byte & 0x07 }),
            0x10 => Ok(Self::Bso),
            0x11 => Ok(Self::InternalRsaCrt),
            0x12 => Ok(Self::InternalRsaPublic),
            _ => Err(Error::MalformedFrame("unrecognized FCI descriptor byte")),
        }
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::Df => 0x38,
            Self::WorkingEf { structure } => structure & 0x07,
            Self::Bso => 0x10,
            Self::InternalRsaCrt => 0x11,
            Self::InternalRsaPublic => 0x12,
        }
    }
}

/// Card-side lifecycle status, decoded from FCI tag `0x8A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// File created but not yet activated (`0x01`)
    Creation,
    /// File activated and usable (`0x05` or `0x07`)
    Activated,
    /// File invalidated/blocked (`0x04` or `0x06`)
    Invalidated,
}

impl FileStatus {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::Creation),
            0x05 | 0x07 => Ok(Self::Activated),
            0x04 | 0x06 => Ok(Self::Invalidated),
            _ => Err(Error::MalformedFrame("unrecognized FCI status byte")),
        }
    }

    const fn to_byte(self) -> u8 {
        match self {
            Self::Creation => 0x01,
            Self::Activated => 0x05,
            Self::Invalidated => 0x04,
        }
    }
}

/// A file or directory's attributes, as carried in an FCI.
///
/// `fid` is always the *logical* file identifier — [`crate::fileops`] is
/// responsible for hooking it to/from physical form at the APDU boundary;
/// this module only ever sees logical FIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    /// Logical file identifier
    pub fid: u16,
    /// File type/structure
    pub descriptor: FileDescriptor,
    /// File size (tag `0x80`), when present
    pub size: Option<u16>,
    /// Alternate size (tag `0x81`), when present
    pub size_alt: Option<u16>,
    /// DF name / AID (tag `0x84`), for directories that are also applications
    pub df_name: Option<Vec<u8>>,
    /// Proprietary attribute bytes (tag `0x85`/`0xA5`), opaque to this driver
    pub proprietary: Option<Vec<u8>>,
    /// 8-byte access-control list (tag `0x86`)
    pub acl: [u8; 8],
    /// Whether the RSA-public marker (tag `0x87`, value `00 66`) is present
    pub rsa_public_marker: bool,
    /// Lifecycle status (tag `0x8A`), when present
    pub status: Option<FileStatus>,
}

impl File {
    /// A bare working EF with the given fid, structure and size — the common
    /// case for `create_file`, with everything else defaulted.
    pub const fn working_ef(fid: u16, structure: u8, size: u16) -> Self {
        Self {
            fid,
            descriptor: FileDescriptor::WorkingEf { structure },
            size: Some(size),
            size_alt: None,
            df_name: None,
            proprietary: None,
            acl: [0xFF; 8],
            rsa_public_marker: false,
            status: None,
        }
    }

    /// A bare DF (directory) with the given fid, for `create_file`.
    pub const fn directory(fid: u16) -> Self {
        Self {
            fid,
            descriptor: FileDescriptor::Df,
            size: None,
            size_alt: None,
            df_name: None,
            proprietary: None,
            acl: [0xFF; 8],
            rsa_public_marker: false,
            status: None,
        }
    }
}

/// Parse an FCI template into a [`File`]. The card emits two outer wrapper
/// tags depending on direction: `0x62` (what [`construct_fci`] writes, for
/// CREATE FILE) and the standard ISO 7816-4 `0x6F` (what SELECT responses,
/// including the synthetic private-key FCI, actually carry) — both wrap the
/// identical inner tag set, so both are accepted here.
pub fn process_fci(data: &[u8]) -> Result<File> {
    if data.len() < 2 || (data[0] != fci_tags::TEMPLATE && data[0] != fci_tags::TEMPLATE_ALT) {
        return Err(Error::MalformedFrame("missing FCI template tag"));
    }
    let (len, len_size) = tlv::decode_length(&data[1..])?;
    let body_start = 1 + len_size;
    let body = data
        .get(body_start..body_start + len)
        .ok_or(Error::MalformedFrame("truncated FCI template"))?;

    let mut fid = None;
    let mut descriptor = None;
    let mut size = None;
    let mut size_alt = None;
    let mut df_name = None;
    let mut proprietary = None;
    let mut acl = [0xFFu8; 8];
    let mut rsa_public_marker = false;
    let mut status = None;

    let mut offset = 0;
    while offset < body.len() {
        let (tag, value, consumed) = tlv::read_tlv(&body[offset..])?;
        match tag {
            fci_tags::SIZE => size = Some(be_u16(value)?),
            fci_tags::SIZE_ALT => size_alt = Some(be_u16(value)?),
            fci_tags::DESCRIPTOR => {
                let byte = *value.first().ok_or(Error::MalformedFrame("empty descriptor TLV"))?;
                descriptor = Some(FileDescriptor::from_byte(byte)?);
            }
            fci_tags::FID => fid = Some(be_u16(value)?),
            fci_tags::DF_NAME => df_name = Some(value.to_vec()),
            fci_tags::PROPRIETARY | fci_tags::PROPRIETARY_ALT => proprietary = Some(value.to_vec()),
            fci_tags::ACL => {
                acl = value
                    .try_into()
                    .map_err(|_| Error::MalformedFrame("ACL TLV is not 8 bytes"))?;
            }
            fci_tags::RSA_PUBLIC => rsa_public_marker = value == [0x00, 0x66],
            fci_tags::STATUS => {
                let byte = *value.first().ok_or(Error::MalformedFrame("empty status TLV"))?;
                status = Some(FileStatus::from_byte(byte)?);
            }
            _ => {}
        }
        offset += consumed;
    }

    Ok(File {
        fid: fid.ok_or(Error::MalformedFrame("FCI missing fid tag"))?,
        descriptor: descriptor.ok_or(Error::MalformedFrame("FCI missing descriptor tag"))?,
        size,
        size_alt,
        df_name,
        proprietary,
        acl,
        rsa_public_marker,
        status,
    })
}

fn be_u16(value: &[u8]) -> Result<u16> {
    match value.len() {
        1 => Ok(u16::from(value[0])),
        2 => Ok(u16::from_be_bytes([value[0], value[1]])),
        _ => Err(Error::MalformedFrame("size field is neither 1 nor 2 bytes")),
    }
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    out.extend_from_slice(&tlv::encode_length(value.len()));
    out.extend_from_slice(value);
}

/// Build an FCI template from a [`File`]. Inverse of [`process_fci`], modulo
/// fields `process_fci` never populates (there is no tag carrying e.g. a
/// free-form comment).
pub fn construct_fci(file: &File) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some(size) = file.size {
        push_tlv(&mut body, fci_tags::SIZE, &size.to_be_bytes());
    }
    if let Some(size_alt) = file.size_alt {
        push_tlv(&mut body, fci_tags::SIZE_ALT, &size_alt.to_be_bytes());
    }
    push_tlv(&mut body, fci_tags::DESCRIPTOR, &[file.descriptor.to_byte()]);
    push_tlv(&mut body, fci_tags::FID, &file.fid.to_be_bytes());
    if let Some(df_name) = &file.df_name {
        push_tlv(&mut body, fci_tags::DF_NAME, df_name);
    }
    if let Some(proprietary) = &file.proprietary {
        push_tlv(&mut body, fci_tags::PROPRIETARY, proprietary);
    }
    push_tlv(&mut body, fci_tags::ACL, &file.acl);
    if file.rsa_public_marker {
        push_tlv(&mut body, fci_tags::RSA_PUBLIC, &[0x00, 0x66]);
    }
    if let Some(status) = file.status {
        push_tlv(&mut body, fci_tags::STATUS, &[status.to_byte()]);
    }

    let mut out = vec![fci_tags::TEMPLATE];
    out.extend_from_slice(&tlv::encode_length(body.len()));
    out.extend_from_slice(&body);
    out
}

/// The card rejects direct SELECT of a private-key file (high byte `0x29`)
/// and instead expects callers to be satisfied with a fixed synthetic FCI.
/// Bytes are the literal card-documented response with the low FID byte
/// substituted in.
pub fn synthetic_private_key_fci(low: u8) -> File {
    let bytes = [
        0x6f, 0x16, 0x82, 0x02, 0x11, 0x00, 0x83, 0x02, 0x29, low, 0x85, 0x02, 0x08, 0x00, 0x86, 0x08, 0xFF, 0x90,
        0x90, 0x90, 0xFF, 0xFF, 0xFF, 0xFF,
    ];
    process_fci(&bytes).expect("literal synthetic FCI is well-formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_working_ef() {
        let file = File::working_ef(0x3F01, 0x01, 0x0100);
        let bytes = construct_fci(&file);
        let parsed = process_fci(&bytes).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn round_trips_a_directory_with_name() {
        let mut file = File::directory(0x5000);
        file.df_name = Some(vec![0xA0, 0x00, 0x00, 0x00, 0x63]);
        file.acl = [0x80, 0x01, 0x02, 0x03, 0xFF, 0xFF, 0xFF, 0xFF];
        let bytes = construct_fci(&file);
        let parsed = process_fci(&bytes).unwrap();
        assert_eq!(parsed, file);
    }

    #[test]
    fn synthetic_private_key_fci_carries_the_requested_low_byte() {
        let file = synthetic_private_key_fci(0x07);
        assert_eq!(file.fid, 0x2907);
        assert_eq!(file.descriptor, FileDescriptor::InternalRsaCrt);
    }

    #[test]
    fn rejects_missing_template_tag() {
        assert!(process_fci(&[0x6A, 0x02, 0x00, 0x00]).is_err());
    }
}
