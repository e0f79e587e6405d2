//! File-system commands: SELECT, CREATE, DELETE, LIST (§4.6)
//!
//! Everything here is exposed as methods on [`Card`] rather than free
//! functions, because `select_by_path` depends on the DF cache the card
//! handle owns (§4.6's cache invariant: `cache.valid ⟹ cache.current_path`
//! equals the DF currently selected on the card).

use epass2003_apdu_core::CardTransport;

use crate::card::{Card, normalize_path};
use crate::constants::{cla, ins};
use crate::error::{Error, Result};
use crate::fci::{self, File, FileDescriptor};
use crate::fidhook;
use crate::smcodec::PlainApdu;

/// High byte of FIDs the card refuses to SELECT directly, short-circuited
/// with a synthetic FCI instead (§4.6).
const PRIVATE_KEY_FID_HIGH_BYTE: u8 = 0x29;

impl<T: CardTransport> Card<T> {
    /// SELECT a file by its logical 2-byte FID. Applies the FID hook (§4.5)
    /// on the way out and normalizes the FCI's fid back to logical form on
    /// the way in.
    pub fn select_by_fid(&mut self, high: u8, low: u8) -> Result<File> {
        if high == PRIVATE_KEY_FID_HIGH_BYTE {
            return Ok(fci::synthetic_private_key_fci(low));
        }

        let (phys_high, phys_low) = fidhook::hook_outbound(high, low);
        let apdu = PlainApdu::new(cla::ISO, ins::SELECT_FILE, 0x00, 0x00)
            .with_data(vec![phys_high, phys_low])
            .with_le(0);
        let (data, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        let raw = data.ok_or(Error::MalformedFrame("SELECT returned no FCI"))?;
        let mut file = fci::process_fci(&raw)?;
        file.fid = fidhook::hook_id_inbound(file.fid);
        Ok(file)
    }

    /// SELECT an application by AID (ISO `00 A4 04 00`). Caches the AID on
    /// success so callers can tell what's currently selected.
    pub fn select_by_aid(&mut self, aid: &[u8]) -> Result<File> {
        let apdu = PlainApdu::new(cla::ISO, ins::SELECT_FILE, 0x04, 0x00)
            .with_data(aid.to_vec())
            .with_le(0);
        let (data, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        self.aid_cache = Some(aid.to_vec());
        let raw = data.ok_or(Error::MalformedFrame("SELECT AID returned no FCI"))?;
        fci::process_fci(&raw)
    }

    /// SELECT a file by an MF-rooted path of 2-byte FIDs, skipping any
    /// prefix that's already the currently-selected DF. The final FID in
    /// `path` is always actually selected (to retrieve its FCI), even if it
    /// matches the cache.
    pub fn select_by_path(&mut self, path: &[u8]) -> Result<File> {
        let full = normalize_path(path)?;
        let last_offset = full.len() - 2;

        let skip = self
            .df_cache
            .as_ref()
            .map(|cached| common_even_prefix_len(cached, &full[..last_offset]))
            .unwrap_or(0);

        let mut file = None;
        let mut offset = skip;
        while offset < full.len() {
            file = Some(self.select_by_fid(full[offset], full[offset + 1])?);
            offset += 2;
        }
        let file = file.ok_or(Error::InvalidArgument("path must select at least one file"))?;

        self.df_cache = Some(if matches!(file.descriptor, FileDescriptor::Df) {
            full.clone()
        } else {
            full[..last_offset].to_vec()
        });

        Ok(file)
    }

    /// CREATE FILE: construct an FCI from `file` and send it (§4.6). The
    /// file's logical fid is hooked to physical form before being embedded.
    pub fn create_file(&mut self, file: &File) -> Result<()> {
        let mut wire_file = file.clone();
        wire_file.fid = fidhook::hook_id_outbound(file.fid);
        let fci_bytes = fci::construct_fci(&wire_file);

        let apdu = PlainApdu::new(cla::ISO, ins::CREATE_FILE, 0x00, 0x00).with_data(fci_bytes);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        // A newly created file could shadow cached assumptions about the
        // current DF's contents; the DF itself is unaffected.
        Ok(())
    }

    /// DELETE FILE: SELECT the parent directory, then delete the final FID
    /// (§4.6). Invalidates the DF cache afterwards, since deleting a
    /// directory the cache names as "currently selected" would otherwise
    /// leave the cache claiming a DF that no longer exists.
    pub fn delete_file(&mut self, path: &[u8]) -> Result<()> {
        let full = normalize_path(path)?;
        let last_offset = full.len() - 2;
        if last_offset > 0 {
            self.select_by_path(&full[..last_offset])?;
        }

        let (phys_high, phys_low) = fidhook::hook_outbound(full[last_offset], full[last_offset + 1]);
        let apdu = PlainApdu::new(cla::ISO, ins::DELETE_FILE, 0x00, 0x00).with_data(vec![phys_high, phys_low]);
        let (_, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        self.df_cache = None;
        Ok(())
    }

    /// LIST FILES: enumerate up to 64 bytes (32 FID pairs) of the currently
    /// selected DF's contents, normalized back to logical FIDs.
    pub fn list_files(&mut self) -> Result<Vec<u16>> {
        let apdu = PlainApdu::new(cla::PROPRIETARY, ins::LIST_FILES, 0x00, 0x00).with_le(0x40);
        let (data, sw) = self.transmit(apdu)?;
        if !sw.is_success() {
            return Err(Error::card_cmd_failed(sw));
        }
        let data = data.unwrap_or_default();
        Ok(data.chunks_exact(2).map(|c| fidhook::hook_id_inbound(u16::from_be_bytes([c[0], c[1]]))).collect())
    }
}

/// Longest common prefix of `a` and `b`, rounded down to a whole number of
/// 2-byte FIDs.
fn common_even_prefix_len(a: &[u8], b: &[u8]) -> usize {
    let matched = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
    matched - (matched % 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_even_prefix_len_rounds_down_to_fid_boundary() {
        assert_eq!(common_even_prefix_len(&[0x3F, 0x00, 0x50], &[0x3F, 0x00, 0x60]), 2);
        assert_eq!(common_even_prefix_len(&[0x3F, 0x00, 0x50, 0x01], &[0x3F, 0x00, 0x50, 0x01]), 4);
        assert_eq!(common_even_prefix_len(&[0x3F, 0x00], &[0x40, 0x00]), 0);
    }
}
