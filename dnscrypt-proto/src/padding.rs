//! ISO/IEC 7816-4 style padding of plaintext DNS packets before encryption.

use crate::error::Error;
use crate::{Result, MIN_UDP_QUESTION_SIZE, PADDING_BLOCK_SIZE};

/// Pads `packet` to the smallest multiple of 64 bytes that is at least 256 bytes long and leaves
/// room for the `0x80` marker.
pub fn pad(packet: &[u8]) -> Vec<u8> {
    pad_to_min(packet, MIN_UDP_QUESTION_SIZE)
}

/// Like [`pad()`], but with a caller-defined minimum size. Responses use a minimum of 0.
pub(crate) fn pad_to_min(packet: &[u8], min_size: usize) -> Vec<u8> {
    let needed = std::cmp::max(min_size, packet.len() + 1);
    let padded_len = (needed + PADDING_BLOCK_SIZE - 1) / PADDING_BLOCK_SIZE * PADDING_BLOCK_SIZE;

    let mut padded = Vec::with_capacity(padded_len);
    padded.extend_from_slice(packet);
    padded.push(0x80);
    padded.resize(padded_len, 0);
    padded
}

/// Removes the padding added by [`pad()`].
///
/// Trailing zero bytes are stripped, after which exactly one `0x80` byte must follow.
pub fn unpad(packet: &[u8]) -> Result<&[u8]> {
    let end = packet
        .iter()
        .rposition(|&b| b != 0)
        .ok_or(Error::InvalidPadding)?;
    if packet[end] != 0x80 {
        return Err(Error::InvalidPadding);
    }
    Ok(&packet[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pad_lengths() {
        for (len, expected) in [
            (0, 256),
            (23, 256),
            (255, 256),
            (256, 320),
            (272, 320),
            (319, 320),
            (320, 384),
            (1000, 1024),
        ] {
            let padded = pad(&vec![1; len]);
            assert_eq!(padded.len(), expected, "input length {}", len);
            assert_eq!(padded[len], 0x80);
            assert!(padded[len + 1..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn pad_without_minimum() {
        assert_eq!(pad_to_min(&[1; 10], 0).len(), 64);
        assert_eq!(pad_to_min(&[1; 64], 0).len(), 128);
    }

    #[test]
    fn unpad_roundtrip() {
        // trailing zeros in the payload itself must survive
        let query = [0x12, 0x34, 0x00, 0x80, 0x00];
        assert_eq!(unpad(&pad(&query)).unwrap(), &query);
        assert_eq!(unpad(&pad(&[])).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn unpad_invalid() {
        assert!(matches!(unpad(&[]), Err(Error::InvalidPadding)));
        assert!(matches!(unpad(&[0; 64]), Err(Error::InvalidPadding)));
        assert!(matches!(unpad(&[1, 2, 3, 0, 0]), Err(Error::InvalidPadding)));
    }
}
