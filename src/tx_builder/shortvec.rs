//! Compact-u16 length prefixes used by the wire format.
//!
//! Lengths are written 7 bits per byte, low bits first, with the high bit of
//! each byte flagging a continuation. At most three bytes are used, so the
//! largest encodable length is `u16::MAX`. The codec itself is
//! `solana_sdk::short_vec`; this module adapts it to the builder's errors.

use solana_sdk::short_vec::{self, ShortU16};

use crate::tx_builder::errors::TransactionBuilderError;

/// Append `len` to `buf` as a compact-u16.
pub fn encode_len(buf: &mut Vec<u8>, len: usize) -> Result<(), TransactionBuilderError> {
    let len = u16::try_from(len).map_err(|_| {
        TransactionBuilderError::wire(format!("length {} does not fit in a compact-u16", len))
    })?;
    bincode::serialize_into(buf, &ShortU16(len))
        .map_err(|e| TransactionBuilderError::wire(e.to_string()))
}

/// Decode a compact-u16 from the front of `bytes`.
///
/// Returns the decoded length and the number of bytes consumed. Truncated,
/// overflowing and non-canonical encodings (a trailing zero continuation
/// byte) are rejected.
pub fn decode_len(bytes: &[u8]) -> Result<(usize, usize), TransactionBuilderError> {
    short_vec::decode_shortu16_len(bytes)
        .map_err(|_| TransactionBuilderError::wire("invalid compact-u16 length prefix"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        encode_len(&mut buf, len).unwrap();
        buf
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encoded(0), vec![0x00]);
        assert_eq!(encoded(0x7f), vec![0x7f]);
        assert_eq!(encoded(0x80), vec![0x80, 0x01]);
        assert_eq!(encoded(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encoded(0x4000), vec![0x80, 0x80, 0x01]);
        assert_eq!(encoded(0xffff), vec![0xff, 0xff, 0x03]);
    }

    #[test]
    fn test_decode_reports_consumed_bytes() {
        assert_eq!(decode_len(&[0x80, 0x01, 0xaa]).unwrap(), (0x80, 2));
        assert_eq!(decode_len(&[0x05]).unwrap(), (5, 1));
    }

    #[test]
    fn test_rejects_oversized_length() {
        let mut buf = Vec::new();
        assert!(encode_len(&mut buf, 0x1_0000).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_matches_sdk_short_vec_serialization() {
        let keys = vec![7u8; 200];
        let mut buf = Vec::new();
        encode_len(&mut buf, keys.len()).unwrap();
        buf.extend_from_slice(&keys);

        #[derive(serde::Serialize)]
        struct Wrapped(#[serde(with = "short_vec")] Vec<u8>);
        assert_eq!(bincode::serialize(&Wrapped(keys)).unwrap(), buf);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(decode_len(&[]).is_err());
        assert!(decode_len(&[0x80]).is_err());
        assert!(decode_len(&[0x80, 0x00]).is_err());
        assert!(decode_len(&[0xff, 0xff, 0x04]).is_err());
        assert!(decode_len(&[0x80, 0x80, 0x80, 0x01]).is_err());
    }
}
