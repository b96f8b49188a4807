//! CAT text codec
//!
//! Encodes outbound units and splits inbound text into fragments.
//!
//! # Format
//!
//! ```text
//! <TAG><payload>;
//! ```
//!
//! - `TAG`: leading ASCII letters (`FA`, `ZZIS`, `ZZLA`, ...).
//! - `payload`: decimal digits, left-zero-padded to the tag's fixed width.
//!   The payload starts right after the tag, so its offset differs per tag
//!   (2 for `FA`, 4 for the `ZZ` extended set).
//! - Terminator: `;`.
//!
//! Decoding never fails. A fragment whose digit region is not a valid
//! integer comes back with `value: None` and is ignored by the engine.
//! Range checks are not the codec's job.

use bytes::BytesMut;
use tracing::trace;

/// Unit terminator byte
pub const TERMINATOR: u8 = b';';

/// Inbound bytes kept without a terminator before the tail is discarded
const MAX_PENDING_BYTES: usize = 256;

/// Known payload widths, keyed by tag
///
/// Tags not listed here take the whole remainder of the fragment as payload.
const PAYLOAD_WIDTHS: &[(&str, usize)] = &[
    ("FA", 11),
    ("ZZIS", 5),
    ("ZZLA", 3),
    ("ZZMA", 1),
];

/// Look up the fixed payload width for a tag
pub fn payload_width(tag: &str) -> Option<usize> {
    PAYLOAD_WIDTHS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, w)| *w)
}

/// One decoded protocol unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Command mnemonic (empty for the device's `?;` error reply)
    pub tag: String,
    /// Raw payload text as received, bounded by the tag's width
    pub raw: String,
    /// Decoded payload, `None` when the digit region does not parse
    pub value: Option<i64>,
}

impl Fragment {
    /// Decode a single fragment (without its terminator)
    pub fn parse(fragment: &str) -> Self {
        let body = fragment.trim();

        let tag_end = body
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(body.len());
        let tag = &body[..tag_end];
        let rest = &body[tag_end..];

        let raw = match payload_width(tag) {
            Some(width) => rest.chars().take(width).collect::<String>(),
            None => rest.to_string(),
        };

        let value = if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            raw.parse::<i64>().ok()
        } else {
            None
        };

        Self {
            tag: tag.to_string(),
            raw,
            value,
        }
    }
}

/// Encode a write unit: tag, zero-padded value, terminator
///
/// Negative values cannot be expressed on the wire and are sent as zero.
/// Values wider than `width` are rendered in full; the device truncates.
///
/// ```
/// use cat_sync::cat::encode;
///
/// assert_eq!(encode("FA", 14_199_000, 11), "FA00014199000;");
/// assert_eq!(encode("ZZLA", 5, 3), "ZZLA005;");
/// ```
pub fn encode(tag: &str, value: i64, width: usize) -> String {
    let value = value.max(0);
    format!("{tag}{value:0width$};")
}

/// Encode a read-request: the bare tag and terminator
pub fn encode_read(tag: &str) -> String {
    format!("{tag};")
}

/// Split an inbound chunk into fragments, in arrival order
///
/// Empty fragments (from `;;` or trailing whitespace) are dropped.
pub fn decode(chunk: &str) -> Vec<Fragment> {
    chunk
        .split(TERMINATOR as char)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(Fragment::parse)
        .collect()
}

/// Reassembles fragments that arrive split across socket reads
///
/// Only terminated fragments are decoded; an unterminated tail is kept until
/// the next push completes it.
#[derive(Debug, Default)]
pub struct FragmentBuffer {
    buf: BytesMut,
}

impl FragmentBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append inbound bytes and return every fragment they complete
    pub fn push(&mut self, data: &[u8]) -> Vec<Fragment> {
        self.buf.extend_from_slice(data);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == TERMINATOR) {
            let unit = self.buf.split_to(pos + 1);
            let text = String::from_utf8_lossy(&unit[..pos]);
            if !text.trim().is_empty() {
                fragments.push(Fragment::parse(&text));
            }
        }

        if self.buf.len() > MAX_PENDING_BYTES {
            trace!(
                "Discarding {} unterminated bytes from CAT stream",
                self.buf.len()
            );
            self.buf.clear();
        }

        fragments
    }

    /// Drop any partial fragment (used when the stream is replaced)
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Number of buffered bytes waiting for a terminator
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_frequency() {
        assert_eq!(encode("FA", 14_200_000, 11), "FA00014200000;");
    }

    #[test]
    fn test_encode_negative_clamps_to_zero() {
        assert_eq!(encode("ZZLA", -3, 3), "ZZLA000;");
    }

    #[test]
    fn test_encode_read_request() {
        assert_eq!(encode_read("ZZIS"), "ZZIS;");
    }

    #[test]
    fn test_decode_concatenated_fragments_in_order() {
        let frags = decode("FA00014200000;ZZIS03000;ZZLA050;");
        let tags: Vec<_> = frags.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["FA", "ZZIS", "ZZLA"]);
        assert_eq!(frags[0].value, Some(14_200_000));
        assert_eq!(frags[1].value, Some(3000));
        assert_eq!(frags[2].value, Some(50));
    }

    #[test]
    fn test_decode_drops_empty_fragments() {
        let frags = decode(";;FA00007074000;;\r\n");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].value, Some(7_074_000));
    }

    #[test]
    fn test_decode_malformed_payload_yields_none() {
        let frags = decode("ZZISabcde;");
        assert_eq!(frags[0].tag, "ZZIS");
        assert_eq!(frags[0].value, None);
    }

    #[test]
    fn test_decode_bare_tag_has_no_value() {
        let frags = decode("FA;");
        assert_eq!(frags[0].tag, "FA");
        assert_eq!(frags[0].value, None);
    }

    #[test]
    fn test_decode_payload_bounded_by_width() {
        // Extra trailing digits beyond the fixed width are not part of the value
        let frags = decode("ZZLA0501;");
        assert_eq!(frags[0].raw, "050");
        assert_eq!(frags[0].value, Some(50));
    }

    #[test]
    fn test_decode_error_reply_has_empty_tag() {
        let frags = decode("?;");
        assert_eq!(frags[0].tag, "");
        assert_eq!(frags[0].value, None);
    }

    #[test]
    fn test_buffer_reassembles_split_fragment() {
        let mut buf = FragmentBuffer::new();
        assert!(buf.push(b"FA000142").is_empty());
        assert_eq!(buf.pending_len(), 8);

        let frags = buf.push(b"00000;ZZLA0");
        assert_eq!(frags.len(), 1);
        assert_eq!(frags[0].value, Some(14_200_000));

        let frags = buf.push(b"75;");
        assert_eq!(frags[0].tag, "ZZLA");
        assert_eq!(frags[0].value, Some(75));
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_buffer_discards_runaway_tail() {
        let mut buf = FragmentBuffer::new();
        let junk = vec![b'X'; MAX_PENDING_BYTES + 1];
        assert!(buf.push(&junk).is_empty());
        assert_eq!(buf.pending_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_decode_recovers_encoded_value(v in 0i64..100_000_000_000) {
            let frags = decode(&encode("FA", v, 11));
            prop_assert_eq!(frags.len(), 1);
            prop_assert_eq!(frags[0].value, Some(v));
        }

        #[test]
        fn prop_decode_recovers_short_fields(v in 0i64..100_000, tag_idx in 0usize..2) {
            let (tag, width) = [("ZZIS", 5usize), ("ZZLA", 3usize)][tag_idx];
            let v = v % 10i64.pow(width as u32);
            let frags = decode(&encode(tag, v, width));
            prop_assert_eq!(frags[0].tag.as_str(), tag);
            prop_assert_eq!(frags[0].value, Some(v));
        }
    }
}
