//! Text encoding applied to outbound string payloads.
//!
//! WebSocket text frames are UTF-8 by protocol, so only `Utf8` produces a
//! text payload; the UTF-16 codecs yield binary payloads carrying the
//! encoded bytes.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::frame::Payload;

/// Codec used when sending string payloads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// UTF-8 (the WebSocket native text encoding). Default.
    #[default]
    Utf8,
    /// UTF-16, little-endian. Sent as binary frames.
    Utf16Le,
    /// UTF-16, big-endian. Sent as binary frames.
    Utf16Be,
}

impl TextEncoding {
    /// Encode `text` into an outbound payload.
    pub fn encode(self, text: &str) -> Payload {
        match self {
            Self::Utf8 => Payload::Text(text.to_owned()),
            Self::Utf16Le => Payload::Binary(encode_utf16(text, u16::to_le_bytes)),
            Self::Utf16Be => Payload::Binary(encode_utf16(text, u16::to_be_bytes)),
        }
    }
}

fn encode_utf16(text: &str, to_bytes: fn(u16) -> [u8; 2]) -> Bytes {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        out.extend_from_slice(&to_bytes(unit));
    }
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_utf8() {
        assert_eq!(TextEncoding::default(), TextEncoding::Utf8);
    }

    #[test]
    fn utf8_produces_text_payload() {
        assert_eq!(
            TextEncoding::Utf8.encode("hello"),
            Payload::Text("hello".into())
        );
    }

    #[test]
    fn utf16le_produces_binary_payload() {
        let payload = TextEncoding::Utf16Le.encode("hi");
        assert_eq!(
            payload,
            Payload::Binary(Bytes::from_static(&[0x68, 0x00, 0x69, 0x00]))
        );
    }

    #[test]
    fn utf16be_produces_binary_payload() {
        let payload = TextEncoding::Utf16Be.encode("hi");
        assert_eq!(
            payload,
            Payload::Binary(Bytes::from_static(&[0x00, 0x68, 0x00, 0x69]))
        );
    }

    #[test]
    fn utf16_handles_surrogate_pairs() {
        // U+1F600 encodes as the surrogate pair D83D DE00
        let payload = TextEncoding::Utf16Be.encode("\u{1f600}");
        assert_eq!(
            payload,
            Payload::Binary(Bytes::from_static(&[0xd8, 0x3d, 0xde, 0x00]))
        );
    }

    #[test]
    fn empty_string_encodes_empty() {
        assert_eq!(TextEncoding::Utf8.encode(""), Payload::Text(String::new()));
        assert_eq!(
            TextEncoding::Utf16Le.encode(""),
            Payload::Binary(Bytes::new())
        );
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&TextEncoding::Utf16Le).unwrap(),
            "\"utf16le\""
        );
        let back: TextEncoding = serde_json::from_str("\"utf8\"").unwrap();
        assert_eq!(back, TextEncoding::Utf8);
    }
}
