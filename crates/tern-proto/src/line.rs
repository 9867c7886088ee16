//! Line-based framing codec for tokio.
//!
//! Frames the wire into newline-terminated lines of at most 512 bytes
//! including the terminator, validating UTF-8 on the way in and appending
//! CRLF on the way out when the caller left it off.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::LineError;

/// Protocol line limit including the two-byte terminator.
const MAX_WIRE_LINE: usize = 512;

/// Newline-delimited line codec with the IRC length limit.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Index of the next byte to check for a newline.
    next_index: usize,
}

impl LineCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, LineError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > MAX_WIRE_LINE {
                return Err(LineError::TooLong {
                    actual: line.len(),
                    limit: MAX_WIRE_LINE,
                });
            }

            let text = std::str::from_utf8(&line).map_err(|e| LineError::InvalidUtf8 {
                byte_pos: e.valid_up_to(),
            })?;
            Ok(Some(text.trim_end_matches(['\r', '\n']).to_owned()))
        } else {
            self.next_index = src.len();
            if src.len() > MAX_WIRE_LINE {
                return Err(LineError::TooLong {
                    actual: src.len(),
                    limit: MAX_WIRE_LINE,
                });
            }
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = LineError;

    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), LineError> {
        dst.extend_from_slice(line.as_bytes());
        if !line.ends_with('\n') {
            dst.extend_from_slice(b"\r\n");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_complete_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :token\r\nPONG");

        let line = codec.decode(&mut buf).unwrap();
        assert_eq!(line.as_deref(), Some("PING :token"));
        assert_eq!(&buf[..], b"PONG");
    }

    #[test]
    fn decode_partial_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("PING :tok");

        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"en\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap().as_deref(),
            Some("PING :token")
        );
    }

    #[test]
    fn decode_rejects_oversize_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(format!("{}\n", "x".repeat(600)).as_str());

        assert!(matches!(
            codec.decode(&mut buf),
            Err(LineError::TooLong { .. })
        ));
    }

    #[test]
    fn encode_appends_terminator() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();

        codec.encode("QUIT :bye".to_owned(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"QUIT :bye\r\n");
    }
}
