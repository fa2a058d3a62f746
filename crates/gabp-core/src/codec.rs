//! Frame codec for the GABP byte stream
//!
//! Each message is an ASCII header block terminated by `\r\n\r\n`
//! followed by a UTF-8 JSON payload of `Content-Length` bytes.
//! Header names are case-insensitive; `Content-Type` is emitted on
//! send and ignored on receive.

use crate::error::{GabpError, Result};
use crate::message::Message;
use tracing::warn;

/// Upper bound on a single frame payload (16 MiB)
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Encode a message as one frame: headers then JSON payload
pub fn encode(msg: &Message) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(msg)?;
    let header = format!(
        "Content-Length: {}\r\nContent-Type: application/json\r\n\r\n",
        payload.len()
    );
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Incremental frame decoder over a growing per-connection buffer
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append freshly read bytes to the buffer
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Decode the next complete frame payload.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A header block
    /// without a usable `Content-Length` is unrecoverable and returns
    /// an error; the caller should close the connection.
    pub fn next_payload(&mut self) -> Result<Option<Vec<u8>>> {
        let header_end = match find_terminator(&self.buf) {
            Some(pos) => pos,
            None => return Ok(None),
        };

        let content_length = parse_content_length(&self.buf[..header_end])?;
        if content_length > MAX_FRAME_LEN {
            return Err(GabpError::Frame(format!(
                "Frame too large: {} bytes",
                content_length
            )));
        }

        let payload_start = header_end + HEADER_TERMINATOR.len();
        let frame_end = payload_start + content_length;
        if self.buf.len() < frame_end {
            return Ok(None);
        }

        let payload = self.buf[payload_start..frame_end].to_vec();
        self.buf.drain(..frame_end);
        Ok(Some(payload))
    }

    /// Decode the next well-formed message.
    ///
    /// Payloads that fail JSON parsing or whose envelope is not a
    /// recognized message shape are dropped with a warning and the
    /// decoder moves on to the next frame.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        while let Some(payload) = self.next_payload()? {
            match serde_json::from_slice::<Message>(&payload) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    warn!("Dropping undecodable frame payload: {}", e);
                }
            }
        }
        Ok(None)
    }

    /// Bytes currently buffered but not yet consumed
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

fn find_terminator(buf: &[u8]) -> Option<usize> {
    buf.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
}

fn parse_content_length(header: &[u8]) -> Result<usize> {
    let text = std::str::from_utf8(header)
        .map_err(|_| GabpError::Frame("Header block is not ASCII".into()))?;

    for line in text.split("\r\n") {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if name.trim().eq_ignore_ascii_case("content-length") {
            return value.trim().parse::<usize>().map_err(|_| {
                GabpError::Frame(format!("Non-numeric Content-Length: {}", value.trim()))
            });
        }
    }

    Err(GabpError::Frame("Missing Content-Length header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(id: &str) -> Message {
        Message::request_with_id(id, "tools/list", json!(null))
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let msg = request("r1");
        let frame = encode(&msg).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(&frame);
        let decoded = decoder.next_message().unwrap().unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_encode_header_shape() {
        let frame = encode(&request("r1")).unwrap();
        let text = String::from_utf8_lossy(&frame);
        assert!(text.starts_with("Content-Length: "));
        assert!(text.contains("Content-Type: application/json\r\n\r\n"));
    }

    #[test]
    fn test_concatenated_frames_decode_in_order() {
        let msgs: Vec<Message> = (0..3).map(|i| request(&format!("r{}", i))).collect();
        let mut bytes = Vec::new();
        for msg in &msgs {
            bytes.extend_from_slice(&encode(msg).unwrap());
        }

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        for expected in &msgs {
            assert_eq!(decoder.next_message().unwrap().as_ref(), Some(expected));
        }
        assert!(decoder.next_message().unwrap().is_none());
    }

    #[test]
    fn test_byte_at_a_time_feeding() {
        let msg = request("slow");
        let frame = encode(&msg).unwrap();

        let mut decoder = FrameDecoder::new();
        let mut decoded = None;
        for byte in frame {
            decoder.extend(&[byte]);
            if let Some(m) = decoder.next_message().unwrap() {
                decoded = Some(m);
            }
        }
        assert_eq!(decoded, Some(msg));
    }

    #[test]
    fn test_malformed_payload_skipped() {
        let bad = b"Content-Length: 9\r\n\r\nnot json!";
        let good = encode(&request("after")).unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.extend(bad);
        decoder.extend(&good);

        let msg = decoder.next_message().unwrap().unwrap();
        assert_eq!(msg.id(), "after");
    }

    #[test]
    fn test_unrecognized_envelope_skipped() {
        let payload = br#"{"v":"gabp/1","id":"x","type":"bogus"}"#;
        let mut bytes = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        bytes.extend_from_slice(payload);
        bytes.extend_from_slice(&encode(&request("ok")).unwrap());

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        assert_eq!(decoder.next_message().unwrap().unwrap().id(), "ok");
    }

    #[test]
    fn test_missing_content_length_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"Content-Type: application/json\r\n\r\n{}");
        assert!(decoder.next_payload().is_err());
    }

    #[test]
    fn test_non_numeric_content_length_is_fatal() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"Content-Length: lots\r\n\r\n{}");
        assert!(decoder.next_payload().is_err());
    }

    #[test]
    fn test_header_case_and_whitespace() {
        let msg = request("r1");
        let payload = serde_json::to_vec(&msg).unwrap();
        let mut bytes = format!("content-LENGTH:   {}  \r\n\r\n", payload.len()).into_bytes();
        bytes.extend_from_slice(&payload);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&bytes);
        assert_eq!(decoder.next_message().unwrap(), Some(msg));
    }

    #[test]
    fn test_oversize_frame_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(format!("Content-Length: {}\r\n\r\n", MAX_FRAME_LEN + 1).as_bytes());
        assert!(decoder.next_payload().is_err());
    }
}
