//! Length-prefixed message framing for the bus socket.
//!
//! Messages are framed with a 4-byte big-endian length prefix followed by
//! the JSON payload:
//!
//! ```text
//! +----------------+------------------+
//! | length (4 BE)  |  JSON payload    |
//! +----------------+------------------+
//! ```

use std::io::{Read, Write};

use serde::{Serialize, de::DeserializeOwned};

use crate::MAX_MESSAGE_SIZE;
use crate::error::{ProtocolError, ProtocolResult};

/// Encodes a message to bytes with length prefix.
///
/// Returns the complete framed message ready for transmission.
pub fn encode_message<T: Serialize>(message: &T) -> ProtocolResult<Vec<u8>> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(4 + json.len());
    buffer.extend_from_slice(&len.to_be_bytes());
    buffer.extend_from_slice(&json);
    Ok(buffer)
}

/// Decodes a message from bytes with length prefix.
///
/// The input should be a complete framed message (length prefix + payload).
pub fn decode_message<T: DeserializeOwned>(data: &[u8]) -> ProtocolResult<T> {
    if data.len() < 4 {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4,
            received: data.len(),
        });
    }

    let len_bytes: [u8; 4] = data[0..4].try_into().unwrap();
    let len = u32::from_be_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE as usize {
        return Err(ProtocolError::MessageTooLarge {
            size: len as u32,
            max: MAX_MESSAGE_SIZE,
        });
    }

    if data.len() < 4 + len {
        return Err(ProtocolError::IncompleteMessage {
            expected: 4 + len,
            received: data.len(),
        });
    }

    let json = &data[4..4 + len];
    let message = serde_json::from_slice(json)?;
    Ok(message)
}

/// Reads framed messages from a byte stream.
pub struct FrameReader<R> {
    reader: R,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new FrameReader wrapping the given reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Reads a single framed message.
    ///
    /// Returns `Ok(None)` if the stream is empty (EOF before any bytes).
    /// Returns an error if the message is incomplete or malformed.
    pub fn read_message<T: DeserializeOwned>(&mut self) -> ProtocolResult<Option<T>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;

        if len > MAX_MESSAGE_SIZE as usize {
            return Err(ProtocolError::MessageTooLarge {
                size: len as u32,
                max: MAX_MESSAGE_SIZE,
            });
        }

        if len == 0 {
            return Err(ProtocolError::EmptyMessage);
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;

        let message = serde_json::from_slice(&payload)?;
        Ok(Some(message))
    }

    /// Unwraps this FrameReader, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes framed messages to a byte stream.
pub struct FrameWriter<W> {
    writer: W,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new FrameWriter wrapping the given writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a single framed message.
    pub fn write_message<T: Serialize>(&mut self, message: &T) -> ProtocolResult<()> {
        let data = encode_message(message)?;
        self.writer.write_all(&data)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> ProtocolResult<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Unwraps this FrameWriter, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CalendarEntry, DisplayRequest, PluginMessage};
    use std::io::Cursor;

    #[test]
    fn encode_decode_roundtrip() {
        let message = PluginMessage::entries(vec![CalendarEntry::new("A", "2024-01-01T09:00:00Z")]);
        let bytes = encode_message(&message).unwrap();

        // Verify length prefix
        let len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(len as usize, bytes.len() - 4);

        let decoded: PluginMessage = decode_message(&bytes).unwrap();
        assert_eq!(message, decoded);
    }

    #[test]
    fn decode_incomplete_length() {
        let result: ProtocolResult<PluginMessage> = decode_message(&[0, 0]);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { expected: 4, .. })
        ));
    }

    #[test]
    fn decode_incomplete_payload() {
        // Claim 100 bytes but only provide 10
        let mut data = vec![0, 0, 0, 100];
        data.extend_from_slice(&[0u8; 10]);

        let result: ProtocolResult<PluginMessage> = decode_message(&data);
        assert!(matches!(
            result,
            Err(ProtocolError::IncompleteMessage { .. })
        ));
    }

    #[test]
    fn message_too_large() {
        let huge_len = MAX_MESSAGE_SIZE + 1;
        let data = huge_len.to_be_bytes();

        let result: ProtocolResult<PluginMessage> = decode_message(&data);
        assert!(matches!(result, Err(ProtocolError::MessageTooLarge { .. })));
    }

    #[test]
    fn frame_reader_single_message() {
        let request = DisplayRequest::get_calendar();
        let bytes = encode_message(&request).unwrap();

        let mut reader = FrameReader::new(Cursor::new(bytes));
        let decoded: Option<DisplayRequest> = reader.read_message().unwrap();

        assert_eq!(decoded, Some(request));
    }

    #[test]
    fn frame_reader_empty_stream() {
        let mut reader = FrameReader::new(Cursor::new(Vec::new()));
        let result: Option<DisplayRequest> = reader.read_message().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn frame_reader_multiple_messages() {
        let msg1 = PluginMessage::auth_success("ok");
        let msg2 = PluginMessage::entries(vec![]);

        let mut bytes = encode_message(&msg1).unwrap();
        bytes.extend(encode_message(&msg2).unwrap());

        let mut reader = FrameReader::new(Cursor::new(bytes));

        let decoded1: PluginMessage = reader.read_message().unwrap().unwrap();
        let decoded2: PluginMessage = reader.read_message().unwrap().unwrap();

        assert_eq!(decoded1, msg1);
        assert_eq!(decoded2, msg2);
    }

    #[test]
    fn frame_writer_roundtrip() {
        let messages = vec![
            PluginMessage::auth_success("ok"),
            PluginMessage::entries(vec![CalendarEntry::new("A", "2024-01-01T09:00:00Z")]),
            PluginMessage::error("boom"),
        ];

        let mut buffer = Vec::new();
        {
            let mut writer = FrameWriter::new(&mut buffer);
            for msg in &messages {
                writer.write_message(msg).unwrap();
            }
            writer.flush().unwrap();
        }

        let mut reader = FrameReader::new(Cursor::new(buffer));
        for expected in &messages {
            let actual: PluginMessage = reader.read_message().unwrap().unwrap();
            assert_eq!(&actual, expected);
        }

        let eof: Option<PluginMessage> = reader.read_message().unwrap();
        assert!(eof.is_none());
    }

    #[test]
    fn frame_reader_empty_message_error() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&0u32.to_be_bytes());

        let mut reader = FrameReader::new(Cursor::new(buffer));
        let result: ProtocolResult<Option<PluginMessage>> = reader.read_message();
        assert!(matches!(result, Err(ProtocolError::EmptyMessage)));
    }
}
