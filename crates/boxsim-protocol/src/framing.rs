//! Binary framing for the simulator protocol.
//!
//! # Wire format
//!
//! ```text
//! +-----------------+---------------------+-----------------+
//! | Kind (4B BE i32)| Body length (4B BE) | Body            |
//! +-----------------+---------------------+-----------------+
//! ```
//!
//! Both header fields are big-endian. Bodies larger than
//! [`MAX_BODY_SIZE`] are rejected in both directions.

use std::io::{ErrorKind, Read, Write};

use crate::error::ProtocolError;
use crate::message::{MAX_BODY_SIZE, Message, MessageKind};

/// Read one frame.
///
/// Returns `Ok(None)` if the stream reaches EOF before any header byte is
/// read (clean disconnect). EOF inside a frame is an IO error.
pub fn read_frame(reader: &mut impl Read) -> Result<Option<Message>, ProtocolError> {
    let mut kind_buf = [0u8; 4];
    let first = loop {
        match reader.read(&mut kind_buf) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    };
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut kind_buf[first..])?;

    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_BODY_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: len,
            max: MAX_BODY_SIZE,
        });
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;

    let kind = MessageKind::from_code(i32::from_be_bytes(kind_buf))?;
    Ok(Some(Message::new(kind, body)))
}

/// Write one frame and flush.
pub fn write_frame(writer: &mut impl Write, msg: &Message) -> Result<(), ProtocolError> {
    if msg.body.len() > MAX_BODY_SIZE {
        return Err(ProtocolError::PayloadTooLarge {
            size: msg.body.len(),
            max: MAX_BODY_SIZE,
        });
    }
    // MAX_BODY_SIZE fits in u32.
    let len = u32::try_from(msg.body.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        size: msg.body.len(),
        max: MAX_BODY_SIZE,
    })?;

    let mut header = [0u8; 8];
    header[..4].copy_from_slice(&msg.kind.code().to_be_bytes());
    header[4..].copy_from_slice(&len.to_be_bytes());
    writer.write_all(&header)?;
    writer.write_all(&msg.body)?;
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Value;
    use std::io::Cursor;

    #[test]
    fn roundtrip_frame() {
        let msg = Message::values(MessageKind::Step, &[Value::Int(720)]);
        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).unwrap();

        let mut cursor = Cursor::new(&buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Some(msg));
    }

    #[test]
    fn header_is_big_endian() {
        let msg = Message::text(MessageKind::Bye, "bye");
        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).unwrap();

        assert_eq!(&buf[..4], &[0, 0, 0, 1]);
        let len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]) as usize;
        assert_eq!(len, buf.len() - 8);
    }

    #[test]
    fn empty_body() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Message::empty(MessageKind::Hello)).unwrap();
        assert_eq!(buf.len(), 8);
        let mut cursor = Cursor::new(&buf);
        let msg = read_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(msg.kind, MessageKind::Hello);
        assert!(msg.body.is_empty());
    }

    #[test]
    fn eof_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn eof_inside_frame_is_an_error() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 4, 0, 0]);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::Io(e)) if e.kind() == ErrorKind::UnexpectedEof
        ));
    }

    #[test]
    fn oversize_length_is_rejected() {
        let mut data = MessageKind::Sensor.code().to_be_bytes().to_vec();
        data.extend_from_slice(&(u32::try_from(MAX_BODY_SIZE).unwrap() + 1).to_be_bytes());
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn oversize_body_is_not_written() {
        let msg = Message::new(MessageKind::Configure, vec![0; MAX_BODY_SIZE + 1]);
        let mut buf = Vec::new();
        assert!(matches!(
            write_frame(&mut buf, &msg),
            Err(ProtocolError::PayloadTooLarge { .. })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut data = 42i32.to_be_bytes().to_vec();
        data.extend_from_slice(&0u32.to_be_bytes());
        let mut cursor = Cursor::new(data);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::UnknownKind(42))
        ));
    }

    #[test]
    fn multiple_frames_in_sequence() {
        let frames = [
            Message::empty(MessageKind::Hello),
            Message::values(MessageKind::Step, &[Value::Int(3)]),
            Message::text(MessageKind::Bye, "done"),
        ];
        let mut buf = Vec::new();
        for f in &frames {
            write_frame(&mut buf, f).unwrap();
        }
        let mut cursor = Cursor::new(&buf);
        for f in &frames {
            assert_eq!(read_frame(&mut cursor).unwrap().as_ref(), Some(f));
        }
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }
}
