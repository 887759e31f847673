use asynchronous_codec::{Decoder, Encoder};
use bytes::{Buf, BufMut, BytesMut};

use spamgate_common::decoding::ClientCommand;
use spamgate_common::encoding::Writable;
use spamgate_common::replies::Reply;
use spamgate_common::{InvalidData, ProtocolError, MESSAGE_CHUNK};

/// De/encodes milter frames: `uint32 length | command byte | payload`.
///
/// The length is big-endian and counts the command byte, so it is at least
/// one. Payloads above twice the protocol chunk size are rejected before any
/// buffer space is reserved for them; milter framing has no resync marker,
/// so a bad length terminates the session.
#[derive(Debug, Clone)]
pub(crate) struct MilterCodec {
    max_payload: usize,
}

impl MilterCodec {
    pub(crate) fn new() -> Self {
        Self {
            max_payload: 2 * MESSAGE_CHUNK,
        }
    }
}

impl Decoder for &mut MilterCodec {
    type Item = ClientCommand;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            // Not enough data to read the length marker.
            return Ok(None);
        }

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        // A frame carries at least its command byte.
        if length == 0 {
            return Err(InvalidData::new(
                "frame length too short to carry a command",
                src.split_to(4),
            )
            .into());
        }

        if length - 1 > self.max_payload {
            return Err(ProtocolError::TooMuchData(length - 1));
        }

        if src.len() < 4 + length {
            // Grow the buffer up front for the announced frame and wait.
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(4 + length);
        frame.advance(4);

        ClientCommand::parse(frame).map(Some)
    }
}

impl Encoder for &mut MilterCodec {
    type Item<'i> = &'i Reply;
    type Error = ProtocolError;

    fn encode(&mut self, item: &Reply, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body_len = item.len();
        if body_len > self.max_payload {
            return Err(ProtocolError::TooMuchData(body_len));
        }

        // The length prefix counts the reply code byte.
        let frame_len = 1 + body_len;

        dst.reserve(4 + frame_len);
        dst.put_u32(frame_len as u32);
        dst.put_u8(item.code());
        item.write(dst);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn frame(code: u8, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 1 + body.len());
        out.extend_from_slice(&(1 + body.len() as u32).to_be_bytes());
        out.push(code);
        out.extend_from_slice(body);
        out
    }

    fn decode_all(codec: &mut MilterCodec, buffer: &mut BytesMut) -> Vec<ClientCommand> {
        let mut commands = Vec::new();
        while let Some(command) = (&mut &mut *codec).decode(buffer).expect("decode failed") {
            commands.push(command);
        }
        commands
    }

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter(&frame(b'H', b"mail.example\0")[..6]);

        assert!((&mut &mut codec).decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_decode_byte_at_a_time_matches_unsplit() {
        let mut stream = Vec::new();
        stream.extend(frame(b'H', b"mail.example\0"));
        stream.extend(frame(b'L', b"Subject\0hi\0"));
        stream.extend(frame(b'B', b"body bytes"));
        stream.extend(frame(b'E', b""));

        // Unsplit reference run.
        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter(&stream);
        let whole = decode_all(&mut codec, &mut buffer);

        // Feed the same stream one byte at a time.
        let mut split = Vec::new();
        let mut buffer = BytesMut::new();
        for byte in &stream {
            buffer.put_u8(*byte);
            split.extend(decode_all(&mut codec, &mut buffer));
        }

        assert_eq!(whole.len(), 4);
        assert_eq!(split.len(), whole.len());
        for (a, b) in whole.iter().zip(&split) {
            // ClientCommand has no PartialEq across variants; compare debug
            // renderings, which include the payload bytes.
            assert_eq!(format!("{a:?}"), format!("{b:?}"));
        }
    }

    #[test]
    fn test_decode_zero_length_frame() {
        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter([0, 0, 0, 0, b'A']);

        let err = (&mut &mut codec)
            .decode(&mut buffer)
            .expect_err("a zero length frame cannot carry a command");

        assert_matches!(err, ProtocolError::InvalidData(_));
    }

    #[test]
    fn test_decode_oversized_frame() {
        let mut codec = MilterCodec::new();

        // Announce a payload just past the limit; no payload bytes needed,
        // the length alone must be refused.
        let length = (2 * MESSAGE_CHUNK + 2) as u32;
        let mut buffer = BytesMut::from_iter(length.to_be_bytes());

        let err = (&mut &mut codec)
            .decode(&mut buffer)
            .expect_err("an oversized frame must be refused");

        assert_matches!(err, ProtocolError::TooMuchData(n) if n == 2 * MESSAGE_CHUNK + 1);
    }

    #[test]
    fn test_decode_unknown_command() {
        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter(frame(b'z', b""));

        let err = (&mut &mut codec)
            .decode(&mut buffer)
            .expect_err("an unassigned command byte must be refused");

        assert_matches!(err, ProtocolError::InvalidData(_));
    }

    #[test]
    fn test_decode_fuzz_found_garbage() {
        // Stray zero frames followed by a valid-looking prefix.
        let input = vec![
            0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, b'f', b'f', 0, 0, 0, 0, 0, 0, 0, 0,
        ];

        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter(&input);

        // Must neither panic nor loop, error content is secondary.
        let _res = (&mut &mut codec).decode(&mut buffer);
    }

    #[test]
    fn test_decode_fuzz_truncated_connect() {
        // Connect frame with its family byte missing.
        let input = vec![0, 0, 0, 5, 67, 58, 255, 1, 0];

        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::from_iter(&input);

        let _res = (&mut &mut codec).decode(&mut buffer);
    }

    #[test]
    fn test_encode() {
        let mut codec = MilterCodec::new();
        let mut buffer = BytesMut::new();

        (&mut &mut codec)
            .encode(&Reply::Accept, &mut buffer)
            .expect("failed encoding accept");
        (&mut &mut codec)
            .encode(
                &Reply::AddHeader {
                    name: "X-Spam".to_string(),
                    value: "Yes".to_string(),
                },
                &mut buffer,
            )
            .expect("failed encoding add header");

        let mut expected = frame(b'a', b"");
        expected.extend(frame(b'h', b"X-Spam\0Yes\0"));
        assert_eq!(&buffer[..], &expected[..]);
    }
}
