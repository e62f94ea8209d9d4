//! Length-prefixed packet extraction over a growing byte buffer.
//!
//! This is the "greenlet-driven consume loop" re-architected as a pure
//! function of `(buffer, prefix width) -> (frame?, remaining buffer)`: no
//! I/O happens here, which is what makes the boundary behaviors testable
//! without a socket.

/// The width of the length prefix, which flips exactly once when the
/// handshake finishes and the connection enters the `Connected` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixWidth {
    /// 2-byte big-endian length prefix, used while handshaking.
    Two,
    /// 4-byte big-endian length prefix, used once connected.
    Four,
}

impl PrefixWidth {
    fn byte_len(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Four => 4,
        }
    }

    fn read_len(self, buf: &[u8]) -> usize {
        match self {
            Self::Two => u16::from_be_bytes([buf[0], buf[1]]) as usize,
            Self::Four => u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize,
        }
    }
}

/// Result of attempting to extract one frame from a buffer.
#[derive(Debug, PartialEq, Eq)]
pub enum Consumed<'a> {
    /// Not enough bytes buffered yet for a full prefix, or for the prefix's
    /// declared length; the input must be returned to the caller unchanged.
    Incomplete,
    /// One complete frame was extracted.
    Frame {
        /// The frame's payload, with the length prefix stripped.
        payload: &'a [u8],
        /// Whatever followed the frame in the buffer.
        rest: &'a [u8],
    },
}

/// A stateful framer: same algorithm regardless of width, but the width
/// itself is state that the connection flips exactly once.
#[derive(Debug, Clone, Copy)]
pub struct Framer {
    width: PrefixWidth,
}

impl Framer {
    /// Creates a framer starting at the handshake-time 2-byte width.
    pub fn new() -> Self {
        Self {
            width: PrefixWidth::Two,
        }
    }

    /// Current prefix width.
    pub fn width(&self) -> PrefixWidth {
        self.width
    }

    /// Flips the prefix width to 4 bytes. Idempotent.
    pub fn set_connected(&mut self) {
        self.width = PrefixWidth::Four;
    }

    /// Extracts at most one frame from `buf`.
    ///
    /// Multiple frames in one buffer are handled by calling this repeatedly
    /// with the previous call's `rest`.
    pub fn consume<'a>(&self, buf: &'a [u8]) -> Consumed<'a> {
        let prefix_len = self.width.byte_len();
        if buf.len() < prefix_len {
            return Consumed::Incomplete;
        }

        let declared_len = self.width.read_len(buf);
        let frame_end = prefix_len + declared_len;
        if buf.len() < frame_end {
            return Consumed::Incomplete;
        }

        Consumed::Frame {
            payload: &buf[prefix_len..frame_end],
            rest: &buf[frame_end..],
        }
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_two_byte_prefix_is_incomplete() {
        let framer = Framer::new();
        assert_eq!(framer.consume(&[]), Consumed::Incomplete);
        assert_eq!(framer.consume(&[0x00]), Consumed::Incomplete);
    }

    #[test]
    fn declared_length_exceeding_buffer_is_incomplete() {
        let framer = Framer::new();
        // Declares a 5-byte payload but only 2 are present.
        let buf = [0x00, 0x05, b'n', b'x'];
        assert_eq!(framer.consume(&buf), Consumed::Incomplete);
    }

    #[test]
    fn extracts_one_two_byte_framed_packet() {
        let framer = Framer::new();
        let buf = [0x00, 0x03, b's', b'o', b'k', 0xAA];
        match framer.consume(&buf) {
            Consumed::Frame { payload, rest } => {
                assert_eq!(payload, b"sok");
                assert_eq!(rest, &[0xAA]);
            }
            Consumed::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn repeated_consume_drains_multiple_frames() {
        let framer = Framer::new();
        let buf = [0x00, 0x01, b'a', 0x00, 0x01, b'b'];
        let (first, rest1) = match framer.consume(&buf) {
            Consumed::Frame { payload, rest } => (payload.to_vec(), rest),
            Consumed::Incomplete => panic!("expected a frame"),
        };
        assert_eq!(first, b"a");
        let (second, rest2) = match framer.consume(rest1) {
            Consumed::Frame { payload, rest } => (payload.to_vec(), rest),
            Consumed::Incomplete => panic!("expected a frame"),
        };
        assert_eq!(second, b"b");
        assert!(rest2.is_empty());
    }

    #[test]
    fn four_byte_width_boundary_behaviors() {
        let mut framer = Framer::new();
        framer.set_connected();
        assert_eq!(framer.consume(&[0, 0, 0]), Consumed::Incomplete);

        // Empty (length-0) frame is a valid keepalive frame.
        let buf = [0x00, 0x00, 0x00, 0x00];
        match framer.consume(&buf) {
            Consumed::Frame { payload, rest } => {
                assert!(payload.is_empty());
                assert!(rest.is_empty());
            }
            Consumed::Incomplete => panic!("expected a frame"),
        }
    }

    #[test]
    fn width_is_two_until_explicitly_flipped() {
        let framer = Framer::new();
        assert_eq!(framer.width(), PrefixWidth::Two);
        let mut framer = framer;
        framer.set_connected();
        assert_eq!(framer.width(), PrefixWidth::Four);
    }
}
