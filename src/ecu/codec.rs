//! Marker-framed ECU codec.
//!
//! Wire format (ECU → dash, answer to a single `n` request byte):
//! ```text
//! ┌────────────┬──────────┬────────────┬───────────────────────┐
//! │ 'n' (0x6E) │ type (1B)│ length (1B)│ payload (length bytes)│
//! └────────────┴──────────┴────────────┴───────────────────────┘
//! ```
//!
//! The decoder is fed one byte at a time straight out of the UART FIFO and
//! yields a payload slice once `length` bytes have arrived.  Anything that
//! is not a marker while idle is line noise and is dropped silently.

use heapless::Vec;

/// Frame start byte; also the request byte sent to the ECU.
pub const FRAME_MARKER: u8 = b'n';

/// Largest payload accepted (protects the fixed buffer).
pub const MAX_PAYLOAD: usize = 200;

/// Decoder state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Scanning for [`FRAME_MARKER`].
    AwaitMarker,
    /// Marker seen; next byte is the frame type.
    AwaitType,
    /// Next byte is the payload length.
    AwaitLength,
    /// Accumulating payload bytes.
    ReadPayload,
}

/// Streaming frame decoder.
pub struct FrameDecoder {
    state: DecoderState,
    frame_type: u8,
    expected: usize,
    payload: Vec<u8, MAX_PAYLOAD>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            state: DecoderState::AwaitMarker,
            frame_type: 0,
            expected: 0,
            payload: Vec::new(),
        }
    }

    /// Feed one byte.
    ///
    /// Returns `Some(payload)` when this byte completes a frame.  The slice
    /// is valid until the next call to `push`.
    pub fn push(&mut self, byte: u8) -> Option<&[u8]> {
        match self.state {
            DecoderState::AwaitMarker => {
                if byte == FRAME_MARKER {
                    self.state = DecoderState::AwaitType;
                }
            }
            DecoderState::AwaitType => {
                self.frame_type = byte;
                self.state = DecoderState::AwaitLength;
            }
            DecoderState::AwaitLength => {
                let len = usize::from(byte);
                if len == 0 || len > MAX_PAYLOAD {
                    self.state = DecoderState::AwaitMarker;
                } else {
                    self.expected = len;
                    self.payload.clear();
                    self.state = DecoderState::ReadPayload;
                }
            }
            DecoderState::ReadPayload => {
                // `expected <= MAX_PAYLOAD`, so the buffer never overflows.
                let _ = self.payload.push(byte);
                if self.payload.len() >= self.expected {
                    self.state = DecoderState::AwaitMarker;
                    return Some(self.payload.as_slice());
                }
            }
        }
        None
    }

    /// Feed a slice, returning the first complete payload.  Bytes after the
    /// completing byte are not consumed.
    pub fn feed(&mut self, data: &[u8]) -> Option<(usize, &[u8])> {
        let mut done = None;
        for (i, &b) in data.iter().enumerate() {
            if self.push(b).is_some() {
                done = Some(i + 1);
                break;
            }
        }
        done.map(|consumed| (consumed, self.payload.as_slice()))
    }

    /// Drop any partial frame (e.g. after the serial link was reopened).
    pub fn reset(&mut self) {
        self.state = DecoderState::AwaitMarker;
        self.expected = 0;
        self.payload.clear();
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// `true` between frames, the only point where a new request may go out.
    pub fn is_idle(&self) -> bool {
        self.state == DecoderState::AwaitMarker
    }

    /// Type byte of the most recent frame.
    pub fn frame_type(&self) -> u8 {
        self.frame_type
    }

    /// Payload bytes collected so far for the frame in progress.
    pub fn bytes_received(&self) -> usize {
        match self.state {
            DecoderState::ReadPayload => self.payload.len(),
            _ => 0,
        }
    }
}

/// Encode a payload into a marker frame.
///
/// Writes `['n'][frame_type][len][payload]` into `out_buf` and returns the
/// total number of bytes written.
pub fn encode_frame(frame_type: u8, payload: &[u8], out_buf: &mut [u8]) -> Option<usize> {
    let total = 3 + payload.len();
    if payload.is_empty() || payload.len() > MAX_PAYLOAD || total > out_buf.len() {
        return None;
    }
    out_buf[0] = FRAME_MARKER;
    out_buf[1] = frame_type;
    out_buf[2] = payload.len() as u8;
    out_buf[3..total].copy_from_slice(payload);
    Some(total)
}
