/// Line reassembly: arbitrary byte chunks in, `\r\n`-terminated sentence text out.
use tracing::{trace, warn};

use crate::protocol::nmea::START_MARKER;

pub const DELIMITER: &[u8; 2] = b"\r\n";

const START: u8 = START_MARKER as u8;

/// One unit handed out by [`FrameAssembler::drain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text of one line, delimiter stripped. Invalid UTF-8 is replaced, which the checksum then
    /// rejects.
    Sentence(String),
    /// Bytes thrown away because no delimiter showed up within the frame limit.
    TooLarge { discarded: usize },
}

/// Owns the only mutable buffer in the pipeline.
///
/// Bytes are kept in arrival order and only the delimiter is ever removed from between frames.
/// The buffer never holds more than `max_len` bytes without a delimiter: once it does, it is
/// cut back to the last `$` (or emptied if that would not help) and a [`Frame::TooLarge`] is
/// queued for the next drain. After an emptying cut, input is skipped up to the next `$`.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: Vec<u8>,
    max_len: usize,
    overflowed: usize,
    resync: bool,
}

impl FrameAssembler {
    /// `max_len` is the longest frame accepted, delimiter included.
    pub fn new(max_len: usize) -> Self {
        Self {
            buf: Vec::with_capacity(max_len),
            max_len,
            overflowed: 0,
            resync: false,
        }
    }

    pub fn append(&mut self, chunk: &[u8]) {
        let chunk = if self.resync {
            self.skip_to_start(chunk)
        } else {
            chunk
        };
        self.buf.extend_from_slice(chunk);
        if self.find_delimiter().is_none() && self.buf.len() >= self.max_len {
            self.discard_overflow();
        }
    }

    /// Complete frames found since the last drain, in arrival order. A trailing partial line
    /// stays buffered for the next [`FrameAssembler::append`].
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { assembler: self }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Bytes currently waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop everything before the last start marker, or everything if the marker is at the
    /// front or what follows it is already too long.
    fn discard_overflow(&mut self) {
        let len = self.buf.len();
        let keep_from = self
            .buf
            .iter()
            .rposition(|&b| b == START)
            .filter(|&pos| pos > 0 && len - pos < self.max_len);
        let discarded = keep_from.unwrap_or(len);
        warn!(
            "no delimiter within {} bytes, discarding {} of {} buffered bytes",
            self.max_len, discarded, len
        );
        self.buf.drain(..discarded);
        self.overflowed += discarded;
        self.resync = keep_from.is_none();
    }

    fn skip_to_start<'c>(&mut self, chunk: &'c [u8]) -> &'c [u8] {
        match chunk.iter().position(|&b| b == START) {
            Some(pos) => {
                trace!("resynchronised after skipping {} bytes", pos);
                self.resync = false;
                &chunk[pos..]
            }
            None => &[],
        }
    }

    fn find_delimiter(&self) -> Option<usize> {
        self.buf.windows(DELIMITER.len()).position(|w| w == DELIMITER)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.overflowed > 0 {
            let discarded = std::mem::take(&mut self.overflowed);
            return Some(Frame::TooLarge { discarded });
        }
        let pos = self.find_delimiter()?;
        let frame_len = pos + DELIMITER.len();
        let line: Vec<u8> = self.buf.drain(..frame_len).take(pos).collect();
        if frame_len > self.max_len {
            warn!("{} byte frame exceeds limit of {}", frame_len, self.max_len);
            return Some(Frame::TooLarge {
                discarded: frame_len,
            });
        }
        let text = String::from_utf8_lossy(&line).into_owned();
        trace!("frame: {:?}", text);
        Some(Frame::Sentence(text))
    }
}

/// Lazy iterator over the frames currently buffered, see [`FrameAssembler::drain`].
pub struct Drain<'a> {
    assembler: &'a mut FrameAssembler,
}

impl Iterator for Drain<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        self.assembler.next_frame()
    }
}
