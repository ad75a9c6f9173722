/// Pipeline tuning knobs. Transport address and speed belong to whoever builds the
/// [`crate::Transport`]; nothing here is read from disk or the environment.
use crate::{Error, NFResult};

/// NMEA 0183 upper bound for one sentence, `$` through `\r\n`.
pub const DEFAULT_MAX_FRAME_LEN: usize = 82;

/// Bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64;

/// Fixes held for a slow consumer before the oldest is dropped. Fixes arrive at ~1 Hz.
pub const DEFAULT_QUEUE_CAPACITY: usize = 8;

/// Smallest frame that can hold a start marker, a tag, a checksum and the delimiter.
const MIN_FRAME_LEN: usize = 11;

/// How a two-digit RMC year is placed in a century.
///
/// The wire carries no century, so any choice is an assumption. [`YearAnchor::Pivot`] with 69
/// follows the POSIX `%y` convention (69..=99 -> 19YY, 00..=68 -> 20YY).
/// `YearAnchor::Century(2000)` reads every year as 2000+YY.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum YearAnchor {
    Pivot(u8),
    Century(u16),
}

impl Default for YearAnchor {
    fn default() -> Self {
        YearAnchor::Pivot(69)
    }
}

impl YearAnchor {
    pub fn resolve(&self, yy: u8) -> i32 {
        match *self {
            YearAnchor::Pivot(pivot) if yy >= pivot => 1900 + yy as i32,
            YearAnchor::Pivot(_) => 2000 + yy as i32,
            YearAnchor::Century(base) => base as i32 + yy as i32,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Longest frame accepted, delimiter included. Longer lines are reported as
    /// [`Error::FrameTooLarge`] and discarded.
    pub max_frame_len: usize,
    pub read_chunk_size: usize,
    pub queue_capacity: usize,
    pub year_anchor: YearAnchor,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            year_anchor: YearAnchor::default(),
        }
    }
}

impl StreamConfig {
    pub fn with_max_frame_len(mut self, max_frame_len: usize) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: usize) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_year_anchor(mut self, year_anchor: YearAnchor) -> Self {
        self.year_anchor = year_anchor;
        self
    }

    pub fn validate(&self) -> NFResult<()> {
        if self.max_frame_len < MIN_FRAME_LEN {
            return Err(Error::Config(format!(
                "max_frame_len {} is below {MIN_FRAME_LEN}",
                self.max_frame_len
            )));
        }
        if self.read_chunk_size == 0 {
            return Err(Error::Config("read_chunk_size must be non-zero".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be non-zero".into()));
        }
        if let YearAnchor::Pivot(pivot) = self.year_anchor {
            if pivot > 100 {
                return Err(Error::Config(format!("year pivot {pivot} is above 100")));
            }
        }
        Ok(())
    }
}
