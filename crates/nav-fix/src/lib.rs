/// GNSS receiver front-end: NMEA 0183 byte stream in, navigation fixes out.
///
/// Bytes from a [`transport::Transport`] are reassembled into sentences by
/// [`frame::FrameAssembler`], checked by [`protocol::nmea::validate`], decoded by
/// [`protocol::decode`] and turned into [`fix::FixRecord`] values. [`stream::FixStream`] runs
/// that pipeline as a lazy iterator; [`worker::spawn`] runs it on its own thread behind a
/// bounded queue.
///
/// Every parsing fault is local: the offending frame is dropped and the pipeline resynchronises
/// at the next line delimiter. Only transport failures and cancellation end a stream.
use std::sync::Once;

use thiserror::Error;

pub mod config;
pub mod coord;
pub mod fix;
pub mod frame;
pub mod protocol;
pub mod stream;
pub mod transport;
pub mod worker;

pub use config::{StreamConfig, YearAnchor};
pub use fix::FixRecord;
pub use stream::{CancelToken, EventHook, FixStream, StatsHandle, StreamStats};
pub use transport::{ReadTransport, Recv, Transport};
pub use worker::{spawn, spawn_stream, FixWorker};

use protocol::nmea::Reject;

/// Result type for this library
pub type NFResult<T> = std::result::Result<T, Error>;

/// Error type for this library
#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),
    #[error("Frame exceeded {limit} bytes without a line delimiter")]
    FrameTooLarge { limit: usize },
    #[error("Sentence rejected: {0}")]
    Rejected(#[from] Reject),
    #[error("Decode error in {sentence_type} field {field}")]
    Decode { sentence_type: String, field: usize },
    #[error("Invalid coordinate: {0}")]
    InvalidCoord(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Worker error: {0}")]
    Worker(String),
}

impl Error {
    pub(crate) fn decode(sentence_type: &str, field: usize) -> Self {
        Error::Decode {
            sentence_type: sentence_type.to_string(),
            field,
        }
    }

    /// Fatal errors end the stream; everything else only costs the current frame.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Worker(_))
    }
}

/// Test binary helper to init tracing. This is usually the responsibility of the consumer of the
/// library crate.
pub fn lazy_init_tracing() {
    {
        static INIT: Once = Once::new();
        &INIT
    }
    .call_once(|| {
        tracing_subscriber::fmt::init();
    });
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fatal_kinds() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        assert!(Error::from(io).is_fatal());
        assert!(Error::Worker("panicked".into()).is_fatal());
        assert!(!Error::FrameTooLarge { limit: 82 }.is_fatal());
        assert!(!Error::from(Reject::NoStartMarker).is_fatal());
        assert!(!Error::decode("GPRMC", 8).is_fatal());
    }

    #[test]
    fn test_decode_error_display() {
        let err = Error::decode("GPRMC", 2);
        assert_eq!(err.to_string(), "Decode error in GPRMC field 2");
    }
}
