/// The sequential pipeline: transport -> frames -> sentences -> fixes.
///
/// Only the transport read may block. Frames already buffered are always processed before the
/// next read, and the cancel flag is checked right before every read, so cancelling never cuts
/// a buffered frame in half.
use std::{
    iter::FusedIterator,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tracing::{debug, info, trace, warn};

use crate::{
    config::{StreamConfig, YearAnchor},
    fix::FixRecord,
    frame::{Frame, FrameAssembler},
    protocol::{self, nmea::validate, NavMessage},
    transport::{Recv, Transport},
    Error, NFResult,
};

/// Shared stop flag for a [`FixStream`] or [`crate::FixWorker`].
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Snapshot of per-stream counters. Every frame lands in exactly one of `frames_too_large`,
/// `rejected`, `decode_errors`, `ignored` or `fixes`; `frames` counts the ones that reached
/// validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: u64,
    pub fixes: u64,
    pub frames_too_large: u64,
    pub rejected: u64,
    pub decode_errors: u64,
    pub ignored: u64,
}

#[derive(Debug, Default)]
struct Counters {
    frames: AtomicU64,
    fixes: AtomicU64,
    frames_too_large: AtomicU64,
    rejected: AtomicU64,
    decode_errors: AtomicU64,
    ignored: AtomicU64,
}

/// Live view of a stream's counters, readable from any thread while the stream runs.
#[derive(Debug, Clone, Default)]
pub struct StatsHandle(Arc<Counters>);

impl StatsHandle {
    pub fn snapshot(&self) -> StreamStats {
        let c = &self.0;
        StreamStats {
            frames: c.frames.load(Ordering::Relaxed),
            fixes: c.fixes.load(Ordering::Relaxed),
            frames_too_large: c.frames_too_large.load(Ordering::Relaxed),
            rejected: c.rejected.load(Ordering::Relaxed),
            decode_errors: c.decode_errors.load(Ordering::Relaxed),
            ignored: c.ignored.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Callback for non-fatal frame events, see [`FixStream::with_event_hook`].
pub type EventHook = Box<dyn FnMut(&Error) + Send>;

/// Lazy sequence of [`FixRecord`]s read from an owned transport.
///
/// Iteration ends when the transport closes, fails (yielding one `Err(Error::Transport)`), or
/// the [`CancelToken`] fires. The transport is dropped at that point. To start over, open a
/// new transport and build a new stream.
///
/// Frames that are dropped along the way (oversize, rejected, undecodable) never end the
/// stream. They are counted in [`FixStream::stats`] and passed to the event hook, if any.
pub struct FixStream<T: Transport> {
    transport: Option<T>,
    assembler: FrameAssembler,
    read_buf: Vec<u8>,
    year_anchor: YearAnchor,
    cancel: CancelToken,
    stats: StatsHandle,
    on_event: Option<EventHook>,
}

enum Step {
    Fix(FixRecord),
    Timeout,
    End,
}

impl<T: Transport> FixStream<T> {
    pub fn new(transport: T, config: &StreamConfig) -> NFResult<Self> {
        config.validate()?;
        info!(
            "opening fix stream: max frame {} bytes, read chunk {} bytes",
            config.max_frame_len, config.read_chunk_size
        );
        Ok(Self {
            transport: Some(transport),
            assembler: FrameAssembler::new(config.max_frame_len),
            read_buf: vec![0; config.read_chunk_size],
            year_anchor: config.year_anchor,
            cancel: CancelToken::new(),
            stats: StatsHandle::default(),
            on_event: None,
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Call `hook` with each non-fatal frame event as it happens: [`Error::FrameTooLarge`],
    /// [`Error::Rejected`] or [`Error::Decode`]. Fatal transport errors come out of the
    /// iterator instead.
    pub fn with_event_hook(mut self, hook: impl FnMut(&Error) + Send + 'static) -> Self {
        self.on_event = Some(Box::new(hook));
        self
    }

    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    pub fn stats_handle(&self) -> StatsHandle {
        self.stats.clone()
    }

    /// False once the transport has been released.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Block until the next fix, the end of the stream, or `timeout`. `Ok(None)` covers both
    /// timeout and end; check [`FixStream::is_open`] to tell them apart.
    pub fn next_fix_timeout(&mut self, timeout: Duration) -> NFResult<Option<FixRecord>> {
        match self.step(Some(Instant::now() + timeout))? {
            Step::Fix(fix) => Ok(Some(fix)),
            Step::Timeout | Step::End => Ok(None),
        }
    }

    fn step(&mut self, deadline: Option<Instant>) -> NFResult<Step> {
        loop {
            while let Some(frame) = self.next_buffered_frame() {
                if let Some(fix) = self.process(frame) {
                    return Ok(Step::Fix(fix));
                }
            }

            if self.transport.is_none() {
                return Ok(Step::End);
            }
            if self.cancel.is_cancelled() {
                info!("fix stream cancelled");
                self.close();
                return Ok(Step::End);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(Step::Timeout);
            }

            let Some(transport) = self.transport.as_mut() else {
                return Ok(Step::End);
            };
            match transport.recv(&mut self.read_buf) {
                Ok(Recv::Data(n)) => {
                    let n = n.min(self.read_buf.len());
                    trace!("received {} bytes", n);
                    self.assembler.append(&self.read_buf[..n]);
                }
                Ok(Recv::Timeout) => trace!("transport read timed out"),
                Ok(Recv::Closed) => {
                    info!("transport closed");
                    self.close();
                }
                Err(e) => {
                    warn!("transport error: {}", e);
                    self.close();
                    return Err(Error::Transport(e));
                }
            }
        }
    }

    fn next_buffered_frame(&mut self) -> Option<Frame> {
        self.assembler.drain().next()
    }

    fn process(&mut self, frame: Frame) -> Option<FixRecord> {
        let text = match frame {
            Frame::Sentence(text) => text,
            Frame::TooLarge { discarded } => {
                bump(&self.stats.0.frames_too_large);
                let err = Error::FrameTooLarge {
                    limit: self.assembler.max_len(),
                };
                warn!("{}, {} bytes discarded", err, discarded);
                self.report(err);
                return None;
            }
        };
        bump(&self.stats.0.frames);

        let sentence = match validate(&text) {
            Ok(sentence) => sentence,
            Err(reject) => {
                bump(&self.stats.0.rejected);
                debug!("dropping {:?}: {}", text, reject);
                self.report(reject.into());
                return None;
            }
        };
        match protocol::decode(&sentence, self.year_anchor) {
            Ok(Some(NavMessage::Rmc(rmc))) => {
                bump(&self.stats.0.fixes);
                let fix = FixRecord::from(rmc);
                trace!("fix: {:?}", fix);
                Some(fix)
            }
            Ok(None) => {
                bump(&self.stats.0.ignored);
                trace!("skipping {}", sentence.tag);
                None
            }
            Err(e) => {
                bump(&self.stats.0.decode_errors);
                debug!("dropping {:?}: {}", sentence.raw, e);
                self.report(e);
                None
            }
        }
    }

    fn report(&mut self, event: Error) {
        if let Some(hook) = self.on_event.as_mut() {
            hook(&event);
        }
    }

    fn close(&mut self) {
        if let Some(transport) = self.transport.take() {
            drop(transport);
            if self.assembler.pending() > 0 {
                debug!(
                    "discarding {} bytes of unterminated frame",
                    self.assembler.pending()
                );
            }
            info!("transport released, {:?}", self.stats());
        }
    }
}

impl<T: Transport> Iterator for FixStream<T> {
    type Item = NFResult<FixRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step(None) {
            Ok(Step::Fix(fix)) => Some(Ok(fix)),
            Ok(Step::Timeout) | Ok(Step::End) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<T: Transport> FusedIterator for FixStream<T> {}
