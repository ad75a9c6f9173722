/// Runs a [`FixStream`] on its own thread and hands fixes over a bounded queue.
///
/// Overflow policy: when the consumer falls behind and the queue is full, the oldest queued fix
/// is dropped to make room for the newest. Fixes that survive keep their arrival order.
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{info, trace, warn};

use crate::{
    config::StreamConfig,
    fix::FixRecord,
    stream::{CancelToken, FixStream, StatsHandle, StreamStats},
    transport::Transport,
    Error, NFResult,
};

const THREAD_NAME: &str = "nav-fix";

/// Handle to a running pipeline thread. Dropping it cancels the pipeline and waits for the
/// thread, which takes at most one transport read timeout.
pub struct FixWorker {
    rx: Receiver<FixRecord>,
    cancel: CancelToken,
    stats: StatsHandle,
    dropped: Arc<AtomicU64>,
    handle: Option<JoinHandle<NFResult<StreamStats>>>,
}

/// Start a pipeline over `transport` on a new thread.
pub fn spawn<T>(transport: T, config: &StreamConfig) -> NFResult<FixWorker>
where
    T: Transport + Send + 'static,
{
    spawn_stream(FixStream::new(transport, config)?, config.queue_capacity)
}

/// Run an already built stream on a new thread, e.g. one with an event hook installed. The
/// stream's cancel token and counters are shared with the returned [`FixWorker`].
pub fn spawn_stream<T>(stream: FixStream<T>, queue_capacity: usize) -> NFResult<FixWorker>
where
    T: Transport + Send + 'static,
{
    if queue_capacity == 0 {
        return Err(Error::Config("queue_capacity must be non-zero".into()));
    }
    let cancel = stream.cancel_token();
    let stats = stream.stats_handle();
    let (tx, rx) = bounded::<FixRecord>(queue_capacity);
    let spill = rx.clone();
    let dropped = Arc::new(AtomicU64::new(0));

    let worker_dropped = dropped.clone();
    let handle = thread::Builder::new()
        .name(THREAD_NAME.into())
        .spawn(move || run(stream, tx, spill, worker_dropped))
        .map_err(|e| Error::Worker(format!("failed to spawn {THREAD_NAME} thread: {e}")))?;
    info!("{} worker started", THREAD_NAME);

    Ok(FixWorker {
        rx,
        cancel,
        stats,
        dropped,
        handle: Some(handle),
    })
}

fn run<T: Transport>(
    mut stream: FixStream<T>,
    tx: Sender<FixRecord>,
    spill: Receiver<FixRecord>,
    dropped: Arc<AtomicU64>,
) -> NFResult<StreamStats> {
    for fix in stream.by_ref() {
        push_drop_oldest(&tx, &spill, fix?, &dropped);
    }
    info!("{} worker finished", THREAD_NAME);
    Ok(stream.stats())
}

fn push_drop_oldest(
    tx: &Sender<FixRecord>,
    spill: &Receiver<FixRecord>,
    mut fix: FixRecord,
    dropped: &AtomicU64,
) {
    loop {
        match tx.try_send(fix) {
            Ok(()) => return,
            Err(TrySendError::Full(back)) => {
                if spill.try_recv().is_ok() {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!("fix queue full, dropped oldest fix ({} so far)", total);
                }
                fix = back;
            }
            // We hold a receiver ourselves, so this only happens if the queue is torn down.
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
}

impl FixWorker {
    /// Next fix in arrival order. `None` once the pipeline has stopped and the queue is empty.
    pub fn recv(&self) -> Option<FixRecord> {
        self.rx.recv().ok()
    }

    /// Like [`FixWorker::recv`], giving up after `timeout`. `None` covers both timeout and
    /// end; check [`FixWorker::is_finished`] to tell them apart.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<FixRecord> {
        match self.rx.recv_timeout(timeout) {
            Ok(fix) => Some(fix),
            Err(RecvTimeoutError::Timeout) => {
                trace!("no fix within {} ms", timeout.as_millis());
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// The pipeline thread has stopped. Fixes may still be queued.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Blocking iterator over fixes until the pipeline stops.
    pub fn iter(&self) -> impl Iterator<Item = FixRecord> + '_ {
        self.rx.iter()
    }

    /// Counters of the running pipeline, including frames dropped before decoding.
    pub fn stats(&self) -> StreamStats {
        self.stats.snapshot()
    }

    /// Fixes discarded by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the pipeline to stop on its own (end of stream or transport error) and return
    /// its counters. Call [`FixWorker::cancel`] first to stop a live stream.
    pub fn join(mut self) -> NFResult<StreamStats> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Worker(format!("{THREAD_NAME} thread panicked")))?,
            None => Err(Error::Worker("already joined".into())),
        }
    }
}

impl Drop for FixWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.cancel();
            if handle.join().is_err() {
                warn!("{} thread panicked", THREAD_NAME);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        lazy_init_tracing,
        stream::test::{rmc_at, Chunk, ChunkTransport, RMC},
    };
    use std::{io::ErrorKind, sync::Mutex};

    fn wire(times: impl IntoIterator<Item = u32>) -> String {
        times
            .into_iter()
            .map(|sec| format!("{}\r\n", rmc_at(&format!("1237{:02}", sec))))
            .collect()
    }

    fn seconds(fixes: &[FixRecord]) -> Vec<u32> {
        use chrono::Timelike;
        fixes
            .iter()
            .map(|f| f.timestamp().unwrap().second())
            .collect()
    }

    #[test]
    fn test_worker_delivers_in_order() {
        lazy_init_tracing();
        let (t, released) = ChunkTransport::of_text(&[&wire(0..5)]);
        let worker = spawn(t, &StreamConfig::default()).unwrap();
        let fixes: Vec<FixRecord> = worker.iter().collect();
        assert_eq!(seconds(&fixes), vec![0, 1, 2, 3, 4]);
        let stats = worker.join().unwrap();
        assert_eq!(stats.fixes, 5);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_slow_consumer_drops_oldest() {
        lazy_init_tracing();
        let (t, _) = ChunkTransport::of_text(&[&wire(0..10)]);
        let cfg = StreamConfig::default()
            .with_queue_capacity(3)
            .with_read_chunk_size(1024);
        let worker = spawn(t, &cfg).unwrap();

        // Let the producer finish before reading anything.
        while !worker.is_finished() {
            thread::sleep(Duration::from_millis(1));
        }
        let fixes: Vec<FixRecord> = worker.iter().collect();
        assert_eq!(seconds(&fixes), vec![7, 8, 9]);
        assert_eq!(worker.dropped(), 7);
        assert_eq!(worker.join().unwrap().fixes, 10);
    }

    #[test]
    fn test_worker_reports_transport_error() {
        lazy_init_tracing();
        let (t, released) = ChunkTransport::new(vec![
            Chunk::Bytes(format!("{RMC}\r\n").into_bytes()),
            Chunk::Fail(ErrorKind::ConnectionReset),
        ]);
        let worker = spawn(t, &StreamConfig::default()).unwrap();
        assert!(worker.recv().is_some());
        assert!(worker.recv().is_none());
        assert!(matches!(worker.join(), Err(Error::Transport(_))));
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_stops_idle_worker() {
        lazy_init_tracing();
        let (t, released) = ChunkTransport::of_text(&[&wire(0..2)]);
        let worker = spawn(t.idle_when_done(), &StreamConfig::default()).unwrap();
        assert!(worker.recv_timeout(Duration::from_secs(5)).is_some());
        assert!(worker.recv_timeout(Duration::from_secs(5)).is_some());
        assert_eq!(worker.recv_timeout(Duration::from_millis(20)), None);
        assert!(!worker.is_finished());
        worker.cancel();
        assert_eq!(worker.recv_timeout(Duration::from_secs(5)), None);
        assert_eq!(worker.join().unwrap().fixes, 2);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_drop_cancels_worker() {
        lazy_init_tracing();
        let (t, released) = ChunkTransport::new(vec![]);
        let worker = spawn(t.idle_when_done(), &StreamConfig::default()).unwrap();
        drop(worker);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stats_visible_while_running() {
        lazy_init_tracing();
        let garbage = format!("{}\r\n", "X".repeat(200));
        let (t, _) = ChunkTransport::of_text(&[&garbage, &format!("{RMC}\r\n")]);
        let worker = spawn(t.idle_when_done(), &StreamConfig::default()).unwrap();
        assert!(worker.recv_timeout(Duration::from_secs(5)).is_some());
        let stats = worker.stats();
        assert!(!worker.is_finished());
        assert_eq!(stats.frames_too_large, 1);
        assert_eq!(stats.fixes, 1);
        worker.cancel();
        assert_eq!(worker.join().unwrap(), stats);
    }

    #[test]
    fn test_spawn_stream_keeps_event_hook() {
        lazy_init_tracing();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let broken = RMC.replace('*', "");
        let (t, _) = ChunkTransport::of_text(&[&format!("{broken}\r\n{RMC}\r\n")]);
        let stream = FixStream::new(t, &StreamConfig::default())
            .unwrap()
            .with_event_hook(move |e| sink.lock().unwrap().push(e.to_string()));
        let worker = spawn_stream(stream, 4).unwrap();
        assert_eq!(worker.iter().count(), 1);
        assert_eq!(worker.join().unwrap().rejected, 1);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["Sentence rejected: expected exactly one '*' checksum delimiter".to_string()]
        );
    }

    #[test]
    fn test_spawn_rejects_bad_config() {
        let (t, _) = ChunkTransport::new(vec![]);
        let cfg = StreamConfig::default().with_queue_capacity(0);
        assert!(matches!(spawn(t, &cfg), Err(Error::Config(_))));
    }
}
