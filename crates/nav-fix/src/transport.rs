/// Byte sources feeding the pipeline.
///
/// The serial device (or socket, or file) is the caller's business; anything that can hand over
/// bytes with a bounded wait implements [`Transport`]. Resources are released by dropping the
/// transport.
use std::io::{ErrorKind, Read};

/// Outcome of one [`Transport::recv`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Recv {
    /// `n` bytes were written to the front of the buffer.
    Data(usize),
    /// Nothing arrived within the transport's read timeout.
    Timeout,
    /// End of stream.
    Closed,
}

pub trait Transport {
    /// Receive up to `buf.len()` bytes, blocking for at most the transport's own timeout.
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Recv>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Recv> {
        (**self).recv(buf)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Recv> {
        (**self).recv(buf)
    }
}

/// [`Transport`] over any [`Read`], e.g. a serial port opened with a read timeout.
///
/// `Ok(0)` is end of stream. `TimedOut`, `WouldBlock` and `Interrupted` are reported as
/// [`Recv::Timeout`] so the caller gets a chance to look at its cancel flag.
#[derive(Debug)]
pub struct ReadTransport<R> {
    inner: R,
}

impl<R: Read> ReadTransport<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Transport for ReadTransport<R> {
    fn recv(&mut self, buf: &mut [u8]) -> std::io::Result<Recv> {
        match self.inner.read(buf) {
            Ok(0) => Ok(Recv::Closed),
            Ok(n) => Ok(Recv::Data(n)),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) =>
            {
                Ok(Recv::Timeout)
            }
            Err(e) => Err(e),
        }
    }
}
