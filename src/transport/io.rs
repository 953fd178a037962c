//! Stream wrapper that reports the first byte of each response.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::trace::LifecycleObserver;

/// Any byte stream a connection can run over (plain TCP or TLS).
pub(crate) trait Io: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Io for T {}

/// One-shot slot for the observer waiting on the next response byte.
///
/// Pooled connections outlive a single request, so the observer is swapped
/// in right before each request is written and fired at most once.
#[derive(Clone, Default)]
pub(crate) struct FirstByteProbe {
    armed: Arc<Mutex<Option<Arc<dyn LifecycleObserver>>>>,
}

impl FirstByteProbe {
    pub(crate) fn arm(&self, observer: Arc<dyn LifecycleObserver>) {
        *self.slot() = Some(observer);
    }

    pub(crate) fn disarm(&self) {
        self.slot().take();
    }

    fn fire(&self) {
        // take under the lock, call outside it
        let observer = self.slot().take();
        if let Some(observer) = observer {
            observer.got_first_response_byte();
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<dyn LifecycleObserver>>> {
        self.armed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Passes reads and writes through, firing the probe when data arrives.
pub(crate) struct ObservedIo<S> {
    inner: S,
    probe: FirstByteProbe,
}

impl<S> ObservedIo<S> {
    pub(crate) fn new(inner: S, probe: FirstByteProbe) -> Self {
        Self { inner, probe }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for ObservedIo<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let polled = Pin::new(&mut this.inner).poll_read(cx, buf);
        if matches!(polled, Poll::Ready(Ok(()))) && buf.filled().len() > before {
            this.probe.fire();
        }
        polled
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for ObservedIo<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
