//! The stream type returned by [`super::Proxy::download`] /
//! [`super::Proxy::download_range`].
//!
//! Decryption happens in a background task writing into one end of a
//! `tokio::io::duplex` pipe; [`DownloadStream`] wraps the other end. A
//! decrypt or remote-I/O failure in the background task is forwarded
//! through a side-channel oneshot so the reader observes it "on next
//! read" rather than a silent early EOF (§4.1, §5).

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, DuplexStream, ReadBuf};
use tokio::sync::oneshot;

use crate::error::GatewayError;

pub struct DownloadStream {
    pipe: DuplexStream,
    error: oneshot::Receiver<GatewayError>,
    failed: bool,
}

impl DownloadStream {
    pub(crate) fn new(pipe: DuplexStream, error: oneshot::Receiver<GatewayError>) -> Self {
        DownloadStream { pipe, error, failed: false }
    }

    /// A stream that is immediately at EOF, with no background task
    /// behind it — used for zero-length downloads.
    pub(crate) fn empty() -> Self {
        let (_write, read) = tokio::io::duplex(1);
        let (_tx, rx) = oneshot::channel();
        DownloadStream { pipe: read, error: rx, failed: false }
    }
}

impl AsyncRead for DownloadStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        if self.failed {
            return Poll::Ready(Err(std::io::Error::other("decryption failed")));
        }
        let before = buf.filled().len();
        match Pin::new(&mut self.pipe).poll_read(cx, buf) {
            Poll::Ready(Ok(())) if buf.filled().len() == before => {
                if let Ok(err) = self.error.try_recv() {
                    self.failed = true;
                    return Poll::Ready(Err(std::io::Error::other(err.to_string())));
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}
