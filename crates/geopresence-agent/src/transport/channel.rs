use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;

use geopresence_core::error::{GeoPresenceError, Result};

/// Raw frames of one subscription, in arrival order. An `Err` item is a
/// transport failure and is always the last item.
pub type FrameStream = BoxStream<'static, Result<Bytes>>;

pub trait TransportChannel: Send {
    fn subscribe(&mut self, channel: &str) -> Result<FrameStream>;
}

fn already_subscribed() -> GeoPresenceError {
    GeoPresenceError::Internal("transport already subscribed".into())
}

/// Frames pushed through an mpsc channel. Dropping every sender ends the
/// connection.
pub struct ChannelTransport {
    rx: Option<mpsc::Receiver<Bytes>>,
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (mpsc::Sender<Bytes>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx: Some(rx) })
    }
}

impl TransportChannel for ChannelTransport {
    fn subscribe(&mut self, channel: &str) -> Result<FrameStream> {
        let rx = self.rx.take().ok_or_else(already_subscribed)?;
        tracing::debug!(%channel, "subscribed");
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|frame| (Ok(frame), rx))
        })
        .boxed())
    }
}

/// Newline-delimited JSON frames read from any async reader (stdin in the
/// binary, typically piped from a bridge to the hosted presence service).
pub struct LineTransport<R> {
    reader: Option<R>,
}

impl<R> LineTransport<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader: Some(reader),
        }
    }
}

impl<R> TransportChannel for LineTransport<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn subscribe(&mut self, channel: &str) -> Result<FrameStream> {
        let reader = self.reader.take().ok_or_else(already_subscribed)?;
        tracing::debug!(%channel, "subscribed");
        let reader = BufReader::new(reader);
        Ok(stream::unfold(Some(reader), |state| async move {
            let mut reader = state?;
            loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line).await {
                    Ok(0) => return None,
                    Ok(_) => {
                        // bytes are passed through untouched; bad UTF-8 fails in the decoder
                        let frame = trim_ascii(&line);
                        if frame.is_empty() {
                            continue;
                        }
                        return Some((Ok(Bytes::copy_from_slice(frame)), Some(reader)));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "transport read failed");
                        let err = GeoPresenceError::Transport(format!("read failed: {e}"));
                        return Some((Err(err), None));
                    }
                }
            }
        })
        .boxed())
    }
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(line.len());
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &line[start..end]
}
