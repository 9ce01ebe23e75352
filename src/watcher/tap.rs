//! Line scanner for the watcher's diagnostic stream.

use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::Sender;
use tokio::time::Instant;

use crate::supervisor::SupervisorEvent;

/// Substring confd logs after it rewrites a managed target.
pub const CHANGE_MARKER: &str = " has been updated";

/// Whether a watcher log line reports a completed configuration update.
#[must_use]
pub fn is_change_marker(line: &str) -> bool {
    line.contains(CHANGE_MARKER)
}

/// A configuration update observed on the watcher's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    detected_at: Instant,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(detected_at: Instant) -> Self {
        Self { detected_at }
    }

    /// An event detected right now.
    #[must_use]
    pub fn now() -> Self {
        Self::new(Instant::now())
    }

    #[must_use]
    pub fn detected_at(&self) -> Instant {
        self.detected_at
    }
}

/// Reads the watcher's stderr line by line.
///
/// Every line is copied verbatim to `relay`. Lines matching
/// [`is_change_marker`] additionally produce a [`ChangeEvent`]. The sequence
/// ends when the stream reaches EOF or a read fails.
#[derive(Debug)]
pub struct NotificationTap<R, W> {
    reader: BufReader<R>,
    relay: W,
    lines: usize,
}

impl<R, W> NotificationTap<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    #[must_use]
    pub fn new(reader: R, relay: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            relay,
            lines: 0,
        }
    }

    /// Lines read so far.
    #[must_use]
    pub fn lines_read(&self) -> usize {
        self.lines
    }

    /// Turn the tap into a lazy stream of change events.
    pub fn into_stream(self) -> impl futures_core::Stream<Item = ChangeEvent> {
        futures_util::stream::unfold(self, |mut tap| async move {
            let event = tap.next_change().await?;
            Some((event, tap))
        })
    }

    /// Pump change events into the supervisor inbox until the stream ends.
    ///
    /// Returns the number of events delivered.
    pub async fn forward(self, inbox: &Sender<SupervisorEvent>) -> usize {
        let stream = self.into_stream();
        tokio::pin!(stream);

        let mut delivered = 0;
        while let Some(event) = stream.next().await {
            if inbox.send(SupervisorEvent::Changed(event)).await.is_err() {
                tracing::debug!("Inbox closed, dropping watcher change events");
                break;
            }
            delivered += 1;
        }
        delivered
    }

    /// Read until the next change marker, relaying everything on the way.
    async fn next_change(&mut self) -> Option<ChangeEvent> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf).await {
                Ok(0) => return None,
                Ok(_) => {
                    self.lines += 1;
                    self.relay_line(&buf).await;
                    let line = String::from_utf8_lossy(&buf);
                    if is_change_marker(line.trim_end_matches(['\n', '\r'])) {
                        return Some(ChangeEvent::now());
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read watcher output");
                    return None;
                }
            }
        }
    }

    async fn relay_line(&mut self, line: &[u8]) {
        let result = async {
            self.relay.write_all(line).await?;
            if !line.ends_with(b"\n") {
                self.relay.write_all(b"\n").await?;
            }
            self.relay.flush().await
        }
        .await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "Failed to relay watcher output");
        }
    }
}
