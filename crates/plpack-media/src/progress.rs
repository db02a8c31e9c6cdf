//! Progress reporting for item fetches.
//!
//! The fetch collaborator emits far more progress callbacks than any poller
//! could consume, so events travel over a small bounded channel and are
//! dropped when the consumer lags. The consumer side (the item worker)
//! coalesces whatever arrives into store writes.

use tokio::sync::mpsc;

/// Default channel capacity between a fetcher and its item worker.
const PROGRESS_BUFFER: usize = 32;

/// Progress event emitted while fetching one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchProgress {
    /// Media bytes are arriving; percent is 0-100
    Downloading { percent: u8 },

    /// Post-processing (audio extraction / remux) started
    Converting,
}

/// Sending half of a progress channel.
///
/// Cheap to clone; all sends are non-blocking.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<FetchProgress>,
}

impl ProgressSender {
    /// Send a progress event (non-blocking).
    pub fn send(&self, event: FetchProgress) {
        // Drop events when the channel is full; the consumer coalesces anyway
        let _ = self.tx.try_send(event);
    }

    /// Send a download-progress event.
    pub fn downloading(&self, percent: u8) {
        self.send(FetchProgress::Downloading {
            percent: percent.min(100),
        });
    }

    /// Send a conversion-started event.
    pub fn converting(&self) {
        self.send(FetchProgress::Converting);
    }
}

/// Receiving half of a progress channel.
pub struct ProgressReceiver {
    rx: mpsc::Receiver<FetchProgress>,
}

impl ProgressReceiver {
    /// Receive the next progress event.
    pub async fn recv(&mut self) -> Option<FetchProgress> {
        self.rx.recv().await
    }

    /// Try to receive a progress event without blocking.
    pub fn try_recv(&mut self) -> Option<FetchProgress> {
        self.rx.try_recv().ok()
    }
}

/// Create a progress channel pair.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
    (ProgressSender { tx }, ProgressReceiver { rx })
}

/// A no-op progress sender for when progress reporting is not needed.
pub fn noop_sender() -> ProgressSender {
    let (tx, _rx) = mpsc::channel(1);
    ProgressSender { tx }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel() {
        let (sender, mut receiver) = channel();

        sender.downloading(10);
        sender.converting();

        assert_eq!(
            receiver.recv().await,
            Some(FetchProgress::Downloading { percent: 10 })
        );
        assert_eq!(receiver.recv().await, Some(FetchProgress::Converting));
    }

    #[tokio::test]
    async fn test_percent_clamped() {
        let (sender, mut receiver) = channel();
        sender.downloading(250);
        assert_eq!(
            receiver.recv().await,
            Some(FetchProgress::Downloading { percent: 100 })
        );
    }

    #[test]
    fn test_noop_sender() {
        let sender = noop_sender();
        // Should not panic even though receiver is dropped
        sender.downloading(50);
        sender.converting();
    }

    #[tokio::test]
    async fn test_full_channel_drops_instead_of_blocking() {
        let (sender, mut receiver) = channel();
        for p in 0..200u32 {
            sender.downloading((p % 100) as u8);
        }
        // Channel holds at most PROGRESS_BUFFER events; the rest were dropped
        let mut drained = 0;
        while receiver.try_recv().is_some() {
            drained += 1;
        }
        assert!(drained <= PROGRESS_BUFFER);
    }
}
