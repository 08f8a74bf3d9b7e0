//! Transfer completion rendezvous.
//!
//! The DMA engine reports completion through a callback, usually from
//! interrupt context. [`Completion`] turns that callback into something a
//! task can await with a bound. One-word state backed by an embassy-sync
//! [`Signal`]; no allocation, usable from a `static`.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Timer};

use crate::error::{Result, VideoError};

/// Invoked by a [`DmaEngine`](crate::dma::DmaEngine) when a transfer
/// finishes. Must not block.
pub trait TransferCallback {
    /// The transfer this callback was attached to has completed.
    fn transfer_complete(&self);
}

/// One-shot completion flag with a timed wait.
pub struct Completion<M: RawMutex> {
    signal: Signal<M, ()>,
}

impl<M: RawMutex> Completion<M> {
    /// New, not yet completed.
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Forget any earlier completion. Call before submitting the transfer
    /// whose completion will be awaited.
    pub fn reset(&self) {
        self.signal.reset();
    }

    /// Mark complete and wake the waiter, if any.
    pub fn complete(&self) {
        self.signal.signal(());
    }

    /// Whether a completion is pending and not yet consumed.
    pub fn is_complete(&self) -> bool {
        self.signal.signaled()
    }

    /// Wait for completion, at most `timeout`.
    ///
    /// Consumes the completion on success.
    ///
    /// # Errors
    ///
    /// [`VideoError::CaptureTimeout`] if nothing completed in time.
    pub async fn wait_timeout(&self, timeout: Duration) -> Result<()> {
        match select(self.signal.wait(), Timer::after(timeout)).await {
            Either::First(()) => Ok(()),
            Either::Second(()) => Err(VideoError::CaptureTimeout),
        }
    }
}

impl<M: RawMutex> Default for Completion<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: RawMutex> TransferCallback for Completion<M> {
    fn transfer_complete(&self) {
        self.complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;

    #[tokio::test]
    async fn completed_before_wait_returns_immediately() {
        let c: Completion<NoopRawMutex> = Completion::new();
        c.transfer_complete();
        assert!(c.is_complete());
        assert_eq!(c.wait_timeout(Duration::from_millis(10)).await, Ok(()));
        assert!(!c.is_complete());
    }

    #[tokio::test]
    async fn reset_discards_stale_completion() {
        let c: Completion<NoopRawMutex> = Completion::new();
        c.complete();
        c.reset();
        assert_eq!(
            c.wait_timeout(Duration::from_millis(10)).await,
            Err(VideoError::CaptureTimeout)
        );
    }
}
