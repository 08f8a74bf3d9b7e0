//! Error taxonomy for the display pipeline.
//!
//! Register writes are fire-and-forget and have no error path: a failed MMIO
//! write shows up as a blank or wrong picture, never as a [`VideoError`].

/// Errors reported by clock synthesis, descriptor construction, power
/// transitions and capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VideoError {
    /// Divider or multiplier outside the range the PLL supports.
    ///
    /// Always a programming or configuration error; never retried.
    InvalidParameter,
    /// Scan window exceeds the stride or the addressable line size.
    InvalidGeometry,
    /// No divider/multiplier combination lands within tolerance of the
    /// requested pixel clock. The mode should be rejected.
    ClockUnsynthesizable,
    /// The DMA engine could not prepare a descriptor (resource exhaustion).
    ///
    /// Transient: callers may retry after a backoff.
    EngineExhausted,
    /// The DMA engine refused to queue a prepared transfer.
    SubmitRejected,
    /// Capture completion was not signalled within the timeout.
    ///
    /// Buffer contents for that pass are undefined and must be discarded.
    CaptureTimeout,
    /// A capture session is already open.
    Busy,
    /// Operation not valid in the current state (no mode set, capture read
    /// without a populated pass, backwards seek).
    InvalidState,
}

impl VideoError {
    /// Short static description, usable from defmt and tracing alike.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidParameter => "divider or multiplier out of range",
            Self::InvalidGeometry => "scan window exceeds stride or addressable bounds",
            Self::ClockUnsynthesizable => "pixel clock cannot be synthesized within tolerance",
            Self::EngineExhausted => "DMA descriptor preparation failed",
            Self::SubmitRejected => "DMA engine rejected the transfer",
            Self::CaptureTimeout => "capture did not complete in time",
            Self::Busy => "capture session already open",
            Self::InvalidState => "operation invalid in current state",
        }
    }

    /// Whether the caller may reasonably retry the same operation later.
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::EngineExhausted | Self::CaptureTimeout | Self::Busy)
    }
}

#[cfg(any(test, feature = "std"))]
impl std::error::Error for VideoError {}

impl core::fmt::Display for VideoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl embedded_io::Error for VideoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        use embedded_io::ErrorKind;
        match self {
            Self::InvalidParameter | Self::InvalidGeometry | Self::ClockUnsynthesizable => {
                ErrorKind::InvalidInput
            }
            Self::EngineExhausted => ErrorKind::OutOfMemory,
            Self::SubmitRejected => ErrorKind::Other,
            Self::CaptureTimeout => ErrorKind::TimedOut,
            Self::Busy => ErrorKind::AddrInUse,
            Self::InvalidState => ErrorKind::Unsupported,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, VideoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::Error as _;

    #[test]
    fn display_uses_static_description() {
        assert_eq!(
            VideoError::CaptureTimeout.to_string(),
            "capture did not complete in time"
        );
    }

    #[test]
    fn timeout_maps_to_timed_out_kind() {
        assert_eq!(
            VideoError::CaptureTimeout.kind(),
            embedded_io::ErrorKind::TimedOut
        );
        assert_eq!(VideoError::Busy.kind(), embedded_io::ErrorKind::AddrInUse);
    }

    #[test]
    fn retryable_errors_are_transient() {
        assert!(VideoError::EngineExhausted.is_transient());
        assert!(!VideoError::InvalidParameter.is_transient());
        assert!(!VideoError::InvalidGeometry.is_transient());
    }
}
