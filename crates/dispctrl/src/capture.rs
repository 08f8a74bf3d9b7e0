//! Frame capture.
//!
//! Captures one frame from the video input into a fixed buffer and serves
//! it as a sequential byte stream. A read at offset 0 starts a new pass:
//! the inbound transfer is submitted and the reader waits (bounded) for
//! completion. Every later read is served from the buffer that pass
//! populated; nothing is re-triggered until the reader comes back to
//! offset 0.
//!
//! Only one session may be open at a time.
//!
//! ```ignore
//! let mut session = device.open()?;
//! let mut offset = 0;
//! loop {
//!     let chunk = session.read(offset, &mut buf).await?;
//!     if chunk.len == 0 {
//!         break;
//!     }
//!     sink.write_all(&buf[..chunk.len])?;
//!     offset = chunk.offset;
//! }
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Duration;
use embedded_graphics::geometry::Size;

use crate::completion::Completion;
use crate::dma::{
    DescriptorBuilder, DmaEngine, FramebufferView, PrepareFlags, TransferDirection,
};
use crate::error::{Result, VideoError};

/// Completion timeout for one capture pass.
pub const DEFAULT_CAPTURE_TIMEOUT_MS: u64 = 2_000;

/// Largest frame the capture path is sized for.
pub const MAX_FRAME_WIDTH: u32 = 1920;
/// Largest frame the capture path is sized for.
pub const MAX_FRAME_HEIGHT: u32 = 1080;
/// Capture pixel depth.
pub const DEFAULT_BITS_PER_PIXEL: u32 = 32;

/// Captured frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameGeometry {
    /// Pixels per line.
    pub width: u32,
    /// Lines.
    pub height: u32,
    /// Bits per pixel (whole bytes only).
    pub bits_per_pixel: u32,
}

impl FrameGeometry {
    /// Geometry from its three parts.
    pub const fn new(width: u32, height: u32, bits_per_pixel: u32) -> Self {
        Self {
            width,
            height,
            bits_per_pixel,
        }
    }

    /// `width · height · bits_per_pixel / 8`; `None` on overflow.
    pub fn frame_size(&self) -> Option<usize> {
        let bits = u64::from(self.width)
            .checked_mul(u64::from(self.height))?
            .checked_mul(u64::from(self.bits_per_pixel))?;
        usize::try_from(bits.checked_div(8)?).ok()
    }

    /// Frame size in pixels.
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Bytes per line; `None` for sub-byte formats.
    pub fn line_bytes(&self) -> Option<u32> {
        if self.bits_per_pixel % 8 != 0 {
            return None;
        }
        self.width.checked_mul(self.bits_per_pixel.checked_div(8)?)
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::new(MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT, DEFAULT_BITS_PER_PIXEL)
    }
}

/// Capture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureConfig {
    /// Frame dimensions.
    pub geometry: FrameGeometry,
    /// How long a pass may take before it is abandoned, in ms.
    pub timeout_ms: u64,
}

impl CaptureConfig {
    /// 1920×1080 at 32 bpp, 2 s timeout.
    pub const fn new() -> Self {
        Self {
            geometry: FrameGeometry::new(MAX_FRAME_WIDTH, MAX_FRAME_HEIGHT, DEFAULT_BITS_PER_PIXEL),
            timeout_ms: DEFAULT_CAPTURE_TIMEOUT_MS,
        }
    }

    /// Set the frame geometry.
    #[must_use]
    pub const fn with_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set the pass timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Pass timeout as a [`Duration`].
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Capture target memory: CPU view plus the bus address the DMA writes to.
pub struct CaptureBuffer<'b> {
    data: &'b mut [u8],
    phys: u64,
}

impl<'b> CaptureBuffer<'b> {
    /// Wrap a DMA-reachable buffer whose first byte sits at bus address
    /// `phys`.
    pub fn new(data: &'b mut [u8], phys: u64) -> Self {
        Self { data, phys }
    }

    /// Bus address.
    pub fn phys(&self) -> u64 {
        self.phys
    }

    /// Capacity in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer has no capacity.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of one [`CaptureSession::read`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadChunk {
    /// Bytes copied out; 0 means end of frame.
    pub len: usize,
    /// Offset to pass to the next read.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    /// No trustworthy frame in the buffer.
    Empty,
    /// Buffer holds a complete frame; `next` is where the last read ended.
    Populated { next: usize },
}

struct Inner<'b, E> {
    engine: E,
    buffer: CaptureBuffer<'b>,
    pass: Pass,
}

/// Capture controller for one video input channel.
///
/// Owns the inbound DMA channel and the capture buffer. The completion is
/// `'static` because the engine may call it from interrupt context.
pub struct CaptureDevice<'b, M: RawMutex + 'static, E: DmaEngine> {
    inner: Mutex<M, Inner<'b, E>>,
    completion: &'static Completion<M>,
    open: BlockingMutex<M, Cell<bool>>,
    config: CaptureConfig,
    builder: DescriptorBuilder,
    view: FramebufferView,
    frame_size: usize,
}

impl<'b, M: RawMutex + 'static, E: DmaEngine> CaptureDevice<'b, M, E> {
    /// Set up capture into `buffer`.
    ///
    /// # Errors
    ///
    /// [`VideoError::InvalidGeometry`] if the frame size overflows, the
    /// buffer is smaller than one frame, or the inbound descriptor cannot
    /// be built (see [`DescriptorBuilder::build_window`]).
    pub fn new(
        config: CaptureConfig,
        builder: DescriptorBuilder,
        engine: E,
        buffer: CaptureBuffer<'b>,
        completion: &'static Completion<M>,
    ) -> Result<Self> {
        let geometry = config.geometry;
        let frame_size = geometry.frame_size().ok_or(VideoError::InvalidGeometry)?;
        if buffer.len() < frame_size {
            return Err(VideoError::InvalidGeometry);
        }
        let pitch = geometry.line_bytes().ok_or(VideoError::InvalidGeometry)?;
        let view = FramebufferView::new(buffer.phys(), pitch, geometry.bits_per_pixel);
        builder.build_window(&view, geometry.size(), TransferDirection::DevToMem)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                engine,
                buffer,
                pass: Pass::Empty,
            }),
            completion,
            open: BlockingMutex::new(Cell::new(false)),
            config,
            builder,
            view,
            frame_size,
        })
    }

    /// Bytes in one captured frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Capture configuration.
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Whether a session is open.
    pub fn is_open(&self) -> bool {
        self.open.lock(Cell::get)
    }

    /// Run `f` with exclusive access to the DMA channel.
    ///
    /// Waits for any in-progress read to finish.
    pub async fn with_engine<T>(&self, f: impl FnOnce(&mut E) -> T) -> T {
        let mut inner = self.inner.lock().await;
        f(&mut inner.engine)
    }

    /// Open the single reader session.
    ///
    /// # Errors
    ///
    /// [`VideoError::Busy`] while another session is open.
    pub fn open(&self) -> Result<CaptureSession<'_, 'b, M, E>> {
        let acquired = self.open.lock(|open| {
            if open.get() {
                false
            } else {
                open.set(true);
                true
            }
        });
        if !acquired {
            return Err(VideoError::Busy);
        }
        debug!("capture: session opened");
        Ok(CaptureSession { device: self })
    }

    fn release(&self) {
        self.open.lock(|open| open.set(false));
        debug!("capture: session closed");
    }

    /// Capture one frame into the buffer.
    async fn run_pass(&self, inner: &mut Inner<'b, E>) -> Result<()> {
        inner.pass = Pass::Empty;

        let descriptor = self.builder.build_window(
            &self.view,
            self.config.geometry.size(),
            TransferDirection::DevToMem,
        )?;
        let Some(mut transfer) = inner
            .engine
            .prepare_interleaved(&descriptor, PrepareFlags::INTERRUPT)
        else {
            error!("capture: failed to prepare DMA descriptor");
            return Err(VideoError::EngineExhausted);
        };
        self.completion.reset();
        inner.engine.set_callback(&mut transfer, self.completion);
        inner
            .engine
            .submit(transfer)
            .map_err(|_| VideoError::SubmitRejected)?;
        debug!("capture: pass started ({} bytes)", self.frame_size);
        inner.engine.issue_pending();

        // Single shot: the channel stops whether the frame arrived, timed
        // out, or the read was dropped mid-wait.
        let channel = StopOnDrop(&mut inner.engine);
        let waited = self.completion.wait_timeout(self.config.timeout()).await;
        drop(channel);
        if let Err(e) = waited {
            warn!("capture: no completion after {} ms", self.config.timeout_ms);
            return Err(e);
        }

        debug!("capture: pass complete");
        inner.pass = Pass::Populated { next: 0 };
        Ok(())
    }
}

/// Terminates the inbound channel when dropped.
struct StopOnDrop<'a, E: DmaEngine>(&'a mut E);

impl<E: DmaEngine> Drop for StopOnDrop<'_, E> {
    fn drop(&mut self) {
        self.0.terminate_all();
    }
}

/// Exclusive reader of a [`CaptureDevice`]. Closing (or dropping) the
/// session lets the next one open.
pub struct CaptureSession<'d, 'b, M: RawMutex + 'static, E: DmaEngine> {
    device: &'d CaptureDevice<'b, M, E>,
}

impl<'d, 'b, M: RawMutex + 'static, E: DmaEngine> CaptureSession<'d, 'b, M, E> {
    /// Copy up to `out.len()` bytes of the frame starting at `offset`.
    ///
    /// `offset` is clamped to the frame; a read at or past the end returns
    /// `len == 0`. A read at offset 0 captures a fresh frame first; any
    /// other offset reads the frame captured by the current pass.
    ///
    /// # Errors
    ///
    /// - [`VideoError::CaptureTimeout`] when the pass did not complete; the
    ///   buffer is discarded and the next read must start at 0
    /// - [`VideoError::InvalidState`] for a non-zero offset without a
    ///   populated pass, or one behind where the previous read ended
    /// - [`VideoError::EngineExhausted`] / [`VideoError::SubmitRejected`]
    ///   from the DMA engine
    pub async fn read(&mut self, offset: usize, out: &mut [u8]) -> Result<ReadChunk> {
        let device = self.device;
        let start = offset.min(device.frame_size);
        let len = out.len().min(device.frame_size.saturating_sub(start));
        if len == 0 {
            return Ok(ReadChunk {
                len: 0,
                offset: start,
            });
        }

        let mut inner = device.inner.lock().await;
        if start == 0 {
            device.run_pass(&mut inner).await?;
        } else {
            match inner.pass {
                Pass::Populated { next } if start >= next => {}
                _ => return Err(VideoError::InvalidState),
            }
        }

        let end = start.checked_add(len).ok_or(VideoError::InvalidState)?;
        let src = inner
            .buffer
            .data
            .get(start..end)
            .ok_or(VideoError::InvalidState)?;
        out.get_mut(..len)
            .ok_or(VideoError::InvalidState)?
            .copy_from_slice(src);
        inner.pass = Pass::Populated { next: end };
        trace!("capture: read {} bytes at {}", len, start);

        Ok(ReadChunk { len, offset: end })
    }

    /// Bytes in one frame.
    pub fn frame_size(&self) -> usize {
        self.device.frame_size
    }

    /// Close the session.
    pub fn close(self) {}

    /// Wrap into a cursor-based byte stream starting at offset 0.
    pub fn into_stream(self) -> CaptureStream<'d, 'b, M, E> {
        CaptureStream {
            session: self,
            cursor: 0,
        }
    }
}

impl<M: RawMutex + 'static, E: DmaEngine> Drop for CaptureSession<'_, '_, M, E> {
    fn drop(&mut self) {
        self.device.release();
    }
}

/// A [`CaptureSession`] read sequentially through [`embedded_io_async::Read`].
///
/// The first read captures a frame; reads then walk the buffer until they
/// return 0 at the end of the frame. [`CaptureStream::rewind`] makes the
/// next read capture a new frame.
pub struct CaptureStream<'d, 'b, M: RawMutex + 'static, E: DmaEngine> {
    session: CaptureSession<'d, 'b, M, E>,
    cursor: usize,
}

impl<'d, 'b, M: RawMutex + 'static, E: DmaEngine> CaptureStream<'d, 'b, M, E> {
    /// Current position in the frame.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Start over with a fresh capture on the next read.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Give back the session.
    pub fn into_session(self) -> CaptureSession<'d, 'b, M, E> {
        self.session
    }
}

impl<M: RawMutex + 'static, E: DmaEngine> embedded_io_async::ErrorType
    for CaptureStream<'_, '_, M, E>
{
    type Error = VideoError;
}

impl<M: RawMutex + 'static, E: DmaEngine> embedded_io_async::Read for CaptureStream<'_, '_, M, E> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let chunk = self.session.read(self.cursor, buf).await?;
        self.cursor = chunk.offset;
        Ok(chunk.len)
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_matches_geometry() {
        assert_eq!(FrameGeometry::new(800, 600, 32).frame_size(), Some(1_920_000));
        assert_eq!(FrameGeometry::default().frame_size(), Some(1920 * 1080 * 4));
        assert_eq!(FrameGeometry::new(800, 600, 24).line_bytes(), Some(2400));
        assert_eq!(FrameGeometry::new(800, 600, 12).line_bytes(), None);
    }

    #[test]
    fn default_timeout_is_two_seconds() {
        assert_eq!(CaptureConfig::default().timeout(), Duration::from_millis(2_000));
    }
}
