//! Interleaved (2D) DMA for scanout and capture.
//!
//! A display frame is a rectangle inside a larger, differently-strided
//! backing surface. The video DMA moves it as `line_count` chunks of
//! `line_size` bytes. This module holds the engine capability the driver
//! consumes ([`DmaEngine`]) and the builder that turns a framebuffer view
//! plus a visible window into a [`StridedTransferDescriptor`].
//!
//! Descriptors are plain values. Every submission gets a freshly built one;
//! nothing is cached across mode changes.

use embedded_graphics::geometry::{Point, Size};

use crate::completion::TransferCallback;
use crate::config::PipelineConfig;
use crate::error::{Result, VideoError};
use crate::timing::TimingMode;

/// Which way pixels move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferDirection {
    /// Memory to display FIFO (scanout).
    MemToDev,
    /// Video input FIFO to memory (capture).
    DevToMem,
}

bitflags::bitflags! {
    /// Flags passed to [`DmaEngine::prepare_interleaved`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PrepareFlags: u32 {
        /// Raise a completion interrupt when the transfer finishes.
        const INTERRUPT = 1 << 0;
        /// The client acknowledges the descriptor; the engine may reuse it.
        const CTRL_ACK  = 1 << 1;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for PrepareFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "PrepareFlags({=u32:#x})", self.bits());
    }
}

/// Identifier the engine hands back for a queued transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Cookie(pub u32);

/// DMA engine capability.
///
/// Mirrors the dmaengine slave API: terminate, prepare, attach a completion
/// callback, submit, then kick the queue.
pub trait DmaEngine {
    /// Prepared, not yet submitted transfer.
    type Transfer;
    /// Submission error.
    type Error: core::fmt::Debug;

    /// Abort every queued and in-flight transfer. A no-op on an idle engine.
    fn terminate_all(&mut self);

    /// Prepare an interleaved transfer.
    ///
    /// `None` means the engine ran out of descriptors; it is not a fault.
    fn prepare_interleaved(
        &mut self,
        descriptor: &StridedTransferDescriptor,
        flags: PrepareFlags,
    ) -> Option<Self::Transfer>;

    /// Have `callback` invoked (typically from interrupt context) when
    /// `transfer` completes.
    fn set_callback(&mut self, transfer: &mut Self::Transfer, callback: &'static dyn TransferCallback);

    /// Queue a prepared transfer.
    fn submit(&mut self, transfer: Self::Transfer) -> core::result::Result<Cookie, Self::Error>;

    /// Start processing queued transfers.
    fn issue_pending(&mut self);
}

impl<E: DmaEngine + ?Sized> DmaEngine for &mut E {
    type Transfer = E::Transfer;
    type Error = E::Error;

    fn terminate_all(&mut self) {
        (**self).terminate_all();
    }

    fn prepare_interleaved(
        &mut self,
        descriptor: &StridedTransferDescriptor,
        flags: PrepareFlags,
    ) -> Option<Self::Transfer> {
        (**self).prepare_interleaved(descriptor, flags)
    }

    fn set_callback(&mut self, transfer: &mut Self::Transfer, callback: &'static dyn TransferCallback) {
        (**self).set_callback(transfer, callback);
    }

    fn submit(&mut self, transfer: Self::Transfer) -> core::result::Result<Cookie, Self::Error> {
        (**self).submit(transfer)
    }

    fn issue_pending(&mut self) {
        (**self).issue_pending();
    }
}

/// One chunk of an interleaved frame: `size` bytes, then skip `icg` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataChunk {
    /// Bytes moved per chunk.
    pub size: u32,
    /// Inter-chunk gap in bytes.
    pub icg: u32,
}

/// A 2D transfer: `numf` repetitions of `frame_size` chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StridedTransferDescriptor {
    /// Source bus address (memory for scanout, unused for capture).
    pub src_start: u64,
    /// Destination bus address (memory for capture, unused for scanout).
    pub dst_start: u64,
    /// Transfer direction.
    pub dir: TransferDirection,
    /// Source address advances after each transfer.
    pub src_inc: bool,
    /// Destination address advances after each transfer.
    pub dst_inc: bool,
    /// Apply the chunk/gap pattern on the source side.
    pub src_sgl: bool,
    /// Apply the chunk/gap pattern on the destination side.
    pub dst_sgl: bool,
    /// Number of lines.
    pub numf: u32,
    /// Chunks per line.
    pub frame_size: u32,
    /// The single chunk describing one line.
    pub chunk: DataChunk,
}

impl StridedTransferDescriptor {
    /// Bytes per line.
    pub const fn line_size(&self) -> u32 {
        self.chunk.size
    }

    /// Number of lines.
    pub const fn line_count(&self) -> u32 {
        self.numf
    }

    /// Gap between chunks.
    pub const fn gap(&self) -> u32 {
        self.chunk.icg
    }

    /// Memory-side start address.
    pub const fn memory_address(&self) -> u64 {
        match self.dir {
            TransferDirection::MemToDev => self.src_start,
            TransferDirection::DevToMem => self.dst_start,
        }
    }
}

/// Read-only view of a framebuffer for one transfer.
///
/// `offset` is the top-left pixel of the visible window inside the backing
/// surface (panning).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferView {
    /// Bus address of the first byte of the backing surface.
    pub base: u64,
    /// Bytes per backing-surface line.
    pub pitch: u32,
    /// Bits per pixel.
    pub bits_per_pixel: u32,
    /// Visible window origin, in pixels.
    pub offset: Point,
}

impl FramebufferView {
    /// A view with the window at the surface origin.
    pub const fn new(base: u64, pitch: u32, bits_per_pixel: u32) -> Self {
        Self {
            base,
            pitch,
            bits_per_pixel,
            offset: Point::zero(),
        }
    }

    /// Move the visible window.
    #[must_use]
    pub const fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    /// Whole bytes per pixel; `None` for zero or sub-byte formats.
    pub const fn bytes_per_pixel(&self) -> Option<u32> {
        if self.bits_per_pixel == 0 || self.bits_per_pixel % 8 != 0 {
            None
        } else {
            Some(self.bits_per_pixel / 8)
        }
    }
}

/// Builds strided descriptors within the engine's addressable line size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBuilder {
    max_line_bytes: u32,
}

impl DescriptorBuilder {
    /// Builder accepting lines up to `max_line_bytes`.
    pub const fn new(max_line_bytes: u32) -> Self {
        Self { max_line_bytes }
    }

    /// Builder using the pipeline's DMA limit.
    pub const fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.max_line_bytes)
    }

    /// Descriptor covering the visible area of `mode`.
    ///
    /// # Errors
    ///
    /// See [`DescriptorBuilder::build_window`].
    pub fn build(
        &self,
        view: &FramebufferView,
        mode: &TimingMode,
        dir: TransferDirection,
    ) -> Result<StridedTransferDescriptor> {
        self.build_window(view, mode.visible_size(), dir)
    }

    /// Descriptor covering a `window`-sized region at `view.offset`.
    ///
    /// # Errors
    ///
    /// [`VideoError::InvalidGeometry`] when the pixel format is not whole
    /// bytes, the window is empty or its origin negative, a line exceeds the
    /// engine limit, the window does not fit in the pitch, or the start
    /// address overflows.
    pub fn build_window(
        &self,
        view: &FramebufferView,
        window: Size,
        dir: TransferDirection,
    ) -> Result<StridedTransferDescriptor> {
        let bpp = view.bytes_per_pixel().ok_or(VideoError::InvalidGeometry)?;
        if window.width == 0 || window.height == 0 {
            return Err(VideoError::InvalidGeometry);
        }

        let line_size = window
            .width
            .checked_mul(bpp)
            .ok_or(VideoError::InvalidGeometry)?;
        if line_size > self.max_line_bytes {
            return Err(VideoError::InvalidGeometry);
        }

        let x = u32::try_from(view.offset.x).map_err(|_| VideoError::InvalidGeometry)?;
        let y = u32::try_from(view.offset.y).map_err(|_| VideoError::InvalidGeometry)?;
        let x_bytes = x.checked_mul(bpp).ok_or(VideoError::InvalidGeometry)?;
        let line_end = x_bytes
            .checked_add(line_size)
            .ok_or(VideoError::InvalidGeometry)?;
        if line_end > view.pitch {
            return Err(VideoError::InvalidGeometry);
        }

        let start = u64::from(y)
            .checked_mul(u64::from(view.pitch))
            .and_then(|row| row.checked_add(u64::from(x_bytes)))
            .and_then(|offset| view.base.checked_add(offset))
            .ok_or(VideoError::InvalidGeometry)?;

        let chunk = DataChunk {
            size: line_size,
            icg: 0,
        };
        let descriptor = match dir {
            TransferDirection::MemToDev => StridedTransferDescriptor {
                src_start: start,
                dst_start: 0,
                dir,
                src_inc: true,
                dst_inc: false,
                src_sgl: false,
                dst_sgl: true,
                numf: window.height,
                frame_size: 1,
                chunk,
            },
            TransferDirection::DevToMem => StridedTransferDescriptor {
                src_start: 0,
                dst_start: start,
                dir,
                src_inc: false,
                dst_inc: true,
                src_sgl: true,
                dst_sgl: false,
                numf: window.height,
                frame_size: 1,
                chunk,
            },
        };
        Ok(descriptor)
    }
}

impl Default for DescriptorBuilder {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    const BASE: u64 = 0x1000_0000;

    fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    #[test]
    fn scanout_800x600_at_32bpp() {
        let view = FramebufferView::new(BASE, 3200, 32);
        let d = builder()
            .build_window(&view, Size::new(800, 600), TransferDirection::MemToDev)
            .unwrap();
        assert_eq!(d.line_size(), 3200);
        assert_eq!(d.line_count(), 600);
        assert_eq!(d.gap(), 0);
        assert_eq!(d.src_start, BASE);
        assert!(d.src_inc && !d.dst_inc);
        assert!(!d.src_sgl && d.dst_sgl);
        assert_eq!(d.frame_size, 1);
    }

    #[test]
    fn capture_inverts_roles() {
        let view = FramebufferView::new(BASE, 3200, 32);
        let d = builder()
            .build_window(&view, Size::new(800, 600), TransferDirection::DevToMem)
            .unwrap();
        assert_eq!(d.dst_start, BASE);
        assert_eq!(d.memory_address(), BASE);
        assert!(!d.src_inc && d.dst_inc);
        assert!(d.src_sgl && !d.dst_sgl);
    }

    #[test]
    fn panned_window_starts_inside_surface() {
        // 1024-wide 16bpp surface, 640x480 window at (100, 20).
        let view = FramebufferView::new(BASE, 2048, 16).with_offset(Point::new(100, 20));
        let d = builder()
            .build_window(&view, Size::new(640, 480), TransferDirection::MemToDev)
            .unwrap();
        assert_eq!(d.src_start, BASE + 20 * 2048 + 100 * 2);
        assert_eq!(d.line_size(), 1280);
    }

    #[test]
    fn line_wider_than_pitch_is_rejected() {
        let view = FramebufferView::new(BASE, 3000, 32);
        assert_eq!(
            builder().build_window(&view, Size::new(800, 600), TransferDirection::MemToDev),
            Err(VideoError::InvalidGeometry)
        );
    }

    #[test]
    fn window_past_right_edge_is_rejected() {
        let view = FramebufferView::new(BASE, 3200, 32).with_offset(Point::new(1, 0));
        assert_eq!(
            builder().build_window(&view, Size::new(800, 600), TransferDirection::MemToDev),
            Err(VideoError::InvalidGeometry)
        );
    }

    #[test]
    fn line_beyond_engine_limit_is_rejected() {
        let view = FramebufferView::new(BASE, 8192, 32);
        let narrow = DescriptorBuilder::new(4096);
        assert_eq!(
            narrow.build_window(&view, Size::new(1100, 10), TransferDirection::MemToDev),
            Err(VideoError::InvalidGeometry)
        );
        assert!(narrow
            .build_window(&view, Size::new(1024, 10), TransferDirection::MemToDev)
            .is_ok());
    }

    #[test]
    fn sub_byte_and_negative_offsets_are_rejected() {
        let packed = FramebufferView::new(BASE, 400, 4);
        assert_eq!(
            builder().build_window(&packed, Size::new(800, 1), TransferDirection::MemToDev),
            Err(VideoError::InvalidGeometry)
        );
        let negative = FramebufferView::new(BASE, 3200, 32).with_offset(Point::new(0, -1));
        assert_eq!(
            builder().build_window(&negative, Size::new(800, 1), TransferDirection::MemToDev),
            Err(VideoError::InvalidGeometry)
        );
    }

    #[test]
    fn flags_combine() {
        let f = PrepareFlags::INTERRUPT | PrepareFlags::CTRL_ACK;
        assert!(f.contains(PrepareFlags::INTERRUPT));
        assert!(f.contains(PrepareFlags::CTRL_ACK));
        assert!(!PrepareFlags::empty().contains(PrepareFlags::INTERRUPT));
        assert_eq!(f.bits(), 0b11);
    }
}
