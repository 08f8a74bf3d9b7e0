//! AXI display controller register map and register I/O capability.
//!
//! All registers are 32 bits wide and written whole; the controller has no
//! read-modify-write path and writes are never read back.

use crate::clock::ClockRegisterSet;
use crate::timing::TimingMode;

/// Control register (start, pixel clock inversion).
pub const OFST_DISPLAY_CTRL: u32 = 0x00;
/// Status register.
pub const OFST_DISPLAY_STATUS: u32 = 0x04;
/// First of five video timing words, spaced 4 bytes apart.
pub const OFST_DISPLAY_VIDEO_START: u32 = 0x08;
/// Output counter, low word.
pub const OFST_DISPLAY_CLK_L: u32 = 0x1C;
/// Feedback counter, low word.
pub const OFST_DISPLAY_FB_L: u32 = 0x20;
/// Feedback and output counter, high words.
pub const OFST_DISPLAY_FB_H_CLK_H: u32 = 0x24;
/// Input divider.
pub const OFST_DISPLAY_DIV: u32 = 0x28;
/// Lock configuration, low word.
pub const OFST_DISPLAY_LOCK_L: u32 = 0x2C;
/// Loop filter and lock configuration, high word.
pub const OFST_DISPLAY_FLTR_LOCK_H: u32 = 0x30;

/// Number of video timing words.
pub const VIDEO_TIMING_WORDS: usize = 5;

/// CTRL bit: start the display.
pub const BIT_DISPLAY_START: u32 = 0;
/// CTRL bit: invert the pixel clock output.
pub const BIT_DISPLAY_INVERT_PIX_CLOCK: u32 = 1;

/// Fire-and-forget 32-bit register writes at byte offsets within the
/// controller's register block.
pub trait RegisterIo {
    /// Overwrite the register at `offset` with `value`.
    fn write(&mut self, offset: u32, value: u32);
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    fn write(&mut self, offset: u32, value: u32) {
        (**self).write(offset, value);
    }
}

/// Memory-mapped register block.
pub struct MmioBlock {
    base: *mut u32,
}

impl MmioBlock {
    /// Wrap an already mapped register block.
    ///
    /// # Safety
    ///
    /// `base` must point to the controller's register block, mapped for
    /// device access, 4-byte aligned and at least `OFST_DISPLAY_FLTR_LOCK_H + 4`
    /// bytes long, for as long as the returned value lives. No other code may
    /// write the block concurrently.
    pub const unsafe fn new(base: *mut u32) -> Self {
        Self { base }
    }
}

impl RegisterIo for MmioBlock {
    fn write(&mut self, offset: u32, value: u32) {
        let Ok(offset) = usize::try_from(offset) else {
            return;
        };
        // SAFETY: `new` guarantees a mapped, aligned block covering every
        // offset in the register map; register offsets are multiples of 4 so
        // the byte-offset pointer stays aligned and inside the block.
        unsafe {
            self.base
                .cast::<u8>()
                .add(offset)
                .cast::<u32>()
                .write_volatile(value);
        }
    }
}

/// CTRL value for a running or stopped display.
pub const fn control_word(enabled: bool, invert_pixel_clock: bool) -> u32 {
    let start = if enabled { 1 << BIT_DISPLAY_START } else { 0 };
    let invert = if invert_pixel_clock {
        1 << BIT_DISPLAY_INVERT_PIX_CLOCK
    } else {
        0
    };
    start | invert
}

/// The five video timing words for `mode`.
///
/// Geometry halves are packed as `high << 16 | low`; the polarity bit sits in
/// bit 16 of the total words.
pub fn timing_words(mode: &TimingMode) -> [u32; VIDEO_TIMING_WORDS] {
    let h = &mode.horizontal;
    let v = &mode.vertical;
    let pack = |high: u32, low: u16| (high << 16) | u32::from(low);
    [
        pack(u32::from(h.display), v.display),
        pack(u32::from(h.sync_start), h.sync_end),
        pack(mode.hsync.bit(), h.total),
        pack(u32::from(v.sync_start), v.sync_end),
        pack(mode.vsync.bit(), v.total),
    ]
}

/// Write the video timing words in register order.
pub fn write_timing<R: RegisterIo>(io: &mut R, mode: &TimingMode) {
    let mut offset = OFST_DISPLAY_VIDEO_START;
    for word in timing_words(mode) {
        io.write(offset, word);
        offset = offset.wrapping_add(4);
    }
}

/// Register offset/value pairs for a clock configuration, in write order.
pub fn clock_writes(regs: &ClockRegisterSet) -> [(u32, u32); 6] {
    [
        (OFST_DISPLAY_CLK_L, regs.clk0_l),
        (OFST_DISPLAY_FB_L, regs.clk_fb_l),
        (OFST_DISPLAY_FB_H_CLK_H, regs.clk_fb_h_clk0_h),
        (OFST_DISPLAY_DIV, regs.divclk),
        (OFST_DISPLAY_LOCK_L, regs.lock_l),
        (OFST_DISPLAY_FLTR_LOCK_H, regs.fltr_lock_h),
    ]
}

/// Write a clock configuration.
pub fn write_clock<R: RegisterIo>(io: &mut R, regs: &ClockRegisterSet) {
    for (offset, value) in clock_writes(regs) {
        io.write(offset, value);
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::timing::{AxisTiming, SyncPolarity};

    #[test]
    fn control_word_bits() {
        assert_eq!(control_word(false, false), 0);
        assert_eq!(control_word(true, false), 0b01);
        assert_eq!(control_word(true, true), 0b11);
        assert_eq!(control_word(false, true), 0b10);
    }

    #[test]
    fn timing_words_pack_geometry_and_polarity() {
        let mode = TimingMode::new(
            65_000,
            AxisTiming::new(1024, 1048, 1184, 1344),
            AxisTiming::new(768, 771, 777, 806),
        )
        .with_polarity(SyncPolarity::Negative, SyncPolarity::Positive);

        let w = timing_words(&mode);
        assert_eq!(w[0], (1024 << 16) | 768);
        assert_eq!(w[1], (1048 << 16) | 1184);
        assert_eq!(w[2], 1344);
        assert_eq!(w[3], (771 << 16) | 777);
        assert_eq!(w[4], (1 << 16) | 806);
    }

    #[test]
    fn clock_writes_follow_register_order() {
        let regs = ClockRegisterSet {
            clk0_l: 1,
            clk_fb_l: 2,
            clk_fb_h_clk0_h: 3,
            divclk: 4,
            lock_l: 5,
            fltr_lock_h: 6,
        };
        let offsets = clock_writes(&regs).map(|(offset, _)| offset);
        assert_eq!(offsets, [0x1C, 0x20, 0x24, 0x28, 0x2C, 0x30]);
        let values = clock_writes(&regs).map(|(_, value)| value);
        assert_eq!(values, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn mmio_block_writes_at_byte_offsets() {
        let mut block = [0u32; 13];
        // SAFETY: `block` is a live, aligned 52-byte array covering 0x00..=0x30.
        let mut io = unsafe { MmioBlock::new(block.as_mut_ptr()) };
        io.write(OFST_DISPLAY_CTRL, 0xA);
        io.write(OFST_DISPLAY_FLTR_LOCK_H, 0xB);
        assert_eq!(block[0], 0xA);
        assert_eq!(block[12], 0xB);
    }
}
