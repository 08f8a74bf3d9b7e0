//! Display timing descriptions.
//!
//! A [`TimingMode`] is what the mode-setting layer hands over on every
//! mode-set: visible size, sync window, totals, pixel clock and sync
//! polarity. It is immutable once selected.

use embedded_graphics::geometry::Size;

use crate::config::{LinkKind, PipelineConfig};

/// Sync pulse polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SyncPolarity {
    /// Active-low sync pulse (register bit 0).
    Negative,
    /// Active-high sync pulse (register bit 1).
    Positive,
}

impl SyncPolarity {
    /// Value of the polarity bit in the timing registers.
    pub const fn bit(self) -> u32 {
        match self {
            Self::Negative => 0,
            Self::Positive => 1,
        }
    }
}

/// One axis of a display timing, in pixels (horizontal) or lines (vertical).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AxisTiming {
    /// Visible pixels or lines.
    pub display: u16,
    /// First position of the sync pulse.
    pub sync_start: u16,
    /// Position after the last sync pulse position.
    pub sync_end: u16,
    /// Total including blanking.
    pub total: u16,
}

impl AxisTiming {
    /// Create an axis from its four marks.
    pub const fn new(display: u16, sync_start: u16, sync_end: u16, total: u16) -> Self {
        Self {
            display,
            sync_start,
            sync_end,
            total,
        }
    }

    /// `display <= sync_start <= sync_end <= total`, and something visible.
    pub const fn is_ordered(&self) -> bool {
        self.display > 0
            && self.display <= self.sync_start
            && self.sync_start <= self.sync_end
            && self.sync_end <= self.total
    }
}

/// A complete display timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingMode {
    /// Pixel clock in kHz.
    pub pixel_clock_khz: u32,
    /// Horizontal timing.
    pub horizontal: AxisTiming,
    /// Vertical timing.
    pub vertical: AxisTiming,
    /// Horizontal sync polarity.
    pub hsync: SyncPolarity,
    /// Vertical sync polarity.
    pub vsync: SyncPolarity,
    /// Interlaced scan. The controller only drives progressive modes.
    pub interlaced: bool,
}

impl TimingMode {
    /// Create a progressive mode with the controller's default polarity:
    /// negative sync for modes smaller than 800×600, positive otherwise.
    pub const fn new(pixel_clock_khz: u32, horizontal: AxisTiming, vertical: AxisTiming) -> Self {
        let polarity = if horizontal.display < 800 && vertical.display < 600 {
            SyncPolarity::Negative
        } else {
            SyncPolarity::Positive
        };
        Self {
            pixel_clock_khz,
            horizontal,
            vertical,
            hsync: polarity,
            vsync: polarity,
            interlaced: false,
        }
    }

    /// Override both sync polarities.
    #[must_use]
    pub const fn with_polarity(mut self, hsync: SyncPolarity, vsync: SyncPolarity) -> Self {
        self.hsync = hsync;
        self.vsync = vsync;
        self
    }

    /// Mark the mode as interlaced.
    #[must_use]
    pub const fn with_interlace(mut self, interlaced: bool) -> Self {
        self.interlaced = interlaced;
        self
    }

    /// Visible width in pixels.
    pub const fn hdisplay(&self) -> u16 {
        self.horizontal.display
    }

    /// Visible height in lines.
    pub const fn vdisplay(&self) -> u16 {
        self.vertical.display
    }

    /// Visible area.
    pub fn visible_size(&self) -> Size {
        Size::new(u32::from(self.hdisplay()), u32::from(self.vdisplay()))
    }

    /// Pixel clock in Hz.
    pub fn pixel_clock_hz(&self) -> u64 {
        u64::from(self.pixel_clock_khz).saturating_mul(1_000)
    }

    /// Frequency the PLL must produce for this mode on `link`.
    pub fn pll_target_hz(&self, link: LinkKind) -> u64 {
        self.pixel_clock_hz().saturating_mul(link.clock_multiplier())
    }
}

/// Outcome of checking a mode against the controller's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeStatus {
    /// The controller can drive this mode.
    Ok,
    /// Pixel clock above the configured maximum.
    ClockHigh,
    /// Interlaced modes are not supported.
    NoInterlace,
    /// Sync marks out of order or empty visible area.
    BadTiming,
}

/// Check whether the controller can drive `mode`.
pub fn validate_mode(mode: &TimingMode, config: &PipelineConfig) -> ModeStatus {
    if mode.pixel_clock_khz > config.max_pixel_clock_khz {
        return ModeStatus::ClockHigh;
    }
    if mode.interlaced {
        return ModeStatus::NoInterlace;
    }
    if !mode.horizontal.is_ordered() || !mode.vertical.is_ordered() {
        return ModeStatus::BadTiming;
    }
    ModeStatus::Ok
}

/// Predefined parallel LCD panels, keyed by compatible string.
///
/// Only the DMT 640x480@60 timing ships here; boards with other panels
/// build their [`TimingMode`] directly.
pub const LCD_PANELS: &[(&str, TimingMode)] = &[
    (
        "vga,640x480",
        TimingMode::new(
            25_175,
            AxisTiming::new(640, 656, 752, 800),
            AxisTiming::new(480, 490, 492, 525),
        ),
    ),
];

/// Look up a predefined LCD panel mode.
pub fn lcd_panel_mode(compatible: &str) -> Option<TimingMode> {
    LCD_PANELS
        .iter()
        .find(|(name, _)| *name == compatible)
        .map(|(_, mode)| *mode)
}
