//! Pipeline configuration and driver constants.
//!
//! Values the display controller needs that are not part of a display mode:
//! PLL reference clock, link serialisation factor, bounds checks. Everything
//! has a default matching the AXI display controller reference design, so a
//! typical integration only overrides what its board wiring changes.

/// PLL reference clock feeding the display MMCM, in Hz.
pub const DEFAULT_INPUT_CLOCK_HZ: u64 = 100_000_000;

/// Highest pixel clock the TMDS encoder accepts, in kHz.
pub const DEFAULT_MAX_PIXEL_CLOCK_KHZ: u32 = 165_000;

/// Accepted synthesis error, parts per million of the requested clock.
///
/// ±0.5 % is the VESA pixel clock tolerance.
pub const DEFAULT_CLOCK_TOLERANCE_PPM: u32 = 5_000;

/// Longest line, in bytes, the video DMA can move in one chunk.
///
/// Matches the 16-bit HSIZE field of the Xilinx VDMA.
pub const DEFAULT_MAX_LINE_BYTES: u32 = 0xFFFF;

/// How the pixel stream leaves the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkKind {
    /// Serialized TMDS link (HDMI/DVI): the PLL must run at 5× the pixel
    /// clock to drive the serializers.
    Tmds,
    /// Parallel RGB panel: the PLL output is the pixel clock.
    Parallel,
}

impl LinkKind {
    /// Ratio between PLL output and pixel clock.
    pub const fn clock_multiplier(self) -> u64 {
        match self {
            Self::Tmds => 5,
            Self::Parallel => 1,
        }
    }
}

/// Static configuration of a display pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PipelineConfig {
    /// PLL reference clock in Hz.
    pub input_clock_hz: u64,
    /// Output link type; selects the protocol clock multiplier.
    pub link: LinkKind,
    /// Drive the pixel clock inverted (some parallel panels latch on the
    /// falling edge).
    pub invert_pixel_clock: bool,
    /// Longest line the DMA engine can address, in bytes.
    pub max_line_bytes: u32,
    /// Accepted clock synthesis error in ppm.
    pub clock_tolerance_ppm: u32,
    /// Modes above this pixel clock (kHz) are rejected.
    pub max_pixel_clock_khz: u32,
}

impl PipelineConfig {
    /// HDMI defaults: 100 MHz reference, TMDS link.
    pub const fn new() -> Self {
        Self {
            input_clock_hz: DEFAULT_INPUT_CLOCK_HZ,
            link: LinkKind::Tmds,
            invert_pixel_clock: false,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            clock_tolerance_ppm: DEFAULT_CLOCK_TOLERANCE_PPM,
            max_pixel_clock_khz: DEFAULT_MAX_PIXEL_CLOCK_KHZ,
        }
    }

    /// Parallel LCD defaults.
    pub const fn lcd() -> Self {
        Self::new().with_link(LinkKind::Parallel)
    }

    /// Override the output link.
    #[must_use]
    pub const fn with_link(mut self, link: LinkKind) -> Self {
        self.link = link;
        self
    }

    /// Override the PLL reference clock.
    #[must_use]
    pub const fn with_input_clock_hz(mut self, hz: u64) -> Self {
        self.input_clock_hz = hz;
        self
    }

    /// Invert the pixel clock output.
    #[must_use]
    pub const fn with_inverted_pixel_clock(mut self, invert: bool) -> Self {
        self.invert_pixel_clock = invert;
        self
    }

    /// Override the DMA line size limit.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, bytes: u32) -> Self {
        self.max_line_bytes = bytes;
        self
    }

    /// Override the clock tolerance.
    #[must_use]
    pub const fn with_clock_tolerance_ppm(mut self, ppm: u32) -> Self {
        self.clock_tolerance_ppm = ppm;
        self
    }

    /// Override the pixel clock ceiling.
    #[must_use]
    pub const fn with_max_pixel_clock_khz(mut self, khz: u32) -> Self {
        self.max_pixel_clock_khz = khz;
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmds_link_runs_pll_at_five_times_pixel_clock() {
        assert_eq!(LinkKind::Tmds.clock_multiplier(), 5);
        assert_eq!(LinkKind::Parallel.clock_multiplier(), 1);
    }

    #[test]
    fn default_config_is_hdmi() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.link, LinkKind::Tmds);
        assert_eq!(cfg.input_clock_hz, 100_000_000);
        assert_eq!(cfg.max_pixel_clock_khz, 165_000);
        assert!(!cfg.invert_pixel_clock);
    }

    #[test]
    fn lcd_config_uses_parallel_link() {
        let cfg = PipelineConfig::lcd().with_inverted_pixel_clock(true);
        assert_eq!(cfg.link, LinkKind::Parallel);
        assert!(cfg.invert_pixel_clock);
    }
}
