//! Pixel clock synthesis for the display MMCM.
//!
//! The output clock is `input · fbmult / (maindiv · clkdiv)`. Finding the
//! register fields for a requested frequency is an exhaustive search over the
//! bounded divider/multiplier space, followed by an encoding step that turns
//! the winning triple into the six clock-configuration register words.
//!
//! # Search order
//!
//! `maindiv` ascending, then `fbmult` ascending, then `clkdiv` ascending.
//! Ties keep the first candidate and an exact hit stops the search, so the
//! order decides which of several equally good triples is programmed. Known
//! good hardware configurations depend on it; do not reorder.
//!
//! # Sources
//! - Xilinx XAPP888: MMCM and PLL Dynamic Reconfiguration (register layout,
//!   high/low time encoding, lock and filter tables)
//! - Xilinx UG472: 7 Series Clocking Resources (VCO range constraints behind
//!   the `6·maindiv ..= 12·maindiv` feedback window)

use core::ops::RangeInclusive;

use crate::error::{Result, VideoError};
use crate::lock_tables;

/// Smallest input (main) divider.
pub const MAINDIV_MIN: u32 = 1;
/// Largest input (main) divider.
pub const MAINDIV_MAX: u32 = 9;
/// Smallest feedback multiplier the register encoding accepts.
pub const FBMULT_MIN: u32 = 2;
/// Largest feedback multiplier.
pub const FBMULT_MAX: u32 = 64;
/// Smallest output divider.
pub const CLKDIV_MIN: u32 = 1;
/// Largest output divider explored by the search.
pub const CLKDIV_MAX: u32 = 127;
/// Largest value [`encode_divider`] accepts.
pub const DIVIDE_MAX: u32 = 128;

/// Bit set in an encoded divider when the divide value is odd.
pub const CLK_BIT_WEDGE: u32 = 13;
/// Bit set in an encoded divider to bypass the counter (divide by one).
pub const CLK_BIT_NOCOUNT: u32 = 12;
/// Encoded divider for divide-by-one: counter bypassed, high = low = 1.
pub const DIVIDE_BY_ONE: u32 = 0x1041;

/// Winning divider/multiplier triple for a requested frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockSearchResult {
    /// Feedback multiplier (2..=64).
    pub fbmult: u32,
    /// Input divider (1..=9).
    pub maindiv: u32,
    /// Output divider (1..=127).
    pub clkdiv: u32,
    /// `input · fbmult / (maindiv · clkdiv)`, truncated.
    pub achieved_hz: u64,
    /// `|requested − achieved|`.
    pub error_hz: u64,
}

impl ClockSearchResult {
    /// Encode this triple into register words.
    pub fn registers(&self) -> Result<ClockRegisterSet> {
        build_registers(self.fbmult, self.clkdiv, self.maindiv)
    }

    /// Whether the error is within `ppm` parts per million of `requested_hz`.
    pub fn within_ppm(&self, requested_hz: u64, ppm: u32) -> bool {
        // u128: error · 1e6 overflows u64 for errors above ~18 THz.
        u128::from(self.error_hz).saturating_mul(1_000_000)
            <= u128::from(requested_hz).saturating_mul(u128::from(ppm))
    }
}

/// Feedback multiplier window for an input divider: `6·maindiv ..= min(12·maindiv, 64)`.
#[allow(clippy::arithmetic_side_effects)] // Safety: maindiv <= MAINDIV_MAX (9); products stay below 110
pub const fn fbmult_bounds(maindiv: u32) -> RangeInclusive<u32> {
    let low = 6 * maindiv;
    let high = if 12 * maindiv > FBMULT_MAX {
        FBMULT_MAX
    } else {
        12 * maindiv
    };
    low..=high
}

/// Output frequency of one candidate triple, truncating like the hardware.
///
/// `None` when a divider is zero or the product overflows.
pub fn output_frequency(input_clock_hz: u64, fbmult: u32, maindiv: u32, clkdiv: u32) -> Option<u64> {
    let numerator = input_clock_hz.checked_mul(u64::from(fbmult))?;
    let denominator = u64::from(maindiv).checked_mul(u64::from(clkdiv))?;
    numerator.checked_div(denominator)
}

/// Exhaustive search for the triple closest to `requested_hz`.
///
/// Always yields a candidate; use [`synthesize`] to also enforce a tolerance.
pub fn find_clock_params(input_clock_hz: u64, requested_hz: u64) -> ClockSearchResult {
    let mut best = ClockSearchResult {
        fbmult: *fbmult_bounds(MAINDIV_MIN).start(),
        maindiv: MAINDIV_MIN,
        clkdiv: CLKDIV_MIN,
        achieved_hz: 0,
        error_hz: u64::MAX,
    };

    for maindiv in MAINDIV_MIN..=MAINDIV_MAX {
        for fbmult in fbmult_bounds(maindiv) {
            for clkdiv in CLKDIV_MIN..=CLKDIV_MAX {
                let Some(achieved) = output_frequency(input_clock_hz, fbmult, maindiv, clkdiv)
                else {
                    continue;
                };
                let error = achieved.abs_diff(requested_hz);
                if error < best.error_hz {
                    best = ClockSearchResult {
                        fbmult,
                        maindiv,
                        clkdiv,
                        achieved_hz: achieved,
                        error_hz: error,
                    };
                }
                if achieved == requested_hz {
                    return best;
                }
            }
        }
    }
    best
}

/// Search for `requested_hz` and reject results outside `tolerance_ppm`.
///
/// # Errors
///
/// [`VideoError::ClockUnsynthesizable`] when the closest candidate is still
/// further than the tolerance from the request.
pub fn synthesize(
    input_clock_hz: u64,
    requested_hz: u64,
    tolerance_ppm: u32,
) -> Result<ClockSearchResult> {
    let best = find_clock_params(input_clock_hz, requested_hz);
    debug!(
        "clock search: requested {} Hz -> {} Hz (fbmult {}, maindiv {}, clkdiv {})",
        requested_hz,
        best.achieved_hz,
        best.fbmult,
        best.maindiv,
        best.clkdiv
    );
    if best.within_ppm(requested_hz, tolerance_ppm) {
        Ok(best)
    } else {
        warn!(
            "clock {} Hz unsynthesizable: best error {} Hz exceeds {} ppm",
            requested_hz,
            best.error_hz,
            tolerance_ppm
        );
        Err(VideoError::ClockUnsynthesizable)
    }
}

/// Encode a divide value into MMCM high/low time fields.
///
/// Layout: low time in bits 0..=5, high time in bits 6..=11, wedge (odd
/// divide, edge select) in bit 13. Divide-by-one bypasses the counter and
/// returns [`DIVIDE_BY_ONE`].
///
/// # Errors
///
/// [`VideoError::InvalidParameter`] outside `1..=128`.
#[allow(clippy::arithmetic_side_effects)] // Safety: divide in 2..=128 here; high and low times <= 64
pub fn encode_divider(divide: u32) -> Result<u32> {
    if !(1..=DIVIDE_MAX).contains(&divide) {
        return Err(VideoError::InvalidParameter);
    }
    if divide == 1 {
        return Ok(DIVIDE_BY_ONE);
    }

    let high_time = divide / 2;
    let low_time = divide - high_time;
    let mut output = if divide & 1 == 1 {
        1 << CLK_BIT_WEDGE
    } else {
        0
    };
    output |= 0x03F & low_time;
    output |= 0xFC0 & (high_time << 6);
    Ok(output)
}

/// Encode a divide value for a counter register.
///
/// Keeps the 12 time bits of [`encode_divider`] and moves its no-count and
/// wedge bits (12, 13) up to bits 22 and 23.
///
/// # Errors
///
/// Propagates [`encode_divider`] failures.
pub fn encode_count(divide: u32) -> Result<u32> {
    let div = encode_divider(divide)?;
    Ok((0xFFF & div) | ((div << 10) & 0x00C0_0000))
}

/// The six clock-configuration register words, in write order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockRegisterSet {
    /// Output counter (`clkdiv`).
    pub clk0_l: u32,
    /// Feedback counter (`fbmult`).
    pub clk_fb_l: u32,
    /// Fractional/phase bits of both counters; always zero.
    pub clk_fb_h_clk0_h: u32,
    /// Input divider (`maindiv`).
    pub divclk: u32,
    /// Low 32 bits of the lock table entry.
    pub lock_l: u32,
    /// Bits 32..40 of the lock entry in 0..=7, filter word in 16..=25.
    pub fltr_lock_h: u32,
}

/// Assemble the register set for a divider/multiplier triple.
///
/// # Errors
///
/// [`VideoError::InvalidParameter`] when `fbmult` is outside `2..=64` or a
/// divider cannot be encoded.
pub fn build_registers(fbmult: u32, clkdiv: u32, maindiv: u32) -> Result<ClockRegisterSet> {
    if !(FBMULT_MIN..=FBMULT_MAX).contains(&fbmult) {
        return Err(VideoError::InvalidParameter);
    }

    let clk0_l = encode_count(clkdiv)?;
    let clk_fb_l = encode_count(fbmult)?;
    let divclk = encode_divider(maindiv)?;
    let (lock, filter) = lock_tables::lookup(fbmult).ok_or(VideoError::InvalidParameter)?;

    #[allow(clippy::cast_possible_truncation)] // masked to 32 bits
    let lock_l = (lock & 0xFFFF_FFFF) as u32;
    #[allow(clippy::cast_possible_truncation)] // masked to 8 bits
    let lock_h = ((lock >> 32) & 0xFF) as u32;

    Ok(ClockRegisterSet {
        clk0_l,
        clk_fb_l,
        clk_fb_h_clk0_h: 0,
        divclk,
        lock_l,
        fltr_lock_h: lock_h | ((filter << 16) & 0x03FF_0000),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const IN: u64 = 100_000_000;

    #[test]
    fn divide_by_one_is_sentinel() {
        assert_eq!(encode_divider(1), Ok(0x1041));
    }

    #[test]
    fn even_divider_splits_evenly() {
        // 2 -> high 1, low 1
        assert_eq!(encode_divider(2), Ok(0x041));
        // 10 -> high 5, low 5
        assert_eq!(encode_divider(10), Ok((5 << 6) | 5));
    }

    #[test]
    fn odd_divider_sets_wedge_and_longer_low_time() {
        // 3 -> high 1, low 2, wedge
        assert_eq!(encode_divider(3), Ok(0x2000 | 0x040 | 0x002));
    }

    #[test]
    fn divider_range_is_enforced() {
        assert_eq!(encode_divider(0), Err(VideoError::InvalidParameter));
        assert_eq!(encode_divider(129), Err(VideoError::InvalidParameter));
        assert!(encode_divider(128).is_ok());
    }

    #[test]
    fn count_moves_control_bits_up() {
        assert_eq!(encode_count(1), Ok(0x0040_0041));
        assert_eq!(encode_count(3), Ok(0x0080_0042));
        assert_eq!(encode_count(2), Ok(0x041));
        assert_eq!(encode_count(200), Err(VideoError::InvalidParameter));
    }

    #[test]
    fn fbmult_window_is_capped_at_64() {
        assert_eq!(fbmult_bounds(1), 6..=12);
        assert_eq!(fbmult_bounds(5), 30..=60);
        assert_eq!(fbmult_bounds(6), 36..=64);
        assert_eq!(fbmult_bounds(9), 54..=64);
    }

    #[test]
    fn exact_match_stops_at_first_triple() {
        // 100 MHz · 6 / (1 · 6) = 100 MHz; no earlier triple hits it exactly.
        let r = find_clock_params(IN, 100_000_000);
        assert_eq!((r.maindiv, r.fbmult, r.clkdiv), (1, 6, 6));
        assert_eq!(r.error_hz, 0);
    }

    #[test]
    fn hdmi_720p_tmds_clock() {
        // 74.25 MHz pixel clock, 5x for TMDS.
        let r = find_clock_params(IN, 371_250_000);
        assert_eq!(
            r.achieved_hz,
            output_frequency(IN, r.fbmult, r.maindiv, r.clkdiv).unwrap_or(0)
        );
        assert!(r.within_ppm(371_250_000, 5_000));
    }

    #[test]
    fn synthesize_rejects_far_requests() {
        // Far above 100 MHz · 64: nothing gets within 0.5 %.
        assert_eq!(
            synthesize(IN, 20_000_000_000, 5_000),
            Err(VideoError::ClockUnsynthesizable)
        );
        assert!(synthesize(IN, 148_500_000, 5_000).is_ok());
    }

    #[test]
    fn build_registers_validates_fbmult() {
        for bad in [0, 1, 65, 100] {
            assert_eq!(build_registers(bad, 10, 1), Err(VideoError::InvalidParameter));
        }
        for good in [2, 32, 64] {
            assert!(build_registers(good, 10, 1).is_ok());
        }
    }

    #[test]
    fn build_registers_packs_lock_and_filter() {
        let regs = build_registers(8, 4, 1).unwrap();
        let (lock, filter) = lock_tables::lookup(8).unwrap();
        assert_eq!(regs.clk0_l, encode_count(4).unwrap());
        assert_eq!(regs.clk_fb_l, encode_count(8).unwrap());
        assert_eq!(regs.clk_fb_h_clk0_h, 0);
        assert_eq!(regs.divclk, DIVIDE_BY_ONE);
        assert_eq!(u64::from(regs.lock_l), lock & 0xFFFF_FFFF);
        assert_eq!(regs.fltr_lock_h & 0xFF, ((lock >> 32) & 0xFF) as u32);
        assert_eq!(regs.fltr_lock_h >> 16, filter);
    }

    #[test]
    fn build_registers_propagates_divider_failure() {
        assert_eq!(build_registers(8, 0, 1), Err(VideoError::InvalidParameter));
        assert_eq!(build_registers(8, 4, 0), Err(VideoError::InvalidParameter));
    }
}
