//! Property-based tests for pixel clock synthesis.
//! The exhaustive search is checked against an independent brute force over
//! the same bounded divider space.

#![allow(clippy::arithmetic_side_effects)]

use dispctrl::clock::{
    build_registers, encode_count, encode_divider, fbmult_bounds, find_clock_params,
    output_frequency, CLK_BIT_WEDGE, DIVIDE_BY_ONE,
};
use dispctrl::VideoError;
use proptest::prelude::*;

const INPUT_HZ: u64 = 100_000_000;

/// Every candidate in search order, with its error.
fn all_candidates(input: u64, requested: u64) -> Vec<(u32, u32, u32, u64)> {
    let mut out = Vec::new();
    for maindiv in 1..=9u32 {
        let low = 6 * maindiv;
        let high = (12 * maindiv).min(64);
        for fbmult in low..=high {
            for clkdiv in 1..=127u32 {
                let achieved = input * u64::from(fbmult) / u64::from(maindiv * clkdiv);
                out.push((maindiv, fbmult, clkdiv, achieved.abs_diff(requested)));
            }
        }
    }
    out
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The search finds the minimal error, and among equally good triples the
    /// first in (maindiv, fbmult, clkdiv) order.
    #[test]
    fn search_matches_brute_force(requested in 1_000_000u64..=800_000_000u64) {
        let result = find_clock_params(INPUT_HZ, requested);
        let candidates = all_candidates(INPUT_HZ, requested);
        let best = candidates.iter().map(|c| c.3).min().unwrap_or(u64::MAX);
        let first = candidates.iter().find(|c| c.3 == best).copied();

        prop_assert_eq!(result.error_hz, best);
        prop_assert_eq!(
            Some((result.maindiv, result.fbmult, result.clkdiv, result.error_hz)),
            first
        );
    }

    /// Reported frequency and error are consistent with the chosen triple.
    #[test]
    fn result_fields_are_consistent(requested in 1u64..=2_000_000_000u64) {
        let r = find_clock_params(INPUT_HZ, requested);
        prop_assert_eq!(
            Some(r.achieved_hz),
            output_frequency(INPUT_HZ, r.fbmult, r.maindiv, r.clkdiv)
        );
        prop_assert_eq!(r.error_hz, r.achieved_hz.abs_diff(requested));
        prop_assert!(fbmult_bounds(r.maindiv).contains(&r.fbmult));
        prop_assert!((1..=127).contains(&r.clkdiv));
        prop_assert!(r.registers().is_ok());
    }

    /// Divider encoding is total on 1..=128.
    #[test]
    fn divider_defined_on_domain(d in 1u32..=128) {
        let enc = encode_divider(d);
        prop_assert!(enc.is_ok());
        let enc = enc.unwrap_or_default();
        if d == 1 {
            prop_assert_eq!(enc, DIVIDE_BY_ONE);
        } else {
            let low = enc & 0x3F;
            let high = (enc >> 6) & 0x3F;
            // A 64-cycle half (d = 127, 128) overflows its 6-bit field.
            if d <= 126 {
                prop_assert_eq!(low + high, d);
                prop_assert!(low >= high);
            }
            prop_assert_eq!((enc >> CLK_BIT_WEDGE) & 1, d & 1);
        }
        prop_assert!(encode_count(d).is_ok());
    }

    /// Divider encoding rejects everything outside 1..=128.
    #[test]
    fn divider_rejected_off_domain(d in 129u32..=u32::MAX) {
        prop_assert_eq!(encode_divider(d), Err(VideoError::InvalidParameter));
        prop_assert_eq!(encode_count(d), Err(VideoError::InvalidParameter));
    }

    /// Register assembly accepts exactly fbmult in 2..=64.
    #[test]
    fn build_registers_fbmult_domain(fbmult in 0u32..=200) {
        let r = build_registers(fbmult, 5, 1);
        prop_assert_eq!(r.is_ok(), (2..=64).contains(&fbmult));
    }
}

#[test]
fn divide_by_one_sentinel() {
    assert_eq!(encode_divider(1), Ok(0x1041));
}

#[test]
fn listed_fbmult_values() {
    for bad in [0, 1, 65, 100] {
        assert_eq!(build_registers(bad, 4, 2), Err(VideoError::InvalidParameter));
    }
    for good in [2, 32, 64] {
        assert!(build_registers(good, 4, 2).is_ok());
    }
}
