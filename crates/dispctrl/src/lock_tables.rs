//! MMCM lock and loop-filter coefficients.
//!
//! Both tables are indexed by `fbmult - 1` (feedback multiplier 1..=64) and
//! come from the 7-series MMCM dynamic reconfiguration reference (XAPP888),
//! low-bandwidth filter profile.
//!
//! Lock entries are 40 bits wide, split into fields as
//! `LockRefDly[39:35] LockFBDly[34:30] LockCnt[29:20] LockSatHigh[19:10] UnlockCnt[9:0]`.
//! The low 32 bits go to the LOCK_L register, the top 8 bits are packed
//! into FLTR_LOCK_H together with the 10-bit filter word.

/// Number of entries in each table (feedback multiplier 1..=64).
pub const TABLE_LEN: usize = 64;

/// MMCM lock configuration, indexed by `fbmult - 1`.
pub const LOCK_LOOKUP: [u64; TABLE_LEN] = [
    0b00110_00110_1111101000_1111101001_0000000001, // 1
    0b00110_00110_1111101000_1111101001_0000000001, // 2
    0b01000_01000_1111101000_1111101001_0000000001, // 3
    0b01011_01011_1111101000_1111101001_0000000001, // 4
    0b01110_01110_1111101000_1111101001_0000000001, // 5
    0b10001_10001_1111101000_1111101001_0000000001, // 6
    0b10011_10011_1111101000_1111101001_0000000001, // 7
    0b10110_10110_1111101000_1111101001_0000000001, // 8
    0b11001_11001_1111101000_1111101001_0000000001, // 9
    0b11100_11100_1111101000_1111101001_0000000001, // 10
    0b11111_11111_1110000100_1111101001_0000000001, // 11
    0b11111_11111_1100111001_1111101001_0000000001, // 12
    0b11111_11111_1011101110_1111101001_0000000001, // 13
    0b11111_11111_1010111100_1111101001_0000000001, // 14
    0b11111_11111_1010001010_1111101001_0000000001, // 15
    0b11111_11111_1001110001_1111101001_0000000001, // 16
    0b11111_11111_1000111111_1111101001_0000000001, // 17
    0b11111_11111_1000100110_1111101001_0000000001, // 18
    0b11111_11111_1000001101_1111101001_0000000001, // 19
    0b11111_11111_0111110100_1111101001_0000000001, // 20
    0b11111_11111_0111011011_1111101001_0000000001, // 21
    0b11111_11111_0111000010_1111101001_0000000001, // 22
    0b11111_11111_0110101001_1111101001_0000000001, // 23
    0b11111_11111_0110010000_1111101001_0000000001, // 24
    0b11111_11111_0110010000_1111101001_0000000001, // 25
    0b11111_11111_0101110111_1111101001_0000000001, // 26
    0b11111_11111_0101011110_1111101001_0000000001, // 27
    0b11111_11111_0101011110_1111101001_0000000001, // 28
    0b11111_11111_0101000101_1111101001_0000000001, // 29
    0b11111_11111_0101000101_1111101001_0000000001, // 30
    0b11111_11111_0100101100_1111101001_0000000001, // 31
    0b11111_11111_0100101100_1111101001_0000000001, // 32
    0b11111_11111_0100101100_1111101001_0000000001, // 33
    0b11111_11111_0100010011_1111101001_0000000001, // 34
    0b11111_11111_0100010011_1111101001_0000000001, // 35
    0b11111_11111_0100010011_1111101001_0000000001, // 36
    0b11111_11111_0011111010_1111101001_0000000001, // 37
    0b11111_11111_0011111010_1111101001_0000000001, // 38
    0b11111_11111_0011111010_1111101001_0000000001, // 39
    0b11111_11111_0011111010_1111101001_0000000001, // 40
    0b11111_11111_0011111010_1111101001_0000000001, // 41
    0b11111_11111_0011111010_1111101001_0000000001, // 42
    0b11111_11111_0011111010_1111101001_0000000001, // 43
    0b11111_11111_0011111010_1111101001_0000000001, // 44
    0b11111_11111_0011111010_1111101001_0000000001, // 45
    0b11111_11111_0011111010_1111101001_0000000001, // 46
    0b11111_11111_0011111010_1111101001_0000000001, // 47
    0b11111_11111_0011111010_1111101001_0000000001, // 48
    0b11111_11111_0011111010_1111101001_0000000001, // 49
    0b11111_11111_0011111010_1111101001_0000000001, // 50
    0b11111_11111_0011111010_1111101001_0000000001, // 51
    0b11111_11111_0011111010_1111101001_0000000001, // 52
    0b11111_11111_0011111010_1111101001_0000000001, // 53
    0b11111_11111_0011111010_1111101001_0000000001, // 54
    0b11111_11111_0011111010_1111101001_0000000001, // 55
    0b11111_11111_0011111010_1111101001_0000000001, // 56
    0b11111_11111_0011111010_1111101001_0000000001, // 57
    0b11111_11111_0011111010_1111101001_0000000001, // 58
    0b11111_11111_0011111010_1111101001_0000000001, // 59
    0b11111_11111_0011111010_1111101001_0000000001, // 60
    0b11111_11111_0011111010_1111101001_0000000001, // 61
    0b11111_11111_0011111010_1111101001_0000000001, // 62
    0b11111_11111_0011111010_1111101001_0000000001, // 63
    0b11111_11111_0011111010_1111101001_0000000001, // 64
];

/// Low-bandwidth loop filter configuration (10 bits), indexed by `fbmult - 1`.
pub const FILTER_LOOKUP_LOW: [u32; TABLE_LEN] = [
    0b0010_1111_00, // 1
    0b0010_1111_00, // 2
    0b0010_1111_00, // 3
    0b0010_1111_00, // 4
    0b0010_0111_00, // 5
    0b0010_1011_00, // 6
    0b0010_1101_00, // 7
    0b0010_0011_00, // 8
    0b0010_0101_00, // 9
    0b0010_0101_00, // 10
    0b0010_1001_00, // 11
    0b0010_1110_00, // 12
    0b0010_1110_00, // 13
    0b0010_1110_00, // 14
    0b0010_1110_00, // 15
    0b0010_0001_00, // 16
    0b0010_0001_00, // 17
    0b0010_0001_00, // 18
    0b0010_0110_00, // 19
    0b0010_0110_00, // 20
    0b0010_0110_00, // 21
    0b0010_0110_00, // 22
    0b0010_0110_00, // 23
    0b0010_0110_00, // 24
    0b0010_0110_00, // 25
    0b0010_1010_00, // 26
    0b0010_1010_00, // 27
    0b0010_1010_00, // 28
    0b0010_1010_00, // 29
    0b0010_1010_00, // 30
    0b0010_1010_00, // 31
    0b0010_1010_00, // 32
    0b0010_1010_00, // 33
    0b0010_1010_00, // 34
    0b0010_1010_00, // 35
    0b0010_1010_00, // 36
    0b0010_1010_00, // 37
    0b0010_1010_00, // 38
    0b0010_1010_00, // 39
    0b0010_1010_00, // 40
    0b0010_1010_00, // 41
    0b0010_1010_00, // 42
    0b0010_1010_00, // 43
    0b0010_1010_00, // 44
    0b0010_1010_00, // 45
    0b0010_1010_00, // 46
    0b0010_1010_00, // 47
    0b0010_1100_00, // 48
    0b0010_1100_00, // 49
    0b0010_1100_00, // 50
    0b0010_1100_00, // 51
    0b0010_1100_00, // 52
    0b0010_1100_00, // 53
    0b0010_1100_00, // 54
    0b0010_1100_00, // 55
    0b0010_1100_00, // 56
    0b0010_1100_00, // 57
    0b0010_1100_00, // 58
    0b0010_1100_00, // 59
    0b0010_1100_00, // 60
    0b0010_1100_00, // 61
    0b0010_1100_00, // 62
    0b0010_1100_00, // 63
    0b0010_1100_00, // 64
];

/// Lock and filter words for a feedback multiplier.
///
/// Returns `None` outside 1..=64.
pub fn lookup(fbmult: u32) -> Option<(u64, u32)> {
    let index = usize::try_from(fbmult.checked_sub(1)?).ok()?;
    Some((*LOCK_LOOKUP.get(index)?, *FILTER_LOOKUP_LOW.get(index)?))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn lock_entries_fit_in_40_bits() {
        assert!(LOCK_LOOKUP.iter().all(|&e| e >> 40 == 0));
    }

    #[test]
    fn filter_entries_fit_in_10_bits() {
        assert!(FILTER_LOOKUP_LOW.iter().all(|&e| e >> 10 == 0));
    }

    #[test]
    fn lookup_is_one_based() {
        assert_eq!(lookup(1), Some((LOCK_LOOKUP[0], FILTER_LOOKUP_LOW[0])));
        assert_eq!(lookup(64), Some((LOCK_LOOKUP[63], FILTER_LOOKUP_LOW[63])));
        assert_eq!(lookup(0), None);
        assert_eq!(lookup(65), None);
    }

    #[test]
    fn lock_count_decreases_with_multiplier() {
        let lock_cnt = |e: u64| (e >> 20) & 0x3FF;
        for pair in LOCK_LOOKUP.windows(2) {
            assert!(lock_cnt(pair[1]) <= lock_cnt(pair[0]));
        }
    }
}
