//! Bit-level primitives shared by every set implementation: zig-zag
//! encoding of signed keys, De Bruijn trailing-zero lookup, SWAR popcount,
//! and multi-word shifts over page arrays.
//!
//! The zig-zag mapping folds the signed number line around zero so that
//! values close to the encoding origin (in either direction) land on small
//! unsigned indices: `0 => 0, -1 => 1, 1 => 2, -2 => 3, 2 => 4, ...`.
//! Every structure in this crate addresses its bitmap through this mapping.

/// De Bruijn sequence used to locate the lowest set bit of a `u64` with a
/// single multiply and table lookup.
const DEBRUIJN_SEQUENCE: u64 = 0x37E84A99DAE458F;

/// Bit position table indexed by the top 6 bits of the De Bruijn product.
const DEBRUIJN_BIT_POSITION: [u32; 64] = [
    0, 1, 17, 2, 18, 50, 3, 57, 47, 19, 22, 51, 29, 4, 33, 58, 15, 48, 20, 27, 25, 23, 52, 41, 54,
    30, 38, 5, 43, 34, 59, 8, 63, 16, 49, 56, 46, 21, 28, 32, 14, 26, 24, 40, 53, 37, 42, 7, 62,
    55, 45, 31, 13, 39, 36, 6, 61, 44, 12, 35, 60, 11, 10, 9,
];

/// Maps a signed value to a non-negative index, ordering by absolute
/// proximity to zero. Bijective over the full `i32` range.
#[inline(always)]
pub const fn zigzag_encode(v: i32) -> u32 {
    ((v << 1) ^ (v >> 31)) as u32
}

/// Inverse of [`zigzag_encode`].
#[inline(always)]
pub const fn zigzag_decode(u: u32) -> i32 {
    ((u >> 1) ^ 0u32.wrapping_sub(u & 1)) as i32
}

/// Index of the lowest set bit via De Bruijn multiplication.
///
/// Callers must guard against a zero word; the result is meaningless for
/// `word == 0`.
#[inline(always)]
pub const fn trailing_zero_count(word: u64) -> u32 {
    debug_assert!(word != 0);
    let isolated = word & word.wrapping_neg();
    DEBRUIJN_BIT_POSITION[(isolated.wrapping_mul(DEBRUIJN_SEQUENCE) >> 58) as usize]
}

/// Branchless SWAR population count.
#[inline(always)]
pub const fn pop_count(word: u64) -> u32 {
    let mut x = word;
    x -= (x >> 1) & 0x5555_5555_5555_5555;
    x = (x & 0x3333_3333_3333_3333) + ((x >> 2) & 0x3333_3333_3333_3333);
    x = (x + (x >> 4)) & 0x0F0F_0F0F_0F0F_0F0F;
    (x.wrapping_mul(0x0101_0101_0101_0101) >> 56) as u32
}

/// ORs `src` shifted up by `bits` into `dst`, carrying the high bits of each
/// word into the next, big-integer style.
///
/// Bits shifted past the end of `dst` are discarded; sizing `dst` to
/// `src.len() + bits / 64 + 1` words keeps everything.
pub fn shift_words_up(src: &[u64], dst: &mut [u64], bits: u64) {
    let word_off = (bits >> 6) as usize;
    let bit_off = (bits & 63) as u32;
    for (i, &word) in src.iter().enumerate() {
        let idx = i + word_off;
        if idx >= dst.len() {
            break;
        }
        if word == 0 {
            continue;
        }
        dst[idx] |= word << bit_off;
        if bit_off != 0 && idx + 1 < dst.len() {
            dst[idx + 1] |= word >> (64 - bit_off);
        }
    }
}

/// ORs `src` shifted down by `bits` into `dst`; bits shifted below index
/// zero or past the end of `dst` are discarded.
pub fn shift_words_down(src: &[u64], dst: &mut [u64], bits: u64) {
    let word_off = (bits >> 6) as usize;
    let bit_off = (bits & 63) as u32;
    for (i, &word) in src.iter().enumerate() {
        if i < word_off {
            continue;
        }
        let idx = i - word_off;
        if idx > dst.len() {
            break;
        }
        if word == 0 {
            continue;
        }
        if idx < dst.len() {
            dst[idx] |= word >> bit_off;
        }
        if bit_off != 0 && idx > 0 {
            dst[idx - 1] |= word << (64 - bit_off);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PROPTEST_CASES: u32 = 64;

    #[test]
    fn zigzag_small_values() {
        assert_eq!(zigzag_encode(0), 0);
        assert_eq!(zigzag_encode(-1), 1);
        assert_eq!(zigzag_encode(1), 2);
        assert_eq!(zigzag_encode(-2), 3);
        assert_eq!(zigzag_encode(2), 4);
    }

    #[test]
    fn zigzag_extremes_round_trip() {
        for v in [i32::MIN, i32::MIN + 1, -1, 0, 1, i32::MAX - 1, i32::MAX] {
            assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }
        assert_eq!(zigzag_encode(i32::MAX), u32::MAX - 1);
        assert_eq!(zigzag_encode(i32::MIN), u32::MAX);
    }

    #[test]
    fn trailing_zeros_matches_intrinsic() {
        for shift in 0..64 {
            let word = 1u64 << shift;
            assert_eq!(trailing_zero_count(word), word.trailing_zeros());
            // Extra high bits must not disturb the lookup.
            let noisy = word | (u64::MAX << shift);
            assert_eq!(trailing_zero_count(noisy), shift);
        }
    }

    #[test]
    fn pop_count_matches_intrinsic() {
        for word in [0u64, 1, 0xFF, u64::MAX, 0xAAAA_AAAA_AAAA_AAAA, 1 << 63] {
            assert_eq!(pop_count(word), word.count_ones());
        }
    }

    #[test]
    fn shift_up_carries_across_words() {
        let src = [1u64 << 63, 0b101];
        let mut dst = [0u64; 4];
        shift_words_up(&src, &mut dst, 3);
        assert_eq!(dst[0], 0);
        assert_eq!(dst[1], (1 << 2) | 0b101000);
        assert_eq!(dst[2], 0);
    }

    #[test]
    fn shift_down_discards_low_bits() {
        let src = [0b1011u64, 1];
        let mut dst = [0u64; 2];
        shift_words_down(&src, &mut dst, 2);
        // Bits 0 and 1 of the first word fall off the bottom.
        assert_eq!(dst[0], 0b10 | (1 << 62));
        assert_eq!(dst[1], 0);
    }

    #[test]
    fn shift_up_discards_past_destination_end() {
        let src = [u64::MAX, u64::MAX];
        let mut dst = [0u64; 2];
        shift_words_up(&src, &mut dst, 67);
        // Word offset 1, bit offset 3: only the low word's low bits land.
        assert_eq!(dst[0], 0);
        assert_eq!(dst[1], u64::MAX << 3);
        let mut tiny = [0u64; 1];
        shift_words_up(&src, &mut tiny, 128);
        assert_eq!(tiny[0], 0);
    }

    #[test]
    fn shift_down_discards_past_destination_end() {
        let src = [0u64, 0b110, u64::MAX];
        let mut dst = [0u64; 1];
        shift_words_down(&src, &mut dst, 65);
        // src[1] lands in dst[0]; src[2] falls past the end except its carry.
        assert_eq!(dst[0], 0b11 | (u64::MAX << 63));
    }

    #[test]
    fn shift_down_whole_words() {
        let src = [7u64, 0xF0, 3];
        let mut dst = [0u64; 3];
        shift_words_down(&src, &mut dst, 64);
        assert_eq!(dst, [0xF0, 3, 0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(
            crate::test_utils::proptest_cases(PROPTEST_CASES)
        ))]

        #[test]
        fn zigzag_round_trip(v in any::<i32>()) {
            prop_assert_eq!(zigzag_decode(zigzag_encode(v)), v);
        }

        #[test]
        fn zigzag_is_injective(a in any::<i32>(), b in any::<i32>()) {
            if a != b {
                prop_assert_ne!(zigzag_encode(a), zigzag_encode(b));
            }
        }

        #[test]
        fn trailing_zeros_random(word in 1u64..) {
            prop_assert_eq!(trailing_zero_count(word), word.trailing_zeros());
        }

        #[test]
        fn pop_count_random(word in any::<u64>()) {
            prop_assert_eq!(pop_count(word), word.count_ones());
        }

        #[test]
        fn shift_up_then_down_is_identity(
            words in proptest::collection::vec(any::<u64>(), 1..8),
            bits in 0u64..512,
        ) {
            let mut up = vec![0u64; words.len() + (bits >> 6) as usize + 1];
            shift_words_up(&words, &mut up, bits);
            let mut back = vec![0u64; up.len()];
            shift_words_down(&up, &mut back, bits);
            prop_assert_eq!(&back[..words.len()], &words[..]);
            prop_assert!(back[words.len()..].iter().all(|&w| w == 0));
        }
    }
}
