//! Index manipulation for butterfly-style transforms.
//!
//! A radix-2 decimation-in-time NTT consumes its input in bit-reversed order;
//! these helpers map between linear and bit-reversed positions. The same
//! permutation doubles as an implicit-transpose strategy: a strided, permuted
//! read can stand in for a physical transpose when random access is cheaper
//! than the extra data movement.

/// Reverse the low `width` bits of `v`.
///
/// Bits above `width` are discarded.
#[must_use]
pub const fn bit_rev(v: u64, width: u32) -> u64 {
    let mut result = 0;
    let mut i = 0;
    while i < width {
        result = (result << 1) | ((v >> i) & 1);
        i += 1;
    }
    result
}

/// Reverse all 64 bits of `n`.
#[must_use]
pub const fn rev_all_bits(n: u64) -> u64 {
    n.reverse_bits()
}

/// Map a linear index in `[0, size)` to its bit-reversal position.
///
/// `size` must be a power of two; checked in debug builds only.
#[must_use]
pub fn permute_index(idx: usize, size: usize) -> usize {
    debug_assert!(size.is_power_of_two());
    debug_assert!(idx < size);
    bit_rev(idx as u64, size.trailing_zeros()) as usize
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn bit_rev_known_values() {
        assert_eq!(bit_rev(0b001, 3), 0b100);
        assert_eq!(bit_rev(0b011, 3), 0b110);
        assert_eq!(bit_rev(0b1101, 4), 0b1011);
        // Width zero keeps nothing.
        assert_eq!(bit_rev(0b111, 0), 0);
        // Bits above the width are discarded.
        assert_eq!(bit_rev(0b1_0001, 4), 0b1000);
    }

    #[test]
    fn rev_all_bits_roundtrip() {
        for n in [0u64, 1, 2, 0xdead_beef, u64::MAX] {
            assert_eq!(rev_all_bits(rev_all_bits(n)), n);
        }
        assert_eq!(rev_all_bits(1), 1 << 63);
    }

    #[test]
    fn permute_index_is_a_bijection() {
        for log_size in 1..=16 {
            let size = 1usize << log_size;
            let mut seen = vec![false; size];
            for idx in 0..size {
                let p = permute_index(idx, size);
                assert!(p < size);
                assert!(!seen[p], "duplicate image {p} for size {size}");
                seen[p] = true;
            }
            // All slots hit, so the map is onto as well.
            assert!(seen.iter().all(|&b| b));
        }
    }

    #[test]
    fn permute_index_trivial_domain() {
        assert_eq!(permute_index(0, 1), 0);
    }

    proptest! {
        #[test]
        fn bit_rev_is_an_involution(v in 0u64..u64::MAX, width in 1u32..=16) {
            let v = v & ((1 << width) - 1);
            prop_assert_eq!(bit_rev(bit_rev(v, width), width), v);
        }

        #[test]
        fn bit_rev_matches_rev_all_bits(v: u64) {
            prop_assert_eq!(bit_rev(v, 64), rev_all_bits(v));
        }
    }
}
