//! Data-parallel kernels over device buffers.
//!
//! Each kernel is enqueued as one task; inside the task the work is spread
//! over the rayon pool in chunks of the caller's work-group size. Kernels
//! address a single flat buffer through explicit element offsets, so callers
//! are responsible for keeping the regions they name disjoint.

pub mod row_wise;
pub mod transpose;
pub mod twiddle;

use ark_bn254::Fr;

pub use row_wise::row_wise_transform;
pub use transpose::{matrix_transpose, matrix_transposed_initialise};
pub use twiddle::{compute_twiddles, twiddle_multiplication};

/// Split one slice into two non-overlapping regions, in either order.
///
/// Returned as `(a, b)` matching the argument order. Panics if the regions
/// overlap; kernel layouts are required to keep them apart.
pub(crate) fn disjoint_regions_mut(
    cells: &mut [Fr],
    (off_a, len_a): (usize, usize),
    (off_b, len_b): (usize, usize),
) -> (&mut [Fr], &mut [Fr]) {
    if off_a + len_a <= off_b {
        let (lo, hi) = cells.split_at_mut(off_b);
        (&mut lo[off_a..off_a + len_a], &mut hi[..len_b])
    } else {
        assert!(off_b + len_b <= off_a, "kernel regions overlap");
        let (lo, hi) = cells.split_at_mut(off_a);
        (&mut hi[..len_a], &mut lo[off_b..off_b + len_b])
    }
}

#[cfg(test)]
mod tests {
    use ark_ff::AdditiveGroup;

    use super::*;

    #[test]
    fn disjoint_regions_in_both_orders() {
        let mut cells = vec![Fr::ZERO; 10];
        let (a, b) = disjoint_regions_mut(&mut cells, (0, 4), (6, 3));
        assert_eq!((a.len(), b.len()), (4, 3));
        let (a, b) = disjoint_regions_mut(&mut cells, (6, 3), (0, 4));
        assert_eq!((a.len(), b.len()), (3, 4));
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn overlapping_regions_panic() {
        let mut cells = vec![Fr::ZERO; 10];
        let _ = disjoint_regions_mut(&mut cells, (0, 5), (4, 2));
    }
}
