//! Matrix transposition kernels.
//!
//! Two variants: an out-of-place gather used to bring host data into
//! transposed layout in one pass, and an in-place swap for square matrices
//! that works in tiles sized by the work-group parameter so each rayon job
//! touches a cache-friendly block.

use std::sync::Arc;

use ark_bn254::Fr;
use itertools::Itertools;
use rayon::prelude::*;

use super::disjoint_regions_mut;
use crate::device::{DeviceBuffer, Queue, Token};

/// Raw view of a buffer's cells shared across transpose jobs.
///
/// Safety rests on the tile decomposition: every element pair is swapped by
/// exactly one job, so no two jobs alias the same cell.
struct SharedCells(*mut Fr);

unsafe impl Sync for SharedCells {}

impl SharedCells {
    // Accessed through a method so closures capture the wrapper, not the
    // raw pointer field.
    fn get(&self) -> *mut Fr {
        self.0
    }
}

/// Enqueue a gather that writes the transpose of the `rows x cols` matrix at
/// `src_offset` into `dst_offset` as a `cols x rows` matrix.
pub fn matrix_transposed_initialise(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    src_offset: usize,
    dst_offset: usize,
    rows: usize,
    cols: usize,
    wg_size: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        let mut cells = buf.lock();
        let (src, dst) = disjoint_regions_mut(
            &mut cells,
            (src_offset, rows * cols),
            (dst_offset, rows * cols),
        );
        let chunk = wg_size.max(1);
        dst.par_chunks_mut(rows)
            .enumerate()
            .with_min_len(chunk)
            .for_each(|(c, out_row)| {
                for (r, out) in out_row.iter_mut().enumerate() {
                    *out = src[r * cols + c];
                }
            });
        Ok(())
    })
}

/// Enqueue an in-place transpose of the square `dim x dim` matrix at
/// `offset`, swapping across the main diagonal tile by tile.
pub fn matrix_transpose(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    offset: usize,
    dim: usize,
    wg_size: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        let mut cells = buf.lock();
        let matrix = &mut cells[offset..offset + dim * dim];
        let tile = wg_size.clamp(1, dim.max(1));
        let blocks = dim.div_ceil(tile);
        let shared = SharedCells(matrix.as_mut_ptr());

        // Only the upper-triangular block pairs; each pair swaps its block
        // with the mirrored block, the diagonal blocks swap within.
        (0..blocks)
            .cartesian_product(0..blocks)
            .filter(|&(bi, bj)| bi <= bj)
            .collect::<Vec<_>>()
            .into_par_iter()
            .for_each(|(bi, bj)| {
                let base = shared.get();
                for i in bi * tile..((bi + 1) * tile).min(dim) {
                    let col_start = if bi == bj { i + 1 } else { bj * tile };
                    for j in col_start..((bj + 1) * tile).min(dim) {
                        // i < j always holds, the pair is visited once.
                        unsafe { std::ptr::swap(base.add(i * dim + j), base.add(j * dim + i)) };
                    }
                }
            });
        Ok(())
    })
}
