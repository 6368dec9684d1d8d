//! Twiddle-factor kernels.
//!
//! `compute_twiddles` fills a table of successive root powers; each entry is
//! computed by an independent exponentiation so the work parallelises with no
//! carried dependency between chunks. `twiddle_multiplication` then applies
//! the table row-wise to a matrix view of the buffer.

use std::sync::Arc;

use ark_bn254::Fr;
use ark_ff::Field;
use rayon::prelude::*;

use super::disjoint_regions_mut;
use crate::device::{DeviceBuffer, Queue, Token};

/// Enqueue a fill of `twiddles[i] = omega^i` for `i` in `[0, dim)`.
///
/// `omega` is read from the single cell at `omega_offset`.
pub fn compute_twiddles(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    twiddles_offset: usize,
    omega_offset: usize,
    dim: usize,
    wg_size: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        let mut cells = buf.lock();
        let omega: Fr = cells[omega_offset];
        let twiddles = &mut cells[twiddles_offset..twiddles_offset + dim];
        let chunk = wg_size.max(1);
        twiddles
            .par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(chunk_idx, slot)| {
                for (i, value) in slot.iter_mut().enumerate() {
                    let idx = chunk_idx * chunk + i;
                    *value = omega.pow([idx as u64]);
                }
            });
        Ok(())
    })
}

/// Enqueue the twiddle pass of the six-step decomposition.
///
/// The `rows x cols` matrix at `vec_offset` is scaled cell-wise: row `r`,
/// column `c` is multiplied by `twiddles[r]^c`.
pub fn twiddle_multiplication(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    vec_offset: usize,
    twiddles_offset: usize,
    rows: usize,
    cols: usize,
    wg_size: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        let mut cells = buf.lock();
        let (matrix, twiddles) = disjoint_regions_mut(
            &mut cells,
            (vec_offset, rows * cols),
            (twiddles_offset, rows),
        );
        let chunk = wg_size.max(1);
        matrix
            .par_chunks_exact_mut(cols)
            .enumerate()
            .with_min_len(chunk.div_ceil(cols).max(1))
            .for_each(|(r, row)| {
                let base = twiddles[r];
                // Each cell exponentiates on its own; no carried product
                // between neighbours.
                for (c, value) in row.iter_mut().enumerate() {
                    *value *= base.pow([c as u64]);
                }
            });
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constant::get_root_of_unity, device::load_elements};

    #[test]
    fn twiddle_table_holds_successive_powers() {
        let dim = 16;
        let queue = Queue::new();
        let buf = DeviceBuffer::alloc(dim + 1).unwrap();
        let omega = get_root_of_unity(dim as u64);

        let load = load_elements(&queue, vec![omega], Arc::clone(&buf), dim, &[]);
        let t = compute_twiddles(&queue, Arc::clone(&buf), 0, dim, dim, 4, &[load]);
        t.wait().unwrap();

        let table = buf.read(0, dim);
        let mut expected = Fr::ONE;
        for (i, value) in table.iter().enumerate() {
            assert_eq!(*value, expected, "power {i}");
            expected *= omega;
        }
    }

    #[test]
    fn twiddle_multiplication_scales_each_cell() {
        let (rows, cols) = (4, 2);
        let queue = Queue::new();
        let buf = DeviceBuffer::alloc(rows * cols + rows).unwrap();
        let matrix: Vec<Fr> = (1..=rows * cols).map(|v| Fr::from(v as u64)).collect();
        let twiddles: Vec<Fr> = (2..2 + rows).map(|v| Fr::from(v as u64)).collect();

        let m = load_elements(&queue, matrix.clone(), Arc::clone(&buf), 0, &[]);
        let w = load_elements(&queue, twiddles.clone(), Arc::clone(&buf), rows * cols, &[]);
        let t = twiddle_multiplication(&queue, Arc::clone(&buf), 0, rows * cols, rows, cols, 8, &[m, w]);
        t.wait().unwrap();

        let got = buf.read(0, rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                let expected = matrix[r * cols + c] * twiddles[r].pow([c as u64]);
                assert_eq!(got[r * cols + c], expected, "cell ({r}, {c})");
            }
        }
    }

    #[test]
    fn first_column_is_untouched() {
        let (rows, cols) = (3, 3);
        let queue = Queue::new();
        let buf = DeviceBuffer::alloc(rows * cols + rows).unwrap();
        let matrix = vec![Fr::from(7u64); rows * cols];
        let twiddles: Vec<Fr> = (1..=rows).map(|v| Fr::from(v as u64 * 5)).collect();

        let m = load_elements(&queue, matrix.clone(), Arc::clone(&buf), 0, &[]);
        let w = load_elements(&queue, twiddles, Arc::clone(&buf), rows * cols, &[]);
        let t = twiddle_multiplication(&queue, Arc::clone(&buf), 0, rows * cols, rows, cols, 8, &[m, w]);
        t.wait().unwrap();

        let got = buf.read(0, rows * cols);
        // twiddle^0 leaves column zero alone regardless of the table.
        for r in 0..rows {
            assert_eq!(got[r * cols], matrix[r * cols]);
        }
    }
}
