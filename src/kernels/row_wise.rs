//! Batched row-wise NTT kernel.
//!
//! Treats a buffer region as a `rows x cols` matrix and runs an independent
//! `cols`-point transform on every row, all rows in parallel. Each row is an
//! iterative radix-2 decimation-in-time butterfly over bit-reversed input,
//! sharing one table of root powers across the whole batch.

use std::sync::Arc;

use ark_bn254::Fr;
use ark_ff::Field;
use rayon::prelude::*;

use crate::{
    device::{DeviceBuffer, Queue, Token},
    permute::permute_index,
};

/// Table of `omega^j` for `j` in `[0, cols / 2)`, built in parallel chunks
/// with one `pow` per chunk and running products inside.
fn power_table(omega: Fr, cols: usize, wg_size: usize) -> Vec<Fr> {
    let half = cols / 2;
    let chunk = wg_size.max(1);
    let mut table = vec![Fr::ONE; half];
    table
        .par_chunks_mut(chunk)
        .enumerate()
        .for_each(|(chunk_idx, slot)| {
            let mut value = omega.pow([(chunk_idx * chunk) as u64]);
            for entry in slot.iter_mut() {
                *entry = value;
                value *= omega;
            }
        });
    table
}

/// Enqueue `rows` independent `cols`-point transforms over the matrix at
/// `vec_offset`, with the primitive `cols`-th root read from `omega_offset`.
///
/// `cols` must be a power of two; a single-column matrix is left untouched.
pub fn row_wise_transform(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    vec_offset: usize,
    omega_offset: usize,
    rows: usize,
    cols: usize,
    wg_size: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        debug_assert!(cols.is_power_of_two());
        if cols == 1 {
            return Ok(());
        }
        let mut cells = buf.lock();
        let omega = cells[omega_offset];
        let table = power_table(omega, cols, wg_size);
        let matrix = &mut cells[vec_offset..vec_offset + rows * cols];

        matrix.par_chunks_exact_mut(cols).for_each(|row| {
            // Reorder into bit-reversed positions, then butterfly in place.
            for i in 0..cols {
                let j = permute_index(i, cols);
                if j > i {
                    row.swap(i, j);
                }
            }
            let mut m = 2;
            while m <= cols {
                let stride = cols / m;
                for block in row.chunks_exact_mut(m) {
                    let (lo, hi) = block.split_at_mut(m / 2);
                    for (j, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                        let t = table[j * stride] * *b;
                        *b = *a - t;
                        *a += t;
                    }
                }
                m *= 2;
            }
        });
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constant::get_root_of_unity, device::load_elements};

    /// Direct evaluation of the transform definition, one output at a time.
    fn reference_dft(values: &[Fr], omega: Fr) -> Vec<Fr> {
        (0..values.len())
            .map(|k| {
                values
                    .iter()
                    .enumerate()
                    .map(|(j, v)| *v * omega.pow([(j * k) as u64]))
                    .sum()
            })
            .collect()
    }

    fn run_rows(rows: usize, cols: usize, input: Vec<Fr>) -> Vec<Fr> {
        let queue = Queue::new();
        let buf = DeviceBuffer::alloc(rows * cols + 1).unwrap();
        let omega = get_root_of_unity(cols as u64);
        let w = load_elements(&queue, vec![omega], Arc::clone(&buf), rows * cols, &[]);
        let m = load_elements(&queue, input, Arc::clone(&buf), 0, &[]);
        let t = row_wise_transform(&queue, Arc::clone(&buf), 0, rows * cols, rows, cols, 4, &[w, m]);
        t.wait().unwrap();
        buf.read(0, rows * cols)
    }

    #[test]
    fn single_row_matches_reference() {
        for log_cols in 0..=6 {
            let cols = 1usize << log_cols;
            let input: Vec<Fr> = (0..cols).map(|v| Fr::from(v as u64 * 3 + 1)).collect();
            let got = run_rows(1, cols, input.clone());
            let omega = get_root_of_unity(cols as u64);
            assert_eq!(got, reference_dft(&input, omega), "cols {cols}");
        }
    }

    #[test]
    fn rows_are_transformed_independently() {
        let (rows, cols) = (4, 8);
        let input: Vec<Fr> = (0..rows * cols).map(|v| Fr::from(v as u64 + 17)).collect();
        let got = run_rows(rows, cols, input.clone());
        let omega = get_root_of_unity(cols as u64);
        for r in 0..rows {
            let expected = reference_dft(&input[r * cols..(r + 1) * cols], omega);
            assert_eq!(&got[r * cols..(r + 1) * cols], expected.as_slice(), "row {r}");
        }
    }

    #[test]
    fn length_two_row_is_sum_and_difference() {
        let input = vec![Fr::from(5u64), Fr::from(3u64)];
        let got = run_rows(1, 2, input);
        assert_eq!(got, vec![Fr::from(8u64), Fr::from(2u64)]);
    }

    #[test]
    fn power_table_matches_running_product() {
        let omega = get_root_of_unity(64);
        let table = power_table(omega, 64, 5);
        let mut expected = Fr::ONE;
        for entry in &table {
            assert_eq!(*entry, expected);
            expected *= omega;
        }
    }
}
