//! Six-step number theoretic transform.
//!
//! A length `n` transform is decomposed into `n1 x n2` (near-square, with
//! `n1 <= n2 <= 2 * n1`): transpose, `n2` transforms of size `n1`, a twiddle
//! pass, transpose, `n1` transforms of size `n2`, and a final transpose that
//! leaves the output in natural order. Every step is one queue submission, so
//! the whole transform is a dependency chain of at most eight tasks and the
//! caller gets back a single completion token.

use std::sync::Arc;

use ark_bn254::Fr;

use crate::{
    constant::get_root_of_unity,
    device::{DeviceBuffer, Queue, Token, copy_within_device, load_elements},
    errors::NttError,
    kernels::{
        compute_twiddles, matrix_transpose, matrix_transposed_initialise, row_wise_transform,
        twiddle_multiplication,
    },
};

/// Root cells appended after the scratch region: the `dim`-th, `rows`-th and
/// `cols`-th roots of unity, in that order.
const AUX_SLOTS: usize = 3;

/// Buffer layout for one transform of size `dim`.
///
/// The buffer is one flat region: `[0, dim)` holds the vector, followed by a
/// `side x side` scratch square, followed by [`AUX_SLOTS`] root cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundLayout {
    /// Transform size.
    pub dim: usize,
    /// Row count of the input view, `1 << (log2(dim) / 2)`.
    pub rows: usize,
    /// Column count of the input view, `dim / rows`.
    pub cols: usize,
    /// Side of the scratch square, `max(rows, cols)`.
    pub side: usize,
}

impl RoundLayout {
    /// Validate `dim` and derive the near-square factorisation.
    pub fn for_dim(dim: usize) -> Result<Self, NttError> {
        if !dim.is_power_of_two() {
            return Err(NttError::NotPowerOfTwo(dim));
        }
        if dim > 1 << crate::constant::TWO_ADICITY {
            return Err(NttError::LengthTooLarge(dim));
        }
        let rows = 1 << (dim.ilog2() / 2);
        let cols = dim / rows;
        Ok(Self { dim, rows, cols, side: rows.max(cols) })
    }

    /// Whether the input view is square, in which case transposes run in
    /// place and the vector region never moves.
    #[must_use]
    pub const fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    #[must_use]
    pub const fn vec_offset(&self) -> usize {
        0
    }

    #[must_use]
    pub const fn scratch_offset(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub const fn aux_offset(&self) -> usize {
        self.dim + self.side * self.side
    }

    /// Total element count a buffer needs to host one transform.
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.aux_offset() + AUX_SLOTS
    }

    /// Staging area for the twiddle table: the region that holds no live
    /// data while the table is in use.
    const fn twiddles_offset(&self) -> usize {
        if self.is_square() {
            // Vector stays in place, scratch is free.
            self.scratch_offset()
        } else {
            // Vector moved to scratch by the leading transpose.
            self.vec_offset()
        }
    }
}

/// Enqueue a full transform of the `dim` elements at the start of `buf`.
///
/// `deps` must guard the tasks producing the input. The returned token
/// completes once the result, in natural order, is back at offset zero.
pub fn six_step_ntt(
    queue: &Queue,
    buf: &Arc<DeviceBuffer>,
    dim: usize,
    wg_size: usize,
    deps: &[Token],
) -> Result<Token, NttError> {
    let layout = RoundLayout::for_dim(dim)?;
    if buf.len() < layout.total_len() {
        return Err(NttError::BufferTooSmall { needed: layout.total_len(), actual: buf.len() });
    }

    let roots = vec![
        get_root_of_unity(layout.dim as u64),
        get_root_of_unity(layout.rows as u64),
        get_root_of_unity(layout.cols as u64),
    ];
    let aux = layout.aux_offset();
    let load = load_elements(queue, roots, Arc::clone(buf), aux, &[]);

    let token = if layout.is_square() {
        submit_square(queue, buf, &layout, wg_size, &load, deps)
    } else {
        submit_rectangular(queue, buf, &layout, wg_size, &load, deps)
    };
    Ok(token)
}

/// Square factorisation: transposes run in place on the vector region and
/// the twiddle table lives in the otherwise idle scratch square.
fn submit_square(
    queue: &Queue,
    buf: &Arc<DeviceBuffer>,
    layout: &RoundLayout,
    wg_size: usize,
    load: &Token,
    deps: &[Token],
) -> Token {
    let side = layout.side;
    let aux = layout.aux_offset();

    let mut input_ready = deps.to_vec();
    input_ready.push(load.clone());

    let twiddles = compute_twiddles(
        queue,
        Arc::clone(buf),
        layout.twiddles_offset(),
        aux,
        layout.cols,
        wg_size,
        std::slice::from_ref(load),
    );
    let t1 = matrix_transpose(queue, Arc::clone(buf), 0, side, wg_size, &input_ready);
    let r1 = row_wise_transform(
        queue,
        Arc::clone(buf),
        0,
        aux + 1,
        layout.cols,
        layout.rows,
        wg_size,
        &[t1],
    );
    let tm = twiddle_multiplication(
        queue,
        Arc::clone(buf),
        0,
        layout.twiddles_offset(),
        layout.cols,
        layout.rows,
        wg_size,
        &[r1, twiddles],
    );
    let t2 = matrix_transpose(queue, Arc::clone(buf), 0, side, wg_size, &[tm]);
    let r2 = row_wise_transform(
        queue,
        Arc::clone(buf),
        0,
        aux + 2,
        layout.rows,
        layout.cols,
        wg_size,
        &[t2],
    );
    matrix_transpose(queue, Arc::clone(buf), 0, side, wg_size, &[r2])
}

/// Rectangular factorisation: the leading transpose gathers into scratch,
/// freeing the vector region for the twiddle table, and the result is copied
/// back to offset zero at the end.
fn submit_rectangular(
    queue: &Queue,
    buf: &Arc<DeviceBuffer>,
    layout: &RoundLayout,
    wg_size: usize,
    load: &Token,
    deps: &[Token],
) -> Token {
    let scratch = layout.scratch_offset();
    let aux = layout.aux_offset();

    let t1 = matrix_transposed_initialise(
        queue,
        Arc::clone(buf),
        0,
        scratch,
        layout.rows,
        layout.cols,
        wg_size,
        deps,
    );
    let twiddles = compute_twiddles(
        queue,
        Arc::clone(buf),
        layout.twiddles_offset(),
        aux,
        layout.cols,
        wg_size,
        &[t1.clone(), load.clone()],
    );
    let r1 = row_wise_transform(
        queue,
        Arc::clone(buf),
        scratch,
        aux + 1,
        layout.cols,
        layout.rows,
        wg_size,
        &[t1, load.clone()],
    );
    let tm = twiddle_multiplication(
        queue,
        Arc::clone(buf),
        scratch,
        layout.twiddles_offset(),
        layout.cols,
        layout.rows,
        wg_size,
        &[r1, twiddles],
    );
    let t2 = matrix_transposed_initialise(
        queue,
        Arc::clone(buf),
        scratch,
        0,
        layout.cols,
        layout.rows,
        wg_size,
        &[tm],
    );
    let r2 = row_wise_transform(
        queue,
        Arc::clone(buf),
        0,
        aux + 2,
        layout.rows,
        layout.cols,
        wg_size,
        &[t2],
    );
    let t3 = matrix_transposed_initialise(
        queue,
        Arc::clone(buf),
        0,
        scratch,
        layout.rows,
        layout.cols,
        wg_size,
        &[r2],
    );
    copy_within_device(queue, Arc::clone(buf), scratch, 0, layout.dim, &[t3])
}

/// Run one transform end to end on a freshly allocated buffer and block for
/// the result.
pub fn six_step_ntt_blocking(
    queue: &Queue,
    values: &[Fr],
    wg_size: usize,
) -> Result<Vec<Fr>, NttError> {
    let layout = RoundLayout::for_dim(values.len())?;
    let buf = DeviceBuffer::alloc(layout.total_len())?;
    let load = load_elements(queue, values.to_vec(), Arc::clone(&buf), 0, &[]);
    let done = six_step_ntt(queue, &buf, layout.dim, wg_size, &[load])?;
    done.wait()?;
    Ok(buf.read(0, layout.dim))
}
