//! Flat field-element buffers and host/device transfer operations.
//!
//! A [`DeviceBuffer`] stands in for accelerator global memory: one flat
//! allocation of [`Fr`] elements that kernels address with explicit offsets.
//! Transfers are queue operations like any kernel, so a copy can be chained
//! behind compute work with dependency tokens.

use std::sync::{Arc, Mutex, MutexGuard};

use ark_bn254::Fr;
use ark_ff::AdditiveGroup;

use crate::{
    device::queue::{Queue, Token},
    errors::DeviceError,
};

/// A flat, fixed-size allocation of field elements.
#[derive(Debug)]
pub struct DeviceBuffer {
    cells: Mutex<Box<[Fr]>>,
    len: usize,
}

impl DeviceBuffer {
    /// Allocate a zero-filled buffer of `len` elements.
    ///
    /// Returns [`DeviceError::Allocation`] if the reservation fails instead
    /// of aborting, matching how out-of-memory surfaces on a real device.
    pub fn alloc(len: usize) -> Result<Arc<Self>, DeviceError> {
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(len)
            .map_err(|_| DeviceError::Allocation { elems: len })?;
        cells.resize(len, Fr::ZERO);
        Ok(Arc::new(Self { cells: cells.into_boxed_slice().into(), len }))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Exclusive access for kernels; held only for the duration of one task.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Box<[Fr]>> {
        self.cells.lock().unwrap()
    }

    /// Synchronously copy `len` elements starting at `offset` to the host.
    ///
    /// Callers must have waited on the tokens guarding this region.
    #[must_use]
    pub fn read(&self, offset: usize, len: usize) -> Vec<Fr> {
        let cells = self.lock();
        cells[offset..offset + len].to_vec()
    }
}

fn check_region(buf: &DeviceBuffer, offset: usize, len: usize) -> Result<(), DeviceError> {
    if offset.checked_add(len).is_none_or(|end| end > buf.len()) {
        return Err(DeviceError::Execution(format!(
            "region [{offset}, {offset}+{len}) out of bounds for buffer of {}",
            buf.len()
        )));
    }
    Ok(())
}

/// Enqueue a host-to-device copy of `src` into `dst` at `dst_offset`.
pub fn copy_to_device(
    queue: &Queue,
    src: Arc<Vec<Fr>>,
    dst: Arc<DeviceBuffer>,
    dst_offset: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        check_region(&dst, dst_offset, src.len())?;
        let mut cells = dst.lock();
        cells[dst_offset..dst_offset + src.len()].copy_from_slice(&src);
        Ok(())
    })
}

/// Enqueue a host-to-device copy of an owned vector, consuming it.
pub fn load_elements(
    queue: &Queue,
    elems: Vec<Fr>,
    dst: Arc<DeviceBuffer>,
    dst_offset: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        check_region(&dst, dst_offset, elems.len())?;
        let mut cells = dst.lock();
        cells[dst_offset..dst_offset + elems.len()].copy_from_slice(&elems);
        Ok(())
    })
}

/// Enqueue a device-to-host copy into the shared vector `dst`.
///
/// `dst` is resized to `len`.
pub fn copy_to_host(
    queue: &Queue,
    src: Arc<DeviceBuffer>,
    src_offset: usize,
    len: usize,
    dst: Arc<Mutex<Vec<Fr>>>,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        check_region(&src, src_offset, len)?;
        let cells = src.lock();
        let mut out = dst.lock().unwrap();
        out.clear();
        out.extend_from_slice(&cells[src_offset..src_offset + len]);
        Ok(())
    })
}

/// Enqueue a copy between two regions of the same buffer.
///
/// Overlapping regions are handled like `memmove`.
pub fn copy_within_device(
    queue: &Queue,
    buf: Arc<DeviceBuffer>,
    src_offset: usize,
    dst_offset: usize,
    len: usize,
    deps: &[Token],
) -> Token {
    queue.submit(deps, move || {
        check_region(&buf, src_offset, len)?;
        check_region(&buf, dst_offset, len)?;
        let mut cells = buf.lock();
        cells.copy_within(src_offset..src_offset + len, dst_offset);
        Ok(())
    })
}
