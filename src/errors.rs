use thiserror::Error;

/// Failures surfaced by the execution queue and device buffers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The backing store for a buffer could not be reserved.
    #[error("failed to allocate device buffer of {elems} elements")]
    Allocation { elems: usize },
    /// A submitted task reported a failure while running.
    #[error("task execution failed: {0}")]
    Execution(String),
}

/// Failures in transform setup and batch orchestration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NttError {
    /// Transform sizes must be powers of two.
    #[error("transform size {0} is not a power of two")]
    NotPowerOfTwo(usize),
    /// The field only carries roots of unity up to order 2^28.
    #[error("transform size {0} exceeds the two-adicity of the field")]
    LengthTooLarge(usize),
    /// A buffer was too small for the requested layout.
    #[error("buffer of {actual} elements is too small, {needed} needed")]
    BufferTooSmall { needed: usize, actual: usize },
    /// A batch run was requested with zero rounds.
    #[error("batch must contain at least one round")]
    EmptyBatch,
    #[error(transparent)]
    Device(#[from] DeviceError),
}
