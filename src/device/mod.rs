//! Accelerator-style execution model: a dependency-tracking task queue and
//! flat device buffers with explicit transfer operations.

pub mod buffer;
pub mod queue;

pub use buffer::{DeviceBuffer, copy_to_device, copy_to_host, copy_within_device, load_elements};
pub use queue::{Queue, Token};
