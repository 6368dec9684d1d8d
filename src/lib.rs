//! Six-step number theoretic transform over the BN254 scalar field, built on
//! an accelerator-style execution model: kernels are submitted to a
//! dependency-tracking queue against flat device buffers, and batches of
//! transforms can be overlapped under different scheduling strategies.

pub mod batch;
pub mod constant;
pub mod device;
pub mod errors;
pub mod kernels;
pub mod ntt;
pub mod permute;
