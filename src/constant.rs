//! Fixed parameters of the BN254 scalar field and root-of-unity derivation.
//!
//! All transforms in this crate run over `Fr`, the scalar field of BN254 with
//!
//! ```text
//!     r = 21888242871839275222246405745257275088548364400416034343698204186575808495617
//! ```
//!
//! The multiplicative group of `Fr` has order `r - 1 = 2^28 · m` with `m` odd,
//! so the largest power-of-two transform this field supports is `2^28`.

use ark_bn254::Fr;
use ark_ff::{Field, MontFp};

/// Two-adicity of the scalar field: the largest `t` with `2^t | r - 1`.
///
/// Bounds the maximum transform length at `2^28`.
pub const TWO_ADICITY: u32 = 28;

/// Smallest multiplicative generator of the scalar field.
pub const GENERATOR: Fr = MontFp!("5");

/// Canonical primitive `2^28`-th root of unity, `5^((r - 1) / 2^28)`.
///
/// Every smaller power-of-two root is derived from this one by squaring, see
/// [`get_root_of_unity`].
pub const TWO_ADIC_ROOT_OF_UNITY: Fr =
    MontFp!("19103219067921713944291392827692070036145651957329286315305642004821462161904");

/// Derive a primitive `n`-th root of unity for a power-of-two `n ≤ 2^28`.
///
/// Computes `ω = TWO_ADIC_ROOT_OF_UNITY^(2^(28 - log2 n))` by square-and-multiply,
/// so that `ω^n = 1` and `ω^(n/2) ≠ 1`.
///
/// The precondition on `n` is the caller's responsibility; it is only checked
/// in debug builds.
#[must_use]
pub fn get_root_of_unity(n: u64) -> Fr {
    debug_assert!(n.is_power_of_two(), "transform length must be a power of two");
    debug_assert!(n <= 1 << TWO_ADICITY, "transform length exceeds two-adicity bound");

    let log_n = n.trailing_zeros();
    TWO_ADIC_ROOT_OF_UNITY.pow([1u64 << (TWO_ADICITY - log_n)])
}
