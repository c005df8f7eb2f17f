//! Direct convolution with truncated gaussian kernels.
//!
//! Suited for small standard deviations: a kernel holds at most
//! [`kernel::MAX_HALF_COEFS`] half coefficients.

/// Kernel construction.
pub mod kernel;

/// Strided convolution along one dimension.
pub mod convolve;

pub use convolve::{convolve_fir, convolve_fir_inplace};
pub use kernel::{make_gaussian, Kernel};
