#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// runtime cpu capability registry.
pub mod cpu;

/// error types of the filters.
pub mod error;

/// FIR gaussian kernels and their convolution.
pub mod fir;

/// recursive gaussian filters.
pub mod iir;

/// module containing parallelization utilities.
pub mod parallel;

/// N-dimensional separable filters.
pub mod separable;

pub use cpu::{
    enable_avx as cpu_enable_avx, enable_avx2 as cpu_enable_avx2,
    enable_avx_fma as cpu_enable_avx_fma, has_avx as cpu_has_avx, has_avx2 as cpu_has_avx2,
    has_avx_fma as cpu_has_avx_fma,
};
pub use error::FilterError;
pub use fir::{convolve_fir, convolve_fir_inplace, make_gaussian, Kernel};
pub use iir::{
    convolve_iir_inner_single, convolve_iir_inner_single_avx, convolve_iir_inner_single_inplace,
    convolve_iir_inner_single_noavx, convolve_iir_outer_single, convolve_iir_outer_single_avx,
    convolve_iir_outer_single_inplace, convolve_iir_outer_single_noavx, Coefficients,
};
pub use parallel::ExecutionStrategy;
pub use separable::{fir_filter, gaussian_filter, iir_filter};
