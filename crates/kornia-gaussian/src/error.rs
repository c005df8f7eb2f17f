use thiserror::Error;

/// An error type for the gaussian filtering operations.
#[derive(Error, Debug, PartialEq)]
pub enum FilterError {
    /// Only derivative orders 0, 1 and 2 are supported.
    #[error("Unsupported derivative order {0}. Only orders 0, 1 and 2 are supported.")]
    UnsupportedOrder(u32),

    /// The standard deviation must be finite and strictly positive.
    #[error("Invalid sigma {0}. Sigma must be finite and greater than zero.")]
    InvalidSigma(f64),

    /// The half kernel required by the standard deviation exceeds the kernel capacity.
    #[error("Kernel too large: {0} half coefficients requested, at most 12 are supported")]
    KernelTooLarge(usize),

    /// Explicit kernel coefficients must be between 1 and 13 values.
    #[error("Invalid kernel length {0}. Expected between 1 and 13 coefficients.")]
    InvalidKernelLength(usize),

    /// The gaussian coefficients could not be generated.
    #[error("Failed to generate gaussian coefficients for stddev {stddev} and order {order}")]
    InvalidGaussian {
        /// The requested standard deviation.
        stddev: f64,
        /// The requested derivative order.
        order: u32,
    },

    /// The signal is too short to seed the recursive filter from its border.
    #[error("Signal length {n_pixels} must be greater than the border length {n_border}")]
    SignalTooShort {
        /// The number of samples per signal.
        n_pixels: usize,
        /// The number of border samples required by the coefficients.
        n_border: usize,
    },

    /// The input has no samples or no signals.
    #[error("Input must contain at least one signal with at least one sample")]
    EmptyInput,

    /// A buffer is too small for the requested strides and extents.
    #[error("Buffer too small: {required} elements required, got {actual}")]
    BufferTooSmall {
        /// The minimum number of elements.
        required: usize,
        /// The provided number of elements.
        actual: usize,
    },

    /// The outer stride would make consecutive signals overlap.
    #[error("Stride {stride} must be greater or equal than the number of signals {n_times}")]
    InvalidStride {
        /// The provided stride.
        stride: usize,
        /// The number of interleaved signals.
        n_times: usize,
    },

    /// The buffer length does not match the array shape.
    #[error("Shape mismatch: shape holds {expected} elements, buffer has {actual}")]
    ShapeMismatch {
        /// The number of elements implied by the shape.
        expected: usize,
        /// The provided number of elements.
        actual: usize,
    },

    /// A vectorized implementation was requested on a cpu that lacks the instruction set.
    #[error("The cpu does not support {0}")]
    CpuFeatureUnavailable(&'static str),

    /// The requested thread count is invalid.
    #[error("thread count must be > 0, got {0}")]
    InvalidThreadCount(usize),

    /// The thread pool failed to build.
    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}
