use crate::error::FilterError;
use crate::fir::{convolve_fir_inplace, Kernel};
use crate::iir::{
    convolve_iir_inner_single_inplace, convolve_iir_outer_single_inplace, Coefficients,
};
use crate::parallel::{ExecutionStrategy, Executor};

/// Number of contiguous signals handed to a task when filtering the last dimension.
const SIGNALS_PER_TASK: usize = 64;

/// A 1D filter that can be applied in place along any dimension of a row major array.
trait AxisFilter: Sync {
    /// Filter `n_times` contiguous signals of `n_pixels` elements.
    fn filter_inner(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError>;

    /// Filter `n_times` interleaved signals, element `j` of signal `t` at `j * n_times + t`.
    fn filter_outer(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError>;

    /// Check that a dimension of the given length can be filtered.
    fn check_len(&self, len: usize) -> Result<(), FilterError>;
}

impl AxisFilter for Coefficients {
    fn filter_inner(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError> {
        convolve_iir_inner_single_inplace(data, n_pixels, n_times, self)
    }

    fn filter_outer(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError> {
        convolve_iir_outer_single_inplace(data, n_pixels, n_times, self, n_times)
    }

    fn check_len(&self, len: usize) -> Result<(), FilterError> {
        if len <= self.n_border() {
            return Err(FilterError::SignalTooShort {
                n_pixels: len,
                n_border: self.n_border(),
            });
        }
        Ok(())
    }
}

impl AxisFilter for Kernel {
    fn filter_inner(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError> {
        convolve_fir_inplace(data, n_pixels, n_times, 1, n_pixels, self)
    }

    fn filter_outer(
        &self,
        data: &mut [f32],
        n_pixels: usize,
        n_times: usize,
    ) -> Result<(), FilterError> {
        convolve_fir_inplace(data, 1, n_times, n_times, n_pixels, self)
    }

    fn check_len(&self, _len: usize) -> Result<(), FilterError> {
        Ok(())
    }
}

fn check_shape(
    input: &[f32],
    shape: &[usize],
    output: &[f32],
    filter: &impl AxisFilter,
) -> Result<(), FilterError> {
    if shape.is_empty() || shape.contains(&0) {
        return Err(FilterError::EmptyInput);
    }

    let expected = shape.iter().product::<usize>();
    for actual in [input.len(), output.len()] {
        if actual != expected {
            return Err(FilterError::ShapeMismatch { expected, actual });
        }
    }

    shape.iter().try_for_each(|&len| filter.check_len(len))
}

fn filter_separable(
    input: &[f32],
    shape: &[usize],
    output: &mut [f32],
    filter: &impl AxisFilter,
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    check_shape(input, shape, output, filter)?;
    let executor = Executor::new(strategy, output.len())?;

    output.copy_from_slice(input);

    let ndim = shape.len();
    let n_pixels = shape[ndim - 1];
    executor.try_for_each_chunk(output, n_pixels * SIGNALS_PER_TASK, |chunk| {
        let n_times = chunk.len() / n_pixels;
        filter.filter_inner(chunk, n_pixels, n_times)
    })?;

    // every other dimension is a stack of blocks, each one a set of interleaved signals
    for axis in (0..ndim - 1).rev() {
        let n_pixels = shape[axis];
        let n_times = shape[axis + 1..].iter().product::<usize>();
        executor.try_for_each_chunk(output, n_pixels * n_times, |block| {
            filter.filter_outer(block, n_pixels, n_times)
        })?;
    }

    Ok(())
}

/// Apply a recursive gaussian filter along every dimension of a row major array.
///
/// The last dimension is filtered with [`crate::iir::convolve_iir_inner_single`], every other
/// dimension with [`crate::iir::convolve_iir_outer_single`].
///
/// # Arguments
///
/// * `input` - The input array, in row major order.
/// * `shape` - The shape of the array.
/// * `output` - The filtered array, same shape as the input.
/// * `coefs` - The recursive filter coefficients, applied along every dimension.
/// * `strategy` - The execution strategy.
///
/// # Errors
///
/// Nothing is written if the shape is empty, does not match the buffers, has a dimension
/// not longer than [`Coefficients::n_border`], or if the strategy is invalid.
pub fn iir_filter(
    input: &[f32],
    shape: &[usize],
    output: &mut [f32],
    coefs: &Coefficients,
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    log::debug!(
        "iir filter with sigma {} and order {} over shape {:?}",
        coefs.sigma(),
        coefs.order(),
        shape
    );
    filter_separable(input, shape, output, coefs, strategy)
}

/// Apply a FIR kernel along every dimension of a row major array.
///
/// # Arguments
///
/// * `input` - The input array, in row major order.
/// * `shape` - The shape of the array.
/// * `output` - The filtered array, same shape as the input.
/// * `kernel` - The kernel, applied along every dimension.
/// * `strategy` - The execution strategy.
pub fn fir_filter(
    input: &[f32],
    shape: &[usize],
    output: &mut [f32],
    kernel: &Kernel,
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    log::debug!(
        "fir filter with {} taps over shape {:?}",
        kernel.len(),
        shape
    );
    filter_separable(input, shape, output, kernel, strategy)
}

/// Apply a gaussian derivative filter along every dimension of a row major array.
///
/// A FIR kernel is used when [`Kernel::gaussian`] can build one, the recursive filter
/// otherwise. The recursive filter takes over for sigma from 3.25, where the kernel would
/// exceed 12 half coefficients, and for sigma below 0.25 (below 0.5 for orders 1 and 2),
/// where the kernel is too short to hold the derivative.
///
/// # Arguments
///
/// * `input` - The input array, in row major order.
/// * `shape` - The shape of the array.
/// * `output` - The filtered array, same shape as the input.
/// * `sigma` - The standard deviation of the gaussian.
/// * `order` - The derivative order, 0, 1 or 2.
/// * `strategy` - The execution strategy.
///
/// # Example
///
/// ```
/// use kornia_gaussian::{gaussian_filter, ExecutionStrategy};
///
/// let input = vec![2.0f32; 16 * 16];
/// let mut output = vec![0.0f32; 16 * 16];
///
/// gaussian_filter(&input, &[16, 16], &mut output, 1.0, 0, ExecutionStrategy::Serial).unwrap();
/// assert!(output.iter().all(|v| (v - 2.0).abs() < 1e-4));
/// ```
pub fn gaussian_filter(
    input: &[f32],
    shape: &[usize],
    output: &mut [f32],
    sigma: f64,
    order: u32,
    strategy: ExecutionStrategy,
) -> Result<(), FilterError> {
    match Kernel::gaussian(sigma, order) {
        Ok(kernel) => fir_filter(input, shape, output, &kernel, strategy),
        Err(FilterError::KernelTooLarge(_)) | Err(FilterError::InvalidGaussian { .. }) => {
            let coefs = Coefficients::new(sigma, order)?;
            iir_filter(input, shape, output, &coefs, strategy)
        }
        Err(e) => Err(e),
    }
}
