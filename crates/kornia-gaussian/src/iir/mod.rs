//! Recursive (IIR) approximation of the gaussian filters.
//!
//! The filters run a fourth order causal pass and a fourth order anticausal pass over each
//! signal, so the cost per sample does not depend on sigma. Two memory layouts are supported:
//!
//! * inner: `n_times` contiguous signals of `n_pixels` elements, signal `t` starting at
//!   `t * n_pixels`.
//! * outer: `n_times` interleaved signals, element `j` of signal `t` at `j * stride + t`.
//!
//! Every layout has a scalar (`_noavx`) and an AVX2 (`_avx`) implementation. The functions
//! without suffix pick one at runtime from [`crate::cpu`].

/// Recursive filter coefficients.
pub mod coefficients;

mod avx;
mod scalar;

pub use coefficients::Coefficients;

use crate::cpu;
use crate::error::FilterError;
use crate::fir::convolve::required_len;

/// Source and destination of a filter call.
pub(crate) enum IoBuffers<'a> {
    Split {
        input: &'a [f32],
        output: &'a mut [f32],
    },
    InPlace(&'a mut [f32]),
}

impl IoBuffers<'_> {
    pub(crate) fn input(&self) -> &[f32] {
        match self {
            IoBuffers::Split { input, .. } => input,
            IoBuffers::InPlace(data) => &**data,
        }
    }

    pub(crate) fn output(&mut self) -> &mut [f32] {
        match self {
            IoBuffers::Split { output, .. } => &mut **output,
            IoBuffers::InPlace(data) => &mut **data,
        }
    }
}

/// Position of the signals of one filter call inside the buffers.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SignalLayout {
    pub n_pixels: usize,
    pub n_times: usize,
    /// Distance between the first elements of consecutive signals.
    pub signal_stride: usize,
    /// Distance between consecutive elements of a signal.
    pub elem_stride: usize,
}

impl SignalLayout {
    fn inner(n_pixels: usize, n_times: usize) -> Self {
        Self {
            n_pixels,
            n_times,
            signal_stride: n_pixels,
            elem_stride: 1,
        }
    }

    fn outer(n_pixels: usize, n_times: usize, stride: usize) -> Self {
        Self {
            n_pixels,
            n_times,
            signal_stride: 1,
            elem_stride: stride,
        }
    }

    #[inline]
    pub(crate) fn offset(&self, t: usize) -> usize {
        t * self.signal_stride
    }

    /// Minimum buffer length, saturated to `usize::MAX` when the layout overflows.
    fn required_len(&self) -> usize {
        required_len(
            self.n_times,
            self.signal_stride,
            self.n_pixels,
            self.elem_stride,
        )
        .unwrap_or(usize::MAX)
    }

    /// Check the layout against the coefficients and the buffers before anything is written.
    fn validate(&self, coefs: &Coefficients, io: &IoBuffers<'_>) -> Result<(), FilterError> {
        if self.n_pixels == 0 || self.n_times == 0 {
            return Err(FilterError::EmptyInput);
        }

        if self.n_pixels <= coefs.n_border() {
            return Err(FilterError::SignalTooShort {
                n_pixels: self.n_pixels,
                n_border: coefs.n_border(),
            });
        }

        if self.signal_stride == 1 && self.elem_stride < self.n_times {
            return Err(FilterError::InvalidStride {
                stride: self.elem_stride,
                n_times: self.n_times,
            });
        }

        let required = self.required_len();
        let lens = match io {
            IoBuffers::Split { input, output } => [input.len(), output.len()],
            IoBuffers::InPlace(data) => [data.len(), data.len()],
        };
        for actual in lens {
            if actual < required {
                return Err(FilterError::BufferTooSmall { required, actual });
            }
        }

        Ok(())
    }
}

fn run_noavx(
    mut io: IoBuffers<'_>,
    layout: SignalLayout,
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    layout.validate(coefs, &io)?;
    scalar::filter_signals(&mut io, &layout, coefs, 0..layout.n_times);
    Ok(())
}

fn run_avx(
    mut io: IoBuffers<'_>,
    layout: SignalLayout,
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    layout.validate(coefs, &io)?;
    avx::filter_signals(&mut io, &layout, coefs)
}

fn run_dispatch(
    io: IoBuffers<'_>,
    layout: SignalLayout,
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    // a forced flag never reaches illegal instructions
    if cpu::has_avx2() && avx::is_supported() {
        run_avx(io, layout, coefs)
    } else {
        run_noavx(io, layout, coefs)
    }
}

/// Filter `n_times` contiguous signals of `n_pixels` elements.
///
/// The AVX2 implementation is used when [`crate::cpu::has_avx2`] reports it and the cpu
/// supports it, the scalar one otherwise.
///
/// # Arguments
///
/// * `input` - The signals, signal `t` starting at `t * n_pixels`.
/// * `n_pixels` - The number of elements of each signal.
/// * `n_times` - The number of signals.
/// * `output` - The filtered signals, with the same layout as the input.
/// * `coefs` - The recursive filter coefficients.
///
/// # Errors
///
/// Nothing is written if the signals are empty, not longer than [`Coefficients::n_border`]
/// or if a buffer is too small.
///
/// # Example
///
/// ```
/// use kornia_gaussian::iir::{convolve_iir_inner_single, Coefficients};
///
/// let coefs = Coefficients::new(2.0, 0).unwrap();
/// let input = vec![1.0f32; 64];
/// let mut output = vec![0.0f32; 64];
///
/// convolve_iir_inner_single(&input, 32, 2, &mut output, &coefs).unwrap();
/// assert!(output.iter().all(|v| (v - 1.0).abs() < 1e-5));
/// ```
pub fn convolve_iir_inner_single(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    run_dispatch(
        IoBuffers::Split { input, output },
        SignalLayout::inner(n_pixels, n_times),
        coefs,
    )
}

/// Scalar version of [`convolve_iir_inner_single`].
pub fn convolve_iir_inner_single_noavx(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    run_noavx(
        IoBuffers::Split { input, output },
        SignalLayout::inner(n_pixels, n_times),
        coefs,
    )
}

/// AVX2 version of [`convolve_iir_inner_single`].
///
/// # Errors
///
/// Returns [`FilterError::CpuFeatureUnavailable`] on a cpu without AVX2, whatever the
/// overrides of [`crate::cpu`].
pub fn convolve_iir_inner_single_avx(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    run_avx(
        IoBuffers::Split { input, output },
        SignalLayout::inner(n_pixels, n_times),
        coefs,
    )
}

/// In place version of [`convolve_iir_inner_single`].
pub fn convolve_iir_inner_single_inplace(
    data: &mut [f32],
    n_pixels: usize,
    n_times: usize,
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    run_dispatch(
        IoBuffers::InPlace(data),
        SignalLayout::inner(n_pixels, n_times),
        coefs,
    )
}

/// Filter `n_times` interleaved signals of `n_pixels` elements.
///
/// Element `j` of signal `t` lives at `j * stride + t`, which filters the columns of a row
/// major matrix with `stride` columns when `n_times == stride`.
///
/// # Arguments
///
/// * `input` - The interleaved signals.
/// * `n_pixels` - The number of elements of each signal.
/// * `n_times` - The number of signals.
/// * `output` - The filtered signals, with the same layout as the input.
/// * `coefs` - The recursive filter coefficients.
/// * `stride` - The distance between consecutive elements of a signal, at least `n_times`.
///
/// # Errors
///
/// Same as [`convolve_iir_inner_single`], and [`FilterError::InvalidStride`] if `stride` is
/// smaller than `n_times`.
pub fn convolve_iir_outer_single(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
    stride: usize,
) -> Result<(), FilterError> {
    run_dispatch(
        IoBuffers::Split { input, output },
        SignalLayout::outer(n_pixels, n_times, stride),
        coefs,
    )
}

/// Scalar version of [`convolve_iir_outer_single`].
pub fn convolve_iir_outer_single_noavx(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
    stride: usize,
) -> Result<(), FilterError> {
    run_noavx(
        IoBuffers::Split { input, output },
        SignalLayout::outer(n_pixels, n_times, stride),
        coefs,
    )
}

/// AVX2 version of [`convolve_iir_outer_single`].
///
/// # Errors
///
/// Returns [`FilterError::CpuFeatureUnavailable`] on a cpu without AVX2.
pub fn convolve_iir_outer_single_avx(
    input: &[f32],
    n_pixels: usize,
    n_times: usize,
    output: &mut [f32],
    coefs: &Coefficients,
    stride: usize,
) -> Result<(), FilterError> {
    run_avx(
        IoBuffers::Split { input, output },
        SignalLayout::outer(n_pixels, n_times, stride),
        coefs,
    )
}

/// In place version of [`convolve_iir_outer_single`].
pub fn convolve_iir_outer_single_inplace(
    data: &mut [f32],
    n_pixels: usize,
    n_times: usize,
    coefs: &Coefficients,
    stride: usize,
) -> Result<(), FilterError> {
    run_dispatch(
        IoBuffers::InPlace(data),
        SignalLayout::outer(n_pixels, n_times, stride),
        coefs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::Rng;

    fn random_signal(len: usize) -> Vec<f32> {
        let mut rng = rand::rng();
        (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_inner_matches_outer() -> Result<(), FilterError> {
        let coefs = Coefficients::new(2.0, 0)?;
        let input = random_signal(40);

        let mut inner = vec![0.0; 40];
        let mut outer = vec![0.0; 40];
        convolve_iir_inner_single(&input, 40, 1, &mut inner, &coefs)?;
        convolve_iir_outer_single(&input, 40, 1, &mut outer, &coefs, 1)?;
        assert_eq!(inner, outer);
        Ok(())
    }

    #[test]
    fn test_outer_matches_transposed_inner() -> Result<(), FilterError> {
        let (rows, cols) = (24, 7);
        let coefs = Coefficients::new(1.5, 1)?;
        let input = random_signal(rows * cols);

        // filter the columns of the matrix
        let mut outer = vec![0.0; rows * cols];
        convolve_iir_outer_single_noavx(&input, rows, cols, &mut outer, &coefs, cols)?;

        let mut transposed = vec![0.0; rows * cols];
        for r in 0..rows {
            for c in 0..cols {
                transposed[c * rows + r] = input[r * cols + c];
            }
        }
        let mut inner = vec![0.0; rows * cols];
        convolve_iir_inner_single_noavx(&transposed, rows, cols, &mut inner, &coefs)?;

        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(outer[r * cols + c], inner[c * rows + r]);
            }
        }
        Ok(())
    }

    #[test]
    fn test_avx_matches_scalar() -> Result<(), FilterError> {
        if !avx::is_supported() {
            return Ok(());
        }

        for order in 0..3 {
            let coefs = Coefficients::new(3.0, order)?;
            for n_pixels in [16, 17, 64, 513] {
                let n_times = 7;
                let input = random_signal(n_pixels * n_times);
                let mut scalar = vec![0.0; input.len()];
                let mut vector = vec![0.0; input.len()];

                convolve_iir_inner_single_noavx(&input, n_pixels, n_times, &mut scalar, &coefs)?;
                convolve_iir_inner_single_avx(&input, n_pixels, n_times, &mut vector, &coefs)?;
                for (s, v) in scalar.iter().zip(vector.iter()) {
                    assert_relative_eq!(s, v, epsilon = 1e-5);
                }

                let stride = n_times + 2;
                let input = random_signal(n_pixels * stride);
                let mut scalar = vec![0.0; input.len()];
                let mut vector = vec![0.0; input.len()];

                convolve_iir_outer_single_noavx(
                    &input,
                    n_pixels,
                    n_times,
                    &mut scalar,
                    &coefs,
                    stride,
                )?;
                convolve_iir_outer_single_avx(
                    &input,
                    n_pixels,
                    n_times,
                    &mut vector,
                    &coefs,
                    stride,
                )?;
                for (s, v) in scalar.iter().zip(vector.iter()) {
                    assert_relative_eq!(s, v, epsilon = 1e-5);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_avx_unavailable() -> Result<(), FilterError> {
        if avx::is_supported() {
            return Ok(());
        }

        let coefs = Coefficients::new(1.0, 0)?;
        let input = [0.0; 16];
        let mut output = [1.0; 16];
        assert_eq!(
            convolve_iir_inner_single_avx(&input, 16, 1, &mut output, &coefs),
            Err(FilterError::CpuFeatureUnavailable("avx2"))
        );
        assert_eq!(output, [1.0; 16]);
        Ok(())
    }

    #[test]
    fn test_dispatch_disabled_avx() -> Result<(), FilterError> {
        let _guard = cpu::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let coefs = Coefficients::new(2.5, 2)?;
        let input = random_signal(50 * 9);
        let mut expected = vec![0.0; input.len()];
        let mut output = vec![0.0; input.len()];

        cpu::enable_avx2(false);
        convolve_iir_inner_single_noavx(&input, 50, 9, &mut expected, &coefs)?;
        let result = convolve_iir_inner_single(&input, 50, 9, &mut output, &coefs);
        cpu::reset_overrides();

        result?;
        assert_eq!(output, expected);
        Ok(())
    }

    #[test]
    fn test_dispatch_forced_avx() -> Result<(), FilterError> {
        let _guard = cpu::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let coefs = Coefficients::new(1.0, 0)?;
        let input = random_signal(32 * 5);
        let mut output = vec![0.0; input.len()];

        // forcing the flag on a cpu without AVX2 must still run
        cpu::enable_avx2(true);
        let result = convolve_iir_inner_single(&input, 32, 5, &mut output, &coefs);
        cpu::reset_overrides();

        result
    }

    #[test]
    fn test_constant_signal() -> Result<(), FilterError> {
        let input = vec![1.0f32; 60];
        let mut output = vec![0.0f32; 60];

        convolve_iir_inner_single(&input, 60, 1, &mut output, &Coefficients::new(3.0, 0)?)?;
        for v in &output {
            assert_relative_eq!(*v, 1.0, epsilon = 1e-5);
        }

        for order in [1, 2] {
            let coefs = Coefficients::new(3.0, order)?;
            convolve_iir_inner_single(&input, 60, 1, &mut output, &coefs)?;
            for v in &output {
                assert!(v.abs() < 1e-5, "order {order}: {v}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_impulse_response() -> Result<(), FilterError> {
        let sigma = 2.0;
        let n = 101;
        let center = n / 2;
        let mut input = vec![0.0f32; n];
        input[center] = 1.0;
        let mut output = vec![0.0f32; n];

        convolve_iir_inner_single(&input, n, 1, &mut output, &Coefficients::new(sigma, 0)?)?;

        let peak = 1.0 / (sigma * (2.0 * std::f64::consts::PI).sqrt());
        assert_relative_eq!(output[center] as f64, peak, epsilon = 1e-3 * peak);
        for k in 1..center {
            assert_relative_eq!(output[center - k], output[center + k], epsilon = 1e-6);
        }

        let sum = output.iter().map(|v| *v as f64).sum::<f64>();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
        Ok(())
    }

    #[test]
    fn test_derivatives() -> Result<(), FilterError> {
        let n = 120;
        let ramp = (0..n).map(|i| i as f32 * 0.5).collect::<Vec<_>>();
        let parabola = (0..n)
            .map(|i| {
                let x = i as f32 - 60.0;
                x * x
            })
            .collect::<Vec<_>>();
        let mut output = vec![0.0f32; n];

        convolve_iir_inner_single(&ramp, n, 1, &mut output, &Coefficients::new(3.0, 1)?)?;
        for v in &output[30..90] {
            assert_relative_eq!(*v, 0.5, epsilon = 1e-3);
        }

        convolve_iir_inner_single(&parabola, n, 1, &mut output, &Coefficients::new(3.0, 2)?)?;
        for v in &output[40..80] {
            assert_relative_eq!(*v, 2.0, epsilon = 1e-2);
        }
        Ok(())
    }

    #[test]
    fn test_inplace() -> Result<(), FilterError> {
        let coefs = Coefficients::new(1.7, 1)?;
        let input = random_signal(30 * 6);

        let mut expected = vec![0.0; input.len()];
        convolve_iir_inner_single(&input, 30, 6, &mut expected, &coefs)?;
        let mut data = input.clone();
        convolve_iir_inner_single_inplace(&mut data, 30, 6, &coefs)?;
        assert_eq!(data, expected);

        convolve_iir_outer_single(&input, 30, 6, &mut expected, &coefs, 6)?;
        let mut data = input.clone();
        convolve_iir_outer_single_inplace(&mut data, 30, 6, &coefs, 6)?;
        assert_eq!(data, expected);
        Ok(())
    }

    #[test]
    fn test_errors() -> Result<(), FilterError> {
        let coefs = Coefficients::new(2.0, 0)?;
        let input = [0.0; 24];
        let mut output = [1.0; 24];

        assert_eq!(
            convolve_iir_inner_single(&input, 8, 3, &mut output, &coefs),
            Err(FilterError::SignalTooShort {
                n_pixels: 8,
                n_border: 8
            })
        );
        assert_eq!(
            convolve_iir_inner_single(&input, 12, 0, &mut output, &coefs),
            Err(FilterError::EmptyInput)
        );
        assert_eq!(
            convolve_iir_inner_single(&input, 12, 3, &mut output, &coefs),
            Err(FilterError::BufferTooSmall {
                required: 36,
                actual: 24
            })
        );
        assert_eq!(
            convolve_iir_outer_single(&input, 12, 2, &mut output[..20], &coefs, 2),
            Err(FilterError::BufferTooSmall {
                required: 24,
                actual: 20
            })
        );
        assert_eq!(
            convolve_iir_outer_single(&input, 12, 2, &mut output, &coefs, 1),
            Err(FilterError::InvalidStride {
                stride: 1,
                n_times: 2
            })
        );
        assert_eq!(output, [1.0; 24]);
        Ok(())
    }

    #[test]
    fn test_overflowing_layout() -> Result<(), FilterError> {
        let coefs = Coefficients::new(2.0, 0)?;
        let input = [0.0; 64];
        let mut output = [1.0; 64];
        let mut data = [1.0; 64];
        let too_small = Err(FilterError::BufferTooSmall {
            required: usize::MAX,
            actual: 64,
        });

        let stride = usize::MAX / 4;
        assert_eq!(
            convolve_iir_outer_single_noavx(&input, 10, 1, &mut output, &coefs, stride),
            too_small
        );
        assert_eq!(
            convolve_iir_outer_single_avx(&input, 10, 1, &mut output, &coefs, stride),
            too_small
        );
        assert_eq!(
            convolve_iir_outer_single(&input, 10, 1, &mut output, &coefs, stride),
            too_small
        );
        assert_eq!(
            convolve_iir_outer_single_inplace(&mut data, 10, 1, &coefs, stride),
            too_small
        );

        let n_pixels = usize::MAX / 2;
        assert_eq!(
            convolve_iir_inner_single_noavx(&input, n_pixels, 3, &mut output, &coefs),
            too_small
        );
        assert_eq!(
            convolve_iir_inner_single(&input, n_pixels, 3, &mut output, &coefs),
            too_small
        );
        assert_eq!(
            convolve_iir_inner_single_inplace(&mut data, n_pixels, 3, &coefs),
            too_small
        );

        assert_eq!(output, [1.0; 64]);
        assert_eq!(data, [1.0; 64]);
        Ok(())
    }
}
