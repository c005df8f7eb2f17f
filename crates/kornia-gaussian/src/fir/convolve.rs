use super::kernel::Kernel;
use crate::error::FilterError;

/// Map a possibly out of range index onto `0..n` by whole-sample mirroring.
///
/// `-k` maps to `k` and `n - 1 + k` maps to `n - 1 - k`, repeating for indices further away.
#[inline]
pub(crate) fn mirror_index(idx: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = idx.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Minimum length of a buffer holding `count` signals of `len` elements with the given strides.
///
/// Returns `None` if `count` or `len` is zero, or if the length does not fit in `usize`.
pub(crate) fn required_len(
    count: usize,
    count_stride: usize,
    len: usize,
    stride: usize,
) -> Option<usize> {
    let last_signal = count.checked_sub(1)?.checked_mul(count_stride)?;
    let last_elem = len.checked_sub(1)?.checked_mul(stride)?;
    last_signal.checked_add(last_elem)?.checked_add(1)
}

fn check_fir_args(
    len: usize,
    pixel_stride: usize,
    pixel_n: usize,
    dim_stride: usize,
    dim: usize,
) -> Result<(), FilterError> {
    if pixel_n == 0 || dim == 0 {
        return Err(FilterError::EmptyInput);
    }

    // a layout that overflows cannot fit in any buffer
    let required = required_len(pixel_n, pixel_stride, dim, dim_stride).unwrap_or(usize::MAX);
    if len < required {
        return Err(FilterError::BufferTooSmall {
            required,
            actual: len,
        });
    }

    Ok(())
}

/// Convolve one signal held in the padded `line` into `dst`, writing with the given stride.
///
/// `line` holds `radius` mirrored samples on each side of the signal.
#[inline]
fn convolve_line(line: &[f32], dim: usize, kernel: &Kernel, dst: &mut [f32], dst_stride: usize) {
    let coefs = kernel.full_coefs();
    let taps = coefs.len();

    for i in 0..dim {
        // output[i] = sum_k coefs[r + k] * x[i - k], the window is read backwards
        let window = &line[i..i + taps];
        let acc = coefs
            .iter()
            .zip(window.iter().rev())
            .fold(0f32, |acc, (&c, &x)| acc + c * x);
        dst[i * dst_stride] = acc;
    }
}

/// Gather a strided signal into `line` with the mirrored padding of `radius` samples.
#[inline]
fn fill_line(src: &[f32], stride: usize, dim: usize, radius: usize, line: &mut [f32]) {
    for (j, value) in line.iter_mut().enumerate() {
        let idx = mirror_index(j as isize - radius as isize, dim);
        *value = src[idx * stride];
    }
}

/// Convolve a FIR kernel along one dimension of a flattened array.
///
/// The input holds `pixel_n` independent signals of `dim` elements. Element `j` of signal
/// `p` lives at `p * pixel_stride + j * dim_stride`, and the result is written at the same
/// position of `output`. Samples beyond the signal ends are mirrored around the edge
/// samples, i.e. `x[-k] = x[k]`.
///
/// # Arguments
///
/// * `input` - The input buffer.
/// * `pixel_stride` - The distance between the first elements of consecutive signals.
/// * `pixel_n` - The number of signals.
/// * `dim_stride` - The distance between consecutive elements of a signal.
/// * `dim` - The number of elements of each signal.
/// * `output` - The output buffer, with the same layout as the input.
/// * `kernel` - The kernel to convolve with.
///
/// # Errors
///
/// Fails without writing if there is no signal or no element, or if a buffer is too small
/// for the given layout.
pub fn convolve_fir(
    input: &[f32],
    pixel_stride: usize,
    pixel_n: usize,
    dim_stride: usize,
    dim: usize,
    output: &mut [f32],
    kernel: &Kernel,
) -> Result<(), FilterError> {
    check_fir_args(input.len(), pixel_stride, pixel_n, dim_stride, dim)?;
    check_fir_args(output.len(), pixel_stride, pixel_n, dim_stride, dim)?;

    let radius = kernel.radius();
    let mut line = vec![0f32; dim + 2 * radius];

    for p in 0..pixel_n {
        let offset = p * pixel_stride;
        fill_line(&input[offset..], dim_stride, dim, radius, &mut line);
        convolve_line(&line, dim, kernel, &mut output[offset..], dim_stride);
    }

    Ok(())
}

/// Convolve a FIR kernel along one dimension of a flattened array, in place.
///
/// Same layout and boundary handling as [`convolve_fir`]. Each signal is copied before it is
/// overwritten, so the result is identical to the out of place version.
pub fn convolve_fir_inplace(
    data: &mut [f32],
    pixel_stride: usize,
    pixel_n: usize,
    dim_stride: usize,
    dim: usize,
    kernel: &Kernel,
) -> Result<(), FilterError> {
    check_fir_args(data.len(), pixel_stride, pixel_n, dim_stride, dim)?;

    let radius = kernel.radius();
    let mut line = vec![0f32; dim + 2 * radius];

    for p in 0..pixel_n {
        let offset = p * pixel_stride;
        fill_line(&data[offset..], dim_stride, dim, radius, &mut line);
        convolve_line(&line, dim, kernel, &mut data[offset..], dim_stride);
    }

    Ok(())
}
