use kornia_gaussian::{
    convolve_fir, convolve_iir_inner_single, convolve_iir_outer_single, fir_filter, iir_filter,
    Coefficients, ExecutionStrategy, FilterError, Kernel,
};
use rand::Rng;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_array(len: usize) -> Vec<f32> {
    let mut rng = rand::rng();
    (0..len).map(|_| rng.random_range(0.0..1.0)).collect()
}

fn mirror(idx: isize, n: usize) -> usize {
    let period = 2 * (n as isize - 1);
    let m = idx.rem_euclid(period);
    if m < n as isize {
        m as usize
    } else {
        (period - m) as usize
    }
}

/// Exact gaussian smoothing of a 2D array with whole-sample mirrored borders, in f64.
fn reference_gaussian_2d(input: &[f32], rows: usize, cols: usize, sigma: f64) -> Vec<f64> {
    let radius = (8.0 * sigma).ceil() as isize;
    let weights = (-radius..=radius)
        .map(|k| (-((k * k) as f64) / (2.0 * sigma * sigma)).exp())
        .collect::<Vec<_>>();
    let total = weights.iter().sum::<f64>();
    let weights = weights.iter().map(|w| w / total).collect::<Vec<_>>();

    let mut tmp = vec![0f64; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            tmp[r * cols + c] = (-radius..=radius)
                .zip(weights.iter())
                .map(|(k, w)| w * input[r * cols + mirror(c as isize + k, cols)] as f64)
                .sum();
        }
    }

    let mut out = vec![0f64; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[r * cols + c] = (-radius..=radius)
                .zip(weights.iter())
                .map(|(k, w)| w * tmp[mirror(r as isize + k, rows) * cols + c])
                .sum();
        }
    }
    out
}

fn relative_rms(actual: &[f32], expected: &[f64]) -> f64 {
    let err = actual
        .iter()
        .zip(expected.iter())
        .map(|(a, e)| (*a as f64 - e).powi(2))
        .sum::<f64>();
    let norm = expected.iter().map(|e| e * e).sum::<f64>();
    (err / norm).sqrt()
}

#[test]
fn test_smoothing_matches_gaussian_2d() -> Result<(), FilterError> {
    init_logger();
    let (rows, cols) = (32, 32);
    let input = random_array(rows * cols);
    let expected = reference_gaussian_2d(&input, rows, cols, 1.0);

    let mut output = vec![0.0; rows * cols];
    iir_filter(
        &input,
        &[rows, cols],
        &mut output,
        &Coefficients::new(1.0, 0)?,
        ExecutionStrategy::Serial,
    )?;
    let err = relative_rms(&output, &expected);
    assert!(err < 1e-2, "iir relative rms error {err}");

    fir_filter(
        &input,
        &[rows, cols],
        &mut output,
        &Kernel::gaussian(1.0, 0)?,
        ExecutionStrategy::Serial,
    )?;
    let err = relative_rms(&output, &expected);
    assert!(err < 1e-2, "fir relative rms error {err}");
    Ok(())
}

#[test]
fn test_iir_3d_matches_manual_axes() -> Result<(), FilterError> {
    init_logger();
    let shape = [6, 10, 12];
    let len = shape.iter().product::<usize>();
    let input = random_array(len);
    let coefs = Coefficients::new(1.0, 1)?;

    // last axis, contiguous signals
    let mut axis2 = vec![0.0; len];
    convolve_iir_inner_single(&input, 12, 60, &mut axis2, &coefs)?;

    // middle axis, one block of interleaved signals per index of the first axis
    let mut axis1 = vec![0.0; len];
    for (src, dst) in axis2.chunks(120).zip(axis1.chunks_mut(120)) {
        convolve_iir_outer_single(src, 10, 12, dst, &coefs, 12)?;
    }

    let mut expected = vec![0.0; len];
    convolve_iir_outer_single(&axis1, 6, 120, &mut expected, &coefs, 120)?;

    let mut output = vec![0.0; len];
    iir_filter(&input, &shape, &mut output, &coefs, ExecutionStrategy::Serial)?;
    assert_eq!(output, expected);

    iir_filter(&input, &shape, &mut output, &coefs, ExecutionStrategy::Parallel)?;
    assert_eq!(output, expected);
    Ok(())
}

#[test]
fn test_fir_3d_matches_manual_axes() -> Result<(), FilterError> {
    init_logger();
    let shape = [5, 4, 9];
    let len = shape.iter().product::<usize>();
    let input = random_array(len);
    let kernel = Kernel::gaussian(1.5, 2)?;

    let mut axis2 = vec![0.0; len];
    convolve_fir(&input, 9, 20, 1, 9, &mut axis2, &kernel)?;

    let mut axis1 = vec![0.0; len];
    for (src, dst) in axis2.chunks(36).zip(axis1.chunks_mut(36)) {
        convolve_fir(src, 1, 9, 9, 4, dst, &kernel)?;
    }

    let mut expected = vec![0.0; len];
    convolve_fir(&axis1, 1, 36, 36, 5, &mut expected, &kernel)?;

    let mut output = vec![0.0; len];
    fir_filter(&input, &shape, &mut output, &kernel, ExecutionStrategy::Serial)?;
    assert_eq!(output, expected);
    Ok(())
}
