use num_traits::Float;

use crate::error::FilterError;

/// Maximum number of half coefficients a [`Kernel`] can hold.
pub const MAX_HALF_COEFS: usize = 13;

/// Maximum number of coefficients of the expanded kernel.
pub const MAX_FULL_COEFS: usize = 2 * MAX_HALF_COEFS - 1;

/// Largest half kernel accepted when building a kernel from a standard deviation.
const MAX_GAUSSIAN_COEFS: usize = 12;

/// Sample the `order`-th derivative of an unnormalized gaussian at `x`.
fn gaussian_derivative<T: Float>(x: T, sigma: T, order: u32) -> T {
    let sigma_sq = sigma * sigma;
    let g = (-(x * x) / (sigma_sq + sigma_sq)).exp();
    match order {
        0 => g,
        1 => -x / sigma_sq * g,
        _ => (x * x - sigma_sq) / (sigma_sq * sigma_sq) * g,
    }
}

/// Fill `out[..n_coefs]` with the non-negative half of a gaussian derivative kernel.
///
/// `out[0]` is the center tap and `out[k]` the tap at distance `k` from it. The kernel is
/// normalized for its order, considering the full kernel obtained by mirroring the half:
///
/// * order 0 sums to one.
/// * order 1 sums to zero and responds with 1 to the ramp `x[i] = i`.
/// * order 2 sums to zero and responds with 2 to the parabola `x[i] = i^2`.
///
/// # Arguments
///
/// * `stddev` - The standard deviation of the gaussian.
/// * `order` - The derivative order, 0, 1 or 2.
/// * `n_coefs` - The number of half coefficients to generate.
/// * `out` - The half kernel buffer.
///
/// # Returns
///
/// False if the order is unsupported, `n_coefs` is zero or exceeds the buffer capacity, or
/// the standard deviation is not a finite positive number. `out` is left untouched then.
pub fn make_gaussian(
    stddev: f64,
    order: u32,
    n_coefs: usize,
    out: &mut [f32; MAX_HALF_COEFS],
) -> bool {
    if order > 2 || n_coefs == 0 || n_coefs > MAX_HALF_COEFS {
        return false;
    }

    if !stddev.is_finite() || stddev <= 0.0 {
        return false;
    }

    let mut half = [0f64; MAX_HALF_COEFS];
    for (k, coef) in half.iter_mut().enumerate().take(n_coefs) {
        *coef = gaussian_derivative(k as f64, stddev, order);
    }
    let half = &mut half[..n_coefs];

    // sum of a moment over the full kernel, using the parity of the order
    let full_moment = |half: &[f64], power: i32| -> f64 {
        let tail = half
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, c)| (k as f64).powi(power) * c)
            .sum::<f64>();
        let center = if power == 0 { half[0] } else { 0.0 };
        center + 2.0 * tail
    };

    let norm = match order {
        0 => full_moment(half, 0),
        1 => -full_moment(half, 1),
        _ => {
            // remove the dc component left by the truncation
            let dc = full_moment(half, 0) / (2 * n_coefs - 1) as f64;
            half.iter_mut().for_each(|c| *c -= dc);
            full_moment(half, 2) / 2.0
        }
    };

    if !norm.is_finite() || norm == 0.0 {
        return false;
    }

    for (dst, src) in out.iter_mut().zip(half.iter()) {
        *dst = (src / norm) as f32;
    }

    true
}

/// A separable FIR kernel stored as its non-negative half.
///
/// The full kernel is expanded at construction time: the tap at offset `k` from the center is
/// `half[|k|]` for symmetric kernels and `sign(k) * half[|k|]` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    is_symmetric: bool,
    half: [f32; MAX_HALF_COEFS],
    full: [f32; MAX_FULL_COEFS],
    size: usize,
}

impl Kernel {
    /// Create a kernel from its half coefficients.
    ///
    /// # Arguments
    ///
    /// * `coefs` - The half coefficients, center tap first.
    /// * `symmetric` - Whether the kernel is even (true) or odd (false).
    ///
    /// # Errors
    ///
    /// Fails if `coefs` is empty or holds more than [`MAX_HALF_COEFS`] values.
    pub fn new(coefs: &[f32], symmetric: bool) -> Result<Self, FilterError> {
        if coefs.is_empty() || coefs.len() > MAX_HALF_COEFS {
            return Err(FilterError::InvalidKernelLength(coefs.len()));
        }

        let mut half = [0f32; MAX_HALF_COEFS];
        half[..coefs.len()].copy_from_slice(coefs);

        Ok(Self::from_half(half, coefs.len(), symmetric))
    }

    /// Create a gaussian derivative kernel truncated at four standard deviations.
    ///
    /// The kernel holds `floor(4 * stddev)` half coefficients; even orders give symmetric
    /// kernels and odd orders antisymmetric ones.
    ///
    /// # Errors
    ///
    /// * [`FilterError::UnsupportedOrder`] if `order` is greater than 2.
    /// * [`FilterError::KernelTooLarge`] if more than 12 half coefficients are needed. Use the
    ///   recursive filters from [`crate::iir`] for such scales.
    /// * [`FilterError::InvalidGaussian`] if the coefficients cannot be generated, e.g. for a
    ///   standard deviation below 0.25.
    pub fn gaussian(stddev: f64, order: u32) -> Result<Self, FilterError> {
        if order > 2 {
            return Err(FilterError::UnsupportedOrder(order));
        }

        let n_coefs = if stddev.is_finite() && stddev > 0.0 {
            (stddev * 4.0) as usize
        } else {
            0
        };

        if n_coefs > MAX_GAUSSIAN_COEFS {
            return Err(FilterError::KernelTooLarge(n_coefs));
        }

        let mut half = [0f32; MAX_HALF_COEFS];
        if !make_gaussian(stddev, order, n_coefs, &mut half) {
            return Err(FilterError::InvalidGaussian { stddev, order });
        }

        Ok(Self::from_half(half, n_coefs, order % 2 == 0))
    }

    fn from_half(half: [f32; MAX_HALF_COEFS], size: usize, is_symmetric: bool) -> Self {
        let center = size - 1;
        let mut full = [0f32; MAX_FULL_COEFS];

        for (idx, tap) in full.iter_mut().enumerate().take(2 * size - 1) {
            *tap = match idx {
                i if i == center => half[0],
                i if i < center && is_symmetric => half[center - i],
                i if i < center => -half[center - i],
                i => half[i - center],
            };
        }

        Self {
            is_symmetric,
            half,
            full,
            size,
        }
    }

    /// Whether the kernel is even (symmetric) or odd (antisymmetric).
    pub fn is_symmetric(&self) -> bool {
        self.is_symmetric
    }

    /// The number of half coefficients.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The radius of the kernel, i.e. the offset of its outermost tap.
    pub fn radius(&self) -> usize {
        self.size - 1
    }

    /// The number of coefficients of the full kernel.
    pub fn len(&self) -> usize {
        2 * self.size - 1
    }

    /// A kernel always holds at least its center tap.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The half coefficients, center tap first.
    pub fn half_coefs(&self) -> &[f32] {
        &self.half[..self.size]
    }

    /// The full kernel, from offset `-radius` to `+radius`.
    pub fn full_coefs(&self) -> &[f32] {
        &self.full[..self.len()]
    }
}

impl std::ops::Index<usize> for Kernel {
    type Output = f32;

    fn index(&self, idx: usize) -> &f32 {
        &self.full_coefs()[idx]
    }
}
