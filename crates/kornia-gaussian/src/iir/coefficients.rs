use std::fmt;

use num_complex::Complex64;

use crate::error::FilterError;

/// Deriche's fourth order fit of a gaussian derivative, for a unit sigma.
///
/// The causal half of the impulse response is
/// `(a0 cos(w0 x) + a1 sin(w0 x)) exp(-b0 x) + (c0 cos(w1 x) + c1 sin(w1 x)) exp(-b1 x)`.
struct DericheFit {
    a0: f64,
    a1: f64,
    b0: f64,
    b1: f64,
    w0: f64,
    w1: f64,
    c0: f64,
    c1: f64,
}

#[rustfmt::skip]
const DERICHE_FITS: [DericheFit; 3] = [
    DericheFit { a0: 1.680, a1: 3.735, b0: 1.783, b1: 1.723, w0: 0.6318, w1: 1.997, c0: -0.6803, c1: -0.2598 },
    DericheFit { a0: -0.6472, a1: -4.531, b0: 1.527, b1: 1.516, w0: 0.6719, w1: 2.072, c0: 0.6494, c1: 0.9557 },
    DericheFit { a0: -1.331, a1: 3.661, b0: 1.240, b1: 1.314, w0: 0.748, w1: 2.166, c0: 0.3225, c1: -1.738 },
];

/// Number of standard deviations mirrored at each end of a signal.
const BORDER_SIGMAS: f64 = 4.0;

/// Zeroth, first and second moments of the impulse response of `num(u) / den(u)`.
///
/// Both polynomials are in `u = z^-1` with ascending powers. The moments are
/// `sum_n n^p h(n)` for `n >= 0`, obtained from the derivatives of the transfer function at
/// `u = 1`.
fn moments(num: &[f64; 5], den: &[f64; 5]) -> [f64; 3] {
    let eval = |p: &[f64; 5]| -> [f64; 3] {
        let mut v = [0f64; 3];
        for (k, &c) in p.iter().enumerate() {
            let k = k as f64;
            v[0] += c;
            v[1] += k * c;
            v[2] += k * (k - 1.0) * c;
        }
        v
    };

    let [n, n1, n2] = eval(num);
    let [d, d1, d2] = eval(den);

    let f = n / d;
    let f1 = (n1 * d - n * d1) / (d * d);
    let f2 = (n2 * d - n * d2) / (d * d) - 2.0 * d1 * (n1 * d - n * d1) / (d * d * d);

    [f, f1, f2 + f1]
}

/// Recursive filter coefficients approximating a gaussian derivative.
///
/// The filter runs a causal pass with the taps [`Coefficients::n_causal`] and an anticausal
/// pass with [`Coefficients::n_anticausal`], both sharing the feedback taps
/// [`Coefficients::d`]. The sum of both passes approximates the convolution with the
/// `order`-th derivative of a gaussian of standard deviation `sigma`, normalized like the FIR
/// kernels of [`crate::fir::make_gaussian`].
///
/// Even orders apply the causal taps to the samples at distance 0 to 3, odd orders to the
/// samples at distance 1 to 4 so that the center tap of the antisymmetric response is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficients {
    n_causal: [f64; 4],
    n_anticausal: [f64; 4],
    d: [f64; 4],
    sigma: f64,
    order: u32,
    n_border: usize,
}

impl Coefficients {
    /// Derive the recursive filter coefficients for a gaussian derivative.
    ///
    /// # Arguments
    ///
    /// * `sigma` - The standard deviation of the gaussian.
    /// * `order` - The derivative order, 0, 1 or 2.
    ///
    /// # Errors
    ///
    /// Fails if the order is greater than 2 or `sigma` is not a finite positive number.
    pub fn new(sigma: f64, order: u32) -> Result<Self, FilterError> {
        if order > 2 {
            return Err(FilterError::UnsupportedOrder(order));
        }

        if !sigma.is_finite() || sigma <= 0.0 {
            return Err(FilterError::InvalidSigma(sigma));
        }

        let fit = &DERICHE_FITS[order as usize];

        // a cos(w x) + b sin(w x) = 2 Re[(a - ib) / 2 exp(iwx)], one residue per pole
        let mut poles = [Complex64::new(0.0, 0.0); 4];
        let mut residues = [Complex64::new(0.0, 0.0); 4];
        for (k, (a, b, beta, omega)) in [
            (fit.a0, fit.a1, fit.b0, fit.w0),
            (fit.c0, fit.c1, fit.b1, fit.w1),
        ]
        .into_iter()
        .enumerate()
        {
            let pole = Complex64::new(-beta / sigma, omega / sigma).exp();
            let residue = Complex64::new(a / 2.0, -b / 2.0);
            poles[2 * k] = pole;
            poles[2 * k + 1] = pole.conj();
            residues[2 * k] = residue;
            residues[2 * k + 1] = residue.conj();
        }

        // den(u) = prod_k (1 - p_k u), num(u) = sum_k r_k prod_{j != k} (1 - p_j u)
        let mul_root = |poly: &mut [Complex64; 5], pole: Complex64| {
            for i in (1..5).rev() {
                poly[i] = poly[i] - pole * poly[i - 1];
            }
        };

        let mut den_c = [Complex64::new(0.0, 0.0); 5];
        den_c[0] = Complex64::new(1.0, 0.0);
        for &pole in poles.iter() {
            mul_root(&mut den_c, pole);
        }

        let mut num_c = [Complex64::new(0.0, 0.0); 5];
        for (k, &residue) in residues.iter().enumerate() {
            let mut term = [Complex64::new(0.0, 0.0); 5];
            term[0] = residue;
            for (j, &pole) in poles.iter().enumerate() {
                if j != k {
                    mul_root(&mut term, pole);
                }
            }
            num_c.iter_mut().zip(term.iter()).for_each(|(n, t)| *n += t);
        }

        // conjugate pairs make both polynomials real
        let den = den_c.map(|c| c.re);
        let mut num = num_c.map(|c| c.re);

        let sign = if order % 2 == 0 { 1.0 } else { -1.0 };

        if order % 2 == 1 {
            // drop the center tap: num(u) - h(0) den(u) vanishes at u = 0
            let h0 = num[0];
            num.iter_mut().zip(den.iter()).for_each(|(n, d)| *n -= h0 * d);
            num[0] = 0.0;
        }

        if order == 2 {
            // cancel the residual dc gain of the fit, keeping the response symmetric
            let [s0, _, _] = moments(&num, &den);
            let dc = 2.0 * s0 - num[0];
            num[1] -= dc / 2.0 * den.iter().sum::<f64>();
        }

        let [s0, s1, s2] = moments(&num, &den);
        let norm = match order {
            0 => 2.0 * s0 - num[0],
            1 => -2.0 * s1,
            _ => s2,
        };
        num.iter_mut().for_each(|n| *n /= norm);

        let mut n_causal = [0f64; 4];
        let mut n_anticausal = [0f64; 4];
        let mut d = [0f64; 4];
        let offset = (order % 2) as usize;
        for k in 0..4 {
            n_causal[k] = num[k + offset];
            n_anticausal[k] = sign * (num[k + 1] - num[0] * den[k + 1]);
            d[k] = den[k + 1];
        }

        let n_border = ((BORDER_SIGMAS * sigma).ceil() as usize).max(1);

        Ok(Self {
            n_causal,
            n_anticausal,
            d,
            sigma,
            order,
            n_border,
        })
    }

    /// The standard deviation of the approximated gaussian.
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// The derivative order.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// The feed forward taps of the causal pass.
    pub fn n_causal(&self) -> &[f64; 4] {
        &self.n_causal
    }

    /// The feed forward taps of the anticausal pass.
    pub fn n_anticausal(&self) -> &[f64; 4] {
        &self.n_anticausal
    }

    /// The feedback taps shared by both passes.
    pub fn d(&self) -> &[f64; 4] {
        &self.d
    }

    /// The number of mirrored samples used to seed each pass.
    pub fn n_border(&self) -> usize {
        self.n_border
    }

    /// The distance of the first causal tap from the current sample, 0 or 1.
    pub(crate) fn causal_offset(&self) -> usize {
        (self.order % 2) as usize
    }

    /// Steady state output of the causal pass for a unit constant input.
    pub(crate) fn causal_gain(&self) -> f64 {
        self.n_causal.iter().sum::<f64>() / (1.0 + self.d.iter().sum::<f64>())
    }

    /// Steady state output of the anticausal pass for a unit constant input.
    pub(crate) fn anticausal_gain(&self) -> f64 {
        self.n_anticausal.iter().sum::<f64>() / (1.0 + self.d.iter().sum::<f64>())
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<IIRCoefficients with sigma = {} and order = {}>",
            self.sigma, self.order
        )
    }
}
