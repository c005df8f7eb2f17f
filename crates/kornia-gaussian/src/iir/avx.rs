//! AVX2 implementation of the recursive filters.
//!
//! Four signals are filtered at once, one per `f64` lane. The arithmetic follows the scalar
//! implementation operation by operation (no fused multiply-add), so both paths produce the
//! same results.

#[cfg(target_arch = "x86")]
use std::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use super::coefficients::Coefficients;
use super::{IoBuffers, SignalLayout};
use crate::error::FilterError;

/// Number of signals processed per vector.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
const LANES: usize = 4;

/// Returns true if the cpu running the process supports AVX2.
///
/// Unlike [`crate::cpu::has_avx2`] this ignores overrides.
pub(crate) fn is_supported() -> bool {
    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    {
        is_x86_feature_detected!("avx2")
    }
    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    {
        false
    }
}

/// Filter every signal of the layout with AVX2, falling back to scalar code for the
/// signals that do not fill a vector.
pub(crate) fn filter_signals(
    io: &mut IoBuffers<'_>,
    layout: &SignalLayout,
    coefs: &Coefficients,
) -> Result<(), FilterError> {
    if !is_supported() {
        return Err(FilterError::CpuFeatureUnavailable("avx2"));
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    unsafe {
        filter_signals_avx2(io, layout, coefs);
    }

    #[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
    let _ = (io, layout, coefs);

    Ok(())
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2")]
unsafe fn filter_signals_avx2(io: &mut IoBuffers<'_>, layout: &SignalLayout, coefs: &Coefficients) {
    let n_border = coefs.n_border();
    let len = super::scalar::extended_len(layout.n_pixels, n_border);
    let n_groups = layout.n_times / LANES;

    let mut ext = vec![0f64; len * LANES];
    let mut causal = vec![0f64; len * LANES];

    for group in 0..n_groups {
        let first = group * LANES;
        fill_extended_x4(io.input(), layout, first, n_border, &mut ext);
        filter_extended_x4(coefs, &ext, &mut causal, layout, first, io.output());
    }

    super::scalar::filter_signals(io, layout, coefs, n_groups * LANES..layout.n_times);
}

/// Gather four consecutive signals into an interleaved extended line, lane `l` of sample `j`
/// at `ext[j * 4 + l]`.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2")]
unsafe fn fill_extended_x4(
    src: &[f32],
    layout: &SignalLayout,
    first: usize,
    n_border: usize,
    ext: &mut [f64],
) {
    let offsets: [usize; LANES] = std::array::from_fn(|l| layout.offset(first + l));

    for (j, lanes) in ext.chunks_exact_mut(LANES).enumerate() {
        let idx = super::scalar::extended_index(j, layout.n_pixels, n_border) * layout.elem_stride;

        if layout.signal_stride == 1 {
            // interleaved signals, the four lanes are contiguous
            let v = &src[offsets[0] + idx..offsets[0] + idx + LANES];
            let x = _mm256_cvtps_pd(_mm_loadu_ps(v.as_ptr()));
            _mm256_storeu_pd(lanes.as_mut_ptr(), x);
        } else {
            for (value, offset) in lanes.iter_mut().zip(offsets.iter()) {
                *value = src[offset + idx] as f64;
            }
        }
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn splat(taps: &[f64; 4]) -> [__m256d; 4] {
    [
        _mm256_set1_pd(taps[0]),
        _mm256_set1_pd(taps[1]),
        _mm256_set1_pd(taps[2]),
        _mm256_set1_pd(taps[3]),
    ]
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load(line: &[f64], j: usize) -> __m256d {
    _mm256_loadu_pd(line[j * LANES..(j + 1) * LANES].as_ptr())
}

/// One recursion step: feed forward then feedback terms, in the order of the scalar code.
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn step(n: &[__m256d; 4], d: &[__m256d; 4], x: &[__m256d; 4], y: &[__m256d; 4]) -> __m256d {
    let mut acc = _mm256_mul_pd(n[0], x[0]);
    acc = _mm256_add_pd(acc, _mm256_mul_pd(n[1], x[1]));
    acc = _mm256_add_pd(acc, _mm256_mul_pd(n[2], x[2]));
    acc = _mm256_add_pd(acc, _mm256_mul_pd(n[3], x[3]));
    acc = _mm256_sub_pd(acc, _mm256_mul_pd(d[0], y[0]));
    acc = _mm256_sub_pd(acc, _mm256_mul_pd(d[1], y[1]));
    acc = _mm256_sub_pd(acc, _mm256_mul_pd(d[2], y[2]));
    _mm256_sub_pd(acc, _mm256_mul_pd(d[3], y[3]))
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
#[target_feature(enable = "avx2")]
unsafe fn filter_extended_x4(
    coefs: &Coefficients,
    ext: &[f64],
    causal: &mut [f64],
    layout: &SignalLayout,
    first: usize,
    dst: &mut [f32],
) {
    use super::scalar::PAD;

    let nc = splat(coefs.n_causal());
    let na = splat(coefs.n_anticausal());
    let d = splat(coefs.d());
    let off = coefs.causal_offset();

    let len = ext.len() / LANES;
    let start = PAD + coefs.n_border();
    let end = start + layout.n_pixels;
    let last = len - PAD - 1;

    // causal pass, seeded with the steady state of the first sample
    let seed = _mm256_mul_pd(load(ext, 0), _mm256_set1_pd(coefs.causal_gain()));
    let mut y = [seed; 4];
    for j in PAD..end {
        let x = j - off;
        let xs = [
            load(ext, x),
            load(ext, x - 1),
            load(ext, x - 2),
            load(ext, x - 3),
        ];
        let out = step(&nc, &d, &xs, &y);
        y = [out, y[0], y[1], y[2]];
        _mm256_storeu_pd(causal[j * LANES..(j + 1) * LANES].as_mut_ptr(), out);
    }

    // anticausal pass, seeded with the steady state of the last sample
    let seed = _mm256_mul_pd(load(ext, len - 1), _mm256_set1_pd(coefs.anticausal_gain()));
    let mut y = [seed; 4];
    let mut result = [0f32; LANES];
    for j in (start..=last).rev() {
        let xs = [
            load(ext, j + 1),
            load(ext, j + 2),
            load(ext, j + 3),
            load(ext, j + 4),
        ];
        let out = step(&na, &d, &xs, &y);
        y = [out, y[0], y[1], y[2]];

        if j < end {
            let v = _mm256_cvtpd_ps(_mm256_add_pd(load(causal, j), out));
            let idx = (j - start) * layout.elem_stride;

            if layout.signal_stride == 1 {
                let base = layout.offset(first) + idx;
                _mm_storeu_ps(dst[base..base + LANES].as_mut_ptr(), v);
            } else {
                _mm_storeu_ps(result.as_mut_ptr(), v);
                for (l, value) in result.iter().enumerate() {
                    dst[layout.offset(first + l) + idx] = *value;
                }
            }
        }
    }
}
