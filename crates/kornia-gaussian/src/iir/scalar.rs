use super::coefficients::Coefficients;
use super::{IoBuffers, SignalLayout};
use crate::fir::convolve::mirror_index;

/// Constant samples added before and after the mirrored border to seed the recursions.
pub(crate) const PAD: usize = 5;

/// Length of the extended line of a signal.
pub(crate) fn extended_len(n_pixels: usize, n_border: usize) -> usize {
    n_pixels + 2 * (n_border + PAD)
}

/// Source index of the extended sample `j`.
///
/// The signal starts at `PAD + n_border`, the `n_border` samples around it are mirrored and
/// the outermost `PAD` samples repeat the first and last mirrored samples.
#[inline]
pub(crate) fn extended_index(j: usize, n_pixels: usize, n_border: usize) -> usize {
    let start = (PAD + n_border) as isize;
    let border = n_border as isize;
    let i = (j as isize - start).clamp(-border, n_pixels as isize - 1 + border);
    mirror_index(i, n_pixels)
}

/// Copy a strided signal into its extended line.
pub(crate) fn fill_extended(
    src: &[f32],
    elem_stride: usize,
    n_pixels: usize,
    n_border: usize,
    ext: &mut [f64],
) {
    for (j, value) in ext.iter_mut().enumerate() {
        *value = src[extended_index(j, n_pixels, n_border) * elem_stride] as f64;
    }
}

/// Run both recursive passes over an extended line and write the signal part to `dst`.
pub(crate) fn filter_extended(
    coefs: &Coefficients,
    ext: &[f64],
    causal: &mut [f64],
    n_pixels: usize,
    dst: &mut [f32],
    elem_stride: usize,
) {
    let nc = coefs.n_causal();
    let na = coefs.n_anticausal();
    let d = coefs.d();
    let off = coefs.causal_offset();

    let start = PAD + coefs.n_border();
    let end = start + n_pixels;
    let last = ext.len() - PAD - 1;

    // causal pass, seeded with the steady state of the first sample
    let seed = ext[0] * coefs.causal_gain();
    let (mut y1, mut y2, mut y3, mut y4) = (seed, seed, seed, seed);
    for j in PAD..end {
        let x = j - off;
        let y = nc[0] * ext[x] + nc[1] * ext[x - 1] + nc[2] * ext[x - 2] + nc[3] * ext[x - 3]
            - d[0] * y1
            - d[1] * y2
            - d[2] * y3
            - d[3] * y4;
        y4 = y3;
        y3 = y2;
        y2 = y1;
        y1 = y;
        causal[j] = y;
    }

    // anticausal pass, seeded with the steady state of the last sample
    let seed = ext[ext.len() - 1] * coefs.anticausal_gain();
    let (mut y1, mut y2, mut y3, mut y4) = (seed, seed, seed, seed);
    for j in (start..=last).rev() {
        let y = na[0] * ext[j + 1] + na[1] * ext[j + 2] + na[2] * ext[j + 3] + na[3] * ext[j + 4]
            - d[0] * y1
            - d[1] * y2
            - d[2] * y3
            - d[3] * y4;
        y4 = y3;
        y3 = y2;
        y2 = y1;
        y1 = y;

        if j < end {
            dst[(j - start) * elem_stride] = (causal[j] + y) as f32;
        }
    }
}

/// Filter every signal of the layout, one at a time.
pub(crate) fn filter_signals(
    io: &mut IoBuffers<'_>,
    layout: &SignalLayout,
    coefs: &Coefficients,
    signals: std::ops::Range<usize>,
) {
    let len = extended_len(layout.n_pixels, coefs.n_border());
    let mut ext = vec![0f64; len];
    let mut causal = vec![0f64; len];

    for t in signals {
        let offset = layout.offset(t);
        fill_extended(
            &io.input()[offset..],
            layout.elem_stride,
            layout.n_pixels,
            coefs.n_border(),
            &mut ext,
        );
        filter_extended(
            coefs,
            &ext,
            &mut causal,
            layout.n_pixels,
            &mut io.output()[offset..],
            layout.elem_stride,
        );
    }
}
