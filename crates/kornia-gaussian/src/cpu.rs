//! Runtime cpu capability registry.
//!
//! Each capability is detected lazily on its first query and cached for the lifetime of the
//! process. A capability can be forced on or off with the `enable_*` functions, which take
//! precedence over the detected value until [`reset_overrides`] is called. Forcing is meant
//! for tests and benchmarks that need to pin a code path.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

const UNSET: u8 = 0;
const FORCED_OFF: u8 = 1;
const FORCED_ON: u8 = 2;

struct CpuFlag {
    name: &'static str,
    detected: OnceLock<bool>,
    forced: AtomicU8,
    detect: fn() -> bool,
}

impl CpuFlag {
    const fn new(name: &'static str, detect: fn() -> bool) -> Self {
        Self {
            name,
            detected: OnceLock::new(),
            forced: AtomicU8::new(UNSET),
            detect,
        }
    }

    fn detected(&self) -> bool {
        *self.detected.get_or_init(|| {
            let value = (self.detect)();
            log::debug!("cpu feature {} detected: {}", self.name, value);
            value
        })
    }

    fn get(&self) -> bool {
        match self.forced.load(Ordering::Relaxed) {
            FORCED_OFF => false,
            FORCED_ON => true,
            _ => self.detected(),
        }
    }

    fn force(&self, enable: bool) -> bool {
        let value = if enable { FORCED_ON } else { FORCED_OFF };
        let previous = match self.forced.swap(value, Ordering::Relaxed) {
            FORCED_OFF => false,
            FORCED_ON => true,
            _ => self.detected(),
        };
        log::debug!(
            "cpu feature {} forced to {} (was {})",
            self.name,
            enable,
            previous
        );
        previous
    }

    fn reset(&self) {
        self.forced.store(UNSET, Ordering::Relaxed);
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_avx2() -> bool {
    is_x86_feature_detected!("avx2")
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_avx() -> bool {
    is_x86_feature_detected!("avx")
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detect_avx_fma() -> bool {
    is_x86_feature_detected!("avx") && is_x86_feature_detected!("fma")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect_avx2() -> bool {
    false
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect_avx() -> bool {
    false
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detect_avx_fma() -> bool {
    false
}

static AVX2: CpuFlag = CpuFlag::new("avx2", detect_avx2);
static AVX: CpuFlag = CpuFlag::new("avx", detect_avx);
static AVX_FMA: CpuFlag = CpuFlag::new("avx+fma", detect_avx_fma);

/// Returns true if the AVX2 code paths are enabled.
pub fn has_avx2() -> bool {
    AVX2.get()
}

/// Returns true if the AVX code paths are enabled.
pub fn has_avx() -> bool {
    AVX.get()
}

/// Returns true if the AVX with FMA code paths are enabled.
pub fn has_avx_fma() -> bool {
    AVX_FMA.get()
}

/// Force the AVX2 capability and return the previous effective value.
///
/// Forcing AVX2 on a cpu without it does not make the vectorized kernels run: the dispatchers
/// keep using the scalar path and the `_avx` entry points report
/// [`crate::FilterError::CpuFeatureUnavailable`].
pub fn enable_avx2(enable: bool) -> bool {
    AVX2.force(enable)
}

/// Force the AVX capability and return the previous effective value.
pub fn enable_avx(enable: bool) -> bool {
    AVX.force(enable)
}

/// Force the AVX with FMA capability and return the previous effective value.
pub fn enable_avx_fma(enable: bool) -> bool {
    AVX_FMA.force(enable)
}

/// Drop every override so that the detected capabilities are effective again.
pub fn reset_overrides() {
    AVX2.reset();
    AVX.reset();
    AVX_FMA.reset();
}

/// Serializes tests that force capabilities, since the registry is process-wide.
#[cfg(test)]
pub(crate) static TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
