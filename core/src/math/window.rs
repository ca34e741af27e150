//! Blackman window coefficients, cached per length.
//!
//! The cache is never invalidated. Its key space is the handful of FFT sizes a
//! radar configuration can produce; if window lengths ever come from untrusted
//! input the cache must be bounded (LRU) instead.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Blackman window of `len` points, symmetric like `numpy.blackman`.
pub fn blackman(len: usize) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|n| {
                    let phase = 2.0 * PI * n as f64 / denom;
                    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
                })
                .collect()
        }
    }
}

/// Thread-safe length -> coefficients cache.
pub struct WindowCache {
    windows: RwLock<HashMap<usize, Arc<[f64]>>>,
    computations: AtomicUsize,
}

impl WindowCache {
    pub fn new() -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            computations: AtomicUsize::new(0),
        }
    }

    /// Process-wide cache used by the spectral transforms.
    pub fn global() -> &'static WindowCache {
        static CACHE: OnceLock<WindowCache> = OnceLock::new();
        CACHE.get_or_init(WindowCache::new)
    }

    pub fn get(&self, len: usize) -> Arc<[f64]> {
        if let Some(window) = self
            .windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&len)
        {
            return Arc::clone(window);
        }

        let mut windows = self.windows.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(windows.entry(len).or_insert_with(|| {
            self.computations.fetch_add(1, Ordering::Relaxed);
            Arc::from(blackman(len))
        }))
    }

    /// Number of windows computed so far.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    pub fn cached_lengths(&self) -> usize {
        self.windows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for WindowCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached Blackman window of length `len`.
pub fn create_window(len: usize) -> Arc<[f64]> {
    WindowCache::global().get(len)
}
