//! In-place forward DFT plan wrapper, one per worker thread.
//!
//! Plan creation is serialized behind a mutex to mirror the serialized
//! plan-creation discipline the original FFTW-based worker required.
//! `rustfft::FftPlanner` is in practice `Send + Sync` and does not need
//! this for correctness, but keeping a single creation point also lets
//! `FftPlanner`'s internal caching of same-length plans actually help.

use std::sync::{Arc, Mutex};

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

static PLAN_LOCK: Mutex<()> = Mutex::new(());

/// A ready-to-run forward DFT of a fixed length, with its scratch buffer.
pub struct DftPlan {
    inner: Arc<dyn Fft<f32>>,
    scratch: Box<[Complex<f32>]>,
    pub len: usize,
}

impl DftPlan {
    pub fn new(fft_len: usize) -> Self {
        let inner = {
            let _guard = PLAN_LOCK.lock().expect("dft plan mutex poisoned");
            FftPlanner::new().plan_fft_forward(fft_len)
        };
        let scratch = vec![Complex::new(0.0f32, 0.0); inner.get_inplace_scratch_len()].into_boxed_slice();
        Self { inner, scratch, len: fft_len }
    }

    /// Windows `iq` (interleaved signed-16 I/Q, `1.0 ≡ 2048`) by `window`,
    /// executes the DFT in place, and returns the magnitude of every bin.
    pub fn process(&mut self, iq: &[i16], window: &[f64]) -> Vec<f32> {
        assert_eq!(iq.len(), 2 * self.len, "IQ slice must match the FFT length");
        assert_eq!(window.len(), self.len, "window must match the FFT length");

        let mut buf: Vec<Complex<f32>> = (0..self.len)
            .map(|idx| {
                let i = iq[2 * idx] as f64 / 2048.0 * window[idx];
                let q = iq[2 * idx + 1] as f64 / 2048.0 * window[idx];
                Complex::new(i as f32, q as f32)
            })
            .collect();

        self.inner.process_with_scratch(&mut buf, &mut self.scratch);
        buf.into_iter().map(|v| v.norm()).collect()
    }
}

/// Computes the `[bin_start, bin_end)` range of useful bins for one view,
/// plus its frequency extent, given the view's center frequency.
pub fn bin_range(
    center_freq: u64,
    lower_sideband: bool,
    start_freq: u64,
    end_freq: u64,
    bin_width: f64,
    fmbw2: f64,
    fft_len: usize,
) -> (usize, usize, u64, u64) {
    let center = center_freq as f64;
    let max_bin = fft_len as i64;
    if lower_sideband {
        let view_start = (center - fmbw2).max(start_freq as f64);
        let view_end = (center - bin_width).min(end_freq as f64);
        let bin_start = fft_len as i64 - ((center - view_start) / bin_width).round() as i64 + 1;
        let bin_end = fft_len as i64 - ((center - view_end) / bin_width).round() as i64 + 2;
        (
            bin_start.clamp(0, max_bin) as usize,
            bin_end.clamp(0, max_bin) as usize,
            view_start.round() as u64,
            view_end.round() as u64,
        )
    } else {
        let view_start = (center + bin_width).max(start_freq as f64);
        let view_end = (center + fmbw2).min(end_freq as f64);
        let bin_start = ((view_start - center) / bin_width).round() as i64 + 1;
        let bin_end = ((view_end - center) / bin_width).round() as i64 + 2;
        (
            bin_start.clamp(0, max_bin) as usize,
            bin_end.clamp(0, max_bin) as usize,
            view_start.round() as u64,
            view_end.round() as u64,
        )
    }
}
