//! Frequency-plan computation: decomposes a target sweep into a sequence of
//! overlapping radio "views".
//!
//! Grounded on the original `plan_frequencies` / `CALC_FMBW2` logic: each
//! view overlaps the next by exactly one `bin_width`, snapping `fmbw2` to a
//! bin boundary keeps bin ranges integer-valued across the sweep.

use crate::error::SweepError;

/// Derived parameters shared by the planner, the worker bin-range
/// calculation, and the status line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanParams {
    pub fft_len: usize,
    pub bin_width: f64,
    pub fmbw2: f64,
}

/// The ordered sweep of center frequencies plus sideband metadata for the
/// first view.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyPlan {
    pub freqs: Vec<u64>,
    pub first_freq_lower_sideband: bool,
}

/// Derives `fft_len`, `bin_width`, and `fmbw2` from the user's requested
/// bin width, the sample rate, and the filter margin.
pub fn derive_params(
    samplerate: u64,
    requested_bin_width: u64,
    filter_margin: f64,
) -> Result<PlanParams, SweepError> {
    if !(0.1..=1.0).contains(&filter_margin) {
        return Err(SweepError::Config(format!(
            "filter margin {filter_margin} out of range [0.1, 1.0]"
        )));
    }
    if requested_bin_width == 0 {
        return Err(SweepError::Config("bin width must be nonzero".into()));
    }

    // Minimum length FFT that guarantees bins no wider than requested.
    let fft_len = samplerate.div_ceil(requested_bin_width).max(1) as usize;

    let bin_width = samplerate as f64 / fft_len as f64;
    if bin_width <= 0.0 {
        return Err(SweepError::Config("computed bin width is zero".into()));
    }

    // filter_margin * samplerate * fft_len / 2, rounded up, snapped to a bin.
    let fmbw2 = (filter_margin * samplerate as f64 * fft_len as f64 / 2.0).ceil() / fft_len as f64;

    Ok(PlanParams { fft_len, bin_width, fmbw2 })
}

/// Builds the ordered list of center frequencies for a sweep from `start` to
/// `end`, given the already-derived `bin_width`/`fmbw2` and the radio's
/// minimum tunable frequency.
pub fn plan_frequencies(
    start: u64,
    end: u64,
    bin_width: f64,
    fmbw2: f64,
    radio_min_freq: u64,
) -> Result<FrequencyPlan, SweepError> {
    if end <= start {
        return Err(SweepError::Config(format!(
            "end frequency {end} must be greater than start frequency {start}"
        )));
    }
    if fmbw2 <= 0.0 {
        return Err(SweepError::Config("fmbw2 must be positive".into()));
    }

    let span = (end - start) as f64;
    let num_freqs = (span / fmbw2).ceil() as u64;
    let num_freqs = num_freqs.max(1) as usize;

    let bin_width_i = bin_width.round() as i64;
    let fmbw2_i = fmbw2.round() as i64;

    let mut freqs = Vec::with_capacity(num_freqs);
    let first_freq_lower_sideband = (start as i64 - bin_width_i) < radio_min_freq as i64;

    if first_freq_lower_sideband {
        freqs.push((start as i64 + fmbw2_i) as u64);
    } else {
        freqs.push((start as i64 - bin_width_i) as u64);
    }

    for idx in 1..num_freqs {
        let freq = start as i64 - bin_width_i + idx as i64 * fmbw2_i;
        freqs.push(freq as u64);
    }

    Ok(FrequencyPlan { freqs, first_freq_lower_sideband })
}
