//! Temporal window generation for the per-capture FFT.

use std::f64::consts::PI;

/// Selectable window functions, matching the CLI's `--window-type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Rectangular,
    Hann,
    Hamming,
}

impl WindowKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rect" | "rectangular" | "boxcar" => Some(Self::Rectangular),
            "hann" => Some(Self::Hann),
            "hamming" => Some(Self::Hamming),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rectangular => "rect",
            Self::Hann => "hann",
            Self::Hamming => "hamming",
        }
    }

    /// Generates the window of length `len`, normalized so sample `k`'s
    /// weight is `window[k]`.
    pub fn generate(self, len: usize) -> Vec<f64> {
        match self {
            Self::Rectangular => rect(len),
            Self::Hann => hann(len),
            Self::Hamming => hamming(len),
        }
    }
}

fn rect(len: usize) -> Vec<f64> {
    vec![1.0; len]
}

fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|idx| 0.5 * (1.0 - (2.0 * PI * idx as f64 / (len - 1) as f64).cos()))
        .collect()
}

fn hamming(len: usize) -> Vec<f64> {
    (0..len)
        .map(|idx| 0.53836 - 0.46164 * (2.0 * PI * idx as f64 / (len - 1) as f64).cos())
        .collect()
}
