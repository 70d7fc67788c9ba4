//! Radio façade: the abstract `Radio` trait the capture loop and calibrator
//! drive, plus `SimulatedRadio`, the in-memory implementation that backs the
//! binary and the test suite.
//!
//! IQ samples are interleaved signed 16-bit little-endian `I, Q` pairs with
//! the fixed-point convention `1.0 ≡ 2048` (bladeRF's SC16Q11 format).
//! Timestamps are in sample units on the radio's own monotonic clock.

use crate::error::{Result, SweepError};
use std::f64::consts::PI;

/// Symbolic/numeric LNA gain setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LnaGain {
    Bypass,
    Mid,
    Max,
}

impl LnaGain {
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "bypass" | "0" => Some(Self::Bypass),
            "mid" => Some(Self::Mid),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn to_db(self) -> u8 {
        match self {
            Self::Bypass => 0,
            Self::Mid => 3,
            Self::Max => 6,
        }
    }
}

/// Stream format requested via `configure_stream`. The only format this
/// system speaks is the bladeRF-style metadata-tagged SC16Q11 stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    pub num_buffers: u32,
    pub buffer_size: u32,
    pub num_transfers: u32,
    pub timeout_ms: u32,
}

/// Opaque per-frequency quick-tune state, produced by `quick_tune_get` after
/// a slow tune and later replayed via `schedule_retune`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickTune(pub Vec<u8>);

/// The radio façade. Implementations own the underlying device handle; all
/// operations are synchronous and meant to run only on the capture thread.
pub trait Radio: Send {
    fn open(&mut self, devstr: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;

    fn tune(&mut self, freq_hz: u64) -> Result<()>;
    fn set_sample_rate(&mut self, rate_hz: u64) -> Result<()>;
    fn set_bandwidth(&mut self, bw_hz: u64) -> Result<()>;
    fn set_lna_gain(&mut self, gain: LnaGain) -> Result<()>;
    fn set_rxvga1(&mut self, db: u8) -> Result<()>;
    fn set_rxvga2(&mut self, db: u8) -> Result<()>;
    fn configure_stream(&mut self, cfg: StreamConfig) -> Result<()>;
    fn enable_rx(&mut self, enabled: bool) -> Result<()>;

    fn timestamp(&self) -> u64;

    /// Schedules a retune to `freq_hz` at sample-timestamp `at_ts`, using a
    /// previously captured quick-tune state when available for a fast
    /// retune instead of a full slow tune.
    fn schedule_retune(&mut self, at_ts: u64, freq_hz: u64, quicktune: Option<&QuickTune>) -> Result<()>;

    /// Reads back the device's quick-tune state for the frequency it is
    /// currently tuned to. Called immediately after a slow `tune`.
    fn quick_tune_get(&self) -> Result<QuickTune>;

    /// Receives `num_samples` complex samples into `out` (length
    /// `2*num_samples` interleaved I/Q) starting at timestamp `*ts_io`,
    /// blocking up to `timeout_ms`. On success `*ts_io` is left unchanged;
    /// on `TimestampInPast` the caller is expected to refresh its clock from
    /// `timestamp()`.
    fn sync_rx(&mut self, out: &mut [i16], num_samples: usize, ts_io: &mut u64, timeout_ms: u32) -> Result<()>;
}

/// Test-only fault injection knobs, consumed one-shot per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaultInjection {
    pub timestamp_in_past: bool,
    pub timeout: bool,
    pub device_lost: bool,
}

/// An entirely in-memory `Radio`: synthesizes IQ samples (a configurable
/// pure tone plus optional noise) against a monotonic sample clock. Used as
/// the default backend for the binary (no hardware driver ships in this
/// crate) and to drive the capture-loop recovery paths in tests
/// deterministically.
pub struct SimulatedRadio {
    open: bool,
    center_freq: u64,
    samplerate: u64,
    clock: u64,
    devstr: String,
    /// Tones to synthesize, as `(frequency_hz, amplitude)` pairs relative to
    /// whatever frequency is currently tuned.
    pub tones: Vec<(f64, f64)>,
    pub noise_amplitude: f64,
    pub faults: FaultInjection,
    seed: u64,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self {
            open: false,
            center_freq: 0,
            samplerate: 1,
            clock: 0,
            devstr: String::new(),
            tones: Vec::new(),
            noise_amplitude: 0.0,
            faults: FaultInjection::default(),
            seed: 0x2545F4914F6CDD1D,
        }
    }

    fn next_noise(&mut self) -> f64 {
        // xorshift64, deterministic and dependency-free.
        self.seed ^= self.seed << 13;
        self.seed ^= self.seed >> 7;
        self.seed ^= self.seed << 17;
        let unit = (self.seed >> 11) as f64 / (1u64 << 53) as f64;
        (unit * 2.0 - 1.0) * self.noise_amplitude
    }
}

impl Default for SimulatedRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl Radio for SimulatedRadio {
    fn open(&mut self, devstr: &str) -> Result<()> {
        self.devstr = devstr.to_string();
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }

    fn tune(&mut self, freq_hz: u64) -> Result<()> {
        self.center_freq = freq_hz;
        Ok(())
    }

    fn set_sample_rate(&mut self, rate_hz: u64) -> Result<()> {
        self.samplerate = rate_hz.max(1);
        Ok(())
    }

    fn set_bandwidth(&mut self, _bw_hz: u64) -> Result<()> {
        Ok(())
    }

    fn set_lna_gain(&mut self, _gain: LnaGain) -> Result<()> {
        Ok(())
    }

    fn set_rxvga1(&mut self, _db: u8) -> Result<()> {
        Ok(())
    }

    fn set_rxvga2(&mut self, _db: u8) -> Result<()> {
        Ok(())
    }

    fn configure_stream(&mut self, _cfg: StreamConfig) -> Result<()> {
        Ok(())
    }

    fn enable_rx(&mut self, _enabled: bool) -> Result<()> {
        Ok(())
    }

    fn timestamp(&self) -> u64 {
        self.clock
    }

    fn schedule_retune(&mut self, _at_ts: u64, freq_hz: u64, _quicktune: Option<&QuickTune>) -> Result<()> {
        self.center_freq = freq_hz;
        Ok(())
    }

    fn quick_tune_get(&self) -> Result<QuickTune> {
        Ok(QuickTune(self.center_freq.to_le_bytes().to_vec()))
    }

    fn sync_rx(&mut self, out: &mut [i16], num_samples: usize, ts_io: &mut u64, _timeout_ms: u32) -> Result<()> {
        if !self.open {
            return Err(SweepError::DeviceLost);
        }
        if self.faults.device_lost {
            self.faults.device_lost = false;
            return Err(SweepError::DeviceLost);
        }
        if self.faults.timeout {
            self.faults.timeout = false;
            return Err(SweepError::Timeout);
        }
        if self.faults.timestamp_in_past {
            self.faults.timestamp_in_past = false;
            return Err(SweepError::TimestampInPast);
        }
        if *ts_io < self.clock {
            return Err(SweepError::TimestampInPast);
        }
        assert_eq!(out.len(), 2 * num_samples, "IQ buffer must hold interleaved I/Q pairs");

        for idx in 0..num_samples {
            let t = (*ts_io + idx as u64) as f64 / self.samplerate as f64;
            let mut i_val = 0.0f64;
            let mut q_val = 0.0f64;
            for &(freq, amp) in &self.tones {
                let phase = 2.0 * PI * freq * t;
                i_val += amp * phase.cos();
                q_val += amp * phase.sin();
            }
            i_val += self.next_noise();
            q_val += self.next_noise();
            out[2 * idx] = (i_val * 2048.0).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            out[2 * idx + 1] = (q_val * 2048.0).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
        }

        self.clock = *ts_io + num_samples as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lna_gain_round_trips() {
        for gain in [LnaGain::Bypass, LnaGain::Mid, LnaGain::Max] {
            let text = match gain {
                LnaGain::Bypass => "bypass",
                LnaGain::Mid => "mid",
                LnaGain::Max => "max",
            };
            assert_eq!(LnaGain::parse(text), Some(gain));
        }
        assert_eq!(LnaGain::parse("0"), Some(LnaGain::Bypass));
    }

    #[test]
    fn sync_rx_advances_clock() {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        radio.set_sample_rate(1_000_000).unwrap();
        let mut buf = vec![0i16; 2 * 128];
        let mut ts = 0u64;
        radio.sync_rx(&mut buf, 128, &mut ts, 1000).unwrap();
        assert_eq!(radio.timestamp(), 128);
    }

    #[test]
    fn sync_rx_rejects_stale_timestamp() {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        radio.set_sample_rate(1_000_000).unwrap();
        let mut buf = vec![0i16; 2 * 128];
        let mut ts = 1000u64;
        radio.sync_rx(&mut buf, 128, &mut ts, 1000).unwrap();
        let mut ts_past = 0u64;
        let mut buf2 = vec![0i16; 2 * 128];
        let result = radio.sync_rx(&mut buf2, 128, &mut ts_past, 1000);
        assert!(matches!(result, Err(SweepError::TimestampInPast)));
    }

    #[test]
    fn fault_injection_is_one_shot() {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        radio.set_sample_rate(1_000_000).unwrap();
        radio.faults.timeout = true;
        let mut buf = vec![0i16; 2 * 16];
        let mut ts = 0u64;
        assert!(matches!(radio.sync_rx(&mut buf, 16, &mut ts, 1000), Err(SweepError::Timeout)));
        assert!(radio.sync_rx(&mut buf, 16, &mut ts, 1000).is_ok());
    }

    #[test]
    fn pure_tone_amplitude_is_bounded() {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        radio.set_sample_rate(1_000_000).unwrap();
        radio.tones.push((1000.0, 0.5));
        let mut buf = vec![0i16; 2 * 256];
        let mut ts = 0u64;
        radio.sync_rx(&mut buf, 256, &mut ts, 1000).unwrap();
        for v in buf {
            assert!(v.unsigned_abs() <= 2048);
        }
    }
}
