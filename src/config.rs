//! CLI parsing and validation: turns a `clap`-derived `Cli` into the
//! immutable `Config` every other module reads from.

use std::path::PathBuf;

use clap::Parser;

use crate::error::{Result, SweepError};
use crate::plan::{derive_params, plan_frequencies, FrequencyPlan, PlanParams};
use crate::radio::LnaGain;
use crate::suffix::{parse_duration_ms, parse_freq};
use crate::window::WindowKind;

/// Fully validated, immutable run configuration.
pub struct Config {
    pub start_freq: u64,
    pub end_freq: u64,
    pub samplerate: u64,
    pub filter_margin: f64,

    pub fft_len: usize,
    pub bin_width: f64,
    pub fmbw2: f64,

    pub num_integrations: u32,
    pub exit_timer_ms: u64,
    pub num_threads: usize,

    pub num_buffers: u32,
    pub buffer_size: u32,
    pub num_transfers: u32,
    pub timeout_ms: u32,

    pub lna_gain: LnaGain,
    pub rxvga1: u8,
    pub rxvga2: u8,

    pub window_name: WindowKind,
    pub window: Vec<f64>,

    pub verbosity: u8,
    pub device: String,
    pub out_path: Option<PathBuf>,
}

/// Swept-spectrum power scanner.
#[derive(Parser, Debug)]
#[command(name = "sweepscan", version, about)]
pub struct Cli {
    /// `lower:upper:bin_width`, e.g. `900M:1.2G:10k`.
    pub range: String,

    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write CSV output to this file instead of stdout (truncated).
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Stop after this long, 0 = forever. Accepts d/h/m/s/ms suffixes.
    #[arg(short = 'e', long, default_value = "0")]
    pub exit_timer: String,

    /// Spectra to average per view. Either a bare count or a duration.
    #[arg(short, long, default_value = "1s")]
    pub integration_time: String,

    /// Radio sample rate in Hz.
    #[arg(short, long, default_value = "20M")]
    pub bandwidth: String,

    /// Fraction of samplerate/2 retained per view, in [0.1, 1.0].
    #[arg(short = 'M', long, default_value_t = 0.75)]
    pub filter_margin: f64,

    /// Window function applied before each FFT.
    #[arg(short = 'W', long, default_value = "hamming")]
    pub window_type: String,

    /// LNA gain: 0/bypass, mid, or max.
    #[arg(short = 'g', long, default_value = "max")]
    pub lna_gain: String,

    /// RxVGA1 gain in dB, or min/max.
    #[arg(short = 'o', long, default_value = "max")]
    pub rxvga1: String,

    /// RxVGA2 gain in dB, or min/max.
    #[arg(short = 'w', long, default_value = "max")]
    pub rxvga2: String,

    /// Device identifier string passed to the radio driver.
    #[arg(short, long, default_value = "")]
    pub device: String,

    /// Worker thread count.
    #[arg(short = 'T', long, default_value_t = 2)]
    pub threads: usize,

    #[arg(long, default_value_t = 32)]
    pub num_buffers: u32,
    #[arg(long, default_value_t = 8192)]
    pub buffer_size: u32,
    #[arg(long, default_value_t = 8)]
    pub num_transfers: u32,
    #[arg(long, default_value_t = 1000)]
    pub timeout_ms: u32,
}

fn parse_range(range: &str) -> Result<(u64, u64, u64)> {
    let parts: Vec<&str> = range.split(':').collect();
    if parts.len() != 3 {
        return Err(SweepError::Config(format!(
            "expected lower:upper:bin_width, got '{range}'"
        )));
    }
    let lower = parse_freq(parts[0]).map_err(|e| SweepError::Config(e.to_string()))?;
    let upper = parse_freq(parts[1]).map_err(|e| SweepError::Config(e.to_string()))?;
    let bin_width = parse_freq(parts[2]).map_err(|e| SweepError::Config(e.to_string()))?;
    Ok((lower, upper, bin_width))
}

fn parse_gain(text: &str, min_db: u8, max_db: u8) -> Result<u8> {
    match text.to_ascii_lowercase().as_str() {
        "min" => Ok(min_db),
        "max" => Ok(max_db),
        other => other
            .parse::<u8>()
            .map_err(|_| SweepError::Config(format!("invalid gain value '{text}'"))),
    }
}

impl Cli {
    pub fn into_config(self) -> Result<Config> {
        let (start_freq, end_freq, requested_bin_width) = parse_range(&self.range)?;

        let samplerate = parse_freq(&self.bandwidth).map_err(|e| SweepError::Config(e.to_string()))?;
        let exit_timer_ms = parse_duration_ms(&self.exit_timer).map_err(|e| SweepError::Config(e.to_string()))?;
        let integration_ms = parse_duration_ms(&self.integration_time).map_err(|e| SweepError::Config(e.to_string()))?;

        if self.threads == 0 || self.threads > 128 {
            return Err(SweepError::Config(format!(
                "thread count {} out of range [1, 128]",
                self.threads
            )));
        }

        let PlanParams { fft_len, bin_width, fmbw2 } =
            derive_params(samplerate, requested_bin_width, self.filter_margin)?;

        let num_integrations = ((integration_ms as f64 / 1000.0 * samplerate as f64 / fft_len as f64).round() as u32).max(1);

        let window_name = WindowKind::parse(&self.window_type)
            .ok_or_else(|| SweepError::Config(format!("unknown window type '{}'", self.window_type)))?;
        let window = window_name.generate(fft_len);

        let lna_gain = LnaGain::parse(&self.lna_gain)
            .ok_or_else(|| SweepError::Config(format!("unknown LNA gain '{}'", self.lna_gain)))?;
        let rxvga1 = parse_gain(&self.rxvga1, 5, 30)?;
        let rxvga2 = parse_gain(&self.rxvga2, 0, 30)?;

        Ok(Config {
            start_freq,
            end_freq,
            samplerate,
            filter_margin: self.filter_margin,
            fft_len,
            bin_width,
            fmbw2,
            num_integrations,
            exit_timer_ms,
            num_threads: self.threads,
            num_buffers: self.num_buffers,
            buffer_size: self.buffer_size,
            num_transfers: self.num_transfers,
            timeout_ms: self.timeout_ms,
            lna_gain,
            rxvga1,
            rxvga2,
            window_name,
            window,
            verbosity: self.verbose,
            device: self.device,
            out_path: self.file,
        })
    }
}

impl Config {
    /// Builds the frequency plan for this config against a radio whose
    /// minimum tunable frequency is `radio_min_freq`.
    pub fn plan(&self, radio_min_freq: u64) -> Result<FrequencyPlan> {
        plan_frequencies(self.start_freq, self.end_freq, self.bin_width, self.fmbw2, radio_min_freq)
    }

    /// Builds a minimal `Config` for unit tests, bypassing CLI parsing.
    #[cfg(test)]
    pub fn for_test(
        start_freq: u64,
        end_freq: u64,
        samplerate: u64,
        requested_bin_width: u64,
        filter_margin: f64,
        num_threads: usize,
    ) -> Self {
        let params = derive_params(samplerate, requested_bin_width, filter_margin).unwrap();
        let window_name = WindowKind::Hamming;
        let window = window_name.generate(params.fft_len);
        Config {
            start_freq,
            end_freq,
            samplerate,
            filter_margin,
            fft_len: params.fft_len,
            bin_width: params.bin_width,
            fmbw2: params.fmbw2,
            num_integrations: 4,
            exit_timer_ms: 0,
            num_threads,
            num_buffers: 32,
            buffer_size: 8192,
            num_transfers: 8,
            timeout_ms: 1000,
            lna_gain: LnaGain::Max,
            rxvga1: 30,
            rxvga2: 30,
            window_name,
            window,
            verbosity: 0,
            device: String::new(),
            out_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let mut full = vec!["sweepscan"];
        full.extend_from_slice(args);
        let cli = Cli::try_parse_from(full).expect("clap parse failed");
        cli.into_config()
    }

    #[test]
    fn valid_range_parses() {
        let config = parse(&["10M:20M:1M"]).unwrap();
        assert_eq!(config.start_freq, 10_000_000);
        assert_eq!(config.end_freq, 20_000_000);
    }

    #[test]
    fn bad_range_is_rejected() {
        assert!(parse(&["20M:10M:1M"]).is_err());
    }

    #[test]
    fn out_of_range_filter_margin_is_rejected() {
        assert!(parse(&["10M:20M:1M", "-M", "1.5"]).is_err());
    }

    #[test]
    fn symbolic_and_numeric_gains_both_work() {
        let a = parse(&["10M:20M:1M", "-g", "bypass"]).unwrap();
        assert_eq!(a.lna_gain, LnaGain::Bypass);
        let b = parse(&["10M:20M:1M", "-o", "min"]).unwrap();
        assert_eq!(b.rxvga1, 5);
        let c = parse(&["10M:20M:1M", "-o", "12"]).unwrap();
        assert_eq!(c.rxvga1, 12);
    }

    #[test]
    fn unknown_window_type_is_rejected() {
        assert!(parse(&["10M:20M:1M", "-W", "blackman"]).is_err());
    }

    #[test]
    fn thread_count_out_of_range_is_rejected() {
        assert!(parse(&["10M:20M:1M", "-T", "0"]).is_err());
        assert!(parse(&["10M:20M:1M", "-T", "200"]).is_err());
    }
}
