//! Worker pool: N threads, each pulling `Capture`s off the shared queue,
//! FFTing every FFT-length slice, folding magnitudes into a per-frequency
//! integration buffer, and flushing a completed one as a CSV line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use log::{debug, warn};

use crate::capture::Capture;
use crate::config::Config;
use crate::dft::{bin_range, DftPlan};
use crate::plan::FrequencyPlan;
use crate::queue::{CaptureQueue, IDLE_POLL};
use crate::sink::SharedSink;

/// Accumulates magnitude spectra for one in-progress frequency view.
struct IntegrationBuffer {
    freq_idx: usize,
    partial: Vec<f64>,
    integrations_done: u32,
    view_start: u64,
    view_end: u64,
}

#[derive(Default)]
pub struct IntegrationRegistry {
    buffers: Vec<IntegrationBuffer>,
}

impl IntegrationRegistry {
    /// Returns the index of the buffer for `freq_idx` that still has room,
    /// creating one of `num_bins` zeroed entries if none exists.
    fn find_or_create(&mut self, freq_idx: usize, num_bins: usize, view_start: u64, view_end: u64, num_integrations: u32) -> usize {
        if let Some(idx) = self
            .buffers
            .iter()
            .position(|ib| ib.freq_idx == freq_idx && ib.integrations_done < num_integrations)
        {
            return idx;
        }
        self.buffers.push(IntegrationBuffer {
            freq_idx,
            partial: vec![0.0; num_bins],
            integrations_done: 0,
            view_start,
            view_end,
        });
        self.buffers.len() - 1
    }
}

/// Runs one worker until `keep_running` clears and the queue is empty.
/// Spawned once per configured thread; all workers share `queue`, the
/// integration `registry`, and the output `sink`.
pub fn run_worker(
    config: &Config,
    plan: &FrequencyPlan,
    queue: Arc<CaptureQueue>,
    registry: Arc<Mutex<IntegrationRegistry>>,
    sink: Arc<SharedSink>,
    keep_running: Arc<AtomicBool>,
) {
    let mut dft = DftPlan::new(config.fft_len);

    loop {
        let Some(capture) = queue.pop() else {
            if !keep_running.load(Ordering::Relaxed) && queue.is_empty() {
                return;
            }
            std::thread::sleep(IDLE_POLL);
            continue;
        };
        process_capture(config, plan, capture, &mut dft, &registry, &sink);
    }
}

pub fn new_registry() -> Arc<Mutex<IntegrationRegistry>> {
    Arc::new(Mutex::new(IntegrationRegistry::default()))
}

fn process_capture(
    config: &Config,
    plan: &FrequencyPlan,
    capture: Capture,
    dft: &mut DftPlan,
    registry: &Mutex<IntegrationRegistry>,
    sink: &SharedSink,
) {
    let center_freq = plan.freqs[capture.freq_idx];
    let lower_sideband = capture.freq_idx == 0 && plan.first_freq_lower_sideband;
    let (bin_start, bin_end, view_start, view_end) = bin_range(
        center_freq,
        lower_sideband,
        config.start_freq,
        config.end_freq,
        config.bin_width,
        config.fmbw2,
        config.fft_len,
    );
    let num_bins = bin_end - bin_start;
    if num_bins == 0 {
        debug!("empty view for freq_idx {}, dropping capture", capture.freq_idx);
        return;
    }

    let mut accum = vec![0.0f64; num_bins];
    for slice_idx in 0..capture.count as usize {
        let start = slice_idx * 2 * config.fft_len;
        let end = start + 2 * config.fft_len;
        let mags = dft.process(&capture.data[start..end], &config.window);
        for (bin, mag) in accum.iter_mut().zip(&mags[bin_start..bin_end]) {
            *bin += *mag as f64;
        }
    }

    let flushed = {
        let mut reg = registry.lock().expect("integration registry mutex poisoned");
        let idx = reg.find_or_create(capture.freq_idx, num_bins, view_start, view_end, config.num_integrations);
        let ib = &mut reg.buffers[idx];
        for (dst, src) in ib.partial.iter_mut().zip(&accum) {
            *dst += src;
        }
        ib.integrations_done += capture.count;

        if ib.integrations_done >= config.num_integrations {
            let ib = reg.buffers.remove(idx);
            Some(ib)
        } else {
            None
        }
    };

    if let Some(ib) = flushed {
        let line = format_csv_line(config, &ib, capture.scan_time);
        if let Err(err) = sink.write_line(&line) {
            warn!("failed to write CSV line: {err}");
        }
    }
}

fn format_csv_line(config: &Config, ib: &IntegrationBuffer, scan_time: std::time::SystemTime) -> String {
    let since_epoch = scan_time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO);
    let mut line = format!(
        "{}.{:03}, '', {}, {}, {:.3}, {}, ",
        since_epoch.as_secs(),
        since_epoch.subsec_millis(),
        ib.view_start,
        ib.view_end,
        config.bin_width,
        config.fft_len,
    );
    for (idx, value) in ib.partial.iter().enumerate() {
        let db = 20.0 * (value / config.num_integrations as f64).log10();
        if idx + 1 == ib.partial.len() {
            line.push_str(&format!("{db:.3}"));
        } else {
            line.push_str(&format!("{db:.3}, "));
        }
    }
    line.push('\n');
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plan::{derive_params, plan_frequencies};
    use crate::radio::{Radio, SimulatedRadio};
    use crate::sink::{Sink, SharedSink};
    use std::fs::File;
    use std::io::Read;
    use std::time::SystemTime;

    fn test_plan(config: &Config) -> FrequencyPlan {
        let params = derive_params(config.samplerate, 1_000_000, config.filter_margin).unwrap();
        plan_frequencies(config.start_freq, config.end_freq, params.bin_width, params.fmbw2, 0).unwrap()
    }

    /// Runs one capture through `process_capture` against a fresh file
    /// sink and returns the CSV line it flushed (empty if nothing flushed).
    fn capture_to_csv_line(config: &Config, plan: &FrequencyPlan, capture: Capture) -> String {
        let registry = new_registry();
        let path = std::env::temp_dir().join(format!(
            "sweepscan_worker_test_{:?}_{:?}.csv",
            std::thread::current().id(),
            SystemTime::now(),
        ));
        let sink = Arc::new(SharedSink::new(Sink::open_file(&path).unwrap()));
        let mut dft = DftPlan::new(config.fft_len);

        process_capture(config, plan, capture, &mut dft, &registry, &sink);

        let mut contents = String::new();
        File::open(&path).unwrap().read_to_string(&mut contents).unwrap();
        let _ = std::fs::remove_file(&path);
        contents
    }

    /// Synthesizes one FFT-length capture of a pure tone at `tone_freq_hz`
    /// (a baseband frequency, positive or negative) via `SimulatedRadio`.
    fn tone_capture(config: &Config, freq_idx: usize, tone_freq_hz: f64) -> Capture {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        radio.set_sample_rate(config.samplerate).unwrap();
        radio.tones.push((tone_freq_hz, 0.5));
        let mut buf = vec![0i16; 2 * config.fft_len];
        let mut ts = 0u64;
        radio.sync_rx(&mut buf, config.fft_len, &mut ts, 1000).unwrap();
        Capture {
            data: buf,
            freq_idx,
            integration_idx: 0,
            count: 1,
            scan_time: SystemTime::now(),
        }
    }

    #[test]
    fn flushes_exactly_once_at_num_integrations() {
        let mut config = Config::for_test(10_000_000, 20_000_000, 10_000_000, 1_000_000, 0.5, 1);
        config.num_integrations = 2;
        let plan = test_plan(&config);
        let registry = new_registry();
        let sink = Arc::new(SharedSink::new(Sink::stdout()));
        let mut dft = DftPlan::new(config.fft_len);

        let capture = Capture {
            data: vec![0i16; 2 * config.fft_len],
            freq_idx: 0,
            integration_idx: 0,
            count: 1,
            scan_time: SystemTime::now(),
        };
        process_capture(&config, &plan, capture, &mut dft, &registry, &sink);
        assert_eq!(registry.lock().unwrap().buffers.len(), 1);

        let capture2 = Capture {
            data: vec![0i16; 2 * config.fft_len],
            freq_idx: 0,
            integration_idx: 1,
            count: 1,
            scan_time: SystemTime::now(),
        };
        process_capture(&config, &plan, capture2, &mut dft, &registry, &sink);
        assert_eq!(registry.lock().unwrap().buffers.len(), 0);
    }

    #[test]
    fn csv_line_has_expected_shape() {
        let config = Config::for_test(10_000_000, 20_000_000, 10_000_000, 1_000_000, 0.5, 1);
        let ib = IntegrationBuffer {
            freq_idx: 0,
            partial: vec![2048.0 * config.num_integrations as f64; 3],
            integrations_done: config.num_integrations,
            view_start: 10_000_000,
            view_end: 11_000_000,
        };
        let line = format_csv_line(&config, &ib, SystemTime::now());
        assert!(line.starts_with(char::is_numeric));
        assert!(line.contains("'',"));
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches(',').count(), 8);
    }

    #[test]
    fn upper_sideband_round_trip_peaks_at_expected_bin() {
        let mut config = Config::for_test(10_000_000, 20_000_000, 10_000_000, 1_000_000, 0.5, 1);
        config.num_integrations = 1;
        let plan = test_plan(&config);

        // freqs[1] == 11_000_000; its upper-sideband view keeps bins 2 and 3
        // (12 MHz and 13 MHz). A tone at bin 2 (2 MHz baseband) should
        // dominate the emitted spectrum.
        let capture = tone_capture(&config, 1, 2_000_000.0);
        let line = capture_to_csv_line(&config, &plan, capture);
        assert!(!line.is_empty(), "single integration must flush immediately");

        let fields: Vec<&str> = line.trim_end().split(", ").collect();
        let db_values: Vec<f64> = fields[6..].iter().map(|s| s.parse().unwrap()).collect();
        assert_eq!(db_values.len(), 2);
        assert!(db_values[0] > db_values[1], "tone at bin 2 should dominate bin 3: {db_values:?}");
    }

    #[test]
    fn lower_sideband_boundary_does_not_panic_and_flushes_one_bin() {
        // Regression test: freq_idx 0's lower-sideband view used to compute
        // bin_end = fft_len + 1, panicking when sliced against a fft_len-long
        // magnitude vector.
        let radio_min = 300_000_000u64;
        let mut config = Config::for_test(radio_min, radio_min + 10_000_000, 10_000_000, 1_000_000, 0.5, 1);
        config.num_integrations = 1;
        let plan = plan_frequencies(config.start_freq, config.end_freq, config.bin_width, config.fmbw2, radio_min).unwrap();
        assert!(plan.first_freq_lower_sideband);

        // Bin 9 of a 10-point FFT is the negative-frequency bin at -1 MHz.
        let capture = tone_capture(&config, 0, -1_000_000.0);
        let line = capture_to_csv_line(&config, &plan, capture);
        assert!(!line.is_empty(), "single integration must flush immediately");

        let fields: Vec<&str> = line.trim_end().split(", ").collect();
        assert_eq!(fields.len(), 7, "exactly one bin should survive the clamp to fft_len");
    }
}
