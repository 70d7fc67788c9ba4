//! The single capture thread: walks `(freq_idx, integration_idx)`, pulls IQ
//! windows from the radio, enqueues `Capture` descriptors, and drives
//! retuning, timestamp recovery, and the reopen-after-failures escalation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, SweepError};
use crate::plan::FrequencyPlan;
use crate::queue::CaptureQueue;
use crate::quicktune::QuickTuneTable;
use crate::radio::Radio;
use crate::status::StatusLine;

/// One contiguous pull of `count` FFT-length windows of IQ, owned until a
/// worker consumes and frees it.
pub struct Capture {
    pub data: Vec<i16>,
    pub freq_idx: usize,
    pub integration_idx: u32,
    pub count: u32,
    pub scan_time: SystemTime,
}

/// Caps a single `sync_rx` call at roughly 100 MiB of IQ data, bounding
/// per-call allocation and keeping the queue responsive.
const MAX_CAPTURE_BYTES: u64 = 100 * 1024 * 1024;

const STATUS_INTERVAL: Duration = Duration::from_millis(50);
const QUICKTUNE_INTERVAL: Duration = Duration::from_secs(60 * 60);
const FAILURE_REOPEN_THRESHOLD: u32 = 6;

/// Mutable state the capture loop owns exclusively: no other thread reads
/// or writes `last_buffer_timestamp`, the quick-tune table, or the device
/// handle.
pub struct CaptureLoop<'a> {
    config: &'a Config,
    plan: &'a FrequencyPlan,
    radio: Box<dyn Radio>,
    qtunes: QuickTuneTable,
    last_buffer_timestamp: u64,
    queue: Arc<CaptureQueue>,
    keep_running: Arc<AtomicBool>,
}

/// Full device bring-up sequence: open, tune the analog front end, set up
/// the RX stream, enable it. Shared by first open and by the reopen path
/// so a reopened device always ends up in the same state a fresh one
/// would, matching `original_source/src/device.cpp`'s `open_device`.
fn open_and_configure_radio(radio: &mut dyn Radio, config: &Config) -> Result<()> {
    radio.open(&config.device).map_err(|e| SweepError::RadioOpen(e.to_string()))?;
    radio.set_sample_rate(config.samplerate).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio.set_bandwidth(config.samplerate).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio.set_lna_gain(config.lna_gain).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio.set_rxvga1(config.rxvga1).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio.set_rxvga2(config.rxvga2).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio
        .configure_stream(crate::radio::StreamConfig {
            num_buffers: config.num_buffers,
            buffer_size: config.buffer_size,
            num_transfers: config.num_transfers,
            timeout_ms: config.timeout_ms,
        })
        .map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    radio.enable_rx(true).map_err(|e| SweepError::RadioConfig(e.to_string()))?;
    Ok(())
}

impl<'a> CaptureLoop<'a> {
    pub fn new(
        config: &'a Config,
        plan: &'a FrequencyPlan,
        mut radio: Box<dyn Radio>,
        queue: Arc<CaptureQueue>,
        keep_running: Arc<AtomicBool>,
    ) -> Result<Self> {
        open_and_configure_radio(radio.as_mut(), config)?;

        let qtunes = QuickTuneTable::calibrate(radio.as_mut(), &plan.freqs)?;
        let last_buffer_timestamp = radio.timestamp() + config.samplerate / 100;

        Ok(Self {
            config,
            plan,
            radio,
            qtunes,
            last_buffer_timestamp,
            queue,
            keep_running,
        })
    }

    /// Reopens the device and recalibrates quick-tune after repeated
    /// failures, matching the escalation in §4.4. Runs the same bring-up
    /// sequence as `new()` so the reopened device has a working RX stream.
    fn reopen_and_recalibrate(&mut self) -> Result<()> {
        warn!("too many consecutive capture failures, reopening device");
        let _ = self.radio.close();
        open_and_configure_radio(self.radio.as_mut(), self.config)?;
        self.qtunes = QuickTuneTable::calibrate(self.radio.as_mut(), &self.plan.freqs)?;
        self.last_buffer_timestamp = self.radio.timestamp() + self.config.samplerate / 100;
        Ok(())
    }

    /// Runs until `keep_running` is cleared (SIGINT) or the exit timer
    /// elapses. Returns once the final in-flight capture has been enqueued.
    pub fn run(&mut self) -> Result<()> {
        let t_start = Instant::now();
        let mut t_status = t_start;
        let mut t_tune = t_start;
        let mut sweep_wall_time = SystemTime::now();

        let mut freq_idx = 0usize;
        let mut integration_idx = 0u32;
        let mut failures_in_row = 0u32;

        let mut status = StatusLine::new();

        while self.keep_running.load(Ordering::Relaxed) {
            let now = Instant::now();

            if freq_idx == 0 && integration_idx == 0 {
                sweep_wall_time = SystemTime::now();
                if self.config.exit_timer_ms > 0
                    && now.duration_since(t_start).as_millis() as u64 >= self.config.exit_timer_ms
                {
                    break;
                }
            }

            if now.duration_since(t_status) >= STATUS_INTERVAL {
                status.render(self.config, self.plan, freq_idx, self.queue.len(), t_start, self.config.exit_timer_ms);
                t_status = now;
            }

            match self.receive_and_submit(&mut freq_idx, &mut integration_idx, sweep_wall_time) {
                Ok(()) => failures_in_row = 0,
                Err(err) => {
                    failures_in_row += 1;
                    debug!("capture failure #{failures_in_row}: {err}");
                    if failures_in_row >= FAILURE_REOPEN_THRESHOLD {
                        self.reopen_and_recalibrate()?;
                        failures_in_row = 0;
                    }
                }
            }

            if now.duration_since(t_tune) >= QUICKTUNE_INTERVAL {
                info!("hourly quick-tune recalibration");
                self.qtunes = QuickTuneTable::calibrate(self.radio.as_mut(), &self.plan.freqs)?;
                t_tune = now;
            }
        }

        Ok(())
    }

    fn receive_and_submit(
        &mut self,
        freq_idx: &mut usize,
        integration_idx: &mut u32,
        scan_time: SystemTime,
    ) -> Result<()> {
        let fft_len = self.config.fft_len;
        let max_buffs = (MAX_CAPTURE_BYTES / (2 * 2 * fft_len as u64)).max(1);
        let remaining = self.config.num_integrations - *integration_idx;
        let count = remaining.min(max_buffs as u32).max(1);

        let num_samples = count as usize * fft_len;
        let mut buf = vec![0i16; 2 * num_samples];
        let mut ts = self.last_buffer_timestamp + count as u64 * fft_len as u64;

        match self.radio.sync_rx(&mut buf, num_samples, &mut ts, self.config.timeout_ms) {
            Ok(()) => {
                self.last_buffer_timestamp = ts + self.config.samplerate / 1000;
            }
            Err(SweepError::TimestampInPast) => {
                self.last_buffer_timestamp = self.radio.timestamp() + self.config.samplerate / 1000;
                if self.config.verbosity > 0 {
                    debug!("timestamp in past, reseeded from device clock");
                }
                return Err(SweepError::TimestampInPast);
            }
            Err(other) => {
                warn!("capture error: {other}");
                return Err(other);
            }
        }

        self.queue.push(Capture {
            data: buf,
            freq_idx: *freq_idx,
            integration_idx: *integration_idx,
            count,
            scan_time,
        });

        *integration_idx = (*integration_idx + count) % self.config.num_integrations;
        if *integration_idx == 0 {
            *freq_idx = (*freq_idx + 1) % self.plan.freqs.len();
            if self.plan.freqs.len() > 1 {
                let now_ts = self.radio.timestamp();
                let next_freq = self.plan.freqs[*freq_idx];
                let quicktune = self.qtunes.get(*freq_idx);
                self.radio
                    .schedule_retune(now_ts, next_freq, quicktune)
                    .map_err(|e| SweepError::RadioConfig(e.to_string()))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plan::{derive_params, plan_frequencies};
    use crate::radio::SimulatedRadio;
    use std::sync::atomic::AtomicBool;

    fn test_config() -> Config {
        Config::for_test(10_000_000, 20_000_000, 10_000_000, 1_000_000, 0.5, 1)
    }

    #[test]
    fn capture_loop_enqueues_and_advances() {
        let config = test_config();
        let params = derive_params(config.samplerate, 1_000_000, config.filter_margin).unwrap();
        let plan = plan_frequencies(config.start_freq, config.end_freq, params.bin_width, params.fmbw2, 0).unwrap();

        let queue = Arc::new(CaptureQueue::new());
        let keep_running = Arc::new(AtomicBool::new(true));
        let radio: Box<dyn Radio> = Box::new(SimulatedRadio::new());
        let mut capture_loop = CaptureLoop::new(&config, &plan, radio, queue.clone(), keep_running.clone()).unwrap();

        let mut freq_idx = 0usize;
        let mut integration_idx = 0u32;
        capture_loop.receive_and_submit(&mut freq_idx, &mut integration_idx, SystemTime::now()).unwrap();

        assert_eq!(queue.len(), 1);
        assert!(integration_idx > 0 || freq_idx == 1);
    }

    #[test]
    fn timestamp_in_past_recovers_on_next_call() {
        let config = test_config();
        let params = derive_params(config.samplerate, 1_000_000, config.filter_margin).unwrap();
        let plan = plan_frequencies(config.start_freq, config.end_freq, params.bin_width, params.fmbw2, 0).unwrap();

        let queue = Arc::new(CaptureQueue::new());
        let keep_running = Arc::new(AtomicBool::new(true));
        let mut sim = SimulatedRadio::new();
        sim.faults.timestamp_in_past = true;
        let radio: Box<dyn Radio> = Box::new(sim);
        let mut capture_loop = CaptureLoop::new(&config, &plan, radio, queue.clone(), keep_running).unwrap();

        let mut freq_idx = 0usize;
        let mut integration_idx = 0u32;
        let first = capture_loop.receive_and_submit(&mut freq_idx, &mut integration_idx, SystemTime::now());
        assert!(matches!(first, Err(SweepError::TimestampInPast)));

        let second = capture_loop.receive_and_submit(&mut freq_idx, &mut integration_idx, SystemTime::now());
        assert!(second.is_ok());
        assert_eq!(queue.len(), 1);
    }
}
