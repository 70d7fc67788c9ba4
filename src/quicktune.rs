//! Quick-tune calibration: one slow tune per planned frequency, recording
//! opaque per-frequency tuning state so later retunes during the sweep are
//! fast. Recalibration also runs once per hour and after a forced reopen.

use log::info;

use crate::error::{Result, SweepError};
use crate::radio::{QuickTune, Radio};

pub struct QuickTuneTable {
    entries: Vec<QuickTune>,
}

impl QuickTuneTable {
    /// Slow-tunes to every frequency in `freqs` in order and records its
    /// quick-tune state. Fails fast: any tuning error aborts the whole scan.
    pub fn calibrate(radio: &mut dyn Radio, freqs: &[u64]) -> Result<Self> {
        info!("calibrating quick-tune for {} frequencies", freqs.len());
        let mut entries = Vec::with_capacity(freqs.len());
        for &freq in freqs {
            radio.tune(freq).map_err(|e| SweepError::CalibrationFailed(e.to_string()))?;
            let qt = radio.quick_tune_get().map_err(|e| SweepError::CalibrationFailed(e.to_string()))?;
            entries.push(qt);
        }
        Ok(Self { entries })
    }

    pub fn get(&self, freq_idx: usize) -> Option<&QuickTune> {
        self.entries.get(freq_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::SimulatedRadio;

    #[test]
    fn calibration_covers_every_frequency() {
        let mut radio = SimulatedRadio::new();
        radio.open("").unwrap();
        let freqs = vec![100_000_000, 110_000_000, 120_000_000];
        let table = QuickTuneTable::calibrate(&mut radio, &freqs).unwrap();
        for idx in 0..freqs.len() {
            assert!(table.get(idx).is_some());
        }
        assert!(table.get(freqs.len()).is_none());
    }
}
