//! Status line: a fixed-width ASCII spectrum ruler plus queue depth and
//! elapsed time, printed at most 20x/s and terminated by `\r` so it
//! overwrites in place on the terminal.

use std::time::Instant;

use log::info;

use crate::config::Config;
use crate::plan::FrequencyPlan;
use crate::suffix::format_si;

const STATUS_LINE_BINS: usize = 62;

pub struct StatusLine;

impl StatusLine {
    pub fn new() -> Self {
        Self
    }

    pub fn render(
        &mut self,
        config: &Config,
        plan: &FrequencyPlan,
        freq_idx: usize,
        queue_len: usize,
        t_start: Instant,
        exit_timer_ms: u64,
    ) {
        let line = render_line(config, plan, freq_idx, queue_len, t_start, exit_timer_ms);
        info!("{line}\r");
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

fn render_line(
    config: &Config,
    plan: &FrequencyPlan,
    freq_idx: usize,
    queue_len: usize,
    t_start: Instant,
    exit_timer_ms: u64,
) -> String {
    let bin_width = (config.end_freq - config.start_freq) as f64 / STATUS_LINE_BINS as f64;
    let center = plan.freqs[freq_idx] as f64;

    let mut center_idx = ((center - config.start_freq as f64) / bin_width).round() as i64;
    if !plan.first_freq_lower_sideband && freq_idx == 0 {
        center_idx = 0;
    }
    let bandwidth = (config.fmbw2 / bin_width) as i64;

    let lower_sideband_now = freq_idx == 0 && plan.first_freq_lower_sideband;

    let mut ruler = String::with_capacity(STATUS_LINE_BINS + 2);
    ruler.push('[');
    for idx in 1..=STATUS_LINE_BINS as i64 {
        let ch = if lower_sideband_now {
            if idx >= center_idx - bandwidth && idx < center_idx { '.' } else { ' ' }
        } else if idx <= center_idx + bandwidth && idx > center_idx {
            '.'
        } else {
            ' '
        };
        ruler.push(ch);
    }
    ruler.push(']');

    if (0..=STATUS_LINE_BINS as i64).contains(&center_idx) {
        let byte_idx = ruler
            .char_indices()
            .nth(center_idx as usize + 1)
            .map(|(i, _)| i)
            .unwrap();
        ruler.replace_range(byte_idx..byte_idx + 1, "|");
    }

    let elapsed = t_start.elapsed();
    let elapsed_str = if exit_timer_ms > 0 {
        let pct = (elapsed.as_millis() as f64 / exit_timer_ms as f64 * 100.0).min(100.0);
        format!("{:.0}s/{:.0}%", elapsed.as_secs_f64(), pct)
    } else {
        format!("{:.0}s/\u{221e}", elapsed.as_secs_f64())
    };

    format!(
        "{ruler} {}Hz  Q: {queue_len:4}  {elapsed_str}",
        format_si(center),
    )
}
