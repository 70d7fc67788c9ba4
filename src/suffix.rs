//! Numeric suffix parsing and formatting for CLI arguments and the status
//! line, e.g. `900M` -> 900_000_000, `5s` -> 5000 (milliseconds).
//!
//! This is intentionally small: the original system treats suffix parsing
//! as an external helper, not part of the scanning core.

/// One `(suffix, multiplier)` pair, tried in order and matched case-insensitively
/// against the longest suffix that fits.
struct Suffix {
    text: &'static str,
    multiplier: u64,
}

const FREQ_SUFFIXES: &[Suffix] = &[
    Suffix { text: "GHz", multiplier: 1_000_000_000 },
    Suffix { text: "G", multiplier: 1_000_000_000 },
    Suffix { text: "MHz", multiplier: 1_000_000 },
    Suffix { text: "M", multiplier: 1_000_000 },
    Suffix { text: "kHz", multiplier: 1_000 },
    Suffix { text: "k", multiplier: 1_000 },
];

const TIME_SUFFIXES: &[Suffix] = &[
    Suffix { text: "ms", multiplier: 1 },
    Suffix { text: "d", multiplier: 1000 * 60 * 60 * 24 },
    Suffix { text: "h", multiplier: 1000 * 60 * 60 },
    Suffix { text: "m", multiplier: 1000 * 60 },
    Suffix { text: "s", multiplier: 1000 },
];

fn parse_with(text: &str, suffixes: &[Suffix]) -> Result<u64, String> {
    let text = text.trim();
    for suffix in suffixes {
        if let Some(digits) = strip_suffix_case_insensitive(text, suffix.text) {
            let value: f64 = digits
                .trim()
                .parse()
                .map_err(|_| format!("invalid numeric value \"{text}\""))?;
            if value < 0.0 {
                return Err(format!("negative value not allowed: \"{text}\""));
            }
            return Ok((value * suffix.multiplier as f64).round() as u64);
        }
    }
    text.parse::<u64>()
        .map_err(|_| format!("invalid numeric value \"{text}\""))
}

fn strip_suffix_case_insensitive<'a>(text: &'a str, suffix: &str) -> Option<&'a str> {
    if text.len() <= suffix.len() {
        return None;
    }
    let (head, tail) = text.split_at(text.len() - suffix.len());
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

/// Parses a frequency-like value, e.g. `"900M"`, `"1.2G"`, `"10k"`, or a bare
/// integer number of Hz.
pub fn parse_freq(text: &str) -> Result<u64, String> {
    parse_with(text, FREQ_SUFFIXES)
}

/// Parses a duration-like value into milliseconds, e.g. `"5s"`, `"30m"`,
/// `"1h"`, `"0"` (forever), or a bare integer number of milliseconds.
pub fn parse_duration_ms(text: &str) -> Result<u64, String> {
    parse_with(text, TIME_SUFFIXES)
}

/// Renders `value` (a frequency in Hz) with the shortest SI suffix that
/// keeps the mantissa `>= 1`, three fractional digits, matching the
/// original status-line renderer's `double2str_suffix`.
pub fn format_si(value: f64) -> String {
    // Prefer the suffix whose ratio is closest to (but not below) 1; among
    // suffixes sharing a multiplier, prefer the shorter spelling.
    let mut best: Option<(f64, &Suffix)> = None;
    for suffix in FREQ_SUFFIXES {
        let ratio = value / suffix.multiplier as f64;
        best = match best {
            None => (ratio >= 1.0).then_some((ratio, suffix)),
            Some((best_ratio, best_suffix)) => {
                if best_suffix.multiplier == suffix.multiplier {
                    if suffix.text.len() < best_suffix.text.len() {
                        Some((ratio, suffix))
                    } else {
                        Some((best_ratio, best_suffix))
                    }
                } else if ratio >= 1.0 && ratio < best_ratio {
                    Some((ratio, suffix))
                } else {
                    Some((best_ratio, best_suffix))
                }
            }
        };
    }
    match best {
        Some((ratio, suffix)) => format!("{ratio:.3}{}", suffix.text),
        None => format!("{value:.3}"),
    }
}
