//! Human-readable rates and sizes.
//!
//! # Example
//!
//! ```
//! use nshaper::output::formatting::{format_bytes, format_rate_bps, format_rate_pps};
//!
//! assert_eq!(format_rate_bps(10_000_000), "10Mbps");
//! assert_eq!(format_rate_bps(1_500_000), "1.5Mbps");
//! assert_eq!(format_rate_pps(64_000), "64Kpps");
//! assert_eq!(format_bytes(65_536), "64KiB");
//! ```

use crate::shaper::Metric;

/// Scale `value` by the largest unit it reaches.
///
/// Exact multiples print without decimals.
fn scaled(value: u64, base: u64, units: &[&str], suffix: &str) -> String {
    let mut unit = 1u64;
    let mut idx = 0;
    while idx + 1 < units.len() && value >= unit * base {
        unit *= base;
        idx += 1;
    }

    if value % unit == 0 {
        format!("{}{}{}", value / unit, units[idx], suffix)
    } else {
        format!("{:.1}{}{}", value as f64 / unit as f64, units[idx], suffix)
    }
}

/// Format a bit rate (Kbps, Mbps, Gbps, Tbps; SI units).
pub fn format_rate_bps(bits_per_sec: u64) -> String {
    scaled(bits_per_sec, 1000, &["", "K", "M", "G", "T"], "bps")
}

/// Format a packet rate (Kpps, Mpps, Gpps; SI units).
pub fn format_rate_pps(pkts_per_sec: u64) -> String {
    scaled(pkts_per_sec, 1000, &["", "K", "M", "G"], "pps")
}

/// Format a rate in the unit given by `metric`.
pub fn format_rate(metric: Metric, value: u64) -> String {
    match metric {
        Metric::Bps => format_rate_bps(value),
        Metric::Pps => format_rate_pps(value),
    }
}

/// Format a byte count (KiB, MiB, GiB; binary units).
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    scaled(bytes, 1024, &["", "Ki", "Mi", "Gi", "Ti"], "B")
}
