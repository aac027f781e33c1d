//! Human-readable units for speeds, data volumes and latencies

/// Format a speed given in bytes per second.
///
/// With `use_bits` the value is shown in bits per second (`Mbps`), otherwise
/// in bytes per second (`MB/s`). Thresholds are decimal.
pub fn format_speed(bytes_per_sec: f64, use_bits: bool) -> String {
    let bytes_per_sec = if bytes_per_sec.is_finite() { bytes_per_sec.max(0.0) } else { 0.0 };
    let value = if use_bits { bytes_per_sec * 8.0 } else { bytes_per_sec };
    let unit = if use_bits { "bps" } else { "B/s" };

    if value >= 1_000_000_000.0 {
        format!("{:.2} G{}", value / 1_000_000_000.0, unit)
    } else if value >= 1_000_000.0 {
        format!("{:.2} M{}", value / 1_000_000.0, unit)
    } else if value >= 1_000.0 {
        format!("{:.1} K{}", value / 1_000.0, unit)
    } else {
        format!("{:.0} {}", value, unit)
    }
}

/// Format a byte count using binary thresholds (1 KB = 1024 B)
pub fn format_data_usage(bytes: f64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;
    const GIB: f64 = MIB * 1024.0;

    if bytes >= GIB {
        format!("{:.2} GB", bytes / GIB)
    } else if bytes >= MIB {
        format!("{:.1} MB", bytes / MIB)
    } else if bytes >= KIB {
        format!("{:.0} KB", bytes / KIB)
    } else {
        format!("{:.0} B", bytes.max(0.0))
    }
}

pub fn format_latency(ms: f64) -> String {
    if ms <= 0.0 || !ms.is_finite() {
        "-- ms".to_string()
    } else if ms < 10.0 {
        format!("{:.1} ms", ms)
    } else {
        format!("{:.0} ms", ms)
    }
}

/// Format a percentage with one decimal, clamping rounding noise at the ends
pub fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}
