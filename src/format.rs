const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable size in base-1024 units.
///
/// Bytes are shown whole, larger units with one decimal. Anything past GB
/// stays in GB.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut unit = 0;
    let mut threshold = 1024u64;
    while unit + 1 < UNITS.len() && bytes >= threshold {
        unit += 1;
        threshold = threshold.saturating_mul(1024);
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        let value = bytes as f64 / 1024f64.powi(unit as i32);
        format!("{:.1} {}", value, UNITS[unit])
    }
}
