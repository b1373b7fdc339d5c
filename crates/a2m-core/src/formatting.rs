//! Human-readable counters for progress and summary lines.

/// Format a count with thousands separators.
///
/// # Examples
///
/// ```
/// use a2m_core::formatting::format_count;
///
/// assert_eq!(format_count(0), "0");
/// assert_eq!(format_count(999), "999");
/// assert_eq!(format_count(1234567), "1,234,567");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a duration in milliseconds.
///
/// * `< 1000` ms → `"250ms"`
/// * `< 60` s → `"12.5s"`
/// * otherwise → `"3m 05s"`
///
/// # Examples
///
/// ```
/// use a2m_core::formatting::format_duration_ms;
///
/// assert_eq!(format_duration_ms(250), "250ms");
/// assert_eq!(format_duration_ms(12_500), "12.5s");
/// assert_eq!(format_duration_ms(185_000), "3m 05s");
/// ```
pub fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let secs = ms / 1000;
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}
