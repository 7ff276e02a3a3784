//! ISO-8601 durations as used by the YouTube API (`PT1H2M3S`, `P1DT2H`)

/// Parse a duration into whole seconds
///
/// Supports weeks, days, hours, minutes and (fractional) seconds. Years and
/// months have no fixed length and are rejected.
pub fn parse_iso8601_duration(input: &str) -> Option<i64> {
    let rest = input.trim().strip_prefix('P')?;
    if rest.is_empty() {
        return None;
    }

    let mut total = 0f64;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for ch in rest.chars() {
        match ch {
            '0'..='9' | '.' | ',' => number.push(if ch == ',' { '.' } else { ch }),
            'T' if !in_time && number.is_empty() => in_time = true,
            unit => {
                let value: f64 = number.parse().ok()?;
                number.clear();
                let seconds = match (in_time, unit) {
                    (false, 'W') => 604_800.0,
                    (false, 'D') => 86_400.0,
                    (true, 'H') => 3_600.0,
                    (true, 'M') => 60.0,
                    (true, 'S') => 1.0,
                    _ => return None,
                };
                total += value * seconds;
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }

    Some(total.floor() as i64)
}

/// Render seconds as `m:ss` or `h:mm:ss`
pub fn format_duration(total_seconds: i64) -> String {
    let total_seconds = total_seconds.max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Parse `ss`, `mm:ss` or `h:mm:ss` (optionally bracketed) into seconds
pub fn parse_clock_timestamp(input: &str) -> Option<i64> {
    let trimmed = input.trim().trim_start_matches('[').trim_end_matches(']');
    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }

    let mut total = 0i64;
    for part in parts {
        let value: i64 = part.trim().parse().ok()?;
        if value < 0 {
            return None;
        }
        total = total * 60 + value;
    }
    Some(total)
}
