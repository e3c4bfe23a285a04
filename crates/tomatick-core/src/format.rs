/// Render seconds as zero-padded `mm:ss`. Minutes are not wrapped into hours.
pub fn format_mm_ss(total_secs: u64) -> String {
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    format!("{minutes:02}:{seconds:02}")
}

/// Render a duration as whole minutes, e.g. `25 min`.
pub fn format_minutes(total_secs: u64) -> String {
    format!("{} min", total_secs / 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_both_fields() {
        assert_eq!(format_mm_ss(0), "00:00");
        assert_eq!(format_mm_ss(65), "01:05");
        assert_eq!(format_mm_ss(1500), "25:00");
    }

    #[test]
    fn long_durations_keep_counting_minutes() {
        assert_eq!(format_mm_ss(100 * 60 + 1), "100:01");
    }

    #[test]
    fn minutes_are_truncated() {
        assert_eq!(format_minutes(1499), "24 min");
        assert_eq!(format_minutes(900), "15 min");
    }
}
