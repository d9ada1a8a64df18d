use std::time::Duration;

/// Formats a duration as `HH:MM:SS.mmm`; hours widen past 99.
pub fn time_str(time: Duration) -> String {
    let ms = time.as_millis();
    let hours = ms / 3_600_000;
    let minutes = ms % 3_600_000 / 60_000;
    let seconds = ms % 60_000 / 1000;
    let milliseconds = ms % 1000;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}")
}

#[test]
fn formats_hours_minutes_seconds() {
    assert_eq!(time_str(Duration::from_millis(3_723_045)), "01:02:03.045");
    assert_eq!(time_str(Duration::ZERO), "00:00:00.000");
    assert_eq!(time_str(Duration::from_secs(360_000)), "100:00:00.000");
}
