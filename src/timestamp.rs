pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Playback time of `samples` at `sample_rate`, or "unknown" without a rate.
pub fn samples_str(samples: u64, sample_rate: u32) -> String {
    if sample_rate == 0 {
        return "unknown".to_string();
    }
    time_str(samples as f64 / sample_rate as f64)
}

#[test]
fn formats_sample_counts() {
    assert_eq!(samples_str(44_100 * 61 + 22_050, 44_100), "00:01:01.500");
    assert_eq!(samples_str(48_000 * 3600 * 101, 48_000), "101:00:00.000");
    assert_eq!(samples_str(10, 0), "unknown");
}
