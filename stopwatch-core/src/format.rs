//! Display formatting for millisecond durations.

/// Format milliseconds as "MM:SS.cc", or "HH:MM:SS.cc" once an hour has passed.
pub fn format_time(ms: u64) -> String {
    let total_secs = ms / 1000;
    let cs = (ms % 1000) / 10;
    let h = total_secs / 3600;
    let m = (total_secs % 3600) / 60;
    let s = total_secs % 60;
    if h == 0 {
        format!("{:02}:{:02}.{:02}", m, s, cs)
    } else {
        format!("{:02}:{:02}:{:02}.{:02}", h, m, s, cs)
    }
}

/// Format milliseconds as "MM:SS". Minutes do not roll over into hours.
pub fn format_min_sec(ms: u64) -> String {
    let total_secs = ms / 1000;
    let m = total_secs / 60;
    let s = total_secs % 60;
    format!("{:02}:{:02}", m, s)
}

/// Format the centisecond part of a duration as "cc".
pub fn format_centi(ms: u64) -> String {
    format!("{:02}", (ms % 1000) / 10)
}
