use serde::{Deserialize, Serialize};

/// A coalesced interval of near-continuous on-screen presence, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        debug_assert!(start <= end, "time range start must not exceed end");
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Coalesces sorted timestamps into ranges.
///
/// The last range is extended while `t - last.end <= max_gap`; otherwise a
/// new range opens. Consecutive output ranges are therefore separated by
/// strictly more than `max_gap`.
pub fn coalesce(sorted_timestamps: &[f64], max_gap: f64) -> Vec<TimeRange> {
    let mut ranges: Vec<TimeRange> = Vec::new();
    for &t in sorted_timestamps {
        match ranges.last_mut() {
            Some(last) if t - last.end <= max_gap => last.end = last.end.max(t),
            _ => ranges.push(TimeRange::new(t, t)),
        }
    }
    ranges
}
