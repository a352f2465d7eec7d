//! Pure timing logic library with no platform dependencies.
//! Time is always passed in by the caller, so everything here is testable on host.

mod format;
mod record;

use serde::{Deserialize, Serialize};

pub use format::{format_centi, format_min_sec, format_time};
pub use record::{RecordError, SessionRecord};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StopwatchStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

/// A recorded split. `end_time` is the total elapsed time when the lap was
/// taken, `split_time` the duration of this lap alone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lap {
    pub id: u64,
    pub lap_index: u32,
    pub end_time: u64,
    pub split_time: u64,
}

/// Stopwatch timing state.
///
/// `segment_start_ms` is wall-clock time so that a running session keeps
/// counting across a restart. Elapsed time is never stored, only derived.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StopwatchCore {
    status: StopwatchStatus,
    accumulated_ms: u64,
    segment_start_ms: u64,
    /// Newest first.
    laps: Vec<Lap>,
}

impl StopwatchCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StopwatchStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == StopwatchStatus::Running
    }

    pub fn laps(&self) -> &[Lap] {
        &self.laps
    }

    pub fn accumulated_ms(&self) -> u64 {
        self.accumulated_ms
    }

    /// Returns false when already running.
    pub fn start(&mut self, now_ms: u64) -> bool {
        if self.status == StopwatchStatus::Running {
            return false;
        }
        self.segment_start_ms = now_ms;
        self.status = StopwatchStatus::Running;
        true
    }

    /// Bank the running segment and pause. Returns false unless running.
    pub fn stop(&mut self, now_ms: u64) -> bool {
        if self.status != StopwatchStatus::Running {
            return false;
        }
        self.accumulated_ms = self
            .accumulated_ms
            .saturating_add(now_ms.saturating_sub(self.segment_start_ms));
        self.segment_start_ms = 0;
        self.status = StopwatchStatus::Paused;
        true
    }

    pub fn reset(&mut self) {
        self.accumulated_ms = 0;
        self.segment_start_ms = 0;
        self.laps.clear();
        self.status = StopwatchStatus::Idle;
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match self.status {
            StopwatchStatus::Running => {
                self.accumulated_ms.saturating_add(now_ms.saturating_sub(self.segment_start_ms))
            }
            _ => self.accumulated_ms,
        }
    }

    /// Record a split. Only valid while running, and only once time has moved
    /// past the previous lap.
    pub fn lap(&mut self, now_ms: u64) -> Option<&Lap> {
        if self.status != StopwatchStatus::Running {
            return None;
        }
        let end_time = self.elapsed_ms(now_ms);
        let (last_end, last_id, last_index) = match self.laps.first() {
            Some(last) => (last.end_time, Some(last.id), last.lap_index),
            None => (0, None, 0),
        };
        if end_time <= last_end {
            return None;
        }
        let id = match last_id {
            Some(last_id) if now_ms <= last_id => last_id.saturating_add(1),
            _ => now_ms,
        };
        self.laps.insert(
            0,
            Lap {
                id,
                lap_index: last_index + 1,
                end_time,
                split_time: end_time - last_end,
            },
        );
        self.laps.first()
    }

    pub fn snapshot(&self, now_ms: u64) -> Snapshot<'_> {
        Snapshot {
            status: self.status,
            elapsed_ms: self.elapsed_ms(now_ms),
            laps: &self.laps,
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            status: self.status,
            start_time: self.segment_start_ms,
            accumulated_time: self.accumulated_ms,
            laps: self.laps.clone(),
        }
    }

    pub fn from_record(record: SessionRecord) -> Self {
        let segment_start_ms = match record.status {
            StopwatchStatus::Running => record.start_time,
            _ => 0,
        };
        Self {
            status: record.status,
            accumulated_ms: record.accumulated_time,
            segment_start_ms,
            laps: record.laps,
        }
    }
}

/// Read-only view handed to the display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot<'a> {
    pub status: StopwatchStatus,
    pub elapsed_ms: u64,
    pub laps: &'a [Lap],
}

impl Snapshot<'_> {
    /// Time on the phantom lap that has not been recorded yet.
    pub fn current_lap_ms(&self) -> u64 {
        let last_end = self.laps.first().map_or(0, |lap| lap.end_time);
        self.elapsed_ms.saturating_sub(last_end)
    }

    /// Index of the lap the display shows as in progress.
    pub fn current_lap_index(&self) -> u32 {
        self.laps.first().map_or(1, |lap| lap.lap_index + 1)
    }

    /// Shortest and longest split, if there are at least two laps that differ.
    pub fn split_extremes(&self) -> Option<(u64, u64)> {
        if self.laps.len() < 2 {
            return None;
        }
        let fastest = self.laps.iter().map(|lap| lap.split_time).min()?;
        let slowest = self.laps.iter().map(|lap| lap.split_time).max()?;
        if fastest == slowest {
            return None;
        }
        Some((fastest, slowest))
    }
}
