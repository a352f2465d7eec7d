//! The persisted form of a stopwatch session.

use serde::{Deserialize, Serialize};

use crate::{Lap, StopwatchStatus};

/// Longest session accepted from storage: 100 years.
const MAX_SESSION_MS: u64 = 100 * 365 * 24 * 60 * 60 * 1000;
/// Last millisecond of 9999-12-31 UTC.
const MAX_WALL_CLOCK_MS: u64 = 253_402_300_799_999;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed session record: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("inconsistent session record: {0}")]
    Inconsistent(String),
}

/// Everything needed to rebuild a session after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(alias = "state")]
    pub status: StopwatchStatus,
    pub start_time: u64,
    pub accumulated_time: u64,
    #[serde(default)]
    pub laps: Vec<Lap>,
}

impl SessionRecord {
    pub fn encode(&self) -> Result<String, RecordError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and validate a stored payload.
    pub fn decode(payload: &str) -> Result<Self, RecordError> {
        let record: SessionRecord = serde_json::from_str(payload)?;
        record.validate()?;
        Ok(record)
    }

    /// Check the lap invariants. Laps are newest first, so indices run
    /// `n..=1` and end times strictly decrease down the list.
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.accumulated_time > MAX_SESSION_MS {
            return Err(inconsistent(format!(
                "banked time {} is out of range",
                self.accumulated_time
            )));
        }
        if self.status == StopwatchStatus::Running && self.start_time > MAX_WALL_CLOCK_MS {
            return Err(inconsistent(format!(
                "start time {} is out of range",
                self.start_time
            )));
        }
        if let Some(lap) = self
            .laps
            .iter()
            .find(|lap| lap.end_time > MAX_SESSION_MS || lap.id > MAX_WALL_CLOCK_MS)
        {
            return Err(inconsistent(format!("lap {} is out of range", lap.lap_index)));
        }
        if self.status == StopwatchStatus::Idle
            && (self.accumulated_time != 0 || !self.laps.is_empty())
        {
            return Err(inconsistent("idle session carries time or laps"));
        }

        let count = self.laps.len();
        for (pos, lap) in self.laps.iter().enumerate() {
            let expected_index = (count - pos) as u32;
            if lap.lap_index != expected_index {
                return Err(inconsistent(format!(
                    "lap at position {} has index {}, expected {}",
                    pos, lap.lap_index, expected_index
                )));
            }
            let previous_end = match self.laps.get(pos + 1) {
                Some(older) => {
                    if lap.end_time <= older.end_time {
                        return Err(inconsistent(format!(
                            "lap {} ends at {} which is not after lap {} ({})",
                            lap.lap_index, lap.end_time, older.lap_index, older.end_time
                        )));
                    }
                    if lap.id <= older.id {
                        return Err(inconsistent(format!(
                            "lap {} id {} is not after lap {} id {}",
                            lap.lap_index, lap.id, older.lap_index, older.id
                        )));
                    }
                    older.end_time
                }
                None => 0,
            };
            if lap.end_time == 0 || lap.split_time != lap.end_time - previous_end {
                return Err(inconsistent(format!(
                    "lap {} split {} does not match end time {}",
                    lap.lap_index, lap.split_time, lap.end_time
                )));
            }
        }

        if self.status != StopwatchStatus::Running {
            if let Some(newest) = self.laps.first() {
                if newest.end_time > self.accumulated_time {
                    return Err(inconsistent(format!(
                        "lap {} ends after the banked time {}",
                        newest.lap_index, self.accumulated_time
                    )));
                }
            }
        }
        Ok(())
    }
}

fn inconsistent(msg: impl Into<String>) -> RecordError {
    RecordError::Inconsistent(msg.into())
}
