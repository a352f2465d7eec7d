use stopwatch_core::{Lap, Snapshot, StopwatchCore, StopwatchStatus};

use crate::clock::Clock;
use crate::pump::Refresh;
use crate::storage::{self, SessionStorage};

/// The stopwatch as the app sees it: timing state, the saved session slot and
/// the redraw pump that runs while the clock is running.
pub struct Stopwatch {
    core: StopwatchCore,
    clock: Box<dyn Clock>,
    storage: Option<Box<dyn SessionStorage>>,
    refresh: Box<dyn Refresh>,
    visible: bool,
}

impl Stopwatch {
    /// Restore the saved session if there is one. Pass `None` for storage to
    /// keep the session in memory only.
    pub fn open(
        clock: Box<dyn Clock>,
        storage: Option<Box<dyn SessionStorage>>,
        refresh: Box<dyn Refresh>,
    ) -> Self {
        let core = match storage.as_deref().and_then(|slot| storage::load_session(slot)) {
            Some(record) => {
                log::info!(
                    "Restored {:?} session with {} laps",
                    record.status,
                    record.laps.len()
                );
                StopwatchCore::from_record(record)
            }
            None => StopwatchCore::new(),
        };
        let mut stopwatch = Self {
            core,
            clock,
            storage,
            refresh,
            visible: true,
        };
        stopwatch.sync_refresh();
        stopwatch
    }

    pub fn status(&self) -> StopwatchStatus {
        self.core.status()
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        self.core.snapshot(self.clock.now_ms())
    }

    pub fn start(&mut self) {
        if self.core.start(self.clock.now_ms()) {
            log::debug!("start at {} ms", self.core.accumulated_ms());
            self.sync_refresh();
            self.persist();
        }
    }

    pub fn stop(&mut self) {
        if self.core.stop(self.clock.now_ms()) {
            log::debug!("stop at {} ms", self.core.accumulated_ms());
            self.sync_refresh();
            self.persist();
        }
    }

    /// Start when idle or paused, stop when running.
    pub fn toggle(&mut self) {
        if self.core.is_running() {
            self.stop();
        } else {
            self.start();
        }
    }

    pub fn reset(&mut self) {
        self.core.reset();
        log::debug!("reset");
        self.sync_refresh();
        if let Some(storage) = self.storage.as_deref() {
            storage::clear_session(storage);
        }
    }

    pub fn lap(&mut self) -> Option<Lap> {
        let lap = self.core.lap(self.clock.now_ms()).cloned()?;
        log::debug!("lap {} split {} ms", lap.lap_index, lap.split_time);
        self.persist();
        Some(lap)
    }

    /// Lap while running, reset otherwise.
    pub fn lap_or_reset(&mut self) {
        if self.core.is_running() {
            self.lap();
        } else {
            self.reset();
        }
    }

    /// Redraws are only needed while the display is visible. Timing carries on regardless.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.sync_refresh();
    }

    fn sync_refresh(&mut self) {
        if self.visible && self.core.is_running() {
            self.refresh.resume();
        } else {
            self.refresh.cancel();
        }
    }

    fn persist(&self) {
        let Some(storage) = self.storage.as_deref() else {
            return;
        };
        if let Err(e) = storage::save_session(storage, &self.core.to_record()) {
            log::error!("Failed to save stopwatch session: {}", e);
        }
    }
}

impl Drop for Stopwatch {
    fn drop(&mut self) {
        if self.refresh.is_active() {
            self.refresh.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pump::FakeRefresh;
    use crate::storage::MemoryStorage;
    use stopwatch_core::SessionRecord;

    struct Harness {
        clock: ManualClock,
        storage: MemoryStorage,
        refresh: FakeRefresh,
    }

    impl Harness {
        fn new(now_ms: u64) -> Self {
            Self::with_storage(now_ms, MemoryStorage::default())
        }

        fn with_storage(now_ms: u64, storage: MemoryStorage) -> Self {
            Self {
                clock: ManualClock::at(now_ms),
                storage,
                refresh: FakeRefresh::default(),
            }
        }

        fn open(&self) -> Stopwatch {
            Stopwatch::open(
                Box::new(self.clock.clone()),
                Some(Box::new(self.storage.clone())),
                Box::new(self.refresh.clone()),
            )
        }

        fn saved(&self) -> Option<SessionRecord> {
            self.storage
                .payload()
                .map(|payload| SessionRecord::decode(&payload).unwrap())
        }
    }

    #[test]
    fn test_fresh_session_is_idle() {
        let h = Harness::new(1_000);
        let sw = h.open();
        let snapshot = sw.snapshot();
        assert_eq!(snapshot.status, StopwatchStatus::Idle);
        assert_eq!(snapshot.elapsed_ms, 0);
        assert!(snapshot.laps.is_empty());
        assert!(!h.refresh.active());
        assert!(h.storage.payload().is_none());
    }

    #[test]
    fn test_lap_scenario() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.start();
        assert!(h.refresh.active());

        h.clock.set(1500);
        let lap1 = sw.lap().unwrap();
        assert_eq!((lap1.end_time, lap1.split_time, lap1.lap_index), (1500, 1500, 1));

        h.clock.set(4200);
        let lap2 = sw.lap().unwrap();
        assert_eq!((lap2.end_time, lap2.split_time, lap2.lap_index), (4200, 2700, 2));

        h.clock.set(5000);
        sw.stop();
        assert!(!h.refresh.active());
        let snapshot = sw.snapshot();
        assert_eq!(snapshot.elapsed_ms, 5000);
        assert_eq!(snapshot.status, StopwatchStatus::Paused);
        assert_eq!(snapshot.laps, &[lap2, lap1]);
    }

    #[test]
    fn test_every_change_is_saved() {
        let h = Harness::new(10_000);
        let mut sw = h.open();

        sw.start();
        let saved = h.saved().unwrap();
        assert_eq!(saved.status, StopwatchStatus::Running);
        assert_eq!(saved.start_time, 10_000);

        h.clock.advance(750);
        sw.lap();
        assert_eq!(h.saved().unwrap().laps.len(), 1);

        h.clock.advance(250);
        sw.stop();
        let saved = h.saved().unwrap();
        assert_eq!(saved.status, StopwatchStatus::Paused);
        assert_eq!(saved.start_time, 0);
        assert_eq!(saved.accumulated_time, 1000);

        sw.reset();
        assert!(h.storage.payload().is_none());
        assert!(!h.refresh.active());
    }

    #[test]
    fn test_noops_do_not_touch_storage() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.stop();
        assert!(sw.lap().is_none());
        assert!(h.storage.payload().is_none());

        sw.start();
        h.clock.advance(100);
        sw.stop();
        let before = h.storage.payload();
        h.clock.advance(100);
        assert!(sw.lap().is_none());
        sw.stop();
        assert_eq!(h.storage.payload(), before);
    }

    #[test]
    fn test_reset_from_idle_is_idempotent() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.reset();
        sw.reset();
        let snapshot = sw.snapshot();
        assert_eq!(snapshot.status, StopwatchStatus::Idle);
        assert_eq!(snapshot.elapsed_ms, 0);
        assert!(snapshot.laps.is_empty());
    }

    #[test]
    fn test_resume_accumulates() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.toggle();
        h.clock.advance(2000);
        sw.toggle();
        assert_eq!(h.saved().unwrap().accumulated_time, 2000);

        h.clock.advance(60_000);
        sw.toggle();
        h.clock.advance(1000);
        assert_eq!(sw.snapshot().elapsed_ms, 3000);
        sw.toggle();
        assert_eq!(h.saved().unwrap().accumulated_time, 3000);
    }

    #[test]
    fn test_running_session_continues_across_reload() {
        let t = 1_700_000_000_000;
        let payload = format!(
            r#"{{"status":"RUNNING","startTime":{},"accumulatedTime":0,"laps":[]}}"#,
            t
        );
        let h = Harness::with_storage(t + 90_000, MemoryStorage::with_payload(&payload));
        let sw = h.open();
        assert_eq!(sw.status(), StopwatchStatus::Running);
        assert!(h.refresh.active());
        assert_eq!(sw.snapshot().elapsed_ms, 90_000);

        h.clock.advance(500);
        assert_eq!(sw.snapshot().elapsed_ms, 90_500);
    }

    #[test]
    fn test_reload_after_start_and_lap() {
        let h = Harness::new(5_000);
        {
            let mut sw = h.open();
            sw.start();
            h.clock.advance(1_200);
            sw.lap();
        }
        assert!(!h.refresh.active());

        h.clock.advance(800);
        let sw = h.open();
        let snapshot = sw.snapshot();
        assert_eq!(snapshot.status, StopwatchStatus::Running);
        assert_eq!(snapshot.elapsed_ms, 2_000);
        assert_eq!(snapshot.laps.len(), 1);
        assert_eq!(snapshot.current_lap_ms(), 800);
    }

    #[test]
    fn test_paused_session_restores_banked_time() {
        let h = Harness::with_storage(
            999_999,
            MemoryStorage::with_payload(r#"{"status":"PAUSED","startTime":0,"accumulatedTime":4321,"laps":[]}"#),
        );
        let sw = h.open();
        assert_eq!(sw.status(), StopwatchStatus::Paused);
        assert_eq!(sw.snapshot().elapsed_ms, 4321);
        assert!(!h.refresh.active());
    }

    #[test]
    fn test_corrupt_session_starts_fresh() {
        let h = Harness::with_storage(0, MemoryStorage::with_payload("{\"status\":"));
        let sw = h.open();
        let snapshot = sw.snapshot();
        assert_eq!(snapshot.status, StopwatchStatus::Idle);
        assert_eq!(snapshot.elapsed_ms, 0);
        assert!(snapshot.laps.is_empty());
        assert!(h.storage.payload().is_none());
    }

    #[test]
    fn test_inconsistent_session_starts_fresh() {
        let payload = r#"{"status":"PAUSED","startTime":0,"accumulatedTime":3000,
            "laps":[{"id":1,"lapIndex":1,"endTime":1000,"splitTime":999}]}"#;
        let h = Harness::with_storage(0, MemoryStorage::with_payload(payload));
        let sw = h.open();
        assert_eq!(sw.status(), StopwatchStatus::Idle);
        assert!(h.storage.payload().is_none());
    }

    #[test]
    fn test_out_of_range_session_starts_fresh() {
        let payloads = [
            r#"{"status":"RUNNING","startTime":0,"accumulatedTime":18446744073709551615}"#,
            r#"{"status":"RUNNING","startTime":18446744073709551615,"accumulatedTime":0}"#,
            r#"{"status":"RUNNING","startTime":0,"accumulatedTime":0,
                "laps":[{"id":18446744073709551615,"lapIndex":1,"endTime":5,"splitTime":5}]}"#,
        ];
        for payload in payloads {
            let h = Harness::with_storage(1_000, MemoryStorage::with_payload(payload));
            let sw = h.open();
            let snapshot = sw.snapshot();
            assert_eq!(snapshot.status, StopwatchStatus::Idle, "{}", payload);
            assert_eq!(snapshot.elapsed_ms, 0);
            assert!(h.storage.payload().is_none());
        }
    }

    #[test]
    fn test_write_failure_keeps_running_in_memory() {
        let h = Harness::new(0);
        h.storage.fail_writes(true);
        let mut sw = h.open();
        sw.start();
        h.clock.advance(300);
        assert!(sw.lap().is_some());
        h.clock.advance(200);
        sw.stop();
        assert_eq!(sw.snapshot().elapsed_ms, 500);
        assert_eq!(sw.snapshot().laps.len(), 1);
        assert!(h.storage.payload().is_none());
    }

    #[test]
    fn test_without_storage() {
        let clock = ManualClock::at(0);
        let refresh = FakeRefresh::default();
        let mut sw = Stopwatch::open(Box::new(clock.clone()), None, Box::new(refresh.clone()));
        sw.start();
        clock.advance(42);
        sw.stop();
        assert_eq!(sw.snapshot().elapsed_ms, 42);
    }

    #[test]
    fn test_lap_or_reset() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.start();
        h.clock.advance(100);
        sw.lap_or_reset();
        assert_eq!(sw.snapshot().laps.len(), 1);

        sw.stop();
        sw.lap_or_reset();
        assert_eq!(sw.status(), StopwatchStatus::Idle);
        assert!(sw.snapshot().laps.is_empty());
    }

    #[test]
    fn test_hidden_display_pauses_redraws_only() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.start();
        sw.set_visible(false);
        assert!(!h.refresh.active());
        h.clock.advance(700);
        assert_eq!(sw.snapshot().elapsed_ms, 700);

        sw.set_visible(true);
        assert!(h.refresh.active());
        sw.stop();
        sw.set_visible(false);
        sw.set_visible(true);
        assert!(!h.refresh.active());
    }

    #[test]
    fn test_drop_cancels_refresh() {
        let h = Harness::new(0);
        let mut sw = h.open();
        sw.start();
        assert!(h.refresh.active());
        drop(sw);
        assert!(!h.refresh.active());
        assert_eq!(h.refresh.resumes(), 1);
    }
}
