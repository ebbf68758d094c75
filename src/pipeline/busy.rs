//! Busy flag guarding the capture-and-describe pipeline
//!
//! At most one run holds the flag. Each run gets a fresh id so that a run
//! abandoned by Stop can never clear the flag of a later run or act on a
//! result that arrives after the stop.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Pipeline progress while a run holds the flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    Idle,
    Capturing,
    AwaitingResult,
}

impl Default for PipelinePhase {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Debug, Default)]
struct Inner {
    active: Option<u64>,
    next_id: u64,
    phase: PipelinePhase,
}

#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    inner: Arc<Mutex<Inner>>,
}

impl BusyFlag {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim the flag; `None` if a run is already in flight
    pub fn try_begin(&self) -> Option<BusyGuard> {
        let mut inner = self.lock();
        if inner.active.is_some() {
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.active = Some(id);
        inner.phase = PipelinePhase::Idle;

        Some(BusyGuard {
            flag: self.clone(),
            id,
            released: false,
        })
    }

    pub fn is_busy(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.lock().phase
    }

    /// Clear the flag unconditionally, running `f` while it is held
    ///
    /// Returns whether a run was in flight.
    pub fn cancel_with(&self, f: impl FnOnce()) -> bool {
        let mut inner = self.lock();
        let was_active = inner.active.take().is_some();
        inner.phase = PipelinePhase::Idle;
        f();
        was_active
    }

    fn release_with(&self, id: u64, f: impl FnOnce()) -> bool {
        let mut inner = self.lock();
        if inner.active != Some(id) {
            return false;
        }
        f();
        inner.active = None;
        inner.phase = PipelinePhase::Idle;
        true
    }
}

/// Scoped ownership of the busy flag for one run
///
/// Dropping the guard without calling [`BusyGuard::finish`] still releases
/// the flag, so a panicking or cancelled run never leaves it set.
#[derive(Debug)]
pub struct BusyGuard {
    flag: BusyFlag,
    id: u64,
    released: bool,
}

impl BusyGuard {
    /// Whether this run still owns the flag (no Stop since it began)
    pub fn is_active(&self) -> bool {
        self.flag.lock().active == Some(self.id)
    }

    pub fn enter(&self, phase: PipelinePhase) {
        let mut inner = self.flag.lock();
        if inner.active == Some(self.id) {
            inner.phase = phase;
        }
    }

    /// Release the flag, running `f` first if this run still owns it
    ///
    /// Returns false (and skips `f`) when the run was stopped.
    pub fn finish(mut self, f: impl FnOnce()) -> bool {
        self.released = true;
        self.flag.release_with(self.id, f)
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if !self.released {
            self.flag.release_with(self.id, || {});
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_begin_is_rejected() {
        let flag = BusyFlag::default();
        let guard = flag.try_begin().unwrap();

        assert!(flag.is_busy());
        assert!(flag.try_begin().is_none());

        assert!(guard.finish(|| {}));
        assert!(!flag.is_busy());
        assert!(flag.try_begin().is_some());
    }

    #[test]
    fn test_drop_releases_flag() {
        let flag = BusyFlag::default();
        {
            let guard = flag.try_begin().unwrap();
            guard.enter(PipelinePhase::Capturing);
            assert_eq!(flag.phase(), PipelinePhase::Capturing);
        }
        assert!(!flag.is_busy());
        assert_eq!(flag.phase(), PipelinePhase::Idle);
    }

    #[test]
    fn test_stopped_run_cannot_finish() {
        let flag = BusyFlag::default();
        let guard = flag.try_begin().unwrap();

        assert!(flag.cancel_with(|| {}));
        assert!(!guard.is_active());

        let mut ran = false;
        assert!(!guard.finish(|| ran = true));
        assert!(!ran);
    }

    #[test]
    fn test_stale_run_does_not_clear_later_run() {
        let flag = BusyFlag::default();
        let stale = flag.try_begin().unwrap();
        flag.cancel_with(|| {});

        let current = flag.try_begin().unwrap();
        current.enter(PipelinePhase::AwaitingResult);

        assert!(!stale.finish(|| {}));
        assert!(flag.is_busy());
        assert_eq!(flag.phase(), PipelinePhase::AwaitingResult);

        drop(current);
        assert!(!flag.is_busy());
    }

    #[test]
    fn test_cancel_when_idle_reports_nothing_active() {
        let flag = BusyFlag::default();
        let mut ran = false;
        assert!(!flag.cancel_with(|| ran = true));
        assert!(ran);
    }
}
