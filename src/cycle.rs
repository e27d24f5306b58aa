// Control cycle handshake between the PWM period interrupt and the control task

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// "Recompute pending" flag
///
/// Set once per PWM period from interrupt context, taken by the control task
/// before each orchestrator pass. A period that arrives while the previous
/// one is still pending is a missed deadline and is counted as an overrun,
/// and so is a pass that is still running when the next period arrives
/// (see [`CycleFlag::finish_pass`]).
pub struct CycleFlag {
    pending: AtomicBool,
    overruns: AtomicU32,
}

impl CycleFlag {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
        }
    }

    /// Mark a new period; safe to call from an interrupt handler
    pub fn set_from_isr(&self) {
        if self.pending.swap(true, Ordering::AcqRel) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Consume a pending period; `true` means one control pass is due
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Close the pass started by the last successful `take()`
    ///
    /// Returns `false` and counts an overrun when the next period has already
    /// been flagged, i.e. the pass ran past its own period.
    pub fn finish_pass(&self) -> bool {
        if self.pending.load(Ordering::Acquire) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Missed deadlines since start-up or the last `clear_overruns()`
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn clear_overruns(&self) {
        self.overruns.store(0, Ordering::Relaxed);
    }
}

impl Default for CycleFlag {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_consumes_period() {
        let flag = CycleFlag::new();
        assert!(!flag.take());
        flag.set_from_isr();
        assert!(flag.is_pending());
        assert!(flag.take());
        assert!(!flag.take());
        assert_eq!(flag.overruns(), 0);
    }

    #[test]
    fn test_missed_period_counts_overrun() {
        let flag = CycleFlag::new();
        flag.set_from_isr();
        flag.set_from_isr();
        flag.set_from_isr();
        assert_eq!(flag.overruns(), 2);
        // Only one pass is due however many periods were missed
        assert!(flag.take());
        assert!(!flag.take());

        flag.clear_overruns();
        assert_eq!(flag.overruns(), 0);
    }

    #[test]
    fn test_pass_within_period() {
        let flag = CycleFlag::new();
        flag.set_from_isr();
        assert!(flag.take());
        assert!(flag.finish_pass());
        assert_eq!(flag.overruns(), 0);
    }

    #[test]
    fn test_pass_running_into_next_period_counts_overrun() {
        let flag = CycleFlag::new();
        flag.set_from_isr();
        assert!(flag.take());
        // Next period fires while the pass is still computing
        flag.set_from_isr();
        assert_eq!(flag.overruns(), 0);
        assert!(!flag.finish_pass());
        assert_eq!(flag.overruns(), 1);
        // The late period is still served
        assert!(flag.take());
    }

    #[test]
    fn test_shared_static() {
        static FLAG: CycleFlag = CycleFlag::new();
        FLAG.set_from_isr();
        assert!(FLAG.take());
    }
}
