use core::marker::PhantomData;
use core::sync::atomic::Ordering;

use spin::relax::RelaxStrategy;

use crate::arch::LockWord;

/// Failed attempts inside one call between two "still contending" reports.
pub const LIVELOCK_REPORT_INTERVAL: u64 = 1 << 16;

/// Atomically adds `delta` and returns the word as it was before the add.
#[inline(always)]
pub fn fetch_add<W: LockWord>(word: &W::Atomic, delta: W, order: Ordering) -> W {
    W::fetch_add(word, delta, order)
}

/// Atomically subtracts `delta` and returns the word as it is after the
/// subtraction.
///
/// Implemented as an add of the two's complement, so the platform only
/// needs an atomic add.
#[inline(always)]
pub fn fetch_sub<W: LockWord>(word: &W::Atomic, delta: W, order: Ordering) -> W {
    let neg = delta.wrapping_neg();
    W::fetch_add(word, neg, order).wrapping_add(neg)
}

/// Bookkeeping for one blocking lock call.
///
/// Every failed attempt goes through [`Contention::relax`], which backs off
/// with `R` and periodically reports calls that keep failing. Nothing is
/// emitted for calls that succeed on the first attempt.
pub(crate) struct Contention<R> {
    op: &'static str,
    failures: u64,
    _relax: PhantomData<R>,
}

impl<R: RelaxStrategy> Contention<R> {
    #[inline(always)]
    pub(crate) fn new(op: &'static str) -> Self {
        Contention {
            op,
            failures: 0,
            _relax: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn relax(&mut self) {
        self.failures += 1;
        if self.failures % LIVELOCK_REPORT_INTERVAL == 0 {
            tracing::debug!(
                op = self.op,
                failures = self.failures,
                "lock still contended; check for an upgrade deadlock or livelock"
            );
        }
        R::relax();
    }

    #[cfg(test)]
    pub(crate) fn failures(&self) -> u64 {
        self.failures
    }
}

impl<R> Drop for Contention<R> {
    #[inline]
    fn drop(&mut self) {
        if self.failures > 0 {
            tracing::trace!(op = self.op, failures = self.failures, "acquired after contention");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, AtomicU64};
    use spin::relax::Spin;

    #[test]
    fn fetch_add_returns_previous() {
        let word = AtomicU64::new(5);
        assert_eq!(fetch_add::<u64>(&word, 3, Ordering::SeqCst), 5);
        assert_eq!(word.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn fetch_sub_returns_result() {
        let word = AtomicU64::new(u64::WL_1 | u64::RL_1);
        assert_eq!(fetch_sub::<u64>(&word, u64::RL_1, Ordering::SeqCst), u64::WL_1);
        assert_eq!(word.load(Ordering::SeqCst), u64::WL_1);
    }

    #[test]
    fn fetch_sub_borrows_across_fields() {
        // Converting a reader into a writer is an add of WL_1 - RL_1.
        let word = AtomicU32::new(u32::RL_1);
        let delta = u32::WL_1.wrapping_sub(u32::RL_1);
        assert_eq!(fetch_add::<u32>(&word, delta, Ordering::SeqCst), u32::RL_1);
        assert_eq!(word.load(Ordering::SeqCst), u32::WL_1);

        assert_eq!(fetch_sub::<u32>(&word, delta, Ordering::SeqCst), u32::RL_1);
    }

    #[test]
    fn contention_counts_failures() {
        let mut c = Contention::<Spin>::new("test");
        assert_eq!(c.failures(), 0);
        c.relax();
        c.relax();
        assert_eq!(c.failures(), 2);
    }
}
