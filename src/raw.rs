//! The progressive lock engine.
//!
//! All state lives in one [`LockWord`]. Every mode change is an atomic add
//! (or subtract) of a constant. Acquires add speculatively, look at the
//! value the word had *before* the add, and subtract the same constant again
//! if a conflicting holder was already there.
//!
//! Compatibility of held modes:
//!
//! |            | Read | Seek | Write | Atomic |
//! |------------|------|------|-------|--------|
//! | **Read**   | yes  | yes  | no    | no     |
//! | **Seek**   | yes  | no   | no    | no     |
//! | **Write**  | no   | no   | no    | no     |
//! | **Atomic** | no   | no   | no    | yes    |
//!
//! A Write or Atomic request is accepted while readers are still present;
//! it then keeps new readers out and waits for the existing ones to leave.
//!
//! # Misuse
//!
//! The engine does not know who holds what. Releasing a mode that is not
//! held, or transitioning from a mode that is not held, silently corrupts
//! the counters for every user of the lock. Those methods are therefore
//! `unsafe`. Re-acquiring a conflicting mode on a lock the caller already
//! holds never returns.
//!
//! Upgrading from Read (to Seek, Write or Atomic) while another thread is
//! waiting for readers to drain deadlocks both threads: each waits for the
//! other's contribution to disappear. Take Seek instead of Read when an
//! upgrade is likely, or use the `try_` forms and release on failure.

use core::fmt;
use core::marker::PhantomData;
use core::sync::atomic::Ordering;

use spin::relax::{RelaxStrategy, Yield};

use crate::arch::{DefaultWord, LockWord};
use crate::helpers::{fetch_add, fetch_sub, Contention};
use crate::state::LockState;

/// A progressive lock without data.
///
/// `W` selects the width of the lock word, `R` the backoff used between
/// failed attempts. Blocking methods spin until they succeed; there is no
/// parking, queueing or fairness, so keep critical sections short.
pub struct RawPLock<W: LockWord = DefaultWord, R = Yield> {
    word: W::Atomic,
    _relax: PhantomData<fn() -> R>,
}

#[inline(always)]
fn has<W: LockWord>(value: W, mask: W) -> bool {
    value & mask != W::ZERO
}

#[inline(always)]
fn seek_set<W: LockWord>() -> W {
    W::SL_1 | W::RL_1
}

#[inline(always)]
fn write_set<W: LockWord>() -> W {
    W::WL_1 | W::SL_1 | W::RL_1
}

#[inline(always)]
fn exclusive_mask<W: LockWord>() -> W {
    W::WL_ANY | W::SL_ANY
}

/// Net change when a reader turns itself into an atomic writer.
#[inline(always)]
fn read_to_atomic_delta<W: LockWord>() -> W {
    W::WL_1.wrapping_sub(W::RL_1)
}

impl<W: LockWord, R: RelaxStrategy> RawPLock<W, R> {
    /// Creates an unlocked lock.
    pub const fn new() -> Self {
        RawPLock {
            word: W::UNLOCKED,
            _relax: PhantomData,
        }
    }

    /// Current value of the lock word.
    #[inline]
    pub fn load(&self) -> W {
        W::load(&self.word, Ordering::Acquire)
    }

    /// Decoded snapshot of the lock word. Only meaningful for diagnostics.
    pub fn state(&self) -> LockState<W> {
        LockState::new(self.load())
    }

    /// Whether any mode is held (or being acquired) right now.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.load() != W::ZERO
    }

    #[inline(always)]
    fn peek(&self) -> W {
        W::load(&self.word, Ordering::Relaxed)
    }

    /// Speculative add; returns the word before the add.
    #[inline(always)]
    fn add(&self, delta: W) -> W {
        fetch_add(&self.word, delta, Ordering::AcqRel)
    }

    #[inline(always)]
    fn rollback(&self, delta: W) {
        fetch_sub(&self.word, delta, Ordering::Relaxed);
    }

    #[inline(always)]
    fn release(&self, delta: W) {
        fetch_sub(&self.word, delta, Ordering::Release);
    }

    /// Adds `delta` unless `mask` is set, before or at the time of the add.
    #[inline(always)]
    fn try_add_unless(&self, delta: W, mask: W) -> bool {
        if has(self.peek(), mask) {
            return false;
        }
        if !has(self.add(delta), mask) {
            return true;
        }
        self.rollback(delta);
        false
    }

    /// Readers other than the caller's own share are gone.
    #[inline(always)]
    fn is_sole_reader(&self) -> bool {
        self.load() & W::RL_ANY == W::RL_1
    }

    #[inline(always)]
    fn has_no_readers(&self) -> bool {
        !has(self.load(), W::RL_ANY)
    }

    fn wait_sole_reader(&self, contention: &mut Contention<R>) {
        while !self.is_sole_reader() {
            contention.relax();
        }
    }

    fn wait_no_readers(&self, contention: &mut Contention<R>) {
        while !self.has_no_readers() {
            contention.relax();
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Attempts to take a Read lock without waiting.
    #[inline]
    pub fn try_lock_read(&self) -> bool {
        self.try_add_unless(W::RL_1, W::WL_ANY)
    }

    /// Takes a Read lock, yielding between attempts while a writer is
    /// present.
    pub fn lock_read(&self) {
        let mut contention = Contention::<R>::new("lock_read");
        while !self.try_lock_read() {
            contention.relax();
        }
    }

    /// Releases a Read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    #[inline]
    pub unsafe fn unlock_read(&self) {
        self.release(W::RL_1);
    }

    // ------------------------------------------------------------------
    // Seek
    // ------------------------------------------------------------------

    /// Attempts to take a Seek lock without waiting.
    #[inline]
    pub fn try_lock_seek(&self) -> bool {
        self.try_add_unless(seek_set(), exclusive_mask())
    }

    /// Takes a Seek lock: an exclusive reader that other readers may join.
    pub fn lock_seek(&self) {
        let mut contention = Contention::<R>::new("lock_seek");
        while !self.try_lock_seek() {
            contention.relax();
        }
    }

    /// Releases a Seek lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Seek lock on `self`.
    #[inline]
    pub unsafe fn unlock_seek(&self) {
        self.release(seek_set());
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Attempts to take a Write lock without waiting.
    ///
    /// Fails if another exclusive holder is present or if readers have not
    /// drained yet.
    pub fn try_lock_write(&self) -> bool {
        let set = write_set();
        if !self.try_add_unless(set, exclusive_mask()) {
            return false;
        }
        if self.is_sole_reader() {
            return true;
        }
        self.rollback(set);
        false
    }

    /// Takes a Write lock.
    ///
    /// Once the writer slot is claimed no new reader gets in; the call then
    /// waits for the readers already present to leave.
    pub fn lock_write(&self) {
        let mut contention = Contention::<R>::new("lock_write");
        while !self.try_add_unless(write_set(), exclusive_mask()) {
            contention.relax();
        }
        self.wait_sole_reader(&mut contention);
    }

    /// Releases a Write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Write lock on `self`.
    #[inline]
    pub unsafe fn unlock_write(&self) {
        self.release(write_set());
    }

    // ------------------------------------------------------------------
    // Atomic write
    // ------------------------------------------------------------------

    /// Attempts to take an Atomic-Write lock without waiting.
    ///
    /// Fails if a Seek or Write holder is present or if readers have not
    /// drained yet.
    pub fn try_lock_atomic(&self) -> bool {
        if !self.try_add_unless(W::WL_1, W::SL_ANY) {
            return false;
        }
        if self.has_no_readers() {
            return true;
        }
        self.rollback(W::WL_1);
        false
    }

    /// Takes an Atomic-Write lock.
    ///
    /// Any number of atomic writers may hold the lock together; they must
    /// only touch the protected data through atomic operations.
    pub fn lock_atomic(&self) {
        let mut contention = Contention::<R>::new("lock_atomic");
        while !self.try_add_unless(W::WL_1, W::SL_ANY) {
            contention.relax();
        }
        self.wait_no_readers(&mut contention);
    }

    /// Releases an Atomic-Write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold an Atomic-Write lock on `self`.
    #[inline]
    pub unsafe fn unlock_atomic(&self) {
        self.release(W::WL_1);
    }

    // ------------------------------------------------------------------
    // Transitions from Read
    // ------------------------------------------------------------------

    /// Attempts to upgrade a Read lock to a Seek lock without waiting.
    /// On failure the Read lock is still held.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    #[inline]
    pub unsafe fn try_read_to_seek(&self) -> bool {
        self.try_add_unless(W::SL_1, exclusive_mask())
    }

    /// Upgrades a Read lock to a Seek lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    pub unsafe fn read_to_seek(&self) {
        let mut contention = Contention::<R>::new("read_to_seek");
        while !self.try_add_unless(W::SL_1, exclusive_mask()) {
            contention.relax();
        }
    }

    /// Attempts to upgrade a Read lock to a Write lock without waiting.
    /// On failure the Read lock is still held.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    pub unsafe fn try_read_to_write(&self) -> bool {
        let delta = W::WL_1 | W::SL_1;
        if !self.try_add_unless(delta, exclusive_mask()) {
            return false;
        }
        if self.is_sole_reader() {
            return true;
        }
        self.rollback(delta);
        false
    }

    /// Upgrades a Read lock to a Write lock in place.
    ///
    /// Retries while another Seek or Write holder is present, then waits for
    /// the other readers to leave.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    pub unsafe fn read_to_write(&self) {
        let mut contention = Contention::<R>::new("read_to_write");
        while !self.try_add_unless(W::WL_1 | W::SL_1, exclusive_mask()) {
            contention.relax();
        }
        self.wait_sole_reader(&mut contention);
    }

    /// Attempts to turn a Read lock into an Atomic-Write lock without
    /// waiting. On failure the Read lock is still held.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    pub unsafe fn try_read_to_atomic(&self) -> bool {
        let delta = read_to_atomic_delta();
        if !self.try_add_unless(delta, W::SL_ANY) {
            return false;
        }
        if self.has_no_readers() {
            return true;
        }
        self.rollback(delta);
        false
    }

    /// Turns a Read lock into an Atomic-Write lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Read lock on `self`.
    pub unsafe fn read_to_atomic(&self) {
        let mut contention = Contention::<R>::new("read_to_atomic");
        while !self.try_add_unless(read_to_atomic_delta(), W::SL_ANY) {
            contention.relax();
        }
        self.wait_no_readers(&mut contention);
    }

    // ------------------------------------------------------------------
    // Transitions from Seek
    // ------------------------------------------------------------------

    /// Downgrades a Seek lock to a Read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Seek lock on `self`.
    #[inline]
    pub unsafe fn seek_to_read(&self) {
        self.release(W::SL_1);
    }

    /// Attempts to upgrade a Seek lock to a Write lock without waiting.
    /// On failure the Seek lock is still held.
    ///
    /// # Safety
    ///
    /// The caller must hold a Seek lock on `self`.
    pub unsafe fn try_seek_to_write(&self) -> bool {
        // Seek already excludes every other writer, so the add cannot collide.
        self.add(W::WL_1);
        if self.is_sole_reader() {
            return true;
        }
        self.rollback(W::WL_1);
        false
    }

    /// Upgrades a Seek lock to a Write lock, waiting until the caller is the
    /// only reader left.
    ///
    /// # Safety
    ///
    /// The caller must hold a Seek lock on `self`.
    pub unsafe fn seek_to_write(&self) {
        let mut contention = Contention::<R>::new("seek_to_write");
        self.add(W::WL_1);
        self.wait_sole_reader(&mut contention);
    }

    // ------------------------------------------------------------------
    // Transitions from Write
    // ------------------------------------------------------------------

    /// Downgrades a Write lock to a Read lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Write lock on `self`.
    #[inline]
    pub unsafe fn write_to_read(&self) {
        self.release(W::WL_1 | W::SL_1);
    }

    /// Downgrades a Write lock to a Seek lock.
    ///
    /// # Safety
    ///
    /// The caller must hold a Write lock on `self`.
    #[inline]
    pub unsafe fn write_to_seek(&self) {
        self.release(W::WL_1);
    }
}

impl<W: LockWord, R: RelaxStrategy> Default for RawPLock<W, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: LockWord, R: RelaxStrategy> fmt::Debug for RawPLock<W, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawPLock")
            .field("state", &format_args!("{}", self.state()))
            .finish()
    }
}
