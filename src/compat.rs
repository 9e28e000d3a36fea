//! `lock_api` integration.
//!
//! Shared maps to Read, exclusive to Write and upgradable to Seek, so
//! `lock_api::RwLock<RawPLock, T>` gets a progressive lock with the usual
//! guard API.

use lock_api::{
    GuardSend, RawRwLock, RawRwLockDowngrade, RawRwLockUpgrade, RawRwLockUpgradeDowngrade,
};
use spin::relax::RelaxStrategy;

use crate::arch::LockWord;
use crate::raw::RawPLock;

/// A reader-writer lock with Seek as its upgradable mode.
pub type RwLock<T> = lock_api::RwLock<RawPLock, T>;
pub type RwLockReadGuard<'a, T> = lock_api::RwLockReadGuard<'a, RawPLock, T>;
pub type RwLockUpgradableReadGuard<'a, T> = lock_api::RwLockUpgradableReadGuard<'a, RawPLock, T>;
pub type RwLockWriteGuard<'a, T> = lock_api::RwLockWriteGuard<'a, RawPLock, T>;

unsafe impl<W: LockWord, R: RelaxStrategy> RawRwLock for RawPLock<W, R> {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawPLock::new();

    type GuardMarker = GuardSend;

    #[inline]
    fn lock_shared(&self) {
        self.lock_read()
    }

    #[inline]
    fn try_lock_shared(&self) -> bool {
        self.try_lock_read()
    }

    #[inline]
    unsafe fn unlock_shared(&self) {
        unsafe { self.unlock_read() }
    }

    #[inline]
    fn lock_exclusive(&self) {
        self.lock_write()
    }

    #[inline]
    fn try_lock_exclusive(&self) -> bool {
        self.try_lock_write()
    }

    #[inline]
    unsafe fn unlock_exclusive(&self) {
        unsafe { self.unlock_write() }
    }

    #[inline]
    fn is_locked(&self) -> bool {
        RawPLock::is_locked(self)
    }

    /// Only a full writer counts, pending or not. Atomic writers share the
    /// lock with each other and are not exclusive.
    #[inline]
    fn is_locked_exclusive(&self) -> bool {
        let state = self.state();
        state.seekers() > 0 && state.writers() > 0
    }
}

unsafe impl<W: LockWord, R: RelaxStrategy> RawRwLockUpgrade for RawPLock<W, R> {
    #[inline]
    fn lock_upgradable(&self) {
        self.lock_seek()
    }

    #[inline]
    fn try_lock_upgradable(&self) -> bool {
        self.try_lock_seek()
    }

    #[inline]
    unsafe fn unlock_upgradable(&self) {
        unsafe { self.unlock_seek() }
    }

    #[inline]
    unsafe fn upgrade(&self) {
        unsafe { self.seek_to_write() }
    }

    #[inline]
    unsafe fn try_upgrade(&self) -> bool {
        unsafe { self.try_seek_to_write() }
    }
}

unsafe impl<W: LockWord, R: RelaxStrategy> RawRwLockDowngrade for RawPLock<W, R> {
    #[inline]
    unsafe fn downgrade(&self) {
        unsafe { self.write_to_read() }
    }
}

unsafe impl<W: LockWord, R: RelaxStrategy> RawRwLockUpgradeDowngrade for RawPLock<W, R> {
    #[inline]
    unsafe fn downgrade_upgradable(&self) {
        unsafe { self.seek_to_read() }
    }

    #[inline]
    unsafe fn downgrade_to_upgradable(&self) {
        unsafe { self.write_to_seek() }
    }
}
