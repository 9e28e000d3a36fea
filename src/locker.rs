//! Single-mode views of a [`RawPLock`].
//!
//! Each view borrows the lock and exposes one mode through the [`Locker`]
//! trait, so code written against a plain lock/unlock capability can use a
//! progressive lock in whichever mode fits. Views carry nothing but the
//! reference and are `Copy`.

use spin::relax::{RelaxStrategy, Yield};

use crate::arch::{DefaultWord, LockWord};
use crate::raw::RawPLock;

/// A lock/unlock capability.
pub trait Locker {
    /// Blocks until the lock is held.
    fn lock(&self);

    /// Takes the lock if that is possible without waiting.
    fn try_lock(&self) -> bool;

    /// Releases the lock.
    ///
    /// # Safety
    ///
    /// The caller must hold the lock through this capability.
    unsafe fn unlock(&self);
}

macro_rules! define_view {
    ($(#[$doc:meta])* $view:ident, $ctor:ident, $lock:ident, $try_lock:ident, $unlock:ident) => {
        $(#[$doc])*
        pub struct $view<'a, W: LockWord = DefaultWord, R = Yield> {
            lock: &'a RawPLock<W, R>,
        }

        impl<'a, W: LockWord, R> Clone for $view<'a, W, R> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<'a, W: LockWord, R> Copy for $view<'a, W, R> {}

        impl<'a, W: LockWord, R: RelaxStrategy> $view<'a, W, R> {
            /// The lock this view operates on.
            pub fn raw(&self) -> &'a RawPLock<W, R> {
                self.lock
            }
        }

        impl<'a, W: LockWord, R: RelaxStrategy> Locker for $view<'a, W, R> {
            #[inline]
            fn lock(&self) {
                self.lock.$lock()
            }

            #[inline]
            fn try_lock(&self) -> bool {
                self.lock.$try_lock()
            }

            #[inline]
            unsafe fn unlock(&self) {
                unsafe { self.lock.$unlock() }
            }
        }

        impl<W: LockWord, R: RelaxStrategy> RawPLock<W, R> {
            #[doc = concat!("A [`", stringify!($view), "`] view of this lock.")]
            pub fn $ctor(&self) -> $view<'_, W, R> {
                $view { lock: self }
            }
        }
    };
}

define_view!(
    /// Read mode.
    ReadLocker, read_locker, lock_read, try_lock_read, unlock_read
);
define_view!(
    /// Seek mode.
    SeekLocker, seek_locker, lock_seek, try_lock_seek, unlock_seek
);
define_view!(
    /// Write mode.
    WriteLocker, write_locker, lock_write, try_lock_write, unlock_write
);
define_view!(
    /// Atomic-Write mode.
    AtomicLocker, atomic_locker, lock_atomic, try_lock_atomic, unlock_atomic
);

// Transitions follow the mode held through the view. All of them require
// that the caller currently holds that mode.

impl<'a, W: LockWord, R: RelaxStrategy> ReadLocker<'a, W, R> {
    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn to_seek(self) -> SeekLocker<'a, W, R> {
        unsafe { self.lock.read_to_seek() };
        SeekLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn try_to_seek(&self) -> Option<SeekLocker<'a, W, R>> {
        let ok = unsafe { self.lock.try_read_to_seek() };
        ok.then(|| SeekLocker { lock: self.lock })
    }

    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn to_write(self) -> WriteLocker<'a, W, R> {
        unsafe { self.lock.read_to_write() };
        WriteLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn try_to_write(&self) -> Option<WriteLocker<'a, W, R>> {
        let ok = unsafe { self.lock.try_read_to_write() };
        ok.then(|| WriteLocker { lock: self.lock })
    }

    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn to_atomic(self) -> AtomicLocker<'a, W, R> {
        unsafe { self.lock.read_to_atomic() };
        AtomicLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Read lock through this view.
    pub unsafe fn try_to_atomic(&self) -> Option<AtomicLocker<'a, W, R>> {
        let ok = unsafe { self.lock.try_read_to_atomic() };
        ok.then(|| AtomicLocker { lock: self.lock })
    }
}

impl<'a, W: LockWord, R: RelaxStrategy> SeekLocker<'a, W, R> {
    /// # Safety
    ///
    /// The caller must hold a Seek lock through this view.
    pub unsafe fn to_read(self) -> ReadLocker<'a, W, R> {
        unsafe { self.lock.seek_to_read() };
        ReadLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Seek lock through this view.
    pub unsafe fn to_write(self) -> WriteLocker<'a, W, R> {
        unsafe { self.lock.seek_to_write() };
        WriteLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Seek lock through this view.
    pub unsafe fn try_to_write(&self) -> Option<WriteLocker<'a, W, R>> {
        let ok = unsafe { self.lock.try_seek_to_write() };
        ok.then(|| WriteLocker { lock: self.lock })
    }
}

impl<'a, W: LockWord, R: RelaxStrategy> WriteLocker<'a, W, R> {
    /// # Safety
    ///
    /// The caller must hold a Write lock through this view.
    pub unsafe fn to_read(self) -> ReadLocker<'a, W, R> {
        unsafe { self.lock.write_to_read() };
        ReadLocker { lock: self.lock }
    }

    /// # Safety
    ///
    /// The caller must hold a Write lock through this view.
    pub unsafe fn to_seek(self) -> SeekLocker<'a, W, R> {
        unsafe { self.lock.write_to_seek() };
        SeekLocker { lock: self.lock }
    }
}

/// The bare lock behaves as a write lock.
impl<W: LockWord, R: RelaxStrategy> Locker for RawPLock<W, R> {
    #[inline]
    fn lock(&self) {
        self.lock_write()
    }

    #[inline]
    fn try_lock(&self) -> bool {
        self.try_lock_write()
    }

    #[inline]
    unsafe fn unlock(&self) {
        unsafe { self.unlock_write() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spin::relax::Spin;

    type Lock = RawPLock<u64, Spin>;

    fn round_trip(locker: &dyn Locker) {
        locker.lock();
        unsafe { locker.unlock() };
        assert!(locker.try_lock());
        unsafe { locker.unlock() };
    }

    #[test]
    fn every_view_round_trips() {
        let lock = Lock::new();
        round_trip(&lock.read_locker());
        round_trip(&lock.seek_locker());
        round_trip(&lock.write_locker());
        round_trip(&lock.atomic_locker());
        round_trip(&lock);
        assert_eq!(lock.load(), 0);
    }

    #[test]
    fn views_share_the_lock() {
        let lock = Lock::new();
        let reader = lock.read_locker();
        let writer = lock.write_locker();

        reader.lock();
        assert!(!writer.try_lock());
        unsafe { reader.unlock() };
        assert!(writer.try_lock());
        assert!(!reader.try_lock());
        unsafe { writer.unlock() };
        assert!(core::ptr::eq(reader.raw(), writer.raw()));
    }

    #[test]
    fn view_transitions() {
        let lock = Lock::new();
        let read = lock.read_locker();
        read.lock();
        unsafe {
            let seek = read.to_seek();
            assert_eq!(lock.load(), u64::SL_1 | u64::RL_1);
            let write = seek.to_write();
            assert_eq!(lock.load(), u64::WL_1 | u64::SL_1 | u64::RL_1);
            let seek = write.to_seek();
            let read = seek.to_read();
            let write = read.to_write();
            let read = write.to_read();
            let atomic = read.to_atomic();
            assert_eq!(lock.load(), u64::WL_1);
            atomic.unlock();
        }
        assert_eq!(lock.load(), 0);
    }

    #[test]
    fn failed_view_transitions_keep_the_mode() {
        let lock = Lock::new();
        let read = lock.read_locker();
        read.lock();
        let seek = lock.seek_locker();
        seek.lock();
        unsafe {
            assert!(read.try_to_seek().is_none());
            assert!(read.try_to_write().is_none());
            assert!(read.try_to_atomic().is_none());
            assert!(seek.try_to_write().is_none());
            read.unlock();
            let write = seek.try_to_write().expect("sole reader");
            write.unlock();
        }
        assert_eq!(lock.load(), 0);
    }
}
