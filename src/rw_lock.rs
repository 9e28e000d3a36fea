use core::cell::UnsafeCell;
use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut};

use spin::relax::{RelaxStrategy, Yield};

use crate::arch::{DefaultWord, LockWord};
use crate::raw::RawPLock;
use crate::state::LockState;

/// Progressive lock protecting a value of type `T`.
///
/// # Description
///
/// Besides the usual shared (`read`) and exclusive (`write`) access, the
/// lock offers two more modes:
///
/// * `seek`: an exclusive reader. Plain readers may join it, but no other
///   seeker or writer. A seeker upgrades to a writer without giving up the
///   lock, so it never races another writer for the upgrade.
/// * `atomic`: any number of writers at once, with no readers. Atomic
///   writers only get `&T` and must mutate through atomics inside `T`.
///
/// Guards release their mode when dropped and can move between modes in
/// place (`upgrade`, `downgrade`). Waiting is a busy loop that backs off
/// with `R` between attempts.
pub struct PLock<T: ?Sized, W: LockWord = DefaultWord, R = Yield> {
    raw: RawPLock<W, R>,
    data: UnsafeCell<T>,
}

unsafe impl<T: ?Sized + Send, W: LockWord, R> Send for PLock<T, W, R> {}

unsafe impl<T: ?Sized + Send + Sync, W: LockWord, R> Sync for PLock<T, W, R> {}

/// Shared access.
#[must_use = "if unused the lock is released immediately"]
pub struct ReadGuard<'a, T: ?Sized + 'a, W: LockWord = DefaultWord, R: RelaxStrategy = Yield> {
    lock: &'a PLock<T, W, R>,
}

/// Exclusive read access that other readers may share.
#[must_use = "if unused the lock is released immediately"]
pub struct SeekGuard<'a, T: ?Sized + 'a, W: LockWord = DefaultWord, R: RelaxStrategy = Yield> {
    lock: &'a PLock<T, W, R>,
}

/// Exclusive access.
#[must_use = "if unused the lock is released immediately"]
pub struct WriteGuard<'a, T: ?Sized + 'a, W: LockWord = DefaultWord, R: RelaxStrategy = Yield> {
    lock: &'a PLock<T, W, R>,
}

/// Shared write access, for data mutated through atomics.
#[must_use = "if unused the lock is released immediately"]
pub struct AtomicGuard<'a, T: ?Sized + 'a, W: LockWord = DefaultWord, R: RelaxStrategy = Yield> {
    lock: &'a PLock<T, W, R>,
}

impl<T, W: LockWord, R: RelaxStrategy> PLock<T, W, R> {
    pub const fn new(user_data: T) -> Self {
        PLock {
            raw: RawPLock::new(),
            data: UnsafeCell::new(user_data),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized, W: LockWord, R: RelaxStrategy> PLock<T, W, R> {
    /// Obtain the lock in read mode.
    pub fn read(&self) -> ReadGuard<'_, T, W, R> {
        self.raw.lock_read();
        ReadGuard { lock: self }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_, T, W, R>> {
        self.raw.try_lock_read().then(|| ReadGuard { lock: self })
    }

    /// Obtain the lock in seek mode.
    pub fn seek(&self) -> SeekGuard<'_, T, W, R> {
        self.raw.lock_seek();
        SeekGuard { lock: self }
    }

    pub fn try_seek(&self) -> Option<SeekGuard<'_, T, W, R>> {
        self.raw.try_lock_seek().then(|| SeekGuard { lock: self })
    }

    /// Obtain the lock in write mode, waiting for current readers to leave.
    pub fn write(&self) -> WriteGuard<'_, T, W, R> {
        self.raw.lock_write();
        WriteGuard { lock: self }
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_, T, W, R>> {
        self.raw.try_lock_write().then(|| WriteGuard { lock: self })
    }

    /// Obtain the lock in atomic-write mode, waiting for current readers to
    /// leave.
    pub fn atomic(&self) -> AtomicGuard<'_, T, W, R> {
        self.raw.lock_atomic();
        AtomicGuard { lock: self }
    }

    pub fn try_atomic(&self) -> Option<AtomicGuard<'_, T, W, R>> {
        self.raw.try_lock_atomic().then(|| AtomicGuard { lock: self })
    }

    /// No guard can exist while `self` is mutably borrowed, so no locking
    /// is needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn state(&self) -> LockState<W> {
        self.raw.state()
    }
}

impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> ReadGuard<'a, T, W, R> {
    /// Upgrades to write mode in place, waiting for the other readers.
    pub fn upgrade(self) -> WriteGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.read_to_write() };
        WriteGuard { lock }
    }

    pub fn try_upgrade(self) -> Result<WriteGuard<'a, T, W, R>, Self> {
        if unsafe { self.lock.raw.try_read_to_write() } {
            Ok(WriteGuard { lock: ManuallyDrop::new(self).lock })
        } else {
            Err(self)
        }
    }

    pub fn upgrade_to_seek(self) -> SeekGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.read_to_seek() };
        SeekGuard { lock }
    }

    pub fn try_upgrade_to_seek(self) -> Result<SeekGuard<'a, T, W, R>, Self> {
        if unsafe { self.lock.raw.try_read_to_seek() } {
            Ok(SeekGuard { lock: ManuallyDrop::new(self).lock })
        } else {
            Err(self)
        }
    }

    pub fn upgrade_to_atomic(self) -> AtomicGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.read_to_atomic() };
        AtomicGuard { lock }
    }

    pub fn try_upgrade_to_atomic(self) -> Result<AtomicGuard<'a, T, W, R>, Self> {
        if unsafe { self.lock.raw.try_read_to_atomic() } {
            Ok(AtomicGuard { lock: ManuallyDrop::new(self).lock })
        } else {
            Err(self)
        }
    }
}

impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> SeekGuard<'a, T, W, R> {
    pub fn downgrade(self) -> ReadGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.seek_to_read() };
        ReadGuard { lock }
    }

    /// Upgrades to write mode, waiting for the remaining readers.
    pub fn upgrade(self) -> WriteGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.seek_to_write() };
        WriteGuard { lock }
    }

    pub fn try_upgrade(self) -> Result<WriteGuard<'a, T, W, R>, Self> {
        if unsafe { self.lock.raw.try_seek_to_write() } {
            Ok(WriteGuard { lock: ManuallyDrop::new(self).lock })
        } else {
            Err(self)
        }
    }
}

impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> WriteGuard<'a, T, W, R> {
    pub fn downgrade(self) -> ReadGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.write_to_read() };
        ReadGuard { lock }
    }

    pub fn downgrade_to_seek(self) -> SeekGuard<'a, T, W, R> {
        let lock = ManuallyDrop::new(self).lock;
        unsafe { lock.raw.write_to_seek() };
        SeekGuard { lock }
    }
}

macro_rules! define_deref_for {
    ($guard:ident) => {
        impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> Deref for $guard<'a, T, W, R> {
            type Target = T;

            fn deref(&self) -> &T {
                unsafe { &*self.lock.data.get() }
            }
        }

        impl<'a, T: ?Sized + fmt::Debug, W: LockWord, R: RelaxStrategy> fmt::Debug
            for $guard<'a, T, W, R>
        {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(&**self, f)
            }
        }
    };
}

macro_rules! define_drop_for {
    ($guard:ident, $unlock:ident) => {
        impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> Drop for $guard<'a, T, W, R> {
            fn drop(&mut self) {
                unsafe { self.lock.raw.$unlock() }
            }
        }
    };
}

define_deref_for!(ReadGuard);
define_deref_for!(SeekGuard);
define_deref_for!(WriteGuard);
define_deref_for!(AtomicGuard);

impl<'a, T: ?Sized, W: LockWord, R: RelaxStrategy> DerefMut for WriteGuard<'a, T, W, R> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

define_drop_for!(ReadGuard, unlock_read);
define_drop_for!(SeekGuard, unlock_seek);
define_drop_for!(WriteGuard, unlock_write);
define_drop_for!(AtomicGuard, unlock_atomic);

impl<T: Default, W: LockWord, R: RelaxStrategy> Default for PLock<T, W, R> {
    fn default() -> Self {
        PLock::new(T::default())
    }
}

impl<T, W: LockWord, R: RelaxStrategy> From<T> for PLock<T, W, R> {
    fn from(user_data: T) -> Self {
        PLock::new(user_data)
    }
}

impl<T: ?Sized + fmt::Debug, W: LockWord, R: RelaxStrategy> fmt::Debug for PLock<T, W, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("PLock");
        match self.try_read() {
            Some(guard) => d.field("data", &&*guard),
            None => d.field("data", &format_args!("<locked>")),
        };
        d.field("state", &self.state()).finish()
    }
}
