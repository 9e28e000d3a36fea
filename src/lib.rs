//! Progressive locks.
//!
//! A progressive lock keeps its whole state in one atomic integer and offers
//! four modes instead of the usual two:
//!
//! * **Read**: shared, excluded only by writers.
//! * **Seek**: one exclusive reader that plain readers may join and that
//!   can upgrade to Write without racing other writers.
//! * **Write**: exclusive. Claimed first, then waits for readers to drain.
//! * **Atomic-Write**: several concurrent writers that only touch the data
//!   atomically; excludes readers, seekers and full writers.
//!
//! Modes change in place (Read→Seek, Read→Write, Read→Atomic, Seek→Read,
//! Seek→Write, Write→Read, Write→Seek) without releasing the lock.
//!
//! Waiting is a busy loop: every failed attempt rolls back its speculative
//! update and backs off through a [`spin::relax::RelaxStrategy`] (a thread
//! yield by default). There is no queue and no fairness. Use it for short
//! critical sections.
//!
//! [`PLock`] owns data and hands out guards. [`RawPLock`] is the bare engine;
//! it also implements the `lock_api` raw traits (see [`RwLock`]) and
//! [`Locker`].

#![warn(unsafe_op_in_unsafe_fn)]

pub use arch::{DefaultWord, LockWord};
pub use compat::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard, RwLockWriteGuard};
pub use helpers::{fetch_add, fetch_sub, LIVELOCK_REPORT_INTERVAL};
pub use locker::{AtomicLocker, Locker, ReadLocker, SeekLocker, WriteLocker};
pub use raw::RawPLock;
pub use rw_lock::*;
pub use state::LockState;

mod arch;
mod compat;
mod helpers;
mod locker;
mod raw;
mod rw_lock;
mod state;
