use core::fmt;

use crate::arch::LockWord;

/// One observation of a lock word, split into its fields.
///
/// A `LockState` describes the lock at the instant it was loaded, not now.
/// Use it for debugging only.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct LockState<W> {
    raw: W,
}

#[inline]
fn field<W: LockWord>(raw: W, mask: W, unit: W) -> u64 {
    (raw & mask).into_u64() >> unit.into_u64().trailing_zeros()
}

impl<W: LockWord> LockState<W> {
    pub fn new(raw: W) -> Self {
        LockState { raw }
    }

    pub fn raw(&self) -> W {
        self.raw
    }

    pub fn is_unlocked(&self) -> bool {
        self.raw == W::ZERO
    }

    /// Reader-equivalent holders: readers, seekers, and writers that went
    /// through the reader count.
    pub fn readers(&self) -> u64 {
        field(self.raw, W::RL_ANY, W::RL_1)
    }

    pub fn seekers(&self) -> u64 {
        field(self.raw, W::SL_ANY, W::SL_1)
    }

    /// Writer-equivalent holders: one full writer or any number of atomic
    /// writers.
    pub fn writers(&self) -> u64 {
        field(self.raw, W::WL_ANY, W::WL_1)
    }
}

impl<W: LockWord> fmt::Display for LockState<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (r, s, w) = (self.readers(), self.seekers(), self.writers());

        if self.is_unlocked() {
            return f.write_str("U");
        }

        if s == 0 {
            if w == 0 {
                return match r {
                    1 => f.write_str("R; readers: self only"),
                    _ => write!(f, "R; readers: {}", r - 1),
                };
            }
            write!(f, "A; writers: {}", w)?;
            if r > 0 {
                write!(f, "; waiting for readers: {}", r)?;
            }
            return Ok(());
        }

        if r > 0 {
            f.write_str("R+")?;
        }
        f.write_str("S")?;
        if w > 0 {
            f.write_str("+W")?;
            return match r {
                0 | 1 => f.write_str("; readers: self only"),
                _ => write!(f, "; waiting for readers: {}", r - 1),
            };
        }
        match r {
            0 | 1 => f.write_str("; readers: self only"),
            _ => write!(f, "; readers: {}", r - 1),
        }
    }
}

impl<W: LockWord> fmt::Debug for LockState<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockState")
            .field("readers", &self.readers())
            .field("seekers", &self.seekers())
            .field("writers", &self.writers())
            .finish()
    }
}
