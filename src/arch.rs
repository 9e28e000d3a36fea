use core::fmt;
use core::ops::{BitAnd, BitOr};
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Backing integer of a progressive lock.
///
/// The word is split low-to-high into four fields:
///
/// | field    | bits          |
/// |----------|---------------|
/// | reserved | 2             |
/// | readers  | `BITS / 2 - 2` |
/// | seekers  | 2             |
/// | writers  | `BITS / 2 - 2` |
///
/// All masks are derived from `BITS` by the same formulas for every width.
pub trait LockWord:
    Copy + Eq + fmt::Debug + Send + Sync + 'static + BitAnd<Output = Self> + BitOr<Output = Self>
{
    /// Atomic cell holding the word.
    type Atomic: Send + Sync;

    const BITS: u32;
    const ZERO: Self;

    /// One reader.
    const RL_1: Self;
    /// Every reader bit.
    const RL_ANY: Self;
    /// One seeker.
    const SL_1: Self;
    /// Every seeker bit.
    const SL_ANY: Self;
    /// One writer.
    const WL_1: Self;
    /// Every writer bit.
    const WL_ANY: Self;

    #[allow(clippy::declare_interior_mutable_const)]
    const UNLOCKED: Self::Atomic;

    fn load(cell: &Self::Atomic, order: Ordering) -> Self;

    /// Native atomic add, returning the previous value.
    fn fetch_add(cell: &Self::Atomic, val: Self, order: Ordering) -> Self;

    fn wrapping_add(self, rhs: Self) -> Self;
    fn wrapping_sub(self, rhs: Self) -> Self;
    fn wrapping_neg(self) -> Self;

    fn into_u64(self) -> u64;
}

macro_rules! impl_lock_word {
    ($int:ty, $atomic:ty) => {
        impl LockWord for $int {
            type Atomic = $atomic;

            const BITS: u32 = <$int>::BITS;
            const ZERO: Self = 0;

            const RL_1: Self = 1 << RESERVED_BITS;
            const RL_ANY: Self = count_mask!($int) << RESERVED_BITS;
            const SL_1: Self = 1 << (<$int>::BITS / 2);
            const SL_ANY: Self = 0b11 << (<$int>::BITS / 2);
            const WL_1: Self = 1 << (<$int>::BITS / 2 + SEEK_BITS);
            const WL_ANY: Self = count_mask!($int) << (<$int>::BITS / 2 + SEEK_BITS);

            const UNLOCKED: $atomic = <$atomic>::new(0);

            #[inline(always)]
            fn load(cell: &$atomic, order: Ordering) -> Self {
                cell.load(order)
            }

            #[inline(always)]
            fn fetch_add(cell: &$atomic, val: Self, order: Ordering) -> Self {
                cell.fetch_add(val, order)
            }

            #[inline(always)]
            fn wrapping_add(self, rhs: Self) -> Self {
                <$int>::wrapping_add(self, rhs)
            }

            #[inline(always)]
            fn wrapping_sub(self, rhs: Self) -> Self {
                <$int>::wrapping_sub(self, rhs)
            }

            #[inline(always)]
            fn wrapping_neg(self) -> Self {
                <$int>::wrapping_neg(self)
            }

            #[inline(always)]
            fn into_u64(self) -> u64 {
                self as u64
            }
        }
    };
}

/// Low padding bits, always zero.
const RESERVED_BITS: u32 = 2;
/// Width of the seeker field.
const SEEK_BITS: u32 = 2;

/// All-ones mask as wide as the reader (and writer) field of `$int`.
macro_rules! count_mask {
    ($int:ty) => {
        (((1 as $int) << (<$int>::BITS / 2 - RESERVED_BITS)) - 1)
    };
}

impl_lock_word!(u8, AtomicU8);
impl_lock_word!(u16, AtomicU16);
impl_lock_word!(u32, AtomicU32);
impl_lock_word!(u64, AtomicU64);

/// Word used when no width is named: the register width of the target.
#[cfg(target_pointer_width = "64")]
pub type DefaultWord = u64;

#[cfg(not(target_pointer_width = "64"))]
pub type DefaultWord = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_published_values_64() {
        assert_eq!(u64::RL_1, 0x0000_0000_0000_0004);
        assert_eq!(u64::RL_ANY, 0x0000_0000_FFFF_FFFC);
        assert_eq!(u64::SL_1, 0x0000_0001_0000_0000);
        assert_eq!(u64::SL_ANY, 0x0000_0003_0000_0000);
        assert_eq!(u64::WL_1, 0x0000_0004_0000_0000);
        assert_eq!(u64::WL_ANY, 0xFFFF_FFFC_0000_0000);
    }

    #[test]
    fn constants_match_published_values_32() {
        assert_eq!(u32::RL_1, 0x0000_0004);
        assert_eq!(u32::RL_ANY, 0x0000_FFFC);
        assert_eq!(u32::SL_1, 0x0001_0000);
        assert_eq!(u32::SL_ANY, 0x0003_0000);
        assert_eq!(u32::WL_1, 0x0004_0000);
        assert_eq!(u32::WL_ANY, 0xFFFC_0000);
    }

    #[test]
    fn narrow_words_follow_the_same_layout() {
        assert_eq!(u16::RL_ANY, 0x00FC);
        assert_eq!(u16::SL_ANY, 0x0300);
        assert_eq!(u16::WL_ANY, 0xFC00);

        assert_eq!(u8::RL_ANY, 0x0C);
        assert_eq!(u8::SL_ANY, 0x30);
        assert_eq!(u8::WL_ANY, 0xC0);
    }

    fn fields_partition_the_word<W: LockWord>() {
        let reserved = 0b11u64;
        let fields = [W::RL_ANY, W::SL_ANY, W::WL_ANY].map(LockWord::into_u64);

        let mut seen = reserved;
        for field in fields {
            assert_eq!(seen & field, 0, "fields overlap");
            seen |= field;
        }
        let full = if W::BITS == 64 { u64::MAX } else { (1u64 << W::BITS) - 1 };
        assert_eq!(seen, full);
    }

    #[test]
    fn fields_partition_every_width() {
        fields_partition_the_word::<u8>();
        fields_partition_the_word::<u16>();
        fields_partition_the_word::<u32>();
        fields_partition_the_word::<u64>();
    }

    #[test]
    fn unit_is_lowest_bit_of_its_field() {
        assert_eq!(u64::RL_1, 1 << u64::RL_ANY.trailing_zeros());
        assert_eq!(u64::SL_1, 1 << u64::SL_ANY.trailing_zeros());
        assert_eq!(u64::WL_1, 1 << u64::WL_ANY.trailing_zeros());
    }

    #[test]
    fn default_word_matches_pointer_width() {
        assert_eq!(DefaultWord::BITS as usize, usize::BITS as usize);
    }
}
