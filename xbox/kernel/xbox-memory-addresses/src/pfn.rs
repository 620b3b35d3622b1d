use crate::{PhysicalAddress, Size4K};
use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// Physical **page frame number**: index of one 4 KiB page of guest RAM.
///
/// `Pfn(n)` describes the physical bytes `[n << 12, (n + 1) << 12)`. Page
/// frame numbers are plain indices, so arithmetic on them is unchecked beyond
/// the usual debug overflow checks.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pfn(u32);

/// Number of page frames in a run.
pub type PfnCount = u32;

impl Pfn {
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Frame containing the physical address `pa`.
    #[inline]
    #[must_use]
    pub const fn containing(pa: PhysicalAddress) -> Self {
        Self(pa.page::<Size4K>().number())
    }

    /// First byte of this frame.
    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0 << 12)
    }

    /// `true` if the frame number is a multiple of `alignment` (a power of two).
    #[inline]
    #[must_use]
    pub const fn is_aligned_to(self, alignment: PfnCount) -> bool {
        debug_assert!(alignment.is_power_of_two());
        self.0 & (alignment - 1) == 0
    }
}

impl fmt::Debug for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pfn({:#07X})", self.0)
    }
}

impl fmt::Display for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#07X}", self.0)
    }
}

impl From<u32> for Pfn {
    #[inline]
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl Add<PfnCount> for Pfn {
    type Output = Self;
    #[inline]
    fn add(self, rhs: PfnCount) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl AddAssign<PfnCount> for Pfn {
    #[inline]
    fn add_assign(&mut self, rhs: PfnCount) {
        self.0 += rhs;
    }
}

impl Sub<PfnCount> for Pfn {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: PfnCount) -> Self::Output {
        Self(self.0 - rhs)
    }
}

/// Distance between two frames (`self - rhs`), in pages.
impl Sub<Self> for Pfn {
    type Output = PfnCount;
    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        self.0 - rhs.0
    }
}
