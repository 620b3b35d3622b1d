use core::fmt;
use core::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Page sizes of 32-bit x86 paging without PAE.
///
/// Only [`Size4K`] and [`Size4M`] exist; the trait is sealed.
pub trait PageSize: sealed::Sealed + Copy + Ord + Hash + fmt::Display + fmt::Debug {
    /// log2 of the page size.
    const SHIFT: u32;
    /// Page size in bytes.
    const SIZE: u32 = 1 << Self::SHIFT;
    /// Bits of an address that select a byte within the page.
    const OFFSET_MASK: u32 = Self::SIZE - 1;

    fn as_str() -> &'static str;
}

macro_rules! page_size {
    ($(#[$doc:meta])* $name:ident, $shift:literal, $label:literal) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        pub struct $name;

        impl sealed::Sealed for $name {}

        impl PageSize for $name {
            const SHIFT: u32 = $shift;

            fn as_str() -> &'static str {
                $label
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str($label)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str($label)
            }
        }
    };
}

page_size!(
    /// 4 KiB page, mapped by a PTE.
    Size4K, 12, "4K"
);

page_size!(
    /// 4 MiB large page, mapped directly by a PDE with `PS=1`.
    Size4M, 22, "4M"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(Size4K::SIZE, 0x1000);
        assert_eq!(Size4K::OFFSET_MASK, 0xFFF);
        assert_eq!(Size4M::SIZE, 0x40_0000);
        assert_eq!(Size4M::OFFSET_MASK, 0x3F_FFFF);
        assert_eq!(Size4M.to_string(), "4M");
    }
}
