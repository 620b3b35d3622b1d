//! # Guest Page Protection
//!
//! Translation between the `PAGE_*` protection flags the guest passes to the
//! memory APIs and the protection bits of an [`MmPte`].
//!
//! Only read-only and read-write access exist on the console: execute rights
//! are not enforced and copy-on-write is unsupported, so every accepted
//! request collapses to one of the two access classes plus a guard flag and a
//! cache mode.

use crate::pte::{
    MmPte, PTE_ACCESS_MASK, PTE_CACHE_DISABLE_MASK, PTE_DIRTY_MASK, PTE_GUARD, PTE_READONLY,
    PTE_READWRITE, PTE_VALID_MASK, PTE_VALID_PROTECTION_MASK, PTE_WRITE_THROUGH_MASK,
    VALID_KERNEL_PTE_BITS,
};
use bitflags::bitflags;

bitflags! {
    /// Guest page protection flags (`PAGE_NOACCESS` and friends).
    ///
    /// Raw values coming from the guest should be wrapped with
    /// [`XboxProtection::from_bits_retain`] so that unknown bits reach the
    /// translators and get rejected there.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    pub struct XboxProtection: u32 {
        const NOACCESS = 0x01;
        const READONLY = 0x02;
        const READWRITE = 0x04;
        const WRITECOPY = 0x08;
        const EXECUTE = 0x10;
        const EXECUTE_READ = 0x20;
        const EXECUTE_READWRITE = 0x40;
        const EXECUTE_WRITECOPY = 0x80;
        const GUARD = 0x100;
        const NOCACHE = 0x200;
        const WRITECOMBINE = 0x400;
    }
}

impl XboxProtection {
    /// The eight mutually exclusive access levels (bits `0..=7`).
    pub const ACCESS_MASK: Self = Self::from_bits_retain(0xFF);

    /// The two cache-mode modifiers.
    pub const CACHE_MASK: Self = Self::NOCACHE.union(Self::WRITECOMBINE);
}

/// Why a protection request was rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ProtectionError {
    #[error("unknown or disallowed protection bits {0:#X}")]
    UnknownFlags(u32),
    #[error("PAGE_NOACCESS cannot be combined with other modifiers")]
    NoAccessWithModifiers,
    #[error("PAGE_NOCACHE and PAGE_WRITECOMBINE are mutually exclusive")]
    ConflictingCacheModes,
    #[error("exactly one access level must be requested")]
    AmbiguousAccess,
    #[error("access level {0:#X} is not supported")]
    UnsupportedAccess(u32),
}

/// Translate guest protection flags into the protection bits of a user or
/// system PTE.
///
/// The returned entry carries no PFN. `NOACCESS` and `GUARD` produce a
/// non-valid entry; a guard page additionally keeps [`PTE_GUARD`].
///
/// ```rust
/// # use xbox_vmem::{pte_permissions, XboxProtection};
/// let pte = pte_permissions(XboxProtection::READWRITE | XboxProtection::NOCACHE).unwrap();
/// assert_eq!(pte.into_bits(), 0x13);
/// assert!(pte_permissions(XboxProtection::READONLY | XboxProtection::EXECUTE).is_err());
/// ```
///
/// # Errors
/// Returns the first rule the request violates.
pub fn pte_permissions(perms: XboxProtection) -> Result<MmPte, ProtectionError> {
    let result = translate(perms);
    if let Err(e) = result {
        log::debug!("Rejected protection {:#X}: {e}", perms.bits());
    }
    result
}

fn translate(perms: XboxProtection) -> Result<MmPte, ProtectionError> {
    let allowed = XboxProtection::GUARD | XboxProtection::CACHE_MASK | XboxProtection::ACCESS_MASK;
    let unknown = perms.bits() & !allowed.bits();
    if unknown != 0 {
        return Err(ProtectionError::UnknownFlags(unknown));
    }

    if perms.contains(XboxProtection::NOACCESS)
        && perms.intersects(XboxProtection::GUARD | XboxProtection::CACHE_MASK)
    {
        return Err(ProtectionError::NoAccessWithModifiers);
    }

    if perms.contains(XboxProtection::CACHE_MASK) {
        return Err(ProtectionError::ConflictingCacheModes);
    }

    let low = perms.bits() & 0xF;
    let high = (perms.bits() >> 4) & 0xF;
    if (low == 0) == (high == 0) {
        return Err(ProtectionError::AmbiguousAccess);
    }

    // WRITECOPY and EXECUTE_WRITECOPY fall through to the error arm
    let mut mask = match low | high {
        1 | 2 => PTE_READONLY,
        4 => PTE_READWRITE,
        other => return Err(ProtectionError::UnsupportedAccess(other)),
    };

    if !perms.intersects(XboxProtection::NOACCESS | XboxProtection::GUARD) {
        mask |= PTE_VALID_MASK;
    } else if perms.contains(XboxProtection::GUARD) {
        mask |= PTE_GUARD;
    }

    if perms.contains(XboxProtection::NOCACHE) {
        mask |= PTE_CACHE_DISABLE_MASK;
    } else if perms.contains(XboxProtection::WRITECOMBINE) {
        mask |= PTE_WRITE_THROUGH_MASK;
    }

    assert_eq!(mask & !PTE_VALID_PROTECTION_MASK, 0);
    Ok(MmPte::from_bits(mask))
}

/// Translate guest protection flags into the bits of a kernel-only PTE.
///
/// Kernel mappings are always present, so only `READONLY` or `READWRITE`
/// (exactly one of them) and at most one cache modifier are accepted.
/// Read-only kernel entries still carry the dirty and accessed bits.
///
/// # Errors
/// Returns the first rule the request violates.
pub fn system_pte_permissions(perms: XboxProtection) -> Result<MmPte, ProtectionError> {
    let allowed = XboxProtection::CACHE_MASK | XboxProtection::READWRITE | XboxProtection::READONLY;
    let unknown = perms.bits() & !allowed.bits();
    if unknown != 0 {
        log::debug!("Rejected system protection {:#X}", perms.bits());
        return Err(ProtectionError::UnknownFlags(unknown));
    }

    let access = perms & (XboxProtection::READONLY | XboxProtection::READWRITE);
    let mut mask = if access == XboxProtection::READONLY {
        PTE_VALID_MASK | PTE_DIRTY_MASK | PTE_ACCESS_MASK
    } else if access == XboxProtection::READWRITE {
        VALID_KERNEL_PTE_BITS
    } else {
        log::debug!("Rejected system protection {:#X}", perms.bits());
        return Err(ProtectionError::AmbiguousAccess);
    };

    let cache = perms & XboxProtection::CACHE_MASK;
    if cache == XboxProtection::NOCACHE {
        mask |= PTE_CACHE_DISABLE_MASK;
    } else if cache == XboxProtection::WRITECOMBINE {
        mask |= PTE_WRITE_THROUGH_MASK;
    } else if !cache.is_empty() {
        log::debug!("Rejected system protection {:#X}", perms.bits());
        return Err(ProtectionError::ConflictingCacheModes);
    }

    Ok(MmPte::from_bits(mask))
}

/// Best-effort reverse translation of a PTE's protection bits.
///
/// Assumes `pte` was produced by [`pte_permissions`] or
/// [`system_pte_permissions`]; other bit patterns give a meaningless (but
/// harmless) answer.
///
/// ```rust
/// # use xbox_vmem::{MmPte, protection_of, XboxProtection};
/// assert_eq!(protection_of(MmPte::from_bits(0x0)), XboxProtection::NOACCESS);
/// assert_eq!(
///     protection_of(MmPte::from_bits(0x203)),
///     XboxProtection::READWRITE
/// );
/// ```
#[must_use]
pub fn protection_of(pte: MmPte) -> XboxProtection {
    let bits = pte.into_bits();
    let mut protect = if bits & PTE_READWRITE != 0 {
        XboxProtection::READWRITE
    } else {
        XboxProtection::READONLY
    };

    if bits & PTE_VALID_MASK == 0 {
        if bits & PTE_GUARD != 0 {
            protect |= XboxProtection::GUARD;
        } else {
            protect = XboxProtection::NOACCESS;
        }
    }

    if bits & PTE_CACHE_DISABLE_MASK != 0 {
        protect |= XboxProtection::NOCACHE;
    } else if bits & PTE_WRITE_THROUGH_MASK != 0 {
        protect |= XboxProtection::WRITECOMBINE;
    }

    protect
}
