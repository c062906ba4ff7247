//! Disguised Pointer Implementation
//!
//! Every address stored in the weak table is kept in negated form so that a
//! conservative scan of process memory (leak checkers, heap analysis tools)
//! does not mistake the table for a pile of interior pointers into live
//! objects.

use static_assertions::{assert_eq_align, assert_eq_size};

/// DisguisedPtr - an address stored in reversible, scanner-opaque form
///
/// `encode(p)` stores the two's complement negation of `p`. Null maps to
/// `0` and no other address does, so `0` doubles as the empty-slot
/// sentinel throughout the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct DisguisedPtr {
    raw: usize,
}

assert_eq_size!(DisguisedPtr, usize);
assert_eq_align!(DisguisedPtr, usize);

impl DisguisedPtr {
    /// Encoded null pointer
    pub const NULL: DisguisedPtr = DisguisedPtr { raw: 0 };

    /// Disguise a raw address
    #[inline]
    pub const fn encode(address: usize) -> Self {
        Self {
            raw: address.wrapping_neg(),
        }
    }

    /// Recover the raw address
    #[inline]
    pub const fn decode(self) -> usize {
        self.raw.wrapping_neg()
    }

    /// Whether this is the encoded null pointer
    #[inline]
    pub const fn is_null(self) -> bool {
        self.raw == 0
    }

    /// Stored bit pattern, used only for hashing
    #[inline]
    pub(crate) const fn bits(self) -> usize {
        self.raw
    }
}
