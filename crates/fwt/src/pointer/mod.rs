//! Pointer Module - Address Representation
//!
//! Addresses handled by the table: the disguised form stored in slots, and
//! the raw accessors used to null weak variables on clear.

pub mod disguised;

pub use disguised::DisguisedPtr;

/// Read the word stored at a registered weak location
///
/// # Safety
/// `location` must be non-null, aligned for `usize` and valid for reads.
#[inline]
pub(crate) unsafe fn read_referrer(location: usize) -> usize {
    (location as *const usize).read_volatile()
}

/// Null the word stored at a registered weak location
///
/// # Safety
/// `location` must be non-null, aligned for `usize` and valid for writes.
#[inline]
pub(crate) unsafe fn null_referrer(location: usize) {
    (location as *mut usize).write_volatile(0);
}

/// Check that `location` can hold a pointer-sized weak reference
#[inline]
pub(crate) fn is_valid_location(location: usize) -> bool {
    location != 0 && location % std::mem::align_of::<usize>() == 0
}
