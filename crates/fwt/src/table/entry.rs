//! Weak Entry - Referrer Set for One Referent
//!
//! Most objects that are weakly referenced at all have one or two weak
//! variables pointing at them, so an entry starts with a small inline array
//! and only moves to a separately allocated hash set once that array
//! overflows. The move is one-way: an entry never returns to inline storage.

use super::ProbeTable;
use crate::error::Result;
use crate::pointer::{self, DisguisedPtr};

/// Number of referrers stored inline before promotion
pub const INLINE_CAPACITY: usize = 4;

/// Capacity of a freshly promoted out-of-line set
const OUT_OF_LINE_CAPACITY: usize = 2 * INLINE_CAPACITY;

#[derive(Debug)]
enum Referrers {
    /// Unused slots hold `DisguisedPtr::NULL`
    Inline([DisguisedPtr; INLINE_CAPACITY]),
    OutOfLine(ProbeTable<DisguisedPtr>),
}

/// Result of removing a referrer from an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Location was not registered
    Missing,
    /// Location removed, other referrers remain
    Removed,
    /// Location removed and the entry has no referrers left
    Emptied,
}

/// WeakEntry - every weak variable currently pointing at one referent
#[derive(Debug)]
pub struct WeakEntry {
    referent: DisguisedPtr,
    referrers: Referrers,
}

impl WeakEntry {
    /// Entry holding a single referrer
    pub(crate) fn new(referent: DisguisedPtr, location: DisguisedPtr) -> Self {
        let mut inline = [DisguisedPtr::NULL; INLINE_CAPACITY];
        inline[0] = location;
        Self {
            referent,
            referrers: Referrers::Inline(inline),
        }
    }

    /// Address of the referent
    pub fn referent(&self) -> usize {
        self.referent.decode()
    }

    pub(crate) fn key(&self) -> DisguisedPtr {
        self.referent
    }

    /// Number of registered referrers
    pub fn len(&self) -> usize {
        match &self.referrers {
            Referrers::Inline(slots) => slots.iter().filter(|slot| !slot.is_null()).count(),
            Referrers::OutOfLine(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.referrers {
            Referrers::Inline(slots) => slots.iter().all(|slot| slot.is_null()),
            Referrers::OutOfLine(set) => set.is_empty(),
        }
    }

    /// Whether the referrers live in a separately allocated set
    pub fn is_out_of_line(&self) -> bool {
        matches!(self.referrers, Referrers::OutOfLine(_))
    }

    /// Number of referrer slots, occupied or not
    pub fn capacity(&self) -> usize {
        match &self.referrers {
            Referrers::Inline(_) => INLINE_CAPACITY,
            Referrers::OutOfLine(set) => set.capacity(),
        }
    }

    /// Largest probe distance of the out-of-line set, 0 when inline
    pub fn max_probe_distance(&self) -> usize {
        match &self.referrers {
            Referrers::Inline(_) => 0,
            Referrers::OutOfLine(set) => set.max_probe_distance(),
        }
    }

    /// Whether `location` is registered for this referent
    pub fn contains(&self, location: usize) -> bool {
        let location = DisguisedPtr::encode(location);
        match &self.referrers {
            Referrers::Inline(slots) => !location.is_null() && slots.contains(&location),
            Referrers::OutOfLine(set) => set.find(location).is_some(),
        }
    }

    /// Add a referrer
    ///
    /// Returns `false` if it was already present. Promotes inline storage to
    /// an out-of-line set when the inline array is full.
    pub(crate) fn insert(&mut self, location: DisguisedPtr) -> Result<bool> {
        debug_assert!(!location.is_null());

        if let Referrers::Inline(slots) = &mut self.referrers {
            if slots.contains(&location) {
                return Ok(false);
            }
            if let Some(free) = slots.iter_mut().find(|slot| slot.is_null()) {
                *free = location;
                return Ok(true);
            }

            let promoted = promote(slots, location)?;
            self.referrers = Referrers::OutOfLine(promoted);
            return Ok(true);
        }

        match &mut self.referrers {
            Referrers::OutOfLine(set) => {
                if set.find(location).is_some() {
                    return Ok(false);
                }
                set.insert_absent(location)?;
                Ok(true)
            },
            Referrers::Inline(_) => unreachable!("inline storage handled above"),
        }
    }

    /// Remove a referrer
    pub(crate) fn remove(&mut self, location: DisguisedPtr) -> Removal {
        if location.is_null() {
            return Removal::Missing;
        }

        let removed = match &mut self.referrers {
            Referrers::Inline(slots) => match slots.iter_mut().find(|slot| **slot == location) {
                Some(slot) => {
                    *slot = DisguisedPtr::NULL;
                    true
                },
                None => false,
            },
            Referrers::OutOfLine(set) => match set.find(location) {
                Some(index) => {
                    set.take(index);
                    true
                },
                None => false,
            },
        };

        if !removed {
            Removal::Missing
        } else if self.is_empty() {
            Removal::Emptied
        } else {
            Removal::Removed
        }
    }

    /// Registered locations, in no particular order
    pub fn referrers(&self) -> impl Iterator<Item = usize> + '_ {
        let slots: &[DisguisedPtr] = match &self.referrers {
            Referrers::Inline(slots) => slots,
            Referrers::OutOfLine(set) => set.slots(),
        };
        slots
            .iter()
            .filter(|slot| !slot.is_null())
            .map(|slot| slot.decode())
    }

    /// Call `f` with every registered location
    pub fn for_each_referrer(&self, f: impl FnMut(usize)) {
        self.referrers().for_each(f);
    }

    /// Null every weak variable still pointing at the referent and empty
    /// the entry
    ///
    /// A location that holds some other non-null value was overwritten
    /// without being unregistered; it is left alone and reported through
    /// `on_misuse(location, found)`. Returns the number of locations nulled.
    ///
    /// # Safety
    /// Every registered location must still be valid for reads and writes
    /// of a `usize`.
    pub(crate) unsafe fn clear_all(&mut self, mut on_misuse: impl FnMut(usize, usize)) -> usize {
        let referent = self.referent();
        let mut nulled = 0;

        for location in self.referrers() {
            let found = pointer::read_referrer(location);
            if found == referent {
                pointer::null_referrer(location);
                nulled += 1;
            } else if found != 0 {
                on_misuse(location, found);
            }
        }

        self.referrers = Referrers::Inline([DisguisedPtr::NULL; INLINE_CAPACITY]);
        nulled
    }
}

fn promote(
    inline: &[DisguisedPtr; INLINE_CAPACITY],
    location: DisguisedPtr,
) -> Result<ProbeTable<DisguisedPtr>> {
    let mut set = ProbeTable::with_capacity("referrer set", OUT_OF_LINE_CAPACITY)?;
    for &existing in inline.iter() {
        set.insert_absent(existing)?;
    }
    set.insert_absent(location)?;
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENT: usize = 0x7000_1000;

    fn entry_with(locations: &[usize]) -> WeakEntry {
        let mut entry = WeakEntry::new(
            DisguisedPtr::encode(REFERENT),
            DisguisedPtr::encode(locations[0]),
        );
        for &location in &locations[1..] {
            entry.insert(DisguisedPtr::encode(location)).unwrap();
        }
        entry
    }

    fn sorted(entry: &WeakEntry) -> Vec<usize> {
        let mut locations: Vec<usize> = entry.referrers().collect();
        locations.sort_unstable();
        locations
    }

    #[test]
    fn test_inline_until_capacity() {
        let entry = entry_with(&[0x10, 0x20, 0x30, 0x40]);
        assert!(!entry.is_out_of_line());
        assert_eq!(entry.len(), INLINE_CAPACITY);
        assert_eq!(sorted(&entry), vec![0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut entry = entry_with(&[0x10, 0x20]);
        assert!(!entry.insert(DisguisedPtr::encode(0x10)).unwrap());
        assert_eq!(entry.len(), 2);

        let mut big = entry_with(&[0x10, 0x20, 0x30, 0x40, 0x50]);
        assert!(!big.insert(DisguisedPtr::encode(0x50)).unwrap());
        assert!(!big.insert(DisguisedPtr::encode(0x20)).unwrap());
        assert_eq!(big.len(), 5);
    }

    #[test]
    fn test_promotion_preserves_membership() {
        let entry = entry_with(&[0x10, 0x20, 0x30, 0x40, 0x50]);
        assert!(entry.is_out_of_line());
        assert_eq!(entry.capacity(), OUT_OF_LINE_CAPACITY);
        assert_eq!(sorted(&entry), vec![0x10, 0x20, 0x30, 0x40, 0x50]);
        for location in [0x10, 0x20, 0x30, 0x40, 0x50] {
            assert!(entry.contains(location));
        }
    }

    #[test]
    fn test_no_demotion_after_remove() {
        let mut entry = entry_with(&[0x10, 0x20, 0x30, 0x40, 0x50]);
        assert_eq!(entry.remove(DisguisedPtr::encode(0x30)), Removal::Removed);
        assert!(entry.is_out_of_line());
        assert_eq!(sorted(&entry), vec![0x10, 0x20, 0x40, 0x50]);
    }

    #[test]
    fn test_out_of_line_growth() {
        let locations: Vec<usize> = (1..=100).map(|i| i * 8).collect();
        let entry = entry_with(&locations);
        assert_eq!(entry.len(), 100);
        assert!(entry.capacity() >= 128);
        assert!(entry.capacity().is_power_of_two());
        assert_eq!(sorted(&entry), locations);
    }

    #[test]
    fn test_remove_reports_emptied() {
        let mut entry = entry_with(&[0x10, 0x20]);
        assert_eq!(entry.remove(DisguisedPtr::encode(0x99)), Removal::Missing);
        assert_eq!(entry.remove(DisguisedPtr::encode(0x10)), Removal::Removed);
        assert_eq!(entry.remove(DisguisedPtr::encode(0x10)), Removal::Missing);
        assert_eq!(entry.remove(DisguisedPtr::encode(0x20)), Removal::Emptied);
        assert!(entry.is_empty());
    }

    #[test]
    fn test_remove_half_of_out_of_line_set() {
        let locations: Vec<usize> = (1..=50).map(|i| i * 8).collect();
        let mut entry = entry_with(&locations);

        for &location in locations.iter().step_by(2) {
            assert_eq!(entry.remove(DisguisedPtr::encode(location)), Removal::Removed);
        }

        let remaining: Vec<usize> = locations.iter().copied().skip(1).step_by(2).collect();
        assert_eq!(sorted(&entry), remaining);
        for &location in &remaining {
            assert!(entry.contains(location));
        }
    }

    #[test]
    fn test_slots_hold_disguised_addresses() {
        let entry = entry_with(&[0x7fff_0010, 0x7fff_0020]);
        match &entry.referrers {
            Referrers::Inline(slots) => {
                assert!(slots.iter().all(|slot| slot.bits() != 0x7fff_0010));
                assert!(slots.iter().all(|slot| slot.bits() != 0x7fff_0020));
            },
            Referrers::OutOfLine(_) => panic!("two referrers should stay inline"),
        }
        assert_ne!(entry.key().bits(), REFERENT);
    }

    #[test]
    fn test_clear_all_nulls_memory() {
        let mut slots: Vec<usize> = vec![REFERENT; 6];
        let locations: Vec<usize> = slots
            .iter_mut()
            .map(|slot| slot as *mut usize as usize)
            .collect();
        let mut entry = entry_with(&locations);
        assert!(entry.is_out_of_line());

        let mut misused = Vec::new();
        let nulled = unsafe { entry.clear_all(|location, found| misused.push((location, found))) };

        assert_eq!(nulled, 6);
        assert!(misused.is_empty());
        assert!(slots.iter().all(|&value| value == 0));
        assert!(entry.is_empty());
    }

    #[test]
    fn test_clear_all_skips_overwritten_locations() {
        let mut slots: [usize; 3] = [REFERENT, 0xbad0, 0];
        let locations: Vec<usize> = slots
            .iter_mut()
            .map(|slot| slot as *mut usize as usize)
            .collect();
        let mut entry = entry_with(&locations);

        let mut misused = Vec::new();
        let nulled = unsafe { entry.clear_all(|location, found| misused.push((location, found))) };

        assert_eq!(nulled, 1);
        assert_eq!(misused, vec![(locations[1], 0xbad0)]);
        assert_eq!(slots, [0, 0xbad0, 0]);
    }

    #[test]
    fn test_for_each_referrer_visits_all() {
        let entry = entry_with(&[0x10, 0x20, 0x30, 0x40, 0x50, 0x60]);
        let mut seen = 0;
        entry.for_each_referrer(|_| seen += 1);
        assert_eq!(seen, 6);
    }
}
