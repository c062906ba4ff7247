//! Weak Runtime - C FFI wrapper for FWT
//!
//! A process-wide `Runtime` created on first use. Fatal conditions abort
//! the process, since unwinding across `extern "C"` is not an option.

use fwt::{FatalAction, Runtime, WeakTableConfig};
use std::ffi::c_void;
use std::sync::OnceLock;

static RUNTIME: OnceLock<Runtime> = OnceLock::new();

fn runtime_config() -> WeakTableConfig {
    WeakTableConfig {
        fatal_action: FatalAction::Abort,
        ..Default::default()
    }
}

fn runtime() -> Option<&'static Runtime> {
    if let Some(runtime) = RUNTIME.get() {
        return Some(runtime);
    }

    match Runtime::new(runtime_config()) {
        Ok(runtime) => Some(RUNTIME.get_or_init(|| runtime)),
        Err(e) => {
            log::error!(target: "fwt", "Failed to create weak runtime: {}", e);
            None
        },
    }
}

/// Initialize the weak reference runtime
///
/// Idempotent; every other entry point initializes lazily as well.
#[no_mangle]
pub extern "C" fn fwt_weak_init() -> bool {
    runtime().is_some()
}

/// Write barrier: bind the weak variable at `location` to `referent`
///
/// Returns whether a new binding was created. With `crash_if_destroying`
/// set, storing a reference to an object under destruction aborts.
///
/// # Safety
/// `location` must stay valid for pointer-sized reads and writes until it
/// is unregistered or `referent` is cleared.
#[no_mangle]
pub unsafe extern "C" fn fwt_weak_register(
    referent: *mut c_void,
    location: *mut *mut c_void,
    crash_if_destroying: bool,
) -> bool {
    match runtime() {
        Some(runtime) => runtime.registry().register(
            referent as usize,
            location as usize,
            crash_if_destroying,
        ),
        None => false,
    }
}

/// Write barrier: drop the binding of `location` to `referent`
#[no_mangle]
pub extern "C" fn fwt_weak_unregister(referent: *mut c_void, location: *mut *mut c_void) -> bool {
    match RUNTIME.get() {
        Some(runtime) => runtime
            .registry()
            .unregister(referent as usize, location as usize),
        None => false,
    }
}

/// Null every weak variable pointing at `referent`
///
/// Returns the number of weak variables nulled.
#[no_mangle]
pub extern "C" fn fwt_weak_clear(referent: *mut c_void) -> usize {
    match RUNTIME.get() {
        Some(runtime) => runtime.registry().clear(referent as usize),
        None => 0,
    }
}

#[no_mangle]
pub extern "C" fn fwt_weak_is_registered(referent: *mut c_void) -> bool {
    match RUNTIME.get() {
        Some(runtime) => runtime.registry().is_registered(referent as usize),
        None => false,
    }
}

/// Mark `object` as being destroyed
#[no_mangle]
pub extern "C" fn fwt_object_begin_destroy(object: *mut c_void) -> bool {
    match runtime() {
        Some(runtime) => runtime.begin_destruction(object as usize),
        None => false,
    }
}

/// Clear weak references to `object` and drop its destruction mark
///
/// Returns the number of weak variables nulled.
#[no_mangle]
pub extern "C" fn fwt_object_finish_destroy(object: *mut c_void) -> usize {
    match RUNTIME.get() {
        Some(runtime) => runtime.finish_destruction(object as usize),
        None => 0,
    }
}

/// Number of objects with at least one weak reference
#[no_mangle]
pub extern "C" fn fwt_weak_entry_count() -> usize {
    match RUNTIME.get() {
        Some(runtime) => runtime.registry().len(),
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The runtime is process-wide, so every test uses its own objects.

    #[test]
    fn test_init_is_idempotent() {
        assert!(fwt_weak_init());
        assert!(fwt_weak_init());
    }

    #[test]
    fn test_register_and_clear() {
        let mut object = [0u64; 2];
        let referent = object.as_mut_ptr() as *mut c_void;
        let mut weak: *mut c_void = referent;

        unsafe {
            assert!(fwt_weak_register(referent, &mut weak, true));
            assert!(!fwt_weak_register(referent, &mut weak, true));
        }
        assert!(fwt_weak_is_registered(referent));

        assert_eq!(fwt_weak_clear(referent), 1);
        assert!(weak.is_null());
        assert!(!fwt_weak_is_registered(referent));
    }

    #[test]
    fn test_destroy_hooks() {
        let mut object = [0u64; 2];
        let referent = object.as_mut_ptr() as *mut c_void;
        let mut first: *mut c_void = referent;
        let mut late: *mut c_void = std::ptr::null_mut();

        unsafe {
            assert!(fwt_weak_register(referent, &mut first, true));
        }
        assert!(fwt_object_begin_destroy(referent));
        unsafe {
            assert!(!fwt_weak_register(referent, &mut late, false));
        }

        assert_eq!(fwt_object_finish_destroy(referent), 1);
        assert!(first.is_null());
        assert!(!fwt_weak_is_registered(referent));
    }

    #[test]
    fn test_unregister() {
        let mut object = [0u64; 2];
        let referent = object.as_mut_ptr() as *mut c_void;
        let mut weak: *mut c_void = referent;

        unsafe {
            fwt_weak_register(referent, &mut weak, true);
        }
        assert!(fwt_weak_unregister(referent, &mut weak));
        assert!(!fwt_weak_unregister(referent, &mut weak));
        assert_eq!(fwt_weak_clear(referent), 0);
        assert_eq!(weak, referent);
    }

    #[test]
    fn test_null_arguments() {
        fwt_weak_init();
        unsafe {
            assert!(!fwt_weak_register(std::ptr::null_mut(), std::ptr::null_mut(), true));
        }
        assert!(!fwt_weak_is_registered(std::ptr::null_mut()));
        assert_eq!(fwt_weak_clear(std::ptr::null_mut()), 0);
        assert!(!fwt_object_begin_destroy(std::ptr::null_mut()));
    }
}
