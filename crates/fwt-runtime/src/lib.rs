//! Fax Weak Reference Runtime Library
//!
//! C-compatible entry points for compiled Fax programs:
//! - Weak variable write barrier (register / unregister)
//! - Object teardown hooks (begin destroy / finish destroy)
//! - Runtime initialization

mod weak;

pub use weak::*;
