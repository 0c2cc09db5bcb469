//! Protected-bit arithmetic.
//!
//! Exactly one bit is protected per build: setgid by default, sticky with
//! the `sticky` feature.

use libc::{gid_t, mode_t};

#[cfg(not(feature = "sticky"))]
pub const PROTECTED_BIT: mode_t = libc::S_ISGID;
#[cfg(feature = "sticky")]
pub const PROTECTED_BIT: mode_t = libc::S_ISVTX;

/// `(gid_t)-1`: the chown-family sentinel for "leave the group alone".
pub const GROUP_UNCHANGED: gid_t = gid_t::MAX;

/// Human-readable name of the protected bit.
pub const fn protected_bit_name() -> &'static str {
    if cfg!(feature = "sticky") {
        "sticky"
    } else {
        "setgid"
    }
}

/// Mode to actually apply: the protected bit comes from `current`, every
/// other bit from `requested`.
#[inline]
pub const fn preserve_protected_bit(current: mode_t, requested: mode_t) -> mode_t {
    (current & PROTECTED_BIT) | (requested & !PROTECTED_BIT)
}
