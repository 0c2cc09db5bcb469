//! # teflon-inception-layer
//!
//! LD_PRELOAD / DYLD_INSERT_LIBRARIES inception layer that keeps the host
//! program from setting the setgid bit (sticky bit with `--features sticky`)
//! or changing the group of a file.
//!
//! Overridden: `chmod fchmod fchmodat chown fchown lchown fchownat`.
//!
//! The layer writes nothing to the environment and logs nothing. The only
//! output it can ever produce is the one-line message before
//! [`reals::EXIT_UNRESOLVED`].
//!
//! Programs that do not go through the dynamic loader (static binaries,
//! raw syscalls, an exec that drops the preload variable) are not covered.

// Allow unsafe FFI functions without safety docs - these are inherently unsafe C ABI
#![allow(clippy::missing_safety_doc)]

pub mod interpose;
pub mod reals;

/// Platform-agnostic errno write
pub(crate) fn set_errno(e: libc::c_int) {
    #[cfg(target_os = "linux")]
    unsafe {
        *libc::__errno_location() = e;
    }
    #[cfg(any(target_os = "macos", target_os = "freebsd"))]
    unsafe {
        *libc::__error() = e;
    }
}

/// Static constructor for Linux: resolve the real symbols when the dynamic
/// loader maps us, before the host's `main`. Uses .init_array section.
#[cfg(target_os = "linux")]
#[link_section = ".init_array"]
#[used]
pub static TEFLON_INIT_LINUX: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        let _ = crate::reals::reals();
    }
    init
};

/// Static constructor for macOS, same job via __mod_init_func.
#[cfg(target_os = "macos")]
#[link_section = "__DATA,__mod_init_func"]
#[used]
pub static TEFLON_INIT_MACOS: unsafe extern "C" fn() = {
    unsafe extern "C" fn init() {
        let _ = crate::reals::reals();
    }
    init
};
