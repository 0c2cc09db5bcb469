//! Exported replacements for the chmod and chown families.
//! Safety: All extern "C" functions here are dangerous FFI and must be used correctly.
//!
//! Each one converts its C arguments, runs the policy from `teflon-core`
//! against the real entry points and reports failure the C way:
//! `errno = e; return -1`.

use std::ffi::CStr;

use libc::{c_char, c_int, gid_t, mode_t, uid_t};
use nix::errno::Errno;
use teflon_core::{Interceptor, ModeTarget, OwnerTarget, SysResult};

use crate::reals::{reals, Reals};

#[inline]
fn interceptor() -> Interceptor<&'static Reals> {
    Interceptor::new(reals())
}

/// NULL is answered with the EFAULT the kernel would have given.
#[inline]
unsafe fn c_path<'a>(path: *const c_char) -> SysResult<&'a CStr> {
    if path.is_null() {
        return Err(Errno::EFAULT);
    }
    Ok(CStr::from_ptr(path))
}

#[inline]
fn finish(result: SysResult<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            crate::set_errno(e as c_int);
            -1
        }
    }
}

// --- chmod family ---

#[no_mangle]
pub unsafe extern "C" fn chmod(path: *const c_char, mode: mode_t) -> c_int {
    finish(c_path(path).and_then(|p| interceptor().change_mode(ModeTarget::Path(p), mode)))
}

#[no_mangle]
pub unsafe extern "C" fn fchmod(fd: c_int, mode: mode_t) -> c_int {
    finish(interceptor().change_mode(ModeTarget::Fd(fd), mode))
}

#[no_mangle]
pub unsafe extern "C" fn fchmodat(
    dirfd: c_int,
    path: *const c_char,
    mode: mode_t,
    flags: c_int,
) -> c_int {
    finish(c_path(path).and_then(|path| {
        interceptor().change_mode(ModeTarget::At { dirfd, path, flags }, mode)
    }))
}

// --- chown family ---

#[no_mangle]
pub unsafe extern "C" fn chown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    finish(
        c_path(path)
            .and_then(|p| interceptor().change_owner(OwnerTarget::Path(p), owner, group)),
    )
}

#[no_mangle]
pub unsafe extern "C" fn fchown(fd: c_int, owner: uid_t, group: gid_t) -> c_int {
    finish(interceptor().change_owner(OwnerTarget::Fd(fd), owner, group))
}

#[no_mangle]
pub unsafe extern "C" fn lchown(path: *const c_char, owner: uid_t, group: gid_t) -> c_int {
    finish(
        c_path(path)
            .and_then(|p| interceptor().change_owner(OwnerTarget::Link(p), owner, group)),
    )
}

#[no_mangle]
pub unsafe extern "C" fn fchownat(
    dirfd: c_int,
    path: *const c_char,
    owner: uid_t,
    group: gid_t,
    flags: c_int,
) -> c_int {
    finish(c_path(path).and_then(|path| {
        interceptor().change_owner(OwnerTarget::At { dirfd, path, flags }, owner, group)
    }))
}
