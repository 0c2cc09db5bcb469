//! Adapter between the rewrite policy and the platform.
//!
//! The policy in [`crate::intercept`] only ever talks to a [`FileOps`]. The
//! inception layer implements it with the real libc entry points found via
//! `dlsym(RTLD_NEXT)`; tests implement it with plain libc calls or mocks.

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::os::fd::RawFd;

use libc::{c_int, gid_t, mode_t, uid_t};
use nix::errno::Errno;

/// Result of a file-metadata call: errno is the error contract.
pub type SysResult<T> = Result<T, Errno>;

/// File addressed by a chmod-family call (and by its matching stat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTarget<'a> {
    /// `chmod(path, ..)` / `stat(path, ..)`
    Path(&'a CStr),
    /// `fchmod(fd, ..)` / `fstat(fd, ..)`
    Fd(RawFd),
    /// `fchmodat(dirfd, path, .., flags)` / `fstatat(dirfd, path, .., flags)`
    At {
        dirfd: RawFd,
        path: &'a CStr,
        flags: c_int,
    },
}

/// File addressed by a chown-family call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerTarget<'a> {
    /// `chown(path, ..)`, follows symlinks
    Path(&'a CStr),
    /// `lchown(path, ..)`, acts on the link itself
    Link(&'a CStr),
    /// `fchown(fd, ..)`
    Fd(RawFd),
    /// `fchownat(dirfd, path, .., flags)`
    At {
        dirfd: RawFd,
        path: &'a CStr,
        flags: c_int,
    },
}

/// The operations the policy needs from the platform.
pub trait FileOps {
    /// Current `st_mode` of the target.
    fn stat(&self, target: ModeTarget<'_>) -> SysResult<mode_t> {
        stat_mode(target)
    }

    fn chmod(&self, target: ModeTarget<'_>, mode: mode_t) -> SysResult<()>;

    fn chown(&self, target: OwnerTarget<'_>, owner: uid_t, group: gid_t) -> SysResult<()>;
}

impl<T: FileOps + ?Sized> FileOps for &T {
    fn stat(&self, target: ModeTarget<'_>) -> SysResult<mode_t> {
        (**self).stat(target)
    }

    fn chmod(&self, target: ModeTarget<'_>, mode: mode_t) -> SysResult<()> {
        (**self).chmod(target, mode)
    }

    fn chown(&self, target: OwnerTarget<'_>, owner: uid_t, group: gid_t) -> SysResult<()> {
        (**self).chown(target, owner, group)
    }
}

/// Read `st_mode` with the stat variant matching the call shape.
///
/// The stat family is never interposed, so libc is called directly.
pub fn stat_mode(target: ModeTarget<'_>) -> SysResult<mode_t> {
    let mut buf = MaybeUninit::<libc::stat>::uninit();
    let ret = unsafe {
        match target {
            ModeTarget::Path(path) => libc::stat(path.as_ptr(), buf.as_mut_ptr()),
            ModeTarget::Fd(fd) => libc::fstat(fd, buf.as_mut_ptr()),
            ModeTarget::At { dirfd, path, flags } => {
                libc::fstatat(dirfd, path.as_ptr(), buf.as_mut_ptr(), flags)
            }
        }
    };
    Errno::result(ret)?;
    // SAFETY: a zero return means the kernel filled the whole buffer
    Ok(unsafe { buf.assume_init() }.st_mode)
}

/// Map a C-style `0 / -1 + errno` return into a [`SysResult`].
#[inline]
pub fn check(ret: c_int) -> SysResult<()> {
    Errno::result(ret).map(drop)
}
