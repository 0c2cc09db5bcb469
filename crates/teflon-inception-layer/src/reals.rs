//! Real Symbol Storage
//!
//! The replacements in `interpose` must reach the next definition of each
//! symbol (normally libc), never themselves. All seven are resolved once with
//! `dlsym(RTLD_NEXT)` and kept in an immutable table.
//!
//! A symbol that cannot be resolved is fatal: the process exits with
//! [`EXIT_UNRESOLVED`] before any replacement can run half-wired.

use std::ffi::CStr;
use std::sync::OnceLock;

use libc::{c_char, c_int, c_void, gid_t, mode_t, uid_t};
use teflon_core::ops::check;
use teflon_core::{FileOps, ModeTarget, OwnerTarget, SysResult};

/// Exit status when a real entry point is missing.
pub const EXIT_UNRESOLVED: c_int = 1;

pub type ChmodFn = unsafe extern "C" fn(*const c_char, mode_t) -> c_int;
pub type FchmodFn = unsafe extern "C" fn(c_int, mode_t) -> c_int;
pub type FchmodatFn = unsafe extern "C" fn(c_int, *const c_char, mode_t, c_int) -> c_int;
pub type ChownFn = unsafe extern "C" fn(*const c_char, uid_t, gid_t) -> c_int;
pub type FchownFn = unsafe extern "C" fn(c_int, uid_t, gid_t) -> c_int;
pub type FchownatFn = unsafe extern "C" fn(c_int, *const c_char, uid_t, gid_t, c_int) -> c_int;

/// Name of a libc function we forward to.
pub struct RealSymbol {
    name: &'static CStr,
}

impl RealSymbol {
    pub const fn new(name: &'static CStr) -> Self {
        Self { name }
    }

    pub fn name(&self) -> &'static CStr {
        self.name
    }

    /// `dlsym(RTLD_NEXT, name)`. A null result or a pending `dlerror()`
    /// both count as unresolved.
    pub unsafe fn resolve(&self) -> Option<*mut c_void> {
        libc::dlerror();
        let f = libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr());
        if f.is_null() || !libc::dlerror().is_null() {
            return None;
        }
        Some(f)
    }
}

pub static REAL_CHMOD: RealSymbol = RealSymbol::new(c"chmod");
pub static REAL_FCHMOD: RealSymbol = RealSymbol::new(c"fchmod");
pub static REAL_FCHMODAT: RealSymbol = RealSymbol::new(c"fchmodat");
pub static REAL_CHOWN: RealSymbol = RealSymbol::new(c"chown");
pub static REAL_FCHOWN: RealSymbol = RealSymbol::new(c"fchown");
pub static REAL_LCHOWN: RealSymbol = RealSymbol::new(c"lchown");
pub static REAL_FCHOWNAT: RealSymbol = RealSymbol::new(c"fchownat");

/// Resolved entry points. Written once, read by every replacement.
pub struct Reals {
    pub chmod: ChmodFn,
    pub fchmod: FchmodFn,
    pub fchmodat: FchmodatFn,
    pub chown: ChownFn,
    pub fchown: FchownFn,
    pub lchown: ChownFn,
    pub fchownat: FchownatFn,
}

static REALS: OnceLock<Reals> = OnceLock::new();

/// The resolved table, resolving on first use.
///
/// Normally the load-time constructor gets here first, but another object's
/// constructor may call chmod before ours has run.
pub fn reals() -> &'static Reals {
    REALS.get_or_init(|| unsafe { Reals::resolve_or_die() })
}

impl Reals {
    unsafe fn resolve_or_die() -> Self {
        Self {
            chmod: std::mem::transmute::<*mut c_void, ChmodFn>(require(&REAL_CHMOD)),
            fchmod: std::mem::transmute::<*mut c_void, FchmodFn>(require(&REAL_FCHMOD)),
            fchmodat: std::mem::transmute::<*mut c_void, FchmodatFn>(require(&REAL_FCHMODAT)),
            chown: std::mem::transmute::<*mut c_void, ChownFn>(require(&REAL_CHOWN)),
            fchown: std::mem::transmute::<*mut c_void, FchownFn>(require(&REAL_FCHOWN)),
            lchown: std::mem::transmute::<*mut c_void, ChownFn>(require(&REAL_LCHOWN)),
            fchownat: std::mem::transmute::<*mut c_void, FchownatFn>(require(&REAL_FCHOWNAT)),
        }
    }
}

unsafe fn require(symbol: &RealSymbol) -> *mut c_void {
    match symbol.resolve() {
        Some(f) => f,
        None => die_unresolved(symbol.name()),
    }
}

fn die_unresolved(name: &CStr) -> ! {
    let parts: [&[u8]; 3] = [
        b"teflon: cannot resolve real ",
        name.to_bytes(),
        b"\n",
    ];
    for part in parts {
        unsafe { libc::write(2, part.as_ptr() as *const c_void, part.len()) };
    }
    unsafe { libc::_exit(EXIT_UNRESOLVED) }
}

impl FileOps for Reals {
    fn chmod(&self, target: ModeTarget<'_>, mode: mode_t) -> SysResult<()> {
        check(unsafe {
            match target {
                ModeTarget::Path(path) => (self.chmod)(path.as_ptr(), mode),
                ModeTarget::Fd(fd) => (self.fchmod)(fd, mode),
                ModeTarget::At { dirfd, path, flags } => {
                    (self.fchmodat)(dirfd, path.as_ptr(), mode, flags)
                }
            }
        })
    }

    fn chown(&self, target: OwnerTarget<'_>, owner: uid_t, group: gid_t) -> SysResult<()> {
        check(unsafe {
            match target {
                OwnerTarget::Path(path) => (self.chown)(path.as_ptr(), owner, group),
                OwnerTarget::Link(path) => (self.lchown)(path.as_ptr(), owner, group),
                OwnerTarget::Fd(fd) => (self.fchown)(fd, owner, group),
                OwnerTarget::At { dirfd, path, flags } => {
                    (self.fchownat)(dirfd, path.as_ptr(), owner, group, flags)
                }
            }
        })
    }
}
