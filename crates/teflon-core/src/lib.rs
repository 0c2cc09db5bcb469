//! # teflon-core
//!
//! Policy side of teflon: keep a program from setting the setgid (or sticky)
//! bit and from changing group ownership.
//!
//! - [`mode`]: which bit is protected and how a requested mode is rewritten
//! - [`ops`]: the adapter trait the policy delegates through
//! - [`intercept`]: the rewrite policy for chmod-family and chown-family calls
//! - [`preload`]: building and stripping the preload activation list
//!
//! Nothing here touches the dynamic loader; `teflon-inception-layer` wires
//! [`intercept::Interceptor`] to the real libc entry points.

pub mod intercept;
pub mod mode;
pub mod ops;
pub mod preload;

pub use intercept::Interceptor;
pub use mode::{preserve_protected_bit, GROUP_UNCHANGED, PROTECTED_BIT};
pub use ops::{FileOps, ModeTarget, OwnerTarget, SysResult};
