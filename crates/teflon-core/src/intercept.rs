//! Rewrite policy for the intercepted calls.
//!
//! chmod family: read the current mode first and carry the protected bit
//! over into the requested mode. If that read fails the call fails with the
//! read's errno and the delegate is never invoked.
//!
//! chown family: the group argument is always replaced by
//! [`GROUP_UNCHANGED`]; the owner passes through.
//!
//! Neither path is atomic with respect to other writers of the same file.
//! A concurrent chmod between our stat and our delegate can make us re-apply
//! a protected bit that is one write stale, which never hands the bit to
//! the intercepted caller.

use libc::{gid_t, mode_t, uid_t};

use crate::mode::{preserve_protected_bit, GROUP_UNCHANGED};
use crate::ops::{FileOps, ModeTarget, OwnerTarget, SysResult};

pub struct Interceptor<O> {
    ops: O,
}

impl<O: FileOps> Interceptor<O> {
    pub const fn new(ops: O) -> Self {
        Self { ops }
    }

    /// chmod / fchmod / fchmodat
    pub fn change_mode(&self, target: ModeTarget<'_>, mode: mode_t) -> SysResult<()> {
        let current = self.ops.stat(target)?;
        self.ops.chmod(target, preserve_protected_bit(current, mode))
    }

    /// chown / fchown / lchown / fchownat
    pub fn change_owner(
        &self,
        target: OwnerTarget<'_>,
        owner: uid_t,
        _group: gid_t,
    ) -> SysResult<()> {
        self.ops.chown(target, owner, GROUP_UNCHANGED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::PROTECTED_BIT;
    use nix::errno::Errno;
    use std::cell::RefCell;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Shape {
        Path,
        Link,
        Fd,
        At,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        Stat(Shape),
        Chmod(Shape, mode_t),
        Chown(Shape, uid_t, gid_t),
    }

    fn mode_shape(t: &ModeTarget<'_>) -> Shape {
        match t {
            ModeTarget::Path(_) => Shape::Path,
            ModeTarget::Fd(_) => Shape::Fd,
            ModeTarget::At { .. } => Shape::At,
        }
    }

    fn owner_shape(t: &OwnerTarget<'_>) -> Shape {
        match t {
            OwnerTarget::Path(_) => Shape::Path,
            OwnerTarget::Link(_) => Shape::Link,
            OwnerTarget::Fd(_) => Shape::Fd,
            OwnerTarget::At { .. } => Shape::At,
        }
    }

    /// Records every call; stat and delegate outcomes are scripted.
    struct MockOps {
        current: SysResult<mode_t>,
        delegate: SysResult<()>,
        calls: RefCell<Vec<Call>>,
    }

    impl MockOps {
        fn new(current: SysResult<mode_t>) -> Self {
            Self {
                current,
                delegate: Ok(()),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn failing_delegate(mut self, e: Errno) -> Self {
            self.delegate = Err(e);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    impl FileOps for MockOps {
        fn stat(&self, target: ModeTarget<'_>) -> SysResult<mode_t> {
            self.calls.borrow_mut().push(Call::Stat(mode_shape(&target)));
            self.current
        }

        fn chmod(&self, target: ModeTarget<'_>, mode: mode_t) -> SysResult<()> {
            self.calls
                .borrow_mut()
                .push(Call::Chmod(mode_shape(&target), mode));
            self.delegate
        }

        fn chown(&self, target: OwnerTarget<'_>, owner: uid_t, group: gid_t) -> SysResult<()> {
            self.calls
                .borrow_mut()
                .push(Call::Chown(owner_shape(&target), owner, group));
            self.delegate
        }
    }

    const PATH: &std::ffi::CStr = c"/srv/shared/file";

    fn mode_targets() -> [ModeTarget<'static>; 3] {
        [
            ModeTarget::Path(PATH),
            ModeTarget::Fd(7),
            ModeTarget::At {
                dirfd: libc::AT_FDCWD,
                path: PATH,
                flags: libc::AT_SYMLINK_NOFOLLOW,
            },
        ]
    }

    #[test]
    fn test_existing_bit_survives_clearing_request() {
        for target in mode_targets() {
            let ops = MockOps::new(Ok(libc::S_IFREG | PROTECTED_BIT | 0o770));
            let guard = Interceptor::new(&ops);

            guard.change_mode(target, 0o644).unwrap();

            let shape = mode_shape(&target);
            assert_eq!(
                ops.calls(),
                vec![
                    Call::Stat(shape),
                    Call::Chmod(shape, PROTECTED_BIT | 0o644)
                ]
            );
        }
    }

    #[test]
    fn test_bit_cannot_be_gained() {
        for target in mode_targets() {
            let ops = MockOps::new(Ok(libc::S_IFDIR | 0o755));
            let guard = Interceptor::new(&ops);

            guard.change_mode(target, PROTECTED_BIT | 0o775).unwrap();

            assert_eq!(
                ops.calls().last(),
                Some(&Call::Chmod(mode_shape(&target), 0o775))
            );
        }
    }

    #[test]
    fn test_stat_failure_fails_closed() {
        for target in mode_targets() {
            let ops = MockOps::new(Err(Errno::ENOENT));
            let guard = Interceptor::new(&ops);

            assert_eq!(guard.change_mode(target, 0o600), Err(Errno::ENOENT));
            // Delegate never reached
            assert_eq!(ops.calls(), vec![Call::Stat(mode_shape(&target))]);
        }
    }

    #[test]
    fn test_delegate_error_is_verbatim() {
        let ops = MockOps::new(Ok(libc::S_IFREG | 0o644)).failing_delegate(Errno::EPERM);
        let guard = Interceptor::new(&ops);

        assert_eq!(
            guard.change_mode(ModeTarget::Path(PATH), 0o600),
            Err(Errno::EPERM)
        );
    }

    #[test]
    fn test_group_is_always_unchanged() {
        let targets = [
            OwnerTarget::Path(PATH),
            OwnerTarget::Link(PATH),
            OwnerTarget::Fd(3),
            OwnerTarget::At {
                dirfd: 5,
                path: PATH,
                flags: 0,
            },
        ];
        for target in targets {
            for group in [0, 100, GROUP_UNCHANGED] {
                let ops = MockOps::new(Err(Errno::EIO));
                let guard = Interceptor::new(&ops);

                guard.change_owner(target, 1000, group).unwrap();

                // No stat is needed for ownership changes
                assert_eq!(
                    ops.calls(),
                    vec![Call::Chown(owner_shape(&target), 1000, GROUP_UNCHANGED)]
                );
            }
        }
    }

    #[test]
    fn test_owner_unchanged_sentinel_passes_through() {
        let ops = MockOps::new(Ok(0));
        let guard = Interceptor::new(&ops);

        guard
            .change_owner(OwnerTarget::Path(PATH), uid_t::MAX, 0)
            .unwrap();

        assert_eq!(
            ops.calls(),
            vec![Call::Chown(Shape::Path, uid_t::MAX, GROUP_UNCHANGED)]
        );
    }

    #[test]
    fn test_chown_delegate_error_is_verbatim() {
        let ops = MockOps::new(Ok(0)).failing_delegate(Errno::EROFS);
        let guard = Interceptor::new(&ops);

        assert_eq!(
            guard.change_owner(OwnerTarget::Fd(4), 0, 0),
            Err(Errno::EROFS)
        );
    }
}
