//! Preload list handling.
//!
//! The activation variable (`LD_PRELOAD` / `DYLD_INSERT_LIBRARIES`) is a
//! colon-separated list of shared objects. These functions only compute the
//! new value; reading and writing the environment is the caller's job.
//!
//! Values are handled as raw bytes so paths that are not UTF-8 survive.

use std::ffi::{OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

pub const SEPARATOR: u8 = b':';

/// Put `self_id` in front of the existing list.
///
/// Going first means our `dlsym(RTLD_NEXT)` lookups see the real libc
/// symbols rather than another preloaded object's replacements. Activating
/// twice yields the entry twice; [`deactivate`] removes every copy.
pub fn activate(self_id: &OsStr, existing: Option<&OsStr>) -> OsString {
    let existing = existing.map(OsStr::as_bytes).unwrap_or_default();
    if existing.is_empty() {
        return self_id.to_os_string();
    }

    let mut out = Vec::with_capacity(self_id.len() + 1 + existing.len());
    out.extend_from_slice(self_id.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(existing);
    OsString::from_vec(out)
}

/// Remove every entry whose text contains `marker`, keeping the rest in order.
///
/// Matching is by substring over the whole entry, so an unrelated path that
/// happens to contain the marker is dropped too. Interior empty entries keep
/// their position; trailing empty entries are not re-emitted.
///
/// Returns `None` when nothing is left: the variable should be unset rather
/// than set to an empty string.
pub fn deactivate(marker: &OsStr, existing: Option<&OsStr>) -> Option<OsString> {
    let existing = existing.map(OsStr::as_bytes).unwrap_or_default();
    if existing.is_empty() {
        return None;
    }
    let marker = marker.as_bytes();

    let mut kept: Vec<&[u8]> = existing
        .split(|&b| b == SEPARATOR)
        .filter(|entry| {
            let hit = contains(entry, marker);
            if hit {
                tracing::debug!(
                    component = "PRELOAD",
                    entry = %String::from_utf8_lossy(entry),
                    "dropping preload entry"
                );
            }
            !hit
        })
        .collect();
    while kept.last().is_some_and(|entry| entry.is_empty()) {
        kept.pop();
    }
    if kept.is_empty() {
        return None;
    }

    let out = kept.join(&SEPARATOR);
    // Never longer than the input: we only drop entries and separators.
    debug_assert!(out.len() <= existing.len());
    Some(OsString::from_vec(out))
}

/// True if any entry of `value` contains `marker`.
pub fn is_active(marker: &OsStr, value: Option<&OsStr>) -> bool {
    let marker = marker.as_bytes();
    value
        .map(OsStr::as_bytes)
        .unwrap_or_default()
        .split(|&b| b == SEPARATOR)
        .any(|entry| !entry.is_empty() && contains(entry, marker))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
