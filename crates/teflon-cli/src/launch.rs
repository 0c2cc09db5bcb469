//! # Launch Commands
//!
//! - `teflon run -- PROG ARGS..`   - exec PROG with the inception layer preloaded
//! - `teflon unwrap -- PROG ARGS..` - exec PROG with every teflon entry removed
//! - `teflon env [--unwrap]`      - print shell code for `eval`
//!
//! The preload value is computed once from the current environment, set on
//! the child and handed to exec. Nothing else in this process changes.

use std::env;
use std::ffi::{CStr, OsStr, OsString};
use std::io::Write;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use console::{style, Emoji};
use teflon_config::{log_cli_debug, log_cli_info, log_cli_warn, log_preload_debug, PRELOAD_VAR};
use teflon_core::preload;

static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");

/// Exit status when the target program cannot be started.
pub const EXIT_EXEC_FAILED: i32 = 2;

/// What to do with the preload variable in the child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preload {
    Set(OsString),
    Unset,
}

impl Preload {
    fn from_value(value: Option<OsString>) -> Self {
        match value {
            Some(v) => Preload::Set(v),
            None => Preload::Unset,
        }
    }
}

/// Preload value with `library` in front of `current`.
pub fn activation(library: &Path, current: Option<&OsStr>) -> Preload {
    let shown = library.display().to_string();
    log_preload_debug!("Prepending inception layer", library = shown.as_str());
    Preload::Set(preload::activate(library.as_os_str(), current))
}

/// Preload value with every entry containing `marker` removed from `current`.
pub fn deactivation(marker: &str, current: Option<&OsStr>) -> Preload {
    log_preload_debug!("Removing marked entries", marker = marker);
    Preload::from_value(preload::deactivate(OsStr::new(marker), current))
}

/// True if `unwrap` with `marker` would find `library` again.
pub fn is_marked(library: &Path, marker: &str) -> bool {
    preload::is_active(OsStr::new(marker), Some(library.as_os_str()))
}

fn warn_if_unmarked(library: &Path, marker: &str) {
    if !is_marked(library, marker) {
        let shown = library.display().to_string();
        log_cli_warn!(
            "Inception layer path does not contain the marker; `teflon unwrap` will not remove it",
            library = shown.as_str(),
            marker = marker,
        );
    }
}

/// Run `command` with the inception layer active.
pub fn cmd_run(library: &Path, marker: &str, command: &[OsString]) -> Result<()> {
    warn_if_unmarked(library, marker);
    let current = env::var_os(PRELOAD_VAR);
    if preload::is_active(OsStr::new(marker), current.as_deref()) {
        log_cli_debug!("Inception layer already in the preload list; adding it again");
    }
    exec(command, &activation(library, current.as_deref()), true)
}

/// Run `command` with the inception layer removed.
pub fn cmd_unwrap(marker: &str, command: &[OsString]) -> Result<()> {
    let current = env::var_os(PRELOAD_VAR);
    if !preload::is_active(OsStr::new(marker), current.as_deref()) {
        log_cli_info!("Inception layer not active; running unchanged", marker = marker);
    }
    exec(command, &deactivation(marker, current.as_deref()), false)
}

/// Print an `export` line for `eval "$(teflon env)"`.
pub fn cmd_env(library: &Path, marker: &str) -> Result<()> {
    warn_if_unmarked(library, marker);
    let current = env::var_os(PRELOAD_VAR);
    if preload::is_active(OsStr::new(marker), current.as_deref()) {
        eprintln!(
            "{}{}",
            WARN,
            style("teflon is already active; this adds a second entry.").yellow()
        );
    }
    print_script(&shell_script(&activation(library, current.as_deref()), true))
}

/// Print the line that removes teflon, for `eval "$(teflon env --unwrap)"`.
pub fn cmd_env_unwrap(marker: &str) -> Result<()> {
    let current = env::var_os(PRELOAD_VAR);
    print_script(&shell_script(&deactivation(marker, current.as_deref()), false))
}

fn print_script(script: &[u8]) -> Result<()> {
    std::io::stdout()
        .write_all(script)
        .context("write shell script")
}

/// Shell code applying `preload`. Values are single-quoted byte-for-byte.
pub fn shell_script(preload: &Preload, activating: bool) -> Vec<u8> {
    let mut out = Vec::new();
    match preload {
        Preload::Set(value) => {
            out.extend_from_slice(b"export ");
            out.extend_from_slice(PRELOAD_VAR.as_bytes());
            out.push(b'=');
            push_single_quoted(&mut out, value.as_bytes());
            out.push(b'\n');
        }
        Preload::Unset => {
            out.extend_from_slice(b"unset ");
            out.extend_from_slice(PRELOAD_VAR.as_bytes());
            out.push(b'\n');
        }
    }
    if cfg!(target_os = "macos") && activating {
        out.extend_from_slice(b"export DYLD_FORCE_FLAT_NAMESPACE=1\n");
    }
    out
}

fn push_single_quoted(out: &mut Vec<u8>, value: &[u8]) {
    out.push(b'\'');
    for &b in value {
        if b == b'\'' {
            out.extend_from_slice(b"'\\''");
        } else {
            out.push(b);
        }
    }
    out.push(b'\'');
}

/// Replace this process with `command`. Returns only on bad input; an exec
/// failure is reported and exits with [`EXIT_EXEC_FAILED`].
fn exec(command: &[OsString], preload: &Preload, activating: bool) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        anyhow::bail!("No command specified");
    };

    let mut cmd = Command::new(program);
    cmd.args(args);
    match preload {
        Preload::Set(value) => {
            cmd.env(PRELOAD_VAR, value);
        }
        Preload::Unset => {
            cmd.env_remove(PRELOAD_VAR);
        }
    }
    // Plain symbol definitions only interpose under a flat namespace on macOS
    if cfg!(target_os = "macos") && activating {
        cmd.env("DYLD_FORCE_FLAT_NAMESPACE", "1");
    }

    let shown = program.to_string_lossy();
    let preload_shown = format!("{preload:?}");
    log_cli_info!(
        "Launching",
        program = &*shown,
        preload = preload_shown.as_str(),
        protected = teflon_core::mode::protected_bit_name(),
    );

    // execvp semantics: PATH search, argv[0] = program
    let err = cmd.exec();

    let code = err.raw_os_error().unwrap_or(0);
    let me = env::args_os()
        .next()
        .map(|a| a.to_string_lossy().into_owned())
        .unwrap_or_else(|| "teflon".to_string());
    eprintln!(
        "{} FAILED: could not exec {} ({}: {})",
        me,
        shown,
        code,
        strerror(code)
    );
    std::process::exit(EXIT_EXEC_FAILED);
}

fn strerror(code: i32) -> String {
    // SAFETY: strerror returns a valid NUL-terminated string for any code
    unsafe { CStr::from_ptr(libc::strerror(code)) }
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_prepends_library() {
        let p = activation(Path::new("/opt/libteflon.so"), Some(OsStr::new("/a.so")));
        assert_eq!(p, Preload::Set(OsString::from("/opt/libteflon.so:/a.so")));
    }

    #[test]
    fn test_deactivation_of_only_entry_unsets() {
        let p = deactivation("teflon", Some(OsStr::new("/opt/libteflon.so")));
        assert_eq!(p, Preload::Unset);
    }

    #[test]
    fn test_is_marked() {
        assert!(is_marked(Path::new("/opt/libteflon_inception_layer.so"), "teflon"));
        assert!(!is_marked(Path::new("/opt/libshield.so"), "teflon"));
    }

    #[test]
    fn test_shell_script_export() {
        let script = shell_script(&Preload::Set(OsString::from("/a b.so:/c.so")), false);
        assert_eq!(
            String::from_utf8(script).unwrap(),
            format!("export {}='/a b.so:/c.so'\n", PRELOAD_VAR)
        );
    }

    #[test]
    fn test_shell_script_unset() {
        let script = shell_script(&Preload::Unset, false);
        assert_eq!(
            String::from_utf8(script).unwrap(),
            format!("unset {}\n", PRELOAD_VAR)
        );
    }

    #[test]
    fn test_single_quote_escaping() {
        let mut out = Vec::new();
        push_single_quoted(&mut out, b"it's");
        assert_eq!(out, b"'it'\\''s'");
    }

    #[test]
    fn test_strerror() {
        assert!(!strerror(libc::ENOENT).is_empty());
    }
}
