//! Locating the inception layer on disk.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use teflon_config::{log_cli_debug, LIBRARY_FILE};

/// Find the shared object to preload.
///
/// An explicit path (flag, env or config) wins, but must name an existing
/// file: the dynamic loader skips a missing preload entry with only a
/// warning, and the child would run unprotected. Otherwise look next to the
/// executable, in `../lib/`, then in the cargo target directories.
pub fn find_inception_layer(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.is_file() {
            anyhow::bail!(
                "Inception layer {} does not exist or is not a file; refusing to run unprotected",
                path.display()
            );
        }
        return path
            .canonicalize()
            .with_context(|| format!("resolve {}", path.display()));
    }

    for candidate in candidates() {
        let shown = candidate.display().to_string();
        log_cli_debug!("Probing for inception layer", path = shown.as_str());
        if candidate.is_file() {
            return candidate
                .canonicalize()
                .with_context(|| format!("resolve {}", candidate.display()));
        }
    }

    anyhow::bail!(
        "Could not find {}. Please run 'cargo build -p teflon-inception-layer' first, \
         or point TEFLON_LIBRARY at it.",
        LIBRARY_FILE
    )
}

fn candidates() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(exe_path) = env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            // Same directory as the teflon binary
            out.push(exe_dir.join(LIBRARY_FILE));
            // ../lib/ relative to bin/
            if let Some(prefix) = exe_dir.parent() {
                out.push(prefix.join("lib").join(LIBRARY_FILE));
            }
        }
    }
    // Development mode
    out.push(Path::new("target/debug").join(LIBRARY_FILE));
    out.push(Path::new("target/release").join(LIBRARY_FILE));
    out
}
