//! External tool discovery
//!
//! A universe shells out to a virtual switch and, through its VM
//! collaborators, to the QEMU runtime and image utility. All of them are
//! verified before any resource is allocated so a missing binary never
//! leaves a half-built universe behind.

use crate::error::{Error, Result};
use nix::errno::Errno;
use nix::unistd::{AccessFlags, access};
use std::env;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tools a universe needs by default
pub const DEFAULT_TOOLS: &[&str] = &["vde_switch", "qemu-system-x86_64", "qemu-img"];

/// Verify that every tool resolves to an executable
///
/// Missing tools are collected so the error names all of them. Any other
/// failure while resolving a tool is returned immediately.
pub fn check_tools<S: AsRef<str>>(tools: &[S]) -> Result<()> {
    let mut missing = Vec::new();

    for tool in tools {
        let tool = tool.as_ref();
        match look_path(tool) {
            Ok(path) => debug!(tool, path = %path.display(), "found required tool"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => missing.push(tool.to_string()),
            Err(e) => return Err(Error::Io(e)),
        }
    }

    if !missing.is_empty() {
        return Err(Error::MissingDependency(missing));
    }
    Ok(())
}

/// Resolve a tool name to the path of an executable
///
/// Names containing a slash are checked as given. Bare names are searched
/// for in each absolute `PATH` entry; entries that fail for any reason are
/// skipped, and an unset `PATH` finds nothing.
pub fn look_path(tool: &str) -> io::Result<PathBuf> {
    if tool.contains('/') {
        let path = Path::new(tool);
        check_executable(path)?;
        return Ok(path.to_path_buf());
    }

    let search = env::var_os("PATH").unwrap_or_default();
    look_path_in(tool, &search)
}

fn look_path_in(tool: &str, search: &OsStr) -> io::Result<PathBuf> {
    for dir in env::split_paths(search) {
        // Empty and relative entries would resolve against the current
        // directory
        if !dir.is_absolute() {
            continue;
        }
        let candidate = dir.join(tool);
        if check_executable(&candidate).is_ok() {
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("executable file '{}' not found in PATH", tool),
    ))
}

fn check_executable(path: &Path) -> io::Result<()> {
    let meta = path.metadata()?;
    if meta.is_dir() {
        return Err(io::Error::from(Errno::EACCES));
    }
    access(path, AccessFlags::X_OK).map_err(io::Error::from)
}
