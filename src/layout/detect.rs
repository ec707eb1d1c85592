//! Locating a ComfyUI installation on disk.
//!
//! A directory counts as a ComfyUI installation when it holds `main.py` or a
//! `comfy/` package directory. Search order:
//!
//! 1. the explicitly supplied path,
//! 2. well-known locations relative to the working directory,
//! 3. the sandbox path cached in `state/server-state.json`.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// Locations probed relative to the working directory, most likely first.
pub const CANDIDATE_PATHS: [&str; 6] = [
    "ComfyUI",
    "comfyui",
    "sandbox/ComfyUI",
    "sandbox/comfyui",
    "../ComfyUI",
    "../../ComfyUI",
];

/// Server state file, relative to the working directory.
const SERVER_STATE_FILE: &str = "state/server-state.json";

/// JSON pointer to the cached installation path inside the server state.
const SERVER_STATE_POINTER: &str = "/snapshots/0/data/configuration/sandboxPath";

/// Shape of a detected installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationKind {
    /// `main.py` and `comfy/` both present.
    Standard,
    /// Only `main.py` present.
    Portable,
    /// Only `comfy/` present.
    Unknown,
}

impl fmt::Display for InstallationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Standard => "standard",
            Self::Portable => "portable",
            Self::Unknown => "unknown",
        })
    }
}

/// How an installation was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectionMethod {
    /// The caller named the path.
    Explicit,
    /// One of [`CANDIDATE_PATHS`] matched.
    Candidate(&'static str),
    /// Read from the server state cache.
    ServerStateCache,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit path"),
            Self::Candidate(pattern) => write!(f, "auto-detection: {pattern}"),
            Self::ServerStateCache => f.write_str("server-state cache"),
        }
    }
}

/// A ComfyUI installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Installation root.
    pub root: PathBuf,
    /// `root/models`.
    pub models_dir: PathBuf,
    /// Installation shape.
    pub kind: InstallationKind,
    /// How it was found.
    pub method: DetectionMethod,
}

/// Returns the installation kind if `path` looks like ComfyUI.
#[must_use]
pub fn inspect_path(path: &Path) -> Option<InstallationKind> {
    if !path.is_dir() {
        return None;
    }
    let has_main = path.join("main.py").is_file();
    let has_package = path.join("comfy").is_dir();
    match (has_main, has_package) {
        (true, true) => Some(InstallationKind::Standard),
        (true, false) => Some(InstallationKind::Portable),
        (false, true) => Some(InstallationKind::Unknown),
        (false, false) => None,
    }
}

/// Detects an installation starting from the process working directory.
#[must_use]
pub fn detect_installation(explicit: Option<&Path>) -> Option<Installation> {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(e) => {
            warn!(error = %e, "cannot read working directory; only the explicit path is checked");
            return explicit.and_then(|path| installation_at(path, DetectionMethod::Explicit));
        }
    };
    detect_from(&cwd, explicit)
}

/// Detects an installation, resolving relative candidates against `cwd`.
#[must_use]
pub fn detect_from(cwd: &Path, explicit: Option<&Path>) -> Option<Installation> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        if let Some(found) = installation_at(&path, DetectionMethod::Explicit) {
            return Some(found);
        }
        warn!(path = %path.display(), "explicit ComfyUI path is not an installation; auto-detecting");
    }

    for pattern in CANDIDATE_PATHS {
        if let Some(found) = installation_at(&cwd.join(pattern), DetectionMethod::Candidate(pattern))
        {
            return Some(found);
        }
    }

    let cached = cached_server_path(cwd)
        .and_then(|path| installation_at(&path, DetectionMethod::ServerStateCache));
    if cached.is_none() {
        debug!(cwd = %cwd.display(), "no ComfyUI installation found");
    }
    cached
}

fn installation_at(path: &Path, method: DetectionMethod) -> Option<Installation> {
    let kind = inspect_path(path)?;
    info!(path = %path.display(), %kind, %method, "found ComfyUI installation");
    Some(Installation {
        root: path.to_path_buf(),
        models_dir: path.join("models"),
        kind,
        method,
    })
}

/// Reads the cached installation path from the server state file, if any.
fn cached_server_path(cwd: &Path) -> Option<PathBuf> {
    let state_path = cwd.join(SERVER_STATE_FILE);
    let raw = std::fs::read_to_string(&state_path).ok()?;
    let state: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(state) => state,
        Err(e) => {
            debug!(path = %state_path.display(), error = %e, "ignoring unreadable server state");
            return None;
        }
    };
    state
        .pointer(SERVER_STATE_POINTER)
        .and_then(serde_json::Value::as_str)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}
