//! Validators (C10) — name, path, exclude-pattern, and computer-id checks.
//!
//! Every function here is pure and fails fast, before any side effect:
//! callers run these before touching the filesystem or a shared document.

use std::path::{Component, Path, PathBuf};

use globset::Glob;
use thiserror::Error;

/// All ways a validator can reject its input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name is empty")]
    EmptyName,
    #[error("name exceeds 100 characters")]
    NameTooLong,
    #[error("name contains characters outside [A-Za-z0-9 ._-]: {0:?}")]
    NameInvalidChars(String),
    #[error("name has leading or trailing whitespace: {0:?}")]
    NameWhitespace(String),
    #[error("name contains consecutive spaces: {0:?}")]
    NameConsecutiveSpaces(String),
    #[error("name is a reserved device name: {0:?}")]
    NameReserved(String),

    #[error("path is empty")]
    EmptyPath,
    #[error("path exceeds 4096 characters")]
    PathTooLong,
    #[error("path contains a parent-directory reference (..): {0:?}")]
    PathTraversal(PathBuf),
    #[error("path contains a NUL byte")]
    PathHasNul,
    #[error("path is blocked: {0:?}")]
    PathBlocked(PathBuf),
    #[error("path {0:?} is outside allowed root {1:?}")]
    PathOutsideRoot(PathBuf, PathBuf),
    #[error("path contains a hidden component: {0:?}")]
    PathHidden(PathBuf),
    #[error("path contains a symlink component: {0:?}")]
    PathSymlink(PathBuf),

    #[error("exclude pattern is too broad: {0:?}")]
    PatternTooBroad(String),
    #[error("exclude pattern contains a parent-directory reference: {0:?}")]
    PatternTraversal(String),
    #[error("invalid glob pattern {0:?}: {1}")]
    PatternInvalid(String, String),

    #[error("computer id is empty")]
    EmptyComputerId,
    #[error("computer id exceeds 63 characters")]
    ComputerIdTooLong,
    #[error("computer id does not match hostname grammar: {0:?}")]
    ComputerIdInvalid(String),
}

const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const TOO_BROAD_PATTERNS: &[&str] = &["*", "**", "/", "/*", "/**"];

// ---------------------------------------------------------------------------
// Item names
// ---------------------------------------------------------------------------

/// Validate a sync-item name.
pub fn validate_item_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.len() > 100 {
        return Err(ValidationError::NameTooLong);
    }
    if name.trim() != name {
        return Err(ValidationError::NameWhitespace(name.to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '.' || c == '_' || c == '-')
    {
        return Err(ValidationError::NameInvalidChars(name.to_string()));
    }
    if name.contains("  ") {
        return Err(ValidationError::NameConsecutiveSpaces(name.to_string()));
    }
    if RESERVED_NAMES.contains(&name.to_ascii_uppercase().as_str()) {
        return Err(ValidationError::NameReserved(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Options governing how strict [`validate_path`] is.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    pub blocked_paths: Vec<PathBuf>,
    pub allowed_roots: Vec<PathBuf>,
    pub allow_hidden: bool,
    pub allow_symlink: bool,
}

fn has_parent_dir_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn has_hidden_component(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(segment) => segment
            .to_str()
            .map(|s| s.starts_with('.') && s != "." && s != "..")
            .unwrap_or(false),
        _ => false,
    })
}

fn has_symlink_component(path: &Path) -> bool {
    let mut prefix = PathBuf::new();
    for component in path.components() {
        prefix.push(component);
        if let Ok(meta) = std::fs::symlink_metadata(&prefix) {
            if meta.file_type().is_symlink() {
                return true;
            }
        }
    }
    false
}

/// Validate a filesystem path.
///
/// Checks empty/length/`..`/NUL first (cheap, pure); only then consults the
/// filesystem for symlink components, so callers validating a path that does
/// not exist yet still get the syntactic checks.
pub fn validate_path(path: &Path, policy: &PathPolicy) -> Result<(), ValidationError> {
    if path.as_os_str().is_empty() {
        return Err(ValidationError::EmptyPath);
    }
    let as_str = path.to_string_lossy();
    if as_str.len() > 4096 {
        return Err(ValidationError::PathTooLong);
    }
    if as_str.contains('\0') {
        return Err(ValidationError::PathHasNul);
    }
    if has_parent_dir_component(path) {
        return Err(ValidationError::PathTraversal(path.to_path_buf()));
    }
    for blocked in &policy.blocked_paths {
        if path == blocked {
            return Err(ValidationError::PathBlocked(path.to_path_buf()));
        }
    }
    if !policy.allowed_roots.is_empty() && !policy.allowed_roots.iter().any(|r| path.starts_with(r))
    {
        return Err(ValidationError::PathOutsideRoot(
            path.to_path_buf(),
            policy.allowed_roots[0].clone(),
        ));
    }
    if !policy.allow_hidden && has_hidden_component(path) {
        return Err(ValidationError::PathHidden(path.to_path_buf()));
    }
    if !policy.allow_symlink && has_symlink_component(path) {
        return Err(ValidationError::PathSymlink(path.to_path_buf()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Exclude patterns
// ---------------------------------------------------------------------------

/// Validate an exclude-glob and return a compiled matcher.
pub fn validate_exclude_pattern(pattern: &str) -> Result<Glob, ValidationError> {
    if TOO_BROAD_PATTERNS.contains(&pattern) {
        return Err(ValidationError::PatternTooBroad(pattern.to_string()));
    }
    if pattern.contains("..") {
        return Err(ValidationError::PatternTraversal(pattern.to_string()));
    }
    Glob::new(pattern)
        .map_err(|e| ValidationError::PatternInvalid(pattern.to_string(), e.to_string()))
}

// ---------------------------------------------------------------------------
// Computer id
// ---------------------------------------------------------------------------

fn is_hostname_label(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.is_empty() || bytes.len() > 63 {
        return false;
    }
    let first_ok = bytes[0].is_ascii_alphanumeric();
    let last_ok = bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let middle_ok = bytes
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'-');
    first_ok && last_ok && middle_ok
}

/// Validate a computer-id against the DNS-hostname grammar.
pub fn validate_computer_id(id: &str) -> Result<(), ValidationError> {
    if id.is_empty() {
        return Err(ValidationError::EmptyComputerId);
    }
    if id.len() > 63 {
        return Err(ValidationError::ComputerIdTooLong);
    }
    if !is_hostname_label(id) {
        return Err(ValidationError::ComputerIdInvalid(id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Security sanitizer
// ---------------------------------------------------------------------------

/// Strip control characters (keeping tab/CR/LF), trim whitespace, clamp length.
///
/// Unicode normalization is intentionally a no-op here — it's an optional
/// concern; callers that need NFC can add it at the edge.
pub fn sanitize(input: &str, max_len: usize) -> String {
    let stripped: String = input
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\r' | '\n'))
        .collect();
    let trimmed = stripped.trim();
    trimmed.chars().take(max_len).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
