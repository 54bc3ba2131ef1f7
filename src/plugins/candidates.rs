//! Candidate enumeration — maps plugin names to binaries on the search roots.
//!
//! A candidate is any existing, executable file matching the naming
//! convention. Nothing here runs a binary; validation happens in the probe.
//! Files that exist but are not executable are not plugins by convention and
//! are skipped silently.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;

use super::NAME_PREFIX;

/// Executable-suffix variants tried within one root, in tie-break order:
/// the unsuffixed binary always beats the suffixed one.
#[cfg(windows)]
const EXE_SUFFIXES: &[&str] = &["", ".exe"];
#[cfg(not(windows))]
const EXE_SUFFIXES: &[&str] = &[""];

/// A plugin binary that matches the naming convention but has not been
/// validated yet. Produced per discovery pass, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginCandidate {
    pub name: String,
    pub path: PathBuf,
    pub search_root: PathBuf,
}

/// Plugin names are a strict token: lowercase alphanumeric with interior
/// dashes, never starting with a dash.
pub fn valid_plugin_name(name: &str) -> bool {
    Regex::new(r"^[a-z0-9][a-z0-9-]*$")
        .expect("plugin name pattern is a valid regex")
        .is_match(name)
}

/// Candidate binaries for `base_name`, in precedence order: search roots
/// first, suffix variants within a root second. Does not deduplicate; the
/// registry applies first-success-wins on this ordering.
pub fn find_candidates(search_roots: &[PathBuf], base_name: &str) -> Vec<PluginCandidate> {
    candidates_with_suffixes(search_roots, base_name, EXE_SUFFIXES)
}

fn candidates_with_suffixes(
    search_roots: &[PathBuf],
    base_name: &str,
    suffixes: &[&str],
) -> Vec<PluginCandidate> {
    let mut candidates = Vec::new();
    for root in search_roots {
        for suffix in suffixes {
            let path = root.join(format!("{NAME_PREFIX}{base_name}{suffix}"));
            if is_executable_file(&path) {
                candidates.push(PluginCandidate {
                    name: base_name.to_string(),
                    path,
                    search_root: root.clone(),
                });
            }
        }
    }
    candidates
}

/// Every plugin name implied by filenames across all roots. `BTreeSet` fixes
/// the cross-name iteration order for deterministic discovery.
pub fn scan_names(search_roots: &[PathBuf]) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for root in search_roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            // A missing or unreadable root is not an error.
            continue;
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let Some(rest) = file_name.strip_prefix(NAME_PREFIX) else {
                continue;
            };
            let mut name = rest;
            for suffix in EXE_SUFFIXES {
                if suffix.is_empty() {
                    continue;
                }
                if let Some(stripped) = name.strip_suffix(suffix) {
                    name = stripped;
                    break;
                }
            }
            if !valid_plugin_name(name) {
                continue;
            }
            if !is_executable_file(&entry.path()) {
                continue;
            }
            names.insert(name.to_string());
        }
    }
    names
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
