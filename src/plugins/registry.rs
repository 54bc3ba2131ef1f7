//! Discovery — builds the per-dispatch registry snapshot.
//!
//! The snapshot is rebuilt on every dispatch and passed explicitly; there is
//! no process-wide registry. Probes run concurrently under a semaphore bound,
//! but results are collected into per-candidate slots first and precedence is
//! applied afterwards, so probe completion timing never affects which
//! candidate wins a name.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use super::candidates::{PluginCandidate, find_candidates, scan_names};
use super::metadata::PluginMetadata;
use super::probe::probe;

/// Cap on concurrently running metadata probes.
const MAX_CONCURRENT_PROBES: usize = 8;

/// The authoritative record for one plugin name.
#[derive(Debug, Clone)]
pub struct PluginSpec {
    pub name: String,
    pub path: PathBuf,
    pub search_root: PathBuf,
    /// Present only after a successful probe.
    pub metadata: Option<PluginMetadata>,
    pub status: PluginStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginStatus {
    Valid,
    Invalid(String),
}

impl PluginSpec {
    pub fn is_valid(&self) -> bool {
        matches!(self.status, PluginStatus::Valid)
    }

    /// Human-readable failure reason, if any.
    pub fn invalid_reason(&self) -> Option<&str> {
        match &self.status {
            PluginStatus::Valid => None,
            PluginStatus::Invalid(reason) => Some(reason),
        }
    }
}

/// Non-authoritative discovery records, kept for the listing and never
/// offered for execution.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// Candidate lost to a higher-priority candidate for the same name.
    Shadowed {
        name: String,
        path: PathBuf,
        winner: PathBuf,
    },
    /// Candidate was probed and failed, but did not become the name's
    /// authoritative record.
    Failed {
        name: String,
        path: PathBuf,
        reason: String,
    },
}

impl Diagnostic {
    /// Plugin name the record belongs to.
    pub fn name(&self) -> &str {
        match self {
            Diagnostic::Shadowed { name, .. } | Diagnostic::Failed { name, .. } => name,
        }
    }
}

/// One authoritative [`PluginSpec`] per name, alphabetically ordered, plus
/// the diagnostics gathered while building it.
#[derive(Debug, Default)]
pub struct RegistrySnapshot {
    plugins: BTreeMap<String, PluginSpec>,
    diagnostics: Vec<Diagnostic>,
}

impl RegistrySnapshot {
    /// The invokable spec for `name`, if any. Invalid entries are never
    /// returned here; built-in fallback continues on `None`.
    pub fn resolve(&self, name: &str) -> Option<&PluginSpec> {
        self.plugins.get(name).filter(|spec| spec.is_valid())
    }

    pub fn plugins(&self) -> impl Iterator<Item = &PluginSpec> {
        self.plugins.values()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Discover every plugin on the search roots.
///
/// Precedence is deterministic: names in alphabetic order, candidates for a
/// name in root-priority order (suffix tie-break within a root), first
/// successful probe wins. A name colliding with a built-in command is never
/// probed and never invokable.
pub async fn discover(
    search_roots: &[PathBuf],
    builtins: &[String],
    first_party_allow: &[String],
    probe_timeout: Duration,
) -> RegistrySnapshot {
    let names = scan_names(search_roots);

    let mut candidate_map: BTreeMap<String, Vec<PluginCandidate>> = BTreeMap::new();
    for name in &names {
        let candidates = find_candidates(search_roots, name);
        if !candidates.is_empty() {
            candidate_map.insert(name.clone(), candidates);
        }
    }

    // Probe every candidate of every non-builtin name, bounded by the
    // semaphore. Results land in (name, index) slots.
    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_PROBES));
    let allow: Arc<Vec<String>> = Arc::new(first_party_allow.to_vec());
    let mut join_set = JoinSet::new();
    for (name, candidates) in &candidate_map {
        if builtins.iter().any(|b| b == name) {
            continue;
        }
        for (idx, candidate) in candidates.iter().enumerate() {
            let semaphore = semaphore.clone();
            let allow = allow.clone();
            let candidate = candidate.clone();
            let name = name.clone();
            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (name, idx, Err("probe pool closed".to_string()));
                };
                let result = probe(&candidate, probe_timeout, &allow).await;
                (name, idx, result.map_err(|e| e.to_string()))
            });
        }
    }

    let mut slots: BTreeMap<(String, usize), Result<PluginMetadata, String>> = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
        // A panicked probe task just leaves its slot empty.
        if let Ok((name, idx, result)) = joined {
            slots.insert((name, idx), result);
        }
    }

    // Deterministic assembly: precedence comes from candidate order alone.
    let mut snapshot = RegistrySnapshot::default();
    for (name, candidates) in candidate_map {
        if builtins.iter().any(|b| b == &name) {
            debug!(plugin = %name, "plugin shadows a built-in command");
            let winner = &candidates[0];
            for extra in &candidates[1..] {
                snapshot.diagnostics.push(Diagnostic::Shadowed {
                    name: name.clone(),
                    path: extra.path.clone(),
                    winner: winner.path.clone(),
                });
            }
            let spec = PluginSpec {
                name: name.clone(),
                path: winner.path.clone(),
                search_root: winner.search_root.clone(),
                metadata: None,
                status: PluginStatus::Invalid("shadows a built-in command".to_string()),
            };
            snapshot.plugins.insert(name, spec);
            continue;
        }

        let mut results: Vec<Option<Result<PluginMetadata, String>>> = (0..candidates.len())
            .map(|idx| slots.remove(&(name.clone(), idx)))
            .collect();

        let winner_idx = results.iter().position(|r| matches!(r, Some(Ok(_))));

        match winner_idx {
            Some(w) => {
                for (candidate, result) in candidates.iter().zip(results.iter()).take(w) {
                    snapshot.diagnostics.push(Diagnostic::Failed {
                        name: name.clone(),
                        path: candidate.path.clone(),
                        reason: failure_reason(result),
                    });
                }
                for candidate in &candidates[w + 1..] {
                    snapshot.diagnostics.push(Diagnostic::Shadowed {
                        name: name.clone(),
                        path: candidate.path.clone(),
                        winner: candidates[w].path.clone(),
                    });
                }
                let metadata = match results[w].take() {
                    Some(Ok(metadata)) => metadata,
                    _ => continue,
                };
                let winner = &candidates[w];
                debug!(plugin = %name, path = %winner.path.display(), "plugin validated");
                let spec = PluginSpec {
                    name: name.clone(),
                    path: winner.path.clone(),
                    search_root: winner.search_root.clone(),
                    metadata: Some(metadata),
                    status: PluginStatus::Valid,
                };
                snapshot.plugins.insert(name, spec);
            }
            None => {
                // Every candidate failed: the first one's reason becomes the
                // name's authoritative record, the rest stay diagnostics.
                let first = &candidates[0];
                let reason = failure_reason(&results[0]);
                debug!(plugin = %name, reason = %reason, "plugin invalid");
                for (candidate, result) in candidates.iter().zip(results.iter()).skip(1) {
                    snapshot.diagnostics.push(Diagnostic::Failed {
                        name: name.clone(),
                        path: candidate.path.clone(),
                        reason: failure_reason(result),
                    });
                }
                let spec = PluginSpec {
                    name: name.clone(),
                    path: first.path.clone(),
                    search_root: first.search_root.clone(),
                    metadata: None,
                    status: PluginStatus::Invalid(reason),
                };
                snapshot.plugins.insert(name, spec);
            }
        }
    }

    snapshot
}

fn failure_reason(result: &Option<Result<PluginMetadata, String>>) -> String {
    match result {
        Some(Err(reason)) => reason.clone(),
        Some(Ok(_)) => "shadowed".to_string(),
        None => "probe did not complete".to_string(),
    }
}
