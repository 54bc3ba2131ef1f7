//! The metadata handshake that turns a candidate into a validated plugin.
//!
//! One bounded subprocess per probe: the candidate is run with the fixed
//! metadata argument, stdout must parse as a [`PluginMetadata`] document and
//! stderr is captured for diagnostics only. `kill_on_drop` guarantees a
//! candidate that outlives the deadline is killed and reaped rather than
//! left running.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::candidates::PluginCandidate;
use super::metadata::PluginMetadata;
use super::{HOST_VENDOR, METADATA_SCHEMA_VERSION, METADATA_SUBCOMMAND};

/// Bound on how long a candidate may take to answer the handshake.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stderr is kept only as a short excerpt in the failure reason.
const STDERR_EXCERPT_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to run metadata command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("metadata command timed out")]
    Timeout,

    #[error("metadata command exited with code {code}: {stderr}")]
    ExecutionFailed { code: i32, stderr: String },

    #[error("invalid metadata: {0}")]
    MalformedMetadata(String),

    #[error("invalid or reserved vendor {0:?}")]
    VendorMismatch(String),
}

/// Run the handshake against one candidate.
///
/// `first_party_allow` lists plugin names permitted to report the host's own
/// vendor string; everything else claiming it is rejected so a stray binary
/// cannot masquerade as first-party.
pub async fn probe(
    candidate: &PluginCandidate,
    timeout: Duration,
    first_party_allow: &[String],
) -> Result<PluginMetadata, ProbeError> {
    debug!(
        plugin = %candidate.name,
        path = %candidate.path.display(),
        "probing candidate"
    );

    let mut cmd = Command::new(&candidate.path);
    cmd.arg(METADATA_SUBCOMMAND)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(output) => output?,
        Err(_) => return Err(ProbeError::Timeout),
    };

    if !output.status.success() {
        return Err(ProbeError::ExecutionFailed {
            code: output.status.code().unwrap_or(-1),
            stderr: excerpt(&output.stderr),
        });
    }

    let metadata: PluginMetadata = serde_json::from_slice(&output.stdout)
        .map_err(|e| ProbeError::MalformedMetadata(e.to_string()))?;

    if metadata.schema_version != METADATA_SCHEMA_VERSION {
        return Err(ProbeError::MalformedMetadata(format!(
            "unsupported SchemaVersion {:?}",
            metadata.schema_version
        )));
    }
    if metadata.vendor.trim().is_empty() {
        return Err(ProbeError::VendorMismatch(metadata.vendor));
    }
    if metadata.vendor == HOST_VENDOR && !first_party_allow.iter().any(|n| n == &candidate.name) {
        return Err(ProbeError::VendorMismatch(metadata.vendor));
    }

    Ok(metadata)
}

fn excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    match text.char_indices().nth(STDERR_EXCERPT_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
