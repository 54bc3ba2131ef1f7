//! Docker-compatible CLI plugin subsystem.
//!
//! A plugin is an external executable named `docker-<name>` found on the
//! configured search roots. Candidates are validated through a metadata
//! handshake (the binary is run once with a fixed argument and must print a
//! JSON document), collected into a per-dispatch registry snapshot with
//! first-root-wins precedence, and the chosen plugin is finally executed as a
//! foreground child with inherited streams and its exit code propagated.

mod candidates;
mod invoke;
mod metadata;
mod probe;
mod registry;

pub use candidates::{PluginCandidate, find_candidates, scan_names, valid_plugin_name};
pub use invoke::{ExitOutcome, InvokeError, USER_AGENT_ENV, invoke, plugin_user_agent};
pub use metadata::{METADATA_SCHEMA_VERSION, PluginMetadata};
pub use probe::{DEFAULT_PROBE_TIMEOUT, ProbeError, probe};
pub use registry::{Diagnostic, PluginSpec, PluginStatus, RegistrySnapshot, discover};

/// Filename prefix shared by the host and every plugin binary.
pub const NAME_PREFIX: &str = "docker-";

/// Argument the host passes to a candidate to request its metadata document.
pub const METADATA_SUBCOMMAND: &str = "docker-cli-plugin-metadata";

/// Vendor string reserved for the host itself. A plugin reporting it is
/// rejected unless its name is on the configured allow-list.
pub const HOST_VENDOR: &str = "rudder";
