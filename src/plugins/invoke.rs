//! Invocation — hands the terminal over to the chosen plugin.
//!
//! The child gets the user's trailing arguments verbatim, the parent's
//! streams unbuffered and untouched, and the caller's environment plus the
//! host identification variable. The host blocks for the plugin's entire
//! lifetime; plugins are full subcommands, not background tasks.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::registry::PluginSpec;
use crate::config::CONFIG_DIR_ENV;

/// Environment variable carrying the host identification string. Always
/// (re)set by the host; plugins may use it for telemetry but must not
/// require it.
pub const USER_AGENT_ENV: &str = "DOCKER_CLI_PLUGIN_USER_AGENT";

/// The plugin could not be started at all. Kept separate from the plugin's
/// own failure exit codes so "plugin ran and failed" and "plugin could not
/// be started" stay distinguishable.
#[derive(Debug, thiserror::Error)]
#[error("failed to launch plugin '{name}': {source}")]
pub struct InvokeError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

/// How the plugin process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Normal termination; the code is propagated verbatim.
    Code(i32),
    /// Terminated by a signal (unix).
    Signaled(i32),
}

impl ExitOutcome {
    /// Exit code the host process should end with. Signals map to the shell
    /// convention of `128 + signal`.
    pub fn host_exit_code(self) -> i32 {
        match self {
            ExitOutcome::Code(code) => code,
            ExitOutcome::Signaled(signal) => 128 + signal,
        }
    }
}

/// Identification string for one plugin invocation, e.g.
/// `docker-cli-plugin-whalesay/0.0.1`. Pure and safe to recompute.
pub fn plugin_user_agent(name: &str, version: &str) -> String {
    let name = if name.is_empty() { "unknown" } else { name };
    let version = if version.is_empty() { "unknown" } else { version };
    format!("docker-cli-plugin-{name}/{version}")
}

/// Run a validated plugin to completion.
///
/// `config_dir` is exported to the child only when the caller's environment
/// does not already name one; nothing else in the inherited environment is
/// overridden.
pub async fn invoke(
    spec: &PluginSpec,
    args: &[String],
    config_dir: &Path,
) -> Result<ExitOutcome, InvokeError> {
    debug_assert!(spec.is_valid(), "only valid plugins are invokable");

    let version = spec
        .metadata
        .as_ref()
        .and_then(|m| m.version.as_deref())
        .unwrap_or("");

    let mut cmd = Command::new(&spec.path);
    cmd.args(args)
        .env(USER_AGENT_ENV, plugin_user_agent(&spec.name, version))
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if !caller_names_config_dir(std::env::var_os(CONFIG_DIR_ENV).as_deref()) {
        cmd.env(CONFIG_DIR_ENV, config_dir);
    }

    debug!(plugin = %spec.name, path = %spec.path.display(), "handing off to plugin");

    let mut child = cmd.spawn().map_err(|source| InvokeError {
        name: spec.name.clone(),
        source,
    })?;
    let status = child.wait().await.map_err(|source| InvokeError {
        name: spec.name.clone(),
        source,
    })?;

    Ok(outcome_from_status(status))
}

/// An empty config-dir variable counts as unset, matching how the host
/// resolves its own config directory, so the child always sees the resolved
/// location rather than inheriting the empty value.
fn caller_names_config_dir(value: Option<&std::ffi::OsStr>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

fn outcome_from_status(status: std::process::ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        return ExitOutcome::Code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitOutcome::Signaled(signal);
        }
    }
    // Neither a code nor a signal should be unreachable, but never crash on
    // an exotic status.
    ExitOutcome::Code(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_formatting() {
        assert_eq!(
            plugin_user_agent("whalesay", "0.0.1"),
            "docker-cli-plugin-whalesay/0.0.1"
        );
        assert_eq!(
            plugin_user_agent("whalesay", ""),
            "docker-cli-plugin-whalesay/unknown"
        );
        assert_eq!(plugin_user_agent("", ""), "docker-cli-plugin-unknown/unknown");
    }

    #[test]
    fn empty_config_env_counts_as_unset() {
        use std::ffi::OsStr;
        assert!(!caller_names_config_dir(None));
        assert!(!caller_names_config_dir(Some(OsStr::new(""))));
        assert!(caller_names_config_dir(Some(OsStr::new("/home/x/.docker"))));
    }

    #[test]
    fn signal_maps_to_conventional_code() {
        assert_eq!(ExitOutcome::Code(0).host_exit_code(), 0);
        assert_eq!(ExitOutcome::Code(127).host_exit_code(), 127);
        assert_eq!(ExitOutcome::Signaled(15).host_exit_code(), 143);
    }

    #[cfg(unix)]
    mod unix {
        use super::super::*;
        use crate::plugins::registry::{PluginSpec, PluginStatus};
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn script_spec(dir: &Path, name: &str, body: &str) -> PluginSpec {
            let path = dir.join(format!("docker-{name}"));
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            PluginSpec {
                name: name.to_string(),
                path,
                search_root: dir.to_path_buf(),
                metadata: None,
                status: PluginStatus::Valid,
            }
        }

        #[tokio::test]
        async fn exit_codes_propagate_verbatim() {
            let tmp = tempfile::tempdir().unwrap();
            let spec = script_spec(tmp.path(), "exiter", r#"exit "$1""#);

            for code in [0, 1, 2, 127] {
                let outcome = invoke(&spec, &[code.to_string()], tmp.path()).await.unwrap();
                assert_eq!(outcome, ExitOutcome::Code(code));
                assert_eq!(outcome.host_exit_code(), code);
            }
        }

        #[tokio::test]
        async fn arguments_pass_through_unmodified() {
            let tmp = tempfile::tempdir().unwrap();
            let out_file = tmp.path().join("args.txt");
            let spec = script_spec(
                tmp.path(),
                "echoargs",
                r#"out="$1"; shift; printf '%s\n' "$@" > "$out""#,
            );

            let args = vec![
                out_file.display().to_string(),
                "foo".to_string(),
                "--bar=1".to_string(),
            ];
            let outcome = invoke(&spec, &args, tmp.path()).await.unwrap();
            assert_eq!(outcome, ExitOutcome::Code(0));

            let recorded = fs::read_to_string(&out_file).unwrap();
            assert_eq!(recorded, "foo\n--bar=1\n");
        }

        #[tokio::test]
        async fn user_agent_env_is_always_set() {
            let tmp = tempfile::tempdir().unwrap();
            let out_file = tmp.path().join("ua.txt");
            let mut spec = script_spec(
                tmp.path(),
                "observer",
                r#"printf '%s' "$DOCKER_CLI_PLUGIN_USER_AGENT" > "$1""#,
            );
            spec.metadata = Some(crate::plugins::PluginMetadata {
                schema_version: "0.1.0".to_string(),
                vendor: "acme corp".to_string(),
                version: Some("0.0.1".to_string()),
                short_description: None,
                url: None,
                experimental: false,
            });

            let args = vec![out_file.display().to_string()];
            invoke(&spec, &args, tmp.path()).await.unwrap();

            let recorded = fs::read_to_string(&out_file).unwrap();
            assert_eq!(recorded, "docker-cli-plugin-observer/0.0.1");
        }

        #[tokio::test]
        async fn signal_termination_is_reported() {
            let tmp = tempfile::tempdir().unwrap();
            let spec = script_spec(tmp.path(), "selfkill", "kill -TERM $$");

            let outcome = invoke(&spec, &[], tmp.path()).await.unwrap();
            assert_eq!(outcome, ExitOutcome::Signaled(15));
            assert_eq!(outcome.host_exit_code(), 143);
        }

        #[tokio::test]
        async fn vanished_binary_is_a_launch_failure() {
            let tmp = tempfile::tempdir().unwrap();
            let mut spec = script_spec(tmp.path(), "ghost", "exit 0");
            fs::remove_file(&spec.path).unwrap();
            spec.status = PluginStatus::Valid;

            let err = invoke(&spec, &[], tmp.path()).await.unwrap_err();
            assert_eq!(err.name, "ghost");
        }
    }
}
