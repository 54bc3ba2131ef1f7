//! Host configuration.
//!
//! The config directory doubles as the Docker-compatible one (`$DOCKER_CONFIG`
//! or `~/.docker`) so existing cli-plugin installations are picked up without
//! any migration. Rudder's own settings live in `rudder.toml` inside it.

use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Environment variable overriding the config directory. Also injected into
/// plugin child processes when the caller's environment lacks it.
pub const CONFIG_DIR_ENV: &str = "DOCKER_CONFIG";

const CONFIG_FILENAME: &str = "rudder.toml";

/// Per-user plugin directory, relative to the config directory.
const USER_PLUGIN_DIR: &str = "cli-plugins";

/// Fixed fallback directories searched after the user and configured ones.
#[cfg(unix)]
const SYSTEM_PLUGIN_DIRS: &[&str] = &[
    "/usr/local/lib/docker/cli-plugins",
    "/usr/local/libexec/docker/cli-plugins",
    "/usr/lib/docker/cli-plugins",
    "/usr/libexec/docker/cli-plugins",
];
#[cfg(not(unix))]
const SYSTEM_PLUGIN_DIRS: &[&str] = &[];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Config directory - computed at load time, not serialized
    #[serde(skip)]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Extra plugin directories, searched after `<config-dir>/cli-plugins`
    /// and before the system fallback directories. `~` is expanded.
    #[serde(default)]
    pub extra_dirs: Vec<String>,

    /// Plugin names allowed to report the host's own vendor string.
    #[serde(default)]
    pub first_party_allow: Vec<String>,
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        Self::load_from(Self::default_config_dir()?)
    }

    /// Load `rudder.toml` from `config_dir`, falling back to defaults when
    /// the file does not exist. Missing config is not an error: a fresh
    /// install has plugins but no settings.
    pub fn load_from(config_dir: PathBuf) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILENAME);
        if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_dir = config_dir;
            Ok(config)
        } else {
            Ok(Config {
                config_dir,
                ..Config::default()
            })
        }
    }

    fn default_config_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            if !dir.is_empty() {
                return Ok(PathBuf::from(dir));
            }
        }
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Ok(home.join(".docker"))
    }

    /// Plugin search roots in priority order. Earlier roots win on name
    /// conflicts.
    pub fn plugin_search_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.config_dir.join(USER_PLUGIN_DIR)];
        for dir in &self.plugins.extra_dirs {
            roots.push(PathBuf::from(shellexpand::tilde(dir).as_ref()));
        }
        for dir in SYSTEM_PLUGIN_DIRS {
            roots.push(PathBuf::from(dir));
        }
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(config.config_dir, tmp.path());
        assert!(config.plugins.extra_dirs.is_empty());
        assert!(config.plugins.first_party_allow.is_empty());
    }

    #[test]
    fn parses_plugins_section() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[plugins]
extra_dirs = ["/opt/rudder/plugins"]
first_party_allow = ["compose"]
"#,
        )
        .unwrap();

        let config = Config::load_from(tmp.path().to_path_buf()).unwrap();
        assert_eq!(config.plugins.extra_dirs, vec!["/opt/rudder/plugins"]);
        assert_eq!(config.plugins.first_party_allow, vec!["compose"]);
    }

    #[test]
    fn bad_toml_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "not valid toml {{{{").unwrap();
        assert!(Config::load_from(tmp.path().to_path_buf()).is_err());
    }

    #[test]
    fn search_roots_put_user_dir_first_then_extras() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = Config::load_from(tmp.path().to_path_buf()).unwrap();
        config.plugins.extra_dirs = vec!["/opt/rudder/plugins".into()];

        let roots = config.plugin_search_roots();
        assert_eq!(roots[0], tmp.path().join(USER_PLUGIN_DIR));
        assert_eq!(roots[1], PathBuf::from("/opt/rudder/plugins"));
    }
}
