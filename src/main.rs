#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::uninlined_format_args
)]

use anyhow::{Result, bail};
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

use rudder::config::Config;
use rudder::plugins::{self, Diagnostic, PluginStatus, RegistrySnapshot};

/// Rudder - a minimal Docker-compatible CLI.
#[derive(Parser, Debug)]
#[command(name = "rudder")]
#[command(version)]
#[command(about = "A minimal Docker-compatible CLI with runtime plugin subcommands.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the rudder version
    Version,

    /// Manage CLI plugins
    Plugin {
        #[command(subcommand)]
        command: PluginCommands,
    },

    /// Anything else is dispatched to a matching docker-* cli-plugin
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[derive(Subcommand, Debug)]
enum PluginCommands {
    /// List discovered plugins, including invalid ones with their reasons
    Ls,
}

/// Built-in command names a plugin may never override.
fn builtin_command_names() -> Vec<String> {
    let mut names: Vec<String> = Cli::command()
        .get_subcommands()
        .map(|c| c.get_name().to_string())
        .collect();
    // clap synthesizes `help`; plugins must not claim it either.
    names.push("help".to_string());
    names
}

async fn discover(config: &Config) -> RegistrySnapshot {
    plugins::discover(
        &config.plugin_search_roots(),
        &builtin_command_names(),
        &config.plugins.first_party_allow,
        plugins::DEFAULT_PROBE_TIMEOUT,
    )
    .await
}

async fn run_plugin(config: &Config, argv: Vec<String>) -> Result<()> {
    let Some((name, args)) = argv.split_first() else {
        bail!("no command given");
    };

    // A token that can't be a plugin name gets the plain unknown-command
    // error without touching the filesystem.
    if plugins::valid_plugin_name(name) {
        let snapshot = discover(config).await;
        if let Some(spec) = snapshot.resolve(name) {
            let outcome = plugins::invoke(spec, args, &config.config_dir).await?;
            std::process::exit(outcome.host_exit_code());
        }
    }

    bail!("'{name}' is not a rudder command.\nSee 'rudder --help'");
}

async fn list_plugins(config: &Config) -> Result<()> {
    let snapshot = discover(config).await;
    if snapshot.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    for spec in snapshot.plugins() {
        match &spec.status {
            PluginStatus::Valid => {
                let metadata = spec.metadata.as_ref();
                let version = metadata
                    .and_then(|m| m.version.as_deref())
                    .unwrap_or("unknown");
                let vendor = metadata.map_or("unknown", |m| m.vendor.as_str());
                let description = metadata
                    .and_then(|m| m.short_description.as_deref())
                    .unwrap_or("");
                let experimental = metadata
                    .is_some_and(|m| m.experimental)
                    .then_some(" (experimental)")
                    .unwrap_or("");
                println!(
                    "{:<24} {:<12} {:<20} {}{}",
                    spec.name, version, vendor, spec.path.display(), experimental
                );
                if !description.is_empty() {
                    println!("{:<24} {description}", "");
                }
            }
            PluginStatus::Invalid(reason) => {
                println!(
                    "{:<24} (invalid: {reason}) {}",
                    spec.name,
                    spec.path.display()
                );
            }
        }

        // Losing candidates sit directly beneath their name's winner.
        let related = snapshot
            .diagnostics()
            .iter()
            .filter(|d| d.name() == spec.name);
        for diagnostic in related {
            match diagnostic {
                Diagnostic::Shadowed { path, winner, .. } => {
                    println!(
                        "{:<24} (shadowed by {}) {}",
                        "",
                        winner.display(),
                        path.display()
                    );
                }
                Diagnostic::Failed { path, reason, .. } => {
                    println!("{:<24} (failed: {reason}) {}", "", path.display());
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to WARN so
    // normal dispatch stays quiet.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let config = Config::load_or_init()?;

    match cli.command {
        Commands::Version => {
            println!("rudder version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Plugin {
            command: PluginCommands::Ls,
        } => list_plugins(&config).await,
        Commands::External(argv) => run_plugin(&config, argv).await,
    }
}
