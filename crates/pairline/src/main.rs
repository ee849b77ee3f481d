// SPDX-FileCopyrightText: 2026 Pairline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pairline - multi-tenant messaging gateway.
//!
//! This is the binary entry point.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod credentials;
mod inbound;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use pairline_config::PairlineConfig;
use pairline_session::FileCredentialStore;

/// Pairline - multi-tenant messaging gateway.
#[derive(Parser, Debug)]
#[command(name = "pairline", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway and every tenant with stored credentials.
    Serve,
    /// Show whether the gateway is running and each tenant's state.
    Status {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
        /// Disable colors.
        #[arg(long)]
        plain: bool,
    },
    /// Maintain stored tenant credentials.
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Subcommand, Debug)]
enum CredentialAction {
    /// List tenants with a stored credential.
    List,
    /// Delete a tenant's credential (forces re-pairing).
    Delete { tenant: String },
    /// Copy a tenant's credential to a file.
    Backup { tenant: String, output: PathBuf },
}

fn load_config(path: Option<&std::path::Path>) -> PairlineConfig {
    let loaded = match path {
        Some(path) => pairline_config::load_and_validate_path(path),
        None => pairline_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            pairline_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain).await,
        Some(Commands::Credentials { action }) => {
            let store = FileCredentialStore::new(&config.credentials.directory);
            match action {
                CredentialAction::List => credentials::run_list(&store).await,
                CredentialAction::Delete { tenant } => {
                    credentials::run_delete(&store, &tenant).await
                }
                CredentialAction::Backup { tenant, output } => {
                    credentials::run_backup(&store, &tenant, &output).await
                }
            }
        }
        None => {
            println!("pairline: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_credential_backup() {
        let cli = Cli::try_parse_from([
            "pairline",
            "--config",
            "custom.toml",
            "credentials",
            "backup",
            "acme",
            "/tmp/acme.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        match cli.command {
            Some(Commands::Credentials {
                action: CredentialAction::Backup { tenant, output },
            }) => {
                assert_eq!(tenant, "acme");
                assert_eq!(output, PathBuf::from("/tmp/acme.json"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_status_flags() {
        let cli = Cli::try_parse_from(["pairline", "status", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Status {
                json: true,
                plain: false
            })
        ));
    }

    #[test]
    fn default_config_is_valid() {
        let config = pairline_config::load_and_validate_str("").expect("defaults validate");
        assert_eq!(config.agent.name, "pairline");
        assert_eq!(config.gateway.port, 3780);
    }
}
