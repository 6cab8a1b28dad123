use clap::Parser;
use gatecheck_config::{CredentialStore, RunConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Command, PolicyCommand, RoleCommand};
use commands::*;

/// `--credentials`, then the run config's credential store, then the default.
fn credentials_path(
    explicit: Option<PathBuf>,
    config: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let config = RunConfig::resolve(config)?;
    Ok(config
        .credentials_file
        .unwrap_or_else(CredentialStore::default_path))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Policy { policy_cmd } => match policy_cmd {
            PolicyCommand::Check { file, verbose } => {
                cmd_policy_check(&file, verbose)?;
            }
            PolicyCommand::Eval { file, rule, role } => {
                cmd_policy_eval(&file, &rule, &role)?;
            }
            PolicyCommand::Matrix {
                file,
                roles,
                prefix,
            } => {
                cmd_policy_matrix(&file, &roles, prefix.as_deref())?;
            }
        },
        Command::Role {
            credentials,
            role_cmd,
        } => {
            let path = credentials_path(credentials, cli.config.as_deref())?;
            match role_cmd {
                RoleCommand::List => {
                    cmd_role_list(&path)?;
                }
                RoleCommand::Current => {
                    cmd_role_current(&path).await?;
                }
                RoleCommand::Use { role } => {
                    cmd_role_use(&path, &role).await?;
                }
            }
        }
        Command::Run(args) => {
            if !cmd_run(cli.config.as_deref(), &args).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
