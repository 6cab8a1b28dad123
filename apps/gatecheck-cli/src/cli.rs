use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gatecheck")]
#[command(about = "Check a service's RBAC enforcement against a declared policy")]
pub struct Cli {
    /// Run configuration file (defaults to ~/.gatecheck/config.json if present)
    #[arg(long, env = "GATECHECK_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Inspect and evaluate policy files
    Policy {
        #[command(subcommand)]
        policy_cmd: PolicyCommand,
    },
    /// Manage the active role in the credential store
    Role {
        /// Credential store (defaults to ~/.gatecheck/credentials.json)
        #[arg(long, env = "GATECHECK_CREDENTIALS")]
        credentials: Option<PathBuf>,

        #[command(subcommand)]
        role_cmd: RoleCommand,
    },
    /// Run the compute RBAC cases against the in-process compute service
    Run(RunArgs),
}

#[derive(Subcommand)]
pub enum PolicyCommand {
    /// Load a policy file and report parse, reference and cycle errors
    Check {
        /// Policy file
        file: PathBuf,

        /// Print every rule in canonical form
        #[arg(long)]
        verbose: bool,
    },
    /// Evaluate one rule for one role
    Eval {
        /// Policy file
        file: PathBuf,
        /// Rule name
        rule: String,
        /// Role name
        role: String,
    },
    /// Show which roles each rule authorizes
    Matrix {
        /// Policy file
        file: PathBuf,

        /// Roles to evaluate
        #[arg(long, value_delimiter = ',', default_value = "admin,member")]
        roles: Vec<String>,

        /// Only rules starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum RoleCommand {
    /// List role profiles
    List,
    /// Show the active role
    Current,
    /// Switch the active role
    Use {
        /// Role name
        role: String,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Declared policy file
    #[arg(long)]
    pub policy: Option<PathBuf>,

    /// Policy the compute service enforces (defaults to the declared policy)
    #[arg(long)]
    pub deployed_policy: Option<PathBuf>,

    /// Role used for setup and cleanup
    #[arg(long)]
    pub baseline_role: Option<String>,

    /// Role under test
    #[arg(long)]
    pub role: Option<String>,

    /// Run only these cases (e.g. test_delete_server); repeatable
    #[arg(long = "case")]
    pub cases: Vec<String>,

    /// Print reports as JSON
    #[arg(long)]
    pub json: bool,
}
