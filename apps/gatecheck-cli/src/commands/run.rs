//! `gatecheck run`: the compute RBAC cases against the in-process service

use gatecheck_compute::{suite, ComputeCase, ComputeRbacSuite, FakeCompute};
use gatecheck_config::{CredentialStore, RunConfig};
use gatecheck_policy::{Policy, PolicyAuthority, Role};
use gatecheck_roles::{RoleSwitcher, SessionCredentials};
use gatecheck_validate::{
    ActionValidator, MemoryReportLog, RbacTestLifecycle, ReportSummary, ValidationReport,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::cli::RunArgs;

/// Command-line flags win over the config file and the environment.
pub fn apply_args(config: &mut RunConfig, args: &RunArgs) {
    if let Some(policy) = &args.policy {
        config.policy_file = policy.clone();
    }
    if let Some(deployed) = &args.deployed_policy {
        config.deployed_policy_file = Some(deployed.clone());
    }
    if let Some(role) = &args.baseline_role {
        config.baseline_role = role.clone();
    }
    if let Some(role) = &args.role {
        config.rbac_test_role = role.clone();
    }
}

pub fn select_cases(names: &[String]) -> Result<Vec<ComputeCase>, Box<dyn std::error::Error>> {
    if names.is_empty() {
        return Ok(ComputeCase::all().to_vec());
    }
    names
        .iter()
        .map(|name| {
            ComputeCase::from_name(name).ok_or_else(|| format!("Unknown case '{}'", name).into())
        })
        .collect()
}

/// Both roles need a profile when a credential store is configured.
fn check_credentials(path: &Path, roles: &[&Role]) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::load_from(path)?;
    for role in roles {
        store.get_profile(role.as_str())?;
    }
    Ok(())
}

pub async fn execute(
    config: &RunConfig,
    cases: &[ComputeCase],
) -> Result<Vec<ValidationReport>, Box<dyn std::error::Error>> {
    if config.component != suite::COMPONENT || config.service != suite::SERVICE {
        return Err(format!(
            "Unsupported component {}/{} (only {}/{} is available)",
            config.component,
            config.service,
            suite::COMPONENT,
            suite::SERVICE
        )
        .into());
    }

    let baseline: Role = config.baseline_role.parse()?;
    let probed: Role = config.rbac_test_role.parse()?;
    if let Some(path) = &config.credentials_file {
        check_credentials(path, &[&baseline, &probed])?;
    }

    let declared: Arc<dyn PolicyAuthority> = Arc::new(Policy::from_path(&config.policy_file)?);
    let deployed: Arc<dyn PolicyAuthority> = match &config.deployed_policy_file {
        Some(path) => Arc::new(Policy::from_path(path)?),
        None => Arc::clone(&declared),
    };
    info!(
        "Checking {} case(s) as {} (baseline {}), enforcing {}",
        cases.len(),
        probed,
        baseline,
        config.deployed_policy_path().display()
    );

    let service = Arc::new(FakeCompute::new(deployed));
    let session = SessionCredentials::new(baseline.clone());
    let client = Arc::new(service.client(session.view()));
    let switcher = RoleSwitcher::new(session, baseline, probed).await?;
    let mut suite = ComputeRbacSuite::new(
        client,
        ActionValidator::new(declared),
        RbacTestLifecycle::new(switcher),
    );

    let log = MemoryReportLog::new();
    Ok(suite.run_all(cases, &log).await?)
}

fn describe(allowed: Option<bool>) -> &'static str {
    match allowed {
        Some(true) => "allowed",
        Some(false) => "denied",
        None => "-",
    }
}

fn print_table(reports: &[ValidationReport]) {
    println!(
        "{:<17} {:<50} {:<10} {:<9} {}",
        "VERDICT", "RULE", "ROLE", "EXPECTED", "ACTUAL"
    );
    for report in reports {
        let actual = match (report.actual_allowed, report.error_kind) {
            (Some(false), Some(kind)) => format!("denied ({})", kind),
            (allowed, _) => describe(allowed).to_string(),
        };
        println!(
            "{:<17} {:<50} {:<10} {:<9} {}",
            report.verdict.to_string(),
            report.rule,
            report.role.as_str(),
            describe(report.expected_allowed),
            actual
        );
        if let Some(detail) = &report.detail {
            println!("{:<17} {}", "", detail);
        }
    }
}

/// Returns whether every case passed.
pub async fn cmd_run(
    config_path: Option<&Path>,
    args: &RunArgs,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut config = RunConfig::resolve(config_path)?;
    apply_args(&mut config, args);
    let cases = select_cases(&args.cases)?;

    let reports = execute(&config, &cases).await?;
    let summary = ReportSummary::from_reports(&reports);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_table(&reports);
        println!();
        println!("{}", summary);
    }
    Ok(summary.is_clean())
}
