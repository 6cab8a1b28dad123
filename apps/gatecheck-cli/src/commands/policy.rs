//! Policy commands: check, eval, matrix

use gatecheck_policy::{Policy, Role};
use std::path::Path;

pub fn cmd_policy_check(file: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let policy = Policy::from_path(file)?;
    println!("{}: {} rules OK", file.display(), policy.len());
    if verbose {
        for name in policy.rule_names() {
            let rendered = policy.render(name).unwrap_or_default();
            println!("  {:<50} {}", name, rendered);
        }
    }
    Ok(())
}

pub fn cmd_policy_eval(file: &Path, rule: &str, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let policy = Policy::from_path(file)?;
    let role: Role = role.parse()?;
    let allowed = policy.evaluate(rule, &role)?;
    println!("{}", if allowed { "allowed" } else { "denied" });
    Ok(())
}

/// One row per rule: (rule, allowed per role in `roles` order).
pub fn matrix_rows(
    policy: &Policy,
    roles: &[Role],
    prefix: Option<&str>,
) -> Result<Vec<(String, Vec<bool>)>, Box<dyn std::error::Error>> {
    let names: Vec<_> = policy
        .rule_names()
        .filter(|name| prefix.map_or(true, |p| name.starts_with(p)))
        .collect();

    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let authorized = policy.authorized_roles(name, roles)?;
        let cells = roles.iter().map(|r| authorized.contains(r)).collect();
        rows.push((name.to_string(), cells));
    }
    Ok(rows)
}

pub fn cmd_policy_matrix(
    file: &Path,
    roles: &[String],
    prefix: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let policy = Policy::from_path(file)?;
    let roles = roles
        .iter()
        .map(|r| r.parse::<Role>())
        .collect::<Result<Vec<_>, _>>()?;
    let rows = matrix_rows(&policy, &roles, prefix)?;

    if rows.is_empty() {
        println!("No rules found.");
        return Ok(());
    }

    let width = rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    print!("{:<width$}", "RULE", width = width);
    for role in &roles {
        print!("  {:<8}", role);
    }
    println!();
    for (name, cells) in rows {
        print!("{:<width$}", name, width = width);
        for allowed in cells {
            print!("  {:<8}", if allowed { "allow" } else { "-" });
        }
        println!();
    }
    Ok(())
}
