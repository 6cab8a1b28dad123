//! Role commands: list, current, use

use gatecheck_config::CredentialStore;
use gatecheck_policy::Role;
use gatecheck_roles::{Credentials, StoreCredentials};
use std::path::Path;

pub fn cmd_role_list(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::load_from(path)?;
    let current = store.get_current_role().ok();

    println!("Roles:");
    for profile in &store.profiles {
        let marker = if Some(profile.role.as_str()) == current {
            "*"
        } else {
            " "
        };
        match &profile.project {
            Some(project) => println!(
                "{} {} (user: {}, project: {})",
                marker, profile.role, profile.username, project
            ),
            None => println!("{} {} (user: {})", marker, profile.role, profile.username),
        }
    }
    Ok(())
}

pub async fn cmd_role_current(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = StoreCredentials::open(path)?;
    println!("{}", credentials.current_role().await?);
    Ok(())
}

pub async fn cmd_role_use(path: &Path, role: &str) -> Result<(), Box<dyn std::error::Error>> {
    let role: Role = role.parse()?;
    let mut credentials = StoreCredentials::open(path)?;
    credentials.set_current_role(&role).await?;
    println!("✓ Switched to role: {}", role);
    Ok(())
}
