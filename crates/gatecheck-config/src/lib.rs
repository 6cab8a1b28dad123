use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_POLICY_FILE: &str = "GATECHECK_POLICY_FILE";
pub const ENV_DEPLOYED_POLICY_FILE: &str = "GATECHECK_DEPLOYED_POLICY_FILE";
pub const ENV_BASELINE_ROLE: &str = "GATECHECK_BASELINE_ROLE";
pub const ENV_RBAC_TEST_ROLE: &str = "GATECHECK_RBAC_TEST_ROLE";
pub const ENV_CREDENTIALS_FILE: &str = "GATECHECK_CREDENTIALS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Config value '{0}' must not be empty")]
    MissingRole(&'static str),
    #[error("No role profiles configured")]
    NoProfiles,
    #[error("Role profile '{0}' not found")]
    RoleNotFound(String),
}

/// Settings for one RBAC run, stored in ~/.gatecheck/config.json.
///
/// Every field can be overridden from the environment (`GATECHECK_*`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Declared policy the service is checked against
    #[serde(default = "default_policy_file")]
    pub policy_file: PathBuf,
    /// Policy the in-process compute service enforces (defaults to `policy_file`)
    #[serde(default)]
    pub deployed_policy_file: Option<PathBuf>,
    /// Identity used for setup and cleanup
    #[serde(default = "default_baseline_role")]
    pub baseline_role: String,
    /// Identity whose permissions are being probed
    #[serde(default = "default_rbac_test_role")]
    pub rbac_test_role: String,
    #[serde(default = "default_component")]
    pub component: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
}

fn default_policy_file() -> PathBuf {
    PathBuf::from("policy.json")
}

fn default_baseline_role() -> String {
    "admin".to_string()
}

fn default_rbac_test_role() -> String {
    "member".to_string()
}

fn default_component() -> String {
    "Compute".to_string()
}

fn default_service() -> String {
    "nova".to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            policy_file: default_policy_file(),
            deployed_policy_file: None,
            baseline_role: default_baseline_role(),
            rbac_test_role: default_rbac_test_role(),
            component: default_component(),
            service: default_service(),
            credentials_file: None,
        }
    }
}

impl RunConfig {
    /// Load config from custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = read_json(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default file if it exists, else defaults.
    /// Environment overrides are applied last.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load_from(default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_json(path.as_ref(), self)
    }

    /// Get default config path (~/.gatecheck/config.json)
    pub fn default_path() -> PathBuf {
        config_dir().join("config.json")
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_POLICY_FILE) {
            self.policy_file = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_DEPLOYED_POLICY_FILE) {
            self.deployed_policy_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup(ENV_BASELINE_ROLE) {
            self.baseline_role = v;
        }
        if let Some(v) = lookup(ENV_RBAC_TEST_ROLE) {
            self.rbac_test_role = v;
        }
        if let Some(v) = lookup(ENV_CREDENTIALS_FILE) {
            self.credentials_file = Some(PathBuf::from(v));
        }
        self.validate()
    }

    /// Policy file the service side enforces.
    pub fn deployed_policy_path(&self) -> &Path {
        self.deployed_policy_file
            .as_deref()
            .unwrap_or(&self.policy_file)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.baseline_role.trim().is_empty() {
            return Err(ConfigError::MissingRole("baseline_role"));
        }
        if self.rbac_test_role.trim().is_empty() {
            return Err(ConfigError::MissingRole("rbac_test_role"));
        }
        Ok(())
    }
}

/// Credentials for each role the harness can act as, stored in
/// ~/.gatecheck/credentials.json.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    pub profiles: Vec<RoleProfile>,
    #[serde(default)]
    pub current_role: Option<String>, // Role of the active profile
}

/// Login details for one role
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleProfile {
    pub role: String,
    pub username: String,
    #[serde(default)]
    pub project: Option<String>,
    /// Name of the environment variable holding the password (never the password itself)
    #[serde(default)]
    pub password_env: Option<String>,
}

impl CredentialStore {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        write_json(path.as_ref(), self)
    }

    /// Get default credentials path (~/.gatecheck/credentials.json)
    pub fn default_path() -> PathBuf {
        config_dir().join("credentials.json")
    }

    /// Get the active profile, falling back to the first one
    pub fn get_current_profile(&self) -> Result<&RoleProfile, ConfigError> {
        let role = self
            .current_role
            .as_ref()
            .or_else(|| self.profiles.first().map(|p| &p.role))
            .ok_or(ConfigError::NoProfiles)?;

        self.get_profile(role)
    }

    pub fn get_current_role(&self) -> Result<&str, ConfigError> {
        self.get_current_profile().map(|p| p.role.as_str())
    }

    pub fn get_profile(&self, role: &str) -> Result<&RoleProfile, ConfigError> {
        self.profiles
            .iter()
            .find(|p| p.role == role)
            .ok_or_else(|| ConfigError::RoleNotFound(role.to_string()))
    }

    /// Make `role` the active profile. Fails if no profile exists for it.
    pub fn set_current_role(&mut self, role: &str) -> Result<(), ConfigError> {
        self.get_profile(role)?;
        self.current_role = Some(role.to_string());
        Ok(())
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gatecheck")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read(e)
        }
    })?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
