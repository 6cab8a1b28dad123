//! Role switching for RBAC test workers.
//!
//! A [`RoleSwitcher`] is the per-worker slot holding the active role. It
//! swaps between the baseline identity (setup and cleanup) and the role
//! under test, pushing each change to a [`Credentials`] collaborator so
//! subsequent API calls present that identity.
//!
//! Switchers are not `Clone` and every mutation takes `&mut self`, so two
//! concurrently running tests cannot share one. [`SessionCredentials`], the
//! writable handle, is not `Clone` either: API clients get a read-only
//! [`SessionView`].

use async_trait::async_trait;
use gatecheck_config::{ConfigError, CredentialStore};
use gatecheck_policy::{ParseRoleError, Role};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RoleError {
    #[error("credential store error: {0}")]
    Config(#[from] ConfigError),
    #[error("credential store holds an invalid role: {0}")]
    InvalidRole(#[from] ParseRoleError),
    #[error("failed to switch credentials to role '{role}': {reason}")]
    Switch { role: Role, reason: String },
}

/// The identity subsequent API calls are made as.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait Credentials: Send + Sync {
    async fn current_role(&self) -> Result<Role, RoleError>;

    async fn set_current_role(&mut self, role: &Role) -> Result<(), RoleError>;
}

/// Holds the active role for one test worker.
#[derive(Debug)]
pub struct RoleSwitcher<C> {
    credentials: C,
    baseline: Role,
    probed: Role,
    current: Role,
}

impl<C: Credentials> RoleSwitcher<C> {
    /// Capture the credential's current role. The switcher does not move to
    /// the baseline until asked to.
    pub async fn new(credentials: C, baseline: Role, probed: Role) -> Result<Self, RoleError> {
        let current = credentials.current_role().await?;
        debug!(
            "Role switcher created (baseline={}, probed={}, current={})",
            baseline, probed, current
        );
        Ok(Self {
            credentials,
            baseline,
            probed,
            current,
        })
    }

    /// Switch to the probed role (`true`) or back to the baseline (`false`).
    ///
    /// The credential's live role decides whether a swap is needed, so a role
    /// changed behind the switcher's back is still corrected. No-op when the
    /// credential already holds the requested role. On failure the recorded
    /// role is the last one the credential reported.
    pub async fn switch_role(&mut self, to_probed: bool) -> Result<(), RoleError> {
        let target = if to_probed {
            self.probed.clone()
        } else {
            self.baseline.clone()
        };

        match self.credentials.current_role().await {
            Ok(live) => {
                if live != self.current {
                    warn!(
                        "Credential role changed outside the switcher (recorded {}, live {})",
                        self.current, live
                    );
                    self.current = live;
                }
                if self.current == target {
                    debug!("Already acting as {}", target);
                    return Ok(());
                }
            }
            Err(e) => debug!("Could not read the live role, switching anyway: {}", e),
        }

        self.credentials.set_current_role(&target).await?;
        info!("Switched role {} -> {}", self.current, target);
        self.current = target;
        Ok(())
    }

    pub fn current_role(&self) -> &Role {
        &self.current
    }

    pub fn baseline_role(&self) -> &Role {
        &self.baseline
    }

    pub fn probed_role(&self) -> &Role {
        &self.probed
    }

    pub fn is_baseline(&self) -> bool {
        self.current == self.baseline
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }
}

/// In-process credential handle for one worker.
///
/// This is the only handle that can change the session's role, and it moves
/// into the worker's [`RoleSwitcher`]. The worker's API client reads the
/// active role through a [`SessionView`] on every request.
#[derive(Debug)]
pub struct SessionCredentials {
    active: Arc<RwLock<Role>>,
}

impl SessionCredentials {
    pub fn new(initial: Role) -> Self {
        Self {
            active: Arc::new(RwLock::new(initial)),
        }
    }

    pub async fn role(&self) -> Role {
        self.active.read().await.clone()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            active: Arc::clone(&self.active),
        }
    }
}

/// Read-only access to a session's active role.
#[derive(Clone, Debug)]
pub struct SessionView {
    active: Arc<RwLock<Role>>,
}

impl SessionView {
    pub async fn role(&self) -> Role {
        self.active.read().await.clone()
    }
}

#[async_trait]
impl Credentials for SessionCredentials {
    async fn current_role(&self) -> Result<Role, RoleError> {
        Ok(self.role().await)
    }

    async fn set_current_role(&mut self, role: &Role) -> Result<(), RoleError> {
        *self.active.write().await = role.clone();
        Ok(())
    }
}

/// Credentials backed by the on-disk [`CredentialStore`].
///
/// A switch rewrites `current_role` in the file; if the write fails the
/// in-memory store is rolled back.
#[derive(Debug)]
pub struct StoreCredentials {
    store: CredentialStore,
    path: PathBuf,
}

impl StoreCredentials {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RoleError> {
        let path = path.as_ref().to_path_buf();
        let store = CredentialStore::load_from(&path)?;
        Ok(Self { store, path })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }
}

#[async_trait]
impl Credentials for StoreCredentials {
    async fn current_role(&self) -> Result<Role, RoleError> {
        Ok(self.store.get_current_role()?.parse()?)
    }

    async fn set_current_role(&mut self, role: &Role) -> Result<(), RoleError> {
        let previous = self.store.current_role.clone();
        self.store.set_current_role(role.as_str())?;
        if let Err(e) = self.store.save_to(&self.path) {
            self.store.current_role = previous;
            return Err(e.into());
        }
        Ok(())
    }
}
