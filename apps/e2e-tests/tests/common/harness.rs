//! Test harness for e2e runs with a role matrix.
//!
//! Each harness owns its own compute service, session and report log, the
//! same way separate workers would in a parallel run.

#![allow(dead_code)]

use gatecheck_compute::{ComputeCase, ComputeRbacSuite, FakeCompute, FakeComputeClient};
use gatecheck_e2e_tests::load_fixture;
use gatecheck_policy::{PolicyAuthority, Role};
use gatecheck_roles::{RoleSwitcher, SessionCredentials, SessionView};
use gatecheck_validate::{
    ActionValidator, MemoryReportLog, RbacTestLifecycle, ReportSummary, ValidationReport,
};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// Role Configuration
// ═══════════════════════════════════════════════════════════════════════════

/// Which identity sets up the cases and which one is probed
#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub baseline: Role,
    pub probed: Role,
}

impl RoleConfig {
    /// Admin sets up, member is probed
    pub fn member() -> Self {
        Self {
            baseline: Role::new("admin"),
            probed: Role::new("member"),
        }
    }

    /// Admin probes itself
    pub fn admin() -> Self {
        Self {
            baseline: Role::new("admin"),
            probed: Role::new("admin"),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.probed.as_str() == "admin"
    }

    /// Human-readable name for test output
    pub fn name(&self) -> String {
        format!("{}->{}", self.baseline, self.probed)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Test Harness
// ═══════════════════════════════════════════════════════════════════════════

type Suite = ComputeRbacSuite<FakeComputeClient, SessionCredentials>;

/// One worker: a compute service enforcing `deployed`, checked against `declared`
pub struct RbacHarness {
    pub config: RoleConfig,
    pub service: Arc<FakeCompute>,
    pub session: SessionView,
    pub log: MemoryReportLog,
    suite: Suite,
}

impl RbacHarness {
    pub async fn new(
        config: RoleConfig,
        declared: &str,
        deployed: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let declared: Arc<dyn PolicyAuthority> = Arc::new(load_fixture(declared)?);
        let deployed: Arc<dyn PolicyAuthority> = Arc::new(load_fixture(deployed)?);

        let service = Arc::new(FakeCompute::new(deployed));
        let credentials = SessionCredentials::new(config.baseline.clone());
        let session = credentials.view();
        let client = Arc::new(service.client(session.clone()));
        let switcher =
            RoleSwitcher::new(credentials, config.baseline.clone(), config.probed.clone())
                .await?;
        let suite = ComputeRbacSuite::new(
            client,
            ActionValidator::new(declared),
            RbacTestLifecycle::new(switcher),
        );

        Ok(Self {
            config,
            service,
            session,
            log: MemoryReportLog::new(),
            suite,
        })
    }

    pub async fn run(
        &mut self,
        cases: &[ComputeCase],
    ) -> Result<Vec<ValidationReport>, Box<dyn std::error::Error>> {
        Ok(self.suite.run_all(cases, &self.log).await?)
    }

    pub async fn run_all(&mut self) -> Result<Vec<ValidationReport>, Box<dyn std::error::Error>> {
        self.run(ComputeCase::all()).await
    }

    pub async fn summary(&self) -> ReportSummary {
        self.log.summary().await
    }

    /// Fails if any server, port or agent outlived its case
    pub async fn assert_no_leftovers(&self) {
        assert_eq!(self.service.server_count().await, 0, "leftover servers");
        assert_eq!(self.service.port_count().await, 0, "leftover ports");
        assert_eq!(self.service.agent_count().await, 0, "leftover agents");
    }

    pub async fn assert_at_baseline(&self) {
        assert_eq!(self.session.role().await, self.config.baseline);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Role Matrix Macro
// ═══════════════════════════════════════════════════════════════════════════

/// Run one async test body once per probed role.
#[macro_export]
macro_rules! role_matrix_test {
    ($test_name:ident, $test_fn:ident) => {
        paste::paste! {
            #[tokio::test]
            async fn [<$test_name _as_member>]() -> Result<(), Box<dyn std::error::Error>> {
                $test_fn($crate::common::harness::RoleConfig::member()).await
            }

            #[tokio::test]
            async fn [<$test_name _as_admin>]() -> Result<(), Box<dyn std::error::Error>> {
                $test_fn($crate::common::harness::RoleConfig::admin()).await
            }
        }
    };
}
