//! The compute RBAC cases.
//!
//! Every case follows the same shape: prerequisites are created as the
//! baseline role, the expected outcome is resolved from the declared policy,
//! the worker switches to the probed role, and the protected call is
//! observed. Resources are released by cleanups that run as the baseline
//! role once the case is over.

use futures::FutureExt;
use gatecheck_policy::{PolicyAuthority, PolicyError};
use gatecheck_roles::{Credentials, RoleError};
use gatecheck_validate::{
    ActionValidator, ClassifiedResultExt, ErrorKind, Expectation, LifecycleError,
    RbacTestLifecycle, ReportError, ReportLog, RuleSpec, TestError, TestScope, ValidationReport,
    ValidationResult,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::{uuid, Uuid};

use crate::client::ComputeClient;
use crate::types::{CreateAgentParams, PortId, Server, ServerId};
use crate::{rules, ApiError};

pub const COMPONENT: &str = "Compute";
pub const SERVICE: &str = "nova";

/// Not a compute host: an authorized live migration fails with `BadRequest`.
const MIGRATION_TARGET: &str = "SomeHost";

/// Validator over the declared policy.
pub type PolicyValidator = ActionValidator<Arc<dyn PolicyAuthority>>;

#[derive(Debug, Error)]
pub enum CaseError {
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("role switch failed: {0}")]
    Role(#[from] RoleError),
    #[error("setup failed: {0}")]
    Setup(#[source] ApiError),
    #[error("protected call failed: {0}")]
    Operation(#[source] ApiError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl CaseError {
    /// The worker is stuck off its baseline role; nothing after this is
    /// trustworthy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CaseError::Lifecycle(LifecycleError::RoleRestore(_)))
    }
}

impl From<TestError<CaseError>> for CaseError {
    fn from(err: TestError<CaseError>) -> Self {
        match err {
            TestError::Body(e) => e,
            TestError::Lifecycle(e) => CaseError::Lifecycle(e),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComputeCase {
    ListServices,
    CreateServer,
    UpdateServer,
    DeleteServer,
    ForceDeleteServer,
    ResetNetwork,
    InjectNetworkInfo,
    LiveMigrate,
    Migrate,
    ListAggregates,
    CreateAgent,
    ListInstanceActions,
    ListInstanceUsageAuditLogs,
}

impl ComputeCase {
    pub const ALL: [ComputeCase; 13] = [
        ComputeCase::ListServices,
        ComputeCase::CreateServer,
        ComputeCase::UpdateServer,
        ComputeCase::DeleteServer,
        ComputeCase::ForceDeleteServer,
        ComputeCase::ResetNetwork,
        ComputeCase::InjectNetworkInfo,
        ComputeCase::LiveMigrate,
        ComputeCase::Migrate,
        ComputeCase::ListAggregates,
        ComputeCase::CreateAgent,
        ComputeCase::ListInstanceActions,
        ComputeCase::ListInstanceUsageAuditLogs,
    ];

    pub fn all() -> &'static [ComputeCase] {
        &Self::ALL
    }

    pub fn name(&self) -> &'static str {
        match self {
            ComputeCase::ListServices => "test_services_ext",
            ComputeCase::CreateServer => "test_create_server",
            ComputeCase::UpdateServer => "test_update_server",
            ComputeCase::DeleteServer => "test_delete_server",
            ComputeCase::ForceDeleteServer => "test_force_delete_server",
            ComputeCase::ResetNetwork => "test_reset_network_server",
            ComputeCase::InjectNetworkInfo => "test_inject_network_info_server",
            ComputeCase::LiveMigrate => "test_migration_live",
            ComputeCase::Migrate => "test_migration",
            ComputeCase::ListAggregates => "test_aggregate_list",
            ComputeCase::CreateAgent => "test_create_agent",
            ComputeCase::ListInstanceActions => "test_list_instance_actions",
            ComputeCase::ListInstanceUsageAuditLogs => "test_list_instance_usage_audit_logs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|case| case.name() == name)
    }

    pub fn rule(&self) -> &'static str {
        match self {
            ComputeCase::ListServices => rules::SERVICES,
            ComputeCase::CreateServer => rules::CREATE,
            ComputeCase::UpdateServer => rules::UPDATE,
            ComputeCase::DeleteServer => rules::DELETE,
            ComputeCase::ForceDeleteServer => rules::FORCE_DELETE,
            ComputeCase::ResetNetwork => rules::RESET_NETWORK,
            ComputeCase::InjectNetworkInfo => rules::INJECT_NETWORK_INFO,
            ComputeCase::LiveMigrate => rules::MIGRATE_LIVE,
            ComputeCase::Migrate => rules::MIGRATE,
            ComputeCase::ListAggregates => rules::AGGREGATES,
            ComputeCase::CreateAgent => rules::AGENTS,
            ComputeCase::ListInstanceActions => rules::INSTANCE_ACTIONS,
            ComputeCase::ListInstanceUsageAuditLogs => rules::INSTANCE_USAGE_AUDIT_LOG,
        }
    }

    fn idempotent_id(&self) -> Uuid {
        match self {
            ComputeCase::ListServices => uuid!("ec55d455-bab2-4c36-b282-ae3af0efe287"),
            ComputeCase::CreateServer => uuid!("4f34c73a-6ddc-4677-976f-71320fa855bd"),
            ComputeCase::UpdateServer => uuid!("077b17cb-5621-43b9-8adf-5725f0d7a863"),
            ComputeCase::DeleteServer => uuid!("062e3440-e873-4b41-9317-bf6d8be50c12"),
            ComputeCase::ForceDeleteServer => uuid!("864d5e4c-64f8-49a9-8573-d23d562a519d"),
            ComputeCase::ResetNetwork => uuid!("e931f67d-247e-4fad-b306-9a37497556f3"),
            ComputeCase::InjectNetworkInfo => uuid!("14b9f257-f265-477e-8999-2f3196da8622"),
            ComputeCase::LiveMigrate => uuid!("532ff6d0-b3f7-464b-8211-9c4b75180228"),
            ComputeCase::Migrate => uuid!("5a8c6ac1-7061-429c-8729-485c799426ac"),
            ComputeCase::ListAggregates => uuid!("f4fcace1-317c-4448-b873-17a956655d85"),
            ComputeCase::CreateAgent => uuid!("f8fe1447-e62e-4615-98ea-ac083e36eb09"),
            ComputeCase::ListInstanceActions => uuid!("1e5a71f0-fe55-417f-b93a-ec29a3c29f10"),
            ComputeCase::ListInstanceUsageAuditLogs => {
                uuid!("53ec8eef-9d04-4637-ab2d-d14c6d320bbe")
            }
        }
    }

    pub fn spec(&self) -> RuleSpec {
        let spec = RuleSpec::new(COMPONENT, SERVICE, self.rule()).with_id(self.idempotent_id());
        match self {
            // Some other policy may block the build; nova reports that as a fault.
            ComputeCase::CreateServer | ComputeCase::UpdateServer => {
                spec.with_extra_denials([ErrorKind::ServerFault])
            }
            _ => spec,
        }
    }

    async fn probe<K, C>(
        self,
        scope: &mut TestScope<C>,
        client: Arc<K>,
        validator: PolicyValidator,
    ) -> Result<ValidationResult, CaseError>
    where
        K: ComputeClient + 'static,
        C: Credentials,
    {
        let spec = self.spec();
        let role = scope.probed_role().clone();

        match self {
            ComputeCase::ListServices => {
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.list_services()).await
            }
            ComputeCase::CreateServer => {
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                let outcome = client.create_server(&rand_name("server")).await;
                if let Ok(server) = &outcome {
                    let ip = first_address(server);
                    let c = Arc::clone(&client);
                    scope.add_cleanup(format!("port of {}", server.id), async move {
                        delete_port_with_ip(c.as_ref(), ip).await
                    });
                    cleanup_server(scope, &client, server.id);
                }
                expectation.classify(outcome).map_err(CaseError::Operation)
            }
            ComputeCase::UpdateServer => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                let new_name = rand_name("server");
                observe(expectation, client.update_server(&server.id, &new_name)).await
            }
            ComputeCase::DeleteServer => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.delete_server(&server.id)).await
            }
            ComputeCase::ForceDeleteServer => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.force_delete_server(&server.id)).await
            }
            ComputeCase::ResetNetwork => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.reset_network(&server.id)).await
            }
            ComputeCase::InjectNetworkInfo => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.inject_network_info(&server.id)).await
            }
            ComputeCase::LiveMigrate => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                // BadRequest for the bogus host means the call got past policy.
                let outcome = client
                    .live_migrate_server(&server.id, MIGRATION_TARGET, false)
                    .await
                    .tolerate(&[ErrorKind::BadRequest]);
                expectation.classify(outcome).map_err(CaseError::Operation)
            }
            ComputeCase::Migrate => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.migrate_server(&server.id)).await
            }
            ComputeCase::ListAggregates => {
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.list_aggregates()).await
            }
            ComputeCase::CreateAgent => {
                let params = CreateAgentParams {
                    hypervisor: "kvm".to_string(),
                    os: "win".to_string(),
                    architecture: "x86".to_string(),
                    version: "7.0".to_string(),
                    url: "xxx://xxxx/xxx/xxx".to_string(),
                    md5hash: "add6bb58e139be103324d04d82d8f545".to_string(),
                };
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                let outcome = client.create_agent(&params).await;
                if let Ok(agent) = &outcome {
                    let c = Arc::clone(&client);
                    let id = agent.agent_id;
                    scope.add_cleanup(format!("agent {}", id), async move {
                        c.delete_agent(&id).await
                    });
                }
                expectation.classify(outcome).map_err(CaseError::Operation)
            }
            ComputeCase::ListInstanceActions => {
                let server = setup_server(scope, &client).await?;
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.list_instance_actions(&server.id)).await
            }
            ComputeCase::ListInstanceUsageAuditLogs => {
                let expectation = validator.expect(&spec, &role)?;
                scope.switch_role(true).await?;
                observe(expectation, client.list_instance_usage_audit_logs()).await
            }
        }
    }
}

impl std::fmt::Display for ComputeCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

async fn observe<T, Fut>(expectation: Expectation, call: Fut) -> Result<ValidationResult, CaseError>
where
    Fut: Future<Output = Result<T, ApiError>>,
{
    expectation.observe(call).await.map_err(CaseError::Operation)
}

/// Random resource name, unique per call.
pub fn rand_name(prefix: &str) -> String {
    format!("gatecheck-{}-{}", prefix, Uuid::new_v4().simple())
}

fn first_address(server: &Server) -> Option<String> {
    server
        .addresses
        .values()
        .flatten()
        .next()
        .map(|a| a.addr.clone())
}

fn cleanup_server<K, C>(scope: &mut TestScope<C>, client: &Arc<K>, id: ServerId)
where
    K: ComputeClient + 'static,
    C: Credentials,
{
    let c = Arc::clone(client);
    scope.add_cleanup(format!("server {}", id), async move {
        c.delete_server(&id).await
    });
}

/// The port bound to the server's first address.
async fn network_port<K: ComputeClient + ?Sized>(
    client: &K,
    server: &ServerId,
) -> Result<Option<PortId>, ApiError> {
    let addresses = client.list_addresses(server).await?;
    let Some(ip) = addresses.values().flatten().next().map(|a| a.addr.clone()) else {
        return Ok(None);
    };
    let ports = client.list_ports().await?;
    Ok(ports
        .into_iter()
        .find(|p| p.fixed_ips.contains(&ip))
        .map(|p| p.id))
}

async fn delete_port_with_ip<K: ComputeClient + ?Sized>(
    client: &K,
    ip: Option<String>,
) -> Result<(), ApiError> {
    let Some(ip) = ip else {
        return Ok(());
    };
    let ports = client.list_ports().await?;
    match ports.into_iter().find(|p| p.fixed_ips.contains(&ip)) {
        Some(port) => client.delete_port(&port.id).await,
        None => Ok(()),
    }
}

/// Create a server as the baseline role and schedule its removal.
///
/// Deleting a server leaves its port behind, so the port gets its own
/// cleanup, queued first so that it runs after the server's.
async fn setup_server<K, C>(scope: &mut TestScope<C>, client: &Arc<K>) -> Result<Server, CaseError>
where
    K: ComputeClient + 'static,
    C: Credentials,
{
    let server = client
        .create_server(&rand_name("server"))
        .await
        .map_err(CaseError::Setup)?;

    match network_port(client.as_ref(), &server.id).await {
        Ok(Some(port)) => {
            let c = Arc::clone(client);
            scope.add_cleanup(format!("port {}", port), async move {
                c.delete_port(&port).await
            });
        }
        Ok(None) => warn!("Server {} has no network port", server.id),
        Err(e) => {
            cleanup_server(scope, client, server.id);
            return Err(CaseError::Setup(e));
        }
    }
    cleanup_server(scope, client, server.id);
    Ok(server)
}

/// Runs compute cases for one worker.
pub struct ComputeRbacSuite<K, C> {
    client: Arc<K>,
    validator: PolicyValidator,
    lifecycle: RbacTestLifecycle<C>,
}

impl<K, C> ComputeRbacSuite<K, C>
where
    K: ComputeClient + 'static,
    C: Credentials + 'static,
{
    pub fn new(client: Arc<K>, validator: PolicyValidator, lifecycle: RbacTestLifecycle<C>) -> Self {
        Self {
            client,
            validator,
            lifecycle,
        }
    }

    pub async fn run_case(&mut self, case: ComputeCase) -> Result<ValidationResult, CaseError> {
        let client = Arc::clone(&self.client);
        let validator = self.validator.clone();
        self.lifecycle
            .run(case.name(), move |scope| {
                case.probe(scope, client, validator).boxed()
            })
            .await
            .map_err(CaseError::from)
    }

    /// Run `cases` in order, recording one report per case.
    ///
    /// Stops early if the worker cannot get back to its baseline role.
    pub async fn run_all<R: ReportLog + ?Sized>(
        &mut self,
        cases: &[ComputeCase],
        log: &R,
    ) -> Result<Vec<ValidationReport>, ReportError> {
        let role = self.lifecycle.switcher().probed_role().clone();
        let mut reports = Vec::with_capacity(cases.len());

        for &case in cases {
            let spec = case.spec();
            let (report, fatal) = match self.run_case(case).await {
                Ok(result) => (ValidationReport::from_result(&spec, &result), false),
                Err(e) => {
                    warn!("{} as {}: {}", case, role, e);
                    let fatal = e.is_fatal();
                    (ValidationReport::error(&spec, &role, e.to_string()), fatal)
                }
            };
            info!("{} as {}: {}", case, role, report.verdict);
            log.record(report.clone()).await?;
            reports.push(report);

            if fatal {
                error!("Worker could not return to its baseline role; stopping run");
                break;
            }
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockComputeClient;
    use crate::fake::FakeCompute;
    use gatecheck_policy::{Policy, Role};
    use gatecheck_roles::{RoleSwitcher, SessionCredentials, SessionView};
    use gatecheck_validate::{MemoryReportLog, Mismatch, Verdict};

    const DECLARED: &str = r#"{
        "admin_only": "role:admin",
        "admin_or_member": "role:admin or role:member",
        "default": "rule:admin_or_member",
        "compute_extension:services": "rule:admin_only",
        "compute:create": "rule:admin_or_member",
        "compute:get": "rule:admin_or_member",
        "compute:update": "rule:admin_or_member",
        "compute:delete": "rule:admin_or_member",
        "compute:force_delete": "rule:admin_only",
        "compute_extension:admin_actions:resetNetwork": "rule:admin_only",
        "compute_extension:admin_actions:injectNetworkInfo": "rule:admin_only",
        "compute_extension:admin_actions:migrateLive": "rule:admin_only",
        "compute_extension:admin_actions:migrate": "rule:admin_only",
        "compute_extension:aggregates": "rule:admin_only",
        "compute_extension:agents": "rule:admin_only",
        "compute_extension:instance_actions": "rule:admin_or_member",
        "compute_extension:instance_usage_audit_log": "rule:admin_only",
        "network:get_port": "rule:admin_or_member",
        "network:delete_port": "rule:admin_or_member"
    }"#;

    fn policy(json: &str) -> Arc<dyn PolicyAuthority> {
        Arc::new(Policy::from_json_str(json).unwrap())
    }

    async fn suite(
        deployed: &str,
        probed: &str,
    ) -> (
        Arc<FakeCompute>,
        SessionView,
        ComputeRbacSuite<crate::FakeComputeClient, SessionCredentials>,
    ) {
        let service = Arc::new(FakeCompute::new(policy(deployed)));
        let session = SessionCredentials::new(Role::new("admin"));
        let view = session.view();
        let client = Arc::new(service.client(view.clone()));
        let switcher = RoleSwitcher::new(session, Role::new("admin"), Role::new(probed))
            .await
            .unwrap();
        let suite = ComputeRbacSuite::new(
            client,
            ActionValidator::new(policy(DECLARED)),
            RbacTestLifecycle::new(switcher),
        );
        (service, view, suite)
    }

    #[tokio::test]
    async fn every_case_passes_when_deployment_matches_policy() {
        for probed in ["admin", "member"] {
            let (service, session, mut suite) = suite(DECLARED, probed).await;
            for &case in ComputeCase::all() {
                let result = suite.run_case(case).await.unwrap();
                assert!(result.passed(), "{} as {}: {:?}", case, probed, result);
                assert_eq!(session.role().await, Role::new("admin"));
            }
            assert_eq!(service.server_count().await, 0);
            assert_eq!(service.port_count().await, 0);
            assert_eq!(service.agent_count().await, 0);
        }
    }

    #[tokio::test]
    async fn permissive_deployment_is_over_permission() {
        let deployed = DECLARED.replace(
            r#""compute:force_delete": "rule:admin_only""#,
            r#""compute:force_delete": "@""#,
        );
        let (service, _session, mut suite) = suite(&deployed, "member").await;
        let result = suite.run_case(ComputeCase::ForceDeleteServer).await.unwrap();
        assert_eq!(result.mismatch, Some(Mismatch::OverPermission));
        assert_eq!(service.port_count().await, 0);
    }

    #[tokio::test]
    async fn restrictive_deployment_is_under_permission() {
        let deployed = DECLARED.replace(
            r#""compute:delete": "rule:admin_or_member""#,
            r#""compute:delete": "rule:admin_only""#,
        );
        let (service, _session, mut suite) = suite(&deployed, "member").await;
        let result = suite.run_case(ComputeCase::DeleteServer).await.unwrap();
        assert_eq!(result.mismatch, Some(Mismatch::UnderPermission));
        assert_eq!(result.actual.error_kind, Some(ErrorKind::Forbidden));
        // The baseline cleanup removes what the probed role could not.
        assert_eq!(service.server_count().await, 0);
    }

    #[tokio::test]
    async fn build_fault_counts_as_denial() {
        let deployed = DECLARED.replace(
            r#""compute:create": "rule:admin_or_member","#,
            r#""compute:create": "rule:admin_or_member", "compute:create:attach_network": "role:admin","#,
        );
        let (_service, _session, mut suite) = suite(&deployed, "member").await;
        let result = suite.run_case(ComputeCase::CreateServer).await.unwrap();
        assert_eq!(result.mismatch, Some(Mismatch::UnderPermission));
        assert_eq!(result.actual.error_kind, Some(ErrorKind::ServerFault));
    }

    #[tokio::test]
    async fn authorized_live_migration_to_bogus_host_passes() {
        let (_service, _session, mut suite) = suite(DECLARED, "admin").await;
        let result = suite.run_case(ComputeCase::LiveMigrate).await.unwrap();
        assert!(result.passed());
        assert!(result.actual.allowed);
    }

    #[tokio::test]
    async fn rule_missing_from_declared_policy_is_a_policy_error() {
        let service = Arc::new(FakeCompute::new(policy(DECLARED)));
        let session = SessionCredentials::new(Role::new("admin"));
        let client = service.client(session.view());
        let switcher = RoleSwitcher::new(session, Role::new("admin"), Role::new("member"))
            .await
            .unwrap();
        let mut suite = ComputeRbacSuite::new(
            Arc::new(client),
            ActionValidator::new(policy(r#"{"compute:create": "@"}"#)),
            RbacTestLifecycle::new(switcher),
        );
        let err = suite.run_case(ComputeCase::ListServices).await.unwrap_err();
        assert!(matches!(
            err,
            CaseError::Policy(PolicyError::RuleNotFound { .. })
        ));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn unrelated_failure_is_reported_as_error() {
        let mut client = MockComputeClient::new();
        client
            .expect_list_services()
            .returning(|| Err(ApiError::conflict("service catalog busy")));

        let session = SessionCredentials::new(Role::new("admin"));
        let view = session.view();
        let switcher = RoleSwitcher::new(session, Role::new("admin"), Role::new("member"))
            .await
            .unwrap();
        let mut suite = ComputeRbacSuite::new(
            Arc::new(client),
            ActionValidator::new(policy(DECLARED)),
            RbacTestLifecycle::new(switcher),
        );

        let log = MemoryReportLog::new();
        let reports = suite
            .run_all(&[ComputeCase::ListServices], &log)
            .await
            .unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].verdict, Verdict::Error);
        assert!(reports[0]
            .detail
            .as_deref()
            .unwrap()
            .contains("service catalog busy"));
        assert_eq!(view.role().await, Role::new("admin"));
    }

    #[tokio::test]
    async fn run_all_records_every_case() {
        let (_service, _session, mut suite) = suite(DECLARED, "member").await;
        let log = MemoryReportLog::new();
        let reports = suite.run_all(ComputeCase::all(), &log).await.unwrap();

        assert_eq!(reports.len(), ComputeCase::ALL.len());
        let summary = log.summary().await;
        assert!(summary.is_clean(), "{}", summary);
        assert!(reports
            .iter()
            .all(|r| r.component == COMPONENT && r.idempotent_id.is_some()));
    }

    #[test]
    fn cases_are_found_by_name() {
        for &case in ComputeCase::all() {
            assert_eq!(ComputeCase::from_name(case.name()), Some(case));
        }
        assert_eq!(ComputeCase::from_name("test_evacuate"), None);
    }

    #[test]
    fn create_and_update_accept_server_fault() {
        assert!(ComputeCase::CreateServer
            .spec()
            .is_denial(ErrorKind::ServerFault));
        assert!(!ComputeCase::DeleteServer
            .spec()
            .is_denial(ErrorKind::ServerFault));
    }

    #[test]
    fn rand_names_differ() {
        assert_ne!(rand_name("server"), rand_name("server"));
        assert!(rand_name("server").starts_with("gatecheck-server-"));
    }
}
