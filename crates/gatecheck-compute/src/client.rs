//! The compute API surface RBAC cases probe.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::types::*;
use crate::ApiError;

/// Compute (and the few networking) calls made by the compute RBAC cases.
///
/// Every call is made as whatever role the client's credentials currently
/// hold. A call the deployed policy forbids fails with
/// [`ErrorKind::Forbidden`](gatecheck_validate::ErrorKind::Forbidden).
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
#[async_trait]
pub trait ComputeClient: Send + Sync {
    // ───────────────────────────────────── Services ───────────────────────────────────────

    async fn list_services(&self) -> Result<Vec<ComputeService>, ApiError>;

    // ───────────────────────────────────── Servers ────────────────────────────────────────

    async fn create_server(&self, name: &str) -> Result<Server, ApiError>;

    async fn update_server(&self, server_id: &ServerId, name: &str) -> Result<Server, ApiError>;

    async fn delete_server(&self, server_id: &ServerId) -> Result<(), ApiError>;

    async fn force_delete_server(&self, server_id: &ServerId) -> Result<(), ApiError>;

    async fn list_addresses(
        &self,
        server_id: &ServerId,
    ) -> Result<BTreeMap<String, Vec<Address>>, ApiError>;

    // ───────────────────────────────────── Admin actions ──────────────────────────────────

    async fn reset_network(&self, server_id: &ServerId) -> Result<(), ApiError>;

    async fn inject_network_info(&self, server_id: &ServerId) -> Result<(), ApiError>;

    /// `BadRequest` when `host` is not a known compute host.
    async fn live_migrate_server(
        &self,
        server_id: &ServerId,
        host: &str,
        block_migration: bool,
    ) -> Result<(), ApiError>;

    async fn migrate_server(&self, server_id: &ServerId) -> Result<(), ApiError>;

    async fn list_instance_actions(
        &self,
        server_id: &ServerId,
    ) -> Result<Vec<InstanceAction>, ApiError>;

    async fn list_instance_usage_audit_logs(&self) -> Result<UsageAuditLog, ApiError>;

    // ───────────────────────────────────── Ports ──────────────────────────────────────────

    async fn list_ports(&self) -> Result<Vec<Port>, ApiError>;

    async fn delete_port(&self, port_id: &PortId) -> Result<(), ApiError>;

    // ───────────────────────────────────── Aggregates ─────────────────────────────────────

    async fn list_aggregates(&self) -> Result<Vec<Aggregate>, ApiError>;

    // ───────────────────────────────────── Agents ─────────────────────────────────────────

    async fn create_agent(&self, params: &CreateAgentParams) -> Result<Agent, ApiError>;

    async fn delete_agent(&self, agent_id: &AgentId) -> Result<(), ApiError>;
}
