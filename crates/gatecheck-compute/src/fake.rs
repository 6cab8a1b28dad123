//! In-memory compute service.
//!
//! [`FakeCompute`] enforces a *deployed* policy on every call, which may
//! differ from the policy the validator expects. That difference is what
//! the RBAC cases detect. Each worker talks to the shared service through
//! its own [`FakeComputeClient`], which presents the worker's active role.

use async_trait::async_trait;
use chrono::Utc;
use gatecheck_policy::{PolicyAuthority, PolicyError, Role};
use gatecheck_roles::SessionView;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::client::ComputeClient;
use crate::types::*;
use crate::{rules, ApiError};

pub const FIXED_NETWORK: &str = "private";
const AVAILABILITY_ZONE: &str = "nova";

#[derive(Default)]
struct State {
    servers: BTreeMap<ServerId, Server>,
    ports: BTreeMap<PortId, Port>,
    aggregates: BTreeMap<AggregateId, Aggregate>,
    agents: BTreeMap<AgentId, Agent>,
    actions: HashMap<ServerId, Vec<InstanceAction>>,
    next_agent: u64,
    next_ip: u32,
}

impl State {
    fn server_mut(&mut self, id: &ServerId) -> Result<&mut Server, ApiError> {
        self.servers
            .get_mut(id)
            .ok_or_else(|| ApiError::not_found(format!("Instance {}", id)))
    }

    fn record_action(&mut self, server: ServerId, action: &str, role: &Role) {
        self.actions.entry(server).or_default().push(InstanceAction {
            action: action.to_string(),
            instance_uuid: server,
            request_id: format!("req-{}", Uuid::new_v4()),
            role: role.to_string(),
            start_time: Utc::now(),
        });
    }

    fn allocate_ip(&mut self) -> String {
        let n = self.next_ip;
        self.next_ip += 1;
        format!("10.0.{}.{}", n / 250, n % 250 + 2)
    }
}

pub struct FakeCompute {
    policy: Arc<dyn PolicyAuthority>,
    hosts: Vec<String>,
    state: Mutex<State>,
}

impl FakeCompute {
    pub fn new(policy: Arc<dyn PolicyAuthority>) -> Self {
        Self {
            policy,
            hosts: vec!["compute-1".to_string(), "compute-2".to_string()],
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Pre-existing aggregates, each spanning every known host.
    pub fn with_aggregates<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = self.state.get_mut();
        for name in names {
            let id = AggregateId(state.aggregates.len() as u64 + 1);
            state.aggregates.insert(
                id,
                Aggregate {
                    id,
                    name: name.into(),
                    availability_zone: Some(AVAILABILITY_ZONE.to_string()),
                    hosts: self.hosts.clone(),
                },
            );
        }
        self
    }

    /// A client presenting whatever role `session` currently holds.
    pub fn client(self: &Arc<Self>, session: SessionView) -> FakeComputeClient {
        FakeComputeClient {
            service: Arc::clone(self),
            session,
        }
    }

    pub async fn server_count(&self) -> usize {
        self.state.lock().await.servers.len()
    }

    pub async fn port_count(&self) -> usize {
        self.state.lock().await.ports.len()
    }

    pub async fn agent_count(&self) -> usize {
        self.state.lock().await.agents.len()
    }

    /// Does the deployed policy let `role` through `rule`?
    ///
    /// Rules absent from the deployed policy fall back to [`rules::DEFAULT`];
    /// with no default either, the call is denied.
    fn check(&self, rule: &str, role: &Role) -> Result<bool, ApiError> {
        match self.policy.is_authorized(rule, role) {
            Ok(allowed) => Ok(allowed),
            Err(PolicyError::RuleNotFound { .. }) => {
                match self.policy.is_authorized(rules::DEFAULT, role) {
                    Ok(allowed) => Ok(allowed),
                    Err(PolicyError::RuleNotFound { .. }) => Ok(false),
                    Err(e) => Err(ApiError::server_fault(e.to_string())),
                }
            }
            Err(e) => Err(ApiError::server_fault(e.to_string())),
        }
    }

    fn authorize(&self, rule: &str, role: &Role) -> Result<(), ApiError> {
        if self.check(rule, role)? {
            debug!("{} permitted for role {}", rule, role);
            Ok(())
        } else {
            debug!("{} forbidden for role {}", rule, role);
            Err(ApiError::forbidden(rule))
        }
    }

    pub async fn list_services(&self, role: &Role) -> Result<Vec<ComputeService>, ApiError> {
        self.authorize(rules::SERVICES, role)?;
        let mut services = vec![ComputeService {
            binary: "nova-scheduler".to_string(),
            host: "controller".to_string(),
            zone: "internal".to_string(),
            status: "enabled".to_string(),
            state: "up".to_string(),
        }];
        services.extend(self.hosts.iter().map(|host| ComputeService {
            binary: "nova-compute".to_string(),
            host: host.clone(),
            zone: AVAILABILITY_ZONE.to_string(),
            status: "enabled".to_string(),
            state: "up".to_string(),
        }));
        Ok(services)
    }

    pub async fn create_server(&self, role: &Role, name: &str) -> Result<Server, ApiError> {
        self.authorize(rules::CREATE, role)?;
        // A later policy failure during the build surfaces as a fault, and
        // only when the deployed policy defines the rule.
        match self.policy.is_authorized(rules::CREATE_ATTACH_NETWORK, role) {
            Ok(true) | Err(PolicyError::RuleNotFound { .. }) => {}
            Ok(false) => {
                warn!(
                    "Build of {} failed: {} denied for role {}",
                    name,
                    rules::CREATE_ATTACH_NETWORK,
                    role
                );
                return Err(ApiError::server_fault(format!(
                    "Build of instance {} aborted: network attach not permitted",
                    name
                )));
            }
            Err(e) => return Err(ApiError::server_fault(e.to_string())),
        }
        let host = self
            .hosts
            .first()
            .cloned()
            .ok_or_else(|| ApiError::server_fault("No valid host was found."))?;

        let mut state = self.state.lock().await;
        let id = ServerId(Uuid::new_v4());
        let ip = state.allocate_ip();
        let port = Port {
            id: PortId(Uuid::new_v4()),
            network: FIXED_NETWORK.to_string(),
            device_id: Some(id),
            fixed_ips: vec![ip.clone()],
        };
        let server = Server {
            id,
            name: name.to_string(),
            status: ServerStatus::Active,
            host,
            addresses: BTreeMap::from([(
                FIXED_NETWORK.to_string(),
                vec![Address { addr: ip, version: 4 }],
            )]),
        };
        state.ports.insert(port.id, port);
        state.servers.insert(id, server.clone());
        state.record_action(id, "create", role);
        debug!("Created server {} ({})", name, id);
        Ok(server)
    }

    pub async fn get_server(&self, role: &Role, id: &ServerId) -> Result<Server, ApiError> {
        self.authorize(rules::GET, role)?;
        let mut state = self.state.lock().await;
        Ok(state.server_mut(id)?.clone())
    }

    pub async fn update_server(
        &self,
        role: &Role,
        id: &ServerId,
        name: &str,
    ) -> Result<Server, ApiError> {
        self.authorize(rules::UPDATE, role)?;
        let mut state = self.state.lock().await;
        let server = state.server_mut(id)?;
        server.name = name.to_string();
        Ok(server.clone())
    }

    async fn remove_server(&self, rule: &str, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.authorize(rule, role)?;
        let mut state = self.state.lock().await;
        if state.servers.remove(id).is_none() {
            return Err(ApiError::not_found(format!("Instance {}", id)));
        }
        state.actions.remove(id);
        // The port outlives the server; only its binding goes.
        for port in state.ports.values_mut() {
            if port.device_id == Some(*id) {
                port.device_id = None;
            }
        }
        debug!("Deleted server {}", id);
        Ok(())
    }

    pub async fn delete_server(&self, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.remove_server(rules::DELETE, role, id).await
    }

    pub async fn force_delete_server(&self, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.remove_server(rules::FORCE_DELETE, role, id).await
    }

    pub async fn list_addresses(
        &self,
        role: &Role,
        id: &ServerId,
    ) -> Result<BTreeMap<String, Vec<Address>>, ApiError> {
        self.authorize(rules::GET, role)?;
        let mut state = self.state.lock().await;
        Ok(state.server_mut(id)?.addresses.clone())
    }

    async fn server_action(
        &self,
        rule: &str,
        action: &str,
        role: &Role,
        id: &ServerId,
    ) -> Result<(), ApiError> {
        self.authorize(rule, role)?;
        let mut state = self.state.lock().await;
        state.server_mut(id)?;
        state.record_action(*id, action, role);
        Ok(())
    }

    pub async fn reset_network(&self, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.server_action(rules::RESET_NETWORK, "resetNetwork", role, id)
            .await
    }

    pub async fn inject_network_info(&self, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.server_action(rules::INJECT_NETWORK_INFO, "injectNetworkInfo", role, id)
            .await
    }

    pub async fn live_migrate_server(
        &self,
        role: &Role,
        id: &ServerId,
        host: &str,
        block_migration: bool,
    ) -> Result<(), ApiError> {
        self.authorize(rules::MIGRATE_LIVE, role)?;
        let mut state = self.state.lock().await;
        let server = state.server_mut(id)?;
        if !self.hosts.iter().any(|h| h == host) {
            return Err(ApiError::bad_request(format!(
                "Compute service of {} is unavailable at this time.",
                host
            )));
        }
        if server.host == host {
            return Err(ApiError::bad_request(format!(
                "The supplied target host {} is the source host",
                host
            )));
        }
        server.host = host.to_string();
        debug!(
            "Live-migrated {} to {} (block_migration={})",
            id, host, block_migration
        );
        state.record_action(*id, "live-migration", role);
        Ok(())
    }

    pub async fn migrate_server(&self, role: &Role, id: &ServerId) -> Result<(), ApiError> {
        self.authorize(rules::MIGRATE, role)?;
        let mut state = self.state.lock().await;
        let server = state.server_mut(id)?;
        let target = self
            .hosts
            .iter()
            .find(|h| **h != server.host)
            .cloned()
            .ok_or_else(|| ApiError::bad_request("No valid host was found."))?;
        server.host = target;
        server.status = ServerStatus::VerifyResize;
        state.record_action(*id, "migrate", role);
        Ok(())
    }

    pub async fn list_instance_actions(
        &self,
        role: &Role,
        id: &ServerId,
    ) -> Result<Vec<InstanceAction>, ApiError> {
        self.authorize(rules::INSTANCE_ACTIONS, role)?;
        let mut state = self.state.lock().await;
        state.server_mut(id)?;
        Ok(state.actions.get(id).cloned().unwrap_or_default())
    }

    pub async fn list_instance_usage_audit_logs(
        &self,
        role: &Role,
    ) -> Result<UsageAuditLog, ApiError> {
        self.authorize(rules::INSTANCE_USAGE_AUDIT_LOG, role)?;
        let period_ending = Utc::now();
        Ok(UsageAuditLog {
            period_beginning: period_ending - chrono::Duration::hours(1),
            period_ending,
            num_hosts: self.hosts.len(),
            num_hosts_done: self.hosts.len(),
            hosts_not_run: Vec::new(),
            overall_status: "ALL hosts done. 0 errors.".to_string(),
        })
    }

    pub async fn list_ports(&self, role: &Role) -> Result<Vec<Port>, ApiError> {
        self.authorize(rules::GET_PORT, role)?;
        Ok(self.state.lock().await.ports.values().cloned().collect())
    }

    pub async fn delete_port(&self, role: &Role, id: &PortId) -> Result<(), ApiError> {
        self.authorize(rules::DELETE_PORT, role)?;
        match self.state.lock().await.ports.remove(id) {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found(format!("Port {}", id))),
        }
    }

    pub async fn list_aggregates(&self, role: &Role) -> Result<Vec<Aggregate>, ApiError> {
        self.authorize(rules::AGGREGATES, role)?;
        Ok(self.state.lock().await.aggregates.values().cloned().collect())
    }

    pub async fn create_agent(
        &self,
        role: &Role,
        params: &CreateAgentParams,
    ) -> Result<Agent, ApiError> {
        self.authorize(rules::AGENTS, role)?;
        let mut state = self.state.lock().await;
        state.next_agent += 1;
        let agent = Agent {
            agent_id: AgentId(state.next_agent),
            hypervisor: params.hypervisor.clone(),
            os: params.os.clone(),
            architecture: params.architecture.clone(),
            version: params.version.clone(),
            url: params.url.clone(),
            md5hash: params.md5hash.clone(),
        };
        state.agents.insert(agent.agent_id, agent.clone());
        Ok(agent)
    }

    pub async fn delete_agent(&self, role: &Role, id: &AgentId) -> Result<(), ApiError> {
        self.authorize(rules::AGENTS, role)?;
        match self.state.lock().await.agents.remove(id) {
            Some(_) => Ok(()),
            None => Err(ApiError::not_found(format!("Agent {}", id))),
        }
    }
}

/// One worker's connection to a [`FakeCompute`].
#[derive(Clone)]
pub struct FakeComputeClient {
    service: Arc<FakeCompute>,
    session: SessionView,
}

impl FakeComputeClient {
    async fn role(&self) -> Role {
        self.session.role().await
    }
}

#[async_trait]
impl ComputeClient for FakeComputeClient {
    async fn list_services(&self) -> Result<Vec<ComputeService>, ApiError> {
        self.service.list_services(&self.role().await).await
    }

    async fn create_server(&self, name: &str) -> Result<Server, ApiError> {
        self.service.create_server(&self.role().await, name).await
    }

    async fn update_server(&self, server_id: &ServerId, name: &str) -> Result<Server, ApiError> {
        self.service
            .update_server(&self.role().await, server_id, name)
            .await
    }

    async fn delete_server(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.service.delete_server(&self.role().await, server_id).await
    }

    async fn force_delete_server(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.service
            .force_delete_server(&self.role().await, server_id)
            .await
    }

    async fn list_addresses(
        &self,
        server_id: &ServerId,
    ) -> Result<BTreeMap<String, Vec<Address>>, ApiError> {
        self.service.list_addresses(&self.role().await, server_id).await
    }

    async fn reset_network(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.service.reset_network(&self.role().await, server_id).await
    }

    async fn inject_network_info(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.service
            .inject_network_info(&self.role().await, server_id)
            .await
    }

    async fn live_migrate_server(
        &self,
        server_id: &ServerId,
        host: &str,
        block_migration: bool,
    ) -> Result<(), ApiError> {
        self.service
            .live_migrate_server(&self.role().await, server_id, host, block_migration)
            .await
    }

    async fn migrate_server(&self, server_id: &ServerId) -> Result<(), ApiError> {
        self.service.migrate_server(&self.role().await, server_id).await
    }

    async fn list_instance_actions(
        &self,
        server_id: &ServerId,
    ) -> Result<Vec<InstanceAction>, ApiError> {
        self.service
            .list_instance_actions(&self.role().await, server_id)
            .await
    }

    async fn list_instance_usage_audit_logs(&self) -> Result<UsageAuditLog, ApiError> {
        self.service
            .list_instance_usage_audit_logs(&self.role().await)
            .await
    }

    async fn list_ports(&self) -> Result<Vec<Port>, ApiError> {
        self.service.list_ports(&self.role().await).await
    }

    async fn delete_port(&self, port_id: &PortId) -> Result<(), ApiError> {
        self.service.delete_port(&self.role().await, port_id).await
    }

    async fn list_aggregates(&self) -> Result<Vec<Aggregate>, ApiError> {
        self.service.list_aggregates(&self.role().await).await
    }

    async fn create_agent(&self, params: &CreateAgentParams) -> Result<Agent, ApiError> {
        self.service.create_agent(&self.role().await, params).await
    }

    async fn delete_agent(&self, agent_id: &AgentId) -> Result<(), ApiError> {
        self.service.delete_agent(&self.role().await, agent_id).await
    }
}
