//! Policy rule names enforced by the compute service.

/// Consulted when a rule is missing from the deployed policy
pub const DEFAULT: &str = "default";

pub const SERVICES: &str = "compute_extension:services";
pub const CREATE: &str = "compute:create";
/// Secondary check during create; a denial surfaces as a server fault
pub const CREATE_ATTACH_NETWORK: &str = "compute:create:attach_network";
pub const GET: &str = "compute:get";
pub const UPDATE: &str = "compute:update";
pub const DELETE: &str = "compute:delete";
pub const FORCE_DELETE: &str = "compute:force_delete";
pub const RESET_NETWORK: &str = "compute_extension:admin_actions:resetNetwork";
pub const INJECT_NETWORK_INFO: &str = "compute_extension:admin_actions:injectNetworkInfo";
pub const MIGRATE_LIVE: &str = "compute_extension:admin_actions:migrateLive";
pub const MIGRATE: &str = "compute_extension:admin_actions:migrate";
pub const AGGREGATES: &str = "compute_extension:aggregates";
pub const AGENTS: &str = "compute_extension:agents";
pub const INSTANCE_ACTIONS: &str = "compute_extension:instance_actions";
pub const INSTANCE_USAGE_AUDIT_LOG: &str = "compute_extension:instance_usage_audit_log";

pub const GET_PORT: &str = "network:get_port";
pub const DELETE_PORT: &str = "network:delete_port";
