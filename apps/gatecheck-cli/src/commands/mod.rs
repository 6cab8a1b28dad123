pub mod policy;
pub mod role;
pub mod run;

pub use policy::{cmd_policy_check, cmd_policy_eval, cmd_policy_matrix};
pub use role::{cmd_role_current, cmd_role_list, cmd_role_use};
pub use run::cmd_run;
