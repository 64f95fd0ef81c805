mod ancestry;
mod catalog;
mod evaluator;

pub use ancestry::ancestor_chain;
pub use catalog::{ADMIN, DEPLOYER, OWNER, REGISTRY_CONSUMER, REGISTRY_PUBLISHER};
pub use catalog::{Role, RoleCatalog, RoleId};
pub use evaluator::{Evaluator, GrantSet};
