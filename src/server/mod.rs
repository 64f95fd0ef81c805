pub mod access;
mod deployments;
mod domains;
pub mod dto;
pub mod identity;
mod orgs;
mod registry_token;
pub mod response;
mod router;
pub mod validation;

pub use identity::{Identity, PRINCIPAL_GROUPS_HEADER, PRINCIPAL_ID_HEADER};
pub use router::{AppState, create_router};
