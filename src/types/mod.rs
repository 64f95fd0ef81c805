mod id;
mod models;
mod permission;

pub use id::{Id, InvalidId};
pub use models::*;
pub use permission::Permission;
