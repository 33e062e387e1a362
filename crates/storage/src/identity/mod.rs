//! Identity and role records plus the durable stores that serve them.

mod model;
mod store;

pub use model::{Identity, Role};
pub use store::{IdentityStore, MemoryIdentityStore, MemoryRoleStore, RoleStore};
