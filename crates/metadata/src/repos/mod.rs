//! Repository traits, one per entity family.

pub mod delegations;
pub mod keygen;
pub mod keys;
pub mod roles;
pub mod roots;
pub mod targets;
pub mod tenants;

pub use delegations::DelegationRepo;
pub use keygen::{KeyGenRepo, KeyGenStatus};
pub use keys::KeyRepo;
pub use roles::{SignedRoleRepo, TargetItemChange};
pub use roots::RootRoleRepo;
pub use targets::{TargetItemPage, TargetItemRepo};
pub use tenants::RepoRepo;
