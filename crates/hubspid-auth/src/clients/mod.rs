//! Adapters for external services.

pub mod attribute_authority;
pub mod user_registry;

pub use attribute_authority::{AttributeAuthority, HttpAttributeAuthority};
pub use user_registry::{HttpPersonalDataVault, PersonalDataVault};
