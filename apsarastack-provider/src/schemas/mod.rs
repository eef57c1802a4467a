//! ApsaraStack schema definitions
//!
//! Only the attributes that carry a validator or a diff suppressor, plus the
//! attributes those predicates read, are declared for each resource.

pub mod ecs;
pub mod provider;
pub mod vpc;

use apsarastack_core::schema::ResourceSchema;

pub use provider::provider_schema;

/// Returns every resource schema of the provider
pub fn all_schemas() -> Vec<ResourceSchema> {
    vec![
        vpc::vpc_schema(),
        vpc::vswitch_schema(),
        ecs::instance_schema(),
        ecs::security_group_rule_schema(),
        ecs::image_share_permission_schema(),
    ]
}
