//! ApsaraStack Provider
//!
//! Configuration core of the ApsaraStack provider: credential resolution,
//! STS AssumeRole, client configuration, and the attribute validators and
//! diff suppressors used by resource schemas.
//!
//! ## Module Structure
//!
//! - `profile` - Local credentials profile file
//! - `credentials` - Merges the provider block with the profile
//! - `sts` - AssumeRole exchange
//! - `metadata` - ECS RAM role credentials
//! - `config` - Effective configuration and endpoints
//! - `client` - Client handed to resource operations
//! - `provider` - ApsaraStackProvider and the configure flow
//! - `schemas` - Provider block and resource attribute schemas
//! - `validators` / `diff_suppress` - Attribute predicates

pub mod client;
pub mod config;
pub mod credentials;
pub mod diff_suppress;
pub mod metadata;
pub mod profile;
pub mod provider;
pub mod schemas;
mod sign;
pub mod sts;
pub mod validators;

// Re-export main types
pub use client::ApsaraStackClient;
pub use config::Config;
pub use provider::ApsaraStackProvider;

use apsarastack_core::provider::{BoxFuture, Provider, ProviderResult};
use apsarastack_core::resource::ResourceData;
use apsarastack_core::schema::ResourceSchema;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for ApsaraStackProvider {
    type Client = ApsaraStackClient;

    fn name(&self) -> &'static str {
        "apsarastack"
    }

    fn schema(&self) -> ResourceSchema {
        schemas::provider_schema()
    }

    fn resource_schemas(&self) -> Vec<ResourceSchema> {
        schemas::all_schemas()
    }

    fn configure(&self, data: ResourceData) -> BoxFuture<'_, ProviderResult<ApsaraStackClient>> {
        Box::pin(async move { self.configure_client(&data).await })
    }
}
