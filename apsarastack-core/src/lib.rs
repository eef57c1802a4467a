//! ApsaraStack Core
//!
//! Attribute model, schemas, differ and provider trait shared by the
//! ApsaraStack provider and its CLI

pub mod differ;
pub mod env;
pub mod provider;
pub mod resource;
pub mod schema;
