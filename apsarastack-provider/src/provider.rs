//! ApsaraStack provider configuration
//!
//! Turns a provider block into an [`ApsaraStackClient`]:
//! resolve credentials → ECS role credentials → endpoints → AssumeRole →
//! configuration source → client.

use std::collections::HashMap;

use apsarastack_core::env::Env;
use apsarastack_core::provider::{ProviderError, ProviderResult};
use apsarastack_core::resource::{ResourceData, Value};
use apsarastack_core::schema::TypeError;
use log::{debug, info};

use crate::client::{ApsaraStackClient, http_client};
use crate::config::{Config, Endpoints};
use crate::credentials::CredentialResolver;
use crate::metadata::{DEFAULT_METADATA_URL, MetadataClient};
use crate::profile::ProfileLoader;
use crate::schemas::provider_schema;
use crate::sts::{AccessKey, AssumeRoleRequest, StsClient, StsError};

/// ApsaraStack Provider
#[derive(Debug, Clone)]
pub struct ApsaraStackProvider {
    env: Env,
    metadata_url: String,
}

impl Default for ApsaraStackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ApsaraStackProvider {
    /// Provider reading the process environment
    pub fn new() -> Self {
        Self::with_env(Env::real())
    }

    pub fn with_env(env: Env) -> Self {
        Self {
            env,
            metadata_url: DEFAULT_METADATA_URL.to_string(),
        }
    }

    /// Point ECS role lookups at another metadata service
    pub fn with_metadata_url(mut self, url: impl Into<String>) -> Self {
        self.metadata_url = url.into();
        self
    }

    /// Apply schema and environment defaults to a provider block, then validate it
    pub fn prepare(&self, mut attributes: HashMap<String, Value>) -> ProviderResult<ResourceData> {
        let schema = provider_schema();
        schema
            .apply_defaults(&mut attributes, &self.env)
            .map_err(|errors| invalid_configuration(&errors))?;
        schema
            .validate(&attributes)
            .map_err(|errors| invalid_configuration(&errors))?;
        Ok(ResourceData::new(attributes))
    }

    /// Assemble the effective configuration from a prepared provider block
    pub async fn build_config(&self, data: &ResourceData) -> ProviderResult<Config> {
        let profile = ProfileLoader::new(
            Some(data.get_str("profile")),
            Some(data.get_str("shared_credentials_file")),
            &self.env,
        );
        let credentials = CredentialResolver::new(&profile, &self.env)
            .resolve(data)
            .await
            .map_err(|e| ProviderError::new("Failed to load profile").with_cause(e))?;

        let mut config = Config::new(credentials, data);
        debug!("Resolved credentials for region {}", config.region);

        let http = http_client(&config.proxy, config.insecure)
            .map_err(|e| ProviderError::new("Invalid provider configuration").with_cause(e))?;

        if !config.ecs_role_name.is_empty() {
            let role = MetadataClient::with_base_url(http.clone(), self.metadata_url.as_str())
                .role_credentials(&config.ecs_role_name)
                .await
                .map_err(|e| {
                    ProviderError::new("Failed to get ECS role credentials").with_cause(e)
                })?;
            config.set_credentials(
                role.access_key_id,
                role.access_key_secret,
                role.security_token,
            );
        }

        config.endpoints = Endpoints::from_provider_data(data);

        if config.assume_role.is_enabled() {
            self.assume_role(&mut config, http).await?;
        }

        config.ensure_configuration_source();
        Ok(config)
    }

    /// Full configure flow: build the configuration, then the client
    pub async fn configure_client(&self, data: &ResourceData) -> ProviderResult<ApsaraStackClient> {
        let config = self.build_config(data).await?;
        ApsaraStackClient::new(config)
            .map_err(|e| ProviderError::new("Failed to create client").with_cause(e))
    }

    /// Swap the configured credentials for the ones returned by STS
    async fn assume_role(&self, config: &mut Config, http: reqwest::Client) -> ProviderResult<()> {
        let mut access_key = AccessKey::new(config.access_key.as_str(), config.secret_key.as_str());
        if !config.security_token.is_empty() {
            access_key = access_key.with_security_token(config.security_token.as_str());
        }

        let sts_error = |e: StsError| ProviderError::new("Failed to assume RAM role").with_cause(e);
        let client = StsClient::new(http, config.region.as_str(), &config.endpoints.sts, access_key)
            .map_err(sts_error)?;
        let assumed = client
            .assume_role(&AssumeRoleRequest {
                role_arn: config.assume_role.role_arn.clone(),
                role_session_name: config.assume_role.session_name.clone(),
                policy: config.assume_role.policy.clone(),
                duration_seconds: config.assume_role.session_expiration,
            })
            .await
            .map_err(sts_error)?;

        info!(
            "Assumed role {} as {}",
            config.assume_role.role_arn, assumed.access_key_id
        );
        config.set_credentials(
            assumed.access_key_id,
            assumed.access_key_secret,
            assumed.security_token,
        );
        Ok(())
    }
}

fn invalid_configuration(errors: &[TypeError]) -> ProviderError {
    let details = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    ProviderError::new(format!("Invalid provider configuration: {}", details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsarastack_core::resource::Value;
    use httptest::{Expectation, Server, matchers::*, responders::*};

    fn attributes(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn prepare_applies_env_defaults() {
        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[
            ("APSARASTACK_ACCESS_KEY", "ak-env"),
            ("APSARASTACK_REGION", "cn-hangzhou"),
        ]));
        let data = provider.prepare(HashMap::new()).unwrap();

        assert_eq!(data.get_str("access_key"), "ak-env");
        assert_eq!(data.get_str("region"), "cn-hangzhou");
        assert!(data.get_bool("skip_region_validation"));
        assert!(!data.get_bool("insecure"));
    }

    #[test]
    fn prepare_reports_invalid_values() {
        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[]));
        let err = provider
            .prepare(attributes(vec![("protocol", s("FTP"))]))
            .unwrap_err();
        assert!(err.to_string().starts_with("Invalid provider configuration"));
        assert!(err.to_string().contains("FTP"));
    }

    #[tokio::test]
    async fn static_keys_without_role() {
        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[]));
        let data = provider
            .prepare(attributes(vec![
                ("access_key", s("ak")),
                ("secret_key", s("sk")),
                ("domain", s("corp.local")),
            ]))
            .unwrap();

        let config = provider.build_config(&data).await.unwrap();
        assert_eq!(config.access_key, "ak");
        assert_eq!(config.region, "cn-beijing");
        assert_eq!(config.region_id, "cn-beijing");
        assert_eq!(config.endpoints.ecs, "ecs.corp.local");
        assert_eq!(config.endpoints.domain, "corp.local");
        assert!(config.configuration_source.starts_with("Default/ak:"));
        assert!(config.configuration_source.len() <= 64);
    }

    #[tokio::test]
    async fn explicit_configuration_source_is_kept() {
        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[]));
        let data = provider
            .prepare(attributes(vec![("configuration_source", s("ci/pipeline"))]))
            .unwrap();

        let config = provider.build_config(&data).await.unwrap();
        assert_eq!(config.configuration_source, "ci/pipeline");
    }

    #[tokio::test]
    async fn ecs_role_credentials_replace_keys() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/latest/meta-data/ram/security-credentials/worker",
            ))
            .times(1)
            .respond_with(json_encoded(serde_json::json!({
                "Code": "Success",
                "AccessKeyId": "ecs-ak",
                "AccessKeySecret": "ecs-sk",
                "SecurityToken": "ecs-token"
            }))),
        );

        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[]))
            .with_metadata_url(server.url_str("/"));
        let data = provider
            .prepare(attributes(vec![("ecs_role_name", s("worker"))]))
            .unwrap();

        let config = provider.build_config(&data).await.unwrap();
        assert_eq!(config.access_key, "ecs-ak");
        assert_eq!(config.secret_key, "ecs-sk");
        assert_eq!(config.security_token, "ecs-token");
    }

    #[tokio::test]
    async fn failed_assume_role_is_fatal() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method("GET"))
                .times(1)
                .respond_with(status_code(500).body("{}")),
        );

        let provider = ApsaraStackProvider::with_env(Env::from_slice(&[]));
        let mut endpoints = HashMap::new();
        endpoints.insert("sts".to_string(), s(&server.url_str("/")));
        let mut assume_role = HashMap::new();
        assume_role.insert("role_arn".to_string(), s("acs:ram::1:role/admin"));
        let data = provider
            .prepare(attributes(vec![
                ("access_key", s("ak")),
                ("secret_key", s("sk")),
                ("endpoints", Value::Map(endpoints)),
                ("assume_role", Value::Map(assume_role)),
            ]))
            .unwrap();

        let err = provider.build_config(&data).await.unwrap_err();
        assert!(err.to_string().starts_with("Failed to assume RAM role"));
    }
}
