//! Effective provider configuration

use std::fmt;

use apsarastack_core::resource::ResourceData;

use crate::credentials::{AssumeRoleParams, ResolvedCredentials};

/// Longest configuration source label accepted by the API
pub const MAX_CONFIGURATION_SOURCE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    /// Parse the `protocol` attribute; anything but `HTTP` means HTTPS
    pub fn from_attribute(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("http") {
            Protocol::Http
        } else {
            Protocol::Https
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => write!(f, "HTTP"),
            Protocol::Https => write!(f, "HTTPS"),
        }
    }
}

/// Per-service endpoint overrides; empty means "derive from the region"
///
/// A non-empty `domain` places every service without an explicit override
/// at `<service>.<domain>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    pub domain: String,
    pub ecs: String,
    pub vpc: String,
    pub sts: String,
}

impl Endpoints {
    /// Every service under a custom domain, e.g. `ecs.<domain>`
    pub fn from_domain(domain: &str) -> Self {
        let domain = domain.trim();
        Self {
            domain: domain.to_string(),
            ecs: format!("ecs.{}", domain),
            vpc: format!("vpc.{}", domain),
            sts: format!("sts.{}", domain),
        }
    }

    /// Overrides from `endpoints` blocks; the last block wins
    pub fn from_blocks(blocks: &[ResourceData]) -> Self {
        blocks
            .last()
            .map(|block| Self {
                domain: String::new(),
                ecs: block.get_str("ecs").trim().to_string(),
                vpc: block.get_str("vpc").trim().to_string(),
                sts: block.get_str("sts").trim().to_string(),
            })
            .unwrap_or_default()
    }

    /// Domain override first, otherwise the `endpoints` blocks
    pub fn from_provider_data(data: &ResourceData) -> Self {
        match data.get_str("domain").trim() {
            "" => Self::from_blocks(&data.get_blocks("endpoints")),
            domain => Self::from_domain(domain),
        }
    }

    /// Override for a service name, if one is set
    pub fn get(&self, service: &str) -> Option<&str> {
        let endpoint = match service {
            "ecs" => &self.ecs,
            "vpc" => &self.vpc,
            "sts" => &self.sts,
            _ => return None,
        };
        (!endpoint.is_empty()).then_some(endpoint.as_str())
    }

    /// Host serving `service`: explicit override, then the domain, then the region
    pub fn resolve(&self, service: &str, region: &str) -> String {
        if let Some(endpoint) = self.get(service) {
            return endpoint.to_string();
        }
        if self.domain.is_empty() {
            format!("{}.{}.aliyuncs.com", service, region)
        } else {
            format!("{}.{}", service, self.domain)
        }
    }
}

/// Configuration the client is built from; immutable once assembled
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub region: String,
    pub region_id: String,
    pub access_key: String,
    pub secret_key: String,
    pub security_token: String,
    pub ecs_role_name: String,
    pub assume_role: AssumeRoleParams,
    pub endpoints: Endpoints,
    pub proxy: String,
    pub insecure: bool,
    pub protocol: Protocol,
    pub skip_region_validation: bool,
    pub configuration_source: String,
    pub ots_instance_name: String,
    pub account_id: String,
}

impl Config {
    /// Start from resolved credentials plus the plain provider attributes
    ///
    /// Endpoints and the configuration source are filled in later by the
    /// assembler.
    pub fn new(credentials: ResolvedCredentials, data: &ResourceData) -> Self {
        Self {
            region_id: credentials.region.clone(),
            region: credentials.region,
            access_key: credentials.access_key,
            secret_key: credentials.secret_key,
            security_token: credentials.security_token,
            ecs_role_name: credentials.ecs_role_name,
            assume_role: credentials.assume_role,
            endpoints: Endpoints::default(),
            proxy: data.get_str("proxy").trim().to_string(),
            insecure: data.get_bool("insecure"),
            protocol: Protocol::from_attribute(data.get_str("protocol")),
            skip_region_validation: data.get_bool("skip_region_validation"),
            configuration_source: data.get_str("configuration_source").to_string(),
            ots_instance_name: data.get_str("ots_instance_name").trim().to_string(),
            account_id: data.get_str("account_id").trim().to_string(),
        }
    }

    /// Replace the credential fields with temporary ones
    pub fn set_credentials(
        &mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        security_token: impl Into<String>,
    ) {
        self.access_key = access_key.into();
        self.secret_key = secret_key.into();
        self.security_token = security_token.into();
    }

    /// Fill in the default configuration source when none was given
    pub fn ensure_configuration_source(&mut self) {
        if self.configuration_source.is_empty() {
            self.configuration_source =
                default_configuration_source(&self.access_key, &uuid::Uuid::new_v4());
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field("security_token", &"** redacted **")
            .field("ecs_role_name", &self.ecs_role_name)
            .field("assume_role", &self.assume_role)
            .field("endpoints", &self.endpoints)
            .field("proxy", &self.proxy)
            .field("insecure", &self.insecure)
            .field("protocol", &self.protocol)
            .field("skip_region_validation", &self.skip_region_validation)
            .field("configuration_source", &self.configuration_source)
            .field("ots_instance_name", &self.ots_instance_name)
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// `Default/<access key>:<id>`, cut to the API limit
pub fn default_configuration_source(access_key: &str, id: &uuid::Uuid) -> String {
    format!("Default/{}:{}", access_key, id)
        .chars()
        .take(MAX_CONFIGURATION_SOURCE_LEN)
        .collect()
}
