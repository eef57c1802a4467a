//! ECS instance metadata: temporary credentials of an attached RAM role

use std::fmt;

use log::{debug, info};
use serde::Deserialize;

/// Metadata service root reachable from inside an ECS instance
pub const DEFAULT_METADATA_URL: &str = "http://100.100.100.200";
const SECURITY_CREDENTIALS_PATH: &str = "/latest/meta-data/ram/security-credentials/";

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Failed to fetch credentials of ECS role '{role}': {source}")]
    Http {
        role: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Metadata service returned status {status} for ECS role '{role}'")]
    Status { role: String, status: u16 },

    #[error("Failed to decode credentials of ECS role '{role}': {source}")]
    Decode {
        role: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Metadata service refused credentials of ECS role '{role}' (Code: {code})")]
    NotSuccess { role: String, code: String },
}

pub type MetadataResult<T> = Result<T, MetadataError>;

/// Credentials the metadata service hands out for a RAM role
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl fmt::Debug for RoleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"** redacted **")
            .field("security_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsResponse {
    #[serde(default)]
    code: String,
    #[serde(flatten)]
    credentials: Option<RoleCredentials>,
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the current credentials of `role`
    pub async fn role_credentials(&self, role: &str) -> MetadataResult<RoleCredentials> {
        let url = format!("{}{}{}", self.base_url, SECURITY_CREDENTIALS_PATH, role);
        debug!("Fetching ECS role credentials from {}", url);

        let http_err = |source| MetadataError::Http {
            role: role.to_string(),
            source,
        };
        let response = self.http.get(&url).send().await.map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Status {
                role: role.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(http_err)?;

        let parsed: CredentialsResponse =
            serde_json::from_str(&body).map_err(|source| MetadataError::Decode {
                role: role.to_string(),
                source,
            })?;

        match parsed {
            CredentialsResponse {
                code,
                credentials: Some(credentials),
            } if code == "Success" => {
                info!("Using credentials of ECS role '{}'", role);
                Ok(credentials)
            }
            CredentialsResponse { code, .. } => Err(MetadataError::NotSuccess {
                role: role.to_string(),
                code,
            }),
        }
    }
}
