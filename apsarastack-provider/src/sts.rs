//! STS AssumeRole exchange
//!
//! Exchanges a RAM role ARN plus session parameters for a temporary
//! access key, secret and security token. Exactly one request is made per
//! call; failures are returned to the caller without retrying.

use std::collections::BTreeMap;
use std::fmt;

use log::{debug, info};
use serde::Deserialize;
use url::Url;

use crate::sign;

/// Endpoint used when none is configured
pub const DEFAULT_STS_ENDPOINT: &str = "sts.aliyuncs.com";
/// STS API version
pub const STS_API_VERSION: &str = "2015-04-01";

/// Errors returned by the STS exchange
#[derive(Debug, thiserror::Error)]
pub enum StsError {
    #[error("Invalid STS endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Failed to sign STS request: {0}")]
    Signing(String),

    #[error("STS request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("STS AssumeRole failed with status {status}: {code}: {message} (RequestId: {request_id})")]
    Api {
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("Failed to decode STS response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("STS response did not include credentials")]
    MissingCredentials,
}

pub type StsResult<T> = Result<T, StsError>;

/// Key pair (and optional security token) used to sign STS requests
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    pub id: String,
    pub secret: String,
    pub security_token: Option<String>,
}

impl AccessKey {
    /// Static key/secret pair
    pub fn new(id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            security_token: None,
        }
    }

    /// Key/secret plus security token; an empty token is treated as absent
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.security_token = (!token.is_empty()).then_some(token);
        self
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("id", &self.id)
            .field("secret", &"** redacted **")
            .field(
                "security_token",
                &self.security_token.as_ref().map(|_| "** redacted **"),
            )
            .finish()
    }
}

/// Parameters of an AssumeRole call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleRequest {
    pub role_arn: String,
    pub role_session_name: String,
    /// Session policy; sent only when non-empty
    pub policy: String,
    pub duration_seconds: u64,
}

/// Temporary credentials returned by AssumeRole
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AssumedCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: String,
    #[serde(default)]
    pub expiration: Option<String>,
}

impl fmt::Debug for AssumedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumedCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"** redacted **")
            .field("security_token", &"** redacted **")
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AssumeRoleResponse {
    #[serde(default)]
    request_id: Option<String>,
    #[serde(default)]
    credentials: Option<AssumedCredentials>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct ErrorResponse {
    request_id: String,
    code: String,
    message: String,
}

/// STS client bound to one region, endpoint and signing key
#[derive(Debug, Clone)]
pub struct StsClient {
    http: reqwest::Client,
    endpoint: Url,
    region: String,
    access_key: AccessKey,
}

impl StsClient {
    /// Create a client
    ///
    /// `endpoint` is either a host name (requests go over HTTPS) or a full
    /// URL. An empty endpoint selects [`DEFAULT_STS_ENDPOINT`].
    pub fn new(
        http: reqwest::Client,
        region: impl Into<String>,
        endpoint: &str,
        access_key: AccessKey,
    ) -> StsResult<Self> {
        Ok(Self {
            http,
            endpoint: parse_endpoint(endpoint)?,
            region: region.into(),
            access_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Perform one AssumeRole call
    pub async fn assume_role(&self, request: &AssumeRoleRequest) -> StsResult<AssumedCredentials> {
        info!("Calling STS AssumeRole");
        debug!("Role ARN: {}", request.role_arn);
        debug!("Session name: {}", request.role_session_name);
        debug!("Duration: {} seconds", request.duration_seconds);

        let timestamp = chrono::Utc::now()
            .format("%Y-%m-%dT%H:%M:%SZ")
            .to_string();
        let nonce = uuid::Uuid::new_v4().to_string();
        let query = self.signed_query(request, &timestamp, &nonce)?;

        let mut url = self.endpoint.clone();
        url.set_query(Some(&query));

        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let error: ErrorResponse = serde_json::from_str(&body).unwrap_or_default();
            return Err(StsError::Api {
                status: status.as_u16(),
                code: error.code,
                message: error.message,
                request_id: error.request_id,
            });
        }

        let parsed: AssumeRoleResponse = serde_json::from_str(&body)?;
        let credentials = parsed.credentials.ok_or(StsError::MissingCredentials)?;

        info!(
            "Obtained temporary credentials (RequestId: {})",
            parsed.request_id.as_deref().unwrap_or("unknown")
        );
        Ok(credentials)
    }

    /// Build the signed query string for an AssumeRole request
    fn signed_query(
        &self,
        request: &AssumeRoleRequest,
        timestamp: &str,
        nonce: &str,
    ) -> StsResult<String> {
        let mut params = BTreeMap::new();
        params.insert("Action".to_string(), "AssumeRole".to_string());
        params.insert("Format".to_string(), "JSON".to_string());
        params.insert("Version".to_string(), STS_API_VERSION.to_string());
        params.insert("AccessKeyId".to_string(), self.access_key.id.clone());
        params.insert(
            "SignatureMethod".to_string(),
            sign::SIGNATURE_METHOD.to_string(),
        );
        params.insert(
            "SignatureVersion".to_string(),
            sign::SIGNATURE_VERSION.to_string(),
        );
        params.insert("SignatureNonce".to_string(), nonce.to_string());
        params.insert("Timestamp".to_string(), timestamp.to_string());
        params.insert("RegionId".to_string(), self.region.clone());
        if let Some(token) = &self.access_key.security_token {
            params.insert("SecurityToken".to_string(), token.clone());
        }

        params.insert("RoleArn".to_string(), request.role_arn.clone());
        params.insert(
            "RoleSessionName".to_string(),
            request.role_session_name.clone(),
        );
        params.insert(
            "DurationSeconds".to_string(),
            request.duration_seconds.to_string(),
        );
        if !request.policy.is_empty() {
            params.insert("Policy".to_string(), request.policy.clone());
        }

        let canonicalized = sign::canonicalized_query(&params);
        let signature =
            sign::sign("GET", &canonicalized, &self.access_key.secret).map_err(StsError::Signing)?;

        Ok(format!(
            "{}&Signature={}",
            canonicalized,
            sign::percent_encode(&signature)
        ))
    }
}

fn parse_endpoint(endpoint: &str) -> StsResult<Url> {
    let endpoint = match endpoint.trim() {
        "" => DEFAULT_STS_ENDPOINT,
        e => e,
    };
    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{}/", endpoint)
    };

    Url::parse(&raw).map_err(|source| StsError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    })
}
