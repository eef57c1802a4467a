//! Provider - Trait abstracting provider configuration
//!
//! A Provider declares the schema of its configuration block and of the
//! resources it manages, and turns a configured block into a client that
//! resource operations share.

use std::future::Future;
use std::pin::Pin;

use crate::resource::ResourceData;
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref cause) = self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Main Provider trait
pub trait Provider: Send + Sync {
    /// Client produced by `configure` and shared by resource operations
    type Client: Send + Sync;

    /// Name of this Provider (e.g., "apsarastack")
    fn name(&self) -> &'static str;

    /// Schema of the provider configuration block
    fn schema(&self) -> ResourceSchema;

    /// Attribute schemas of the resources this Provider manages
    fn resource_schemas(&self) -> Vec<ResourceSchema>;

    /// Turn a provider configuration block into a client
    ///
    /// `data` has already had defaults applied and been validated.
    fn configure(&self, data: ResourceData) -> BoxFuture<'_, ProviderResult<Self::Client>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSchema, AttributeType};

    // Mock Provider for testing
    struct MockProvider;

    impl Provider for MockProvider {
        type Client = String;

        fn name(&self) -> &'static str {
            "mock"
        }

        fn schema(&self) -> ResourceSchema {
            ResourceSchema::new("mock")
                .attribute(AttributeSchema::new("region", AttributeType::String).required())
        }

        fn resource_schemas(&self) -> Vec<ResourceSchema> {
            vec![]
        }

        fn configure(&self, data: ResourceData) -> BoxFuture<'_, ProviderResult<String>> {
            Box::pin(async move {
                match data.get_str("region") {
                    "" => Err(ProviderError::new("region is required")),
                    region => Ok(format!("client@{}", region)),
                }
            })
        }
    }

    #[tokio::test]
    async fn mock_provider_configure_returns_client() {
        let provider = MockProvider;
        let data = ResourceData::new(
            [(
                "region".to_string(),
                crate::resource::Value::String("cn-beijing".to_string()),
            )]
            .into_iter()
            .collect(),
        );
        let client = provider.configure(data).await.unwrap();
        assert_eq!(client, "client@cn-beijing");
    }

    #[tokio::test]
    async fn mock_provider_configure_surfaces_error() {
        let provider = MockProvider;
        let err = provider
            .configure(ResourceData::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "region is required");
    }

    #[test]
    fn provider_error_display_includes_cause() {
        let err = ProviderError::new("AssumeRole failed")
            .with_cause(std::io::Error::other("connection reset"));
        assert_eq!(err.to_string(), "AssumeRole failed: connection reset");
        assert!(std::error::Error::source(&err).is_some());
    }
}
