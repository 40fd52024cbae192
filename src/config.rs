//! Provider configuration and AWS client construction.

use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ProviderError;
use crate::mutex::{self, NamedMutex};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::state::State;

/// Per-service endpoint overrides, e.g. for LocalStack.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Endpoints {
    /// AppSync endpoint URL.
    pub appsync: Option<String>,
    /// Rekognition endpoint URL.
    pub rekognition: Option<String>,
}

/// The `provider "aws"` block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Region, falling back to the default chain (`AWS_REGION`, profile).
    pub region: Option<String>,
    /// Shared config profile.
    pub profile: Option<String>,
    /// Endpoint overrides.
    pub endpoints: Endpoints,
    /// Maximum attempts for the SDK's standard retry strategy.
    pub max_retries: Option<u32>,
}

impl ProviderConfig {
    /// Schema of the provider configuration block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "region",
                Attribute::optional_string().with_description("AWS region, e.g. us-east-1"),
            )
            .with_attribute(
                "profile",
                Attribute::optional_string().with_description("Shared config profile name"),
            )
            .with_attribute(
                "max_retries",
                Attribute::optional_int64()
                    .with_description("Maximum number of attempts for retryable AWS errors")
                    .with_validator(Validator::int_range(1, 25)),
            )
            .with_block(
                "endpoints",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("appsync", Attribute::optional_string())
                        .with_attribute("rekognition", Attribute::optional_string())
                        .with_description("Custom service endpoint URLs"),
                ),
            )
    }

    /// Read the configuration from its JSON form. Validate it against [`Self::schema`] first.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        let state = State::from_value(value)?;
        let endpoints = state.block("endpoints").unwrap_or_default();

        Ok(Self {
            region: state.string("region"),
            profile: state.string("profile"),
            endpoints: Endpoints {
                appsync: endpoints.string("appsync"),
                rekognition: endpoints.string("rekognition"),
            },
            max_retries: state
                .i64("max_retries")
                .map(u32::try_from)
                .transpose()
                .map_err(|_| ProviderError::Validation("max_retries out of range".to_string()))?,
        })
    }

    /// Resolve credentials and region through the default chain and build the clients.
    pub async fn load(&self) -> Result<AwsClients, ProviderError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(max_attempts) = self.max_retries {
            loader = loader.retry_config(RetryConfig::standard().with_max_attempts(max_attempts));
        }

        let sdk = loader.load().await;
        let clients = AwsClients::from_sdk_config(&sdk, &self.endpoints)?;
        info!(region = %clients.region, "configured AWS clients");
        Ok(clients)
    }
}

/// The service clients shared by every resource.
#[derive(Debug, Clone)]
pub struct AwsClients {
    /// AppSync client.
    pub appsync: aws_sdk_appsync::Client,
    /// Rekognition client.
    pub rekognition: aws_sdk_rekognition::Client,
    /// The resolved region, used as the default for regional attributes.
    pub region: String,
    /// Named locks for schema-affecting AppSync calls.
    pub locks: NamedMutex,
}

impl AwsClients {
    /// Build the clients from a loaded SDK configuration.
    pub fn from_sdk_config(sdk: &SdkConfig, endpoints: &Endpoints) -> Result<Self, ProviderError> {
        let region = sdk.region().map(ToString::to_string).ok_or_else(|| {
            ProviderError::Configuration(
                "no AWS region configured; set `region` or AWS_REGION".to_string(),
            )
        })?;

        let mut appsync = aws_sdk_appsync::config::Builder::from(sdk);
        if let Some(url) = &endpoints.appsync {
            debug!(url, "using custom AppSync endpoint");
            appsync = appsync.endpoint_url(url);
        }

        let mut rekognition = aws_sdk_rekognition::config::Builder::from(sdk);
        if let Some(url) = &endpoints.rekognition {
            debug!(url, "using custom Rekognition endpoint");
            rekognition = rekognition.endpoint_url(url);
        }

        Ok(Self {
            appsync: aws_sdk_appsync::Client::from_conf(appsync.build()),
            rekognition: aws_sdk_rekognition::Client::from_conf(rekognition.build()),
            region,
            locks: mutex::global().clone(),
        })
    }

    /// Clients for `region` with no credentials, for exercising code paths that
    /// never reach AWS.
    pub fn offline(region: &str) -> Self {
        let sdk = SdkConfig::builder()
            .region(Region::new(region.to_string()))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let appsync = aws_sdk_appsync::config::Builder::from(&sdk).build();
        let rekognition = aws_sdk_rekognition::config::Builder::from(&sdk).build();

        Self {
            appsync: aws_sdk_appsync::Client::from_conf(appsync),
            rekognition: aws_sdk_rekognition::Client::from_conf(rekognition),
            region: region.to_string(),
            locks: NamedMutex::new(),
        }
    }
}

#[cfg(test)]
impl AwsClients {
    /// Offline clients with AppSync calls answered by `appsync`.
    pub(crate) fn with_appsync(appsync: aws_sdk_appsync::Client) -> Self {
        Self {
            appsync,
            ..Self::offline("us-east-1")
        }
    }

    /// Offline clients with Rekognition calls answered by `rekognition`.
    pub(crate) fn with_rekognition(rekognition: aws_sdk_rekognition::Client) -> Self {
        Self {
            rekognition,
            ..Self::offline("us-east-1")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_from_value() {
        let config = ProviderConfig::from_value(json!({
            "region": "eu-west-1",
            "max_retries": 5,
            "endpoints": {"appsync": "http://localhost:4566"},
        }))
        .unwrap();

        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.profile, None);
        assert_eq!(config.max_retries, Some(5));
        assert_eq!(config.endpoints.appsync.as_deref(), Some("http://localhost:4566"));
        assert_eq!(config.endpoints.rekognition, None);
    }

    #[test]
    fn test_from_null_is_default() {
        assert_eq!(ProviderConfig::from_value(Value::Null).unwrap(), ProviderConfig::default());
    }

    #[test]
    fn test_schema_rejects_bad_retries() {
        let schema = ProviderConfig::schema();
        assert!(validate(&schema, &json!({"max_retries": 3})).is_empty());
        assert_eq!(validate(&schema, &json!({"max_retries": 0})).len(), 1);
        assert_eq!(validate(&schema, &json!({"region": 1})).len(), 1);
    }

    #[test]
    fn test_from_sdk_config_requires_region() {
        let sdk = SdkConfig::builder()
            .behavior_version(BehaviorVersion::latest())
            .build();
        let err = AwsClients::from_sdk_config(&sdk, &Endpoints::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_from_sdk_config_with_endpoints() {
        let sdk = SdkConfig::builder()
            .region(Region::new("us-west-2"))
            .behavior_version(BehaviorVersion::latest())
            .build();
        let endpoints = Endpoints {
            appsync: Some("http://localhost:4566".to_string()),
            rekognition: None,
        };

        let clients = AwsClients::from_sdk_config(&sdk, &endpoints).unwrap();
        assert_eq!(clients.region, "us-west-2");
    }

    #[test]
    fn test_offline_clients() {
        assert_eq!(AwsClients::offline("ap-southeast-2").region, "ap-southeast-2");
    }
}
