//! `aws_appsync_api`: an AppSync Event API.

use async_trait::async_trait;
use aws_sdk_appsync::types::{
    AuthMode, AuthProvider, CognitoConfig, EventConfig, EventLogConfig, EventLogLevel,
};
use tracing::{debug, info};

use super::{
    authentication_type, authentication_type_attribute, expand_lambda_authorizer,
    expand_openid_connect, flatten_lambda_authorizer, flatten_openid_connect,
    lambda_authorizer_block, openid_connect_block, update_tags,
};
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::state::State;
use crate::tags::tags_from;

/// An Event API with its authorization and logging configuration.
pub struct EventApi;

pub(crate) fn auth_mode_block() -> NestedBlock {
    NestedBlock::list(Block::new().with_attribute("auth_type", authentication_type_attribute()))
}

pub(crate) fn expand_auth_modes(blocks: Vec<State>) -> Result<Vec<AuthMode>, ProviderError> {
    blocks
        .iter()
        .map(|block| -> Result<AuthMode, ProviderError> {
            Ok(AuthMode::builder()
                .auth_type(authentication_type(block, "auth_type")?)
                .build()?)
        })
        .collect()
}

pub(crate) fn flatten_auth_modes(modes: &[AuthMode]) -> Vec<State> {
    modes
        .iter()
        .map(|mode| {
            let mut block = State::new();
            block.set_enum("auth_type", mode.auth_type());
            block
        })
        .collect()
}

impl EventApi {
    fn expand_event_config(block: &State, region: &str) -> Result<EventConfig, ProviderError> {
        let mut providers = Vec::new();
        for provider in block.blocks("auth_provider") {
            let cognito = match provider.block("cognito_config") {
                Some(cognito) => Some(
                    CognitoConfig::builder()
                        .user_pool_id(cognito.required_str("user_pool_id")?)
                        .aws_region(cognito.str("aws_region").unwrap_or(region))
                        .set_app_id_client_regex(cognito.string("app_id_client_regex"))
                        .build()?,
                ),
                None => None,
            };
            providers.push(
                AuthProvider::builder()
                    .auth_type(authentication_type(&provider, "auth_type")?)
                    .set_cognito_config(cognito)
                    .set_open_id_connect_config(expand_openid_connect(
                        provider.block("openid_connect_config"),
                    )?)
                    .set_lambda_authorizer_config(expand_lambda_authorizer(
                        provider.block("lambda_authorizer_config"),
                    )?)
                    .build()?,
            );
        }

        let log_config = match block.block("log_config") {
            Some(log) => Some(
                EventLogConfig::builder()
                    .log_level(EventLogLevel::from(log.required_str("log_level")?))
                    .cloud_watch_logs_role_arn(log.required_str("cloudwatch_logs_role_arn")?)
                    .build()?,
            ),
            None => None,
        };

        Ok(EventConfig::builder()
            .set_auth_providers(Some(providers))
            .set_connection_auth_modes(Some(expand_auth_modes(block.blocks("connection_auth_mode"))?))
            .set_default_publish_auth_modes(Some(expand_auth_modes(
                block.blocks("default_publish_auth_mode"),
            )?))
            .set_default_subscribe_auth_modes(Some(expand_auth_modes(
                block.blocks("default_subscribe_auth_mode"),
            )?))
            .set_log_config(log_config)
            .build()?)
    }

    fn flatten_event_config(config: &EventConfig) -> State {
        let mut state = State::new();
        state.set_blocks(
            "auth_provider",
            config.auth_providers().iter().map(|provider| {
                let mut block = State::new();
                block.set_enum("auth_type", provider.auth_type());
                block.set_block(
                    "cognito_config",
                    provider.cognito_config().map(|c| {
                        State::new()
                            .with("user_pool_id", c.user_pool_id())
                            .with("aws_region", c.aws_region())
                            .with("app_id_client_regex", c.app_id_client_regex())
                    }),
                );
                block.set_block(
                    "openid_connect_config",
                    flatten_openid_connect(provider.open_id_connect_config()),
                );
                block.set_block(
                    "lambda_authorizer_config",
                    flatten_lambda_authorizer(provider.lambda_authorizer_config()),
                );
                block
            }),
        );
        state.set_blocks("connection_auth_mode", flatten_auth_modes(config.connection_auth_modes()));
        state.set_blocks(
            "default_publish_auth_mode",
            flatten_auth_modes(config.default_publish_auth_modes()),
        );
        state.set_blocks(
            "default_subscribe_auth_mode",
            flatten_auth_modes(config.default_subscribe_auth_modes()),
        );
        state.set_block(
            "log_config",
            config.log_config().map(|log| {
                let mut block = State::new().with("cloudwatch_logs_role_arn", log.cloud_watch_logs_role_arn());
                block.set_enum("log_level", log.log_level());
                block
            }),
        );
        state
    }

    fn flatten(api: &aws_sdk_appsync::types::Api, mut state: State) -> State {
        state.set("api_id", api.api_id());
        state.set("api_arn", api.api_arn());
        state.set("name", api.name());
        state.set("owner_contact", api.owner_contact());
        state.set("waf_web_acl_arn", api.waf_web_acl_arn());
        state.set("xray_enabled", api.xray_enabled());
        state.set_string_map("dns", api.dns());
        state.set_string_map("tags", api.tags());
        state.set_block("event_config", api.event_config().map(Self::flatten_event_config));
        state
    }
}

#[async_trait]
impl Resource for EventApi {
    fn type_name(&self) -> &'static str {
        "aws_appsync_api"
    }

    fn schema(&self) -> Schema {
        let log_config = NestedBlock::single(
            Block::new()
                .with_attribute("cloudwatch_logs_role_arn", Attribute::required_string())
                .with_attribute(
                    "log_level",
                    Attribute::required_string().one_of(&["NONE", "ERROR", "ALL", "INFO", "DEBUG"]),
                ),
        );
        let auth_provider = NestedBlock::list(
            Block::new()
                .with_attribute("auth_type", authentication_type_attribute())
                .with_block(
                    "cognito_config",
                    NestedBlock::single(
                        Block::new()
                            .with_attribute("user_pool_id", Attribute::required_string())
                            .with_attribute("aws_region", Attribute::optional_computed_string())
                            .with_attribute("app_id_client_regex", Attribute::optional_string()),
                    ),
                )
                .with_block("openid_connect_config", openid_connect_block())
                .with_block("lambda_authorizer_config", lambda_authorizer_block()),
        )
        .with_min_items(1);

        Schema::resource()
            .with_tags()
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::length(1, 50)),
            )
            .with_attribute("owner_contact", Attribute::optional_string())
            .with_attribute("api_id", Attribute::computed_string())
            .with_attribute("api_arn", Attribute::computed_string())
            .with_attribute("dns", Attribute::computed_string_map())
            .with_attribute("waf_web_acl_arn", Attribute::computed_string())
            .with_attribute("xray_enabled", Attribute::computed_bool())
            .with_block(
                "event_config",
                NestedBlock::required_single(
                    Block::new()
                        .with_block("auth_provider", auth_provider)
                        .with_block("connection_auth_mode", auth_mode_block().with_min_items(1))
                        .with_block("default_publish_auth_mode", auth_mode_block().with_min_items(1))
                        .with_block("default_subscribe_auth_mode", auth_mode_block().with_min_items(1))
                        .with_block("log_config", log_config),
                ),
            )
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let name = planned.required_str("name")?;
        let event_config = planned
            .block("event_config")
            .ok_or_else(|| ProviderError::Validation("block 'event_config' is required".to_string()))?;
        debug!(name, "creating AppSync Event API");

        let output = clients
            .appsync
            .create_api()
            .name(name)
            .set_owner_contact(planned.string("owner_contact"))
            .event_config(Self::expand_event_config(&event_config, &clients.region)?)
            .set_tags(tags_from(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync Event API ({name})"), e))?;

        let api_id = output
            .api()
            .and_then(|api| api.api_id())
            .ok_or_else(|| ProviderError::empty_response("creating AppSync Event API"))?
            .to_owned();
        info!(api_id, "created AppSync Event API");

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync Event API ({api_id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let api_id = current.id()?.to_owned();
        let output = clients
            .appsync
            .get_api()
            .api_id(&api_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Event API ({api_id})"), e))
            .optional()?;

        match output.and_then(|o| o.api) {
            Some(api) => Ok(Some(Self::flatten(&api, current))),
            None => {
                debug!(api_id, "AppSync Event API not found, removing from state");
                Ok(None)
            },
        }
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let api_id = prior.id()?.to_owned();

        if planned.any_changed(&prior, &["name", "owner_contact", "event_config"]) {
            let event_config = planned
                .block("event_config")
                .map(|block| Self::expand_event_config(&block, &clients.region))
                .transpose()?;
            clients
                .appsync
                .update_api()
                .api_id(&api_id)
                .name(planned.required_str("name")?)
                .set_owner_contact(planned.string("owner_contact"))
                .set_event_config(event_config)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync Event API ({api_id})"), e))?;
        }

        if planned.changed(&prior, "tags") {
            if let Some(arn) = prior.str("api_arn") {
                update_tags(clients, arn, &prior, &planned).await?;
            }
        }

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync Event API ({api_id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let api_id = current.id()?;
        debug!(api_id, "deleting AppSync Event API");
        clients
            .appsync
            .delete_api()
            .api_id(api_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Event API ({api_id})"), e))
            .optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use aws_sdk_appsync::types::AuthenticationType;
    use serde_json::json;

    fn event_config() -> serde_json::Value {
        json!({
            "auth_provider": [{"auth_type": "API_KEY"}],
            "connection_auth_mode": [{"auth_type": "API_KEY"}],
            "default_publish_auth_mode": [{"auth_type": "API_KEY"}],
            "default_subscribe_auth_mode": [{"auth_type": "API_KEY"}],
        })
    }

    #[test]
    fn test_schema_requires_event_config() {
        let schema = EventApi.schema();

        assert!(validate(&schema, &json!({"name": "events", "event_config": event_config()})).is_empty());
        assert!(!validate(&schema, &json!({"name": "events"})).is_empty());
    }

    #[test]
    fn test_auth_provider_min_items() {
        let mut config = event_config();
        config["auth_provider"] = json!([]);
        let diagnostics = validate(&EventApi.schema(), &json!({"name": "events", "event_config": config}));

        assert!(diagnostics.iter().any(|d| d.summary.contains("at least 1")));
    }

    #[test]
    fn test_event_config_round_trip() {
        let mut value = event_config();
        value["auth_provider"] = json!([
            {"auth_type": "API_KEY"},
            {"auth_type": "AMAZON_COGNITO_USER_POOLS", "cognito_config": {"user_pool_id": "pool"}},
        ]);
        value["log_config"] = json!({"cloudwatch_logs_role_arn": "arn:aws:iam::1:role/l", "log_level": "ERROR"});
        let block = State::from_value(value).unwrap();

        let config = EventApi::expand_event_config(&block, "us-west-2").unwrap();
        assert_eq!(config.auth_providers().len(), 2);
        assert_eq!(config.auth_providers()[1].auth_type(), &AuthenticationType::AmazonCognitoUserPools);
        assert_eq!(
            config.auth_providers()[1].cognito_config().map(|c| c.aws_region()),
            Some("us-west-2")
        );

        let flat = EventApi::flatten_event_config(&config).into_value();
        assert_eq!(flat["connection_auth_mode"], json!([{"auth_type": "API_KEY"}]));
        assert_eq!(flat["log_config"]["log_level"], json!("ERROR"));
    }
}
