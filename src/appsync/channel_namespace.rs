//! `aws_appsync_channel_namespace`: a channel namespace of an Event API.

use async_trait::async_trait;
use tracing::debug;

use super::api::{auth_mode_block, expand_auth_modes, flatten_auth_modes};
use super::update_tags;
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Schema, Validator};
use crate::state::State;
use crate::tags::tags_from;

const ID: IdFormat = IdFormat::new(",", &["api-id", "name"]);

/// A channel namespace.
pub struct ChannelNamespace;

fn auth_modes(state: &State, key: &str) -> Result<Option<Vec<aws_sdk_appsync::types::AuthMode>>, ProviderError> {
    let blocks = state.blocks(key);
    if blocks.is_empty() {
        return Ok(None);
    }
    expand_auth_modes(blocks).map(Some)
}

#[async_trait]
impl Resource for ChannelNamespace {
    fn type_name(&self) -> &'static str {
        "aws_appsync_channel_namespace"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_tags()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_validator(Validator::length(1, 50))
                    .with_validator(Validator::pattern(
                        r"^[A-Za-z0-9](?:[A-Za-z0-9\-]{0,48}[A-Za-z0-9])?$",
                        "must contain only alphanumeric characters or hyphens and not start or end with a hyphen",
                    )),
            )
            .with_attribute("code_handlers", Attribute::optional_string())
            .with_attribute("channel_namespace_arn", Attribute::computed_string())
            .with_block("publish_auth_mode", auth_mode_block())
            .with_block("subscribe_auth_mode", auth_mode_block())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?;
        let name = planned.required_str("name")?;
        let id = ID.encode(&[api_id, name]);
        debug!(id, "creating AppSync Channel Namespace");

        clients
            .appsync
            .create_channel_namespace()
            .api_id(api_id)
            .name(name)
            .set_code_handlers(planned.string("code_handlers"))
            .set_publish_auth_modes(auth_modes(&planned, "publish_auth_mode")?)
            .set_subscribe_auth_modes(auth_modes(&planned, "subscribe_auth_mode")?)
            .set_tags(tags_from(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync Channel Namespace ({id})"), e))?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Channel Namespace ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, name) = ID.decode_pair(&id)?;

        let output = clients
            .appsync
            .get_channel_namespace()
            .api_id(api_id)
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Channel Namespace ({id})"), e))
            .optional()?;
        let Some(namespace) = output.and_then(|o| o.channel_namespace) else {
            debug!(id, "AppSync Channel Namespace not found, removing from state");
            return Ok(None);
        };

        let mut state = current;
        state.set("api_id", namespace.api_id());
        state.set("name", namespace.name());
        state.set("code_handlers", namespace.code_handlers());
        state.set("channel_namespace_arn", namespace.channel_namespace_arn());
        state.set_blocks("publish_auth_mode", flatten_auth_modes(namespace.publish_auth_modes()));
        state.set_blocks("subscribe_auth_mode", flatten_auth_modes(namespace.subscribe_auth_modes()));
        state.set_string_map("tags", namespace.tags());
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, name) = ID.decode_pair(&id)?;

        if planned.any_changed(&prior, &["code_handlers", "publish_auth_mode", "subscribe_auth_mode"]) {
            clients
                .appsync
                .update_channel_namespace()
                .api_id(api_id)
                .name(name)
                .set_code_handlers(planned.string("code_handlers"))
                .set_publish_auth_modes(auth_modes(&planned, "publish_auth_mode")?)
                .set_subscribe_auth_modes(auth_modes(&planned, "subscribe_auth_mode")?)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("updating AppSync Channel Namespace ({id})"), e))?;
        }

        if planned.changed(&prior, "tags") {
            if let Some(arn) = prior.str("channel_namespace_arn") {
                update_tags(clients, arn, &prior, &planned).await?;
            }
        }

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Channel Namespace ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, name) = ID.decode_pair(id)?;
        debug!(id, "deleting AppSync Channel Namespace");

        clients
            .appsync
            .delete_channel_namespace()
            .api_id(api_id)
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Channel Namespace ({id})"), e))
            .optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_id() {
        assert_eq!(ID.encode(&["abc", "chat"]), "abc,chat");
        assert_eq!(ID.decode_pair("abc,chat").unwrap(), ("abc", "chat"));
        assert!(ID.decode_pair("abc").is_err());
    }

    #[test]
    fn test_name_pattern() {
        let schema = ChannelNamespace.schema();

        for name in ["chat", "a", "my-namespace-1"] {
            assert!(validate(&schema, &json!({"api_id": "abc", "name": name})).is_empty(), "{name}");
        }
        for name in ["-chat", "chat-", "has space", ""] {
            assert!(!validate(&schema, &json!({"api_id": "abc", "name": name})).is_empty(), "{name}");
        }
    }

    #[tokio::test]
    async fn test_read_rejects_malformed_id() {
        let clients = AwsClients::offline("us-east-1");
        let err = ChannelNamespace
            .read(&clients, State::new().with("id", "no-separator"))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(err.to_string().contains("api-id,name"));
    }
}
