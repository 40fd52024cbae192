//! AWS AppSync resources.
//!
//! GraphQL APIs, their schema objects (types, resolvers, functions, data sources),
//! API keys and caches, custom domains, merged-API associations, and Event APIs
//! with their channel namespaces.

use std::future::Future;

use aws_sdk_appsync::types::{
    AuthenticationType, LambdaAuthorizerConfig, OpenIdConnectConfig,
};

use crate::config::AwsClients;
use crate::error::{sdk_error, ProviderError};
use crate::retry::{retry_on_concurrent_modification, DEFAULT_TIMEOUT};
use crate::schema::{Attribute, Block, NestedBlock, Validator};
use crate::state::State;
use crate::tags::TagDiff;

pub mod api;
pub mod api_cache;
pub mod api_key;
pub mod channel_namespace;
pub mod datasource;
pub mod domain_name;
pub mod domain_name_api_association;
pub mod function;
pub mod graphql_api;
pub mod graphql_type;
pub mod resolver;
pub mod source_api_association;

/// Authorization types accepted wherever AppSync asks for one.
pub const AUTHENTICATION_TYPES: &[&str] = &[
    "API_KEY",
    "AWS_IAM",
    "AMAZON_COGNITO_USER_POOLS",
    "OPENID_CONNECT",
    "AWS_LAMBDA",
];

/// Name of the lock serializing schema mutations on one GraphQL API.
pub fn schema_mutex_key(api_id: &str) -> String {
    format!("appsync-schema-{api_id}")
}

/// Run `op` holding the API's schema lock, retrying on concurrent modification.
pub async fn with_schema_lock<T, F, Fut>(
    clients: &AwsClients,
    api_id: &str,
    what: &str,
    op: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let _guard = clients.locks.lock(&schema_mutex_key(api_id)).await;
    retry_on_concurrent_modification(what, DEFAULT_TIMEOUT, op).await
}

/// Reconcile the tags of `arn` from `prior` to `planned`.
pub async fn update_tags(
    clients: &AwsClients,
    arn: &str,
    prior: &State,
    planned: &State,
) -> Result<(), ProviderError> {
    let diff = TagDiff::new(&prior.string_map("tags"), &planned.string_map("tags"));
    if !diff.remove.is_empty() {
        clients
            .appsync
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(diff.remove))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("untagging AppSync resource ({arn})"), e))?;
    }
    if !diff.upsert.is_empty() {
        clients
            .appsync
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(diff.upsert))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("tagging AppSync resource ({arn})"), e))?;
    }
    Ok(())
}

pub(crate) fn authentication_type_attribute() -> Attribute {
    Attribute::required_string().one_of(AUTHENTICATION_TYPES)
}

pub(crate) fn openid_connect_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("issuer", Attribute::required_string())
            .with_attribute("client_id", Attribute::optional_string())
            .with_attribute(
                "auth_ttl",
                Attribute::optional_computed_int64()
                    .with_description("Milliseconds a token is valid after authentication"),
            )
            .with_attribute(
                "iat_ttl",
                Attribute::optional_computed_int64().with_description("Milliseconds a token is valid after being issued"),
            ),
    )
}

pub(crate) fn lambda_authorizer_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("authorizer_uri", Attribute::required_string())
            .with_attribute(
                "authorizer_result_ttl_in_seconds",
                Attribute::optional_computed_int64().with_validator(Validator::int_range(0, 3600)),
            )
            .with_attribute("identity_validation_expression", Attribute::optional_string()),
    )
}

pub(crate) fn expand_openid_connect(
    block: Option<State>,
) -> Result<Option<OpenIdConnectConfig>, ProviderError> {
    let Some(block) = block else {
        return Ok(None);
    };
    let config = OpenIdConnectConfig::builder()
        .issuer(block.required_str("issuer")?)
        .set_client_id(block.string("client_id"))
        .set_auth_ttl(block.i64("auth_ttl"))
        .set_iat_ttl(block.i64("iat_ttl"))
        .build()?;
    Ok(Some(config))
}

pub(crate) fn flatten_openid_connect(config: Option<&OpenIdConnectConfig>) -> Option<State> {
    config.map(|c| {
        State::new()
            .with("issuer", c.issuer())
            .with("client_id", c.client_id())
            .with("auth_ttl", c.auth_ttl())
            .with("iat_ttl", c.iat_ttl())
    })
}

pub(crate) fn expand_lambda_authorizer(
    block: Option<State>,
) -> Result<Option<LambdaAuthorizerConfig>, ProviderError> {
    let Some(block) = block else {
        return Ok(None);
    };
    let config = LambdaAuthorizerConfig::builder()
        .authorizer_uri(block.required_str("authorizer_uri")?)
        .set_authorizer_result_ttl_in_seconds(block.i32("authorizer_result_ttl_in_seconds"))
        .set_identity_validation_expression(block.string("identity_validation_expression"))
        .build()?;
    Ok(Some(config))
}

pub(crate) fn flatten_lambda_authorizer(config: Option<&LambdaAuthorizerConfig>) -> Option<State> {
    config.map(|c| {
        State::new()
            .with("authorizer_uri", c.authorizer_uri())
            .with("authorizer_result_ttl_in_seconds", c.authorizer_result_ttl_in_seconds())
            .with("identity_validation_expression", c.identity_validation_expression())
    })
}

pub(crate) fn authentication_type(block: &State, key: &str) -> Result<AuthenticationType, ProviderError> {
    Ok(AuthenticationType::from(block.required_str(key)?))
}
