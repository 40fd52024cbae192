//! `aws_appsync_graphql_api` and its lookup data source.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_appsync::primitives::Blob;
use aws_sdk_appsync::types::{
    AdditionalAuthenticationProvider, CognitoUserPoolConfig, DefaultAction, FieldLogLevel,
    GraphQlApiIntrospectionConfig, GraphQlApiType, GraphQlApiVisibility, LogConfig,
    UserPoolConfig,
};
use tracing::{debug, info};

use super::{
    authentication_type, authentication_type_attribute, expand_lambda_authorizer,
    expand_openid_connect, flatten_lambda_authorizer, flatten_openid_connect,
    lambda_authorizer_block, openid_connect_block, update_tags, with_schema_lock,
};
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::resource::{read_back, DataSource, Resource};
use crate::retry::{wait_for_status, StatusWait};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::state::State;
use crate::tags::tags_from;

const TYPE_NAME: &str = "aws_appsync_graphql_api";

const SCHEMA_PENDING: &[&str] = &["PROCESSING"];
const SCHEMA_TARGET: &[&str] = &["ACTIVE", "SUCCESS"];
const SCHEMA_TIMEOUT: Duration = Duration::from_secs(2 * 60);

/// A GraphQL API, optionally with its SDL schema.
pub struct GraphqlApi;

fn user_pool_block(with_default_action: bool) -> NestedBlock {
    let mut block = Block::new()
        .with_attribute("user_pool_id", Attribute::required_string())
        .with_attribute("aws_region", Attribute::optional_computed_string())
        .with_attribute("app_id_client_regex", Attribute::optional_string());
    if with_default_action {
        block = block.with_attribute(
            "default_action",
            Attribute::required_string().one_of(&["ALLOW", "DENY"]),
        );
    }
    NestedBlock::single(block)
}

fn log_config_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("cloudwatch_logs_role_arn", Attribute::required_string())
            .with_attribute(
                "field_log_level",
                Attribute::required_string().one_of(&["ALL", "ERROR", "NONE", "INFO", "DEBUG"]),
            )
            .with_attribute("exclude_verbose_content", Attribute::optional_bool().with_default(false)),
    )
}

impl GraphqlApi {
    fn expand_log_config(block: Option<State>) -> Result<Option<LogConfig>, ProviderError> {
        let Some(block) = block else {
            return Ok(None);
        };
        let config = LogConfig::builder()
            .cloud_watch_logs_role_arn(block.required_str("cloudwatch_logs_role_arn")?)
            .field_log_level(FieldLogLevel::from(block.required_str("field_log_level")?))
            .set_exclude_verbose_content(block.bool("exclude_verbose_content"))
            .build()?;
        Ok(Some(config))
    }

    fn expand_user_pool(
        block: Option<State>,
        region: &str,
    ) -> Result<Option<UserPoolConfig>, ProviderError> {
        let Some(block) = block else {
            return Ok(None);
        };
        let config = UserPoolConfig::builder()
            .user_pool_id(block.required_str("user_pool_id")?)
            .aws_region(block.str("aws_region").unwrap_or(region))
            .default_action(DefaultAction::from(block.required_str("default_action")?))
            .set_app_id_client_regex(block.string("app_id_client_regex"))
            .build()?;
        Ok(Some(config))
    }

    fn expand_additional_providers(
        blocks: Vec<State>,
        region: &str,
    ) -> Result<Option<Vec<AdditionalAuthenticationProvider>>, ProviderError> {
        let mut providers = Vec::with_capacity(blocks.len());
        for block in blocks {
            let user_pool = match block.block("user_pool_config") {
                Some(pool) => Some(
                    CognitoUserPoolConfig::builder()
                        .user_pool_id(pool.required_str("user_pool_id")?)
                        .aws_region(pool.str("aws_region").unwrap_or(region))
                        .set_app_id_client_regex(pool.string("app_id_client_regex"))
                        .build()?,
                ),
                None => None,
            };
            providers.push(
                AdditionalAuthenticationProvider::builder()
                    .authentication_type(authentication_type(&block, "authentication_type")?)
                    .set_open_id_connect_config(expand_openid_connect(block.block("openid_connect_config"))?)
                    .set_lambda_authorizer_config(expand_lambda_authorizer(
                        block.block("lambda_authorizer_config"),
                    )?)
                    .set_user_pool_config(user_pool)
                    .build(),
            );
        }
        Ok(Some(providers))
    }

    fn flatten(api: &aws_sdk_appsync::types::GraphqlApi, mut state: State) -> State {
        state.set("name", api.name());
        state.set_enum("authentication_type", api.authentication_type());
        state.set("arn", api.arn());
        state.set_string_map("uris", api.uris());
        state.set_string_map("tags", api.tags());
        state.set("xray_enabled", api.xray_enabled());
        state.set_enum("visibility", api.visibility());
        state.set_enum("api_type", api.api_type());
        state.set("merged_api_execution_role_arn", api.merged_api_execution_role_arn());
        state.set_enum("introspection_config", api.introspection_config());
        state.set("query_depth_limit", api.query_depth_limit());
        state.set("resolver_count_limit", api.resolver_count_limit());

        state.set_block(
            "log_config",
            api.log_config().map(|c| {
                let mut block = State::new()
                    .with("cloudwatch_logs_role_arn", c.cloud_watch_logs_role_arn())
                    .with("exclude_verbose_content", c.exclude_verbose_content());
                block.set_enum("field_log_level", c.field_log_level());
                block
            }),
        );
        state.set_block(
            "user_pool_config",
            api.user_pool_config().map(|c| {
                let mut block = State::new()
                    .with("user_pool_id", c.user_pool_id())
                    .with("aws_region", c.aws_region())
                    .with("app_id_client_regex", c.app_id_client_regex());
                block.set_enum("default_action", c.default_action());
                block
            }),
        );
        state.set_block(
            "openid_connect_config",
            flatten_openid_connect(api.open_id_connect_config()),
        );
        state.set_block(
            "lambda_authorizer_config",
            flatten_lambda_authorizer(api.lambda_authorizer_config()),
        );
        state.set_blocks(
            "additional_authentication_provider",
            api.additional_authentication_providers().iter().map(|p| {
                let mut block = State::new();
                block.set_enum("authentication_type", p.authentication_type());
                block.set_block(
                    "openid_connect_config",
                    flatten_openid_connect(p.open_id_connect_config()),
                );
                block.set_block(
                    "lambda_authorizer_config",
                    flatten_lambda_authorizer(p.lambda_authorizer_config()),
                );
                block.set_block(
                    "user_pool_config",
                    p.user_pool_config().map(|c| {
                        State::new()
                            .with("user_pool_id", c.user_pool_id())
                            .with("aws_region", c.aws_region())
                            .with("app_id_client_regex", c.app_id_client_regex())
                    }),
                );
                block
            }),
        );
        state
    }
}

async fn get_api(
    clients: &AwsClients,
    api_id: &str,
) -> Result<Option<aws_sdk_appsync::types::GraphqlApi>, ProviderError> {
    let output = clients
        .appsync
        .get_graphql_api()
        .api_id(api_id)
        .send()
        .await
        .map_err(|e| sdk_error(&format!("reading AppSync GraphQL API ({api_id})"), e))
        .optional()?;
    Ok(output.and_then(|o| o.graphql_api))
}

/// Upload an SDL schema and wait for AppSync to finish processing it.
async fn put_schema(clients: &AwsClients, api_id: &str, definition: &str) -> Result<(), ProviderError> {
    with_schema_lock(clients, api_id, "starting schema creation", || async move {
        debug!(api_id, "starting AppSync schema creation");
        clients
            .appsync
            .start_schema_creation()
            .api_id(api_id)
            .definition(Blob::new(definition.as_bytes()))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync GraphQL API ({api_id}) schema"), e))?;

        let wait = StatusWait::new(SCHEMA_PENDING, SCHEMA_TARGET, SCHEMA_TIMEOUT)
            .with_poll_interval(Duration::from_secs(2));
        wait_for_status("AppSync schema", &wait, || async move {
            let output = clients
                .appsync
                .get_schema_creation_status()
                .api_id(api_id)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("reading AppSync GraphQL API ({api_id}) schema status"), e))
                .optional()?;
            let Some(output) = output else {
                return Ok(None);
            };
            let status = output.status().map(|s| s.as_str().to_owned()).unwrap_or_default();
            if status == "FAILED" {
                return Err(ProviderError::InvalidRequest(format!(
                    "AppSync GraphQL API ({api_id}) schema creation failed: {}",
                    output.details().unwrap_or_default()
                )));
            }
            Ok(Some(((), status)))
        })
        .await?;
        Ok(())
    })
    .await?;
    info!(api_id, "AppSync schema active");
    Ok(())
}

#[async_trait]
impl Resource for GraphqlApi {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_tags()
            .with_attribute(
                "name",
                Attribute::required_string().with_validator(Validator::length(1, 65536)),
            )
            .with_attribute("authentication_type", authentication_type_attribute())
            .with_attribute(
                "schema",
                Attribute::optional_string().with_description("GraphQL schema definition in SDL"),
            )
            .with_attribute("xray_enabled", Attribute::optional_bool().with_default(false))
            .with_attribute(
                "visibility",
                Attribute::optional_computed_string()
                    .one_of(&["GLOBAL", "PRIVATE"])
                    .with_force_new(),
            )
            .with_attribute(
                "api_type",
                Attribute::optional_computed_string()
                    .one_of(&["GRAPHQL", "MERGED"])
                    .with_force_new(),
            )
            .with_attribute("merged_api_execution_role_arn", Attribute::optional_string())
            .with_attribute(
                "introspection_config",
                Attribute::optional_computed_string().one_of(&["ENABLED", "DISABLED"]),
            )
            .with_attribute(
                "query_depth_limit",
                Attribute::optional_computed_int64().with_validator(Validator::int_range(0, 75)),
            )
            .with_attribute(
                "resolver_count_limit",
                Attribute::optional_computed_int64().with_validator(Validator::int_range(0, 10000)),
            )
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("uris", Attribute::computed_string_map())
            .with_block("log_config", log_config_block())
            .with_block("user_pool_config", user_pool_block(true))
            .with_block("openid_connect_config", openid_connect_block())
            .with_block("lambda_authorizer_config", lambda_authorizer_block())
            .with_block(
                "additional_authentication_provider",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("authentication_type", authentication_type_attribute())
                        .with_block("openid_connect_config", openid_connect_block())
                        .with_block("user_pool_config", user_pool_block(false))
                        .with_block("lambda_authorizer_config", lambda_authorizer_block()),
                ),
            )
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let name = planned.required_str("name")?;
        debug!(name, "creating AppSync GraphQL API");

        let output = clients
            .appsync
            .create_graphql_api()
            .name(name)
            .authentication_type(authentication_type(&planned, "authentication_type")?)
            .set_log_config(Self::expand_log_config(planned.block("log_config"))?)
            .set_user_pool_config(Self::expand_user_pool(
                planned.block("user_pool_config"),
                &clients.region,
            )?)
            .set_open_id_connect_config(expand_openid_connect(planned.block("openid_connect_config"))?)
            .set_lambda_authorizer_config(expand_lambda_authorizer(
                planned.block("lambda_authorizer_config"),
            )?)
            .set_additional_authentication_providers(Self::expand_additional_providers(
                planned.blocks("additional_authentication_provider"),
                &clients.region,
            )?)
            .set_xray_enabled(planned.bool("xray_enabled"))
            .set_visibility(planned.enum_value::<GraphQlApiVisibility>("visibility"))
            .set_api_type(planned.enum_value::<GraphQlApiType>("api_type"))
            .set_merged_api_execution_role_arn(planned.string("merged_api_execution_role_arn"))
            .set_introspection_config(planned.enum_value::<GraphQlApiIntrospectionConfig>("introspection_config"))
            .set_query_depth_limit(planned.i32("query_depth_limit"))
            .set_resolver_count_limit(planned.i32("resolver_count_limit"))
            .set_tags(tags_from(&planned))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync GraphQL API ({name})"), e))?;

        let api_id = output
            .graphql_api()
            .and_then(|api| api.api_id())
            .ok_or_else(|| ProviderError::empty_response("creating AppSync GraphQL API"))?
            .to_owned();
        info!(api_id, "created AppSync GraphQL API");

        if let Some(definition) = planned.str("schema") {
            put_schema(clients, &api_id, definition).await?;
        }

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync GraphQL API ({api_id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let api_id = current.id()?.to_owned();
        match get_api(clients, &api_id).await? {
            Some(api) => Ok(Some(Self::flatten(&api, current))),
            None => {
                debug!(api_id, "AppSync GraphQL API not found, removing from state");
                Ok(None)
            },
        }
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let api_id = prior.id()?.to_owned();
        let name = planned.required_str("name")?;

        clients
            .appsync
            .update_graphql_api()
            .api_id(&api_id)
            .name(name)
            .authentication_type(authentication_type(&planned, "authentication_type")?)
            .set_log_config(Self::expand_log_config(planned.block("log_config"))?)
            .set_user_pool_config(Self::expand_user_pool(
                planned.block("user_pool_config"),
                &clients.region,
            )?)
            .set_open_id_connect_config(expand_openid_connect(planned.block("openid_connect_config"))?)
            .set_lambda_authorizer_config(expand_lambda_authorizer(
                planned.block("lambda_authorizer_config"),
            )?)
            .set_additional_authentication_providers(Self::expand_additional_providers(
                planned.blocks("additional_authentication_provider"),
                &clients.region,
            )?)
            .set_xray_enabled(planned.bool("xray_enabled"))
            .set_merged_api_execution_role_arn(planned.string("merged_api_execution_role_arn"))
            .set_introspection_config(planned.enum_value::<GraphQlApiIntrospectionConfig>("introspection_config"))
            .set_query_depth_limit(planned.i32("query_depth_limit"))
            .set_resolver_count_limit(planned.i32("resolver_count_limit"))
            .send()
            .await
            .map_err(|e| sdk_error(&format!("updating AppSync GraphQL API ({api_id})"), e))?;

        if planned.changed(&prior, "schema") {
            if let Some(definition) = planned.str("schema") {
                put_schema(clients, &api_id, definition).await?;
            }
        }

        if planned.changed(&prior, "tags") {
            if let Some(arn) = prior.str("arn") {
                update_tags(clients, arn, &prior, &planned).await?;
            }
        }

        let state = planned.with("id", api_id.as_str());
        read_back(&format!("AppSync GraphQL API ({api_id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let api_id = current.id()?;
        debug!(api_id, "deleting AppSync GraphQL API");
        clients
            .appsync
            .delete_graphql_api()
            .api_id(api_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync GraphQL API ({api_id})"), e))
            .optional()?;
        Ok(())
    }
}

/// Looks up an existing GraphQL API by ID.
pub struct GraphqlApiLookup;

#[async_trait]
impl DataSource for GraphqlApiLookup {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("api_id", Attribute::required_string())
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("authentication_type", Attribute::computed_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("uris", Attribute::computed_string_map())
            .with_attribute("xray_enabled", Attribute::computed_bool())
            .with_attribute("visibility", Attribute::computed_string())
            .with_attribute("api_type", Attribute::computed_string())
            .with_attribute("tags", Attribute::computed_string_map())
    }

    async fn read(&self, clients: &AwsClients, config: State) -> Result<State, ProviderError> {
        let api_id = config.required_str("api_id")?;
        let api = get_api(clients, api_id)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("AppSync GraphQL API ({api_id}) not found")))?;

        let mut state = State::new()
            .with("api_id", api_id)
            .with("id", api_id)
            .with("name", api.name())
            .with("arn", api.arn())
            .with("xray_enabled", api.xray_enabled());
        state.set_enum("authentication_type", api.authentication_type());
        state.set_enum("visibility", api.visibility());
        state.set_enum("api_type", api.api_type());
        state.set_string_map("uris", api.uris());
        state.set_string_map("tags", api.tags());
        Ok(state)
    }
}
