//! `aws_appsync_resolver`: attaches a data source or pipeline to a GraphQL field.

use async_trait::async_trait;
use aws_sdk_appsync::types::{CachingConfig, PipelineConfig, ResolverKind};
use tracing::{debug, info};

use super::function::{expand_runtime, expand_sync_config, flatten_runtime, flatten_sync_config, runtime_block, sync_config_block};
use super::with_schema_lock;
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, Validator};
use crate::state::State;

const ID: IdFormat = IdFormat::new("-", &["api-id", "type-name", "field-name"]);

/// A resolver for one field of one type.
pub struct Resolver;

/// The request fields shared by create and update.
struct ResolverInput {
    data_source: Option<String>,
    request_template: Option<String>,
    response_template: Option<String>,
    kind: Option<ResolverKind>,
    pipeline: Option<PipelineConfig>,
    caching: Option<CachingConfig>,
    max_batch_size: Option<i32>,
    code: Option<String>,
    runtime: Option<aws_sdk_appsync::types::AppSyncRuntime>,
    sync: Option<aws_sdk_appsync::types::SyncConfig>,
}

impl ResolverInput {
    fn expand(planned: &State) -> Result<Self, ProviderError> {
        Ok(Self {
            data_source: planned.string("data_source"),
            request_template: planned.string("request_template"),
            response_template: planned.string("response_template"),
            kind: planned.enum_value::<ResolverKind>("kind"),
            pipeline: planned.block("pipeline_config").map(|block| {
                PipelineConfig::builder()
                    .set_functions(Some(block.strings("functions")))
                    .build()
            }),
            caching: planned.block("caching_config").map(|block| {
                CachingConfig::builder()
                    .set_ttl(block.i64("ttl"))
                    .set_caching_keys(Some(block.strings("caching_keys")))
                    .build()
            }),
            max_batch_size: planned.i32("max_batch_size"),
            code: planned.string("code"),
            runtime: expand_runtime(planned.block("runtime"))?,
            sync: expand_sync_config(planned.block("sync_config")),
        })
    }
}

#[async_trait]
impl Resource for Resolver {
    fn type_name(&self) -> &'static str {
        "aws_appsync_resolver"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute("type", Attribute::required_string().with_force_new())
            .with_attribute("field", Attribute::required_string().with_force_new())
            .with_attribute("data_source", Attribute::optional_string())
            .with_attribute("request_template", Attribute::optional_string())
            .with_attribute("response_template", Attribute::optional_string())
            .with_attribute(
                "kind",
                Attribute::optional_computed_string()
                    .one_of(&["UNIT", "PIPELINE"])
                    .with_force_new(),
            )
            .with_attribute(
                "max_batch_size",
                Attribute::optional_int64().with_validator(Validator::int_range(0, 2000)),
            )
            .with_attribute("code", Attribute::optional_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_block(
                "pipeline_config",
                NestedBlock::single(
                    Block::new().with_attribute("functions", Attribute::string_list(AttributeFlags::optional())),
                ),
            )
            .with_block(
                "caching_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("caching_keys", Attribute::string_set(AttributeFlags::optional()))
                        .with_attribute("ttl", Attribute::optional_computed_int64()),
                ),
            )
            .with_block("runtime", runtime_block())
            .with_block("sync_config", sync_config_block())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?;
        let type_name = planned.required_str("type")?;
        let field = planned.required_str("field")?;
        let id = ID.encode(&[api_id, type_name, field]);
        let input = ResolverInput::expand(&planned)?;
        debug!(id, "creating AppSync Resolver");

        with_schema_lock(clients, api_id, "creating AppSync Resolver", || {
            let request = clients
                .appsync
                .create_resolver()
                .api_id(api_id)
                .type_name(type_name)
                .field_name(field)
                .set_data_source_name(input.data_source.clone())
                .set_request_mapping_template(input.request_template.clone())
                .set_response_mapping_template(input.response_template.clone())
                .set_kind(input.kind.clone())
                .set_pipeline_config(input.pipeline.clone())
                .set_caching_config(input.caching.clone())
                .set_max_batch_size(input.max_batch_size)
                .set_code(input.code.clone())
                .set_runtime(input.runtime.clone())
                .set_sync_config(input.sync.clone());
            let id = &id;
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(&format!("creating AppSync Resolver ({id})"), e))
            }
        })
        .await?;
        info!(id, "created AppSync Resolver");

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Resolver ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, type_name, field) = ID.decode_triple(&id)?;

        let output = clients
            .appsync
            .get_resolver()
            .api_id(api_id)
            .type_name(type_name)
            .field_name(field)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Resolver ({id})"), e))
            .optional()?;
        let Some(resolver) = output.and_then(|o| o.resolver) else {
            debug!(id, "AppSync Resolver not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("api_id", api_id)
            .with("type", resolver.type_name())
            .with("field", resolver.field_name())
            .with("arn", resolver.resolver_arn())
            .with("data_source", resolver.data_source_name())
            .with("request_template", resolver.request_mapping_template())
            .with("response_template", resolver.response_mapping_template())
            .with("code", resolver.code());
        state.set_enum("kind", resolver.kind());
        if resolver.max_batch_size() > 0 {
            state.set("max_batch_size", resolver.max_batch_size());
        }
        state.set_block(
            "pipeline_config",
            resolver.pipeline_config().map(|pipeline| {
                let mut block = State::new();
                block.set_strings("functions", pipeline.functions());
                block
            }),
        );
        state.set_block(
            "caching_config",
            resolver.caching_config().map(|caching| {
                let mut block = State::new().with("ttl", caching.ttl());
                block.set_strings("caching_keys", caching.caching_keys());
                block
            }),
        );
        state.set_block("runtime", flatten_runtime(resolver.runtime()));
        state.set_block("sync_config", flatten_sync_config(resolver.sync_config()));
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, type_name, field) = ID.decode_triple(&id)?;
        let input = ResolverInput::expand(&planned)?;

        with_schema_lock(clients, api_id, "updating AppSync Resolver", || {
            let request = clients
                .appsync
                .update_resolver()
                .api_id(api_id)
                .type_name(type_name)
                .field_name(field)
                .set_data_source_name(input.data_source.clone())
                .set_request_mapping_template(input.request_template.clone())
                .set_response_mapping_template(input.response_template.clone())
                .set_kind(input.kind.clone())
                .set_pipeline_config(input.pipeline.clone())
                .set_caching_config(input.caching.clone())
                .set_max_batch_size(input.max_batch_size)
                .set_code(input.code.clone())
                .set_runtime(input.runtime.clone())
                .set_sync_config(input.sync.clone());
            let id = &id;
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(&format!("updating AppSync Resolver ({id})"), e))
            }
        })
        .await?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Resolver ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, type_name, field) = ID.decode_triple(id)?;
        debug!(id, "deleting AppSync Resolver");

        with_schema_lock(clients, api_id, "deleting AppSync Resolver", || async move {
            clients
                .appsync
                .delete_resolver()
                .api_id(api_id)
                .type_name(type_name)
                .field_name(field)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("deleting AppSync Resolver ({id})"), e))
                .optional()
        })
        .await?;
        Ok(())
    }
}
