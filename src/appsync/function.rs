//! `aws_appsync_function`: a pipeline function.

use async_trait::async_trait;
use aws_sdk_appsync::types::{
    AppSyncRuntime, ConflictDetectionType, ConflictHandlerType, LambdaConflictHandlerConfig,
    RuntimeName, SyncConfig,
};
use tracing::{debug, info};

use super::with_schema_lock;
use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::state::State;

const ID: IdFormat = IdFormat::new("-", &["api-id", "function-id"]);

const VTL_FUNCTION_VERSION: &str = "2018-05-29";

/// An AppSync function, shared by pipeline resolvers.
pub struct Function;

pub(crate) fn runtime_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("name", Attribute::required_string().one_of(&["APPSYNC_JS"]))
            .with_attribute("runtime_version", Attribute::required_string()),
    )
}

pub(crate) fn sync_config_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute(
                "conflict_detection",
                Attribute::optional_string().one_of(&["VERSION", "NONE"]),
            )
            .with_attribute(
                "conflict_handler",
                Attribute::optional_string().one_of(&["OPTIMISTIC_CONCURRENCY", "LAMBDA", "AUTOMERGE", "NONE"]),
            )
            .with_block(
                "lambda_conflict_handler_config",
                NestedBlock::single(
                    Block::new().with_attribute("lambda_conflict_handler_arn", Attribute::optional_string()),
                ),
            ),
    )
}

pub(crate) fn expand_runtime(block: Option<State>) -> Result<Option<AppSyncRuntime>, ProviderError> {
    let Some(block) = block else {
        return Ok(None);
    };
    let runtime = AppSyncRuntime::builder()
        .name(RuntimeName::from(block.required_str("name")?))
        .runtime_version(block.required_str("runtime_version")?)
        .build()?;
    Ok(Some(runtime))
}

pub(crate) fn flatten_runtime(runtime: Option<&AppSyncRuntime>) -> Option<State> {
    runtime.map(|r| {
        let mut block = State::new().with("runtime_version", r.runtime_version());
        block.set_enum("name", r.name());
        block
    })
}

pub(crate) fn expand_sync_config(block: Option<State>) -> Option<SyncConfig> {
    block.map(|block| {
        SyncConfig::builder()
            .set_conflict_detection(block.enum_value::<ConflictDetectionType>("conflict_detection"))
            .set_conflict_handler(block.enum_value::<ConflictHandlerType>("conflict_handler"))
            .set_lambda_conflict_handler_config(block.block("lambda_conflict_handler_config").map(|lambda| {
                LambdaConflictHandlerConfig::builder()
                    .set_lambda_conflict_handler_arn(lambda.string("lambda_conflict_handler_arn"))
                    .build()
            }))
            .build()
    })
}

pub(crate) fn flatten_sync_config(config: Option<&SyncConfig>) -> Option<State> {
    config.map(|c| {
        let mut block = State::new();
        block.set_enum("conflict_detection", c.conflict_detection());
        block.set_enum("conflict_handler", c.conflict_handler());
        block.set_block(
            "lambda_conflict_handler_config",
            c.lambda_conflict_handler_config().map(|lambda| {
                State::new().with("lambda_conflict_handler_arn", lambda.lambda_conflict_handler_arn())
            }),
        );
        block
    })
}

/// `function_version` is only meaningful for VTL functions, where AppSync requires it.
fn function_version(planned: &State) -> Option<String> {
    planned.string("function_version").or_else(|| {
        planned
            .block("runtime")
            .is_none()
            .then(|| VTL_FUNCTION_VERSION.to_string())
    })
}

#[async_trait]
impl Resource for Function {
    fn type_name(&self) -> &'static str {
        "aws_appsync_function"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("data_source", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("request_mapping_template", Attribute::optional_string())
            .with_attribute("response_mapping_template", Attribute::optional_string())
            .with_attribute(
                "function_version",
                Attribute::optional_computed_string().one_of(&[VTL_FUNCTION_VERSION]),
            )
            .with_attribute(
                "max_batch_size",
                Attribute::optional_int64().with_validator(Validator::int_range(0, 2000)),
            )
            .with_attribute("code", Attribute::optional_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_attribute("function_id", Attribute::computed_string())
            .with_block("runtime", runtime_block())
            .with_block("sync_config", sync_config_block())
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?;
        let name = planned.required_str("name")?;
        debug!(api_id, name, "creating AppSync Function");

        let data_source = planned.required_str("data_source")?;
        let runtime = expand_runtime(planned.block("runtime"))?;

        let output = with_schema_lock(clients, api_id, "creating AppSync Function", || {
            let request = clients
                .appsync
                .create_function()
                .api_id(api_id)
                .name(name)
                .data_source_name(data_source)
                .set_description(planned.string("description"))
                .set_request_mapping_template(planned.string("request_mapping_template"))
                .set_response_mapping_template(planned.string("response_mapping_template"))
                .set_function_version(function_version(&planned))
                .set_max_batch_size(planned.i32("max_batch_size"))
                .set_code(planned.string("code"))
                .set_sync_config(expand_sync_config(planned.block("sync_config")))
                .set_runtime(runtime.clone());
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(&format!("creating AppSync Function ({api_id}/{name})"), e))
            }
        })
        .await?;

        let function_id = output
            .function_configuration()
            .and_then(|f| f.function_id())
            .ok_or_else(|| ProviderError::empty_response("creating AppSync Function"))?;
        let id = ID.encode(&[api_id, function_id]);
        info!(id, "created AppSync Function");

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Function ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, function_id) = ID.decode_pair(&id)?;

        let output = clients
            .appsync
            .get_function()
            .api_id(api_id)
            .function_id(function_id)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Function ({id})"), e))
            .optional()?;
        let Some(function) = output.and_then(|o| o.function_configuration) else {
            debug!(id, "AppSync Function not found, removing from state");
            return Ok(None);
        };

        let mut state = current
            .with("api_id", api_id)
            .with("function_id", function.function_id())
            .with("arn", function.function_arn())
            .with("name", function.name())
            .with("description", function.description())
            .with("data_source", function.data_source_name())
            .with("request_mapping_template", function.request_mapping_template())
            .with("response_mapping_template", function.response_mapping_template())
            .with("function_version", function.function_version())
            .with("code", function.code());
        if function.max_batch_size() > 0 {
            state.set("max_batch_size", function.max_batch_size());
        }
        state.set_block("runtime", flatten_runtime(function.runtime()));
        state.set_block("sync_config", flatten_sync_config(function.sync_config()));
        Ok(Some(state))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, function_id) = ID.decode_pair(&id)?;
        let name = planned.required_str("name")?;
        let data_source = planned.required_str("data_source")?;
        let runtime = expand_runtime(planned.block("runtime"))?;

        with_schema_lock(clients, api_id, "updating AppSync Function", || {
            let request = clients
                .appsync
                .update_function()
                .api_id(api_id)
                .function_id(function_id)
                .name(name)
                .data_source_name(data_source)
                .set_description(planned.string("description"))
                .set_request_mapping_template(planned.string("request_mapping_template"))
                .set_response_mapping_template(planned.string("response_mapping_template"))
                .set_function_version(function_version(&planned))
                .set_max_batch_size(planned.i32("max_batch_size"))
                .set_code(planned.string("code"))
                .set_sync_config(expand_sync_config(planned.block("sync_config")))
                .set_runtime(runtime.clone());
            let id = &id;
            async move {
                request
                    .send()
                    .await
                    .map_err(|e| sdk_error(&format!("updating AppSync Function ({id})"), e))
            }
        })
        .await?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Function ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, function_id) = ID.decode_pair(id)?;
        debug!(id, "deleting AppSync Function");

        with_schema_lock(clients, api_id, "deleting AppSync Function", || async move {
            clients
                .appsync
                .delete_function()
                .api_id(api_id)
                .function_id(function_id)
                .send()
                .await
                .map_err(|e| sdk_error(&format!("deleting AppSync Function ({id})"), e))
                .optional()
        })
        .await?;
        Ok(())
    }
}
