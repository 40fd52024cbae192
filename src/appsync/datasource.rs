//! `aws_appsync_datasource`: a data source attached to a GraphQL API.

use async_trait::async_trait;
use aws_sdk_appsync::types::{
    AuthorizationConfig, AuthorizationType, AwsIamConfig, DataSourceType, DeltaSyncConfig,
    DynamodbDataSourceConfig, ElasticsearchDataSourceConfig, EventBridgeDataSourceConfig,
    HttpDataSourceConfig, LambdaDataSourceConfig, OpenSearchServiceDataSourceConfig,
    RdsHttpEndpointConfig, RelationalDatabaseDataSourceConfig, RelationalDatabaseSourceType,
};
use tracing::debug;

use crate::config::AwsClients;
use crate::error::{sdk_error, NotFoundExt, ProviderError};
use crate::id::IdFormat;
use crate::resource::{read_back, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema, Validator};
use crate::state::State;

const ID: IdFormat = IdFormat::new("-", &["api-id", "data-source-name"]);

const DATA_SOURCE_TYPES: &[&str] = &[
    "AWS_LAMBDA",
    "AMAZON_DYNAMODB",
    "AMAZON_ELASTICSEARCH",
    "AMAZON_OPENSEARCH_SERVICE",
    "HTTP",
    "NONE",
    "RELATIONAL_DATABASE",
    "AMAZON_EVENTBRIDGE",
];

/// An AppSync data source.
///
/// Named `ApiDataSource` to keep it apart from the provider's read-only data sources.
pub struct ApiDataSource;

/// The typed configuration blocks of a data source, ready for a create or update call.
#[derive(Debug, Default)]
struct Configs {
    dynamodb: Option<DynamodbDataSourceConfig>,
    elasticsearch: Option<ElasticsearchDataSourceConfig>,
    opensearch: Option<OpenSearchServiceDataSourceConfig>,
    event_bridge: Option<EventBridgeDataSourceConfig>,
    http: Option<HttpDataSourceConfig>,
    lambda: Option<LambdaDataSourceConfig>,
    relational_database: Option<RelationalDatabaseDataSourceConfig>,
}

fn endpoint_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("endpoint", Attribute::required_string())
            .with_attribute("region", Attribute::optional_computed_string()),
    )
}

impl Configs {
    fn expand(state: &State, region: &str) -> Result<Self, ProviderError> {
        let mut configs = Self::default();

        if let Some(block) = state.block("dynamodb_config") {
            let delta_sync = block.block("delta_sync_config").map(|delta| {
                DeltaSyncConfig::builder()
                    .set_base_table_ttl(delta.i64("base_table_ttl"))
                    .set_delta_sync_table_name(delta.string("delta_sync_table_name"))
                    .set_delta_sync_table_ttl(delta.i64("delta_sync_table_ttl"))
                    .build()
            });
            configs.dynamodb = Some(
                DynamodbDataSourceConfig::builder()
                    .table_name(block.required_str("table_name")?)
                    .aws_region(block.str("region").unwrap_or(region))
                    .set_use_caller_credentials(block.bool("use_caller_credentials"))
                    .set_versioned(block.bool("versioned"))
                    .set_delta_sync_config(delta_sync)
                    .build()?,
            );
        }

        if let Some(block) = state.block("elasticsearch_config") {
            configs.elasticsearch = Some(
                ElasticsearchDataSourceConfig::builder()
                    .endpoint(block.required_str("endpoint")?)
                    .aws_region(block.str("region").unwrap_or(region))
                    .build()?,
            );
        }

        if let Some(block) = state.block("opensearchservice_config") {
            configs.opensearch = Some(
                OpenSearchServiceDataSourceConfig::builder()
                    .endpoint(block.required_str("endpoint")?)
                    .aws_region(block.str("region").unwrap_or(region))
                    .build()?,
            );
        }

        if let Some(block) = state.block("event_bridge_config") {
            configs.event_bridge = Some(
                EventBridgeDataSourceConfig::builder()
                    .event_bus_arn(block.required_str("event_bus_arn")?)
                    .build()?,
            );
        }

        if let Some(block) = state.block("http_config") {
            let authorization = match block.block("authorization_config") {
                Some(auth) => {
                    let iam = auth.block("aws_iam_config").map(|iam| {
                        AwsIamConfig::builder()
                            .set_signing_region(iam.string("signing_region"))
                            .set_signing_service_name(iam.string("signing_service_name"))
                            .build()
                    });
                    Some(
                        AuthorizationConfig::builder()
                            .authorization_type(AuthorizationType::from(
                                auth.str("authorization_type").unwrap_or("AWS_IAM"),
                            ))
                            .set_aws_iam_config(iam)
                            .build()?,
                    )
                },
                None => None,
            };
            configs.http = Some(
                HttpDataSourceConfig::builder()
                    .endpoint(block.required_str("endpoint")?)
                    .set_authorization_config(authorization)
                    .build(),
            );
        }

        if let Some(block) = state.block("lambda_config") {
            configs.lambda = Some(
                LambdaDataSourceConfig::builder()
                    .lambda_function_arn(block.required_str("function_arn")?)
                    .build()?,
            );
        }

        if let Some(block) = state.block("relational_database_config") {
            let endpoint = block.block("http_endpoint_config").map(|http| {
                RdsHttpEndpointConfig::builder()
                    .set_db_cluster_identifier(http.string("db_cluster_identifier"))
                    .set_aws_secret_store_arn(http.string("aws_secret_store_arn"))
                    .set_database_name(http.string("database_name"))
                    .aws_region(http.str("region").unwrap_or(region))
                    .set_schema(http.string("schema"))
                    .build()
            });
            configs.relational_database = Some(
                RelationalDatabaseDataSourceConfig::builder()
                    .relational_database_source_type(RelationalDatabaseSourceType::from(
                        block.str("source_type").unwrap_or("RDS_HTTP_ENDPOINT"),
                    ))
                    .set_rds_http_endpoint_config(endpoint)
                    .build(),
            );
        }

        Ok(configs)
    }
}

fn flatten(source: &aws_sdk_appsync::types::DataSource, mut state: State) -> State {
    state.set("name", source.name());
    state.set("arn", source.data_source_arn());
    state.set("description", source.description());
    state.set("service_role_arn", source.service_role_arn());
    state.set_enum("type", source.r#type());

    state.set_block(
        "dynamodb_config",
        source.dynamodb_config().map(|c| {
            State::new()
                .with("table_name", c.table_name())
                .with("region", c.aws_region())
                .with("use_caller_credentials", c.use_caller_credentials())
                .with("versioned", c.versioned())
                .with(
                    "delta_sync_config",
                    c.delta_sync_config().map(|d| {
                        State::new()
                            .with("base_table_ttl", d.base_table_ttl())
                            .with("delta_sync_table_name", d.delta_sync_table_name())
                            .with("delta_sync_table_ttl", d.delta_sync_table_ttl())
                            .into_value()
                    }),
                )
        }),
    );
    state.set_block(
        "elasticsearch_config",
        source.elasticsearch_config().map(|c| {
            State::new().with("endpoint", c.endpoint()).with("region", c.aws_region())
        }),
    );
    state.set_block(
        "opensearchservice_config",
        source.open_search_service_config().map(|c| {
            State::new().with("endpoint", c.endpoint()).with("region", c.aws_region())
        }),
    );
    state.set_block(
        "event_bridge_config",
        source
            .event_bridge_config()
            .map(|c| State::new().with("event_bus_arn", c.event_bus_arn())),
    );
    state.set_block(
        "http_config",
        source.http_config().map(|c| {
            let authorization = c.authorization_config().map(|auth| {
                let mut block = State::new().with(
                    "aws_iam_config",
                    auth.aws_iam_config().map(|iam| {
                        State::new()
                            .with("signing_region", iam.signing_region())
                            .with("signing_service_name", iam.signing_service_name())
                            .into_value()
                    }),
                );
                block.set_enum("authorization_type", auth.authorization_type());
                block
            });
            let mut block = State::new().with("endpoint", c.endpoint());
            block.set_block("authorization_config", authorization);
            block
        }),
    );
    state.set_block(
        "lambda_config",
        source
            .lambda_config()
            .map(|c| State::new().with("function_arn", c.lambda_function_arn())),
    );
    state.set_block(
        "relational_database_config",
        source.relational_database_config().map(|c| {
            let mut block = State::new();
            block.set_enum("source_type", c.relational_database_source_type());
            block.set_block(
                "http_endpoint_config",
                c.rds_http_endpoint_config().map(|http| {
                    State::new()
                        .with("db_cluster_identifier", http.db_cluster_identifier())
                        .with("aws_secret_store_arn", http.aws_secret_store_arn())
                        .with("database_name", http.database_name())
                        .with("region", http.aws_region())
                        .with("schema", http.schema())
                }),
            );
            block
        }),
    );
    state
}

#[async_trait]
impl Resource for ApiDataSource {
    fn type_name(&self) -> &'static str {
        "aws_appsync_datasource"
    }

    fn schema(&self) -> Schema {
        Schema::resource()
            .with_attribute("api_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "name",
                Attribute::required_string().with_force_new().with_validator(Validator::pattern(
                    "^[_A-Za-z][_0-9A-Za-z]*$",
                    "must match [_A-Za-z][_0-9A-Za-z]*",
                )),
            )
            .with_attribute("type", Attribute::required_string().one_of(DATA_SOURCE_TYPES))
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("service_role_arn", Attribute::optional_string())
            .with_attribute("arn", Attribute::computed_string())
            .with_block(
                "dynamodb_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("table_name", Attribute::required_string())
                        .with_attribute("region", Attribute::optional_computed_string())
                        .with_attribute("use_caller_credentials", Attribute::optional_bool().with_default(false))
                        .with_attribute("versioned", Attribute::optional_bool().with_default(false))
                        .with_block(
                            "delta_sync_config",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute(
                                        "base_table_ttl",
                                        Attribute::optional_computed_int64().with_validator(Validator::int_range(1, i64::MAX)),
                                    )
                                    .with_attribute("delta_sync_table_name", Attribute::required_string())
                                    .with_attribute(
                                        "delta_sync_table_ttl",
                                        Attribute::optional_computed_int64().with_validator(Validator::int_range(1, i64::MAX)),
                                    ),
                            ),
                        ),
                ),
            )
            .with_block("elasticsearch_config", endpoint_block())
            .with_block("opensearchservice_config", endpoint_block())
            .with_block(
                "event_bridge_config",
                NestedBlock::single(Block::new().with_attribute("event_bus_arn", Attribute::required_string())),
            )
            .with_block(
                "http_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("endpoint", Attribute::required_string())
                        .with_block(
                            "authorization_config",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute(
                                        "authorization_type",
                                        Attribute::optional_string()
                                            .with_default("AWS_IAM")
                                            .one_of(&["AWS_IAM"]),
                                    )
                                    .with_block(
                                        "aws_iam_config",
                                        NestedBlock::single(
                                            Block::new()
                                                .with_attribute("signing_region", Attribute::optional_string())
                                                .with_attribute("signing_service_name", Attribute::optional_string()),
                                        ),
                                    ),
                            ),
                        ),
                ),
            )
            .with_block(
                "lambda_config",
                NestedBlock::single(Block::new().with_attribute("function_arn", Attribute::required_string())),
            )
            .with_block(
                "relational_database_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "source_type",
                            Attribute::optional_string()
                                .with_default("RDS_HTTP_ENDPOINT")
                                .one_of(&["RDS_HTTP_ENDPOINT"]),
                        )
                        .with_block(
                            "http_endpoint_config",
                            NestedBlock::single(
                                Block::new()
                                    .with_attribute("db_cluster_identifier", Attribute::required_string())
                                    .with_attribute("aws_secret_store_arn", Attribute::required_string())
                                    .with_attribute("database_name", Attribute::optional_string())
                                    .with_attribute("region", Attribute::optional_computed_string())
                                    .with_attribute("schema", Attribute::optional_string()),
                            ),
                        ),
                ),
            )
    }

    async fn create(&self, clients: &AwsClients, planned: State) -> Result<State, ProviderError> {
        let api_id = planned.required_str("api_id")?;
        let name = planned.required_str("name")?;
        let id = ID.encode(&[api_id, name]);
        let configs = Configs::expand(&planned, &clients.region)?;
        debug!(id, "creating AppSync Data Source");

        clients
            .appsync
            .create_data_source()
            .api_id(api_id)
            .name(name)
            .set_type(planned.enum_value::<DataSourceType>("type"))
            .set_description(planned.string("description"))
            .set_service_role_arn(planned.string("service_role_arn"))
            .set_dynamodb_config(configs.dynamodb)
            .set_elasticsearch_config(configs.elasticsearch)
            .set_open_search_service_config(configs.opensearch)
            .set_event_bridge_config(configs.event_bridge)
            .set_http_config(configs.http)
            .set_lambda_config(configs.lambda)
            .set_relational_database_config(configs.relational_database)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("creating AppSync Data Source ({id})"), e))?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Data Source ({id})"), self.read(clients, state).await?)
    }

    async fn read(&self, clients: &AwsClients, current: State) -> Result<Option<State>, ProviderError> {
        let id = current.id()?.to_owned();
        let (api_id, name) = ID.decode_pair(&id)?;

        let output = clients
            .appsync
            .get_data_source()
            .api_id(api_id)
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("reading AppSync Data Source ({id})"), e))
            .optional()?;
        let Some(source) = output.and_then(|o| o.data_source) else {
            debug!(id, "AppSync Data Source not found, removing from state");
            return Ok(None);
        };

        Ok(Some(flatten(&source, current.with("api_id", api_id))))
    }

    async fn update(&self, clients: &AwsClients, prior: State, planned: State) -> Result<State, ProviderError> {
        let id = prior.id()?.to_owned();
        let (api_id, name) = ID.decode_pair(&id)?;
        let configs = Configs::expand(&planned, &clients.region)?;

        clients
            .appsync
            .update_data_source()
            .api_id(api_id)
            .name(name)
            .set_type(planned.enum_value::<DataSourceType>("type"))
            .set_description(planned.string("description"))
            .set_service_role_arn(planned.string("service_role_arn"))
            .set_dynamodb_config(configs.dynamodb)
            .set_elasticsearch_config(configs.elasticsearch)
            .set_open_search_service_config(configs.opensearch)
            .set_event_bridge_config(configs.event_bridge)
            .set_http_config(configs.http)
            .set_lambda_config(configs.lambda)
            .set_relational_database_config(configs.relational_database)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("updating AppSync Data Source ({id})"), e))?;

        let state = planned.with("id", id.as_str());
        read_back(&format!("AppSync Data Source ({id})"), self.read(clients, state).await?)
    }

    async fn delete(&self, clients: &AwsClients, current: State) -> Result<(), ProviderError> {
        let id = current.id()?;
        let (api_id, name) = ID.decode_pair(id)?;
        debug!(id, "deleting AppSync Data Source");

        clients
            .appsync
            .delete_data_source()
            .api_id(api_id)
            .name(name)
            .send()
            .await
            .map_err(|e| sdk_error(&format!("deleting AppSync Data Source ({id})"), e))
            .optional()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::plan;
    use crate::validation::validate;
    use serde_json::json;

    #[test]
    fn test_id_keeps_name_intact() {
        assert_eq!(ID.decode_pair("abc123-my_source").unwrap(), ("abc123", "my_source"));
        assert!(ID.decode_pair("abc123").is_err());
    }

    #[test]
    fn test_name_validation() {
        let schema = ApiDataSource.schema();

        assert!(validate(&schema, &json!({"api_id": "a", "name": "_tbl1", "type": "NONE"})).is_empty());
        assert!(!validate(&schema, &json!({"api_id": "a", "name": "1tbl", "type": "NONE"})).is_empty());
        assert!(!validate(&schema, &json!({"api_id": "a", "name": "tbl", "type": "S3"})).is_empty());
    }

    #[test]
    fn test_region_defaults_to_provider_region() {
        let state = State::from_value(json!({
            "dynamodb_config": {"table_name": "pets", "delta_sync_config": {"delta_sync_table_name": "d"}},
            "opensearchservice_config": {"endpoint": "https://search", "region": "eu-west-1"},
        }))
        .unwrap();
        let configs = Configs::expand(&state, "us-east-2").unwrap();

        let dynamodb = configs.dynamodb.unwrap();
        assert_eq!(dynamodb.aws_region(), "us-east-2");
        assert_eq!(
            dynamodb.delta_sync_config().and_then(|d| d.delta_sync_table_name()),
            Some("d")
        );
        assert_eq!(configs.opensearch.unwrap().aws_region(), "eu-west-1");
        assert!(configs.lambda.is_none());
    }

    #[test]
    fn test_http_authorization_defaults() {
        let state = State::from_value(json!({
            "http_config": {"endpoint": "https://example.com", "authorization_config": {}},
            "relational_database_config": {"http_endpoint_config": {
                "db_cluster_identifier": "arn:cluster", "aws_secret_store_arn": "arn:secret",
            }},
        }))
        .unwrap();
        let configs = Configs::expand(&state, "us-east-1").unwrap();

        let auth = configs.http.unwrap().authorization_config().cloned().unwrap();
        assert_eq!(auth.authorization_type(), &AuthorizationType::AwsIam);

        let rds = configs.relational_database.unwrap();
        assert_eq!(
            rds.relational_database_source_type(),
            Some(&RelationalDatabaseSourceType::RdsHttpEndpoint)
        );
        assert_eq!(
            rds.rds_http_endpoint_config().and_then(|c| c.aws_region()),
            Some("us-east-1")
        );
    }

    #[test]
    fn test_flatten() {
        let source = aws_sdk_appsync::types::DataSource::builder()
            .name("pets")
            .r#type(DataSourceType::AmazonDynamodb)
            .data_source_arn("arn:aws:appsync:us-east-1:1:apis/abc/datasources/pets")
            .dynamodb_config(
                DynamodbDataSourceConfig::builder()
                    .table_name("pets")
                    .aws_region("us-east-1")
                    .build()
                    .unwrap(),
            )
            .build();
        let state = flatten(&source, State::new().with("id", "abc-pets")).into_value();

        assert_eq!(state["type"], json!("AMAZON_DYNAMODB"));
        assert_eq!(state["dynamodb_config"]["table_name"], json!("pets"));
        assert_eq!(state["dynamodb_config"]["delta_sync_config"], serde_json::Value::Null);
        assert_eq!(state["lambda_config"], serde_json::Value::Null);
    }

    #[test]
    fn test_read_back_dynamodb_plans_no_changes() {
        let source = aws_sdk_appsync::types::DataSource::builder()
            .name("posts")
            .data_source_arn("arn:aws:appsync:us-east-1:123456789012:apis/abc/datasources/posts")
            .r#type(DataSourceType::AmazonDynamodb)
            .service_role_arn("arn:aws:iam::123456789012:role/appsync")
            .dynamodb_config(
                DynamodbDataSourceConfig::builder()
                    .table_name("posts")
                    .aws_region("us-east-1")
                    .build()
                    .unwrap(),
            )
            .build();
        let prior = flatten(&source, State::new().with("id", "abc-posts").with("api_id", "abc")).into_value();
        assert_eq!(prior["dynamodb_config"]["versioned"], json!(false));

        let config = json!({
            "api_id": "abc",
            "name": "posts",
            "type": "AMAZON_DYNAMODB",
            "service_role_arn": "arn:aws:iam::123456789012:role/appsync",
            "dynamodb_config": {"table_name": "posts"},
        });
        let result = plan(&ApiDataSource.schema(), &prior, &config).unwrap();
        assert!(!result.has_changes(), "{:?}", result.changes);
        assert_eq!(result.planned_state["dynamodb_config"]["region"], json!("us-east-1"));

        let mut versioned = config.clone();
        versioned["dynamodb_config"]["versioned"] = json!(true);
        let result = plan(&ApiDataSource.schema(), &prior, &versioned).unwrap();
        assert_eq!(result.changes.len(), 1);
        assert_eq!(result.changes[0].path, "dynamodb_config");
    }
}
