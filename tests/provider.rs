use hemmer_provider_aws::testing::{
    assert_error_contains, assert_plan_changes_attribute, assert_plan_no_changes, assert_plan_replaces,
    assert_plan_updates_in_place, ProviderTester, TestError,
};
use hemmer_provider_aws::{AwsProvider, ProviderError, ProviderService};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};

fn tester() -> ProviderTester<AwsProvider> {
    ProviderTester::new(AwsProvider::new())
}

#[test]
fn serves_every_resource_type() {
    let tester = tester();
    let resources = tester.resource_types();

    for name in [
        "aws_appsync_graphql_api",
        "aws_appsync_api",
        "aws_appsync_channel_namespace",
        "aws_appsync_datasource",
        "aws_appsync_domain_name",
        "aws_appsync_domain_name_api_association",
        "aws_appsync_function",
        "aws_appsync_resolver",
        "aws_appsync_type",
        "aws_appsync_api_key",
        "aws_appsync_api_cache",
        "aws_appsync_source_api_association",
        "aws_rekognition_collection",
        "aws_rekognition_project",
        "aws_rekognition_stream_processor",
    ] {
        assert!(resources.iter().any(|r| r == name), "{name} is not served");
    }
    assert_eq!(resources.len(), 15);
    assert_eq!(tester.data_source_types(), vec!["aws_appsync_graphql_api"]);

    let schema = tester.schema();
    assert!(schema.resources["aws_rekognition_collection"]
        .block
        .attributes
        .contains_key("tags"));
}

#[tokio::test]
async fn provider_config_validation() {
    let tester = tester();

    assert_ok!(
        tester
            .validate_provider_config(json!({"region": "eu-west-1", "max_retries": 5}))
            .await
    );

    let err = assert_err!(tester.configure(json!({"max_retries": 100})).await);
    assert_eq!(err.diagnostics().len(), 1);
}

#[tokio::test]
async fn source_association_needs_one_of_each_pair() {
    let tester = tester();

    assert_ok!(
        tester
            .validate_resource_config(
                "aws_appsync_source_api_association",
                json!({"merged_api_id": "merged", "source_api_arn": "arn:aws:appsync:us-east-1:123456789012:apis/source"}),
            )
            .await
    );

    let err = assert_err!(
        tester
            .validate_resource_config(
                "aws_appsync_source_api_association",
                json!({"merged_api_id": "merged", "merged_api_arn": "arn:aws:appsync:us-east-1:123456789012:apis/merged"}),
            )
            .await
    );
    assert_eq!(err.diagnostics().len(), 2);
}

#[tokio::test]
async fn project_auto_update_needs_content_moderation() {
    let tester = tester();

    let err = assert_err!(
        tester
            .validate_resource_config("aws_rekognition_project", json!({"name": "labels", "auto_update": "ENABLED"}))
            .await
    );
    assert_error_contains(err.diagnostics(), "CONTENT_MODERATION");

    assert_ok!(
        tester
            .validate_resource_config(
                "aws_rekognition_project",
                json!({"name": "moderation", "feature": "CONTENT_MODERATION", "auto_update": "DISABLED"}),
            )
            .await
    );
}

#[tokio::test]
async fn api_key_expiry_must_be_rfc3339() {
    let tester = tester();

    assert_ok!(
        tester
            .validate_resource_config("aws_appsync_api_key", json!({"api_id": "abc", "expires": "2030-01-01T00:00:00Z"}))
            .await
    );
    assert_err!(
        tester
            .validate_resource_config("aws_appsync_api_key", json!({"api_id": "abc", "expires": "next tuesday"}))
            .await
    );
}

#[tokio::test]
async fn resolver_plans() {
    let tester = tester();
    let prior = json!({
        "id": "abc-Query-posts",
        "api_id": "abc",
        "type": "Query",
        "field": "posts",
        "data_source": "posts",
        "kind": "UNIT",
        "arn": "arn:aws:appsync:us-east-1:123456789012:apis/abc/types/Query/resolvers/posts",
    });
    let config = |data_source: &str, field: &str| {
        json!({"api_id": "abc", "type": "Query", "field": field, "data_source": data_source, "kind": "UNIT"})
    };

    let plan = tester
        .plan_update("aws_appsync_resolver", prior.clone(), config("posts", "posts"))
        .await
        .unwrap();
    assert_plan_no_changes(&plan);

    let plan = tester
        .plan_update("aws_appsync_resolver", prior.clone(), config("articles", "posts"))
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_attribute(&plan, "data_source");
    assert_eq!(plan.planned_state["arn"], prior["arn"]);

    let plan = tester
        .plan_update("aws_appsync_resolver", prior.clone(), config("posts", "articles"))
        .await
        .unwrap();
    assert_plan_replaces(&plan);
    assert_eq!(plan.planned_state["arn"], Value::Null);
}

#[tokio::test]
async fn collection_tags_update_in_place() {
    let tester = tester();
    let prior = json!({
        "id": "faces",
        "collection_id": "faces",
        "arn": "arn:aws:rekognition:us-east-1:123456789012:collection/faces",
        "face_model_version": "7.0",
        "tags": {"team": "vision"},
    });

    let plan = tester
        .plan_update(
            "aws_rekognition_collection",
            prior,
            json!({"collection_id": "faces", "tags": {"team": "vision", "env": "prod"}}),
        )
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);
    assert_plan_changes_attribute(&plan, "tags");
    assert_eq!(plan.planned_state["face_model_version"], json!("7.0"));
}

#[tokio::test]
async fn plan_delete_lists_every_attribute() {
    let tester = tester();
    let plan = tester
        .plan_delete("aws_appsync_api_cache", json!({"id": "abc", "api_id": "abc", "type": "SMALL"}))
        .await
        .unwrap();

    assert_eq!(plan.planned_state, Value::Null);
    assert_eq!(plan.changes.len(), 3);
    assert!(!plan.requires_replace);
}

#[tokio::test]
async fn crud_needs_configure() {
    let tester = tester();

    let err = tester
        .create("aws_rekognition_collection", json!({"collection_id": "faces"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));

    let err = tester
        .read_data_source("aws_appsync_graphql_api", json!({"api_id": "abc123"}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn unknown_types_are_rejected() {
    let tester = tester();

    let err = tester
        .validate_resource_config("aws_appsync_nope", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::Provider(ProviderError::UnknownResource(_))));

    let err = tester
        .provider()
        .plan("aws_appsync_nope", None, json!({}), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::UnknownResource(name) if name == "aws_appsync_nope"));
}

#[tokio::test]
async fn unversioned_state_passes_through_upgrade() {
    let tester = tester();
    let state = json!({"id": "faces", "collection_id": "faces"});

    let upgraded = tester
        .upgrade_resource_state("aws_rekognition_collection", 0, state.clone())
        .await
        .unwrap();
    assert_eq!(upgraded, state);
}

#[tokio::test]
async fn create_plan_never_replaces() {
    let tester = tester();
    let plan = tester
        .plan_create("aws_appsync_type", json!({"api_id": "abc", "format": "SDL", "definition": "type Post { id: ID! }"}))
        .await
        .unwrap();

    assert!(!plan.requires_replace);
    assert_plan_changes_attribute(&plan, "definition");
    assert_plan_changes_attribute(&plan, "api_id");
}

#[tokio::test]
async fn read_back_empty_values_plan_clean() {
    let tester = tester();
    let prior = json!({
        "id": "abc",
        "name": "posts",
        "authentication_type": "API_KEY",
        "arn": "arn:aws:appsync:us-east-1:123456789012:apis/abc",
        "uris": {},
        "tags": {},
        "xray_enabled": false,
        "query_depth_limit": 0,
        "resolver_count_limit": 0,
        "additional_authentication_provider": [],
        "log_config": null,
    });

    let plan = assert_ok!(
        tester
            .plan_update("aws_appsync_graphql_api", prior, json!({"name": "posts", "authentication_type": "API_KEY"}))
            .await
    );
    assert_plan_no_changes(&plan);
    assert_eq!(plan.planned_state["xray_enabled"], json!(false));
}
