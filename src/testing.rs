//! Drive a [`ProviderService`] in tests without a gRPC server.
//!
//! ```ignore
//! use hemmer_provider_aws::testing::{assert_plan_replaces, ProviderTester};
//! use hemmer_provider_aws::AwsProvider;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn changing_the_api_replaces_a_resolver() {
//!     let tester = ProviderTester::new(AwsProvider::new());
//!     let prior = json!({"id": "a-Query-me", "api_id": "a", "type": "Query", "field": "me"});
//!     let plan = tester
//!         .plan_update("aws_appsync_resolver", prior, json!({"api_id": "b", "type": "Query", "field": "me"}))
//!         .await
//!         .unwrap();
//!     assert_plan_replaces(&plan);
//! }
//! ```

use std::fmt;

use serde_json::Value;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Wraps a provider and turns diagnostics into [`TestError`]s.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// A tester for `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Served resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Served data source type names.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    /// Validate the provider block; error diagnostics become `Err`.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider; error diagnostics become `Err`.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.configure(config).await?)
    }

    /// Validate a resource block; error diagnostics become `Err`.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        check_diagnostics(self.provider.validate_resource_config(resource_type, config).await?)
    }

    /// Validate a data source block; error diagnostics become `Err`.
    pub async fn validate_data_source_config(&self, data_source_type: &str, config: Value) -> Result<(), TestError> {
        check_diagnostics(
            self.provider
                .validate_data_source_config(data_source_type, config)
                .await?,
        )
    }

    /// Plan a create.
    pub async fn plan_create(&self, resource_type: &str, proposed: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed.clone(), proposed)
            .await
    }

    /// Plan an update from `prior`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), proposed.clone(), proposed)
            .await
    }

    /// Plan a destroy.
    pub async fn plan_delete(&self, resource_type: &str, prior: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), Value::Null, Value::Null)
            .await
    }

    /// Create a resource.
    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// Read a resource.
    pub async fn read(&self, resource_type: &str, current: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current).await
    }

    /// Update a resource.
    pub async fn update(&self, resource_type: &str, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, current: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current).await
    }

    /// Import a resource by ID.
    pub async fn import_resource(&self, resource_type: &str, id: &str) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Upgrade state written by schema `version`.
    pub async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .upgrade_resource_state(resource_type, version, state)
            .await
    }

    /// Read a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }
}

/// A call that failed either outright or with error diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// Error diagnostics returned by the provider.
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    Provider(ProviderError),
}

impl TestError {
    /// The diagnostics, if that is how the call failed.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Diagnostics(diagnostics) => diagnostics,
            Self::Provider(_) => &[],
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnostics(diagnostics) => {
                writeln!(f, "{} error diagnostic(s):", diagnostics.len())?;
                for d in diagnostics {
                    write!(f, "  {}", d.summary)?;
                    if let Some(attribute) = &d.attribute {
                        write!(f, " (at {attribute})")?;
                    }
                    if let Some(detail) = &d.detail {
                        write!(f, ": {detail}")?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            },
            Self::Provider(err) => write!(f, "provider error: {err}"),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<Diagnostic> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Assert the plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected replacement, got an in-place update of {:?}",
        changed_paths(plan)
    );
}

/// Assert the plan changes something without replacing the resource.
///
/// # Panics
///
/// Panics if the plan replaces the resource or changes nothing.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.requires_replace, "expected an in-place update, got replacement");
    assert!(!plan.changes.is_empty(), "expected an in-place update, got no changes");
}

/// Assert the plan changes nothing.
///
/// # Panics
///
/// Panics if any attribute changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(plan.changes.is_empty(), "expected no changes, got {:?}", changed_paths(plan));
}

/// Assert the plan changes `path`.
///
/// # Panics
///
/// Panics if `path` is not among the changes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected '{path}' to change, changed: {:?}",
        changed_paths(plan)
    );
}

/// Assert some error diagnostic's summary contains `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    assert!(
        diagnostics
            .iter()
            .any(|d| d.is_error() && d.summary.contains(substring)),
        "expected an error containing '{substring}', got {:?}",
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AwsClients;
    use crate::provider::AwsProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_validate_resource_config() {
        let tester = ProviderTester::new(AwsProvider::new());

        tester
            .validate_resource_config("aws_appsync_type", json!({"api_id": "a", "format": "SDL", "definition": "type A { id: ID }"}))
            .await
            .unwrap();

        let err = tester
            .validate_resource_config("aws_appsync_type", json!({"api_id": "a", "format": "SDL"}))
            .await
            .unwrap_err();
        assert_error_contains(err.diagnostics(), "definition");
    }

    #[tokio::test]
    async fn test_plan_helpers() {
        let tester = ProviderTester::new(AwsProvider::new());
        let prior = json!({"id": "abc:SDL:Post", "api_id": "abc", "format": "SDL", "definition": "type Post { id: ID }", "name": "Post"});

        let same = tester
            .plan_update("aws_appsync_type", prior.clone(), json!({"api_id": "abc", "format": "SDL", "definition": "type Post { id: ID }"}))
            .await
            .unwrap();
        assert_plan_no_changes(&same);

        let edited = tester
            .plan_update("aws_appsync_type", prior.clone(), json!({"api_id": "abc", "format": "SDL", "definition": "type Post { id: ID! }"}))
            .await
            .unwrap();
        assert_plan_updates_in_place(&edited);
        assert_plan_changes_attribute(&edited, "definition");

        let moved = tester
            .plan_update("aws_appsync_type", prior.clone(), json!({"api_id": "xyz", "format": "SDL", "definition": "type Post { id: ID }"}))
            .await
            .unwrap();
        assert_plan_replaces(&moved);

        let destroy = tester.plan_delete("aws_appsync_type", prior).await.unwrap();
        assert_eq!(destroy.planned_state, Value::Null);
    }

    #[tokio::test]
    async fn test_configured_provider_rejects_malformed_import_id() {
        let provider = AwsProvider::new();
        provider.configure_with(AwsClients::offline("us-east-1")).await;
        let tester = ProviderTester::new(provider);

        let err = tester.import_resource("aws_appsync_type", "abc:SDL").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn test_test_error_display() {
        let err = TestError::Diagnostics(vec![Diagnostic::error("Missing required attribute 'name'")
            .with_attribute("name")
            .with_detail("set it")]);
        let text = err.to_string();

        assert!(text.contains("1 error diagnostic(s)"));
        assert!(text.contains("(at name): set it"));
        assert!(TestError::Provider(ProviderError::NotFound("x".into())).diagnostics().is_empty());
    }
}
