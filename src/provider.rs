//! `AwsProvider`: the resource registry behind the plugin protocol.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::appsync::{
    api::EventApi, api_cache::ApiCache, api_key::ApiKey, channel_namespace::ChannelNamespace,
    datasource::ApiDataSource, domain_name::DomainName,
    domain_name_api_association::DomainNameApiAssociation, function::Function,
    graphql_api::{GraphqlApi, GraphqlApiLookup}, graphql_type::GraphqlType, resolver::Resolver,
    source_api_association::SourceApiAssociation,
};
use crate::config::{AwsClients, ProviderConfig};
use crate::error::ProviderError;
use crate::rekognition::{collection::Collection, project::Project, stream_processor::StreamProcessor};
use crate::resource::{self, DataSource, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::state::State;
use crate::types::{ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
use crate::validation::validate;

/// Serves every AppSync and Rekognition resource.
pub struct AwsProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    clients: RwLock<Option<Arc<AwsClients>>>,
}

impl Default for AwsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AwsProvider {
    /// A provider with every resource and data source registered.
    pub fn new() -> Self {
        Self::empty()
            .with_resource(GraphqlApi)
            .with_resource(EventApi)
            .with_resource(ChannelNamespace)
            .with_resource(ApiDataSource)
            .with_resource(DomainName)
            .with_resource(DomainNameApiAssociation)
            .with_resource(Function)
            .with_resource(Resolver)
            .with_resource(GraphqlType)
            .with_resource(ApiKey)
            .with_resource(ApiCache)
            .with_resource(SourceApiAssociation)
            .with_resource(Collection)
            .with_resource(Project)
            .with_resource(StreamProcessor)
            .with_data_source(GraphqlApiLookup)
    }

    /// A provider serving nothing.
    pub fn empty() -> Self {
        Self {
            resources: BTreeMap::new(),
            data_sources: BTreeMap::new(),
            clients: RwLock::new(None),
        }
    }

    /// Register a resource.
    pub fn with_resource(mut self, resource: impl Resource + 'static) -> Self {
        self.resources.insert(resource.type_name(), Arc::new(resource));
        self
    }

    /// Register a data source.
    pub fn with_data_source(mut self, data_source: impl DataSource + 'static) -> Self {
        self.data_sources
            .insert(data_source.type_name(), Arc::new(data_source));
        self
    }

    /// Use `clients` instead of resolving them from a provider block.
    pub async fn configure_with(&self, clients: AwsClients) {
        *self.clients.write().await = Some(Arc::new(clients));
    }

    async fn clients(&self) -> Result<Arc<AwsClients>, ProviderError> {
        self.clients.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration(
                "provider is not configured; Configure must run first".to_string(),
            )
        })
    }

    fn resource(&self, resource_type: &str) -> Result<Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(resource_type)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    fn data_source(&self, data_source_type: &str) -> Result<Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(data_source_type)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownResource(data_source_type.to_string()))
    }
}

#[async_trait::async_trait]
impl ProviderService for AwsProvider {
    fn schema(&self) -> ProviderSchema {
        let mut schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        for (name, resource) in &self.resources {
            schema = schema.with_resource(*name, resource.schema());
        }
        for (name, data_source) in &self.data_sources {
            schema = schema.with_data_source(*name, data_source.schema());
        }
        schema
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.resources.keys().map(|k| k.to_string()).collect(),
            data_sources: self.data_sources.keys().map(|k| k.to_string()).collect(),
            capabilities: ServerCapabilities { plan_destroy: true },
        }
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&ProviderConfig::schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&ProviderConfig::schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let clients = ProviderConfig::from_value(config)?.load().await?;
        self.configure_with(clients).await;
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        info!("stopping AWS provider");
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validate(&resource.schema(), &config);
        if !diagnostics.iter().any(Diagnostic::is_error) {
            diagnostics.extend(resource.validate(&State::from_value(config)?));
        }
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        resource::plan_with(
            &resource.schema(),
            &prior_state.unwrap_or(Value::Null),
            &proposed_state,
            |prior, planned| resource.requires_replace(prior, planned),
        )
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let state = resource
            .create(&clients, State::from_value(planned_state)?)
            .await?;
        info!(resource_type, id = state.str("id").unwrap_or_default(), "created");
        Ok(state.into_value())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        match resource
            .read(&clients, State::from_value(current_state)?)
            .await?
        {
            Some(state) => Ok(state.into_value()),
            None => {
                info!(resource_type, "remote object not found, removing from state");
                Ok(Value::Null)
            },
        }
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let state = resource
            .update(
                &clients,
                State::from_value(prior_state)?,
                State::from_value(planned_state)?,
            )
            .await?;
        Ok(state.into_value())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        resource
            .delete(&clients, State::from_value(current_state)?)
            .await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        debug!(resource_type, id, "importing");
        let state = resource.import(&clients, id).await?;
        Ok(vec![ImportedResource::new(resource_type, state.into_value())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validate(&data_source.schema(), &config))
    }

    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let clients = self.clients().await?;
        let state = data_source
            .read(&clients, State::from_value(config)?)
            .await?;
        Ok(state.into_value())
    }
}
