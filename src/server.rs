//! The gRPC plugin server.
//!
//! [`ProviderService`] is the Rust-typed view of the plugin protocol. [`serve`] binds a
//! local port, prints the handshake line `HEMMER_PROVIDER|<version>|<address>` on
//! stdout, and serves until SIGTERM/SIGINT. On a signal the server stops accepting
//! connections, lets in-flight requests drain for [`ServeOptions::shutdown_timeout`],
//! then calls [`ProviderService::stop`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated::{self, nested_block::NestingMode, provider_server};
use crate::schema::{
    Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema, Schema,
};
use crate::types::{
    ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};

/// A provider, in terms of JSON values and diagnostics rather than protobuf messages.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// Provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Served type names, derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.into_keys().collect();
        let mut data_sources: Vec<String> = schema.data_sources.into_keys().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    /// Check the provider block before `configure`.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(Vec::new())
    }

    /// Apply the provider block.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before the process exits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check a resource block.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Migrate state written by an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Compute the planned state. `prior_state` is `None` on create; a null
    /// `proposed_state` plans a destroy.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource, returning its state.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource. Returns `null` when it no longer exists.
    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError>;

    /// Update a resource in place, returning its new state.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Adopt existing infrastructure by ID.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {resource_type}"
        )))
    }

    /// Check a data source block.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(Vec::new())
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError>;
}

struct GrpcAdapter<P: ProviderService> {
    provider: Arc<P>,
}

/// Empty payloads decode as `null`.
fn decode(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|err| {
        warn!(error = %err, "request carried invalid JSON, treating as null");
        Value::Null
    })
}

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<generated::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| generated::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => generated::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => generated::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_diagnostics(err: &ProviderError) -> Vec<generated::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

/// Log the outcome of a validate/configure call and convert it.
fn report(operation: &str, subject: &str, result: Result<Vec<Diagnostic>, ProviderError>) -> Vec<generated::Diagnostic> {
    match result {
        Ok(diagnostics) if diagnostics.iter().any(Diagnostic::is_error) => {
            warn!(operation, subject, diagnostics = diagnostics.len(), "completed with errors");
            diagnostics_to_proto(diagnostics)
        },
        Ok(diagnostics) => {
            debug!(operation, subject, "completed");
            diagnostics_to_proto(diagnostics)
        },
        Err(err) => {
            error!(operation, subject, error = %err, "failed");
            error_diagnostics(&err)
        },
    }
}

/// Convert a schema for `GetSchema`.
pub fn schema_to_proto(schema: &Schema) -> generated::Schema {
    generated::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &Block) -> generated::Block {
    let mut attributes: Vec<generated::Attribute> = block
        .attributes
        .iter()
        .map(|(name, attr)| generated::Attribute {
            name: name.clone(),
            r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
            required: attr.flags.required,
            optional: attr.flags.optional,
            computed: attr.flags.computed,
            sensitive: attr.flags.sensitive,
            description: attr.description.clone().unwrap_or_default(),
            force_new: attr.force_new,
            default_value: attr.default.as_ref().map(encode).unwrap_or_default(),
        })
        .collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut block_types: Vec<generated::NestedBlock> = block
        .blocks
        .iter()
        .map(|(name, nested)| generated::NestedBlock {
            type_name: name.clone(),
            block: Some(block_to_proto(&nested.block)),
            nesting_mode: match nested.nesting_mode {
                BlockNestingMode::Single => NestingMode::Single,
                BlockNestingMode::List => NestingMode::List,
                BlockNestingMode::Set => NestingMode::Set,
                BlockNestingMode::Map => NestingMode::Map,
            } as i32,
            min_items: nested.min_items as i32,
            max_items: nested.max_items as i32,
        })
        .collect();
    block_types.sort_by(|a, b| a.type_name.cmp(&b.type_name));

    generated::Block {
        attributes,
        block_types,
        description: block.description.clone().unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl<P: ProviderService> provider_server::Provider for GrpcAdapter<P> {
    #[instrument(skip_all, name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: Request<generated::GetMetadataRequest>,
    ) -> Result<Response<generated::GetMetadataResponse>, Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata"
        );
        Ok(Response::new(generated::GetMetadataResponse {
            server_capabilities: Some(generated::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: Request<generated::GetSchemaRequest>,
    ) -> Result<Response<generated::GetSchemaResponse>, Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema"
        );
        Ok(Response::new(generated::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(name, s)| (name.clone(), schema_to_proto(s)))
                .collect(),
            diagnostics: Vec::new(),
        }))
    }

    #[instrument(skip_all, name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: Request<generated::ValidateProviderConfigRequest>,
    ) -> Result<Response<generated::ValidateProviderConfigResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.validate_provider_config(config).await;
        Ok(Response::new(generated::ValidateProviderConfigResponse {
            diagnostics: report("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.configure")]
    async fn configure(
        &self,
        request: Request<generated::ConfigureRequest>,
    ) -> Result<Response<generated::ConfigureResponse>, Status> {
        let config = decode(&request.into_inner().config);
        let result = self.provider.configure(config).await;
        Ok(Response::new(generated::ConfigureResponse {
            diagnostics: report("Configure", "provider", result),
        }))
    }

    #[instrument(skip_all, name = "grpc.stop")]
    async fn stop(
        &self,
        _request: Request<generated::StopRequest>,
    ) -> Result<Response<generated::StopResponse>, Status> {
        info!("Stop requested");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(err) => {
                error!(error = %err, "Stop failed");
                err.to_string()
            },
        };
        Ok(Response::new(generated::StopResponse { error }))
    }

    #[instrument(skip_all, name = "grpc.validate_resource_config", fields(resource_type))]
    async fn validate_resource_config(
        &self,
        request: Request<generated::ValidateResourceConfigRequest>,
    ) -> Result<Response<generated::ValidateResourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, decode(&req.config))
            .await;
        Ok(Response::new(generated::ValidateResourceConfigResponse {
            diagnostics: report("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.upgrade_resource_state", fields(resource_type))]
    async fn upgrade_resource_state(
        &self,
        request: Request<generated::UpgradeResourceStateRequest>,
    ) -> Result<Response<generated::UpgradeResourceStateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let response = match self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, decode(&req.raw_state))
            .await
        {
            Ok(upgraded) => generated::UpgradeResourceStateResponse {
                upgraded_state: encode(&upgraded),
                diagnostics: Vec::new(),
            },
            Err(err) => {
                error!(version = req.version, error = %err, "UpgradeResourceState failed");
                generated::UpgradeResourceStateResponse {
                    upgraded_state: Vec::new(),
                    diagnostics: error_diagnostics(&err),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.plan", fields(resource_type))]
    async fn plan(
        &self,
        request: Request<generated::PlanRequest>,
    ) -> Result<Response<generated::PlanResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let prior = Some(decode(&req.prior_state)).filter(|v| !v.is_null());

        let response = match self
            .provider
            .plan(&req.resource_type, prior, decode(&req.proposed_state), decode(&req.config))
            .await
        {
            Ok(plan) => {
                info!(
                    changes = plan.changes.len(),
                    requires_replace = plan.requires_replace,
                    "Plan completed"
                );
                generated::PlanResponse {
                    planned_state: encode(&plan.planned_state),
                    changes: plan.changes.into_iter().map(Into::into).collect(),
                    requires_replace: plan.requires_replace,
                    diagnostics: Vec::new(),
                }
            },
            Err(err) => {
                error!(error = %err, "Plan failed");
                generated::PlanResponse {
                    diagnostics: error_diagnostics(&err),
                    ..Default::default()
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.create", fields(resource_type))]
    async fn create(
        &self,
        request: Request<generated::CreateRequest>,
    ) -> Result<Response<generated::CreateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let (state, diagnostics) = state_or_diagnostics(
            "Create",
            self.provider.create(&req.resource_type, decode(&req.planned_state)).await,
        );
        Ok(Response::new(generated::CreateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.read", fields(resource_type))]
    async fn read(
        &self,
        request: Request<generated::ReadRequest>,
    ) -> Result<Response<generated::ReadResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let (state, diagnostics) = state_or_diagnostics(
            "Read",
            self.provider.read(&req.resource_type, decode(&req.current_state)).await,
        );
        Ok(Response::new(generated::ReadResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.update", fields(resource_type))]
    async fn update(
        &self,
        request: Request<generated::UpdateRequest>,
    ) -> Result<Response<generated::UpdateResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let (state, diagnostics) = state_or_diagnostics(
            "Update",
            self.provider
                .update(
                    &req.resource_type,
                    decode(&req.prior_state),
                    decode(&req.planned_state),
                )
                .await,
        );
        Ok(Response::new(generated::UpdateResponse { state, diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.delete", fields(resource_type))]
    async fn delete(
        &self,
        request: Request<generated::DeleteRequest>,
    ) -> Result<Response<generated::DeleteResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let diagnostics = match self
            .provider
            .delete(&req.resource_type, decode(&req.current_state))
            .await
        {
            Ok(()) => {
                info!("Delete completed");
                Vec::new()
            },
            Err(err) => {
                error!(error = %err, "Delete failed");
                error_diagnostics(&err)
            },
        };
        Ok(Response::new(generated::DeleteResponse { diagnostics }))
    }

    #[instrument(skip_all, name = "grpc.import_resource_state", fields(resource_type, id))]
    async fn import_resource_state(
        &self,
        request: Request<generated::ImportResourceStateRequest>,
    ) -> Result<Response<generated::ImportResourceStateResponse>, Status> {
        let req = request.into_inner();
        let span = tracing::Span::current();
        span.record("resource_type", req.resource_type.as_str());
        span.record("id", req.id.as_str());

        let response = match self.provider.import_resource(&req.resource_type, &req.id).await {
            Ok(imported) => {
                info!(count = imported.len(), "ImportResourceState completed");
                generated::ImportResourceStateResponse {
                    imported: imported
                        .into_iter()
                        .map(|r| generated::ImportedResource {
                            state: encode(&r.state),
                            resource_type: r.resource_type,
                        })
                        .collect(),
                    diagnostics: Vec::new(),
                }
            },
            Err(err) => {
                error!(error = %err, "ImportResourceState failed");
                generated::ImportResourceStateResponse {
                    imported: Vec::new(),
                    diagnostics: error_diagnostics(&err),
                }
            },
        };
        Ok(Response::new(response))
    }

    #[instrument(skip_all, name = "grpc.validate_data_source_config", fields(data_source_type))]
    async fn validate_data_source_config(
        &self,
        request: Request<generated::ValidateDataSourceConfigRequest>,
    ) -> Result<Response<generated::ValidateDataSourceConfigResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, decode(&req.config))
            .await;
        Ok(Response::new(generated::ValidateDataSourceConfigResponse {
            diagnostics: report("ValidateDataSourceConfig", &req.data_source_type, result),
        }))
    }

    #[instrument(skip_all, name = "grpc.read_data_source", fields(data_source_type))]
    async fn read_data_source(
        &self,
        request: Request<generated::ReadDataSourceRequest>,
    ) -> Result<Response<generated::ReadDataSourceResponse>, Status> {
        let req = request.into_inner();
        tracing::Span::current().record("data_source_type", req.data_source_type.as_str());
        let (state, diagnostics) = state_or_diagnostics(
            "ReadDataSource",
            self.provider
                .read_data_source(&req.data_source_type, decode(&req.config))
                .await,
        );
        Ok(Response::new(generated::ReadDataSourceResponse { state, diagnostics }))
    }
}

fn state_or_diagnostics(
    operation: &str,
    result: Result<Value, ProviderError>,
) -> (Vec<u8>, Vec<generated::Diagnostic>) {
    match result {
        Ok(state) => {
            debug!(operation, "completed");
            (encode(&state), Vec::new())
        },
        Err(err) => {
            error!(operation, error = %err, "failed");
            (Vec::new(), error_diagnostics(&err))
        },
    }
}

/// Options for [`serve_with_options`].
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal. Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                    _ = sigint.recv() => info!("received SIGINT, shutting down"),
                }
            },
            (Err(err), _) | (_, Err(err)) => {
                error!(error = %err, "cannot install signal handlers");
                std::future::pending::<()>().await;
            },
        }
    }

    #[cfg(not(unix))]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received CTRL+C, shutting down"),
            Err(err) => {
                error!(error = %err, "cannot install CTRL+C handler");
                std::future::pending::<()>().await;
            },
        }
    }
}

/// Serve `provider` on an ephemeral localhost port.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options).await
}

/// Serve `provider` on a fixed address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    serve_on_with_options(provider, addr, ServeOptions::default()).await
}

/// [`serve_on`] with custom options.
pub async fn serve_on_with_options<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, options).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = listener.local_addr()?;
    println!("{HANDSHAKE_PREFIX}|{PROTOCOL_VERSION}|{addr}");
    info!(address = %addr, "provider server listening");

    let provider = Arc::new(provider);
    let shutdown = Arc::new(Notify::new());
    let trigger = Arc::clone(&shutdown);

    let server = Server::builder()
        .add_service(provider_server::ProviderServer::new(GrpcAdapter {
            provider: Arc::clone(&provider),
        }))
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move { trigger.notified().await },
        );
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = wait_for_shutdown_signal() => {
            shutdown.notify_one();
            match tokio::time::timeout(options.shutdown_timeout, &mut server).await {
                Ok(result) => result?,
                Err(_) => warn!(timeout = ?options.shutdown_timeout, "in-flight requests did not finish, forcing shutdown"),
            }
        },
    }

    if let Err(err) = provider.stop().await {
        warn!(error = %err, "provider stop failed");
    }
    info!("provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, NestedBlock};
    use serde_json::json;

    #[test]
    fn test_decode_tolerates_empty_and_invalid() {
        assert_eq!(decode(b""), Value::Null);
        assert_eq!(decode(b"{not json"), Value::Null);
        assert_eq!(decode(br#"{"id":"abc"}"#), json!({"id": "abc"}));
    }

    #[test]
    fn test_diagnostics_to_proto() {
        let proto = diagnostics_to_proto(vec![
            Diagnostic::error("bad").with_attribute("name"),
            Diagnostic::warning("meh"),
        ]);

        assert_eq!(proto[0].severity, generated::diagnostic::Severity::Error as i32);
        assert_eq!(proto[0].attribute, "name");
        assert_eq!(proto[1].severity, generated::diagnostic::Severity::Warning as i32);
        assert!(proto[1].detail.is_empty());
    }

    #[test]
    fn test_report_converts_errors() {
        let proto = report(
            "Configure",
            "provider",
            Err(ProviderError::Configuration("no region".into())),
        );
        assert_eq!(proto.len(), 1);
        assert!(proto[0].summary.contains("no region"));
    }

    #[test]
    fn test_schema_to_proto_is_sorted() {
        let schema = Schema::resource()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("arn", Attribute::computed_string())
            .with_block(
                "runtime",
                NestedBlock::single(Block::new().with_attribute("name", Attribute::required_string())),
            );

        let proto = schema_to_proto(&schema);
        let block = proto.block.unwrap();
        let names: Vec<&str> = block.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["arn", "id", "name"]);
        assert!(block.attributes[2].force_new);
        assert_eq!(block.block_types[0].nesting_mode, NestingMode::Single as i32);
        assert_eq!(block.block_types[0].max_items, 1);
    }

    #[test]
    fn test_state_or_diagnostics() {
        let (state, diagnostics) = state_or_diagnostics("Read", Ok(Value::Null));
        assert_eq!(state, b"null");
        assert!(diagnostics.is_empty());

        let (state, diagnostics) =
            state_or_diagnostics("Read", Err(ProviderError::NotFound("x".into())));
        assert!(state.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_serve_options() {
        assert_eq!(ServeOptions::new().shutdown_timeout, Duration::from_secs(30));
        let options = ServeOptions::new().with_shutdown_timeout(Duration::from_secs(5));
        assert_eq!(options.shutdown_timeout, Duration::from_secs(5));
    }
}
