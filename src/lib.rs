//! Hemmer provider for AWS AppSync and AWS Rekognition.
//!
//! The provider runs as a plugin subprocess. On start it prints a handshake line to
//! stdout and serves the Hemmer provider protocol over gRPC:
//!
//! ```text
//! HEMMER_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Every resource type is a [`resource::Resource`]: a [`schema::Schema`] plus CRUD
//! handlers that turn the JSON attribute map into AWS SDK requests and read the
//! response back into state. [`AwsProvider`] registers them and implements
//! [`ProviderService`], which [`serve`] exposes over gRPC.
//!
//! # Resources
//!
//! | Type | ID |
//! |---|---|
//! | `aws_appsync_graphql_api` | API ID |
//! | `aws_appsync_api` | API ID |
//! | `aws_appsync_channel_namespace` | `apiID,name` |
//! | `aws_appsync_datasource` | `apiID-name` |
//! | `aws_appsync_domain_name` | domain name |
//! | `aws_appsync_domain_name_api_association` | domain name |
//! | `aws_appsync_function` | `apiID-functionID` |
//! | `aws_appsync_resolver` | `apiID-typeName-fieldName` |
//! | `aws_appsync_type` | `apiID:format:typeName` |
//! | `aws_appsync_api_key` | `apiID:keyID` |
//! | `aws_appsync_api_cache` | API ID |
//! | `aws_appsync_source_api_association` | `mergedApiID,associationID` |
//! | `aws_rekognition_collection` | collection ID |
//! | `aws_rekognition_project` | project name |
//! | `aws_rekognition_stream_processor` | processor name |
//!
//! The `aws_appsync_graphql_api` data source looks up an existing GraphQL API.
//!
//! # Schema mutations
//!
//! AppSync rejects concurrent changes to one API's schema. Resolvers, functions, types
//! and schema uploads therefore take a process-wide lock named after the API
//! ([`appsync::schema_mutex_key`]) and retry on `ConcurrentModificationException`
//! ([`retry::retry_on_concurrent_modification`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod appsync;
pub mod config;
pub mod error;
pub mod id;
pub mod logging;
pub mod mutex;
pub mod provider;
pub mod rekognition;
pub mod resource;
pub mod retry;
pub mod schema;
pub mod server;
pub mod state;
pub mod tags;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated;

pub use config::{AwsClients, ProviderConfig};
pub use error::ProviderError;
pub use logging::{default_level, init_logging, init_logging_with_default, try_init_logging};
pub use provider::AwsProvider;
pub use schema::ProviderSchema;
pub use server::{
    serve, serve_on, serve_on_with_options, serve_with_options, ProviderService, ServeOptions,
};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::validate;
