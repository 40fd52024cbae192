//! Error types for the provider and the mapping from AWS SDK failures.

use std::error::Error as StdError;
use std::fmt::Debug;

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use aws_smithy_types::error::operation::BuildError;
use thiserror::Error;

/// Failure of a provider operation. Each variant maps onto one gRPC status code.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object is gone, or an import ID matched nothing.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A value in state or configuration is unusable.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An AWS SDK call failed for a reason with no more specific variant.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// The provider block is invalid, or `Configure` has not run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No resource or data source is registered under the name.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State JSON could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The gRPC server could not bind or serve.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// AWS reports the object exists or is in use.
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// The credentials may not perform the call.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Throttled, or a service quota is used up.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// AWS failed internally or could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A status wait ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The remote object reached a failure status, e.g. `MERGE_FAILED`.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Another mutation of the same remote object was in flight.
    #[error("Concurrent modification: {0}")]
    ConcurrentModification(String),

    /// The protocol call is not supported.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// AWS rejected the request parameters, or an ID is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The message without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::ConcurrentModification(msg)
            | Self::Unimplemented(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Transport(_err) => "transport error (see Debug output)",
        }
    }

    /// An AWS response that lacked the object it should have carried.
    pub fn empty_response(operation: &str) -> Self {
        Self::Sdk(format!("{operation}: empty response"))
    }

    /// Whether the remote object is gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the service rejected the call because of a concurrent mutation.
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }

    /// Classify an AWS service error code.
    ///
    /// Codes are shared between AppSync and Rekognition, so one table covers both.
    pub fn from_service_code(code: &str, message: String) -> Self {
        match code {
            "NotFoundException" | "ResourceNotFoundException" => Self::NotFound(message),
            "ConcurrentModificationException" => Self::ConcurrentModification(message),
            "AccessDeniedException" | "UnauthorizedException" => Self::PermissionDenied(message),
            "LimitExceededException"
            | "ServiceQuotaExceededException"
            | "ThrottlingException"
            | "ProvisionedThroughputExceededException" => Self::ResourceExhausted(message),
            "BadRequestException"
            | "InvalidParameterException"
            | "ValidationException"
            | "GraphQLSchemaException"
            | "ApiKeyValidityOutOfBoundsException"
            | "ApiKeyLimitExceededException" => Self::InvalidRequest(message),
            "ResourceAlreadyExistsException" | "ResourceInUseException" => {
                Self::AlreadyExists(message)
            },
            "InternalFailureException" | "InternalServerError" => Self::Unavailable(message),
            _ => Self::Sdk(message),
        }
    }
}

/// Convert a failed AWS SDK call into a [`ProviderError`].
///
/// `operation` names what was attempted, e.g. `"reading AppSync Resolver (abc-Query-me)"`.
pub fn sdk_error<E, R>(operation: &str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(|service| service.code())
        .map(str::to_owned);
    let transient = matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
    );
    let message = format!("{operation}: {}", DisplayErrorContext(&err));

    match code {
        Some(code) => ProviderError::from_service_code(&code, message),
        None if transient => ProviderError::Unavailable(message),
        None => ProviderError::Sdk(message),
    }
}

/// Turns "not found" into `None`, leaving every other outcome untouched.
///
/// Reads use this to report a vanished object as removed state; deletes use it
/// to treat an already-deleted object as success.
pub trait NotFoundExt<T> {
    /// `Ok(None)` if the error was a not-found error.
    fn optional(self) -> Result<Option<T>, ProviderError>;
}

impl<T> NotFoundExt<T> for Result<T, ProviderError> {
    fn optional(self) -> Result<Option<T>, ProviderError> {
        match self {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Metadata AWS attaches to a modeled service error, for building SDK errors in tests.
#[cfg(test)]
pub(crate) fn service_error_meta(code: &str) -> aws_smithy_types::error::metadata::ErrorMetadata {
    aws_smithy_types::error::metadata::ErrorMetadata::builder()
        .code(code)
        .message(&format!("{code} from AWS"))
        .build()
}

impl From<BuildError> for ProviderError {
    fn from(err: BuildError) -> Self {
        Self::InvalidRequest(format!("incomplete request: {err}"))
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Sdk(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::Transport(err) => {
                tonic::Status::unavailable(format!("Transport error: {}", err))
            },
            ProviderError::AlreadyExists(msg) => tonic::Status::already_exists(msg),
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::ConcurrentModification(msg) => tonic::Status::aborted(msg),
            ProviderError::Unimplemented(msg) => tonic::Status::unimplemented(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
