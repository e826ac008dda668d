use std::{error::Error as StdError, fmt};

use http::StatusCode;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified category of a service-reported failure.
///
/// Derived from the `<Code>` of an XML fault document when one is present, otherwise from
/// the HTTP status alone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The bucket does not exist.
    NoSuchBucket,
    /// The object key does not exist.
    NoSuchKey,
    /// Credentials are valid but not allowed to perform the operation.
    AccessDenied,
    /// The bucket name is taken by another account.
    BucketAlreadyExists,
    /// The bucket already exists and is owned by the caller.
    BucketAlreadyOwnedByYou,
    /// The bucket still contains objects.
    BucketNotEmpty,
    /// A request parameter was rejected.
    InvalidArgument,
    /// The bucket name is not valid.
    InvalidBucketName,
    /// The computed signature did not match the service's.
    SignatureDoesNotMatch,
    /// The access key id is unknown to the service.
    InvalidAccessKeyId,
    /// The service asked the caller to reduce its request rate.
    SlowDown,
    /// A 404 answer to a HEAD request, which carries no fault document.
    NotFound,
    /// Any other 3xx/4xx response without a recognized fault code.
    ClientError,
    /// A 5xx response, or a fault code reporting an internal service failure.
    ServerFault,
    /// A fault document with a code this table does not recognize.
    ServiceFault,
}

impl ErrorKind {
    /// Maps a fault document code to a kind.
    pub fn from_code(code: &str) -> Self {
        match code {
            "NoSuchBucket" => Self::NoSuchBucket,
            "NoSuchKey" => Self::NoSuchKey,
            "AccessDenied" => Self::AccessDenied,
            "BucketAlreadyExists" => Self::BucketAlreadyExists,
            "BucketAlreadyOwnedByYou" => Self::BucketAlreadyOwnedByYou,
            "BucketNotEmpty" => Self::BucketNotEmpty,
            "InvalidArgument" => Self::InvalidArgument,
            "InvalidBucketName" => Self::InvalidBucketName,
            "SignatureDoesNotMatch" => Self::SignatureDoesNotMatch,
            "InvalidAccessKeyId" => Self::InvalidAccessKeyId,
            "SlowDown" => Self::SlowDown,
            "InternalError" | "ServiceUnavailable" => Self::ServerFault,
            _ => Self::ServiceFault,
        }
    }

    /// Maps a bare HTTP status to a kind when no fault document is available.
    ///
    /// HEAD responses never carry a fault document, so their 404 is reported as
    /// [`ErrorKind::NotFound`] by the caller rather than here.
    pub fn from_status(status: StatusCode) -> Self {
        if status.is_server_error() {
            Self::ServerFault
        } else {
            Self::ClientError
        }
    }

    /// Returns true if a caller-level retry of the whole operation may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::SlowDown | Self::ServerFault)
    }

    /// Returns the symbolic name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSuchBucket => "NoSuchBucket",
            Self::NoSuchKey => "NoSuchKey",
            Self::AccessDenied => "AccessDenied",
            Self::BucketAlreadyExists => "BucketAlreadyExists",
            Self::BucketAlreadyOwnedByYou => "BucketAlreadyOwnedByYou",
            Self::BucketNotEmpty => "BucketNotEmpty",
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidBucketName => "InvalidBucketName",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::InvalidAccessKeyId => "InvalidAccessKeyId",
            Self::SlowDown => "SlowDown",
            Self::NotFound => "NotFound",
            Self::ClientError => "ClientError",
            Self::ServerFault => "ServerFault",
            Self::ServiceFault => "ServiceFault",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for request building, signing, transport, and service responses.
#[non_exhaustive]
pub enum Error {
    /// Invalid configuration or parameters.
    InvalidConfig { message: String },

    /// Request signing failed, usually because credentials are missing.
    Signing { message: String },

    /// Network-level failure after the retry budget was spent.
    Transport {
        message: String,
        attempts: u32,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// The response did not match the schema expected for the operation.
    MalformedResponse {
        message: String,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    },

    /// The service returned a classified fault.
    Service {
        kind: ErrorKind,
        status: StatusCode,
        code: Option<String>,
        message: Option<String>,
        request_id: Option<String>,
        host_id: Option<String>,
        body_snippet: Option<String>,
    },

    /// The caller cancelled the operation.
    Cancelled,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => f
                .debug_struct("InvalidConfig")
                .field("message", message)
                .finish(),
            Self::Signing { message } => {
                f.debug_struct("Signing").field("message", message).finish()
            }
            Self::Transport {
                message,
                attempts,
                source,
            } => f
                .debug_struct("Transport")
                .field("message", message)
                .field("attempts", attempts)
                .field("source", source)
                .finish(),
            Self::MalformedResponse { message, source } => f
                .debug_struct("MalformedResponse")
                .field("message", message)
                .field("source", source)
                .finish(),
            Self::Service {
                kind,
                status,
                code,
                message,
                request_id,
                host_id,
                body_snippet,
            } => f
                .debug_struct("Service")
                .field("kind", kind)
                .field("status", status)
                .field("code", code)
                .field("message", message)
                .field("request_id", request_id)
                .field("host_id", host_id)
                .field("body_snippet", body_snippet)
                .finish(),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

impl Error {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Creates a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a transport error for a single attempt with optional source.
    pub fn transport(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            attempts: 1,
            source,
        }
    }

    /// Creates a malformed response error with optional source.
    pub fn malformed(
        message: impl Into<String>,
        source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self::MalformedResponse {
            message: message.into(),
            source,
        }
    }

    /// Returns the classified service error kind, if this is a service error.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Service { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns an HTTP status when available.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the request id if reported by the service.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Service { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    /// Returns how many transport attempts were made before giving up.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Transport { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Returns true if resubmitting the whole operation may succeed.
    ///
    /// The engine never retries a classified service error itself; this is the hook for
    /// retry policies layered above it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Service { kind, status, .. } => kind.is_retryable() || status.is_server_error(),
            Self::Transport { .. } => true,
            Self::InvalidConfig { .. }
            | Self::Signing { .. }
            | Self::MalformedResponse { .. }
            | Self::Cancelled => false,
        }
    }

    /// Returns true if the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

fn format_optional_field(label: &str, value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => format!(" {label}={v}"),
        _ => String::new(),
    }
}

fn format_optional_message(value: &Option<String>) -> String {
    match value.as_deref() {
        Some(v) if !v.is_empty() => format!(" ({v})"),
        _ => String::new(),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { message } => write!(f, "invalid config: {message}"),
            Self::Signing { message } => write!(f, "signing error: {message}"),
            Self::Transport {
                message, attempts, ..
            } => {
                if *attempts > 1 {
                    write!(f, "transport error: {message} (after {attempts} attempts)")
                } else {
                    write!(f, "transport error: {message}")
                }
            }
            Self::MalformedResponse { message, .. } => write!(f, "malformed response: {message}"),
            Self::Service {
                kind,
                status,
                code,
                message,
                request_id,
                ..
            } => {
                let code = format_optional_field("code", code);
                let request_id = format_optional_field("request_id", request_id);
                let msg = format_optional_message(message);
                write!(f, "service error: {kind} {status}{code}{request_id}{msg}")
            }
            Self::Cancelled => f.write_str("operation cancelled"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Transport { source, .. } | Self::MalformedResponse { source, .. } => {
                source.as_deref().map(|e| e as &(dyn StdError + 'static))
            }
            Self::InvalidConfig { .. }
            | Self::Signing { .. }
            | Self::Service { .. }
            | Self::Cancelled => None,
        }
    }
}
