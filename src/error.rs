//! Error taxonomy shared by configuration, dispatch and rendering.

use std::fmt;

/// Category of an analysis failure.
///
/// Determines how the failure is surfaced: validation errors are shown next
/// to the offending field, network/server errors as a notification, and empty
/// results as an explicit "no data" chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Incomplete or ill-typed configuration, caught before dispatch
    Validation,
    /// Service unreachable or non-success status
    Network,
    /// Service reachable but answered with an explicit error payload
    Server,
    /// Service succeeded but returned zero rows for a required chart.
    /// Raised by batch dispatch for members marked `required`.
    EmptyResult,
    /// Response arrived after its session moved on and was discarded
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Network => "network",
            ErrorKind::Server => "server",
            ErrorKind::EmptyResult => "empty_result",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// Whether the failure should be presented as an error banner.
    ///
    /// Empty results render the "no data" state and stale responses are
    /// dropped silently.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ErrorKind::EmptyResult | ErrorKind::Cancelled)
    }
}

/// A typed failure for a single analysis request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisError {
    pub kind: ErrorKind,
    pub message: String,
    /// Configuration field the error belongs to, when known
    pub field: Option<String>,
}

impl AnalysisError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        AnalysisError {
            kind,
            message: message.into(),
            field: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Server, message)
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EmptyResult, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} error ({}): {}", self.kind.as_str(), field, self.message),
            None => write!(f, "{} error: {}", self.kind.as_str(), self.message),
        }
    }
}

impl std::error::Error for AnalysisError {}

/// Problems found while building or validating a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Field is not part of the kind's schema
    UnknownField { kind: String, field: String },
    /// Value is outside the field's domain
    InvalidValue { field: String, reason: String },
    /// Required fields left empty
    MissingFields(Vec<String>),
    /// Column is not present in the dataset the config is built against
    ColumnNotInDataset { field: String, column: String },
    /// Column exists but has the wrong declared type
    ColumnTypeMismatch {
        field: String,
        column: String,
        expected: String,
    },
    /// Config variant does not match the requested kind
    KindMismatch { expected: String, actual: String },
    /// No dataset has been selected yet
    NoDataset,
}

impl ConfigError {
    /// The field to highlight inline, if the error is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownField { field, .. }
            | ConfigError::InvalidValue { field, .. }
            | ConfigError::ColumnNotInDataset { field, .. }
            | ConfigError::ColumnTypeMismatch { field, .. } => Some(field),
            ConfigError::MissingFields(fields) => fields.first().map(String::as_str),
            ConfigError::KindMismatch { .. } | ConfigError::NoDataset => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownField { kind, field } => {
                write!(f, "Field '{}' is not part of the {} schema", field, kind)
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
            ConfigError::MissingFields(fields) => {
                write!(f, "Missing required fields: {}", fields.join(", "))
            }
            ConfigError::ColumnNotInDataset { field, column } => {
                write!(f, "Column '{}' selected for '{}' is not in the dataset", column, field)
            }
            ConfigError::ColumnTypeMismatch {
                field,
                column,
                expected,
            } => write!(
                f,
                "Column '{}' selected for '{}' must be {}",
                column, field, expected
            ),
            ConfigError::KindMismatch { expected, actual } => write!(
                f,
                "Configuration is for {} but {} was requested",
                actual, expected
            ),
            ConfigError::NoDataset => write!(f, "No dataset selected"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for AnalysisError {
    fn from(err: ConfigError) -> Self {
        let field = err.field().map(str::to_string);
        let mut error = AnalysisError::validation(err.to_string());
        error.field = field;
        error
    }
}

/// Registry lookup failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    UnknownAnalysisKind(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownAnalysisKind(id) => write!(f, "Unknown analysis kind: {}", id),
        }
    }
}

impl std::error::Error for RegistryError {}

impl From<RegistryError> for AnalysisError {
    fn from(err: RegistryError) -> Self {
        AnalysisError::validation(err.to_string())
    }
}
