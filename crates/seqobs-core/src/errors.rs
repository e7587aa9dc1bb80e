use thiserror::Error;

/// Result type alias using SeqObsError
pub type Result<T> = std::result::Result<T, SeqObsError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that can be used for programmatic
/// error handling, testing and log assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Input
    InvalidInput,
    NotFound,
    AlreadyExists,
    ImmutableField,

    // Observation
    ProviderFailed,
    InvariantViolation,

    // Integration
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::ImmutableField => "ERR_IMMUTABLE_FIELD",
            ExErrorKind::ProviderFailed => "ERR_PROVIDER_FAILED",
            ExErrorKind::InvariantViolation => "ERR_INVARIANT_VIOLATION",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus optional context
/// for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    key: Option<String>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            key: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add item key context
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the key context, if any
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for sequence observation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeqObsError {
    // ===== Observation Errors =====
    /// The sequence provider failed while recomputing
    #[error("Sequence provider failed: {message}")]
    ProviderFailed { message: String },

    /// An event could not be applied to the rendered state
    #[error("Rendered state out of sync: {reason}")]
    InconsistentState { reason: String },

    // ===== Live Source Errors =====
    /// A document handed to a live source is not a structured record
    #[error("Invalid item: {reason}")]
    InvalidItem { reason: String },

    /// A document with this key already exists in the source
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    /// No document with this key exists in the source
    #[error("Item not found: {key}")]
    ItemNotFound { key: String },

    /// An update attempted to change a document's `_id`
    #[error("Cannot change identity of item {key}")]
    ImmutableIdentity { key: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SeqObsError {
    /// Shorthand for a provider failure
    pub fn provider(message: impl Into<String>) -> Self {
        SeqObsError::ProviderFailed {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SeqObsError {
    fn from(err: serde_json::Error) -> Self {
        SeqObsError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Conversion from SeqObsError to ExError
impl From<SeqObsError> for ExError {
    fn from(err: SeqObsError) -> Self {
        match err {
            SeqObsError::ProviderFailed { message } => ExError::new(ExErrorKind::ProviderFailed)
                .with_op("recompute")
                .with_message(message),

            SeqObsError::InconsistentState { reason } => {
                ExError::new(ExErrorKind::InvariantViolation).with_message(reason)
            }

            SeqObsError::InvalidItem { reason } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(reason)
            }

            SeqObsError::DuplicateKey { key } => ExError::new(ExErrorKind::AlreadyExists)
                .with_key(key)
                .with_message("Item with this key already exists"),

            SeqObsError::ItemNotFound { key } => ExError::new(ExErrorKind::NotFound)
                .with_key(key)
                .with_message("Item not found"),

            SeqObsError::ImmutableIdentity { key } => ExError::new(ExErrorKind::ImmutableField)
                .with_key(key)
                .with_message("`_id` cannot be changed"),

            SeqObsError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            SeqObsError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}
