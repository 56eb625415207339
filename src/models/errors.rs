use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Product not found")]
    ProductNotFound { id: String },

    #[error("Cart item not found")]
    CartItemNotFound { id: String },

    #[error("Empty cart")]
    EmptyCart { email: String },

    #[error("User not found")]
    UserNotFound { id: String },

    #[error("User already exists")]
    UserAlreadyExists { email: String },

    /// Raised by the admin check when no user is registered for the email.
    /// Surfaces as a server error, not a 404.
    #[error("No user registered for email: {email}")]
    UnregisteredEmail { email: String },

    #[error("{entity} validation failed: {message}")]
    ValidationError { entity: String, message: String },

    #[error("{source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },
}

impl ServiceError {
    /// True for the variants that map to a 404 response
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::ProductNotFound { .. }
                | ServiceError::CartItemNotFound { .. }
                | ServiceError::EmptyCart { .. }
                | ServiceError::UserNotFound { .. }
        )
    }

    pub fn validation(entity: &str, err: ValidationError) -> Self {
        ServiceError::ValidationError {
            entity: entity.to_string(),
            message: err.to_string(),
        }
    }
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Malformed item: {message}")]
    MalformedItem { message: String },

    /// A conditional write found its key already taken
    #[error("Item already exists: {key}")]
    AlreadyExists { key: String },

    #[error("{operation} left {remaining} requests unprocessed")]
    Unprocessed { operation: String, remaining: usize },

    #[error("Timeout occurred during operation")]
    Timeout,
}

/// Validation errors for input data
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Path `{field}` is required")]
    RequiredField { field: String },

    #[error("Invalid field value: {field}={value}, reason={reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Value out of range: {field}, min={min}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        value: String,
    },
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
