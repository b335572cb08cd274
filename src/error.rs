//! Error types for the driver hub.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Localization error: {0}")]
    Localization(#[from] LocalizationError),

    #[error("Form error: {0}")]
    Form(#[from] FormError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DatabaseError {
    /// Classify a libsql error, keeping uniqueness violations apart from
    /// generic query failures.
    pub fn from_libsql(context: &str, e: libsql::Error) -> Self {
        let text = e.to_string();
        if text.contains("UNIQUE constraint failed") {
            DatabaseError::Constraint(format!("{context}: {text}"))
        } else {
            DatabaseError::Query(format!("{context}: {text}"))
        }
    }
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Locale catalog and rule table loading errors.
#[derive(Debug, thiserror::Error)]
pub enum LocalizationError {
    #[error("No catalog loaded for default language {0}")]
    MissingDefault(String),

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Answer-model errors.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("Field {field} does not accept a {kind} value")]
    TypeMismatch { field: String, kind: &'static str },

    #[error("Field {0} is not part of this form")]
    UnsupportedField(String),

    #[error("Unknown field name: {0}")]
    UnknownField(String),
}

/// Recoverable wizard input failures.
///
/// Each variant carries the localization key of the message shown to the
/// user; none of them change wizard state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("Validation failed: {key}")]
    Validation { key: &'static str },

    #[error("Confirmation rejected: {key}")]
    Confirmation { key: &'static str },

    #[error("Stale selection: {0}")]
    StaleSelection(String),
}

impl WizardError {
    /// Localization key for the user-facing notice, if any.
    pub fn message_key(&self) -> Option<&'static str> {
        match self {
            WizardError::Validation { key } | WizardError::Confirmation { key } => Some(key),
            WizardError::StaleSelection(_) => None,
        }
    }
}

/// Payment provider call failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider resource {resource} {id} is missing or inactive")]
    StaleReference { resource: &'static str, id: String },

    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Unexpected provider response: {0}")]
    InvalidResponse(String),
}

/// Payment flow errors.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("No pending payment for user {0}")]
    NoPending(i64),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wizard_error_keys() {
        let e = WizardError::Validation { key: "wrong_phone_number" };
        assert_eq!(e.message_key(), Some("wrong_phone_number"));
        assert_eq!(WizardError::StaleSelection("page 9".into()).message_key(), None);
    }

    #[test]
    fn database_error_converts_into_top_level() {
        let err: Error = DatabaseError::Query("boom".into()).into();
        assert_eq!(err.to_string(), "Database error: Query failed: boom");
    }
}
