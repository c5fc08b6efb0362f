use std::io;

/// Failures reported by a ServerQuery session.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("could not connect to {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("Login failed: {message}")]
    Auth { message: String },

    #[error("`{command}` failed: {message} (error id {id})")]
    Command {
        command: String,
        id: u32,
        message: String,
    },

    #[error("server response is missing `{0}`")]
    MissingField(String),

    #[error("field `{field}` is not a number: `{value}`")]
    InvalidField { field: String, value: String },

    #[error("unexpected server response: {0}")]
    Protocol(String),

    #[error("connection lost: {0}")]
    Io(#[from] io::Error),
}

impl QueryError {
    pub fn missing<S: Into<String>>(field: S) -> Self {
        QueryError::MissingField(field.into())
    }

    /// Whether the error came from rejected credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, QueryError::Auth { .. })
    }
}

/// Returned when a configured instance token is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a virtual server id")]
pub struct InvalidInstanceId(pub String);
