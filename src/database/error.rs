use std::fmt::{self, Display};

use potion::Error;
use serde_json::{json, Value};

/// SQLSTATE raised by postgres on a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

pub struct QueryError {
    info: String,
    unique_violation: bool,
    constraint: Option<String>,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            unique_violation: false,
            constraint: None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        self.unique_violation
    }

    /// Name of the violated constraint, when the database reported one.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }

    /// Turns a unique-constraint violation into a client error carrying `message`,
    /// every other failure stays a server error.
    pub fn or_conflict(self, message: &str) -> Error {
        if self.unique_violation {
            log::debug!("Conflict: {}", self.info);
            bad_request(message)
        } else {
            self.into()
        }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Configuration(e) => Self::new(format!("{e}")),
            sqlx::Error::Database(e) => {
                let unique_violation = e.code().as_deref() == Some(UNIQUE_VIOLATION);
                Self {
                    info: format!("{e}"),
                    unique_violation,
                    constraint: e.constraint().map(str::to_string),
                }
            }
            sqlx::Error::Io(e) => Self::new(format!("{e}")),
            sqlx::Error::Tls(e) => Self::new(format!("{e}")),
            sqlx::Error::Protocol(e) => Self::new(format!("{e}")),
            sqlx::Error::RowNotFound => Self::new(format!("RowNotFound")),
            sqlx::Error::TypeNotFound { type_name } => {
                Self::new(format!("Type not found: {type_name}"))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => {
                Self::new(format!("Column index out of bounds {index} ({len})"))
            }
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("{e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            sqlx::Error::Decode(e) => Self::new(format!("{e}")),
            sqlx::Error::PoolTimedOut => Self::new(format!("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(format!("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(format!("Worker crashed")),
            sqlx::Error::Migrate(e) => Self::new(format!("{e}")),
            _ => Self::new(format!("Unknown error")),
        }
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

pub struct CacheError {
    info: String,
}

impl From<redis::RedisError> for CacheError {
    fn from(value: redis::RedisError) -> Self {
        Self {
            info: format!("{:?} - {:?}", value.code(), value.detail()),
        }
    }
}

impl From<CacheError> for Error {
    fn from(value: CacheError) -> Self {
        Error {
            code: 500,
            info: Some(value.info),
            redirect: None,
        }
    }
}

/// A field-scoped validation failure, rendered as `{"<field>": ["<message>"]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn body(&self) -> Value {
        json!({ self.field: [self.message] })
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error {
            code: 400,
            info: Some(value.body().to_string()),
            redirect: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    NotFound(String),
    Forbidden(String),
    Unauthorized(String),
}

impl ApiError {
    pub fn not_found() -> Error {
        Self::NotFound(String::from("Not found.")).into()
    }

    pub fn forbidden() -> Error {
        Self::Forbidden(String::from(
            "You do not have permission to perform this action.",
        ))
        .into()
    }

    pub fn unauthorized() -> Error {
        Self::Unauthorized(String::from(
            "Authentication credentials were not provided.",
        ))
        .into()
    }
}

impl From<ApiError> for Error {
    fn from(value: ApiError) -> Self {
        let (code, info) = match value {
            ApiError::NotFound(info) => (404, info),
            ApiError::Forbidden(info) => (403, info),
            ApiError::Unauthorized(info) => (401, info),
        };

        Error {
            code,
            info: Some(info),
            redirect: None,
        }
    }
}

pub fn bad_request(info: &str) -> Error {
    Error {
        code: 400,
        info: Some(info.to_string()),
        redirect: None,
    }
}

/// Converts an `Error` into the status code and JSON body sent to the client.
pub fn error_body(error: &Error) -> (u16, Value) {
    let code = error.code as u16;
    let info = error.info.clone().unwrap_or_default();

    let body = match serde_json::from_str::<Value>(&info) {
        Ok(value @ Value::Object(_)) => value,
        _ if code == 400 => json!({ "errors": info }),
        _ if code >= 500 => json!({ "detail": "Internal server error" }),
        _ => json!({ "detail": info }),
    };

    (code, body)
}
