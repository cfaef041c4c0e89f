//! Error types and wire response codes.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Status code written into the `fixed16` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Ok = 200,
    BadRequest = 400,
    NotFound = 404,
    PayloadTooLarge = 413,
    IncompleteRequest = 451,
    InvalidRequest = 452,
    BadGateway = 502,
}

impl ResponseCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.as_u16())
    }
}

/// A request-level failure reported to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub code: ResponseCode,
    pub message: String,
}

impl RequestError {
    pub fn new(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::BadRequest, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::NotFound, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::PayloadTooLarge, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::InvalidRequest, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(ResponseCode::BadGateway, message)
    }
}

/// Invalid `key=value` module argument.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for option '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("argument '{0}' is not of the form key=value")]
    Malformed(String),
}

/// Failure loading the object graph.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cannot read object file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid object file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid object definitions: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure reading monitoring history.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("cannot read log file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failure setting up the listening socket.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("cannot listen on {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("cannot spawn thread: {0}")]
    Spawn(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_code_formatting() {
        assert_eq!(ResponseCode::Ok.to_string(), "200");
        assert_eq!(ResponseCode::IncompleteRequest.as_u16(), 451);
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::bad_request("Table 'foo' has no column 'bar'");
        assert_eq!(err.code, ResponseCode::BadRequest);
        assert_eq!(err.to_string(), "Table 'foo' has no column 'bar'");
    }
}
