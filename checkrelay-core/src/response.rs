//! Outbound response envelope.

use crate::error::GatewayError;
use crate::Record;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Response status, serialized as an integer (`0` ok, `1` error).
///
/// Any non-zero code decodes as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", from = "u8")]
pub enum ResponseCode {
    Ok,
    Error,
}

impl From<ResponseCode> for u8 {
    fn from(code: ResponseCode) -> Self {
        match code {
            ResponseCode::Ok => 0,
            ResponseCode::Error => 1,
        }
    }
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ResponseCode::Ok,
            _ => ResponseCode::Error,
        }
    }
}

/// Result of one check as returned to the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResponse {
    pub code: ResponseCode,
    pub message: Option<String>,
    #[serde(rename = "requestDuration")]
    pub request_duration_ms: u64,
    pub result: Vec<Record>,
}

impl CheckResponse {
    pub fn ok(result: Vec<Record>) -> Self {
        Self {
            code: ResponseCode::Ok,
            message: None,
            request_duration_ms: 0,
            result,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: ResponseCode::Error,
            message: Some(message.into()),
            request_duration_ms: 0,
            result: Vec::new(),
        }
    }

    pub fn from_error(error: &GatewayError) -> Self {
        Self::error(error.to_string())
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.request_duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.code == ResponseCode::Ok
    }
}

impl From<GatewayError> for CheckResponse {
    fn from(error: GatewayError) -> Self {
        Self::from_error(&error)
    }
}
