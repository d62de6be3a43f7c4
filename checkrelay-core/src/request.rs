//! Inbound check requests.
//!
//! The raw payload is kept verbatim: it is the request fingerprint used by
//! the in-flight filter.

use crate::credentials::Credentials;
use crate::error::{GatewayError, GatewayResult, RequestError};
use crate::records::JobQueueRef;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Wire shape of a request: `{host, login, password, command, args}`.
#[derive(Deserialize)]
struct WireRequest {
    host: Option<String>,
    login: Option<String>,
    password: Option<String>,
    command: Option<String>,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

/// A decoded, validated check request.
#[derive(Clone)]
pub struct CheckRequest {
    credentials: Credentials,
    command: String,
    args: Map<String, Value>,
    raw: String,
}

impl CheckRequest {
    /// Build a request from already-decoded parts. `raw` is the fingerprint.
    pub fn new(
        credentials: Credentials,
        command: impl Into<String>,
        args: Map<String, Value>,
        raw: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            command: command.into(),
            args,
            raw: raw.into(),
        }
    }

    /// Decode a JSON payload, requiring host, login, password and command.
    pub fn from_json(raw: impl Into<String>) -> GatewayResult<Self> {
        let raw = raw.into();
        let wire: WireRequest = serde_json::from_str(&raw).map_err(|e| RequestError::Malformed {
            reason: e.to_string(),
        })?;

        let host = required(wire.host, "host")?;
        let login = required(wire.login, "login")?;
        let password = required(wire.password, "password")?;
        let command = required(wire.command, "command")?;

        Ok(Self {
            credentials: Credentials::new(host, login, password),
            command,
            args: wire.args.unwrap_or_default(),
            raw,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// The raw payload, used verbatim as the deduplication key.
    pub fn fingerprint(&self) -> &str {
        &self.raw
    }

    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).filter(|v| !v.is_null())
    }

    /// String form of an argument. Numbers and booleans are rendered.
    pub fn arg_str(&self, name: &str) -> Option<String> {
        match self.arg(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Integer argument, falling back to `default` when absent or unparsable.
    pub fn arg_i32_or(&self, name: &str, default: i32) -> i32 {
        match self.arg(name) {
            Some(Value::Number(n)) => n
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// List of `{name, library}` maps. Accepts a JSON array or a string holding one.
    pub fn job_queue_refs(&self, name: &str) -> GatewayResult<Vec<JobQueueRef>> {
        let entries: Vec<Map<String, Value>> = match self.arg(name) {
            None => return Err(GatewayError::missing_field(name)),
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map_err(|e| GatewayError::invalid_argument(name, e.to_string()))?,
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| GatewayError::invalid_argument(name, e.to_string()))?,
        };
        if entries.is_empty() {
            return Err(GatewayError::missing_field(name));
        }

        entries
            .iter()
            .map(|entry| {
                let field = |key: &str| entry.get(key).and_then(Value::as_str).map(str::to_string);
                match (field("name"), field("library")) {
                    (Some(name), Some(library)) => Ok(JobQueueRef { name, library }),
                    _ => Err(GatewayError::invalid_argument(
                        name,
                        "JobQueue name/library attribute must be set",
                    )),
                }
            })
            .collect()
    }
}

fn required(value: Option<String>, field: &str) -> GatewayResult<String> {
    value.ok_or_else(|| GatewayError::missing_field(field))
}

impl fmt::Debug for CheckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckRequest")
            .field("credentials", &self.credentials)
            .field("command", &self.command)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_from_json_keeps_raw_payload() {
        let raw = r#"{"host":"h","login":"l","password":"p","command":"listJobs"}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        assert_eq!(request.fingerprint(), raw);
        assert_eq!(request.command(), "listJobs");
        assert_eq!(request.credentials().host(), "h");
    }

    #[test]
    fn test_missing_password_is_rejected() {
        let raw = r#"{"host":"h","login":"l","command":"listJobs"}"#;
        let err = CheckRequest::from_json(raw).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_malformed_json() {
        let err = CheckRequest::from_json("{not json").unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Request(RequestError::Malformed { .. })
        ));
    }

    #[test]
    fn test_debug_hides_password_and_payload() {
        let raw = r#"{"host":"h","login":"l","password":"topsecret","command":"listJobs"}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        assert!(!format!("{:?}", request).contains("topsecret"));
    }

    #[test]
    fn test_integer_args_fall_back_to_default() {
        let raw = r#"{"host":"h","login":"l","password":"p","command":"x",
            "args":{"minSeverityLevel":"20","maxSeverityLevel":"high","other":40}}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        assert_eq!(request.arg_i32_or("minSeverityLevel", i32::MIN), 20);
        assert_eq!(request.arg_i32_or("maxSeverityLevel", i32::MAX), i32::MAX);
        assert_eq!(request.arg_i32_or("other", 0), 40);
        assert_eq!(request.arg_i32_or("absent", -1), -1);
    }

    #[test]
    fn test_job_queue_refs_accepts_array_and_string() {
        let raw = r#"{"host":"h","login":"l","password":"p","command":"getJobQueues",
            "args":{"queues":[{"name":"QBATCH","library":"QGPL"}]}}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        let refs = request.job_queue_refs("queues").unwrap();
        assert_eq!(refs[0].name, "QBATCH");

        let raw = r#"{"host":"h","login":"l","password":"p","command":"getJobQueues",
            "args":{"queues":"[{\"name\":\"QS36EVOKE\",\"library\":\"QGPL\"}]"}}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        let refs = request.job_queue_refs("queues").unwrap();
        assert_eq!(refs[0].name, "QS36EVOKE");
    }

    #[test]
    fn test_job_queue_refs_requires_library() {
        let raw = r#"{"host":"h","login":"l","password":"p","command":"getJobQueues",
            "args":{"queues":[{"name":"QBATCH"}]}}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        let err = request.job_queue_refs("queues").unwrap_err();
        assert!(err.to_string().contains("JobQueue name/library attribute must be set"));
    }

    #[test]
    fn test_job_queue_refs_missing() {
        let raw = r#"{"host":"h","login":"l","password":"p","command":"getJobQueues"}"#;
        let request = CheckRequest::from_json(raw).unwrap();
        let err = request.job_queue_refs("queues").unwrap_err();
        assert_eq!(err.to_string(), "Invalid arguments. please set queues");
    }
}
