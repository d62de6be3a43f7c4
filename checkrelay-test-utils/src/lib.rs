//! checkrelay Test Utilities
//!
//! Centralized test infrastructure for the checkrelay workspace:
//! - A scripted in-memory remote system
//! - A manually driven clock
//! - Proptest generators for message queues and severity bands
//! - Test fixtures for common scenarios
//! - Custom assertions on error kinds

mod scripted;

pub use scripted::{to_records, Gate, ScriptedRemote};

// Re-export core types for convenience
pub use checkrelay_core::{
    ActiveJob, CheckRequest, CheckResponse, Clock, CommandRun, Credentials, DiskUnit, ErrorKind,
    GatewayConfig, GatewayError, GatewayResult, JobQueueStatus, MessageQueueQuery, QueuedMessage,
    Record, ResponseCode, SeverityBand, Timestamp,
};

pub use fixtures::message_at;

use chrono::{TimeZone, Utc};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Start at 2024-01-01T00:00:00Z.
    pub fn new() -> Self {
        Self::starting_at(fixtures::epoch())
    }

    pub fn starting_at(now: Timestamp) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += chrono::Duration::from_std(by).unwrap_or(chrono::Duration::zero());
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for message queues.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_severity() -> impl Strategy<Value = i32> {
        prop_oneof![Just(0), Just(10), Just(20), Just(30), Just(40), Just(50), Just(99), 0i32..100]
    }

    pub fn arb_severity_band() -> impl Strategy<Value = SeverityBand> {
        (0i32..100, 0i32..100).prop_map(|(a, b)| SeverityBand::new(a.min(b), a.max(b)))
    }

    pub fn arb_reply_status() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            3 => Just(None),
            1 => Just(Some("A".to_string())),
            1 => Just(Some("W".to_string())),
        ]
    }

    /// A queue, oldest first, with strictly increasing timestamps.
    pub fn arb_queue(max_len: usize) -> impl Strategy<Value = Vec<QueuedMessage>> {
        prop::collection::vec((1i64..30, arb_severity(), arb_reply_status()), 0..=max_len).prop_map(
            |steps| {
                let mut offset = 0;
                steps
                    .into_iter()
                    .enumerate()
                    .map(|(i, (gap, severity, reply_status))| {
                        offset += gap;
                        let mut message = message_at(offset, severity, &format!("CPF{:04}", i));
                        message.reply_status = reply_status;
                        message
                    })
                    .collect()
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use serde_json::Value;

    pub const MESSAGE_QUEUE_PATH: &str = "/QSYS.LIB/QSYSOPR.MSGQ";

    pub fn epoch() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    }

    pub fn credentials() -> Credentials {
        Credentials::new("h", "l", "p")
    }

    /// A message `offset_secs` after [`epoch`].
    pub fn message_at(offset_secs: i64, severity: i32, id: &str) -> QueuedMessage {
        QueuedMessage {
            date: epoch() + chrono::Duration::seconds(offset_secs),
            severity,
            id: Some(id.to_string()),
            text: Some(format!("Message {} raised", id)),
            from_job_name: Some("QSYSARB".to_string()),
            from_job_number: Some("000123".to_string()),
            user: Some("QSYS".to_string()),
            reply_status: None,
        }
    }

    pub fn sample_jobs() -> Vec<ActiveJob> {
        ["QZDASOINIT", "QPADEV0001", "QSYSARB"]
            .into_iter()
            .map(|name| ActiveJob {
                name: name.to_string(),
                subsystem: Some("QSYSWRK".to_string()),
                status: Some("*ACTIVE".to_string()),
                active_status: Some("TIMW".to_string()),
                current_library: Some("QGPL".to_string()),
            })
            .collect()
    }

    pub fn disk(name: &str, capacity_mib: i64, available_mib: i64) -> DiskUnit {
        DiskUnit {
            resource_name: name.to_string(),
            unit_control: 1,
            capacity_mib,
            available_mib,
            reserved_mib: 0,
        }
    }

    pub fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    /// Raw JSON request for `command` with optional `args`.
    pub fn request_json(command: &str, args: Option<Value>) -> String {
        let mut request = serde_json::json!({
            "host": "h",
            "login": "l",
            "password": "p",
            "command": command,
        });
        if let (Some(args), Some(object)) = (args, request.as_object_mut()) {
            object.insert("args".to_string(), args);
        }
        request.to_string()
    }

    pub fn request(command: &str, args: Option<Value>) -> CheckRequest {
        match CheckRequest::from_json(request_json(command, args)) {
            Ok(request) => request,
            Err(e) => panic!("fixture request must parse: {}", e),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on error kinds and responses.

    use super::*;

    /// Assert that a result failed with the given kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &GatewayResult<T>, kind: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "unexpected error: {}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok: {:?}", kind, v),
        }
    }

    #[track_caller]
    pub fn assert_ok_response(response: &CheckResponse) {
        assert_eq!(
            response.code,
            ResponseCode::Ok,
            "Expected ok response, got: {:?}",
            response.message
        );
    }

    #[track_caller]
    pub fn assert_error_response(response: &CheckResponse, needle: &str) {
        assert_eq!(response.code, ResponseCode::Error, "Expected error response");
        let message = response.message.as_deref().unwrap_or_default();
        assert!(
            message.contains(needle),
            "Expected message containing {:?}, got {:?}",
            needle,
            message
        );
    }
}
