//! Message queue entries and message queue query shapes.

use crate::constants::ACKNOWLEDGED_REPLY_STATUS;
use crate::filter::SeverityBand;
use crate::{Record, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry of a remote message queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub date: Timestamp,
    pub severity: i32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from_job_name: Option<String>,
    #[serde(default)]
    pub from_job_number: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub reply_status: Option<String>,
}

impl QueuedMessage {
    /// Field-by-field comparison used to recognise the watermark entry.
    ///
    /// Reply status is excluded: answering a message does not make it a
    /// different entry.
    pub fn is_same_entry(&self, other: &QueuedMessage) -> bool {
        self.date == other.date
            && self.severity == other.severity
            && self.id == other.id
            && self.text == other.text
            && self.from_job_name == other.from_job_name
            && self.from_job_number == other.from_job_number
            && self.user == other.user
    }

    pub fn is_acknowledged(&self) -> bool {
        self.reply_status.as_deref() == Some(ACKNOWLEDGED_REPLY_STATUS)
    }

    /// Result record: id, text, severity, date (epoch millis), jobName, jobNumber, user.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("id".to_string(), opt(&self.id));
        record.insert("text".to_string(), opt(&self.text));
        record.insert("severity".to_string(), Value::from(self.severity));
        record.insert("date".to_string(), Value::from(self.date.timestamp_millis()));
        record.insert("jobName".to_string(), opt(&self.from_job_name));
        record.insert("jobNumber".to_string(), opt(&self.from_job_number));
        record.insert("user".to_string(), opt(&self.user));
        record
    }
}

fn opt(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

/// The shape of a message queue read: which queue, and how to filter it.
///
/// Two reads of the same queue with different shapes keep separate watermarks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageQueueQuery {
    pub path: String,
    pub id_pattern: Option<String>,
    pub band: SeverityBand,
}

impl MessageQueueQuery {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            id_pattern: None,
            band: SeverityBand::default(),
        }
    }

    pub fn with_id_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.id_pattern = Some(pattern.into());
        self
    }

    pub fn with_band(mut self, band: SeverityBand) -> Self {
        self.band = band;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn message(severity: i32) -> QueuedMessage {
        QueuedMessage {
            date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            severity,
            id: Some("CPF1234".to_string()),
            text: Some("Job ended abnormally".to_string()),
            from_job_name: Some("QSYSARB".to_string()),
            from_job_number: Some("123456".to_string()),
            user: Some("QSYS".to_string()),
            reply_status: None,
        }
    }

    #[test]
    fn test_same_entry_ignores_reply_status() {
        let a = message(40);
        let mut b = a.clone();
        b.reply_status = Some("A".to_string());
        assert!(a.is_same_entry(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_same_entry_compares_text() {
        let a = message(40);
        let mut b = a.clone();
        b.text = Some("other".to_string());
        assert!(!a.is_same_entry(&b));
    }

    #[test]
    fn test_to_record_uses_epoch_millis() {
        let m = message(40);
        let record = m.to_record();
        assert_eq!(record["date"], Value::from(m.date.timestamp_millis()));
        assert_eq!(record["jobName"], Value::from("QSYSARB"));
        assert_eq!(record["severity"], Value::from(40));
        assert!(!record.contains_key("replyStatus"));
    }

    #[test]
    fn test_acknowledged() {
        let mut m = message(10);
        assert!(!m.is_acknowledged());
        m.reply_status = Some("A".to_string());
        assert!(m.is_acknowledged());
    }
}
