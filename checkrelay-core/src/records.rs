//! Typed views of remote query results and their response records.
//!
//! Remote results arrive as [`Record`]s; the handlers decode the ones they
//! need to reason about (cache contents, not-found checks) into these types
//! and render them back into response records.

use crate::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MIB: i64 = 1024 * 1024;

/// One active job, as listed by the `activeJobs` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveJob {
    pub name: String,
    #[serde(default)]
    pub subsystem: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active_status: Option<String>,
    #[serde(default)]
    pub current_library: Option<String>,
}

impl ActiveJob {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from(self.name.clone()));
        record.insert("subSystem".to_string(), opt(&self.subsystem));
        record.insert("status".to_string(), opt(&self.status));
        record.insert("activeStatus".to_string(), opt(&self.active_status));
        record.insert("currentLibrary".to_string(), opt(&self.current_library));
        record
    }
}

/// One disk unit, as listed by the `diskUnits` query. Capacities are in MiB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskUnit {
    pub resource_name: String,
    pub unit_control: i32,
    pub capacity_mib: i64,
    pub available_mib: i64,
    pub reserved_mib: i64,
}

impl DiskUnit {
    /// Response record with capacities converted to bytes.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("status".to_string(), Value::from(self.unit_control));
        record.insert("name".to_string(), Value::from(self.resource_name.clone()));
        record.insert("totalSpace".to_string(), Value::from(self.capacity_mib * MIB));
        record.insert("reservedSpace".to_string(), Value::from(self.reserved_mib * MIB));
        record.insert("freeSpace".to_string(), Value::from(self.available_mib * MIB));
        record
    }
}

/// A job queue named by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobQueueRef {
    pub name: String,
    pub library: String,
}

/// Status of one job queue, as returned by the `jobQueue` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQueueStatus {
    pub name: String,
    pub library: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub active_jobs: i64,
    #[serde(default)]
    pub held_jobs: i64,
    #[serde(default)]
    pub scheduled_jobs: i64,
}

impl JobQueueStatus {
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from(self.name.clone()));
        record.insert("library".to_string(), Value::from(self.library.clone()));
        record.insert("status".to_string(), opt(&self.status));
        record.insert("activeJob".to_string(), Value::from(self.active_jobs));
        record.insert("heldJobOnQueue".to_string(), Value::from(self.held_jobs));
        record.insert("scheduledJobOnQueue".to_string(), Value::from(self.scheduled_jobs));
        record
    }
}

/// Outcome of the `runCommand` query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRun {
    pub success: bool,
    #[serde(default)]
    pub messages: Vec<String>,
}

fn opt(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

/// Keep only `keys` from a raw record, in key order. Missing keys are omitted.
pub fn project(record: &Record, keys: &[&str]) -> Record {
    keys.iter()
        .filter_map(|key| record.get(*key).map(|v| (key.to_string(), v.clone())))
        .collect()
}
