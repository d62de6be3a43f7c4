//! Behaviour of each check, end to end through the registry.

use checkrelay_core::remote::queries;
use checkrelay_core::{
    CheckResponse, CommandRun, GatewayConfig, GatewayError, JobQueueStatus, RemoteError,
    SystemClock,
};
use checkrelay_dispatch::handlers::{POOL_FIELDS, SYSTEM_FIELDS};
use checkrelay_dispatch::{DispatcherRegistry, HandlerCategory};
use checkrelay_test_utils::assertions::{assert_error_response, assert_ok_response};
use checkrelay_test_utils::fixtures::{credentials, disk, record, request, sample_jobs, MESSAGE_QUEUE_PATH};
use checkrelay_test_utils::{message_at, ScriptedRemote};
use serde_json::{json, Value};
use std::sync::Arc;

fn registry(remote: &ScriptedRemote) -> DispatcherRegistry {
    DispatcherRegistry::new(
        GatewayConfig::default(),
        Arc::new(remote.clone()),
        Arc::new(SystemClock),
    )
    .unwrap()
}

async fn check(registry: &DispatcherRegistry, command: &str, args: Option<Value>) -> CheckResponse {
    registry.dispatch(request(command, args)).await
}

fn network_error() -> GatewayError {
    RemoteError::Network {
        host: "h".to_string(),
        reason: "connection reset by peer".to_string(),
    }
    .into()
}

// ============================================================================
// JOBS AND DISKS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_jobs_records() {
    let remote = ScriptedRemote::new();
    remote.set_jobs(sample_jobs());
    let registry = registry(&remote);

    let response = check(&registry, "LISTJOBS", None).await;
    assert_ok_response(&response);
    let first = &response.result[0];
    assert_eq!(first["name"], json!("QZDASOINIT"));
    assert_eq!(first["subSystem"], json!("QSYSWRK"));
    assert_eq!(first["activeStatus"], json!("TIMW"));
    assert_eq!(first["currentLibrary"], json!("QGPL"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_refresh_failure_is_replayed() {
    let remote = ScriptedRemote::new();
    remote.fail_query(queries::ACTIVE_JOBS, network_error());
    let registry = registry(&remote);

    let first = check(&registry, "listJobs", None).await;
    assert_error_response(&first, "connection reset by peer");

    // The remote recovers inside the TTL window; the failure is still served.
    remote.clear_query_failure(queries::ACTIVE_JOBS);
    let second = check(&registry, "listJobs", None).await;
    assert_eq!(second.message, first.message);
    assert_eq!(remote.query_count(queries::ACTIVE_JOBS), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_disks_in_bytes() {
    let remote = ScriptedRemote::new();
    remote.set_disks(vec![disk("DD001", 2, 1), disk("DD002", 4, 3)]);
    let registry = registry(&remote);

    let response = check(&registry, "listDisks", None).await;
    assert_ok_response(&response);
    assert_eq!(response.result.len(), 2);
    assert_eq!(response.result[0]["totalSpace"], json!(2 * 1024 * 1024));
    assert_eq!(response.result[1]["freeSpace"], json!(3 * 1024 * 1024));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_named_disk_added_after_caching_is_found_with_one_refresh() {
    let remote = ScriptedRemote::new();
    remote.set_disks(vec![disk("DD001", 2, 1)]);
    let registry = registry(&remote);
    assert_ok_response(&check(&registry, "listDisks", None).await);

    remote.set_disks(vec![disk("DD001", 2, 1), disk("DD002", 4, 3)]);
    let response = check(&registry, "listDisks", Some(json!({"diskName": "DD002"}))).await;
    assert_ok_response(&response);
    assert_eq!(response.result.len(), 1);
    assert_eq!(response.result[0]["name"], json!("DD002"));
    assert_eq!(remote.query_count(queries::DISK_UNITS), 2);

    let stats = registry
        .resolve(&credentials())
        .unwrap()
        .disk_handler()
        .unwrap()
        .cache_stats();
    assert_eq!((stats.hits, stats.misses, stats.refresh_failures), (1, 2, 0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_disk_is_not_found_after_one_refresh() {
    let remote = ScriptedRemote::new();
    remote.set_disks(vec![disk("DD001", 2, 1)]);
    let registry = registry(&remote);
    assert_ok_response(&check(&registry, "listDisks", None).await);

    let response = check(&registry, "listDisks", Some(json!({"diskName": "DD009"}))).await;
    assert_error_response(&response, "Disk DD009 not found");
    assert_eq!(remote.query_count(queries::DISK_UNITS), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_disk_on_cold_cache_does_not_refetch() {
    let remote = ScriptedRemote::new();
    remote.set_disks(vec![disk("DD001", 2, 1)]);
    let registry = registry(&remote);

    let response = check(&registry, "listDisks", Some(json!({"diskName": "DD009"}))).await;
    assert_error_response(&response, "Disk DD009 not found");
    assert_eq!(remote.query_count(queries::DISK_UNITS), 1);
}

// ============================================================================
// SYSTEM
// ============================================================================

fn system_status() -> checkrelay_core::Record {
    let mut pairs: Vec<(&str, Value)> = SYSTEM_FIELDS
        .iter()
        .enumerate()
        .map(|(i, field)| (*field, json!(i)))
        .collect();
    pairs.push(("systemName", json!("PROD01")));
    record(&pairs)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_get_system_projects_status_over_persistent_session() {
    let remote = ScriptedRemote::new();
    remote.set_system_status(system_status());
    let registry = registry(&remote);

    let first = check(&registry, "getSystem", None).await;
    let second = check(&registry, "getSystem", None).await;

    assert_ok_response(&first);
    assert_eq!(first.result.len(), 1);
    assert_eq!(first.result[0].len(), SYSTEM_FIELDS.len());
    assert!(!first.result[0].contains_key("systemName"));
    assert_eq!(first.result[0]["maxJobInSystem"], json!(2));
    assert_eq!(first.result, second.result);

    // One session, kept open between checks.
    assert_eq!(remote.opens(), 1);
    assert_eq!(remote.open_sessions(), 1);
    let dispatcher = registry.resolve(&credentials()).unwrap();
    assert!(dispatcher
        .initialized_handlers()
        .contains(&HandlerCategory::System));

    registry.shutdown().unwrap();
    assert!(dispatcher.is_shut_down());
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_page_fault_records() {
    let remote = ScriptedRemote::new();
    remote.set_pools(vec![record(&[
        ("id", json!(2)),
        ("name", json!("*BASE")),
        ("dbPageFault", json!(0.5)),
        ("dbPage", json!(12.0)),
        ("nonDbPageFault", json!(1.5)),
        ("nonDbPage", json!(30.0)),
        ("reservedSize", json!(1024)),
    ])]);
    let registry = registry(&remote);

    let response = check(&registry, "pageFault", None).await;
    assert_ok_response(&response);
    let keys: Vec<&str> = response.result[0].keys().map(String::as_str).collect();
    let mut expected = POOL_FIELDS.to_vec();
    expected.sort_unstable();
    assert_eq!(keys, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_system_session_reconnects_once_on_connection_loss() {
    let remote = ScriptedRemote::new();
    remote.set_system_status(system_status());
    let registry = registry(&remote);
    assert_ok_response(&check(&registry, "getSystem", None).await);

    remote.fail_query(queries::SYSTEM_STATUS, network_error());
    let failed = check(&registry, "getSystem", None).await;
    assert_error_response(&failed, "connection reset by peer");
    assert_eq!(remote.opens(), 2);
    assert_eq!(remote.query_count(queries::SYSTEM_STATUS), 3);

    remote.clear_query_failure(queries::SYSTEM_STATUS);
    assert_ok_response(&check(&registry, "getSystem", None).await);
    assert_eq!(remote.opens(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_system_handler_retries_construction_after_failed_open() {
    let remote = ScriptedRemote::new();
    remote.set_system_status(system_status());
    remote.fail_open(network_error());
    let registry = registry(&remote);

    assert_error_response(&check(&registry, "getSystem", None).await, "connection reset");

    remote.clear_open_failure();
    assert_ok_response(&check(&registry, "getSystem", None).await);
}

// ============================================================================
// PER-CALL SESSIONS
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_subsystems_closes_session() {
    let remote = ScriptedRemote::new();
    remote.set_subsystems(vec![record(&[
        ("name", json!("QBATCH")),
        ("path", json!("/QSYS.LIB/QBATCH.SBSD")),
        ("library", json!("QSYS")),
        ("status", json!("*ACTIVE")),
        ("currentActiveJobs", json!(4)),
        ("description", json!("Batch subsystem")),
    ])]);
    let registry = registry(&remote);

    let response = check(&registry, "listSubsystems", None).await;
    assert_ok_response(&response);
    assert_eq!(response.result[0]["currentActiveJobs"], json!(4));
    assert!(!response.result[0].contains_key("description"));
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_command_collects_output() {
    let remote = ScriptedRemote::new();
    remote.set_command(
        "WRKACTJOB",
        CommandRun {
            success: true,
            messages: vec!["line one".to_string(), "line two".to_string()],
        },
    );
    let registry = registry(&remote);

    let response = check(&registry, "executeCommand", Some(json!({"cmdName": "WRKACTJOB"}))).await;
    assert_ok_response(&response);
    let result = &response.result[0];
    assert_eq!(result["cmdName"], json!("WRKACTJOB"));
    assert_eq!(result["status"], json!("success"));
    assert_eq!(result["output"], json!("line one\nline two\n"));
    assert!(!result.contains_key("message"));
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_command_is_reported_in_record() {
    let remote = ScriptedRemote::new();
    remote.set_command(
        "ENDSBS QBATCH",
        CommandRun {
            success: false,
            messages: vec!["CPF1054 No subsystem QBATCH active.".to_string()],
        },
    );
    let registry = registry(&remote);

    let response = check(&registry, "executeCommand", Some(json!({"cmdName": "ENDSBS QBATCH"}))).await;
    assert_ok_response(&response);
    assert_eq!(response.result[0]["status"], json!("failed"));
    assert_eq!(response.result[0]["message"], json!("command run failed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_command_exception_is_reported_in_record() {
    let remote = ScriptedRemote::new();
    remote.fail_query(queries::RUN_COMMAND, network_error());
    let registry = registry(&remote);

    let response = check(&registry, "executeCommand", Some(json!({"cmdName": "DSPLIB"}))).await;
    assert_ok_response(&response);
    let message = response.result[0]["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("exception: "));
    assert!(message.contains("connection reset by peer"));
    assert_eq!(response.result[0]["output"], json!(""));
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_execute_command_requires_name() {
    let remote = ScriptedRemote::new();
    let registry = registry(&remote);
    let response = check(&registry, "executeCommand", None).await;
    assert_error_response(&response, "Invalid arguments. please set cmdName");
    assert_eq!(remote.opens(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_authentication_failure_is_reported() {
    let remote = ScriptedRemote::new();
    remote.fail_open(
        RemoteError::Authentication {
            host: "h".to_string(),
            login: "l".to_string(),
            reason: "password is not correct".to_string(),
        }
        .into(),
    );
    let registry = registry(&remote);
    let response = check(&registry, "listSubsystems", None).await;
    assert_error_response(&response, "password is not correct");
}

// ============================================================================
// JOB QUEUES
// ============================================================================

fn job_queue(name: &str, library: &str, active: i64) -> JobQueueStatus {
    JobQueueStatus {
        name: name.to_string(),
        library: library.to_string(),
        status: Some("RELEASED".to_string()),
        active_jobs: active,
        held_jobs: 0,
        scheduled_jobs: 1,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_queues_in_request_order() {
    let remote = ScriptedRemote::new();
    remote.add_job_queue(job_queue("QBATCH", "QGPL", 2));
    remote.add_job_queue(job_queue("QSYSNOMAX", "QSYS", 7));
    let registry = registry(&remote);

    let args = json!({"queues": [
        {"name": "QSYSNOMAX", "library": "QSYS"},
        {"name": "QBATCH", "library": "QGPL"},
    ]});
    let response = check(&registry, "getJobQueues", Some(args)).await;
    assert_ok_response(&response);
    assert_eq!(response.result.len(), 2);
    assert_eq!(response.result[0]["activeJob"], json!(7));
    assert_eq!(response.result[1]["name"], json!("QBATCH"));
    assert_eq!(response.result[1]["scheduledJobOnQueue"], json!(1));
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_queues_accept_encoded_list() {
    let remote = ScriptedRemote::new();
    remote.add_job_queue(job_queue("QBATCH", "QGPL", 2));
    let registry = registry(&remote);

    let args = json!({"queues": r#"[{"name":"QBATCH","library":"QGPL"}]"#});
    let response = check(&registry, "getJobQueues", Some(args)).await;
    assert_ok_response(&response);
    assert_eq!(response.result.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_job_queue_is_not_found() {
    let remote = ScriptedRemote::new();
    remote.add_job_queue(job_queue("QBATCH", "QGPL", 2));
    let registry = registry(&remote);

    let args = json!({"queues": [
        {"name": "QBATCH", "library": "QGPL"},
        {"name": "QPGMR", "library": "QGPL"},
    ]});
    let response = check(&registry, "getJobQueues", Some(args)).await;
    assert_error_response(&response, "JobQueue QPGMR in library QGPL not found");
    assert!(response.result.is_empty());
    assert_eq!(remote.open_sessions(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_job_queue_arguments_are_validated() {
    let remote = ScriptedRemote::new();
    let registry = registry(&remote);

    let missing = check(&registry, "getJobQueues", None).await;
    assert_error_response(&missing, "please set queues");

    let empty = check(&registry, "getJobQueues", Some(json!({"queues": []}))).await;
    assert_error_response(&empty, "please set queues");

    let partial = check(&registry, "getJobQueues", Some(json!({"queues": [{"name": "QBATCH"}]}))).await;
    assert_error_response(&partial, "JobQueue name/library attribute must be set");
    assert_eq!(remote.opens(), 0);
}

// ============================================================================
// MESSAGE QUEUES
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_message_queue_applies_severity_band() {
    let remote = ScriptedRemote::new();
    remote.set_messages(
        MESSAGE_QUEUE_PATH,
        vec![
            message_at(1, 10, "CPI0001"),
            message_at(2, 40, "CPF0002"),
            message_at(3, 60, "CPF0003"),
        ],
    );
    let registry = registry(&remote);

    let args = json!({
        "messageQueuePath": MESSAGE_QUEUE_PATH,
        "minSeverityLevel": 20,
        "maxSeverityLevel": "60",
    });
    let response = check(&registry, "getErrorMessageQueue", Some(args)).await;
    assert_ok_response(&response);
    assert_eq!(response.result.len(), 1);
    assert_eq!(response.result[0]["id"], json!("CPF0002"));
    assert_eq!(response.result[0]["severity"], json!(40));
    assert_eq!(response.result[0]["jobName"], json!("QSYSARB"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_error_message_queue_skips_acknowledged_and_filters_ids() {
    let mut answered = message_at(3, 40, "CPF0003");
    answered.reply_status = Some("A".to_string());
    let remote = ScriptedRemote::new();
    remote.set_messages(
        MESSAGE_QUEUE_PATH,
        vec![message_at(1, 40, "CPI0001"), message_at(2, 40, "CPF0002"), answered],
    );
    let registry = registry(&remote);

    let args = json!({
        "messageQueuePath": MESSAGE_QUEUE_PATH,
        "messageIdfilterPattern": "CPF.*",
    });
    let response = check(&registry, "getErrorMessageQueue", Some(args)).await;
    assert_ok_response(&response);
    let ids: Vec<&Value> = response.result.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!("CPF0002")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_message_queue_arguments_are_validated() {
    let remote = ScriptedRemote::new();
    let registry = registry(&remote);

    let missing = check(&registry, "getErrorMessageQueue", None).await;
    assert_error_response(&missing, "Invalid arguments. please set messageQueuePath");

    let bad_pattern = check(
        &registry,
        "getNewMessageInMessageQueue",
        Some(json!({"messageQueuePath": MESSAGE_QUEUE_PATH, "messageIdfilterPattern": "CPF("})),
    )
    .await;
    assert_error_response(&bad_pattern, "messageIdfilterPattern");
    assert_eq!(remote.opens(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_messages_are_reported_once() {
    let remote = ScriptedRemote::new();
    remote.set_messages(
        MESSAGE_QUEUE_PATH,
        (1..=3).map(|i| message_at(i, 40, &format!("CPF000{}", i))).collect(),
    );
    let registry = registry(&remote);
    let args = json!({ "messageQueuePath": MESSAGE_QUEUE_PATH, "minSeverityLevel": 30 });

    let first = check(&registry, "getNewMessageInMessageQueue", Some(args.clone())).await;
    assert_ok_response(&first);
    assert!(first.result.is_empty());
    assert_eq!(
        first.message.as_deref(),
        Some("Initialisation of the local DB")
    );

    remote.push_message(MESSAGE_QUEUE_PATH, message_at(4, 40, "CPF0004"));
    remote.push_message(MESSAGE_QUEUE_PATH, message_at(5, 10, "CPI0005"));
    remote.push_message(MESSAGE_QUEUE_PATH, message_at(6, 50, "CPF0006"));

    let second = check(&registry, "getNewMessageInMessageQueue", Some(args.clone())).await;
    assert_ok_response(&second);
    assert!(second.message.is_none());
    let ids: Vec<&Value> = second.result.iter().map(|r| &r["id"]).collect();
    assert_eq!(ids, vec![&json!("CPF0006"), &json!("CPF0004")]);

    let third = check(&registry, "getNewMessageInMessageQueue", Some(args)).await;
    assert_ok_response(&third);
    assert!(third.result.is_empty());
    assert_eq!(remote.open_sessions(), 0);
}

// ============================================================================
// ROUTING
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_check_is_rejected() {
    let remote = ScriptedRemote::new();
    let registry = registry(&remote);
    let response = check(&registry, "dumpAll", None).await;
    assert_error_response(&response, "unknown request : dumpAll");
    assert_eq!(remote.opens(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handlers_are_built_on_first_use() {
    let remote = ScriptedRemote::new();
    remote.set_jobs(sample_jobs());
    let registry = registry(&remote);
    let dispatcher = registry.resolve(&credentials()).unwrap();
    assert!(dispatcher.initialized_handlers().is_empty());

    assert_ok_response(&check(&registry, "listJobs", None).await);
    assert_ok_response(&check(&registry, "executeCommand", Some(json!({"cmdName": "DSPLIB"}))).await);
    assert_eq!(
        dispatcher.initialized_handlers(),
        vec![HandlerCategory::Jobs, HandlerCategory::Commands]
    );
}
