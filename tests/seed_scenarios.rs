//! End-to-end seed scenarios (§8): a `TaskManager` wired to the stub
//! parser and a local stub HTTP server, driven through the same
//! `add_task` → worker → terminal-status path the real façade uses.

mod common;

use std::collections::HashMap;
use std::time::Duration;

use albumfetch::model::TaskStatus;

use common::stub_parser::stub_album_url;
use common::stub_server::{self, StubResponse};
use common::{test_task_manager, wait_for_terminal};

/// Scenario 1: happy path, two-image album.
#[tokio::test]
async fn happy_path_two_image_album() {
    let server = stub_server::start(StubResponse::ok("image-bytes"), HashMap::new());
    let (manager, _dir) = test_task_manager(3, Duration::from_millis(10));

    let url = stub_album_url(&server.base_url, "Alpha", 2);
    let task = manager.add_task(url);

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(5)).await;
    assert!(matches!(finished.status, TaskStatus::Completed), "status was {:?}", finished.status);

    let save_path = finished.save_path.expect("save path set on success");
    assert!(save_path.ends_with("Alpha"));
    for name in ["1.jpg", "2.jpg"] {
        let contents = std::fs::read(std::path::Path::new(&save_path).join(name)).unwrap();
        assert_eq!(contents, b"image-bytes");
    }

    let history = manager.list_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].name, "Alpha");
}

/// Scenario 2: first request to image #1 fails transiently, succeeds on retry.
#[tokio::test]
async fn retry_then_success() {
    let mut overrides = HashMap::new();
    overrides.insert("/img/0".to_string(), vec![StubResponse::status(503), StubResponse::ok("bytes-0")]);
    let server = stub_server::start(StubResponse::ok("bytes-1"), overrides);
    let (manager, _dir) = test_task_manager(2, Duration::from_millis(10));

    let url = stub_album_url(&server.base_url, "Retry", 2);
    let task = manager.add_task(url);

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(5)).await;
    assert!(matches!(finished.status, TaskStatus::Completed), "status was {:?}", finished.status);
    assert_eq!(finished.progress.current, 2);
    assert_eq!(finished.progress.total, 2);
}

/// Scenario 3: one URL always 500s; the batch finishes partially failed.
#[tokio::test]
async fn partial_failure_surfaces_succeeded_count() {
    let mut overrides = HashMap::new();
    overrides.insert("/img/1".to_string(), vec![StubResponse::status(500)]);
    let server = stub_server::start(StubResponse::ok("bytes"), overrides);
    let (manager, _dir) = test_task_manager(1, Duration::from_millis(5));

    let url = stub_album_url(&server.base_url, "Partial", 2);
    let task = manager.add_task(url);

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(5)).await;
    assert!(matches!(finished.status, TaskStatus::Failed), "status was {:?}", finished.status);
    assert!(finished.error.contains("succeeded 1 of 2"), "error was {:?}", finished.error);

    let history = manager.list_history();
    assert_eq!(history.len(), 1);
    assert!(matches!(history[0].status, TaskStatus::Failed));
}

/// Scenario 4: cancellation mid-download of a 50-image album whose
/// server sleeps 1s per request.
#[tokio::test]
async fn cancellation_mid_download() {
    let server = stub_server::start(StubResponse::delayed("bytes", Duration::from_secs(1)), HashMap::new());
    let (manager, _dir) = test_task_manager(0, Duration::from_millis(10));

    let url = stub_album_url(&server.base_url, "Cancelled", 50);
    let task = manager.add_task(url);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(manager.cancel_task(&task.id));

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(2)).await;
    assert!(matches!(finished.status, TaskStatus::Cancelled), "status was {:?}", finished.status);
    assert!(!manager.cancel_task(&task.id), "cancelling a terminal task must be a no-op");

    let history = manager.list_history();
    assert_eq!(history.len(), 1);
    assert!(matches!(history[0].status, TaskStatus::Cancelled));
}

/// Scenario 5: unsupported site type fails fast.
#[tokio::test]
async fn unsupported_site_fails_fast() {
    let (manager, _dir) = test_task_manager(3, Duration::from_millis(10));
    let task = manager.add_task("http://unknown.example/g/1".to_string());

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(2)).await;
    assert!(matches!(finished.status, TaskStatus::Failed), "status was {:?}", finished.status);
    assert!(finished.error.contains("unsupported site type"), "error was {:?}", finished.error);
}

/// Scenario 6: an illegal album name gets normalized to a safe folder.
#[tokio::test]
async fn path_normalization_on_album_name() {
    let server = stub_server::start(StubResponse::ok("bytes"), HashMap::new());
    let (manager, _dir) = test_task_manager(3, Duration::from_millis(10));

    let url = stub_album_url(&server.base_url, "bad:name?", 1);
    let task = manager.add_task(url);

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(5)).await;
    assert!(matches!(finished.status, TaskStatus::Completed), "status was {:?}", finished.status);
    let save_path = finished.save_path.unwrap();
    assert!(save_path.ends_with("bad_name_"), "save path was {save_path}");
    assert!(std::path::Path::new(&save_path).join("1.jpg").exists());
}

/// Boundary: a zero-URL album goes straight to completed.
#[tokio::test]
async fn zero_url_album_completes_immediately() {
    let server = stub_server::start(StubResponse::ok("unused"), HashMap::new());
    let (manager, _dir) = test_task_manager(3, Duration::from_millis(10));

    let url = stub_album_url(&server.base_url, "Empty", 0);
    let task = manager.add_task(url);

    let finished = wait_for_terminal(&manager, &task.id, Duration::from_secs(5)).await;
    assert!(matches!(finished.status, TaskStatus::Completed), "status was {:?}", finished.status);
    assert_eq!(finished.progress.total, 0);
}

/// Concurrent cancellation of many tasks leaves zero active tasks behind.
#[tokio::test]
async fn concurrent_cancellations_leave_no_active_tasks() {
    let server = stub_server::start(StubResponse::delayed("bytes", Duration::from_millis(500)), HashMap::new());
    let (manager, _dir) = test_task_manager(0, Duration::from_millis(10));

    let mut ids = Vec::new();
    for i in 0..25 {
        let url = stub_album_url(&server.base_url, &format!("Bulk{i}"), 5);
        ids.push(manager.add_task(url).id);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    for id in &ids {
        manager.cancel_task(id);
    }

    for id in &ids {
        wait_for_terminal(&manager, id, Duration::from_secs(3)).await;
    }

    assert!(manager.list_active().is_empty());
}
