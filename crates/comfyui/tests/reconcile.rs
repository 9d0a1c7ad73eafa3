//! Reconciliation-engine tests against a mocked ComfyUI server.
//!
//! Exercises the merge policy end-to-end: concurrent polls with partial
//! failure, push-vs-poll precedence, sticky completion, and the
//! once-per-job artifact save.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use snapbooth_comfyui::api::ComfyApi;
use snapbooth_comfyui::artifacts::ArtifactStore;
use snapbooth_comfyui::reconcile::{reconcile, JobOutput};
use snapbooth_comfyui::steps::StepTable;
use snapbooth_comfyui::store::JobStore;

fn sampler_table() -> StepTable {
    StepTable::from_workflow(&json!({
        "3": {"class_type": "KSampler", "inputs": {"steps": 20}},
        "5": {"class_type": "SaveImage", "inputs": {}},
    }))
}

async fn mount_history(server: &MockServer, prompt_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/history/{prompt_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_progress(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn failed_progress_poll_still_completes_from_history() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    // The live-progress endpoint is down (404); history alone carries
    // completion and the output descriptor.
    mount_history(
        &server,
        "p1",
        json!({
            "p1": {
                "status": {"completed": true},
                "outputs": {"9": {"images": [
                    {"type": "temp", "filename": "preview.png"},
                    {"type": "output", "filename": "a.png", "subfolder": ""}
                ]}}
            }
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .and(query_param("filename", "a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
        .mount(&server)
        .await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.register_job(&prompt_id, "cap-1", sampler_table()).await;
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path().join("output"));

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;

    assert!(snapshot.complete);
    assert_eq!(snapshot.percent, 100.0);
    assert_eq!(snapshot.label, "Complete");
    match snapshot.output {
        Some(JobOutput::Remote(image)) => assert_eq!(image.filename, "a.png"),
        other => panic!("expected remote output, got {other:?}"),
    }
    // The artifact was persisted next to the capture.
    assert!(artifacts.exists("cap-1"));
    assert!(store.is_saved(&prompt_id).await);
}

#[tokio::test]
async fn fresh_socket_state_cannot_be_regressed_by_poll() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_progress(&server, json!({"value": 5, "max": 10})).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.record_socket_progress(&prompt_id, 70.0, false).await;
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;

    assert!(!snapshot.complete);
    assert_eq!(snapshot.percent, 70.0);
    assert_eq!(snapshot.label, "Sampling");
}

#[tokio::test]
async fn poll_can_raise_a_fresh_socket_percent() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_progress(&server, json!({"value": 8, "max": 10})).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.record_socket_progress(&prompt_id, 30.0, false).await;
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert_eq!(snapshot.percent, 80.0);
}

#[tokio::test(start_paused = true)]
async fn stale_socket_state_yields_to_polled_percent() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_progress(&server, json!({"value": 6, "max": 10})).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.record_socket_progress(&prompt_id, 40.0, false).await;

    // 11 seconds without a push update: the socket state goes stale.
    tokio::time::advance(std::time::Duration::from_secs(11)).await;

    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());
    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;

    assert_eq!(snapshot.percent, 60.0);
}

#[tokio::test(start_paused = true)]
async fn stale_socket_percent_used_when_poll_yields_zero() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_progress(&server, json!({})).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.record_socket_progress(&prompt_id, 40.0, false).await;
    tokio::time::advance(std::time::Duration::from_secs(11)).await;

    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());
    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;

    assert_eq!(snapshot.percent, 40.0);
}

#[tokio::test]
async fn completion_is_sticky_across_snapshots() {
    let prompt_id = "p1".to_string();
    let store = JobStore::new();
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    // First snapshot: history says completed.
    let first_server = MockServer::start().await;
    mount_history(
        &first_server,
        "p1",
        json!({"p1": {"status": {"completed": true}}}),
    )
    .await;
    let api = ComfyApi::new(first_server.uri());
    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert!(snapshot.complete);

    // Second snapshot: the raw status briefly looks incomplete again.
    let second_server = MockServer::start().await;
    mount_history(
        &second_server,
        "p1",
        json!({"p1": {"status": {"completed": false}}}),
    )
    .await;
    let api = ComfyApi::new(second_server.uri());
    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert!(snapshot.complete, "completion must never revert");
    assert_eq!(snapshot.percent, 100.0);
}

#[tokio::test]
async fn status_str_success_counts_as_completion() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_history(
        &server,
        "p1",
        json!({"history": {"p1": {"status": {"status_str": "success"}}}}),
    )
    .await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert!(snapshot.complete);
    assert_eq!(snapshot.percent, 100.0);
}

#[tokio::test]
async fn artifact_save_happens_exactly_once() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_history(
        &server,
        "p1",
        json!({
            "p1": {"outputs": {"9": {"images": [{"type": "output", "filename": "a.png"}]}}}
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/view"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PNG".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.register_job(&prompt_id, "cap-1", sampler_table()).await;
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path().join("output"));

    reconcile(&api, &store, &artifacts, &prompt_id).await;
    reconcile(&api, &store, &artifacts, &prompt_id).await;

    // The mock's expect(1) verifies the /view fetch ran only once.
    assert!(artifacts.exists("cap-1"));
}

#[tokio::test]
async fn saved_local_copy_is_the_last_resort_output() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    // Both polls fail; nothing resolved upstream.
    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    store.register_job(&prompt_id, "cap-1", sampler_table()).await;

    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path().join("output"));
    artifacts.persist("cap-1", b"PNG").await.unwrap();

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;

    assert_eq!(
        snapshot.output,
        Some(JobOutput::Saved {
            file_name: "cap-1.png".to_string()
        })
    );
}

#[tokio::test]
async fn preview_surfaces_only_while_incomplete() {
    let prompt_id = "p1".to_string();
    let store = JobStore::new();
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let server = MockServer::start().await;
    mount_progress(
        &server,
        json!({"progress": {"value": 2, "max": 10, "preview": "live.png"}}),
    )
    .await;
    let api = ComfyApi::new(server.uri());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert!(!snapshot.complete);
    assert_eq!(snapshot.preview.as_ref().unwrap().filename, "live.png");
    assert_eq!(snapshot.percent, 20.0);

    // Once complete, the preview is withheld.
    store.record_socket_progress(&prompt_id, 100.0, true).await;
    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert!(snapshot.complete);
    assert!(snapshot.preview.is_none());
}

#[tokio::test]
async fn malformed_numeric_percent_is_clamped() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    mount_progress(&server, json!(250)).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert_eq!(snapshot.percent, 100.0);
}

#[tokio::test]
async fn negative_polled_percent_is_clamped_to_zero() {
    let server = MockServer::start().await;
    let prompt_id = "p1".to_string();

    // -40 <= 1 reads as a fraction, scales negative, then clamps to 0.
    mount_progress(&server, json!(-40)).await;

    let api = ComfyApi::new(server.uri());
    let store = JobStore::new();
    let tmp = tempfile::tempdir().unwrap();
    let artifacts = ArtifactStore::new(tmp.path());

    let snapshot = reconcile(&api, &store, &artifacts, &prompt_id).await;
    assert_eq!(snapshot.percent, 0.0);
}
