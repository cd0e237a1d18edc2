//! Integration tests for the dispatch pipeline
//!
//! Drives `Dispatcher` end to end with in-memory storage and stub chat
//! servers.

use std::time::Duration;

use gitrelay::config::{DispatchConfig, RetryConfig};
use gitrelay::ingest::{signature, EventKind, Platform, WebhookHeaders};
use gitrelay::models::{
    DeliveryStatus, DestinationEntry, DestinationFilters, DispatchStage, EnvelopeStatus,
    InvalidConfig,
};
use gitrelay::services::InboundRequest;

use crate::common::chat_stub::StubReply;
use crate::common::fixtures::{
    discord, dispatch_config, dispatcher, dispatcher_with, gitlab_headers, gitlab_push,
    mattermost,
};
use crate::common::{ChatStub, MemoryRegistry};

fn gitlab_request(commits: usize) -> InboundRequest {
    InboundRequest::new(
        gitlab_headers(),
        serde_json::to_vec(&gitlab_push(commits)).unwrap(),
    )
}

// =============================================================================
// Fan-out
// =============================================================================

#[actix_web::test]
async fn test_failing_destination_is_isolated() {
    let ok_a = ChatStub::start(StubReply::new(200, "ok"));
    let ok_b = ChatStub::start(StubReply::new(204, ""));
    let broken = ChatStub::start(StubReply::new(500, "upstream exploded"));

    let (dispatcher, recorder) = dispatcher(
        vec![
            mattermost(1, ok_a.url("/hooks/a")).into(),
            mattermost(2, broken.url("/hooks/b")).into(),
            discord(3, ok_b.url("/api/webhooks/1/x")).into(),
        ],
        RetryConfig::no_retry(),
    );

    let summary = dispatcher.handle(gitlab_request(2)).await;

    assert_eq!(summary.envelope_status, EnvelopeStatus::Parsed);
    assert_eq!(summary.stage, DispatchStage::Completed);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);

    let ids: Vec<Option<i32>> = summary
        .per_destination
        .iter()
        .map(|r| r.destination_id)
        .collect();
    assert_eq!(ids, vec![Some(1), Some(2), Some(3)]);

    let failed = &summary.per_destination[1];
    assert_eq!(failed.status, DeliveryStatus::Failed);
    assert_eq!(failed.http_status, Some(500));
    assert!(failed
        .error_detail
        .as_deref()
        .unwrap()
        .contains("upstream exploded"));

    assert_eq!(ok_a.hits(), 1);
    assert_eq!(ok_b.hits(), 1);
    assert_eq!(recorder.summaries().len(), 1);
}

#[actix_web::test]
async fn test_zero_destinations_still_recorded() {
    let (dispatcher, recorder) = dispatcher(Vec::new(), RetryConfig::no_retry());

    let summary = dispatcher.handle(gitlab_request(1)).await;

    assert_eq!(summary.envelope_status, EnvelopeStatus::Parsed);
    assert!(summary.per_destination.is_empty());

    let recorded = recorder.summaries();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].metadata.platform, Some(Platform::Gitlab));
    assert_eq!(recorded[0].metadata.project.as_deref(), Some("group/app"));
}

#[actix_web::test]
async fn test_filtered_destination_is_skipped() {
    let stub = ChatStub::start(StubReply::new(200, "ok"));
    let mut merges_only = mattermost(1, stub.url("/hooks/a"));
    merges_only.filters = DestinationFilters {
        event_types: vec![EventKind::MergeRequest],
        ..Default::default()
    };
    let everything = mattermost(2, stub.url("/hooks/b"));

    let (dispatcher, _recorder) = dispatcher(
        vec![merges_only.into(), everything.into()],
        RetryConfig::no_retry(),
    );
    let summary = dispatcher.handle(gitlab_request(1)).await;

    assert_eq!(summary.per_destination.len(), 1);
    assert_eq!(summary.per_destination[0].destination_id, Some(2));
    assert_eq!(stub.hits(), 1);
    assert_eq!(stub.received()[0].0, "/hooks/b");
}

#[actix_web::test]
async fn test_invalid_destination_reports_config_failure() {
    let stub = ChatStub::start(StubReply::new(200, "ok"));
    let entries = vec![
        DestinationEntry::Invalid {
            id: 9,
            name: "broken slack".to_string(),
            error: InvalidConfig::new("Slack webhook URL must use HTTPS"),
        },
        mattermost(10, stub.url("/hooks/a")).into(),
    ];

    let (dispatcher, _recorder) = dispatcher(entries, RetryConfig::no_retry());
    let summary = dispatcher.handle(gitlab_request(1)).await;

    assert_eq!(summary.per_destination.len(), 2);
    let invalid = &summary.per_destination[0];
    assert_eq!(invalid.destination_id, Some(9));
    assert_eq!(invalid.attempts, 0);
    assert!(invalid
        .error_detail
        .as_deref()
        .unwrap()
        .starts_with("Config error"));
    assert!(summary.per_destination[1].is_success());
}

#[actix_web::test]
async fn test_slow_destination_times_out_alone() {
    let slow = ChatStub::start(StubReply::new(200, "ok").delayed(Duration::from_secs(3)));
    let fast = ChatStub::start(StubReply::new(200, "ok"));

    let config = DispatchConfig {
        http_timeout: Duration::from_secs(10),
        delivery_timeout: Duration::from_millis(300),
        ..dispatch_config()
    };
    let (dispatcher, _recorder) = dispatcher_with(
        MemoryRegistry::new(vec![
            mattermost(1, slow.url("/hooks/slow")).into(),
            mattermost(2, fast.url("/hooks/fast")).into(),
        ]),
        RetryConfig::no_retry(),
        config,
    );

    let summary = dispatcher.handle(gitlab_request(1)).await;

    let timed_out = &summary.per_destination[0];
    assert_eq!(timed_out.status, DeliveryStatus::Failed);
    assert_eq!(timed_out.attempts, 1);
    assert!(timed_out.error_detail.as_deref().unwrap().contains("timed out"));
    assert!(summary.per_destination[1].is_success());
}

#[actix_web::test]
async fn test_registry_failure_is_recorded() {
    let (dispatcher, recorder) = dispatcher_with(
        MemoryRegistry::unavailable(),
        RetryConfig::no_retry(),
        dispatch_config(),
    );

    let summary = dispatcher.handle(gitlab_request(1)).await;

    assert_eq!(summary.envelope_status, EnvelopeStatus::Parsed);
    assert_eq!(summary.per_destination.len(), 1);
    assert_eq!(summary.per_destination[0].destination_id, None);
    assert!(summary.per_destination[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("registry unavailable"));
    assert_eq!(recorder.summaries().len(), 1);
}

// =============================================================================
// Rejections
// =============================================================================

#[actix_web::test]
async fn test_missing_platform_header_is_rejected_and_recorded() {
    let stub = ChatStub::start(StubReply::new(200, "ok"));
    let (dispatcher, recorder) = dispatcher(
        vec![mattermost(1, stub.url("/hooks/a")).into()],
        RetryConfig::no_retry(),
    );

    let request = InboundRequest::new(
        WebhookHeaders::new().with("Content-Type", "application/json"),
        serde_json::to_vec(&gitlab_push(1)).unwrap(),
    );
    let summary = dispatcher.handle(request).await;

    assert_eq!(summary.envelope_status, EnvelopeStatus::Rejected);
    assert_eq!(summary.stage, DispatchStage::Rejected);
    assert!(summary.rejection.as_deref().unwrap().starts_with("UnknownPlatform"));
    assert_eq!(summary.metadata.platform, None);
    assert_eq!(summary.per_destination.len(), 1);
    assert_eq!(summary.per_destination[0].destination_id, None);

    assert_eq!(stub.hits(), 0);
    assert_eq!(recorder.summaries().len(), 1);
}

#[actix_web::test]
async fn test_malformed_body_keeps_detected_metadata() {
    let (dispatcher, recorder) = dispatcher(Vec::new(), RetryConfig::no_retry());

    let request = InboundRequest::new(gitlab_headers(), &b"{\"object_kind\": "[..]);
    let summary = dispatcher.handle(request).await;

    assert_eq!(summary.envelope_status, EnvelopeStatus::Rejected);
    assert_eq!(summary.metadata.platform, Some(Platform::Gitlab));
    assert_eq!(summary.metadata.event_type.as_deref(), Some("Push Hook"));
    assert!(summary.rejection.as_deref().unwrap().starts_with("MalformedPayload"));
    assert_eq!(recorder.summaries().len(), 1);
}

#[actix_web::test]
async fn test_signature_required_when_secret_configured() {
    let (dispatcher, recorder) = dispatcher(Vec::new(), RetryConfig::no_retry());
    let dispatcher = dispatcher.with_webhook_secret(Some("topsecret".to_string()));

    let body = serde_json::to_vec(&crate::common::fixtures::github_pull_request()).unwrap();

    let unsigned = InboundRequest::new(
        WebhookHeaders::new().with("X-GitHub-Event", "pull_request"),
        body.clone(),
    );
    let summary = dispatcher.handle(unsigned).await;
    assert!(summary.rejection.as_deref().unwrap().starts_with("InvalidSignature"));

    let signed = InboundRequest::new(
        WebhookHeaders::new()
            .with("X-GitHub-Event", "pull_request")
            .with("X-Hub-Signature-256", signature::sign("topsecret", &body)),
        body,
    );
    let summary = dispatcher.handle(signed).await;
    assert_eq!(summary.envelope_status, EnvelopeStatus::Parsed);

    assert_eq!(recorder.summaries().len(), 2);
}

// =============================================================================
// Self-test
// =============================================================================

#[actix_web::test]
async fn test_self_test_twice_records_nothing() {
    let stub = ChatStub::start(StubReply::new(200, "ok"));
    let (dispatcher, recorder) = dispatcher(
        vec![mattermost(4, stub.url("/hooks/a")).into()],
        RetryConfig::no_retry(),
    );

    for _ in 0..2 {
        let result = dispatcher.test_destination(4).await.unwrap();
        assert_eq!(result.status, DeliveryStatus::Success);
        assert_eq!(result.destination_id, Some(4));
    }

    assert_eq!(stub.hits(), 2);
    assert!(recorder.summaries().is_empty());
}

#[actix_web::test]
async fn test_self_test_unknown_destination() {
    let (dispatcher, _recorder) = dispatcher(Vec::new(), RetryConfig::no_retry());
    let result = dispatcher.test_destination(404).await;

    assert!(matches!(result, Err(gitrelay::error::AppError::NotFound(_))));
}
