//! Integration tests for the PostgreSQL registry and recorder

use std::sync::Arc;

use chrono::Utc;
use gitrelay::config::RetryConfig;
use gitrelay::error::PipelineError;
use gitrelay::ingest::{EventMetadata, Platform};
use gitrelay::models::{
    DeliveryResult, DestinationConfig, DestinationEntry, DestinationType, DispatchSummary,
};
use gitrelay::services::{
    DestinationRegistry, Dispatcher, EventRecorder, InboundRequest, Notifier, PgDestinationRegistry,
    PgEventRecorder,
};
use serde_json::json;
use sqlx::Row;

use crate::common::chat_stub::StubReply;
use crate::common::fixtures::{dispatch_config, gitlab_headers, gitlab_push};
use crate::common::{ChatStub, TestDb};

#[actix_web::test]
async fn test_registry_lists_active_destinations_in_order() {
    let db = TestDb::new().await;

    let first = db
        .insert_destination(
            "team chat",
            "mattermost",
            json!({"webhook_url": "https://chat.example.com/hooks/abc"}),
            Some(json!({"event_types": ["push"]})),
            true,
        )
        .await;
    db.insert_destination(
        "retired",
        "discord",
        json!({"webhook_url": "https://discord.com/api/webhooks/1/x"}),
        None,
        false,
    )
    .await;
    let telegram = db
        .insert_destination(
            "alerts",
            "telegram",
            json!({"bot_token": "123:abc", "chat_id": -100}),
            None,
            true,
        )
        .await;

    let registry = PgDestinationRegistry::new(db.pool.clone());
    let entries = registry.list_active().await.unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].id(), first);
    assert_eq!(entries[1].id(), telegram);

    let DestinationEntry::Valid(destination) = &entries[1] else {
        panic!("expected a valid telegram destination");
    };
    assert_eq!(destination.destination_type(), DestinationType::Telegram);
    let DestinationConfig::Telegram(config) = &destination.config else {
        panic!("expected telegram config");
    };
    assert_eq!(config.chat_id, "-100");
}

#[actix_web::test]
async fn test_registry_marks_invalid_config() {
    let db = TestDb::new().await;

    let id = db
        .insert_destination(
            "spoofed slack",
            "slack",
            json!({"webhook_url": "https://hooks.slack.com.evil.example/services/x"}),
            None,
            true,
        )
        .await;

    let registry = PgDestinationRegistry::new(db.pool.clone());
    let entry = registry.get(id).await.unwrap().unwrap();

    match entry {
        DestinationEntry::Invalid { error, .. } => {
            assert!(error.to_string().contains("hooks.slack.com"))
        }
        other => panic!("expected invalid entry, got {:?}", other),
    }
    assert!(registry.get(id + 1000).await.unwrap().is_none());
}

#[actix_web::test]
async fn test_recorder_writes_event_and_deliveries() {
    let db = TestDb::new().await;
    let destination_id = db
        .insert_destination(
            "team chat",
            "mattermost",
            json!({"webhook_url": "https://chat.example.com/hooks/abc"}),
            None,
            true,
        )
        .await;

    let metadata = EventMetadata {
        platform: Some(Platform::Github),
        event_type: Some("merge_request".to_string()),
        project: Some("octo/widgets".to_string()),
        author: Some("octocat".to_string()),
        branch: Some("feature/cache".to_string()),
    };
    let results = vec![
        DeliveryResult::success(Some(200), 1).with_destination(destination_id, "team chat"),
        DeliveryResult::failure(
            &gitrelay::error::DeliveryError::Failure("HTTP 500: boom".to_string()),
            Some(500),
            3,
        ),
    ];
    let summary = DispatchSummary::completed(metadata, results, Utc::now());

    PgEventRecorder::new(db.pool.clone())
        .record(&summary)
        .await
        .unwrap();

    let event = sqlx::query(
        "SELECT id, platform, envelope_status, stage, success_count, failure_count FROM webhook_events",
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();
    assert_eq!(event.get::<Option<String>, _>("platform").as_deref(), Some("github"));
    assert_eq!(event.get::<String, _>("envelope_status"), "parsed");
    assert_eq!(event.get::<String, _>("stage"), "completed");
    assert_eq!(event.get::<i32, _>("success_count"), 1);
    assert_eq!(event.get::<i32, _>("failure_count"), 1);

    let event_id: i64 = event.get("id");
    let deliveries = sqlx::query(
        "SELECT destination_id, status, http_status, attempts FROM deliveries WHERE event_id = $1 ORDER BY id",
    )
    .bind(event_id)
    .fetch_all(&db.pool)
    .await
    .unwrap();

    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].get::<Option<i32>, _>("destination_id"), Some(destination_id));
    assert_eq!(deliveries[0].get::<String, _>("status"), "success");
    assert_eq!(deliveries[1].get::<Option<i32>, _>("destination_id"), None);
    assert_eq!(deliveries[1].get::<Option<i32>, _>("http_status"), Some(500));
    assert_eq!(deliveries[1].get::<i32, _>("attempts"), 3);
}

#[actix_web::test]
async fn test_rejection_is_recorded() {
    let db = TestDb::new().await;

    let summary = DispatchSummary::rejected(
        EventMetadata::default(),
        &PipelineError::UnknownPlatform,
        Utc::now(),
    );
    PgEventRecorder::new(db.pool.clone())
        .record(&summary)
        .await
        .unwrap();

    let row = sqlx::query("SELECT envelope_status, rejection, platform FROM webhook_events")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("envelope_status"), "rejected");
    assert!(row
        .get::<Option<String>, _>("rejection")
        .unwrap()
        .starts_with("UnknownPlatform"));
    assert_eq!(row.get::<Option<String>, _>("platform"), None);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deliveries")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn test_end_to_end_with_database() {
    let db = TestDb::new().await;
    let stub = ChatStub::start(StubReply::new(200, "ok"));
    db.insert_destination(
        "team chat",
        "mattermost",
        json!({"webhook_url": stub.url("/hooks/team")}),
        None,
        true,
    )
    .await;

    let config = dispatch_config();
    let dispatcher = Dispatcher::new(
        Arc::new(PgDestinationRegistry::new(db.pool.clone())),
        Arc::new(PgEventRecorder::new(db.pool.clone())),
        Notifier::new(&config, RetryConfig::no_retry()).unwrap(),
        config,
    );

    let request = InboundRequest::new(gitlab_headers(), serde_json::to_vec(&gitlab_push(2)).unwrap());
    let summary = dispatcher.handle(request).await;
    assert_eq!(summary.succeeded(), 1);

    let delivered: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM deliveries WHERE status = 'success'")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(delivered, 1);
    assert_eq!(stub.hits(), 1);
}
