//! Test fixtures: webhook payloads, envelopes and destinations.

use gitrelay::config::{DispatchConfig, RetryConfig};
use gitrelay::ingest::{DetailItem, EventEnvelope, EventKind, Platform, WebhookHeaders};
use gitrelay::models::{
    Destination, DestinationConfig, DestinationEntry, DestinationFilters, DiscordConfig,
    MattermostConfig, SlackConfig, TelegramConfig,
};
use gitrelay::services::{Dispatcher, Notifier};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::{MemoryRecorder, MemoryRegistry};

// =============================================================================
// Payloads
// =============================================================================

/// GitLab push with `count` commits, oldest first as GitLab sends them
pub fn gitlab_push(count: usize) -> Value {
    let commits: Vec<Value> = (1..=count)
        .map(|n| {
            json!({
                "id": format!("{:0>40}", n),
                "message": format!("Commit number {}", n),
                "timestamp": format!("2025-01-10T{:02}:00:00+00:00", n % 24),
                "url": format!("https://gitlab.example.com/group/app/-/commit/{}", n),
                "author": {"name": "Jane Doe", "email": "jane@example.com"}
            })
        })
        .collect();

    json!({
        "object_kind": "push",
        "ref": "refs/heads/main",
        "before": "95790bf891e76fee5e1747ab589903a6a1f80f22",
        "after": format!("{:0>40}", count.max(1)),
        "user_name": "Jane Doe",
        "user_username": "jdoe",
        "total_commits_count": count,
        "project": {
            "path_with_namespace": "group/app",
            "web_url": "https://gitlab.example.com/group/app"
        },
        "commits": commits
    })
}

pub fn github_pull_request() -> Value {
    json!({
        "action": "opened",
        "number": 7,
        "pull_request": {
            "number": 7,
            "title": "Add widget caching",
            "body": "Caches rendered widgets.",
            "html_url": "https://github.com/octo/widgets/pull/7",
            "state": "open",
            "merged": false,
            "head": {"ref": "feature/cache"},
            "base": {"ref": "main"},
            "user": {"login": "octocat"}
        },
        "repository": {"full_name": "octo/widgets", "name": "widgets"},
        "sender": {"login": "octocat"}
    })
}

pub fn github_check_run() -> Value {
    json!({
        "action": "completed",
        "check_run": {
            "name": "ci / test",
            "status": "completed",
            "conclusion": "failure",
            "head_sha": "a1b2c3d4e5f6a7b8",
            "html_url": "https://github.com/octo/widgets/runs/42",
            "check_suite": {"head_branch": "main"}
        },
        "repository": {"full_name": "octo/widgets", "name": "widgets"},
        "sender": {"login": "octocat"}
    })
}

pub fn github_review_comment() -> Value {
    json!({
        "action": "created",
        "comment": {
            "body": "Should this be cached per user?",
            "path": "src/cache.rs",
            "html_url": "https://github.com/octo/widgets/pull/7#discussion_r1"
        },
        "pull_request": {
            "number": 7,
            "title": "Add widget caching",
            "head": {"ref": "feature/cache"}
        },
        "repository": {"full_name": "octo/widgets", "name": "widgets"},
        "sender": {"login": "reviewer"}
    })
}

pub fn bitbucket_push() -> Value {
    json!({
        "actor": {"display_name": "Ada Lovelace", "nickname": "ada"},
        "repository": {"full_name": "team/engine", "name": "engine"},
        "push": {
            "changes": [{
                "new": {"type": "branch", "name": "develop"},
                "truncated": false,
                "commits": [
                    {
                        "hash": "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678",
                        "message": "Tune the difference engine\n",
                        "author": {"raw": "Ada Lovelace <ada@example.com>"},
                        "links": {"html": {"href": "https://bitbucket.org/team/engine/commits/a1b2c3d4"}}
                    }
                ],
                "links": {"html": {"href": "https://bitbucket.org/team/engine/branch/develop"}}
            }]
        }
    })
}

pub fn gitlab_headers() -> WebhookHeaders {
    WebhookHeaders::new().with("X-Gitlab-Event", "Push Hook")
}

// =============================================================================
// Envelopes
// =============================================================================

/// Push envelope with `count` commits, newest first
pub fn push_envelope(count: usize) -> EventEnvelope {
    let details = (0..count)
        .rev()
        .map(|n| DetailItem {
            id: format!("{:0>40}", n + 1),
            message: format!("Commit number {}", n + 1),
            author: Some("Jane Doe".to_string()),
            url: Some(format!("https://gitlab.example.com/group/app/-/commit/{}", n + 1)),
        })
        .collect::<Vec<_>>();

    EventEnvelope {
        platform: Platform::Gitlab,
        event_type: EventKind::Push,
        project: "group/app".to_string(),
        author: "Jane Doe".to_string(),
        branch: Some("main".to_string()),
        summary: format!("Commit number {}", count),
        details,
        total_details: count,
        url: Some("https://gitlab.example.com/group/app".to_string()),
        state: None,
        facts: Vec::new(),
        raw: Value::Null,
    }
}

// =============================================================================
// Destinations
// =============================================================================

pub fn mattermost(id: i32, webhook_url: String) -> Destination {
    Destination {
        id,
        name: format!("mattermost-{}", id),
        config: DestinationConfig::Mattermost(MattermostConfig {
            webhook_url,
            channel: None,
            username: None,
            icon_url: None,
        }),
        filters: DestinationFilters::default(),
    }
}

pub fn discord(id: i32, webhook_url: String) -> Destination {
    Destination {
        id,
        name: format!("discord-{}", id),
        config: DestinationConfig::Discord(DiscordConfig {
            webhook_url,
            username: None,
            avatar_url: None,
        }),
        filters: DestinationFilters::default(),
    }
}

/// Slack destination pointed at an arbitrary URL, bypassing the host check
/// applied when rows are loaded
pub fn slack(id: i32, webhook_url: String) -> Destination {
    Destination {
        id,
        name: format!("slack-{}", id),
        config: DestinationConfig::Slack(SlackConfig {
            webhook_url,
            channel: None,
            username: None,
            icon_emoji: None,
        }),
        filters: DestinationFilters::default(),
    }
}

pub fn telegram(id: i32, api_url: String) -> Destination {
    Destination {
        id,
        name: format!("telegram-{}", id),
        config: DestinationConfig::Telegram(TelegramConfig {
            bot_token: "123456:test-token".to_string(),
            chat_id: "-1001".to_string(),
            thread_id: None,
            api_url: Some(api_url),
        }),
        filters: DestinationFilters::default(),
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
    }
}

pub fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        http_timeout: Duration::from_secs(2),
        delivery_timeout: Duration::from_secs(5),
        ..DispatchConfig::default()
    }
}

/// Dispatcher over in-memory collaborators
pub fn dispatcher(
    entries: Vec<DestinationEntry>,
    retry: RetryConfig,
) -> (Dispatcher, Arc<MemoryRecorder>) {
    dispatcher_with(MemoryRegistry::new(entries), retry, dispatch_config())
}

pub fn dispatcher_with(
    registry: Arc<MemoryRegistry>,
    retry: RetryConfig,
    config: DispatchConfig,
) -> (Dispatcher, Arc<MemoryRecorder>) {
    let recorder = MemoryRecorder::new();
    let notifier = Notifier::new(&config, retry).expect("Failed to build HTTP client");
    let dispatcher = Dispatcher::new(registry, recorder.clone(), notifier, config);
    (dispatcher, recorder)
}
