//! Bitbucket Cloud webhook payloads, keyed by the `X-Event-Key` header.

use serde_json::Value;

use super::{
    format_duration, newest_first, normalize_status, truncate, Fields, RawCommit,
    MAX_TEXT_LENGTH,
};
use crate::error::PipelineError;
use crate::ingest::{DetailItem, EventEnvelope, EventKind, Fact, Platform};

const PROJECT_PATHS: &[&[&str]] = &[&["repository", "full_name"], &["repository", "name"]];

const ACTOR_PATHS: &[&[&str]] = &[
    &["actor", "display_name"],
    &["actor", "nickname"],
    &["actor", "username"],
];

/// Bitbucket event families understood by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
enum BitbucketEvent {
    Push,
    /// Carries the key suffix, e.g. "fulfilled"
    PullRequest(String),
    /// Commit status or pipeline state change
    BuildStatus,
}

impl BitbucketEvent {
    fn from_key(key: &str) -> Option<Self> {
        if key == "repo:push" {
            return Some(BitbucketEvent::Push);
        }
        if let Some(action) = key.strip_prefix("pullrequest:") {
            return Some(BitbucketEvent::PullRequest(action.to_string()));
        }
        if key.starts_with("repo:commit_status_") || key.starts_with("pipeline:") {
            return Some(BitbucketEvent::BuildStatus);
        }
        None
    }
}

/// Maps a `pullrequest:<suffix>` key onto a past-tense action
fn pull_request_action(suffix: &str) -> String {
    match suffix {
        "created" => "opened",
        "fulfilled" => "merged",
        "rejected" => "declined",
        "changes_request_created" => "changes_requested",
        "comment_created" => "commented",
        other => other,
    }
    .to_string()
}

pub fn parse(hint: &str, body: Value) -> Result<EventEnvelope, PipelineError> {
    let event = BitbucketEvent::from_key(hint).ok_or_else(|| PipelineError::UnsupportedEventType {
        platform: Platform::Bitbucket,
        event: hint.to_string(),
    })?;
    let fields = Fields(&body);

    let project = fields.require(PROJECT_PATHS, "repository.full_name")?;
    let author = fields.require(ACTOR_PATHS, "actor.display_name")?;

    let kind = match &event {
        BitbucketEvent::Push => {
            let is_tag = fields
                .array(&["push", "changes"])
                .first()
                .map(Fields)
                .and_then(|change| {
                    change
                        .first(&[&["new", "type"], &["old", "type"]])
                        .map(|t| t == "tag")
                })
                .unwrap_or(false);
            if is_tag {
                EventKind::TagPush
            } else {
                EventKind::Push
            }
        }
        BitbucketEvent::PullRequest(_) => EventKind::MergeRequest,
        BitbucketEvent::BuildStatus => EventKind::Pipeline,
    };

    let mut envelope = EventEnvelope {
        platform: Platform::Bitbucket,
        event_type: kind,
        project,
        author,
        branch: None,
        summary: String::new(),
        details: Vec::new(),
        total_details: 0,
        url: fields.string(&["repository", "links", "html", "href"]),
        state: None,
        facts: Vec::new(),
        raw: Value::Null,
    };

    match event {
        BitbucketEvent::Push => push(fields, &mut envelope),
        BitbucketEvent::PullRequest(suffix) => pull_request(fields, &suffix, &mut envelope),
        BitbucketEvent::BuildStatus => build_status(fields, &mut envelope),
    }

    if envelope.summary.is_empty() {
        envelope.summary = format!("{} in {}", kind.title(), envelope.project);
    }
    envelope.raw = body;
    Ok(envelope)
}

fn commit_item(commit: Fields<'_>) -> RawCommit {
    RawCommit::new(
        DetailItem {
            id: commit.string(&["hash"]).unwrap_or_default(),
            message: commit.string(&["message"]).unwrap_or_default(),
            author: commit
                .first(&[&["author", "user", "display_name"], &["author", "raw"]])
                .map(str::to_string),
            url: commit.string(&["links", "html", "href"]),
        },
        commit.str(&["date"]),
    )
}

fn push(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let changes = fields.array(&["push", "changes"]);
    let first = changes.first().map(Fields);

    let reference = first.and_then(|c| c.first(&[&["new", "name"], &["old", "name"]]));
    let deleted = first.is_some_and(|c| !c.at(&["new"]).is_present() && c.at(&["old"]).is_present());

    // Bitbucket already lists commits newest first
    let commits: Vec<RawCommit> = changes
        .iter()
        .flat_map(|change| Fields(change).array(&["commits"]).iter())
        .map(|c| commit_item(Fields(c)))
        .collect();
    envelope.details = newest_first(commits, false);
    envelope.total_details = envelope.details.len();

    let truncated = changes
        .iter()
        .any(|change| Fields(change).bool(&["truncated"]).unwrap_or(false));

    let noun = if envelope.event_type == EventKind::TagPush {
        "Tag"
    } else {
        "Branch"
    };
    envelope.summary = match envelope.details.first() {
        Some(latest) if envelope.event_type == EventKind::Push => latest.title().to_string(),
        _ if deleted => {
            envelope.state = Some("deleted".to_string());
            format!("{} {} deleted", noun, reference.unwrap_or("?"))
        }
        _ if envelope.event_type == EventKind::TagPush => {
            envelope.state = Some("created".to_string());
            format!("Tag {} created", reference.unwrap_or("?"))
        }
        _ => format!("Pushed to {}", reference.unwrap_or("?")),
    };

    if let Some(url) = first.and_then(|c| c.string(&["links", "html", "href"])) {
        envelope.url = Some(url);
    }
    if envelope.event_type == EventKind::TagPush {
        if let Some(tag) = reference {
            envelope.facts.push(Fact::new("Tag", tag));
        }
    } else if truncated {
        // Bitbucket caps the commit list on large pushes
        envelope.total_details += 1;
    }
    envelope.branch = reference.map(str::to_string);
}

fn pull_request(fields: Fields<'_>, suffix: &str, envelope: &mut EventEnvelope) {
    let pr = fields.at(&["pullrequest"]);
    let title = pr.str(&["title"]).unwrap_or("untitled");

    envelope.summary = match pr.u64(&["id"]) {
        Some(id) => format!("#{} {}", id, title),
        None => title.to_string(),
    };
    envelope.state = Some(pull_request_action(suffix));
    envelope.url = pr
        .string(&["links", "html", "href"])
        .or(envelope.url.take());
    envelope.branch = pr.string(&["source", "branch", "name"]);

    if let (Some(source), Some(target)) = (
        pr.str(&["source", "branch", "name"]),
        pr.str(&["destination", "branch", "name"]),
    ) {
        envelope.facts.push(Fact::new("Merge", format!("{} → {}", source, target)));
    }

    let comment = fields.at(&["comment"]);
    if let Some(text) = comment.str(&["content", "raw"]) {
        envelope
            .facts
            .push(Fact::new("Comment", truncate(text, MAX_TEXT_LENGTH)));
        if let Some(url) = comment.string(&["links", "html", "href"]) {
            envelope.url = Some(url);
        }
    } else if let Some(description) = pr.str(&["description"]) {
        envelope
            .facts
            .push(Fact::new("Description", truncate(description, MAX_TEXT_LENGTH)));
    }
}

fn build_status(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let pipeline = fields.at(&["pipeline"]);

    if pipeline.is_present() {
        // Bitbucket Pipelines: state.result.name holds the final outcome
        let status = pipeline
            .first(&[&["state", "result", "name"], &["state", "name"]])
            .map(normalize_status);
        envelope.summary = match (pipeline.u64(&["build_number"]), status.as_deref()) {
            (Some(n), Some(status)) => format!("Pipeline #{} {}", n, status),
            (Some(n), None) => format!("Pipeline #{}", n),
            (None, Some(status)) => format!("Pipeline {}", status),
            (None, None) => "Pipeline".to_string(),
        };
        envelope.state = status;
        envelope.branch = pipeline.string(&["target", "ref_name"]);
        envelope.url = pipeline
            .first(&[&["url"], &["links", "html", "href"]])
            .map(str::to_string)
            .or(envelope.url.take());
        if let Some(duration) = pipeline.u64(&["duration_in_seconds"]) {
            envelope.facts.push(Fact::new("Duration", format_duration(duration)));
        }
        return;
    }

    let status_obj = fields.at(&["commit_status"]);
    let status = status_obj.str(&["state"]).map(normalize_status);
    let name = status_obj
        .first(&[&["name"], &["key"]])
        .unwrap_or("Build");

    envelope.summary = match status.as_deref() {
        Some(status) => format!("{} {}", name, status),
        None => name.to_string(),
    };
    envelope.state = status;
    envelope.branch = status_obj.string(&["refname"]);
    envelope.url = status_obj.string(&["url"]).or(envelope.url.take());

    let commit = status_obj.at(&["commit"]);
    if commit.is_present() {
        envelope.details = vec![commit_item(commit).item];
        envelope.total_details = 1;
    }
}
