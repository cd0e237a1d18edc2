//! GitLab webhook payloads.
//!
//! GitLab sends `X-Gitlab-Event: <Name> Hook` and repeats the kind in the
//! body as `object_kind`; the body wins when both are present.

use serde_json::Value;

use super::{
    format_duration, is_null_sha, newest_first, normalize_status, short_ref, truncate, Fields,
    RawCommit, MAX_TEXT_LENGTH,
};
use crate::error::PipelineError;
use crate::ingest::{DetailItem, EventEnvelope, EventKind, Fact, Platform};

const PROJECT_PATHS: &[&[&str]] = &[
    &["project", "path_with_namespace"],
    &["project", "name"],
    &["repository", "name"],
];

const USER_PATHS: &[&[&str]] = &[
    &["user", "name"],
    &["user", "username"],
    &["user_name"],
    &["user_username"],
];

/// Maps the `X-Gitlab-Event` header value to an event kind
fn kind_from_header(hint: &str) -> Option<EventKind> {
    match hint {
        "Push Hook" => Some(EventKind::Push),
        "Tag Push Hook" => Some(EventKind::TagPush),
        "Merge Request Hook" => Some(EventKind::MergeRequest),
        "Issue Hook" | "Confidential Issue Hook" => Some(EventKind::Issue),
        "Note Hook" | "Confidential Note Hook" => Some(EventKind::Note),
        "Pipeline Hook" => Some(EventKind::Pipeline),
        "Wiki Page Hook" => Some(EventKind::WikiPage),
        _ => None,
    }
}

/// Maps the body's `object_kind` to an event kind
fn kind_from_object(object_kind: &str) -> Option<EventKind> {
    match object_kind {
        "push" => Some(EventKind::Push),
        "tag_push" => Some(EventKind::TagPush),
        "merge_request" => Some(EventKind::MergeRequest),
        "issue" => Some(EventKind::Issue),
        "note" => Some(EventKind::Note),
        "pipeline" => Some(EventKind::Pipeline),
        "wiki_page" => Some(EventKind::WikiPage),
        _ => None,
    }
}

fn resolve_kind(hint: &str, body: &Value) -> Result<EventKind, PipelineError> {
    let unsupported = |event: &str| PipelineError::UnsupportedEventType {
        platform: Platform::Gitlab,
        event: event.to_string(),
    };

    match Fields(body).str(&["object_kind"]) {
        Some(object_kind) => kind_from_object(object_kind).ok_or_else(|| unsupported(object_kind)),
        None => kind_from_header(hint).ok_or_else(|| unsupported(hint)),
    }
}

pub fn parse(hint: &str, body: Value) -> Result<EventEnvelope, PipelineError> {
    let kind = resolve_kind(hint, &body)?;
    let fields = Fields(&body);

    let project = fields.require(PROJECT_PATHS, "project.path_with_namespace")?;
    let author = fields.require(USER_PATHS, "user name")?;

    let mut envelope = EventEnvelope {
        platform: Platform::Gitlab,
        event_type: kind,
        project,
        author,
        branch: None,
        summary: String::new(),
        details: Vec::new(),
        total_details: 0,
        url: fields.string(&["project", "web_url"]),
        state: None,
        facts: Vec::new(),
        raw: Value::Null,
    };

    match kind {
        EventKind::Push => push(fields, &mut envelope),
        EventKind::TagPush => tag_push(fields, &mut envelope),
        EventKind::MergeRequest => merge_request(fields, &mut envelope),
        EventKind::Issue => issue(fields, &mut envelope),
        EventKind::Note => note(fields, &mut envelope),
        EventKind::Pipeline => pipeline(fields, &mut envelope),
        EventKind::WikiPage => wiki_page(fields, &mut envelope),
        EventKind::Release => {}
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
            id: commit.string(&["id"]).unwrap_or_default(),
            message: commit.string(&["message"]).unwrap_or_default(),
            author: commit
                .first(&[&["author", "name"], &["author", "email"]])
                .map(str::to_string),
            url: commit.string(&["url"]),
        },
        commit.str(&["timestamp"]),
    )
}

fn push(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let branch = fields.str(&["ref"]).map(short_ref).map(str::to_string);

    let commits: Vec<RawCommit> = fields
        .array(&["commits"])
        .iter()
        .map(|c| commit_item(Fields(c)))
        .collect();
    // GitLab lists push commits oldest first
    envelope.details = newest_first(commits, true);
    envelope.total_details = fields
        .u64(&["total_commits_count"])
        .map(|n| n as usize)
        .unwrap_or(envelope.details.len());

    envelope.summary = match envelope.details.first() {
        Some(latest) => latest.title().to_string(),
        None if is_null_sha(fields.str(&["after"])) => {
            envelope.state = Some("deleted".to_string());
            format!("Branch {} deleted", branch.as_deref().unwrap_or("?"))
        }
        None => format!("Pushed to {}", branch.as_deref().unwrap_or("?")),
    };

    if let Some(latest_url) = envelope.details.first().and_then(|c| c.url.clone()) {
        envelope.url = Some(latest_url);
    }
    envelope.branch = branch;
}

fn tag_push(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let tag = fields.str(&["ref"]).map(short_ref).unwrap_or("?").to_string();

    if is_null_sha(fields.str(&["after"])) {
        envelope.summary = format!("Tag {} deleted", tag);
        envelope.state = Some("deleted".to_string());
    } else {
        envelope.summary = format!("Tag {} created", tag);
        envelope.state = Some("created".to_string());
        if let Some(web_url) = fields.str(&["project", "web_url"]) {
            envelope.url = Some(format!("{}/-/tags/{}", web_url, tag));
        }
    }

    envelope.facts.push(Fact::new("Tag", tag.clone()));
    envelope.branch = Some(tag);
}

/// GitLab reports present-tense actions ("open", "merge"); normalize to past tense
fn action_word(action: &str) -> String {
    match action {
        "open" => "opened",
        "close" => "closed",
        "reopen" => "reopened",
        "merge" => "merged",
        "update" => "updated",
        "approve" => "approved",
        "unapprove" => "unapproved",
        other => other,
    }
    .to_string()
}

fn merge_request(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let mr = fields.at(&["object_attributes"]);
    let title = mr.str(&["title"]).unwrap_or("untitled");

    envelope.summary = match mr.u64(&["iid"]) {
        Some(iid) => format!("!{} {}", iid, title),
        None => title.to_string(),
    };
    envelope.state = mr
        .str(&["action"])
        .map(action_word)
        .or_else(|| mr.string(&["state"]));
    envelope.url = mr.string(&["url"]).or(envelope.url.take());
    envelope.branch = mr.string(&["source_branch"]);

    if let (Some(source), Some(target)) = (mr.str(&["source_branch"]), mr.str(&["target_branch"])) {
        envelope.facts.push(Fact::new("Merge", format!("{} → {}", source, target)));
    }
    if let Some(description) = mr.str(&["description"]) {
        envelope
            .facts
            .push(Fact::new("Description", truncate(description, MAX_TEXT_LENGTH)));
    }
}

fn issue(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let issue = fields.at(&["object_attributes"]);
    let title = issue.str(&["title"]).unwrap_or("untitled");

    envelope.summary = match issue.u64(&["iid"]) {
        Some(iid) => format!("#{} {}", iid, title),
        None => title.to_string(),
    };
    envelope.state = issue
        .str(&["action"])
        .map(action_word)
        .or_else(|| issue.string(&["state"]));
    envelope.url = issue.string(&["url"]).or(envelope.url.take());

    if let Some(description) = issue.str(&["description"]) {
        envelope
            .facts
            .push(Fact::new("Description", truncate(description, MAX_TEXT_LENGTH)));
    }
}

fn note(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let note = fields.at(&["object_attributes"]);

    envelope.summary = truncate(note.str(&["note"]).unwrap_or("(empty comment)"), MAX_TEXT_LENGTH);
    envelope.url = note.string(&["url"]).or(envelope.url.take());
    envelope.state = Some("commented".to_string());

    let target = match note.str(&["noteable_type"]) {
        Some("MergeRequest") => fields
            .at(&["merge_request"])
            .str(&["title"])
            .map(|t| format!("Merge request: {}", t)),
        Some("Issue") => fields
            .at(&["issue"])
            .str(&["title"])
            .map(|t| format!("Issue: {}", t)),
        Some("Commit") => fields
            .at(&["commit"])
            .str(&["message"])
            .map(|m| format!("Commit: {}", m.lines().next().unwrap_or(m))),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    if let Some(target) = target {
        envelope.facts.push(Fact::new("On", truncate(&target, MAX_TEXT_LENGTH)));
    }
    envelope.branch = fields.string(&["merge_request", "source_branch"]);
}

fn pipeline(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let pipeline = fields.at(&["object_attributes"]);
    let status = pipeline.str(&["status"]).map(normalize_status);

    envelope.summary = match (pipeline.u64(&["id"]), status.as_deref()) {
        (Some(id), Some(status)) => format!("Pipeline #{} {}", id, status),
        (Some(id), None) => format!("Pipeline #{}", id),
        (None, Some(status)) => format!("Pipeline {}", status),
        (None, None) => "Pipeline".to_string(),
    };
    envelope.branch = pipeline.str(&["ref"]).map(short_ref).map(str::to_string);
    envelope.url = pipeline.string(&["url"]).or_else(|| {
        let web_url = fields.str(&["project", "web_url"])?;
        let id = pipeline.u64(&["id"])?;
        Some(format!("{}/-/pipelines/{}", web_url, id))
    });
    envelope.state = status;

    if let Some(duration) = pipeline.u64(&["duration"]) {
        envelope.facts.push(Fact::new("Duration", format_duration(duration)));
    }
    let stages: Vec<&str> = pipeline
        .array(&["stages"])
        .iter()
        .filter_map(Value::as_str)
        .collect();
    if !stages.is_empty() {
        envelope.facts.push(Fact::new("Stages", stages.join(", ")));
    }

    let commit = fields.at(&["commit"]);
    if commit.is_present() {
        envelope.details = vec![commit_item(commit).item];
        envelope.total_details = 1;
    }
}

fn wiki_page(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let page = fields.at(&["object_attributes"]);
    let title = page.str(&["title"]).unwrap_or("untitled");
    let action = page.str(&["action"]).map(action_word);

    envelope.summary = match action.as_deref() {
        Some(action) => format!("Wiki page {} {}", title, action),
        None => format!("Wiki page {}", title),
    };
    envelope.state = action;
    envelope.url = page.string(&["url"]).or(envelope.url.take());
}
