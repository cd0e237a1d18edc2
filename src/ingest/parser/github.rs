//! GitHub webhook payloads, keyed by the `X-GitHub-Event` header.

use serde_json::Value;

use super::{
    is_null_sha, newest_first, normalize_status, short_ref, truncate, Fields, RawCommit,
    MAX_TEXT_LENGTH,
};
use crate::error::PipelineError;
use crate::ingest::{DetailItem, EventEnvelope, EventKind, Fact, Platform};

const PROJECT_PATHS: &[&[&str]] = &[&["repository", "full_name"], &["repository", "name"]];

const AUTHOR_PATHS: &[&[&str]] = &[
    &["sender", "login"],
    &["pusher", "name"],
    &["sender", "name"],
];

/// Native GitHub events this relay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GithubEvent {
    Push,
    PullRequest,
    Issues,
    IssueComment,
    ReviewComment,
    Release,
    WorkflowRun,
    CheckRun,
    Gollum,
}

impl GithubEvent {
    fn from_header(hint: &str) -> Option<Self> {
        match hint {
            "push" => Some(GithubEvent::Push),
            "pull_request" => Some(GithubEvent::PullRequest),
            "issues" => Some(GithubEvent::Issues),
            "issue_comment" => Some(GithubEvent::IssueComment),
            "pull_request_review_comment" => Some(GithubEvent::ReviewComment),
            "release" => Some(GithubEvent::Release),
            "workflow_run" => Some(GithubEvent::WorkflowRun),
            "check_run" => Some(GithubEvent::CheckRun),
            "gollum" => Some(GithubEvent::Gollum),
            _ => None,
        }
    }
}

pub fn parse(hint: &str, body: Value) -> Result<EventEnvelope, PipelineError> {
    let event = GithubEvent::from_header(hint).ok_or_else(|| PipelineError::UnsupportedEventType {
        platform: Platform::Github,
        event: hint.to_string(),
    })?;
    let fields = Fields(&body);

    let project = fields.require(PROJECT_PATHS, "repository.full_name")?;
    let author = fields.require(AUTHOR_PATHS, "sender.login")?;

    let kind = match event {
        GithubEvent::Push => {
            let is_tag = fields
                .str(&["ref"])
                .is_some_and(|r| r.starts_with("refs/tags/"));
            if is_tag {
                EventKind::TagPush
            } else {
                EventKind::Push
            }
        }
        GithubEvent::PullRequest => EventKind::MergeRequest,
        GithubEvent::Issues => EventKind::Issue,
        GithubEvent::IssueComment | GithubEvent::ReviewComment => EventKind::Note,
        GithubEvent::Release => EventKind::Release,
        GithubEvent::WorkflowRun | GithubEvent::CheckRun => EventKind::Pipeline,
        GithubEvent::Gollum => EventKind::WikiPage,
    };

    let mut envelope = EventEnvelope {
        platform: Platform::Github,
        event_type: kind,
        project,
        author,
        branch: None,
        summary: String::new(),
        details: Vec::new(),
        total_details: 0,
        url: fields.string(&["repository", "html_url"]),
        state: None,
        facts: Vec::new(),
        raw: Value::Null,
    };

    match (event, kind) {
        (GithubEvent::Push, EventKind::TagPush) => tag_push(fields, &mut envelope),
        (GithubEvent::Push, _) => push(fields, &mut envelope),
        (GithubEvent::PullRequest, _) => pull_request(fields, &mut envelope),
        (GithubEvent::Issues, _) => issues(fields, &mut envelope),
        (GithubEvent::IssueComment, _) => issue_comment(fields, &mut envelope),
        (GithubEvent::ReviewComment, _) => review_comment(fields, &mut envelope),
        (GithubEvent::Release, _) => release(fields, &mut envelope),
        (GithubEvent::WorkflowRun, _) => workflow_run(fields, &mut envelope),
        (GithubEvent::CheckRun, _) => check_run(fields, &mut envelope),
        (GithubEvent::Gollum, _) => gollum(fields, &mut envelope),
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
                .first(&[&["author", "name"], &["author", "username"]])
                .map(str::to_string),
            url: commit.string(&["url"]),
        },
        commit.str(&["timestamp"]),
    )
}

fn push(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let branch = fields.str(&["ref"]).map(short_ref).map(str::to_string);

    let mut commits: Vec<RawCommit> = fields
        .array(&["commits"])
        .iter()
        .map(|c| commit_item(Fields(c)))
        .collect();
    if commits.is_empty() && fields.at(&["head_commit"]).is_present() {
        commits.push(commit_item(fields.at(&["head_commit"])));
    }
    // GitHub lists push commits oldest first
    envelope.details = newest_first(commits, true);
    envelope.total_details = envelope.details.len();

    let deleted = fields.bool(&["deleted"]).unwrap_or(false) || is_null_sha(fields.str(&["after"]));
    envelope.summary = match envelope.details.first() {
        Some(latest) => latest.title().to_string(),
        None if deleted => {
            envelope.state = Some("deleted".to_string());
            format!("Branch {} deleted", branch.as_deref().unwrap_or("?"))
        }
        None => format!("Pushed to {}", branch.as_deref().unwrap_or("?")),
    };

    envelope.url = fields.string(&["compare"]).or(envelope.url.take());
    if fields.bool(&["forced"]).unwrap_or(false) {
        envelope.facts.push(Fact::new("Forced", "yes"));
    }
    envelope.branch = branch;
}

fn tag_push(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let tag = fields.str(&["ref"]).map(short_ref).unwrap_or("?").to_string();
    let deleted = fields.bool(&["deleted"]).unwrap_or(false) || is_null_sha(fields.str(&["after"]));

    if deleted {
        envelope.summary = format!("Tag {} deleted", tag);
        envelope.state = Some("deleted".to_string());
    } else {
        envelope.summary = format!("Tag {} created", tag);
        envelope.state = Some("created".to_string());
        if let Some(repo_url) = fields.str(&["repository", "html_url"]) {
            envelope.url = Some(format!("{}/releases/tag/{}", repo_url, tag));
        }
    }

    envelope.facts.push(Fact::new("Tag", tag.clone()));
    envelope.branch = Some(tag);
}

fn pull_request(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let pr = fields.at(&["pull_request"]);
    let title = pr.str(&["title"]).unwrap_or("untitled");
    let number = pr.u64(&["number"]).or_else(|| fields.u64(&["number"]));

    envelope.summary = match number {
        Some(n) => format!("#{} {}", n, title),
        None => title.to_string(),
    };

    let action = fields.str(&["action"]);
    let merged = pr.bool(&["merged"]).unwrap_or(false);
    envelope.state = match action {
        Some("closed") if merged => Some("merged".to_string()),
        Some(action) => Some(action.to_string()),
        None => pr.string(&["state"]),
    };
    envelope.url = pr.string(&["html_url"]).or(envelope.url.take());
    envelope.branch = pr.string(&["head", "ref"]);

    if let (Some(head), Some(base)) = (pr.str(&["head", "ref"]), pr.str(&["base", "ref"])) {
        envelope.facts.push(Fact::new("Merge", format!("{} → {}", head, base)));
    }
    if let Some(description) = pr.str(&["body"]) {
        envelope
            .facts
            .push(Fact::new("Description", truncate(description, MAX_TEXT_LENGTH)));
    }
}

fn issues(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let issue = fields.at(&["issue"]);
    let title = issue.str(&["title"]).unwrap_or("untitled");

    envelope.summary = match issue.u64(&["number"]) {
        Some(n) => format!("#{} {}", n, title),
        None => title.to_string(),
    };
    envelope.state = fields.string(&["action"]).or_else(|| issue.string(&["state"]));
    envelope.url = issue.string(&["html_url"]).or(envelope.url.take());

    if let Some(description) = issue.str(&["body"]) {
        envelope
            .facts
            .push(Fact::new("Description", truncate(description, MAX_TEXT_LENGTH)));
    }
}

fn issue_comment(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let comment = fields.at(&["comment"]);
    let issue = fields.at(&["issue"]);

    envelope.summary = truncate(comment.str(&["body"]).unwrap_or("(empty comment)"), MAX_TEXT_LENGTH);
    envelope.url = comment.string(&["html_url"]).or(envelope.url.take());
    envelope.state = Some("commented".to_string());

    // Comments on pull requests arrive as issue comments
    let target = if issue.at(&["pull_request"]).is_present() {
        "Pull request"
    } else {
        "Issue"
    };
    let label = match (issue.u64(&["number"]), issue.str(&["title"])) {
        (Some(n), Some(title)) => format!("{} #{}: {}", target, n, title),
        (Some(n), None) => format!("{} #{}", target, n),
        (None, Some(title)) => format!("{}: {}", target, title),
        (None, None) => target.to_string(),
    };
    envelope.facts.push(Fact::new("On", truncate(&label, MAX_TEXT_LENGTH)));
}

/// Inline comment on a pull request diff
fn review_comment(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let comment = fields.at(&["comment"]);
    let pr = fields.at(&["pull_request"]);

    envelope.summary = truncate(comment.str(&["body"]).unwrap_or("(empty comment)"), MAX_TEXT_LENGTH);
    envelope.url = comment.string(&["html_url"]).or(envelope.url.take());
    envelope.state = Some("commented".to_string());
    envelope.branch = pr.string(&["head", "ref"]);

    let label = match (pr.u64(&["number"]), pr.str(&["title"])) {
        (Some(n), Some(title)) => format!("Pull request #{}: {}", n, title),
        (Some(n), None) => format!("Pull request #{}", n),
        (None, Some(title)) => format!("Pull request: {}", title),
        (None, None) => "Pull request".to_string(),
    };
    envelope.facts.push(Fact::new("On", truncate(&label, MAX_TEXT_LENGTH)));
    if let Some(path) = comment.str(&["path"]) {
        envelope.facts.push(Fact::new("File", path));
    }
}

fn release(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let release = fields.at(&["release"]);
    let tag = release.str(&["tag_name"]);
    let name = release.first(&[&["name"], &["tag_name"]]).unwrap_or("untitled");

    envelope.summary = format!("Release {}", name);
    envelope.state = fields.string(&["action"]);
    envelope.url = release.string(&["html_url"]).or(envelope.url.take());

    if let Some(tag) = tag {
        envelope.facts.push(Fact::new("Tag", tag));
    }
    if release.bool(&["prerelease"]).unwrap_or(false) {
        envelope.facts.push(Fact::new("Pre-release", "yes"));
    }
    if let Some(notes) = release.str(&["body"]) {
        envelope
            .facts
            .push(Fact::new("Notes", truncate(notes, MAX_TEXT_LENGTH)));
    }
}

fn workflow_run(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let run = fields.at(&["workflow_run"]);
    let name = run
        .first(&[&["name"], &["display_title"]])
        .or_else(|| fields.str(&["workflow", "name"]))
        .unwrap_or("Workflow");
    // Conclusion is only set once the run has completed
    let status = run
        .first(&[&["conclusion"], &["status"]])
        .map(normalize_status);

    envelope.summary = match (run.u64(&["run_number"]), status.as_deref()) {
        (Some(n), Some(status)) => format!("{} #{} {}", name, n, status),
        (Some(n), None) => format!("{} #{}", name, n),
        (None, Some(status)) => format!("{} {}", name, status),
        (None, None) => name.to_string(),
    };
    envelope.state = status;
    envelope.branch = run.string(&["head_branch"]);
    envelope.url = run.string(&["html_url"]).or(envelope.url.take());

    if let Some(trigger) = run.str(&["event"]) {
        envelope.facts.push(Fact::new("Trigger", trigger));
    }

    let head = run.at(&["head_commit"]);
    if head.is_present() {
        envelope.details = vec![commit_item(head).item];
        envelope.total_details = 1;
    }
}

fn check_run(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let check = fields.at(&["check_run"]);
    let name = check.str(&["name"]).unwrap_or("Check");
    let status = check
        .first(&[&["conclusion"], &["status"]])
        .map(normalize_status);

    envelope.summary = match status.as_deref() {
        Some(status) => format!("{} {}", name, status),
        None => name.to_string(),
    };
    envelope.state = status;
    envelope.branch = check.string(&["check_suite", "head_branch"]);
    envelope.url = check
        .first(&[&["html_url"], &["details_url"]])
        .map(str::to_string)
        .or(envelope.url.take());

    if let Some(sha) = check.str(&["head_sha"]) {
        envelope.facts.push(Fact::new("Commit", sha.chars().take(8).collect::<String>()));
    }
}

fn gollum(fields: Fields<'_>, envelope: &mut EventEnvelope) {
    let pages = fields.array(&["pages"]);

    envelope.details = pages
        .iter()
        .map(|page| {
            let page = Fields(page);
            let title = page
                .first(&[&["title"], &["page_name"]])
                .unwrap_or("untitled");
            let action = page.str(&["action"]).unwrap_or("edited");
            DetailItem {
                id: page.string(&["sha"]).unwrap_or_default(),
                message: format!("{} {}", title, action),
                author: None,
                url: page.string(&["html_url"]),
            }
        })
        .collect();
    envelope.total_details = envelope.details.len();

    if let Some(first) = pages.first().map(Fields) {
        let title = first.first(&[&["title"], &["page_name"]]).unwrap_or("untitled");
        let action = first.str(&["action"]);
        envelope.summary = match action {
            Some(action) => format!("Wiki page {} {}", title, action),
            None => format!("Wiki page {}", title),
        };
        envelope.state = action.map(str::to_string);
        envelope.url = first.string(&["html_url"]).or(envelope.url.take());
    }
}
