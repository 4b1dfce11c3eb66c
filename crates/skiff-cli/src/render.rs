//! Markdown rendering of finished digests.

use std::fmt::Write;

use skiff_digest::model::ReviewState;
use skiff_digest::{Child, Container, Digest, Entry, ItemKind};

/// Longest body excerpt shown on a conversation line.
const EXCERPT_CHARS: usize = 100;

/// Render a digest as a standalone markdown document.
#[must_use]
pub fn render_digest(digest: &Digest) -> String {
    let mut out = String::new();
    let title = digest.title.as_deref().unwrap_or("Activity digest");
    let _ = writeln!(out, "# {title}");
    let _ = writeln!(out);
    match digest.cutoff {
        Some(cutoff) => {
            let _ = writeln!(
                out,
                "Activity since {}, generated {}.",
                cutoff.format("%Y-%m-%d %H:%M UTC"),
                digest.generated_at.format("%Y-%m-%d %H:%M UTC"),
            );
        }
        None => {
            let _ = writeln!(
                out,
                "All activity, generated {}.",
                digest.generated_at.format("%Y-%m-%d %H:%M UTC"),
            );
        }
    }

    for container in &digest.containers {
        render_container(&mut out, container);
    }
    out
}

fn render_container(out: &mut String, container: &Container) {
    let _ = writeln!(out);
    match &container.url {
        Some(url) => {
            let _ = writeln!(out, "## [{}]({url}): {}", container.title, container.kind);
        }
        None => {
            let _ = writeln!(out, "## {}: {}", container.title, container.kind);
        }
    }
    let _ = writeln!(out);
    if container.entries.is_empty() {
        let _ = writeln!(out, "Nothing new.");
        return;
    }
    for entry in &container.entries {
        render_entry(out, entry);
    }
}

fn render_entry(out: &mut String, entry: &Entry) {
    let mut line = String::new();
    let _ = write!(line, "- ");
    let label = match entry.number {
        Some(number) => format!("#{number} {}", entry.title),
        None => entry.title.clone(),
    };
    match &entry.url {
        Some(url) => {
            let _ = write!(line, "[{label}]({url})");
        }
        None => {
            let _ = write!(line, "{label}");
        }
    }
    let _ = write!(line, " by @{}", entry.author.login);
    for tag in entry_tags(entry) {
        let _ = write!(line, " **{tag}**");
    }
    if entry.other_repo {
        let _ = write!(line, " (other repo)");
    }
    if entry.boring {
        // Kept only as context for an interesting descendant.
        let _ = write!(line, " *(context)*");
    }
    let _ = writeln!(out, "{line}");
    for child in &entry.children {
        render_child(out, child, 1);
    }
}

fn entry_tags(entry: &Entry) -> Vec<&'static str> {
    let mut tags = Vec::new();
    if entry.reason_created {
        tags.push(match entry.kind {
            ItemKind::Release => "published",
            ItemKind::Issue | ItemKind::PullRequest | ItemKind::Other => "opened",
        });
    }
    if entry.reason_merged {
        tags.push("merged");
    } else if entry.reason_closed {
        tags.push("closed");
    }
    tags
}

fn render_child(out: &mut String, child: &Child, depth: usize) {
    let mut line = String::new();
    let _ = write!(line, "{}- ", "  ".repeat(depth));
    match &child.url {
        Some(url) => {
            let _ = write!(line, "[@{}]({url})", child.author.login);
        }
        None => {
            let _ = write!(line, "@{}", child.author.login);
        }
    }
    if let Some(tag) = review_tag(child.review_state) {
        let _ = write!(line, " **{tag}**");
    }
    if child.resolved == Some(true) {
        let _ = write!(line, " (resolved)");
    }
    let body = excerpt(&child.body);
    if !body.is_empty() {
        let _ = write!(line, ": {body}");
    }
    if child.boring {
        let _ = write!(line, " *(context)*");
    }
    let _ = writeln!(out, "{line}");
    for reply in &child.children {
        render_child(out, reply, depth + 1);
    }
}

const fn review_tag(state: Option<ReviewState>) -> Option<&'static str> {
    match state {
        Some(ReviewState::Approved) => Some("approved"),
        Some(ReviewState::ChangesRequested) => Some("changes requested"),
        Some(ReviewState::Dismissed) => Some("dismissed"),
        Some(ReviewState::Pending) => Some("pending"),
        Some(ReviewState::Commented | ReviewState::Other) | None => None,
    }
}

/// First line of a body, clipped to a readable length on a char boundary.
fn excerpt(body: &str) -> String {
    let first_line = body.lines().next().unwrap_or_default().trim();
    if first_line.chars().count() <= EXCERPT_CHARS {
        return first_line.to_owned();
    }
    let clipped: String = first_line.chars().take(EXCERPT_CHARS).collect();
    format!("{clipped}\u{2026}")
}
