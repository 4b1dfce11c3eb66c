//! Raw API shapes and the reconciled output model.
//!
//! The wire layer hands us `serde_json::Value` nodes; these types give them
//! structure. Raw types (`Raw*`, [`Collection`]) mirror the API's camelCase
//! fields and tolerate missing members. Output types ([`Entry`], [`Child`],
//! [`Container`]) are the owned forest the reconciliation engine builds;
//! nothing downstream touches raw data again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login substituted for deleted accounts, which the API reports as a null
/// author. Matches the placeholder account GitHub itself shows.
pub const GHOST_LOGIN: &str = "ghost";

/// What kind of actor wrote something.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorKind {
    User,
    Bot,
    Organization,
    Mannequin,
    #[serde(other)]
    Other,
}

/// An author as returned by the API's `author { __typename login }` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(rename = "__typename")]
    pub kind: AuthorKind,
}

impl Author {
    /// The synthetic author standing in for a deleted account.
    #[must_use]
    pub fn ghost() -> Self {
        Self {
            login: GHOST_LOGIN.to_owned(),
            kind: AuthorKind::User,
        }
    }
}

/// Replace a deleted-account null author with the ghost sentinel so the node
/// participates in filtering as a normal, non-ignorable author.
#[must_use]
pub fn normalize_author(author: Option<Author>) -> Author {
    author.unwrap_or_else(Author::ghost)
}

/// A paginated sub-collection: the authoritative count plus however many
/// nodes the enclosing query managed to carry.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Collection<T> {
    pub total_count: u32,
    pub nodes: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            total_count: 0,
            nodes: Vec::new(),
        }
    }
}

impl<T> Collection<T> {
    /// True when the upstream count exceeds what was carried inline, meaning
    /// a supplemental paginated fetch is needed.
    #[must_use]
    pub fn under_filled(&self) -> bool {
        self.total_count as usize > self.nodes.len()
    }
}

/// Reference to the review an inline comment belongs to.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewRef {
    pub id: String,
}

/// A raw comment: standalone, inline, or a thread reply.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    pub id: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pull_request_review: Option<ReviewRef>,
}

/// Review verdicts. Anything other than `Commented` is surfaced even when
/// the review carries no text and no comments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    Pending,
    Commented,
    Approved,
    ChangesRequested,
    Dismissed,
    #[serde(other)]
    Other,
}

/// A raw pull-request review with its inline comments.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReview {
    pub id: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub body: String,
    pub state: ReviewState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub comments: Collection<RawComment>,
}

/// A raw review thread: an ordered reply chain that may span reviews.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawThread {
    pub id: String,
    #[serde(default)]
    pub is_resolved: bool,
    #[serde(default)]
    pub comments: Collection<RawComment>,
}

/// Tag on every top-level node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    Issue,
    PullRequest,
    Release,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRef {
    pub login: String,
}

/// The repository a node belongs to, as much of it as the query asked for.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub name_with_owner: Option<String>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
}

/// A raw issue, pull request, or release node.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(rename = "__typename")]
    pub kind: ItemKind,
    pub id: String,
    #[serde(default)]
    pub number: Option<u64>,
    /// Issues and pull requests have a title...
    #[serde(default)]
    pub title: Option<String>,
    /// ...releases have a name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<Author>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Option<Collection<RawComment>>,
    #[serde(default)]
    pub reviews: Option<Collection<RawReview>>,
    #[serde(default)]
    pub review_threads: Option<Collection<RawThread>>,
    #[serde(default)]
    pub repository: Option<RepoRef>,
}

impl RawItem {
    /// Display title regardless of node kind.
    #[must_use]
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_default()
    }
}

// ── Reconciled output ──────────────────────────────────────────────

/// A reconciled comment/review node in an entry's conversation forest.
#[derive(Debug, Clone, Serialize)]
pub struct Child {
    pub id: String,
    pub author: Author,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub url: Option<String>,
    /// Review verdict this node carries, when it is (or stands in for) a
    /// review.
    pub review_state: Option<ReviewState>,
    /// Thread resolution state, when this node represents a review thread.
    pub resolved: Option<bool>,
    /// Kept only because a descendant is interesting.
    pub boring: bool,
    pub children: Vec<Child>,
}

impl From<RawComment> for Child {
    fn from(comment: RawComment) -> Self {
        Self {
            id: comment.id,
            author: normalize_author(comment.author),
            body: comment.body,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
            url: comment.url,
            review_state: None,
            resolved: None,
            boring: false,
            children: Vec::new(),
        }
    }
}

impl Child {
    /// A review surfaced as a node of its own, tagged with its verdict.
    #[must_use]
    pub fn from_review(review: RawReview) -> Self {
        Self {
            id: review.id,
            author: normalize_author(review.author),
            body: review.body,
            created_at: review.created_at,
            updated_at: review.updated_at,
            url: review.url,
            review_state: Some(review.state),
            resolved: None,
            boring: false,
            children: Vec::new(),
        }
    }
}

/// A reconciled top-level entry with its pruned conversation forest.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    pub kind: ItemKind,
    pub id: String,
    pub number: Option<u64>,
    pub title: String,
    pub url: Option<String>,
    pub author: Author,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    /// Created within the cutoff window.
    pub reason_created: bool,
    /// Closed within the cutoff window.
    pub reason_closed: bool,
    /// Merged within the cutoff window.
    pub reason_merged: bool,
    /// Kept only because a descendant is interesting.
    pub boring: bool,
    /// For project containers: lives outside the project's home repo.
    pub other_repo: bool,
    pub children: Vec<Child>,
}

/// What a container groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    Repo,
    Project,
    Search,
}

/// A named top-level grouping of reconciled entries, in ascending
/// `updated_at` order.
#[derive(Debug, Clone, Serialize)]
pub struct Container {
    pub title: String,
    pub url: Option<String>,
    pub container_kind: ContainerKind,
    /// Label for what the entries are: "issues", "pull requests", etc.
    pub kind: String,
    pub entries: Vec<Entry>,
}
