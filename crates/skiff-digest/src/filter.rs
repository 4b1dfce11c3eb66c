//! The interest filter and recursive pruning.
//!
//! A node is interesting iff it was updated after the cutoff, its author's
//! kind is permitted (real users always; bots only when enabled for the
//! run), and its author's login is not ignored. Pruning keeps a node when it
//! or any descendant is interesting; nodes kept only for context are marked
//! `boring`, never dropped. Every level comes out sorted ascending by
//! `updated_at`.

use chrono::{DateTime, Utc};

use crate::model::{Author, AuthorKind, Child, Entry};

/// Run-wide filtering knobs.
#[derive(Debug, Clone)]
pub struct FilterOptions {
    /// Activity at or before this instant is not interesting.
    pub cutoff: DateTime<Utc>,
    /// Logins whose activity never counts as interesting.
    pub ignore_users: Vec<String>,
    /// Whether automation accounts count as interesting authors.
    pub include_bots: bool,
}

impl FilterOptions {
    /// Whether this author's activity can count as interesting at all.
    #[must_use]
    pub fn author_allowed(&self, author: &Author) -> bool {
        let kind_ok = match author.kind {
            AuthorKind::User => true,
            AuthorKind::Bot => self.include_bots,
            _ => false,
        };
        kind_ok && !self.ignore_users.iter().any(|login| login == &author.login)
    }

    /// The interest predicate.
    #[must_use]
    pub fn interesting(&self, updated_at: DateTime<Utc>, author: &Author) -> bool {
        updated_at > self.cutoff && self.author_allowed(author)
    }
}

/// Recursively prune a conversation forest. Children are pruned first; a
/// node survives when it is interesting or kept any child.
#[must_use]
pub fn prune_children(children: Vec<Child>, opts: &FilterOptions) -> Vec<Child> {
    let mut kept: Vec<Child> = children
        .into_iter()
        .filter_map(|mut child| {
            child.children = prune_children(child.children, opts);
            let interesting = opts.interesting(child.updated_at, &child.author);
            if interesting || !child.children.is_empty() {
                child.boring = !interesting;
                Some(child)
            } else {
                None
            }
        })
        .collect();
    kept.sort_by_key(|child| child.updated_at);
    kept
}

/// Prune top-level entries the same way: an entry with only descendant
/// interest is retained and marked `boring`.
#[must_use]
pub fn prune_entries(entries: Vec<Entry>, opts: &FilterOptions) -> Vec<Entry> {
    let mut kept: Vec<Entry> = entries
        .into_iter()
        .filter_map(|mut entry| {
            entry.children = prune_children(entry.children, opts);
            let interesting = opts.interesting(entry.updated_at, &entry.author);
            if interesting || !entry.children.is_empty() {
                entry.boring = !interesting;
                Some(entry)
            } else {
                None
            }
        })
        .collect();
    kept.sort_by_key(|entry| entry.updated_at);
    kept
}

/// Flat form for already-pruned lists that were merged from several fetches:
/// re-checks each entry without recursing into its (already pruned)
/// children, and re-imposes the ascending order.
#[must_use]
pub fn refilter_entries_flat(entries: Vec<Entry>, opts: &FilterOptions) -> Vec<Entry> {
    let mut kept: Vec<Entry> = entries
        .into_iter()
        .filter(|entry| {
            opts.interesting(entry.updated_at, &entry.author) || !entry.children.is_empty()
        })
        .collect();
    kept.sort_by_key(|entry| entry.updated_at);
    kept
}
