//! Entry reconciliation: merging a pull request's scattered conversation
//! into one deduplicated forest, and deriving entry-level reason flags.
//!
//! A pull request's conversation lives in three overlapping collections:
//! standalone comments, reviews (each with optional body and inline
//! comments), and review threads (reply chains that can span reviews). The
//! merge produces one id-keyed map and hands back its values; pruning and
//! ordering happen afterwards in [`crate::filter`].

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::model::{
    Child, Entry, RawComment, RawItem, RawReview, RawThread, ReviewState, normalize_author,
};

/// Build an entry skeleton from a raw node: titles, timestamps, author
/// normalization, and the reason-* flags. Children are attached by the
/// caller.
#[must_use]
pub fn entry_from_item(item: &RawItem, cutoff: DateTime<Utc>) -> Entry {
    Entry {
        kind: item.kind,
        id: item.id.clone(),
        number: item.number,
        title: item.display_title(),
        url: item.url.clone(),
        author: normalize_author(item.author.clone()),
        created_at: item.created_at,
        updated_at: item.updated_at,
        closed_at: item.closed_at,
        merged_at: item.merged_at,
        reason_created: item.created_at > cutoff,
        reason_closed: item.closed_at.is_some_and(|at| at > cutoff),
        reason_merged: item.merged_at.is_some_and(|at| at > cutoff),
        boring: false,
        other_repo: false,
        children: Vec::new(),
    }
}

/// Whether a project item lives outside the project's home repo.
#[must_use]
pub fn is_other_repo(item: &RawItem, home_repo: &str) -> bool {
    item.repository
        .as_ref()
        .and_then(|repo| repo.name_with_owner.as_deref())
        != Some(home_repo)
}

/// A review waiting to be merged, accumulating the thread representatives
/// and fallback inline comments that belong under it.
struct ReviewSlot {
    review: RawReview,
    children: Vec<Child>,
}

impl ReviewSlot {
    fn new(review: RawReview) -> Self {
        Self {
            review,
            children: Vec::new(),
        }
    }
}

/// Merge a pull request's comments, reviews, and review threads into one
/// deduplicated child list.
///
/// All three inputs must already be fully paginated. The result is unsorted
/// and unpruned; run it through [`crate::filter::prune_children`].
#[must_use]
pub fn merge_pull_request(
    comments: Vec<RawComment>,
    reviews: Vec<RawReview>,
    threads: Vec<RawThread>,
) -> Vec<Child> {
    // Id-keyed merge map; BTreeMap keeps the pre-sort order deterministic.
    let mut merged: BTreeMap<String, Child> = BTreeMap::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut slots: Vec<ReviewSlot> = reviews.into_iter().map(ReviewSlot::new).collect();
    let index: HashMap<String, usize> = slots
        .iter()
        .enumerate()
        .map(|(i, slot)| (slot.review.id.clone(), i))
        .collect();

    // Each thread is represented by its first comment; the rest of the
    // chain hangs off it, and the representative hangs off the review that
    // started the thread.
    for thread in threads {
        let mut nodes = thread.comments.nodes;
        if nodes.is_empty() {
            continue;
        }
        let first = nodes.remove(0);
        let review_id = first.pull_request_review.as_ref().map(|r| r.id.clone());
        seen.insert(first.id.clone());
        let mut representative = Child::from(first);
        representative.resolved = Some(thread.is_resolved);
        representative.children = nodes
            .into_iter()
            .map(|reply| {
                seen.insert(reply.id.clone());
                Child::from(reply)
            })
            .collect();

        match review_id.and_then(|id| index.get(&id).copied()) {
            Some(i) => slots[i].children.push(representative),
            // Thread whose originating review is not in the list; surface
            // the chain on its own rather than losing it.
            None => {
                merged.insert(representative.id.clone(), representative);
            }
        }
    }

    for mut slot in slots {
        // Inline comments not covered by any thread still belong under
        // their review.
        let state = slot.review.state;
        for comment in std::mem::take(&mut slot.review.comments.nodes) {
            if seen.insert(comment.id.clone()) {
                let mut child = Child::from(comment);
                child.review_state = Some(state);
                slot.children.push(child);
            }
        }

        let body_empty = slot.review.body.trim().is_empty();
        if body_empty && slot.children.len() == 1 && state == ReviewState::Commented {
            // An empty review wrapper hosting exactly one comment: surface
            // the comment itself, carrying the review's state.
            let mut only = slot.children.remove(0);
            only.review_state = Some(state);
            merged.insert(only.id.clone(), only);
        } else if !body_empty || !slot.children.is_empty() || state != ReviewState::Commented {
            let mut review = Child::from_review(slot.review);
            review.children = slot.children;
            merged.insert(review.id.clone(), review);
        }
        // Empty, childless, plain "commented" review: nothing to show.
    }

    // Standalone comments last. Ids already consumed into a thread stay
    // where the thread put them; otherwise the last write wins on an id
    // collision in the map.
    for comment in comments {
        if seen.contains(&comment.id) {
            continue;
        }
        let child = Child::from(comment);
        merged.insert(child.id.clone(), child);
    }

    merged.into_values().collect()
}

/// Attach issue children: issues carry plain comments only.
#[must_use]
pub fn issue_children(comments: Vec<RawComment>) -> Vec<Child> {
    comments.into_iter().map(Child::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Author, AuthorKind, Collection, ItemKind, ReviewRef};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 0, 0, 0).single().unwrap()
    }

    fn user(login: &str) -> Option<Author> {
        Some(Author {
            login: login.into(),
            kind: AuthorKind::User,
        })
    }

    fn comment(id: &str, day: u32, review: Option<&str>) -> RawComment {
        RawComment {
            id: id.into(),
            author: user("octocat"),
            body: format!("comment {id}"),
            created_at: at(day),
            updated_at: at(day),
            url: None,
            pull_request_review: review.map(|id| ReviewRef { id: id.into() }),
        }
    }

    fn review(id: &str, day: u32, state: ReviewState, body: &str, comments: Vec<RawComment>) -> RawReview {
        RawReview {
            id: id.into(),
            author: user("reviewer"),
            body: body.into(),
            state,
            created_at: at(day),
            updated_at: at(day),
            url: None,
            comments: Collection {
                total_count: u32::try_from(comments.len()).unwrap(),
                nodes: comments,
            },
        }
    }

    fn thread(id: &str, resolved: bool, comments: Vec<RawComment>) -> RawThread {
        RawThread {
            id: id.into(),
            is_resolved: resolved,
            comments: Collection {
                total_count: u32::try_from(comments.len()).unwrap(),
                nodes: comments,
            },
        }
    }

    fn by_id<'a>(children: &'a [Child], id: &str) -> &'a Child {
        children.iter().find(|c| c.id == id).unwrap()
    }

    #[test]
    fn thread_representative_carries_replies_and_resolution() {
        let reviews = vec![review("R1", 2, ReviewState::Commented, "looks off", vec![])];
        let threads = vec![thread(
            "T1",
            true,
            vec![comment("C1", 3, Some("R1")), comment("C2", 4, Some("R2"))],
        )];
        let merged = merge_pull_request(vec![], reviews, threads);

        let rev = by_id(&merged, "R1");
        assert_eq!(rev.review_state, Some(ReviewState::Commented));
        let rep = by_id(&rev.children, "C1");
        assert_eq!(rep.resolved, Some(true));
        assert_eq!(rep.children.len(), 1);
        assert_eq!(rep.children[0].id, "C2");
    }

    #[test]
    fn collapse_rule_replaces_empty_review_wrapper() {
        // Empty body, one attached comment, plain "commented" state.
        let reviews = vec![review("R1", 2, ReviewState::Commented, "", vec![])];
        let threads = vec![thread("T1", false, vec![comment("C1", 3, Some("R1"))])];
        let merged = merge_pull_request(vec![], reviews, threads);

        assert_eq!(merged.len(), 1);
        let only = &merged[0];
        assert_eq!(only.id, "C1");
        assert_eq!(only.review_state, Some(ReviewState::Commented));
        assert!(merged.iter().all(|c| c.id != "R1"));
    }

    #[test]
    fn empty_approval_is_still_surfaced() {
        let reviews = vec![review("R1", 2, ReviewState::Approved, "", vec![])];
        let merged = merge_pull_request(vec![], reviews, vec![]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "R1");
        assert_eq!(merged[0].review_state, Some(ReviewState::Approved));
    }

    #[test]
    fn empty_commented_review_is_dropped() {
        let reviews = vec![review("R1", 2, ReviewState::Commented, "", vec![])];
        let merged = merge_pull_request(vec![], reviews, vec![]);
        assert!(merged.is_empty());
    }

    #[test]
    fn review_with_body_keeps_wrapper_and_child() {
        let reviews = vec![review("R1", 2, ReviewState::Commented, "overall fine", vec![])];
        let threads = vec![thread("T1", false, vec![comment("C1", 3, Some("R1"))])];
        let merged = merge_pull_request(vec![], reviews, threads);

        assert_eq!(merged.len(), 1);
        let rev = by_id(&merged, "R1");
        assert_eq!(rev.body, "overall fine");
        assert_eq!(rev.children.len(), 1);
    }

    #[test]
    fn duplicate_id_across_thread_and_standalone_merges_once() {
        let reviews = vec![review("R1", 2, ReviewState::Commented, "note", vec![])];
        let threads = vec![thread("T1", false, vec![comment("C1", 3, Some("R1"))])];
        let standalone = vec![comment("C1", 3, None)];
        let merged = merge_pull_request(standalone, reviews, threads);

        // The thread placed C1 under R1; the standalone copy must not
        // resurface it at the top level.
        let total: usize = count_ids(&merged, "C1");
        assert_eq!(total, 1);
    }

    fn count_ids(children: &[Child], id: &str) -> usize {
        children
            .iter()
            .map(|c| usize::from(c.id == id) + count_ids(&c.children, id))
            .sum()
    }

    #[test]
    fn untracked_inline_comment_falls_back_under_its_review() {
        // The review carries an inline comment that no thread covers.
        let reviews = vec![review(
            "R1",
            2,
            ReviewState::Commented,
            "",
            vec![comment("C1", 3, Some("R1")), comment("C2", 4, Some("R1"))],
        )];
        let merged = merge_pull_request(vec![], reviews, vec![]);

        let rev = by_id(&merged, "R1");
        assert_eq!(rev.children.len(), 2);
        assert!(rev.children.iter().all(|c| c.review_state == Some(ReviewState::Commented)));
    }

    #[test]
    fn thread_with_unknown_review_id_is_not_lost() {
        let threads = vec![thread("T1", false, vec![comment("C1", 3, Some("R-GONE"))])];
        let merged = merge_pull_request(vec![], vec![], threads);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].id, "C1");
    }

    #[test]
    fn standalone_comments_always_merge() {
        let merged = merge_pull_request(vec![comment("C1", 3, None), comment("C2", 4, None)], vec![], vec![]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn reason_flags_follow_cutoff() {
        let item = RawItem {
            kind: ItemKind::PullRequest,
            id: "PR_1".into(),
            number: Some(7),
            title: Some("Fix the thing".into()),
            name: None,
            url: None,
            author: None,
            created_at: at(12),
            updated_at: at(15),
            closed_at: Some(at(15)),
            merged_at: Some(at(15)),
            comments: None,
            reviews: None,
            review_threads: None,
            repository: None,
        };
        let entry = entry_from_item(&item, at(10));
        assert!(entry.reason_created);
        assert!(entry.reason_closed);
        assert!(entry.reason_merged);
        // Ghost normalization happened.
        assert_eq!(entry.author.login, "ghost");

        let stale = entry_from_item(&item, at(20));
        assert!(!stale.reason_created);
        assert!(!stale.reason_closed);
        assert!(!stale.reason_merged);
    }
}
