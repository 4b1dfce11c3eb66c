//! Embedded GraphQL documents.
//!
//! One document per operation plus shared fragments, compiled into the
//! binary. [`library`] hands the table to the composer, which resolves the
//! `# fragment:` directives.

use skiff_github::QueryLibrary;

/// Name→text table of every embedded document.
pub const DOCUMENTS: &[(&str, &str)] = &[
    ("author_fields", include_str!("../graphql/author_fields.graphql")),
    ("comment_fields", include_str!("../graphql/comment_fields.graphql")),
    (
        "review_comment_fields",
        include_str!("../graphql/review_comment_fields.graphql"),
    ),
    ("issue_fields", include_str!("../graphql/issue_fields.graphql")),
    (
        "pull_request_fields",
        include_str!("../graphql/pull_request_fields.graphql"),
    ),
    ("repo_issues", include_str!("../graphql/repo_issues.graphql")),
    ("issue_comments", include_str!("../graphql/issue_comments.graphql")),
    (
        "repo_pull_requests",
        include_str!("../graphql/repo_pull_requests.graphql"),
    ),
    (
        "pull_request_comments",
        include_str!("../graphql/pull_request_comments.graphql"),
    ),
    (
        "pull_request_reviews",
        include_str!("../graphql/pull_request_reviews.graphql"),
    ),
    (
        "pull_request_review_threads",
        include_str!("../graphql/pull_request_review_threads.graphql"),
    ),
    ("review_comments", include_str!("../graphql/review_comments.graphql")),
    ("thread_comments", include_str!("../graphql/thread_comments.graphql")),
    ("repo_releases", include_str!("../graphql/repo_releases.graphql")),
    ("project_items", include_str!("../graphql/project_items.graphql")),
    ("search_items", include_str!("../graphql/search_items.graphql")),
];

/// A query library over the embedded documents.
#[must_use]
pub fn library() -> QueryLibrary {
    QueryLibrary::new(DOCUMENTS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_composes() {
        let library = library();
        for name in [
            "repo_issues",
            "issue_comments",
            "repo_pull_requests",
            "pull_request_comments",
            "pull_request_reviews",
            "pull_request_review_threads",
            "review_comments",
            "thread_comments",
            "repo_releases",
            "project_items",
            "search_items",
        ] {
            let query = library.compose(name).unwrap();
            assert!(query.contains("query "), "{name} should contain an operation");
        }
    }

    #[test]
    fn shared_fragments_appear_once() {
        let query = library().compose("project_items").unwrap();
        assert_eq!(query.matches("fragment authorFields").count(), 1);
        assert_eq!(query.matches("fragment commentFields").count(), 1);
    }
}
