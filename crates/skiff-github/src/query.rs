//! Query composition from named documents and fragments.
//!
//! Query documents reference shared fragments with a comment directive:
//!
//! ```graphql
//! # fragment: comment_fields
//! ```
//!
//! [`QueryLibrary::compose`] resolves directives depth-first, including each
//! fragment once (first occurrence wins), and concatenates the documents in
//! discovery order.

use std::collections::{HashMap, HashSet};

use crate::error::GithubError;

/// Set a smaller page size to force pagination, for manual testing.
const FAKE_PAGE_ENV: &str = "SKIFF_FAKE_PAGE";

/// A set of named GraphQL documents with fragment-inclusion directives.
#[derive(Debug, Clone)]
pub struct QueryLibrary {
    docs: HashMap<&'static str, &'static str>,
}

impl QueryLibrary {
    /// Build a library from a static name→text table.
    #[must_use]
    pub fn new(docs: &[(&'static str, &'static str)]) -> Self {
        Self {
            docs: docs.iter().copied().collect(),
        }
    }

    /// Compose a complete query from the document named `root` plus every
    /// transitively referenced fragment.
    ///
    /// # Errors
    ///
    /// Returns [`GithubError::Compose`] when `root` or any referenced
    /// fragment is not in the library.
    pub fn compose(&self, root: &str) -> Result<String, GithubError> {
        let mut seen = HashSet::new();
        seen.insert(root.to_owned());
        let mut parts = Vec::new();
        self.resolve(root, &mut seen, &mut parts)?;

        let mut query = parts.join("\n");
        if let Ok(fake_page) = std::env::var(FAKE_PAGE_ENV) {
            if let Ok(size) = fake_page.parse::<u32>() {
                query = query.replace("first: 100", &format!("first: {size}"));
            }
        }
        Ok(query)
    }

    fn resolve(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        parts: &mut Vec<&'static str>,
    ) -> Result<(), GithubError> {
        let text = *self
            .docs
            .get(name)
            .ok_or_else(|| GithubError::Compose(name.to_owned()))?;
        parts.push(text);
        for frag in fragment_refs(text) {
            if seen.insert(frag.to_owned()) {
                self.resolve(frag, seen, parts)?;
            }
        }
        Ok(())
    }
}

/// Fragment names referenced by `# fragment: name` comment lines.
fn fragment_refs(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter_map(|line| {
        let rest = line.trim_start().strip_prefix('#')?;
        rest.trim_start().strip_prefix("fragment:").map(str::trim)
    })
}

/// One-line synopsis of a query plus its variables, for logs and errors.
#[must_use]
pub fn query_synopsis(query: &str, variables: &serde_json::Map<String, serde_json::Value>) -> String {
    let head = query
        .lines()
        .find(|line| !line.trim_start().starts_with('#') && !line.trim().is_empty())
        .unwrap_or("")
        .trim();
    let args = variables
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{head} [{args}]")
}
