//! The digester: per-source fetch routines and the run orchestrator.
//!
//! One [`Digester`] serves one digest run: it owns the GraphQL client (and
//! thus the rate-limit budget), the composed query library, and the run's
//! filter options. Sources are fetched concurrently; the declared order is
//! re-imposed on the results regardless of completion order.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::join_all;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use skiff_github::{GithubClient, QueryLibrary, RateLimitSnapshot};

use crate::cutoff::{FOREVER, parse_cutoff};
use crate::docs;
use crate::error::DigestError;
use crate::filter::{FilterOptions, prune_entries, refilter_entries_flat};
use crate::model::{
    Child, Container, ContainerKind, Entry, ItemKind, RawComment, RawItem, RawReview, RawThread,
};
use crate::reconcile::{entry_from_item, is_other_repo, issue_children, merge_pull_request};
use crate::source::{Source, SourceSpec};

/// Default GraphQL endpoint; overridable for GitHub Enterprise roots.
pub const DEFAULT_API_ROOT: &str = "https://api.github.com/graphql";

/// Run-wide options, as supplied by the configuration collaborator.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct DigestOptions {
    /// Logins whose activity never counts as interesting.
    #[serde(default)]
    pub ignore_users: Vec<String>,
    /// Whether automation accounts count as interesting authors.
    #[serde(default)]
    pub include_bots: bool,
    /// Alternate GraphQL endpoint.
    #[serde(default)]
    pub api_root: Option<String>,
    /// Credential override; when absent, `GITHUB_TOKEN` is read from the
    /// environment (an empty token fails on the first request).
    #[serde(skip)]
    pub token: Option<String>,
}

/// Everything one digest needs: what to fetch, back to when, and how to
/// filter it.
#[derive(Debug, Clone)]
pub struct DigestRequest {
    pub title: Option<String>,
    /// Cutoff spec: a duration, `"forever"`, `YYYYMMDD`, or an ISO datetime.
    pub cutoff: String,
    pub sources: Vec<SourceSpec>,
    pub options: DigestOptions,
}

/// The finished product handed to the rendering collaborator.
#[derive(Debug, Clone)]
pub struct Digest {
    pub title: Option<String>,
    /// `None` for a `"forever"` digest.
    pub cutoff: Option<DateTime<Utc>>,
    pub generated_at: DateTime<Utc>,
    /// Containers in declared source order.
    pub containers: Vec<Container>,
    /// Latest rate-limit observation from the run's requests.
    pub rate_limit: Option<RateLimitSnapshot>,
}

/// Run one digest end to end.
///
/// Source declarations are all resolved before any fetch starts, so a bad
/// declaration drops the built-but-unstarted operations rather than leaking
/// half a run.
///
/// # Errors
///
/// Any [`DigestError`]; one failing source fails the whole digest.
pub async fn run_digest(request: &DigestRequest) -> Result<Digest, DigestError> {
    let now = Utc::now();
    let cutoff = parse_cutoff(&request.cutoff, now)?;
    let digester = Digester::from_options(cutoff, &request.options);
    let containers = digester.containers(&request.sources).await?;
    Ok(Digest {
        title: request.title.clone(),
        cutoff: (request.cutoff != FOREVER).then_some(cutoff),
        generated_at: now,
        containers,
        rate_limit: digester.last_rate_limit(),
    })
}

/// Fetches and reconciles activity for one digest run.
#[derive(Debug)]
pub struct Digester {
    gql: GithubClient,
    library: QueryLibrary,
    opts: FilterOptions,
}

impl Digester {
    /// Build a digester around an existing client. Tests use this to point
    /// at a mock endpoint with short retry pauses.
    #[must_use]
    pub fn new(gql: GithubClient, cutoff: DateTime<Utc>, options: &DigestOptions) -> Self {
        Self {
            gql,
            library: docs::library(),
            opts: FilterOptions {
                cutoff,
                ignore_users: options.ignore_users.clone(),
                include_bots: options.include_bots,
            },
        }
    }

    /// Build a digester from run options, reading the credential from the
    /// environment when not supplied.
    #[must_use]
    pub fn from_options(cutoff: DateTime<Utc>, options: &DigestOptions) -> Self {
        let token = options
            .token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .unwrap_or_default();
        let api_root = options
            .api_root
            .clone()
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_owned());
        Self::new(GithubClient::new(api_root, token), cutoff, options)
    }

    /// The client's latest rate-limit observation.
    #[must_use]
    pub fn last_rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.gql.last_rate_limit()
    }

    /// Resolve all declarations, fetch them concurrently, and hand back
    /// containers in declared order.
    ///
    /// # Errors
    ///
    /// A declaration that fails to parse aborts before any fetch starts.
    /// Fetch errors surface after every in-flight source has completed.
    pub async fn containers(&self, specs: &[SourceSpec]) -> Result<Vec<Container>, DigestError> {
        let sources: Vec<Source> = specs.iter().map(Source::parse).collect::<Result<_, _>>()?;
        info!(sources = sources.len(), "fetching digest sources");
        let results = join_all(sources.iter().map(|source| self.fetch(source))).await;
        let mut containers = Vec::with_capacity(results.len());
        for result in results {
            containers.push(result?);
        }
        Ok(containers)
    }

    /// Fetch and reconcile one source into a container.
    ///
    /// # Errors
    ///
    /// Any transport, shape, or reconciliation failure for this source.
    pub async fn fetch(&self, source: &Source) -> Result<Container, DigestError> {
        debug!(?source, "fetching source");
        match source {
            Source::RepoIssues { owner, name } => self.repo_issues(owner, name).await,
            Source::RepoPullRequests { owner, name } => self.repo_pull_requests(owner, name).await,
            Source::RepoReleases { owner, name } => self.repo_releases(owner, name).await,
            Source::Repo { owner, name } => self.repo_activity(owner, name).await,
            Source::OrgProject {
                org,
                number,
                home_repo,
            } => self.project_items(org, *number, home_repo).await,
            Source::Search { query, title } => self.search(query, title.as_deref()).await,
        }
    }

    // ── Per-source routines ────────────────────────────────────────

    async fn repo_issues(&self, owner: &str, name: &str) -> Result<Container, DigestError> {
        let query = self.library.compose("repo_issues")?;
        let variables = vars([
            ("owner", json!(owner)),
            ("name", json!(name)),
            ("since", json!(self.since_string())),
        ]);
        let (data, nodes) = self.gql.nodes(&query, &variables, None).await?;
        let entries = self
            .process_items(parse_items(nodes, "issue list")?, None)
            .await?;
        let (title, url) = repo_meta(&data);
        Ok(Container {
            title,
            url,
            container_kind: ContainerKind::Repo,
            kind: "issues".into(),
            entries,
        })
    }

    async fn repo_pull_requests(&self, owner: &str, name: &str) -> Result<Container, DigestError> {
        let query = self.library.compose("repo_pull_requests")?;
        let variables = vars([("owner", json!(owner)), ("name", json!(name))]);
        // Pull requests arrive newest-first; stop paginating once a whole
        // page's tail has fallen outside the window.
        let since = self.since_string();
        let stop: &(dyn Fn(&[Value]) -> bool + Sync) = &|nodes| page_older_than(nodes, &since);
        let (data, nodes) = self.gql.nodes(&query, &variables, Some(stop)).await?;
        let entries = self
            .process_items(parse_items(nodes, "pull request list")?, None)
            .await?;
        let (title, url) = repo_meta(&data);
        Ok(Container {
            title,
            url,
            container_kind: ContainerKind::Repo,
            kind: "pull requests".into(),
            entries,
        })
    }

    async fn repo_releases(&self, owner: &str, name: &str) -> Result<Container, DigestError> {
        let query = self.library.compose("repo_releases")?;
        let variables = vars([("owner", json!(owner)), ("name", json!(name))]);
        let since = self.since_string();
        let stop: &(dyn Fn(&[Value]) -> bool + Sync) = &|nodes| page_older_than(nodes, &since);
        let (data, nodes) = self.gql.nodes(&query, &variables, Some(stop)).await?;
        let entries = self
            .process_items(parse_items(nodes, "release list")?, None)
            .await?;
        let (title, url) = repo_meta(&data);
        Ok(Container {
            title,
            url,
            container_kind: ContainerKind::Repo,
            kind: "releases".into(),
            entries,
        })
    }

    /// Bare repo reference: issues, pull requests, and releases fetched
    /// concurrently and merged into one container.
    async fn repo_activity(&self, owner: &str, name: &str) -> Result<Container, DigestError> {
        let (issues, pulls, releases) = tokio::try_join!(
            self.repo_issues(owner, name),
            self.repo_pull_requests(owner, name),
            self.repo_releases(owner, name),
        )?;
        let mut entries = issues.entries;
        entries.extend(pulls.entries);
        entries.extend(releases.entries);
        let entries = refilter_entries_flat(entries, &self.opts);
        Ok(Container {
            title: issues.title,
            url: issues.url,
            container_kind: ContainerKind::Repo,
            kind: "activity".into(),
            entries,
        })
    }

    async fn project_items(
        &self,
        org: &str,
        number: u32,
        home_repo: &str,
    ) -> Result<Container, DigestError> {
        let query = self.library.compose("project_items")?;
        let variables = vars([("org", json!(org)), ("projectNumber", json!(number))]);
        let (data, nodes) = self.gql.nodes(&query, &variables, None).await?;
        // Project items wrap their issue/PR in a `content` member; draft
        // items and redacted content come through empty and are skipped.
        let contents: Vec<Value> = nodes
            .into_iter()
            .filter_map(|mut node| node.get_mut("content").map(Value::take))
            .collect();
        let items = parse_items(contents, "project items")?;
        let entries = self.process_items(items, Some(home_repo)).await?;

        let project = &data["data"]["organization"]["projectV2"];
        Ok(Container {
            title: string_at(project, "title").unwrap_or_else(|| format!("{org} project {number}")),
            url: string_at(project, "url"),
            container_kind: ContainerKind::Project,
            kind: "items".into(),
            entries,
        })
    }

    async fn search(&self, expression: &str, title: Option<&str>) -> Result<Container, DigestError> {
        // The declared expression plus the implicit recency clause.
        let full_query = format!("{expression} updated:>{}", self.since_string());
        let query = self.library.compose("search_items")?;
        let variables = vars([("query", json!(full_query))]);
        let (_, nodes) = self.gql.nodes(&query, &variables, None).await?;
        let entries = self
            .process_items(parse_items(nodes, "search results")?, None)
            .await?;
        let url = format!(
            "https://github.com/search?q={}&type=issues",
            urlencoding::encode(&full_query)
        );
        Ok(Container {
            title: title.unwrap_or(expression).to_owned(),
            url: Some(url),
            container_kind: ContainerKind::Search,
            kind: "items".into(),
            entries,
        })
    }

    // ── Item processing ────────────────────────────────────────────

    /// Reconcile raw items into pruned, ordered entries.
    async fn process_items(
        &self,
        items: Vec<RawItem>,
        home_repo: Option<&str>,
    ) -> Result<Vec<Entry>, DigestError> {
        // Cheap recency pre-filter. Any child activity bumps the item's
        // updatedAt upstream, so nothing prunable-as-interesting is lost,
        // and stale items skip their completion fetches entirely.
        let recent: Vec<RawItem> = items
            .into_iter()
            .filter(|item| item.updated_at > self.opts.cutoff)
            .collect();
        let results = join_all(recent.iter().map(|item| self.process_item(item, home_repo))).await;
        let mut entries = Vec::with_capacity(results.len());
        for result in results {
            entries.push(result?);
        }
        Ok(prune_entries(entries, &self.opts))
    }

    async fn process_item(
        &self,
        item: &RawItem,
        home_repo: Option<&str>,
    ) -> Result<Entry, DigestError> {
        let mut entry = entry_from_item(item, self.opts.cutoff);
        if let Some(home) = home_repo {
            entry.other_repo = !home.is_empty() && is_other_repo(item, home);
        }
        match item.kind {
            ItemKind::Issue => {
                entry.children = issue_children(self.complete_issue_comments(item).await?);
            }
            ItemKind::PullRequest => {
                entry.children = self.reconcile_pull_request(item).await?;
            }
            ItemKind::Release | ItemKind::Other => {}
        }
        Ok(entry)
    }

    /// Issues can't paginate their comments while the issue list itself is
    /// being paginated; fetch the full comment list when the inline prefix
    /// is short.
    async fn complete_issue_comments(
        &self,
        item: &RawItem,
    ) -> Result<Vec<RawComment>, DigestError> {
        let Some(collection) = &item.comments else {
            return Ok(Vec::new());
        };
        if !collection.under_filled() {
            return Ok(collection.nodes.clone());
        }
        let (owner, name, number) = repo_coords(item, "issue comment completion")?;
        let query = self.library.compose("issue_comments")?;
        let variables = vars([
            ("owner", json!(owner)),
            ("name", json!(name)),
            ("number", json!(number)),
        ]);
        let (_, nodes) = self.gql.nodes(&query, &variables, None).await?;
        parse_nodes(nodes, "issue comments")
    }

    /// Merge a pull request's three conversation collections, completing
    /// each one's pagination first.
    async fn reconcile_pull_request(&self, item: &RawItem) -> Result<Vec<Child>, DigestError> {
        let (comments, reviews, threads) = tokio::try_join!(
            self.complete_pr_comments(item),
            self.complete_pr_reviews(item),
            self.complete_pr_threads(item),
        )?;
        // Second completion round: the API limits nesting depth, so each
        // review's and thread's own comment list may still be a prefix.
        let (reviews, threads) = tokio::try_join!(
            self.complete_review_comments(reviews),
            self.complete_thread_comments(threads),
        )?;
        Ok(merge_pull_request(comments, reviews, threads))
    }

    async fn complete_pr_comments(&self, item: &RawItem) -> Result<Vec<RawComment>, DigestError> {
        let Some(collection) = &item.comments else {
            return Ok(Vec::new());
        };
        if !collection.under_filled() {
            return Ok(collection.nodes.clone());
        }
        let nodes = self.pr_completion_fetch(item, "pull_request_comments").await?;
        parse_nodes(nodes, "pull request comments")
    }

    async fn complete_pr_reviews(&self, item: &RawItem) -> Result<Vec<RawReview>, DigestError> {
        let Some(collection) = &item.reviews else {
            return Ok(Vec::new());
        };
        if !collection.under_filled() {
            return Ok(collection.nodes.clone());
        }
        let nodes = self.pr_completion_fetch(item, "pull_request_reviews").await?;
        parse_nodes(nodes, "pull request reviews")
    }

    async fn complete_pr_threads(&self, item: &RawItem) -> Result<Vec<RawThread>, DigestError> {
        let Some(collection) = &item.review_threads else {
            return Ok(Vec::new());
        };
        if !collection.under_filled() {
            return Ok(collection.nodes.clone());
        }
        let nodes = self
            .pr_completion_fetch(item, "pull_request_review_threads")
            .await?;
        parse_nodes(nodes, "pull request review threads")
    }

    async fn pr_completion_fetch(
        &self,
        item: &RawItem,
        document: &str,
    ) -> Result<Vec<Value>, DigestError> {
        let (owner, name, number) = repo_coords(item, "pull request completion")?;
        let query = self.library.compose(document)?;
        let variables = vars([
            ("owner", json!(owner)),
            ("name", json!(name)),
            ("number", json!(number)),
        ]);
        let (_, nodes) = self.gql.nodes(&query, &variables, None).await?;
        Ok(nodes)
    }

    async fn complete_review_comments(
        &self,
        reviews: Vec<RawReview>,
    ) -> Result<Vec<RawReview>, DigestError> {
        let results = join_all(reviews.into_iter().map(|mut review| async move {
            if review.comments.under_filled() {
                let query = self.library.compose("review_comments")?;
                let variables = vars([("id", json!(review.id))]);
                let (_, nodes) = self.gql.nodes(&query, &variables, None).await?;
                review.comments.nodes = parse_nodes(nodes, "review comments")?;
            }
            Ok::<_, DigestError>(review)
        }))
        .await;
        results.into_iter().collect()
    }

    async fn complete_thread_comments(
        &self,
        threads: Vec<RawThread>,
    ) -> Result<Vec<RawThread>, DigestError> {
        let results = join_all(threads.into_iter().map(|mut thread| async move {
            if thread.comments.under_filled() {
                let query = self.library.compose("thread_comments")?;
                let variables = vars([("id", json!(thread.id))]);
                let (_, nodes) = self.gql.nodes(&query, &variables, None).await?;
                thread.comments.nodes = parse_nodes(nodes, "thread comments")?;
            }
            Ok::<_, DigestError>(thread)
        }))
        .await;
        results.into_iter().collect()
    }

    /// The cutoff as the API's timestamp format.
    fn since_string(&self) -> String {
        self.opts.cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

// ── Helpers ────────────────────────────────────────────────────────

fn vars<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_owned(), value))
        .collect()
}

/// True when every node on the page was updated before `since`; pages are
/// newest-first, so nothing later can be in the window either.
fn page_older_than(nodes: &[Value], since: &str) -> bool {
    nodes
        .last()
        .and_then(|node| node.get("updatedAt"))
        .and_then(Value::as_str)
        .is_some_and(|updated| updated < since)
}

/// Deserialize top-level item nodes, skipping nulls and content-less stubs.
fn parse_items(nodes: Vec<Value>, context: &'static str) -> Result<Vec<RawItem>, DigestError> {
    nodes
        .into_iter()
        .filter(|node| node.get("id").is_some())
        .map(|node| serde_json::from_value(node).map_err(|err| DigestError::shape(context, &err)))
        .collect()
}

fn parse_nodes<T: serde::de::DeserializeOwned>(
    nodes: Vec<Value>,
    context: &'static str,
) -> Result<Vec<T>, DigestError> {
    nodes
        .into_iter()
        .map(|node| serde_json::from_value(node).map_err(|err| DigestError::shape(context, &err)))
        .collect()
}

/// Owner, name, and number for a completion fetch. Items from repo and
/// search queries always carry their repository; a missing one is a shape
/// problem, not an expected state.
fn repo_coords(
    item: &RawItem,
    context: &'static str,
) -> Result<(String, String, u64), DigestError> {
    let coords = item.repository.as_ref().and_then(|repo| {
        let owner = repo.owner.as_ref()?.login.clone();
        let name = repo.name.clone()?;
        Some((owner, name, item.number?))
    });
    coords.ok_or(DigestError::Shape {
        context,
        message: "item has no repository coordinates".into(),
    })
}

fn repo_meta(data: &Value) -> (String, Option<String>) {
    let repo = &data["data"]["repository"];
    (
        string_at(repo, "nameWithOwner").unwrap_or_default(),
        string_at(repo, "url"),
    )
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_owned)
}
