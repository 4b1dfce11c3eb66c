//! # skiff-github
//!
//! GitHub GraphQL transport for Skiff.
//!
//! Provides the pieces the digest engine needs to talk to the API:
//! - [`QueryLibrary`] — composes complete query documents from named
//!   documents plus `# fragment:` directives.
//! - [`GithubClient`] — executes queries with retry and rate-limit handling,
//!   and follows pagination cursors ([`GithubClient::nodes`]).
//! - [`RateLimitSnapshot`] / [`RateLimitHistory`] — bounded, instance-owned
//!   record of `X-RateLimit-*` observations.
//! - [`find_object_with_key`] — structural search for the pagination
//!   container, which different queries nest at different depths.
//!
//! This is not a general GraphQL client; it assumes the GitHub schema shape
//! (`pageInfo`/`nodes` collections, `errors` list, rate-limit headers).

mod client;
mod error;
mod find;
mod query;
mod rate_limit;

pub use client::{GithubClient, Tuning};
pub use error::GithubError;
pub use find::{find_object_with_key, find_object_with_key_mut};
pub use query::{QueryLibrary, query_synopsis};
pub use rate_limit::{RateLimitHistory, RateLimitSnapshot};
