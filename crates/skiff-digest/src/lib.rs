//! # skiff-digest
//!
//! The activity aggregation engine: turns configured sources (repos,
//! organization projects, searches) into a digest of recent GitHub
//! activity, with pull request conversations reconciled into a single
//! chronological forest.
//!
//! The flow is `run_digest` → [`Digester`] → per-source fetch routines →
//! reconciliation and recursive pruning. Transport concerns (pagination,
//! retries, rate limits) live in `skiff-github`; this crate owns the
//! domain semantics.

pub mod cutoff;
pub mod digest;
pub mod docs;
pub mod error;
pub mod filter;
pub mod model;
pub mod reconcile;
pub mod source;

pub use digest::{
    DEFAULT_API_ROOT, Digest, DigestOptions, DigestRequest, Digester, run_digest,
};
pub use error::DigestError;
pub use model::{Author, AuthorKind, Child, Container, ContainerKind, Entry, ItemKind};
pub use source::{Source, SourceSpec};
