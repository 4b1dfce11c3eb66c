//! Source declarations and their dispatch shapes.
//!
//! A digest's sources are declared as GitHub URLs or structured specs. Each
//! parses into one [`Source`] variant; URL shapes are tried in a fixed order
//! and the first structural match wins.

use serde::Deserialize;
use url::Url;

use crate::error::DigestError;

/// A source declaration as it appears in configuration: either a bare URL
/// string, or a table with extra arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SourceSpec {
    Url(String),
    Detailed(DetailedSpec),
}

/// The table form of a source declaration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailedSpec {
    /// GitHub URL, same shapes as the bare-string form.
    #[serde(default)]
    pub url: Option<String>,
    /// Free-text search expression (not a URL). An `updated:>cutoff` clause
    /// is appended at fetch time.
    #[serde(default)]
    pub search: Option<String>,
    /// Display title (search sources).
    #[serde(default)]
    pub title: Option<String>,
    /// `owner/name` of the repo most project items live in (project sources).
    #[serde(default)]
    pub home_repo: Option<String>,
}

/// A resolved source: what to fetch and with which arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    RepoIssues { owner: String, name: String },
    RepoPullRequests { owner: String, name: String },
    RepoReleases { owner: String, name: String },
    /// Bare repo reference: fans out to issues + pull requests + releases.
    Repo { owner: String, name: String },
    OrgProject { org: String, number: u32, home_repo: String },
    Search { query: String, title: Option<String> },
}

impl Source {
    /// Resolve a declaration to a source.
    ///
    /// # Errors
    ///
    /// [`DigestError::UnrecognizedSource`] naming the offending input when no
    /// shape matches.
    pub fn parse(spec: &SourceSpec) -> Result<Self, DigestError> {
        match spec {
            SourceSpec::Url(url) => Self::from_url(url, &DetailedSpec::default()),
            SourceSpec::Detailed(detail) => {
                if let Some(url) = &detail.url {
                    Self::from_url(url, detail)
                } else if let Some(search) = &detail.search {
                    Ok(Self::Search {
                        query: search.clone(),
                        title: detail.title.clone(),
                    })
                } else {
                    Err(DigestError::UnrecognizedSource(format!("{detail:?}")))
                }
            }
        }
    }

    fn from_url(raw: &str, detail: &DetailedSpec) -> Result<Self, DigestError> {
        let unrecognized = || DigestError::UnrecognizedSource(raw.to_owned());
        let url = Url::parse(raw).map_err(|_| unrecognized())?;
        if url.host_str() != Some("github.com") {
            return Err(unrecognized());
        }
        let segments: Vec<&str> = url
            .path_segments()
            .map(|path| path.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        // Shape order matters: most specific first, bare repo last.
        match segments.as_slice() {
            [owner, name, "issues"] => Ok(Self::RepoIssues {
                owner: (*owner).to_owned(),
                name: (*name).to_owned(),
            }),
            [owner, name, "pulls"] => Ok(Self::RepoPullRequests {
                owner: (*owner).to_owned(),
                name: (*name).to_owned(),
            }),
            [owner, name, "releases"] => Ok(Self::RepoReleases {
                owner: (*owner).to_owned(),
                name: (*name).to_owned(),
            }),
            ["orgs", org, "projects", number] => {
                let number = number.parse().map_err(|_| unrecognized())?;
                Ok(Self::OrgProject {
                    org: (*org).to_owned(),
                    number,
                    home_repo: detail.home_repo.clone().unwrap_or_default(),
                })
            }
            [owner, name] => Ok(Self::Repo {
                owner: (*owner).to_owned(),
                name: (*name).to_owned(),
            }),
            _ => Err(unrecognized()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_url(url: &str) -> Result<Source, DigestError> {
        Source::parse(&SourceSpec::Url(url.into()))
    }

    #[test]
    fn repo_issues_url() {
        assert_eq!(
            parse_url("https://github.com/octocat/spoon-knife/issues").unwrap(),
            Source::RepoIssues {
                owner: "octocat".into(),
                name: "spoon-knife".into()
            }
        );
    }

    #[test]
    fn repo_pulls_url() {
        assert_eq!(
            parse_url("https://github.com/octocat/spoon-knife/pulls").unwrap(),
            Source::RepoPullRequests {
                owner: "octocat".into(),
                name: "spoon-knife".into()
            }
        );
    }

    #[test]
    fn repo_releases_url() {
        assert_eq!(
            parse_url("https://github.com/octocat/spoon-knife/releases").unwrap(),
            Source::RepoReleases {
                owner: "octocat".into(),
                name: "spoon-knife".into()
            }
        );
    }

    #[test]
    fn bare_repo_url_fans_out() {
        assert_eq!(
            parse_url("https://github.com/octocat/spoon-knife").unwrap(),
            Source::Repo {
                owner: "octocat".into(),
                name: "spoon-knife".into()
            }
        );
    }

    #[test]
    fn org_project_url() {
        let spec = SourceSpec::Detailed(DetailedSpec {
            url: Some("https://github.com/orgs/megacorp/projects/7".into()),
            home_repo: Some("megacorp/widgets".into()),
            ..DetailedSpec::default()
        });
        assert_eq!(
            Source::parse(&spec).unwrap(),
            Source::OrgProject {
                org: "megacorp".into(),
                number: 7,
                home_repo: "megacorp/widgets".into()
            }
        );
    }

    #[test]
    fn search_spec() {
        let spec = SourceSpec::Detailed(DetailedSpec {
            search: Some("org:megacorp is:pr label:breaking".into()),
            title: Some("Breaking PRs".into()),
            ..DetailedSpec::default()
        });
        assert_eq!(
            Source::parse(&spec).unwrap(),
            Source::Search {
                query: "org:megacorp is:pr label:breaking".into(),
                title: Some("Breaking PRs".into())
            }
        );
    }

    #[test]
    fn unrecognized_inputs_name_the_offender() {
        for bad in [
            "https://github.com/just-an-owner",
            "https://github.com/a/b/c/d",
            "https://gitlab.com/octocat/spoon-knife/issues",
            "not a url at all",
        ] {
            let err = parse_url(bad).unwrap_err();
            assert!(matches!(err, DigestError::UnrecognizedSource(_)), "{bad}");
            assert!(err.to_string().contains(bad.split(' ').next().unwrap()), "{bad}");
        }
    }

    #[test]
    fn empty_detail_table_is_unrecognized() {
        let err = Source::parse(&SourceSpec::Detailed(DetailedSpec::default())).unwrap_err();
        assert!(matches!(err, DigestError::UnrecognizedSource(_)));
    }

    #[test]
    fn project_number_must_be_numeric() {
        let err = parse_url("https://github.com/orgs/megacorp/projects/seven").unwrap_err();
        assert!(matches!(err, DigestError::UnrecognizedSource(_)));
    }
}
