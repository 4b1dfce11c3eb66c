//! Layered configuration loading for digest runs using figment.
//!
//! Sources (in priority order, highest wins):
//! 1. Environment variables (`SKIFF_*` prefix, `__` as separator, so
//!    `SKIFF_DEFAULTS__CUTOFF` maps to `defaults.cutoff`)
//! 2. The TOML file named on the command line (`skiff.toml` by default)
//!
//! `.env` files are loaded via dotenvy before the figment is built, which is
//! the usual home for `GITHUB_TOKEN`.

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use thiserror::Error;

use skiff_digest::{DigestOptions, DigestRequest, SourceSpec};

/// Cutoff used when neither the digest nor the defaults name one.
const DEFAULT_CUTOFF: &str = "1 week";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The named configuration file does not exist.
    #[error("configuration file {0} not found")]
    Missing(PathBuf),

    /// Figment extraction or merge error.
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    /// The file loaded but defines no digests.
    #[error("no digests defined in {0}")]
    NoDigests(PathBuf),

    /// A digest was requested by a name nothing matches.
    #[error("no digest named {0:?} in the configuration")]
    UnknownDigest(String),
}

/// Settings shared by every digest unless it overrides them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub cutoff: Option<String>,
    #[serde(default)]
    pub ignore_users: Option<Vec<String>>,
    #[serde(default)]
    pub include_bots: Option<bool>,
    #[serde(default)]
    pub api_root: Option<String>,
}

/// One `[[digests]]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub title: Option<String>,
    /// Markdown file the digest is written to; stdout when absent.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub cutoff: Option<String>,
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub ignore_users: Option<Vec<String>>,
    #[serde(default)]
    pub include_bots: Option<bool>,
    #[serde(default)]
    pub api_root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkiffConfig {
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub digests: Vec<DigestConfig>,
}

/// One digest to build: the resolved request plus where to write it.
#[derive(Debug, Clone)]
pub struct Job {
    pub request: DigestRequest,
    pub output: Option<PathBuf>,
}

impl SkiffConfig {
    /// Load a configuration file, layering `SKIFF_*` environment variables on
    /// top.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] for an absent file, [`ConfigError::Figment`]
    /// for parse or shape problems.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing(path.to_path_buf()));
        }
        Figment::from(Toml::file(path))
            .merge(Env::prefixed("SKIFF_").split("__"))
            .extract()
            .map_err(|error| ConfigError::Figment(Box::new(error)))
    }

    /// Load with `.env` file support. The typical CLI entry point.
    ///
    /// # Errors
    ///
    /// Same as [`SkiffConfig::load`].
    pub fn load_with_dotenv(path: &Path) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let config = Self::load(path)?;
        if config.digests.is_empty() {
            return Err(ConfigError::NoDigests(path.to_path_buf()));
        }
        Ok(config)
    }

    /// Resolve the digests to build into concrete jobs.
    ///
    /// An empty `names` selects every digest; otherwise each name must match
    /// some digest's title or output file stem, case-insensitively.
    ///
    /// # Errors
    ///
    /// [`ConfigError::UnknownDigest`] naming the first unmatched selector.
    pub fn jobs(&self, names: &[String], since: Option<&str>) -> Result<Vec<Job>, ConfigError> {
        if names.is_empty() {
            return Ok(self.digests.iter().map(|d| self.job(d, since)).collect());
        }
        names
            .iter()
            .map(|name| {
                self.digests
                    .iter()
                    .find(|digest| digest_matches(digest, name))
                    .map(|digest| self.job(digest, since))
                    .ok_or_else(|| ConfigError::UnknownDigest(name.clone()))
            })
            .collect()
    }

    fn job(&self, digest: &DigestConfig, since: Option<&str>) -> Job {
        let cutoff = since
            .map(str::to_owned)
            .or_else(|| digest.cutoff.clone())
            .or_else(|| self.defaults.cutoff.clone())
            .unwrap_or_else(|| DEFAULT_CUTOFF.to_owned());
        Job {
            request: DigestRequest {
                title: digest.title.clone(),
                cutoff,
                sources: digest.sources.clone(),
                options: DigestOptions {
                    ignore_users: digest
                        .ignore_users
                        .clone()
                        .or_else(|| self.defaults.ignore_users.clone())
                        .unwrap_or_default(),
                    include_bots: digest
                        .include_bots
                        .or(self.defaults.include_bots)
                        .unwrap_or(false),
                    api_root: digest
                        .api_root
                        .clone()
                        .or_else(|| self.defaults.api_root.clone()),
                    token: None,
                },
            },
            output: digest.output.clone(),
        }
    }
}

fn digest_matches(digest: &DigestConfig, name: &str) -> bool {
    let title_hit = digest
        .title
        .as_deref()
        .is_some_and(|title| title.eq_ignore_ascii_case(name));
    let stem_hit = digest
        .output
        .as_deref()
        .and_then(Path::file_stem)
        .and_then(std::ffi::OsStr::to_str)
        .is_some_and(|stem| stem.eq_ignore_ascii_case(name));
    title_hit || stem_hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CONFIG: &str = r#"
        [defaults]
        cutoff = "2 weeks"
        ignore_users = ["renovate"]

        [[digests]]
        title = "Team"
        output = "team.md"
        sources = ["https://github.com/octocat/spoon-knife/issues"]

        [[digests]]
        cutoff = "1 day"
        include_bots = true
        sources = [{ search = "org:octoverse involves:amy", title = "Amy" }]
    "#;

    #[test]
    fn toml_file_loads_defaults_and_digests() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("skiff.toml", CONFIG)?;
            let config = SkiffConfig::load(Path::new("skiff.toml")).unwrap();
            assert_eq!(config.defaults.cutoff.as_deref(), Some("2 weeks"));
            assert_eq!(config.digests.len(), 2);
            assert_eq!(config.digests[0].title.as_deref(), Some("Team"));
            assert!(matches!(config.digests[1].sources[0], SourceSpec::Detailed(_)));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_toml_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("skiff.toml", CONFIG)?;
            jail.set_env("SKIFF_DEFAULTS__CUTOFF", "3 days");
            let config = SkiffConfig::load(Path::new("skiff.toml")).unwrap();
            assert_eq!(config.defaults.cutoff.as_deref(), Some("3 days"));
            Ok(())
        });
    }

    #[test]
    fn missing_file_is_its_own_error() {
        let err = SkiffConfig::load(Path::new("no-such.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn digest_settings_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("skiff.toml", CONFIG)?;
            let config = SkiffConfig::load(Path::new("skiff.toml")).unwrap();
            let jobs = config.jobs(&[], None).unwrap();

            // First digest inherits the defaults.
            assert_eq!(jobs[0].request.cutoff, "2 weeks");
            assert_eq!(jobs[0].request.options.ignore_users, vec!["renovate"]);
            assert!(!jobs[0].request.options.include_bots);
            assert_eq!(jobs[0].output.as_deref(), Some(Path::new("team.md")));

            // Second digest overrides cutoff and bots, writes to stdout.
            assert_eq!(jobs[1].request.cutoff, "1 day");
            assert!(jobs[1].request.options.include_bots);
            assert!(jobs[1].output.is_none());
            Ok(())
        });
    }

    #[test]
    fn since_flag_overrides_every_cutoff() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("skiff.toml", CONFIG)?;
            let config = SkiffConfig::load(Path::new("skiff.toml")).unwrap();
            let jobs = config.jobs(&[], Some("6 hours")).unwrap();
            assert!(jobs.iter().all(|job| job.request.cutoff == "6 hours"));
            Ok(())
        });
    }

    #[test]
    fn digests_select_by_title_or_output_stem() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("skiff.toml", CONFIG)?;
            let config = SkiffConfig::load(Path::new("skiff.toml")).unwrap();

            let by_title = config.jobs(&["team".into()], None).unwrap();
            assert_eq!(by_title.len(), 1);
            let by_stem = config.jobs(&["TEAM".into()], None).unwrap();
            assert_eq!(by_stem[0].request.title.as_deref(), Some("Team"));

            let err = config.jobs(&["nightly".into()], None).unwrap_err();
            assert!(matches!(err, ConfigError::UnknownDigest(name) if name == "nightly"));
            Ok(())
        });
    }
}
