//! Project configuration, read from an optional TOML file.
//!
//! Every setting has a default matching the website repository layout, so a
//! missing file or an empty table is a valid configuration:
//!
//! ```toml
//! [paths]
//! root = "/srv/website"
//! bib_file = "content/umcg-anes.bib"
//!
//! [pubmed]
//! email = "bibliography@example.org"
//! api_key = "0123456789abcdef"
//!
//! [crossref]
//! mailto = "bibliography@example.org"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub pubmed: PubMedConfig,
    pub crossref: CrossrefConfig,
}

impl Config {
    /// Reads `path`, or returns the defaults when no file is given or the
    /// file does not exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path.filter(|p| p.exists()) else {
            debug!("No configuration file, using defaults");
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

/// File locations. Relative paths are taken from `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,
    pub bib_file: PathBuf,
    pub members_dir: PathBuf,
    pub exclusions_file: PathBuf,
    pub workflow_file: PathBuf,
    pub theses_dir: PathBuf,
    /// Where the index task reads `<name>.bib` and writes its JSON files.
    pub content_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bib_file: PathBuf::from("content/umcg-anes.bib"),
            members_dir: PathBuf::from("content/pages/members"),
            exclusions_file: PathBuf::from("bibliography/excluded_pmids.json"),
            workflow_file: PathBuf::from(".github/workflows/exclude-publication.yml"),
            theses_dir: PathBuf::from("content/images/theses"),
            content_dir: PathBuf::from("content"),
        }
    }
}

impl PathsConfig {
    /// `path` itself when absolute, else `path` below `root`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    pub fn bib_file(&self) -> PathBuf {
        self.resolve(&self.bib_file)
    }

    pub fn members_dir(&self) -> PathBuf {
        self.resolve(&self.members_dir)
    }

    pub fn exclusions_file(&self) -> PathBuf {
        self.resolve(&self.exclusions_file)
    }

    pub fn workflow_file(&self) -> PathBuf {
        self.resolve(&self.workflow_file)
    }

    pub fn theses_dir(&self) -> PathBuf {
        self.resolve(&self.theses_dir)
    }

    pub fn content_dir(&self) -> PathBuf {
        self.resolve(&self.content_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PubMedConfig {
    pub base_url: String,
    /// Sent with every request, as NCBI asks.
    pub email: String,
    pub api_key: Option<String>,
    pub rate_limit_secs: f64,
    /// Used instead of `rate_limit_secs` when an API key is set.
    pub api_key_rate_limit_secs: f64,
    pub timeout_secs: u64,
    pub max_results: usize,
    /// Value of the `optnote` field on imported entries.
    pub note: String,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string(),
            email: "bibliography@radboudumc.nl".to_string(),
            api_key: None,
            rate_limit_secs: 0.34,
            api_key_rate_limit_secs: 0.1,
            timeout_secs: 30,
            max_results: 100,
            note: "DIAG, RADIOLOGY".to_string(),
        }
    }
}

impl PubMedConfig {
    pub fn rate_limit(&self) -> Duration {
        let secs = if self.api_key.is_some() {
            self.api_key_rate_limit_secs
        } else {
            self.rate_limit_secs
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossrefConfig {
    pub base_url: String,
    /// Identifies the caller for Crossref's polite pool.
    pub mailto: String,
    pub rate_limit_secs: f64,
    pub timeout_secs: u64,
    pub max_results: usize,
}

impl Default for CrossrefConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crossref.org".to_string(),
            mailto: "r.c.tolboom@umcg.nl".to_string(),
            rate_limit_secs: 1.0,
            timeout_secs: 30,
            max_results: 100,
        }
    }
}

impl CrossrefConfig {
    pub fn rate_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_secs).unwrap_or(Duration::ZERO)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(None).unwrap(), Config::default());
        assert_eq!(
            Config::load(Some(&dir.path().join("absent.toml"))).unwrap(),
            Config::default()
        );
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bibkeeper.toml");
        std::fs::write(
            &path,
            "[paths]\nroot = \"/srv/site\"\n\n[pubmed]\napi_key = \"abc\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.paths.root, PathBuf::from("/srv/site"));
        assert_eq!(
            config.paths.bib_file(),
            PathBuf::from("/srv/site/content/umcg-anes.bib")
        );
        assert_eq!(config.pubmed.api_key.as_deref(), Some("abc"));
        assert_eq!(config.pubmed.rate_limit(), Duration::from_millis(100));
        assert_eq!(config.crossref, CrossrefConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bibkeeper.toml");
        std::fs::write(&path, "[pubmed]\nmax_results = \"many\"\n").unwrap();
        assert!(matches!(Config::load(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_absolute_paths_are_kept() {
        let paths = PathsConfig {
            root: PathBuf::from("/srv/site"),
            bib_file: PathBuf::from("/data/refs.bib"),
            ..PathsConfig::default()
        };
        assert_eq!(paths.bib_file(), PathBuf::from("/data/refs.bib"));
        assert_eq!(paths.members_dir(), PathBuf::from("/srv/site/content/pages/members"));
    }
}
