//! Session inputs and the pairing of roots with the patterns that filter them.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::error::{Error, Result};

/// Default pause between two polling cycles.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(600);

/// Default number of trailing bytes read from a file seen for the first time.
pub const DEFAULT_MAX_OFFSET: u64 = 400;

/// Inputs for a single watch session.
///
/// `patterns` pair with `roots` by position: pattern `i` only filters the
/// descendants of root `i`, and roots past the end of `patterns` are not
/// filtered at all.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Files or directories to discover watched files from.
    pub roots: Vec<PathBuf>,
    /// Regular expressions matched against the full path of discovered files.
    pub patterns: Vec<String>,
    /// Pause between two polling cycles of each loop.
    pub delay: Duration,
    /// How far from the end of a newly discovered file reading starts.
    pub max_offset: u64,
}

impl Config {
    /// Creates a config watching `roots` with default settings.
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Config {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Config::default()
        }
    }

    /// Sets the patterns, paired with the roots by position.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the pause between two polling cycles.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets how far back from the end a first read may start, in bytes.
    pub fn with_max_offset(mut self, max_offset: u64) -> Self {
        self.max_offset = max_offset;
        self
    }

    /// Validates the inputs and pairs every root with its pattern.
    ///
    /// Roots are made absolute here, once, and must exist.
    pub fn root_specs(&self) -> Result<Vec<RootSpec>> {
        if self.roots.is_empty() {
            return Err(Error::NoRoots);
        }

        let mut patterns = self
            .patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| Error::Regex {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        self.roots
            .iter()
            .map(|root| {
                let abs = absolutify(root).map_err(|source| Error::Absolutize {
                    path: root.clone(),
                    source,
                })?;
                if let Err(source) = abs.metadata() {
                    return Err(Error::RootNotFound { root: abs, source });
                }
                Ok(RootSpec::new(abs, patterns.next()))
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            roots: Vec::new(),
            patterns: Vec::new(),
            delay: DEFAULT_DELAY,
            max_offset: DEFAULT_MAX_OFFSET,
        }
    }
}

/// A root path together with the optional pattern filtering its descendants.
#[derive(Clone, Debug)]
pub struct RootSpec {
    root: PathBuf,
    pattern: Option<Regex>,
}

impl RootSpec {
    /// Pairs an already absolute `root` with its optional pattern.
    pub fn new(root: impl Into<PathBuf>, pattern: Option<Regex>) -> Self {
        RootSpec {
            root: root.into(),
            pattern,
        }
    }

    /// The absolute root path.
    pub fn root(&self) -> &Path {
        self.root.as_path()
    }

    /// The pattern filtering files found under a directory root, if any.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }

    /// Whether a descendant of a directory root should be watched.
    pub fn matches(&self, path: &Path) -> bool {
        match &self.pattern {
            None => true,
            Some(pattern) => pattern.is_match(&path.to_string_lossy()),
        }
    }
}

fn absolutify(path: &Path) -> io::Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    // Falls back to the joined path so a missing root is reported by the
    // existence check instead.
    Ok(path.canonicalize().unwrap_or(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.roots.is_empty());
        assert!(config.patterns.is_empty());
        assert_eq!(config.delay, Duration::from_millis(600));
        assert_eq!(config.max_offset, 400);
    }

    #[test]
    fn test_no_roots() {
        let err = Config::default().root_specs().unwrap_err();
        assert!(matches!(err, Error::NoRoots));
    }

    #[test]
    fn test_missing_root() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        let config = Config::new([tmp_dir.path().join("nope")]);

        let err = config.root_specs().unwrap_err();
        assert!(matches!(err, Error::RootNotFound { .. }));
    }

    #[test]
    fn test_bad_regex() {
        let tmp_dir = tempdir().expect("Failed to create tempdir");
        let config = Config::new([tmp_dir.path()]).with_patterns(["[unclosed"]);

        let err = config.root_specs().unwrap_err();
        assert!(matches!(err, Error::Regex { ref pattern, .. } if pattern == "[unclosed"));
    }

    #[test]
    fn test_positional_pairing() {
        let tmp_a = tempdir().expect("Failed to create tempdir");
        let tmp_b = tempdir().expect("Failed to create tempdir");
        let config = Config::new([tmp_a.path(), tmp_b.path()]).with_patterns([r"\.log$"]);

        let specs = config.root_specs().unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].root(), tmp_a.path().canonicalize().unwrap());
        assert_eq!(specs[0].pattern().map(Regex::as_str), Some(r"\.log$"));
        assert!(specs[1].pattern().is_none());

        assert!(specs[0].matches(Path::new("/a/app.log")));
        assert!(!specs[0].matches(Path::new("/a/app.txt")));
        assert!(specs[1].matches(Path::new("/b/app.txt")));
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let config = Config::new(["."]);
        let specs = config.root_specs().unwrap();
        assert!(specs[0].root().is_absolute());
    }
}
