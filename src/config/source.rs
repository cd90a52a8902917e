//! Configuration sources and the parsed document they produce.

use std::fmt;
use std::path::{Path, PathBuf};

use toml::Table;
use tracing::debug;

use super::ConfigError;

/// Where a configuration document comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A TOML file on disk.
    Path(PathBuf),
    /// Raw TOML text.
    Text(String),
    /// An already parsed table.
    Table(Table),
}

impl Source {
    pub fn path(path: impl AsRef<Path>) -> Self {
        Self::Path(path.as_ref().to_path_buf())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Identity used to key cached singletons.
    ///
    /// With `canonicalize` set, paths are resolved through the filesystem so
    /// that different spellings of one file share a key. A path that cannot
    /// be canonicalized (usually because it does not exist) is kept as given;
    /// loading it will fail anyway.
    pub(crate) fn key(&self, canonicalize: bool) -> SourceKey {
        match self {
            Self::Path(path) if canonicalize => {
                SourceKey::Path(std::fs::canonicalize(path).unwrap_or_else(|_| path.clone()))
            }
            Self::Path(path) => SourceKey::Path(path.clone()),
            Self::Text(text) => SourceKey::Text(text.clone()),
            Self::Table(table) => SourceKey::Table(table.to_string()),
        }
    }

    /// Reads and parses the source into a document.
    pub fn load(&self) -> Result<Document, ConfigError> {
        let origin = self.to_string();
        debug!(origin = %origin, "loading config document");

        let root = match self {
            Self::Path(path) => {
                let contents = read_config_file(path)?;
                parse(&contents, &origin)?
            }
            Self::Text(text) => parse(text, &origin)?,
            Self::Table(table) => table.clone(),
        };

        Ok(Document { origin, root })
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&PathBuf> for Source {
    fn from(path: &PathBuf) -> Self {
        Self::Path(path.clone())
    }
}

impl From<Table> for Source {
    fn from(table: Table) -> Self {
        Self::Table(table)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "'{}'", path.display()),
            Self::Text(text) => write!(f, "<inline toml, {} bytes>", text.len()),
            Self::Table(table) => write!(f, "<table, {} keys>", table.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum SourceKey {
    Path(PathBuf),
    Text(String),
    Table(String),
}

/// A parsed configuration document. Lives only for the duration of one
/// composition; built configs keep no reference to it.
#[derive(Debug, Clone)]
pub struct Document {
    origin: String,
    root: Table,
}

impl Document {
    pub fn new(origin: impl Into<String>, root: Table) -> Self {
        Self {
            origin: origin.into(),
            root,
        }
    }

    /// Human readable identifier of the source, used in diagnostics.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn root(&self) -> &Table {
        &self.root
    }
}

fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ConfigError::FileNotFound(path.to_path_buf()),
        _ => ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn parse(contents: &str, origin: &str) -> Result<Table, ConfigError> {
    toml::from_str(contents).map_err(|e| ConfigError::ParseError {
        origin: origin.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_path_source_loads_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "key = \"value\"").unwrap();

        let doc = Source::path(file.path()).load().unwrap();

        assert_eq!(
            doc.root().get("key"),
            Some(&toml::Value::String("value".into()))
        );
        assert!(doc.origin().contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_path_source_missing_file() {
        let result = Source::path("/nonexistent/path/config.toml").load();

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_text_source_parses() {
        let doc = Source::text("[server]\nport = 8080\n").load().unwrap();
        assert_eq!(doc.root()["server"]["port"].as_integer(), Some(8080));
        assert!(doc.origin().starts_with("<inline toml"));
    }

    #[test]
    fn test_syntax_error_carries_origin() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "key = = broken").unwrap();

        let err = Source::path(file.path()).load().unwrap_err();

        assert!(err.is_load_error());
        match err {
            ConfigError::ParseError { origin, .. } => {
                assert!(origin.contains(&file.path().display().to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_table_source_is_used_as_is() {
        let mut table = Table::new();
        table.insert("name".into(), toml::Value::String("demo".into()));

        let doc = Source::from(table.clone()).load().unwrap();
        assert_eq!(doc.root(), &table);
    }

    #[test]
    fn test_path_key_is_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let file = dir.path().join("app.toml");
        std::fs::write(&file, "").unwrap();
        let roundabout = dir.path().join("nested").join("..").join("app.toml");

        assert_eq!(
            Source::path(&roundabout).key(true),
            Source::path(&file).key(true)
        );
        assert_ne!(
            Source::path(&roundabout).key(false),
            Source::path(&file).key(false)
        );
    }
}
