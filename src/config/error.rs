use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config from {origin}: {source}")]
    ParseError {
        origin: String,
        source: toml::de::Error,
    },

    #[error(transparent)]
    Invalid(#[from] CompositionError),

    #[error("`{config}` declares no model sections")]
    EmptyComposite { config: &'static str },

    #[error("`{config}` did not produce a value and reported no errors")]
    Incomplete { config: &'static str },

    #[error("`{config}` loaded from {origin} is frozen and cannot be replaced")]
    Immutable { config: &'static str, origin: String },
}

impl ConfigError {
    /// Returns true for file and syntax level failures, which abort before
    /// any section is looked at.
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound(_) | Self::ReadError { .. } | Self::ParseError { .. }
        )
    }

    /// The aggregated section problems, if this is a composition failure.
    pub fn problems(&self) -> &[SectionError] {
        match self {
            Self::Invalid(e) => e.problems(),
            _ => &[],
        }
    }
}

/// Every problem found while composing one configuration, reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionError {
    config: &'static str,
    origin: String,
    problems: Vec<SectionError>,
}

impl CompositionError {
    pub(crate) fn new(config: &'static str, origin: String, problems: Vec<SectionError>) -> Self {
        Self {
            config,
            origin,
            problems,
        }
    }

    pub fn config(&self) -> &'static str {
        self.config
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn problems(&self) -> &[SectionError] {
        &self.problems
    }
}

impl fmt::Display for CompositionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` from {} has {} problem(s):",
            self.config,
            self.origin,
            self.problems.len()
        )?;
        for problem in &self.problems {
            write!(f, "\n  - {problem}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompositionError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum SectionError {
    #[error("missing section `{key}` required by field `{field}`")]
    MissingSection { field: &'static str, key: String },

    #[error("model `{model}` declares an invalid key path `{key}`")]
    InvalidKeyPath { model: &'static str, key: String },

    #[error("field `{field}` holds model `{model}`, which is named `{name}`")]
    NameMismatch {
        field: &'static str,
        model: String,
        name: &'static str,
    },

    #[error("key path `{key}` is claimed by both `{first}` and `{second}`")]
    DuplicateKeyPath {
        key: String,
        first: &'static str,
        second: &'static str,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A field level failure inside one section.
///
/// `section` is the dotted key path of the section and `field` the dotted
/// path of the field inside it (empty for section wide failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    section: String,
    field: String,
    reason: String,
}

impl ValidationError {
    pub fn new(
        section: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn section(&self) -> &str {
        &self.section
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Full dotted path, e.g. `config.misc.foo`.
    pub fn path(&self) -> String {
        match (self.section.is_empty(), self.field.is_empty()) {
            (_, true) => self.section.clone(),
            (true, false) => self.field.clone(),
            (false, false) => format!("{}.{}", self.section, self.field),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path(), self.reason)
    }
}

impl std::error::Error for ValidationError {}
