//! Assembling a composite configuration from its model sections.

use tracing::debug;

use super::error::{CompositionError, ConfigError, SectionError};
use super::model::{self, short_type_name, Model};
use super::path::{self, KeyPath};
use super::source::Document;

/// A top-level configuration made of model sections.
///
/// `compose` declares every field through [`Sections`]. As with records,
/// read every section into a local before applying `?` so that all broken
/// sections are reported together:
///
/// ```
/// # use mdtc::{Composite, Fields, HasModelSpec, Model, ModelSpec, Plain, Record, Sections};
/// # struct Misc { foo: String }
/// # impl HasModelSpec for Misc { const SPEC: ModelSpec = ModelSpec::new("misc", "config.misc"); }
/// # impl Model for Misc { type Strategy = Plain; }
/// # impl Record for Misc {
/// #     fn read(f: &mut Fields<'_>) -> Option<Self> { let foo = f.required("foo"); Some(Self { foo: foo? }) }
/// # }
/// # struct Extra { level: i64 }
/// # impl HasModelSpec for Extra { const SPEC: ModelSpec = ModelSpec::new("extra", "config.extra"); }
/// # impl Model for Extra { type Strategy = Plain; }
/// # impl Record for Extra {
/// #     fn read(f: &mut Fields<'_>) -> Option<Self> { let level = f.required("level"); Some(Self { level: level? }) }
/// # }
/// struct AppConfig {
///     misc: Misc,
///     extra: Option<Extra>,
/// }
///
/// impl Composite for AppConfig {
///     fn compose(sections: &mut Sections<'_>) -> Option<Self> {
///         let misc = sections.required("misc");
///         let extra = sections.optional("extra");
///         Some(Self { misc: misc?, extra: extra? })
///     }
/// }
/// ```
pub trait Composite: Sized + Send + Sync + 'static {
    /// Returns `None` when any section failed; the failures are recorded in
    /// `sections`.
    fn compose(sections: &mut Sections<'_>) -> Option<Self>;
}

/// One declared section of a composite, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInfo {
    pub field: &'static str,
    pub model: &'static str,
    pub key: &'static str,
    pub required: bool,
    pub present: bool,
}

/// Collects the sections of one composite and every problem found in them.
#[derive(Debug)]
pub struct Sections<'a> {
    doc: &'a Document,
    declared: Vec<SectionInfo>,
    problems: Vec<SectionError>,
}

impl<'a> Sections<'a> {
    fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            declared: Vec::new(),
            problems: Vec::new(),
        }
    }

    /// Declares a section that must exist in the document.
    pub fn required<M: Model>(&mut self, field: &'static str) -> Option<M> {
        self.section(field, true).flatten()
    }

    /// Declares a section that may be absent.
    ///
    /// The outer `Option` is `None` when the section is present but invalid.
    pub fn optional<M: Model>(&mut self, field: &'static str) -> Option<Option<M>> {
        self.section(field, false)
    }

    fn section<M: Model>(&mut self, field: &'static str, required: bool) -> Option<Option<M>> {
        let spec = M::SPEC;
        let mut info = SectionInfo {
            field,
            model: spec.name,
            key: spec.key,
            required,
            present: false,
        };

        let doc = self.doc;
        let key = self.check_declaration::<M>(field);
        let section = key.as_ref().and_then(|key| path::resolve(doc.root(), key));
        info.present = section.is_some();
        self.declared.push(info);

        let key = key?;
        let Some(section) = section else {
            debug!(field, key = %key, "section absent");
            if required {
                self.problems.push(SectionError::MissingSection {
                    field,
                    key: key.to_string(),
                });
                return None;
            }
            return Some(None);
        };

        match model::build::<M>(section, &key) {
            Ok(model) => Some(Some(model)),
            Err(errors) => {
                self.problems
                    .extend(errors.into_iter().map(SectionError::Validation));
                None
            }
        }
    }

    /// Checks the model's metadata against the field and the sections
    /// declared so far. Problems are recorded; the key path is returned only
    /// if it parses.
    fn check_declaration<M: Model>(&mut self, field: &'static str) -> Option<KeyPath> {
        let spec = M::SPEC;

        if spec.name != field {
            self.problems.push(SectionError::NameMismatch {
                field,
                model: short_type_name::<M>(),
                name: spec.name,
            });
        }

        let Some(key) = spec.key_path() else {
            self.problems.push(SectionError::InvalidKeyPath {
                model: spec.name,
                key: spec.key.to_string(),
            });
            return None;
        };

        if let Some(first) = self
            .declared
            .iter()
            .find(|info| KeyPath::parse(info.key).as_ref() == Some(&key))
        {
            self.problems.push(SectionError::DuplicateKeyPath {
                key: key.to_string(),
                first: first.field,
                second: field,
            });
        }

        Some(key)
    }
}

/// A composed value together with the sections it was declared with.
#[derive(Debug)]
pub(crate) struct Composed<C> {
    pub value: C,
    pub sections: Vec<SectionInfo>,
}

/// Builds `C` from `doc`, reporting every missing or invalid section at once.
pub fn compose<C: Composite>(doc: &Document) -> Result<C, ConfigError> {
    compose_with_sections(doc).map(|composed| composed.value)
}

pub(crate) fn compose_with_sections<C: Composite>(
    doc: &Document,
) -> Result<Composed<C>, ConfigError> {
    let config = std::any::type_name::<C>();
    let mut sections = Sections::new(doc);
    let value = C::compose(&mut sections);

    if sections.declared.is_empty() {
        return Err(ConfigError::EmptyComposite { config });
    }
    if !sections.problems.is_empty() {
        let origin = doc.origin().to_string();
        return Err(CompositionError::new(config, origin, sections.problems).into());
    }

    match value {
        Some(value) => Ok(Composed {
            value,
            sections: sections.declared,
        }),
        None => Err(ConfigError::Incomplete { config }),
    }
}
