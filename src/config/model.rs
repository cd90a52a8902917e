//! Model declarations and the validation adapter.
//!
//! A model is a typed view of one TOML table. It declares where that table
//! lives through [`HasModelSpec`] and how it is validated through
//! [`Model::Strategy`]. Two strategies ship with the crate:
//!
//! - [`Plain`](super::record::Plain): records that read their own fields
//!   through a [`Fields`](super::record::Fields) reader.
//! - [`Schema`](super::schema::Schema): serde structs validated with the
//!   `validator` crate.
//!
//! Both report failures as [`ValidationError`]s, so the composer never needs
//! to know which one backs a given model.

use toml::Table;

use super::error::ValidationError;
use super::path::KeyPath;

/// Static metadata of a model: its name and the dotted key path of its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub key: &'static str,
}

impl ModelSpec {
    pub const fn new(name: &'static str, key: &'static str) -> Self {
        Self { name, key }
    }

    /// Parsed key path, or `None` if the declared key is malformed.
    pub fn key_path(&self) -> Option<KeyPath> {
        KeyPath::parse(self.key)
    }
}

/// Gives a model type its [`ModelSpec`].
pub trait HasModelSpec {
    const SPEC: ModelSpec;
}

/// A type that can be built from one configuration section.
///
/// ```
/// use mdtc::{HasModelSpec, Model, ModelSpec, Plain, Record, Fields};
///
/// struct Misc {
///     foo: String,
/// }
///
/// impl HasModelSpec for Misc {
///     const SPEC: ModelSpec = ModelSpec::new("misc", "config.misc");
/// }
///
/// impl Model for Misc {
///     type Strategy = Plain;
/// }
///
/// impl Record for Misc {
///     fn read(fields: &mut Fields<'_>) -> Option<Self> {
///         let foo = fields.required("foo");
///         Some(Self { foo: foo? })
///     }
/// }
/// ```
pub trait Model: HasModelSpec + Sized + Send + Sync + 'static {
    type Strategy: Strategy<Self>;
}

/// A way of turning a section table into a validated model.
pub trait Strategy<M> {
    /// Builds `M` from `section`, which was found at `key`.
    ///
    /// On failure every problem found is returned, not just the first.
    fn build(section: &Table, key: &KeyPath) -> Result<M, Vec<ValidationError>>;
}

/// Builds a model from its section using the model's declared strategy.
pub fn build<M: Model>(section: &Table, key: &KeyPath) -> Result<M, Vec<ValidationError>> {
    <M::Strategy as Strategy<M>>::build(section, key)
}

/// `alloc::vec::Vec<alloc::string::String>` becomes `Vec<String>`.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut out = String::with_capacity(full.len());
    let mut ident = String::new();

    for ch in full.chars() {
        if ch.is_alphanumeric() || ch == '_' || ch == ':' {
            ident.push(ch);
        } else {
            out.push_str(ident.rsplit("::").next().unwrap_or_default());
            ident.clear();
            out.push(ch);
        }
    }
    out.push_str(ident.rsplit("::").next().unwrap_or_default());
    out
}
