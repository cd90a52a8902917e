//! Model-driven configuration: load a TOML document, map its sections onto
//! typed models, freeze the result, and cache it per source.

mod compose;
mod error;
mod frozen;
mod model;
mod path;
mod record;
mod registry;
mod schema;
mod source;

#[cfg(test)]
mod fixtures;

pub use compose::{compose, Composite, SectionInfo, Sections};
pub use error::{CompositionError, ConfigError, SectionError, ValidationError};
pub use frozen::Frozen;
pub use model::{build, HasModelSpec, Model, ModelSpec, Strategy};
pub use path::{resolve, KeyPath};
pub use record::{Fields, Plain, Record};
pub use registry::{Registry, RegistryBuilder};
pub use schema::Schema;
pub use source::{Document, Source};
