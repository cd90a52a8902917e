pub mod config;

pub use config::{
    Composite, CompositionError, ConfigError, Document, Fields, Frozen, HasModelSpec, KeyPath,
    Model, ModelSpec, Plain, Record, Registry, RegistryBuilder, Schema, SectionError, SectionInfo,
    Sections, Source, Strategy, ValidationError,
};
