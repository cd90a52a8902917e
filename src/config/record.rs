//! Plain records: models that read their own fields.

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use super::error::ValidationError;
use super::model::{short_type_name, Strategy};
use super::path::KeyPath;

/// A model assembled field by field through a [`Fields`] reader.
///
/// Read every field into a local first and only then apply `?`, so that a
/// bad field does not hide the ones after it. Keys that `read` never looks
/// at are reported as unknown unless it calls
/// [`allow_unknown`](Fields::allow_unknown):
///
/// ```
/// use mdtc::{Fields, Record};
///
/// struct Server {
///     host: String,
///     port: u16,
///     tags: Vec<String>,
/// }
///
/// impl Record for Server {
///     fn read(fields: &mut Fields<'_>) -> Option<Self> {
///         let host = fields.required_with("host", |h: String| {
///             if h.contains(' ') { Err("must not contain spaces") } else { Ok(h) }
///         });
///         let port = fields.or_default("port");
///         let tags = fields.or_default("tags");
///         Some(Self { host: host?, port: port?, tags: tags? })
///     }
/// }
/// ```
pub trait Record: Sized {
    /// Returns `None` when any field failed; the failures are recorded in
    /// `fields`.
    fn read(fields: &mut Fields<'_>) -> Option<Self>;
}

/// Strategy for [`Record`] models.
#[derive(Debug)]
pub enum Plain {}

impl<M: Record> Strategy<M> for Plain {
    fn build(section: &Table, key: &KeyPath) -> Result<M, Vec<ValidationError>> {
        let section_key = key.to_string();
        let mut errors = Vec::new();
        let built = {
            let mut fields = Fields::new(section, &section_key, &mut errors);
            let built = M::read(&mut fields);
            fields.reject_unknown();
            built
        };

        match built {
            Some(model) if errors.is_empty() => Ok(model),
            _ => {
                if errors.is_empty() {
                    errors.push(ValidationError::new(
                        section_key,
                        "",
                        "record rejected the section without naming a field",
                    ));
                }
                Err(errors)
            }
        }
    }
}

/// Reads typed fields out of one section table, collecting every failure.
///
/// Values are converted with serde, so the declared type of each field
/// drives coercion: strings, integers, floats, booleans, arrays, maps, and
/// any `Deserialize` type. Nested tables can also be read as records with
/// [`record`](Self::record).
#[derive(Debug)]
pub struct Fields<'a> {
    table: &'a Table,
    section: &'a str,
    prefix: String,
    errors: &'a mut Vec<ValidationError>,
    consumed: BTreeSet<&'a str>,
    allow_unknown: bool,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(
        table: &'a Table,
        section: &'a str,
        errors: &'a mut Vec<ValidationError>,
    ) -> Self {
        Self::nested(table, section, String::new(), errors)
    }

    fn nested(
        table: &'a Table,
        section: &'a str,
        prefix: String,
        errors: &'a mut Vec<ValidationError>,
    ) -> Self {
        Self {
            table,
            section,
            prefix,
            errors,
            consumed: BTreeSet::new(),
            allow_unknown: false,
        }
    }

    /// Accepts keys of this table that are never read. Applies to this
    /// table only, not to nested records.
    pub fn allow_unknown(&mut self) {
        self.allow_unknown = true;
    }

    /// The raw value under `key`, if any. Records no error, but marks the
    /// key as read.
    pub fn raw(&mut self, key: &str) -> Option<&'a Value> {
        self.lookup(key)
    }

    /// Reads a field that must be present.
    pub fn required<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        match self.lookup(key) {
            Some(value) => self.convert(key, value),
            None => {
                let expected = short_type_name::<T>();
                self.fail(key, format!("missing required field (expected {expected})"));
                None
            }
        }
    }

    /// Reads a field that must be present, then passes it through `check`.
    ///
    /// `check` runs only once the field is present and well typed. It may
    /// transform the value; an `Err` is recorded against the field.
    pub fn required_with<T, U, E, F>(&mut self, key: &str, check: F) -> Option<U>
    where
        T: DeserializeOwned,
        E: Display,
        F: FnOnce(T) -> Result<U, E>,
    {
        let value = self.required::<T>(key)?;
        self.check(key, value, check)
    }

    /// Reads a field that may be absent.
    ///
    /// The outer `Option` is `None` when the field is present but invalid.
    pub fn optional<T: DeserializeOwned>(&mut self, key: &str) -> Option<Option<T>> {
        match self.lookup(key) {
            Some(value) => self.convert(key, value).map(Some),
            None => Some(None),
        }
    }

    /// Like [`optional`](Self::optional), running `check` on a present value.
    pub fn optional_with<T, U, E, F>(&mut self, key: &str, check: F) -> Option<Option<U>>
    where
        T: DeserializeOwned,
        E: Display,
        F: FnOnce(T) -> Result<U, E>,
    {
        match self.optional::<T>(key)? {
            Some(value) => self.check(key, value, check).map(Some),
            None => Some(None),
        }
    }

    /// Reads a field, falling back to `T::default()` when it is absent.
    pub fn or_default<T: DeserializeOwned + Default>(&mut self, key: &str) -> Option<T> {
        self.optional(key).map(Option::unwrap_or_default)
    }

    /// Reads a nested table as a record. Failures inside it are reported
    /// with the nested field path, e.g. `server.tls.cert`.
    pub fn record<R: Record>(&mut self, key: &str) -> Option<R> {
        let Some(value) = self.lookup(key) else {
            let expected = short_type_name::<R>();
            self.fail(key, format!("missing required table (expected {expected})"));
            return None;
        };
        let Some(table) = value.as_table() else {
            self.fail(key, format!("expected a table, found {}", value.type_str()));
            return None;
        };

        let before = self.errors.len();
        let prefix = self.field_path(key);
        let built = {
            let mut nested = Fields::nested(table, self.section, prefix, &mut *self.errors);
            let built = R::read(&mut nested);
            nested.reject_unknown();
            built
        };

        match built {
            Some(record) if self.errors.len() == before => Some(record),
            Some(_) => None,
            None => {
                if self.errors.len() == before {
                    self.fail(key, "record rejected the table without naming a field");
                }
                None
            }
        }
    }

    /// Like [`record`](Self::record), but an absent table is not an error.
    pub fn optional_record<R: Record>(&mut self, key: &str) -> Option<Option<R>> {
        match self.table.get(key) {
            Some(_) => self.record(key).map(Some),
            None => Some(None),
        }
    }

    /// Records a failure against `key`. Useful for cross-field checks.
    pub fn fail(&mut self, key: &str, reason: impl Into<String>) {
        let field = self.field_path(key);
        self.errors.push(ValidationError::new(self.section, field, reason));
    }

    fn lookup(&mut self, key: &str) -> Option<&'a Value> {
        let table = self.table;
        let (key, value) = table.get_key_value(key)?;
        self.consumed.insert(key.as_str());
        Some(value)
    }

    /// Records an error for every key of the table that was never read.
    fn reject_unknown(&mut self) {
        if self.allow_unknown {
            return;
        }
        let table = self.table;
        for key in table.keys() {
            if !self.consumed.contains(key.as_str()) {
                self.fail(key, "unknown field");
            }
        }
    }

    fn convert<T: DeserializeOwned>(&mut self, key: &str, value: &Value) -> Option<T> {
        let converted: Result<T, _> = value.clone().try_into();
        match converted {
            Ok(converted) => Some(converted),
            Err(e) => {
                let expected = short_type_name::<T>();
                self.fail(
                    key,
                    format!("expected {expected}: {}", e.message().trim_end()),
                );
                None
            }
        }
    }

    fn check<T, U, E, F>(&mut self, key: &str, value: T, check: F) -> Option<U>
    where
        E: Display,
        F: FnOnce(T) -> Result<U, E>,
    {
        match check(value) {
            Ok(checked) => Some(checked),
            Err(e) => {
                self.fail(key, e.to_string());
                None
            }
        }
    }

    fn field_path(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.prefix)
        }
    }
}
