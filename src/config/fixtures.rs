//! Models shared by the unit tests.

use serde::Deserialize;
use validator::Validate;

use super::{Composite, Fields, HasModelSpec, Model, ModelSpec, Plain, Record, Schema, Sections};

#[derive(Debug, PartialEq)]
pub struct Misc {
    pub foo: String,
    pub retries: i64,
}

impl HasModelSpec for Misc {
    const SPEC: ModelSpec = ModelSpec::new("misc", "config.misc");
}

impl Model for Misc {
    type Strategy = Plain;
}

impl Record for Misc {
    fn read(fields: &mut Fields<'_>) -> Option<Self> {
        let foo = fields.required_with("foo", no_spaces);
        let retries = fields.or_default("retries");
        Some(Self {
            foo: foo?,
            retries: retries?,
        })
    }
}

pub fn no_spaces(value: String) -> Result<String, &'static str> {
    if value.contains(' ') {
        Err("must not contain spaces")
    } else {
        Ok(value)
    }
}

#[derive(Debug, PartialEq, Deserialize, Validate)]
pub struct Other {
    #[validate(range(min = 1))]
    pub bar: i64,
    #[serde(default)]
    pub names: Vec<String>,
}

impl HasModelSpec for Other {
    const SPEC: ModelSpec = ModelSpec::new("other", "config.other");
}

impl Model for Other {
    type Strategy = Schema;
}

#[derive(Debug)]
pub struct AppConfig {
    pub misc: Misc,
    pub other: Option<Other>,
}

impl Composite for AppConfig {
    fn compose(sections: &mut Sections<'_>) -> Option<Self> {
        let misc = sections.required("misc");
        let other = sections.optional("other");
        Some(Self {
            misc: misc?,
            other: other?,
        })
    }
}

/// Same sections as [`AppConfig`], but both required.
#[derive(Debug)]
pub struct StrictConfig {
    pub misc: Misc,
    pub other: Other,
}

impl Composite for StrictConfig {
    fn compose(sections: &mut Sections<'_>) -> Option<Self> {
        let misc = sections.required("misc");
        let other = sections.required("other");
        Some(Self {
            misc: misc?,
            other: other?,
        })
    }
}

pub const VALID: &str = r#"
[config.misc]
foo = "ab"
retries = 3

[config.other]
bar = 2
names = ["x", "y"]
"#;
