//! Schema-validated models backed by serde and the `validator` crate.

use serde::de::DeserializeOwned;
use toml::Table;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use super::error::ValidationError;
use super::model::Strategy;
use super::path::KeyPath;

/// Strategy for models that derive `Deserialize` and `Validate`.
///
/// The section is deserialized as a whole, then `validate()` runs. Custom
/// checks are declared the `validator` way, with
/// `#[validate(custom(function = "..."))]`; nested structs need
/// `#[validate(nested)]` to be checked.
///
/// ```
/// use mdtc::{HasModelSpec, Model, ModelSpec, Schema};
/// use serde::Deserialize;
/// use validator::Validate;
///
/// #[derive(Deserialize, Validate)]
/// struct Database {
///     #[validate(length(min = 1))]
///     host: String,
///     #[validate(range(min = 1, max = 65535))]
///     port: u32,
/// }
///
/// impl HasModelSpec for Database {
///     const SPEC: ModelSpec = ModelSpec::new("database", "config.database");
/// }
///
/// impl Model for Database {
///     type Strategy = Schema;
/// }
/// ```
#[derive(Debug)]
pub enum Schema {}

impl<M: DeserializeOwned + Validate> Strategy<M> for Schema {
    fn build(section: &Table, key: &KeyPath) -> Result<M, Vec<ValidationError>> {
        let section_key = key.to_string();

        // Going through text keeps spans, which locate the offending key.
        let text = section.to_string();
        let model: M = toml::from_str(&text)
            .map_err(|e| vec![deserialize_error(&section_key, &text, &e)])?;

        model
            .validate()
            .map_err(|errors| flatten(&section_key, &errors))?;

        Ok(model)
    }
}

/// Maps a serde failure onto the field it concerns.
///
/// The error span locates it in `text`: a missing field is reported under
/// the table the span points at, anything else under the key whose value
/// the span points at. Without a span the field named in the message is
/// used.
fn deserialize_error(section: &str, text: &str, error: &toml::de::Error) -> ValidationError {
    let message = error.message().trim_end();
    let missing = named_field(message, "missing field `");
    let located = error.span().and_then(|span| match missing {
        Some(name) => table_at(text, &span).map(|table| join(&table, name)),
        None => key_at(text, span.start),
    });
    let field = located
        .or_else(|| {
            ["missing field `", "unknown field `", "duplicate field `"]
                .iter()
                .find_map(|prefix| named_field(message, prefix))
                .map(str::to_string)
        })
        .unwrap_or_default();

    ValidationError::new(section, field, message)
}

fn named_field<'m>(message: &'m str, prefix: &str) -> Option<&'m str> {
    message.strip_prefix(prefix)?.split('`').next()
}

/// Where an offset falls in serialized TOML.
#[derive(Debug, PartialEq)]
struct Location {
    /// Dotted path of the enclosing `[table]`, empty for the root.
    table: String,
    /// Dotted key of the line, `None` on a table header.
    key: Option<String>,
    line_start: usize,
}

fn locate(text: &str, offset: usize) -> Option<Location> {
    let mut table = String::new();
    // delimiter and key of a multi-line string still open
    let mut open: Option<(&str, String)> = None;
    let mut start = 0;

    for line in text.split_inclusive('\n') {
        let end = start + line.len();
        let hit = (start..end).contains(&offset);

        if let Some((delimiter, key)) = &open {
            if hit {
                return Some(Location {
                    table,
                    key: Some(key.clone()),
                    line_start: start,
                });
            }
            if line.contains(*delimiter) {
                open = None;
            }
        } else {
            let trimmed = line.trim();
            if trimmed.starts_with('[') {
                let header = trimmed.trim_start_matches('[').trim_end_matches(']');
                table = dotted(header);
                if hit {
                    return Some(Location {
                        table,
                        key: None,
                        line_start: start,
                    });
                }
            } else if let Some((key, value)) = split_key(trimmed) {
                let key = dotted(key);
                if hit {
                    return Some(Location {
                        table,
                        key: Some(key),
                        line_start: start,
                    });
                }
                open = opens_multiline(value).map(|delimiter| (delimiter, key));
            } else if hit {
                return None;
            }
        }
        start = end;
    }
    None
}

/// Dotted key of the line containing `offset`.
fn key_at(text: &str, offset: usize) -> Option<String> {
    let location = locate(text, offset)?;
    Some(match location.key {
        Some(key) => join(&location.table, &key),
        None => location.table,
    })
}

/// Dotted path of the table whose span is `span`.
///
/// A table's span starts at its header, at the start of the root table, or
/// at the opening brace of an inline table.
fn table_at(text: &str, span: &std::ops::Range<usize>) -> Option<String> {
    // the root table of a document without top-level keys
    if span.is_empty() {
        return Some(String::new());
    }
    let location = locate(text, span.start)?;
    Some(match location.key {
        Some(_) if span.start == location.line_start => location.table,
        Some(key) => join(&location.table, &key),
        None => location.table,
    })
}

fn join(table: &str, key: &str) -> String {
    if table.is_empty() {
        key.to_string()
    } else {
        format!("{table}.{key}")
    }
}

/// Splits `key = value` on the first `=` outside a quoted key.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let index = unquoted(line).find(|&(_, c)| c == '=')?.0;
    Some((&line[..index], &line[index + 1..]))
}

/// Unquoted dotted key, e.g. `a."b.c"` becomes `a.b.c`.
fn dotted(key: &str) -> String {
    let mut segments = Vec::new();
    let mut from = 0;
    for (index, _) in unquoted(key).filter(|&(_, c)| c == '.') {
        segments.push(unquote(&key[from..index]));
        from = index + 1;
    }
    segments.push(unquote(&key[from..]));
    segments.join(".")
}

/// Characters of `text` that are outside `"..."` and `'...'`.
fn unquoted(text: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut quote = None;
    let mut escaped = false;
    text.char_indices().filter(move |&(_, c)| {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => return true,
        }
        false
    })
}

fn unquote(segment: &str) -> String {
    let segment = segment.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = segment
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    segment.to_string()
}

fn opens_multiline(value: &str) -> Option<&'static str> {
    let value = value.trim_start();
    ["\"\"\"", "'''"]
        .into_iter()
        .find(|delimiter| {
            value
                .strip_prefix(*delimiter)
                .is_some_and(|rest| !rest.contains(*delimiter))
        })
}

/// Flattens `validator`'s nested error tree into dotted field paths, sorted
/// so reports are stable.
fn flatten(section: &str, errors: &ValidationErrors) -> Vec<ValidationError> {
    let mut out = Vec::new();
    collect(section, "", errors, &mut out);
    out.sort_by_key(ValidationError::path);
    out
}

fn collect(section: &str, prefix: &str, errors: &ValidationErrors, out: &mut Vec<ValidationError>) {
    for (field, kind) in errors.errors() {
        let path = match (prefix.is_empty(), field.as_ref()) {
            // struct level (schema) errors belong to the enclosing table
            (_, "__all__") => prefix.to_string(),
            (true, field) => field.to_string(),
            (false, field) => format!("{prefix}.{field}"),
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for error in field_errors {
                    out.push(ValidationError::new(section, path.clone(), describe(error)));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect(section, &path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(section, &format!("{path}[{index}]"), nested, out);
                }
            }
        }
    }
}

fn describe(error: &validator::ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => format!("failed `{}` check", error.code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Retry {
        #[validate(range(min = 1, max = 10))]
        attempts: u32,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Upstream {
        #[validate(custom(function = "validate_no_spaces"))]
        name: String,
        #[validate(range(min = 1, max = 65535))]
        port: u32,
        #[serde(default)]
        tags: Vec<String>,
        #[validate(nested)]
        retry: Retry,
    }

    fn validate_no_spaces(value: &str) -> Result<(), validator::ValidationError> {
        if value.contains(' ') {
            Err(validator::ValidationError::new("no_spaces")
                .with_message("must not contain spaces".into()))
        } else {
            Ok(())
        }
    }

    fn build_upstream(toml_str: &str) -> Result<Upstream, Vec<ValidationError>> {
        let table: Table = toml::from_str(toml_str).unwrap();
        Schema::build(&table, &KeyPath::parse("config.upstream").unwrap())
    }

    #[test]
    fn test_valid_section_builds() {
        let upstream = build_upstream(
            r#"
            name = "primary"
            port = 443
            tags = ["eu"]
            retry = { attempts = 3 }
            "#,
        )
        .unwrap();

        assert_eq!(upstream.name, "primary");
        assert_eq!(upstream.port, 443);
        assert_eq!(upstream.tags, ["eu"]);
        assert_eq!(upstream.retry.attempts, 3);
    }

    #[test]
    fn test_validation_errors_are_translated() {
        let errors = build_upstream(
            r#"
            name = "has space"
            port = 0
            retry = { attempts = 99 }
            "#,
        )
        .unwrap_err();

        let paths: Vec<String> = errors.iter().map(ValidationError::path).collect();
        assert_eq!(
            paths,
            [
                "config.upstream.name",
                "config.upstream.port",
                "config.upstream.retry.attempts",
            ]
        );
        assert_eq!(errors[0].reason(), "must not contain spaces");
        assert_eq!(errors[1].reason(), "failed `range` check");
    }

    #[test]
    fn test_missing_field_is_named() {
        let errors = build_upstream(
            r#"
            port = 80
            retry = { attempts = 1 }
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field(), "name");
        assert_eq!(errors[0].path(), "config.upstream.name");
    }

    #[test]
    fn test_type_mismatch_names_the_key() {
        let errors = build_upstream(
            r#"
            name = "primary"
            port = "eighty"
            retry = { attempts = 1 }
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "config.upstream.port");
        assert!(errors[0].reason().contains("invalid type"));
    }

    #[test]
    fn test_nested_type_mismatch_is_located() {
        let errors = build_upstream(
            r#"
            name = "primary"
            port = 80

            [retry]
            attempts = true
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "config.upstream.retry.attempts");
    }

    #[test]
    fn test_nested_missing_field_is_located() {
        let errors = build_upstream(
            r#"
            name = "primary"
            port = 80

            [retry]
            other = 1
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "config.upstream.retry.attempts");
        assert!(errors[0].reason().contains("missing field"));

        let errors = build_upstream("[retry]\nattempts = 1\n").unwrap_err();
        assert_eq!(errors[0].path(), "config.upstream.name");
    }

    #[test]
    fn test_multiline_string_does_not_move_the_table() {
        let errors = build_upstream(
            r#"
            name = "primary"
            note = """
            line
            [fake]
            """
            port = "eighty"
            retry = { attempts = 1 }
            "#,
        )
        .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path(), "config.upstream.port");
    }

    #[test]
    fn test_key_at_skips_quotes_and_multiline_strings() {
        let text = "\"a=b\" = 1\nnote = \"\"\"\n[fake]\n\"\"\"\nport = 2\n[\"x.y\".z]\nk = 1\n";
        assert_eq!(key_at(text, 0).as_deref(), Some("a=b"));
        assert_eq!(key_at(text, text.find("[fake]").unwrap()).as_deref(), Some("note"));
        assert_eq!(key_at(text, text.find("port").unwrap()).as_deref(), Some("port"));
        assert_eq!(key_at(text, text.find("k =").unwrap()).as_deref(), Some("x.y.z.k"));
    }

    #[test]
    fn test_table_at_distinguishes_root_headers_and_inline_tables() {
        let text = "name = \"x\"\nretry = { attempts = 1 }\n\n[upstream]\nport = 1\n";
        assert_eq!(table_at(text, &(0..0)).as_deref(), Some(""));
        assert_eq!(table_at(text, &(0..5)).as_deref(), Some(""));

        let brace = text.find('{').unwrap();
        assert_eq!(table_at(text, &(brace..brace + 1)).as_deref(), Some("retry"));

        let header = text.find("[upstream]").unwrap();
        assert_eq!(table_at(text, &(header..header + 10)).as_deref(), Some("upstream"));
    }

    #[test]
    fn test_key_at_tracks_table_headers() {
        let text = "name = \"x\"\n\n[retry]\nattempts = 1\n";
        assert_eq!(key_at(text, 2).as_deref(), Some("name"));
        assert_eq!(key_at(text, 13).as_deref(), Some("retry"));
        assert_eq!(key_at(text, text.len() - 2).as_deref(), Some("retry.attempts"));
        assert_eq!(key_at(text, text.len() + 5), None);
    }
}
