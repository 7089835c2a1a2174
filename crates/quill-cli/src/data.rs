//! Template variables loaded from TOML.
//!
//! Tables become maps, arrays become lists and datetimes are passed to
//! templates as their TOML text.

use std::{fs, io, path::Path};

use log::debug;

use quill::{QuillError, Value, Vars};

/// Load the top-level table of a TOML file as template variables.
///
/// # Errors
///
/// Returns [`QuillError::Io`] when the file cannot be read or is not valid
/// TOML.
pub fn load_data(path: impl AsRef<Path>) -> Result<Vars, QuillError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let vars = parse_data(&content).map_err(|err| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid data file {}: {err}", path.display()),
        )
    })?;
    debug!(path = path.display().to_string(), vars = vars.len(); "Loaded template data");
    Ok(vars)
}

fn parse_data(content: &str) -> Result<Vars, toml::de::Error> {
    let table: toml::Table = toml::from_str(content)?;
    Ok(table
        .into_iter()
        .map(|(key, value)| (key, to_value(value)))
        .collect())
}

fn to_value(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::from(s),
        toml::Value::Integer(i) => Value::Int(i),
        toml::Value::Float(f) => Value::Float(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::from(dt.to_string()),
        toml::Value::Array(items) => Value::list(items.into_iter().map(to_value)),
        toml::Value::Table(table) => {
            Value::map(table.into_iter().map(|(key, value)| (key, to_value(value))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_tables_and_arrays() {
        let vars = parse_data(
            r#"
            title = "Posts"
            count = 2
            published = 2024-05-01

            [[posts]]
            name = "first"
            tags = ["a", "b"]

            [[posts]]
            name = "second"
            tags = []
            "#,
        )
        .unwrap();

        assert_eq!(vars["title"].as_str(), Some("Posts"));
        assert_eq!(vars["count"].as_int(), Some(2));
        assert_eq!(vars["published"].to_string(), "2024-05-01");
        assert_eq!(
            vars["posts"].to_string(),
            "[{name: first, tags: [a, b]}, {name: second, tags: []}]"
        );
    }

    #[test]
    fn test_invalid_toml() {
        assert!(parse_data("title = ").is_err());
    }
}
