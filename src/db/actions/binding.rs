//! Named-placeholder resolution.
//!
//! Catalog statements use `:name` placeholders. Each one is replaced from a
//! binding map either by positional `?` markers (values are bound) or by raw
//! text (trusted field names spliced into the SQL). Field names must be
//! plain identifiers; anything else is rejected as a setup error so caller
//! data can never reach the SQL text.

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::warn;

use crate::db::error::DbError;
use crate::db::value::SqlValue;

/// What a placeholder expands to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A single bound value: `?`.
    Value(SqlValue),
    /// Bound values joined as `?, ?, ?`.
    ValueList(Vec<SqlValue>),
    /// A trusted identifier spliced in verbatim.
    FieldEntry(String),
    /// Trusted identifiers joined as `a, b, c`.
    FieldList(Vec<String>),
    /// `a= ?, b= ?` with the values bound in the given order.
    FieldValueMap(Vec<(String, SqlValue)>),
}

impl Binding {
    pub fn value(value: impl Into<SqlValue>) -> Self {
        Binding::Value(value.into())
    }
}

/// Placeholder name (including the leading colon) to binding.
pub type BindingMap = BTreeMap<String, Binding>;

/// Build a `BindingMap` from `":name" => value` pairs.
#[macro_export]
macro_rules! bindings {
    () => { $crate::db::actions::BindingMap::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::db::actions::BindingMap::new();
        $( map.insert(String::from($key), $crate::db::actions::Binding::value($value)); )+
        map
    }};
}

/// SQL with positional markers plus the values to bind, in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedStatement {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r":[A-Za-z0-9]+").expect("placeholder pattern is valid"))
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"))
}

fn trusted_identifier(name: &str) -> Result<&str, DbError> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        warn!("Refusing to splice {:?} into SQL as a field name. This is a setup error!", name);
        Err(DbError::Setup(format!("invalid field name {:?}", name)))
    }
}

fn markers(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Replace every `:name` placeholder in `sql` from `bindings`.
pub fn resolve(sql: &str, bindings: &BindingMap) -> Result<ResolvedStatement, DbError> {
    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut last = 0;

    for found in placeholder_pattern().find_iter(sql) {
        out.push_str(&sql[last..found.start()]);
        last = found.end();

        let name = found.as_str();
        let Some(binding) = bindings.get(name) else {
            warn!("Missing place holder {} in binding map. The following values are defined for this action: {:?}. This is a setup error!",
                name, bindings.keys().collect::<Vec<_>>());
            return Err(DbError::Setup(format!("missing placeholder {}", name)));
        };

        match binding {
            Binding::Value(value) => {
                out.push('?');
                values.push(value.clone());
            }
            Binding::ValueList(list) => {
                out.push_str(&markers(list.len()));
                values.extend(list.iter().cloned());
            }
            Binding::FieldEntry(field) => out.push_str(trusted_identifier(field)?),
            Binding::FieldList(fields) => {
                let names = fields
                    .iter()
                    .map(|f| trusted_identifier(f))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push_str(&names.join(", "));
            }
            Binding::FieldValueMap(pairs) => {
                let mut parts = Vec::with_capacity(pairs.len());
                for (field, value) in pairs {
                    parts.push(format!("{}= ?", trusted_identifier(field)?));
                    values.push(value.clone());
                }
                out.push_str(&parts.join(", "));
            }
        }
    }
    out.push_str(&sql[last..]);

    Ok(ResolvedStatement { sql: out, values })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_become_positional_markers() {
        let map = bindings! { ":albumRoot" => 3i64, ":relativePath" => "/2023" };
        let resolved = resolve(
            "DELETE FROM Albums WHERE albumRoot=:albumRoot AND relativePath=:relativePath;",
            &map,
        )
        .unwrap();
        assert_eq!(
            resolved.sql,
            "DELETE FROM Albums WHERE albumRoot=? AND relativePath=?;"
        );
        assert_eq!(
            resolved.values,
            vec![SqlValue::Integer(3), SqlValue::Text("/2023".into())]
        );
    }

    #[test]
    fn test_upsert_expansion_keeps_field_order() {
        let mut map = BindingMap::new();
        map.insert(":id".into(), Binding::value(10i64));
        map.insert(
            ":fieldList".into(),
            Binding::FieldList(vec!["rating".into(), "width".into()]),
        );
        map.insert(
            ":valueList".into(),
            Binding::ValueList(vec![SqlValue::Integer(4), SqlValue::Integer(640)]),
        );
        map.insert(
            ":fieldValueList".into(),
            Binding::FieldValueMap(vec![
                ("rating".into(), SqlValue::Integer(4)),
                ("width".into(), SqlValue::Integer(640)),
            ]),
        );
        let resolved = resolve(
            "INSERT INTO ImageInformation (imageid, :fieldList) VALUES (:id, :valueList) \
             ON CONFLICT (imageid) DO UPDATE SET :fieldValueList;",
            &map,
        )
        .unwrap();
        assert_eq!(
            resolved.sql,
            "INSERT INTO ImageInformation (imageid, rating, width) VALUES (?, ?, ?) \
             ON CONFLICT (imageid) DO UPDATE SET rating= ?, width= ?;"
        );
        assert_eq!(resolved.values.len(), 5);
        assert_eq!(resolved.values[0], SqlValue::Integer(10));
    }

    #[test]
    fn test_missing_placeholder_is_a_setup_error() {
        let err = resolve("SELECT * FROM Tags WHERE id=:tagID", &BindingMap::new()).unwrap_err();
        assert!(matches!(err, DbError::Setup(_)));
    }

    #[test]
    fn test_untrusted_field_name_rejected() {
        let mut map = BindingMap::new();
        map.insert(
            ":fieldList".into(),
            Binding::FieldList(vec!["name; DROP TABLE Images".into()]),
        );
        assert!(resolve("SELECT :fieldList FROM Images", &map).is_err());
    }
}
