//! Path resolution against the context and loop scope.

use mci_primitives::{Context, Namespace};
use serde_json::Value;

use crate::error::{TemplateError, TemplateResult};

/// Loop variables bound while rendering directive bodies.
#[derive(Debug, Default)]
pub(crate) struct Scope<'t> {
    bindings: Vec<(&'t str, Value)>,
}

impl<'t> Scope<'t> {
    pub(crate) fn push(&mut self, name: &'t str, value: Value) {
        self.bindings.push((name, value));
    }

    pub(crate) fn pop(&mut self) {
        self.bindings.pop();
    }

    fn lookup(&self, name: &str) -> Option<&Value> {
        self.bindings
            .iter()
            .rev()
            .find(|(bound, _)| *bound == name)
            .map(|(_, value)| value)
    }
}

/// Resolves a dotted path.
///
/// The first segment selects a loop variable (innermost first) or one of the
/// context namespaces; nothing else is a valid root.
pub(crate) fn resolve<'c>(
    path: &str,
    ctx: &'c Context,
    scope: &'c Scope<'_>,
) -> TemplateResult<&'c Value> {
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();

    let mut current = if let Some(bound) = scope.lookup(root) {
        bound
    } else {
        let namespace =
            Namespace::from_segment(root).ok_or_else(|| TemplateError::UnknownNamespace {
                path: path.to_owned(),
                root: root.to_owned(),
            })?;
        let key = segments.next().ok_or_else(|| TemplateError::IncompletePath {
            path: path.to_owned(),
        })?;
        ctx.namespace(namespace)
            .get(key)
            .ok_or_else(|| TemplateError::MissingKey {
                path: path.to_owned(),
                key: key.to_owned(),
            })?
    };

    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment).ok_or_else(|| TemplateError::MissingKey {
                path: path.to_owned(),
                key: segment.to_owned(),
            })?,
            _ => {
                return Err(TemplateError::NonDictAccess {
                    path: path.to_owned(),
                    key: segment.to_owned(),
                });
            }
        };
    }

    Ok(current)
}

/// Converts a resolved value into its substitution text.
///
/// Strings are inserted as-is; every other value uses its JSON spelling.
#[must_use]
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Truthiness used by `@if` conditions and boolean CLI flags.
///
/// `null`, `false`, numeric zero and the empty string are false; every other
/// value is true.
#[must_use]
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Numeric view of a value for ordered comparisons.
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Short type description used in error messages.
pub(crate) fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One alternative of a placeholder expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Alternative<'t> {
    Path(&'t str),
    Literal(&'t str),
}

/// Parsed `{{ ... }}` body: one or more `|`-separated alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Placeholder<'t> {
    alternatives: Vec<Alternative<'t>>,
}

impl<'t> Placeholder<'t> {
    pub(crate) fn parse(inner: &'t str) -> TemplateResult<Self> {
        let mut alternatives = Vec::new();
        for part in split_alternatives(inner) {
            let part = part.trim();
            if part.is_empty() {
                return Err(TemplateError::syntax(format!(
                    "empty placeholder expression in '{{{{{}}}}}'",
                    inner.trim()
                )));
            }
            alternatives.push(match unquote(part) {
                Some(literal) => Alternative::Literal(literal),
                None => Alternative::Path(part),
            });
        }
        Ok(Self { alternatives })
    }

    /// Resolves the first alternative that succeeds.
    ///
    /// When none does, the error of the first path is reported.
    pub(crate) fn render(&self, ctx: &Context, scope: &Scope<'_>) -> TemplateResult<String> {
        let mut first_error = None;
        for alternative in &self.alternatives {
            match alternative {
                Alternative::Literal(literal) => return Ok((*literal).to_owned()),
                Alternative::Path(path) => match resolve(path, ctx, scope) {
                    Ok(value) => return Ok(stringify(value)),
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                },
            }
        }
        Err(first_error.unwrap_or_else(|| TemplateError::syntax("empty placeholder")))
    }
}

/// Splits on `|` outside quotes.
fn split_alternatives(inner: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    for (idx, ch) in inner.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, '|') => {
                parts.push(&inner[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&inner[start..]);
    parts
}

/// Returns the body of a single- or double-quoted literal.
pub(crate) fn unquote(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' || first == b'\'') && first == last {
            return Some(&text[1..text.len() - 1]);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use mci_primitives::string_map;
    use serde_json::json;

    fn ctx() -> Context {
        let props = json!({
            "name": "Alice",
            "value": "string",
            "user": { "profile": { "name": "Bob" } }
        });
        Context::new(
            props.as_object().cloned().unwrap(),
            string_map([("API_KEY", "secret123")]),
        )
    }

    #[test]
    fn resolves_nested_path() {
        let ctx = ctx();
        let scope = Scope::default();
        assert_eq!(
            resolve("props.user.profile.name", &ctx, &scope).unwrap(),
            "Bob"
        );
    }

    #[test]
    fn missing_key_reports_not_found() {
        let ctx = ctx();
        let scope = Scope::default();
        let err = resolve("props.user.email", &ctx, &scope).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("props.user.email"));
    }

    #[test]
    fn non_dict_access_is_distinct() {
        let ctx = ctx();
        let scope = Scope::default();
        let err = resolve("props.value.invalid", &ctx, &scope).unwrap_err();
        assert!(matches!(err, TemplateError::NonDictAccess { .. }));
        assert!(err.to_string().contains("non-dict"));
    }

    #[test]
    fn bare_keys_and_env_names_are_not_roots() {
        let ctx = ctx();
        let scope = Scope::default();
        assert!(matches!(
            resolve("API_KEY", &ctx, &scope),
            Err(TemplateError::UnknownNamespace { .. })
        ));
        assert!(matches!(
            resolve("props", &ctx, &scope),
            Err(TemplateError::IncompletePath { .. })
        ));
    }

    #[test]
    fn scope_bindings_shadow_in_order() {
        let ctx = ctx();
        let mut scope = Scope::default();
        scope.push("item", json!("outer"));
        scope.push("item", json!({ "field": "inner" }));
        assert_eq!(resolve("item.field", &ctx, &scope).unwrap(), "inner");
        scope.pop();
        assert_eq!(resolve("item", &ctx, &scope).unwrap(), "outer");
    }

    #[test]
    fn truthiness_table() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&falsy), "{falsy} should be falsy");
        }
        for truthy in [json!(true), json!(1), json!("0"), json!([]), json!({})] {
            assert!(is_truthy(&truthy), "{truthy} should be truthy");
        }
    }

    #[test]
    fn stringify_uses_json_spelling_for_non_strings() {
        assert_eq!(stringify(&json!("text")), "text");
        assert_eq!(stringify(&json!(30)), "30");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!(null)), "null");
        assert_eq!(stringify(&json!(["a", 1])), r#"["a",1]"#);
    }

    #[test]
    fn fallback_alternatives_resolve_left_to_right() {
        let ctx = ctx();
        let scope = Scope::default();
        let placeholder = Placeholder::parse(" env.MISSING | env.API_KEY | '/tmp' ").unwrap();
        assert_eq!(placeholder.render(&ctx, &scope).unwrap(), "secret123");

        let placeholder = Placeholder::parse("env.MISSING | \"a|b\"").unwrap();
        assert_eq!(placeholder.render(&ctx, &scope).unwrap(), "a|b");

        let placeholder = Placeholder::parse("env.MISSING | env.OTHER").unwrap();
        let err = placeholder.render(&ctx, &scope).unwrap_err();
        assert!(err.to_string().contains("env.MISSING"));
    }
}
