//! `@if` condition grammar and evaluation.
//!
//! ```text
//! condition := path | path OP literal
//! OP        := == | != | > | < | >= | <=
//! literal   := "string" | 'string' | number
//! ```
//!
//! A path that fails to resolve makes the whole condition false; conditions
//! never raise at render time.

use std::cmp::Ordering;

use mci_primitives::Context;

use crate::error::{TemplateError, TemplateResult};
use crate::resolve::{Scope, as_number, is_truthy, resolve, stringify, unquote};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Operator {
    // Two-character operators first so `>=` is not read as `>`.
    const TOKENS: [(&'static str, Operator); 6] = [
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        (">=", Operator::Ge),
        ("<=", Operator::Le),
        (">", Operator::Gt),
        ("<", Operator::Lt),
    ];

    fn compare(self, left: f64, right: f64) -> bool {
        match self {
            Self::Eq => left.partial_cmp(&right) == Some(Ordering::Equal),
            Self::Ne => left.partial_cmp(&right) != Some(Ordering::Equal),
            Self::Gt => left > right,
            Self::Lt => left < right,
            Self::Ge => left >= right,
            Self::Le => left <= right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Literal<'t> {
    Str(&'t str),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition<'t> {
    path: &'t str,
    comparison: Option<(Operator, Literal<'t>)>,
}

impl<'t> Condition<'t> {
    pub(crate) fn parse(source: &'t str) -> TemplateResult<Self> {
        let source = source.trim();
        if source.is_empty() {
            return Err(TemplateError::syntax("@if requires a condition"));
        }

        let Some((at, operator, token)) = find_operator(source) else {
            return Ok(Self {
                path: source,
                comparison: None,
            });
        };

        let path = source[..at].trim();
        let raw = source[at + token.len()..].trim();
        if path.is_empty() || raw.is_empty() {
            return Err(TemplateError::syntax(format!(
                "incomplete comparison in condition '{source}'"
            )));
        }

        let literal = if let Some(text) = unquote(raw) {
            Literal::Str(text)
        } else if let Ok(number) = raw.parse::<f64>() {
            Literal::Number(number)
        } else {
            return Err(TemplateError::syntax(format!(
                "expected a quoted string or number after '{token}' in condition '{source}'"
            )));
        };

        Ok(Self {
            path,
            comparison: Some((operator, literal)),
        })
    }

    pub(crate) fn evaluate(&self, ctx: &Context, scope: &Scope<'_>) -> bool {
        let Ok(value) = resolve(self.path, ctx, scope) else {
            return false;
        };

        match &self.comparison {
            None => is_truthy(value),
            Some((operator, Literal::Number(expected))) => {
                as_number(value).is_some_and(|actual| operator.compare(actual, *expected))
            }
            Some((Operator::Eq, Literal::Str(expected))) => stringify(value) == *expected,
            Some((Operator::Ne, Literal::Str(expected))) => stringify(value) != *expected,
            // Ordering is numeric only.
            Some((_, Literal::Str(_))) => false,
        }
    }
}

/// Finds the first comparison operator outside quotes.
fn find_operator(source: &str) -> Option<(usize, Operator, &'static str)> {
    let mut quote = None;
    for (idx, ch) in source.char_indices() {
        match (quote, ch) {
            (None, '\'' | '"') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, '=' | '!' | '<' | '>') => {
                let rest = &source[idx..];
                if let Some((token, operator)) = Operator::TOKENS
                    .iter()
                    .find(|(token, _)| rest.starts_with(token))
                {
                    return Some((idx, *operator, *token));
                }
            }
            _ => {}
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
        let props = json!({ "name": "Alice", "age": 30, "count": "7", "empty": "", "tiny": 1e-17 });
        Context::new(
            props.as_object().cloned().unwrap(),
            string_map([("MODE", "production")]),
        )
    }

    fn eval(source: &str) -> bool {
        Condition::parse(source)
            .unwrap()
            .evaluate(&ctx(), &Scope::default())
    }

    #[test]
    fn truthiness_conditions() {
        assert!(eval("props.name"));
        assert!(!eval("props.empty"));
        assert!(!eval("props.missing"));
        assert!(!eval("nonsense.path"));
    }

    #[test]
    fn string_equality() {
        assert!(eval(r#"props.name == "Alice""#));
        assert!(eval("props.name == 'Alice'"));
        assert!(!eval(r#"props.name == "Bob""#));
        assert!(eval(r#"props.name != "Bob""#));
        assert!(eval(r#"env.MODE == "production""#));
    }

    #[test]
    fn numeric_equality_is_exact() {
        assert!(!eval("props.tiny == 0"));
        assert!(eval("props.tiny != 0"));
        assert!(eval("props.tiny > 0"));
        assert!(eval("props.age == 30.0"));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(eval("props.age == 30"));
        assert!(eval("props.age > 25"));
        assert!(!eval("props.age > 35"));
        assert!(eval("props.age < 35"));
        assert!(!eval("props.age < 25"));
        assert!(eval("props.age >= 30"));
        assert!(!eval("props.age >= 31"));
        assert!(eval("props.age <= 30"));
        assert!(!eval("props.age <= 29"));
    }

    #[test]
    fn numeric_literal_coerces_strings() {
        assert!(eval("props.count > 5"));
        assert!(!eval("props.name > 5"));
    }

    #[test]
    fn ordering_with_string_literal_is_false() {
        assert!(!eval(r#"props.name > "A""#));
    }

    #[test]
    fn missing_path_is_false_for_every_operator() {
        assert!(!eval(r#"props.missing != "x""#));
        assert!(!eval("props.missing <= 10"));
    }

    #[test]
    fn operators_inside_quotes_are_ignored() {
        let condition = Condition::parse(r#"props.name == "a==b""#).unwrap();
        assert_eq!(condition.path, "props.name");
        assert_eq!(
            condition.comparison,
            Some((Operator::Eq, Literal::Str("a==b")))
        );
    }

    #[test]
    fn malformed_literals_rejected() {
        assert!(Condition::parse("props.name == Alice").is_err());
        assert!(Condition::parse("== 3").is_err());
        assert!(Condition::parse("  ").is_err());
    }
}
