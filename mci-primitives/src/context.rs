//! Per-call execution context.
//!
//! A [`Context`] carries two disjoint mappings: caller-supplied properties
//! and trusted environment variables. Templates reach them through the
//! `props`/`input` and `env` namespaces respectively; the accessors on
//! [`Context`] are the only way to obtain either mapping, so a lookup in one
//! namespace can never observe the other.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// JSON object used for both the property bag and the environment.
pub type PropertyMap = Map<String, Value>;

/// Builds a [`PropertyMap`] from string pairs (e.g. environment variables).
#[must_use]
pub fn string_map<I, K, V>(pairs: I) -> PropertyMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), Value::String(value.into())))
        .collect()
}

/// Root segment of a placeholder path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// User-supplied properties.
    Props,
    /// Trusted environment variables.
    Env,
    /// Backward-compatible alias of [`Namespace::Props`].
    Input,
}

impl Namespace {
    /// Every recognised namespace.
    pub const ALL: [Namespace; 3] = [Namespace::Props, Namespace::Env, Namespace::Input];

    /// Returns the namespace matching the supplied path segment exactly.
    #[must_use]
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "props" => Some(Self::Props),
            "env" => Some(Self::Env),
            "input" => Some(Self::Input),
            _ => None,
        }
    }

    /// Returns the segment spelling of the namespace.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Props => "props",
            Self::Env => "env",
            Self::Input => "input",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_segment(s).ok_or_else(|| Error::InvalidDefinition {
            reason: format!("unknown namespace `{s}`"),
        })
    }
}

/// Checks file paths before an executor touches the filesystem.
pub trait PathValidator: Send + Sync {
    /// Returns an error when the supplied path must not be accessed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathDenied`] when the path falls outside the policy.
    fn validate(&self, path: &str) -> Result<()>;
}

/// Immutable per-call context consumed by the template engine and executors.
#[derive(Clone, Default)]
pub struct Context {
    props: Arc<PropertyMap>,
    env: Arc<PropertyMap>,
    path_validator: Option<Arc<dyn PathValidator>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keys only: values may be secrets.
        f.debug_struct("Context")
            .field("props", &self.props.keys().collect::<Vec<_>>())
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("path_validator", &self.path_validator.is_some())
            .finish()
    }
}

impl Context {
    /// Creates a context from a property bag and environment mapping.
    #[must_use]
    pub fn new(props: PropertyMap, env: PropertyMap) -> Self {
        Self {
            props: Arc::new(props),
            env: Arc::new(env),
            path_validator: None,
        }
    }

    /// Attaches a path validator consulted by the file executor.
    #[must_use]
    pub fn with_path_validator(mut self, validator: Arc<dyn PathValidator>) -> Self {
        self.path_validator = Some(validator);
        self
    }

    /// Returns a context sharing this environment but with no properties.
    ///
    /// Used for provisioning-time templating where per-call input must not
    /// be reachable.
    #[must_use]
    pub fn env_only(&self) -> Self {
        Self {
            props: Arc::new(PropertyMap::new()),
            env: Arc::clone(&self.env),
            path_validator: None,
        }
    }

    /// Caller-supplied properties.
    #[must_use]
    pub fn props(&self) -> &PropertyMap {
        &self.props
    }

    /// Alias of [`Context::props`]; returns the very same mapping.
    #[must_use]
    pub fn input(&self) -> &PropertyMap {
        &self.props
    }

    /// Trusted environment variables.
    #[must_use]
    pub fn env(&self) -> &PropertyMap {
        &self.env
    }

    /// Returns the root mapping for the supplied namespace.
    #[must_use]
    pub fn namespace(&self, namespace: Namespace) -> &PropertyMap {
        match namespace {
            Namespace::Props | Namespace::Input => &self.props,
            Namespace::Env => &self.env,
        }
    }

    /// Optional path validator.
    #[must_use]
    pub fn path_validator(&self) -> Option<&dyn PathValidator> {
        self.path_validator.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> Context {
        let props = json!({ "KEY": "from-props" });
        let env = string_map([("KEY", "from-env")]);
        Context::new(props.as_object().cloned().unwrap(), env)
    }

    #[test]
    fn namespaces_are_disjoint() {
        let ctx = context();
        assert_eq!(ctx.namespace(Namespace::Props)["KEY"], "from-props");
        assert_eq!(ctx.namespace(Namespace::Env)["KEY"], "from-env");
    }

    #[test]
    fn input_aliases_props_identity() {
        let ctx = context();
        assert!(std::ptr::eq(ctx.input(), ctx.props()));
        assert!(std::ptr::eq(
            ctx.namespace(Namespace::Input),
            ctx.namespace(Namespace::Props)
        ));
    }

    #[test]
    fn env_only_drops_props() {
        let ctx = context().env_only();
        assert!(ctx.props().is_empty());
        assert_eq!(ctx.env()["KEY"], "from-env");
    }

    #[test]
    fn namespace_parsing_is_exact() {
        assert_eq!(Namespace::from_segment("env"), Some(Namespace::Env));
        assert_eq!(Namespace::from_segment("Env"), None);
        assert!("props".parse::<Namespace>().is_ok());
        assert!("KEY".parse::<Namespace>().is_err());
    }

    #[test]
    fn debug_output_hides_values() {
        let rendered = format!("{:?}", context());
        assert!(rendered.contains("KEY"));
        assert!(!rendered.contains("from-env"));
    }
}
