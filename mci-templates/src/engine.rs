use mci_primitives::Context;
use serde_json::Value;
use tracing::trace;

use crate::error::{TemplateError, TemplateResult};
use crate::parser::{Mode, Node, parse};
use crate::resolve::{Scope, describe, resolve};

/// Default cap on the loop iterations of a single render.
pub const MAX_LOOP_ITERATIONS: i64 = 100_000;

/// Renders templates against a [`Context`].
///
/// The engine holds no per-render state, so one instance can be shared by
/// every executor.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEngine {
    max_iterations: i64,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    /// Creates an engine with the default iteration limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_iterations: MAX_LOOP_ITERATIONS,
        }
    }

    /// Overrides the per-render iteration limit.
    ///
    /// Every `@for` and `@foreach` iteration counts, including those of
    /// nested loops.
    #[must_use]
    pub const fn with_max_iterations(mut self, limit: i64) -> Self {
        self.max_iterations = limit;
        self
    }

    /// Substitutes `{{...}}` placeholders only.
    ///
    /// `@` directives are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when a placeholder cannot be resolved or is empty.
    pub fn render_basic(&self, template: &str, ctx: &Context) -> TemplateResult<String> {
        if !template.contains("{{") {
            return Ok(template.to_owned());
        }
        self.render(template, Mode::Basic, ctx)
    }

    /// Expands `@for`, `@foreach` and `@if` blocks, then placeholders.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed or unterminated directives, unresolvable
    /// placeholders, non-iterable `@foreach` targets and loops exceeding the
    /// iteration limit.
    /// Conditions never raise: an unresolvable condition is false.
    pub fn render_advanced(&self, template: &str, ctx: &Context) -> TemplateResult<String> {
        if !template.contains("{{") && !template.contains('@') {
            return Ok(template.to_owned());
        }
        self.render(template, Mode::Advanced, ctx)
    }

    /// Applies [`render_basic`](Self::render_basic) to every string leaf of a
    /// JSON value. Object keys are never templated.
    ///
    /// # Errors
    ///
    /// Propagates the first placeholder error.
    pub fn render_value(&self, value: &Value, ctx: &Context) -> TemplateResult<Value> {
        Ok(match value {
            Value::String(text) => Value::String(self.render_basic(text, ctx)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.render_value(item, ctx))
                    .collect::<TemplateResult<_>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| Ok((key.clone(), self.render_value(item, ctx)?)))
                    .collect::<TemplateResult<_>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Looks up a dotted `namespace.path` and returns the raw value.
    ///
    /// # Errors
    ///
    /// Returns the same errors as placeholder resolution.
    pub fn lookup(&self, path: &str, ctx: &Context) -> TemplateResult<Value> {
        resolve(path.trim(), ctx, &Scope::default()).cloned()
    }

    fn render(&self, template: &str, mode: Mode, ctx: &Context) -> TemplateResult<String> {
        let nodes = parse(template, mode)?;
        trace!(nodes = nodes.len(), ?mode, "rendering template");
        let mut out = String::with_capacity(template.len());
        let mut scope = Scope::default();
        let mut budget = self.max_iterations;
        self.render_nodes(&nodes, ctx, &mut scope, &mut budget, &mut out)?;
        Ok(out)
    }

    fn render_nodes<'t>(
        &self,
        nodes: &[Node<'t>],
        ctx: &Context,
        scope: &mut Scope<'t>,
        budget: &mut i64,
        out: &mut String,
    ) -> TemplateResult<()> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Placeholder(placeholder) => out.push_str(&placeholder.render(ctx, scope)?),
                Node::For {
                    var,
                    start,
                    end,
                    body,
                } => {
                    let count = end.saturating_sub(*start);
                    if count > self.max_iterations {
                        return Err(TemplateError::RangeTooLarge {
                            start: *start,
                            end: *end,
                            limit: self.max_iterations,
                        });
                    }
                    for index in *start..*end {
                        self.spend(budget)?;
                        scope.push(*var, Value::from(index));
                        let rendered = self.render_nodes(body, ctx, scope, budget, out);
                        scope.pop();
                        rendered?;
                    }
                }
                Node::Foreach { var, path, body } => {
                    for item in iteration_items(path, ctx, scope)? {
                        self.spend(budget)?;
                        scope.push(*var, item);
                        let rendered = self.render_nodes(body, ctx, scope, budget, out);
                        scope.pop();
                        rendered?;
                    }
                }
                Node::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let branch = if condition.evaluate(ctx, scope) {
                        then_branch
                    } else {
                        else_branch
                    };
                    self.render_nodes(branch, ctx, scope, budget, out)?;
                }
            }
        }
        Ok(())
    }

    fn spend(&self, budget: &mut i64) -> TemplateResult<()> {
        if *budget <= 0 {
            return Err(TemplateError::TooManyIterations {
                limit: self.max_iterations,
            });
        }
        *budget -= 1;
        Ok(())
    }
}

/// Array elements in order, or object values in stored key order.
fn iteration_items(path: &str, ctx: &Context, scope: &Scope<'_>) -> TemplateResult<Vec<Value>> {
    let value = resolve(path, ctx, scope).map_err(|_| TemplateError::NotIterable {
        path: path.to_owned(),
        found: "no value".to_owned(),
    })?;
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Object(map) => Ok(map.values().cloned().collect()),
        other => Err(TemplateError::NotIterable {
            path: path.to_owned(),
            found: describe(other).to_owned(),
        }),
    }
}
