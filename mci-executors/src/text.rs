//! Text executor.

use async_trait::async_trait;
use mci_primitives::{Context, ExecutionConfig, ExecutionKind, ExecutionResult};
use mci_templates::TemplateEngine;

use crate::traits::{Executor, mismatch};

/// Renders literal text with full directive support. Performs no I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExecutor {
    engine: TemplateEngine,
}

impl TextExecutor {
    /// Creates a text executor.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: TemplateEngine::new(),
        }
    }
}

#[async_trait]
impl Executor for TextExecutor {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Text
    }

    async fn execute(&self, config: &ExecutionConfig, ctx: &Context) -> ExecutionResult {
        let ExecutionConfig::Text(text) = config else {
            return mismatch(ExecutionKind::Text, config);
        };
        match self.engine.render_advanced(&text.text, ctx) {
            Ok(rendered) => ExecutionResult::text(rendered),
            Err(err) => ExecutionResult::failure(err.to_string()),
        }
    }
}
