//! Evaluation context: rendering limits threaded through the tree walk.

use attest_core::Value;

use crate::config::EvalConfig;

#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    pub config: EvalConfig,
}

impl EvalContext {
    pub fn new(config: EvalConfig) -> Self {
        EvalContext { config }
    }

    /// Render a value for a description, eliding long sequences and text.
    pub fn show(&self, value: &Value) -> String {
        match value {
            Value::List(items) if items.len() > self.config.max_items => {
                let shown: Vec<String> = items
                    .iter()
                    .take(self.config.max_items)
                    .map(|v| self.show(v))
                    .collect();
                format!(
                    "[{}, ... ({} more)]",
                    shown.join(", "),
                    items.len() - self.config.max_items
                )
            }
            Value::List(items) => {
                let shown: Vec<String> = items.iter().map(|v| self.show(v)).collect();
                format!("[{}]", shown.join(", "))
            }
            Value::Text(s) if s.chars().count() > self.config.max_text_len => {
                let head: String = s.chars().take(self.config.max_text_len).collect();
                format!("{:?}...", head)
            }
            other => other.to_string(),
        }
    }
}
