//! Capability table and directive dispatch
//!
//! Tools are registered once at startup through [`ToolRegistryBuilder`];
//! the resulting table is immutable for the lifetime of the session. A
//! dispatch never aborts the turn: unknown names, arity mismatches, and
//! tool-internal failures all become a [`ToolResult`] with `success=false`.

use std::collections::BTreeMap;

use crate::directive::Directive;

/// Maximum characters of tool output folded back into the reply
pub const MAX_OUTPUT_CHARS: usize = 300;

/// How many registered names to list when a lookup fails
const NAME_SAMPLE: usize = 8;

/// Outcome of dispatching one directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// Whether the capability ran without failure
    pub success: bool,
    /// Producer-specific output, truncated without splitting a code point
    pub output: String,
}

/// Accepted argument count for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    min: usize,
    max: usize,
}

impl Arity {
    /// Exactly `n` arguments
    #[must_use]
    pub const fn exact(n: usize) -> Self {
        Self { min: n, max: n }
    }

    /// Between `min` and `max` arguments inclusive (trailing defaults)
    #[must_use]
    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    const fn accepts(self, n: usize) -> bool {
        n >= self.min && n <= self.max
    }

    fn mismatch_message(self, got: usize) -> String {
        if self.min == self.max {
            format!("expected {} arguments, got {got}", self.min)
        } else {
            format!("expected {} to {} arguments, got {got}", self.min, self.max)
        }
    }
}

/// A registered capability: a synchronous callable over positional string
/// arguments. Side effects belong to the callable; the registry's contract
/// is exactly one call per directive, in order.
type ToolFn = Box<dyn Fn(&[String]) -> std::result::Result<String, String> + Send + Sync>;

struct Capability {
    description: String,
    arity: Arity,
    run: ToolFn,
}

/// Builder assembling the full capability table before the session starts
#[derive(Default)]
pub struct ToolRegistryBuilder {
    entries: BTreeMap<String, Capability>,
}

impl ToolRegistryBuilder {
    /// Register a capability under `name`.
    ///
    /// Re-registering a name replaces the earlier entry; aliases register
    /// the same closure twice.
    #[must_use]
    pub fn register<F>(mut self, name: &str, description: &str, arity: Arity, run: F) -> Self
    where
        F: Fn(&[String]) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Capability {
                description: description.to_string(),
                arity,
                run: Box::new(run),
            },
        );
        self
    }

    /// Finalize the immutable table
    #[must_use]
    pub fn build(self) -> ToolRegistry {
        tracing::debug!(tools = self.entries.len(), "capability table built");
        ToolRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable name → capability table
pub struct ToolRegistry {
    entries: BTreeMap<String, Capability>,
}

impl ToolRegistry {
    /// Start building a registry
    #[must_use]
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    /// Number of registered capabilities
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// One `name(args): description` line per capability, for the system prompt
    #[must_use]
    pub fn descriptions(&self) -> String {
        let mut out = String::new();
        for (name, cap) in &self.entries {
            out.push_str("- ");
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&cap.description);
            out.push('\n');
        }
        out
    }

    /// Dispatch one directive to its capability.
    ///
    /// Never fails the turn: every failure mode is reported inside the
    /// returned [`ToolResult`].
    #[must_use]
    pub fn dispatch(&self, directive: &Directive) -> ToolResult {
        let Some(capability) = self.entries.get(&directive.name) else {
            tracing::warn!(tool = %directive.name, "unknown tool requested");
            return ToolResult {
                success: false,
                output: format!(
                    "{} not found, available: {}",
                    directive.name,
                    self.name_sample()
                ),
            };
        };

        let got = directive.arguments.len();
        if !capability.arity.accepts(got) {
            return ToolResult {
                success: false,
                output: capability.arity.mismatch_message(got),
            };
        }

        tracing::debug!(tool = %directive.name, args = got, "dispatching tool");

        match (capability.run)(&directive.arguments) {
            Ok(output) => ToolResult {
                success: true,
                output: truncate_chars(&output, MAX_OUTPUT_CHARS),
            },
            Err(reason) => {
                tracing::warn!(tool = %directive.name, reason = %reason, "tool failed");
                ToolResult {
                    success: false,
                    output: truncate_chars(&reason, MAX_OUTPUT_CHARS),
                }
            }
        }
    }

    /// Dispatch a batch sequentially, preserving source order.
    #[must_use]
    pub fn dispatch_all(&self, directives: &[Directive]) -> Vec<ToolResult> {
        directives.iter().map(|d| self.dispatch(d)).collect()
    }

    fn name_sample(&self) -> String {
        let mut sample: Vec<&str> = self.names().take(NAME_SAMPLE).collect();
        if self.entries.len() > NAME_SAMPLE {
            sample.push("...");
        }
        sample.join(", ")
    }
}

/// Truncate to at most `max` characters on a code-point boundary.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((cut, _)) => format!("{} ... (truncated)", &s[..cut]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_registry() -> ToolRegistry {
        ToolRegistry::builder()
            .register("echo", "repeat the argument", Arity::exact(1), |args| {
                Ok(args[0].clone())
            })
            .register("fail", "always fails", Arity::exact(0), |_| {
                Err("it broke".to_string())
            })
            .build()
    }

    fn directive(name: &str, args: &[&str]) -> Directive {
        Directive {
            name: name.to_string(),
            arguments: args.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn unknown_tool_reports_available_names() {
        let registry = echo_registry();
        let result = registry.dispatch(&directive("nope", &[]));
        assert!(!result.success);
        assert!(result.output.contains("nope not found"));
        assert!(result.output.contains("echo"));
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let registry = echo_registry();
        let result = registry.dispatch(&directive("echo", &["a", "b"]));
        assert!(!result.success);
        assert_eq!(result.output, "expected 1 arguments, got 2");
    }

    #[test]
    fn tool_failure_is_data_not_control_flow() {
        let registry = echo_registry();
        let result = registry.dispatch(&directive("fail", &[]));
        assert!(!result.success);
        assert_eq!(result.output, "it broke");
    }

    #[test]
    fn results_preserve_source_order() {
        let registry = echo_registry();
        let results = registry.dispatch_all(&[
            directive("echo", &["first"]),
            directive("echo", &["second"]),
        ]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].output, "first");
        assert_eq!(results[1].output, "second");
    }

    #[test]
    fn truncation_respects_code_points() {
        let long = "é".repeat(MAX_OUTPUT_CHARS + 50);
        let registry = ToolRegistry::builder()
            .register("big", "long output", Arity::exact(0), move |_| {
                Ok(long.clone())
            })
            .build();
        let result = registry.dispatch(&directive("big", &[]));
        assert!(result.success);
        assert!(result.output.ends_with("... (truncated)"));
        assert_eq!(
            result.output.chars().filter(|&c| c == 'é').count(),
            MAX_OUTPUT_CHARS
        );
    }

    #[test]
    fn arity_range_accepts_defaults() {
        let registry = ToolRegistry::builder()
            .register("opt", "optional second arg", Arity::range(1, 2), |args| {
                Ok(format!("{}", args.len()))
            })
            .build();
        assert!(registry.dispatch(&directive("opt", &["a"])).success);
        assert!(registry.dispatch(&directive("opt", &["a", "b"])).success);
        assert!(!registry.dispatch(&directive("opt", &[])).success);
    }
}
