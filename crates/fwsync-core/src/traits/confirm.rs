// # Confirmation Capability
//
// Destructive or outward-facing actions (deleting a rule or config,
// executing a rule against the provider) ask the caller first. The
// managers only see a yes/no answer, so they can be driven by a terminal
// prompt, a dialog, or a fixed decision in tests.

use async_trait::async_trait;

/// Severity of the action being confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmKind {
    /// Informational (e.g. execute a rule now)
    Info,
    /// Destructive (e.g. delete)
    Warning,
}

/// A question put to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmPrompt {
    /// Question text
    pub message: String,
    /// Severity
    pub kind: ConfirmKind,
}

impl ConfirmPrompt {
    /// A destructive-action prompt
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ConfirmKind::Warning,
        }
    }

    /// An informational prompt
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ConfirmKind::Info,
        }
    }
}

/// Caller-supplied confirmation step
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Ask the operator; `true` lets the action proceed
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Answers every prompt the same way (`--yes`, scripted use)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConfirm(pub bool);

#[async_trait]
impl Confirm for StaticConfirm {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        self.0
    }
}
