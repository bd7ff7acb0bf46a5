//! Terminal confirmation prompts.

use async_trait::async_trait;
use fwsync_core::traits::{Confirm, ConfirmKind, ConfirmPrompt};
use tracing::warn;

/// Asks on the controlling terminal via `dialoguer`
///
/// A prompt that cannot be shown (no TTY, closed stdin) counts as "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        let (message, default) = match prompt.kind {
            ConfirmKind::Warning => (format!("WARNING: {}", prompt.message), false),
            ConfirmKind::Info => (prompt.message.clone(), true),
        };

        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(message)
                .default(default)
                .interact()
        })
        .await;

        match answer {
            Ok(Ok(confirmed)) => confirmed,
            Ok(Err(e)) => {
                warn!("Confirmation prompt failed: {}", e);
                false
            }
            Err(e) => {
                warn!("Confirmation prompt task failed: {}", e);
                false
            }
        }
    }
}
