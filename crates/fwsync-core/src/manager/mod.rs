//! Lifecycle managers
//!
//! Each manager owns one list of records, a form session, and the store
//! handles it writes through. Methods take `&mut self` and await every store
//! call in turn, so a single user action never overlaps another.
//!
//! ## Session
//!
//! ```text
//!   Idle ── begin_create / begin_edit ──▶ Editing ── submit ──▶ Submitting
//!    ▲                                     ▲   │                    │
//!    │                                     │   └── cancel ──▶ Idle  │
//!    │                                     └──── failure (error) ───┤
//!    └──────────────────────── success ─────────────────────────────┘
//! ```
//!
//! ## Events
//!
//! Every manager is created together with a bounded receiver of
//! [`ManagerEvent`]s. When the receiver falls behind, events are dropped
//! with a warning rather than blocking the action that produced them.

use tokio::sync::mpsc;
use tracing::warn;

use crate::model::{ExecutionStatus, RecordId};

pub mod cloud_config;
pub mod rules;
pub mod settings;

pub use cloud_config::{CloudConfigForm, CloudConfigManager};
pub use rules::{
    CallOutcome, CallStatus, ConfigOption, ExecutionReport, ExpansionReport, ReportLevel,
    RuleForm, RuleManager, SubmitOutcome,
};
pub use settings::SettingsManager;

/// Events emitted by the managers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// Rule list replaced from the store
    RulesRefreshed { count: usize },

    /// Cloud config list replaced from the store
    ConfigsRefreshed { count: usize },

    /// A form session started or ended
    SessionChanged { editing: bool },

    /// One rule-creation call succeeded
    RuleCreated { id: RecordId, port: String },

    /// Multi-call expansion stopped early
    ExpansionIncomplete { created: usize, intended: usize },

    /// Rule updated in place
    RuleUpdated { id: RecordId },

    /// Rule deleted
    RuleDeleted { id: RecordId },

    /// Rule reconciled against the current IP
    RuleExecuted { id: RecordId, status: ExecutionStatus },

    /// Cloud config created or updated
    ConfigSaved { id: RecordId },

    /// Cloud config deleted
    ConfigDeleted { id: RecordId },

    /// System settings saved
    SettingsSaved,

    /// Backend re-synced the public IP
    IpSynced { current_ip: String },
}

/// Whether a form creates a new record or edits an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode<R> {
    /// New record
    Create,
    /// Existing record, as it was when editing began
    Edit(R),
}

/// Form session of a manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session<F, R> {
    /// No form open
    Idle,

    /// Form open for input
    Editing {
        mode: FormMode<R>,
        form: F,
        /// Message of the last failed submission
        error: Option<String>,
    },

    /// Store calls in flight
    Submitting { mode: FormMode<R>, form: F },
}

impl<F, R> Default for Session<F, R> {
    fn default() -> Self {
        Session::Idle
    }
}

impl<F, R> Session<F, R> {
    /// Whether a form is open (editing or submitting)
    pub fn is_open(&self) -> bool {
        !matches!(self, Session::Idle)
    }

    /// The open form, if any
    pub fn form(&self) -> Option<&F> {
        match self {
            Session::Idle => None,
            Session::Editing { form, .. } | Session::Submitting { form, .. } => Some(form),
        }
    }

    /// Error left by the last failed submission
    pub fn error(&self) -> Option<&str> {
        match self {
            Session::Editing { error, .. } => error.as_deref(),
            _ => None,
        }
    }

    /// Record under edit, if the form edits an existing one
    pub fn editing_record(&self) -> Option<&R> {
        match self {
            Session::Editing { mode: FormMode::Edit(record), .. }
            | Session::Submitting { mode: FormMode::Edit(record), .. } => Some(record),
            _ => None,
        }
    }

    pub(crate) fn form_mut(&mut self) -> Option<&mut F> {
        match self {
            Session::Editing { form, .. } => Some(form),
            _ => None,
        }
    }

    /// Move an open editing session into `Submitting`
    ///
    /// Returns the mode and a copy of the form, or `None` when no form is
    /// being edited.
    pub(crate) fn start_submit(&mut self) -> Option<(FormMode<R>, F)>
    where
        F: Clone,
        R: Clone,
    {
        match std::mem::take(self) {
            Session::Editing { mode, form, .. } => {
                *self = Session::Submitting {
                    mode: mode.clone(),
                    form: form.clone(),
                };
                Some((mode, form))
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Return to `Editing`, keeping the form and recording the error
    pub(crate) fn reopen(&mut self, mode: FormMode<R>, form: F, error: impl Into<String>) {
        *self = Session::Editing {
            mode,
            form,
            error: Some(error.into()),
        };
    }
}

/// Bounded, non-blocking event sender shared by the managers
#[derive(Debug, Clone)]
pub(crate) struct EventEmitter {
    tx: mpsc::Sender<ManagerEvent>,
}

impl EventEmitter {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<ManagerEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub(crate) fn emit(&self, event: ManagerEvent) {
        // A closed receiver means nobody is listening; that is fine.
        if let Err(mpsc::error::TrySendError::Full(event)) = self.tx.try_send(event) {
            warn!(
                "Event channel full, dropping {:?}. Consider increasing event_channel_capacity.",
                event
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_and_reopen_keep_form() {
        let mut session: Session<String, u32> = Session::Editing {
            mode: FormMode::Edit(7),
            form: "draft".to_string(),
            error: None,
        };

        let (mode, form) = session.start_submit().unwrap();
        assert!(matches!(session, Session::Submitting { .. }));
        assert_eq!(session.editing_record(), Some(&7));

        session.reopen(mode, form, "boom");
        assert_eq!(session.form().map(String::as_str), Some("draft"));
        assert_eq!(session.error(), Some("boom"));
    }

    #[test]
    fn test_start_submit_requires_editing() {
        let mut session: Session<String, u32> = Session::Idle;
        assert!(session.start_submit().is_none());
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_full_channel_drops_events() {
        let (emitter, mut rx) = EventEmitter::channel(1);
        emitter.emit(ManagerEvent::SettingsSaved);
        emitter.emit(ManagerEvent::RuleDeleted { id: 1 });

        assert_eq!(rx.recv().await, Some(ManagerEvent::SettingsSaved));
        assert!(rx.try_recv().is_err());
    }
}
