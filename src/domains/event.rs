use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

/// The three recordable business actions. The string forms are the wire
/// names used in the `events` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "set")]
    Set,
    #[serde(rename = "closed")]
    Closed,
    #[serde(rename = "install_sched")]
    InstallScheduled,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Set => "set",
            EventKind::Closed => "closed",
            EventKind::InstallScheduled => "install_sched",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "set" => Some(EventKind::Set),
            "closed" => Some(EventKind::Closed),
            "install_sched" => Some(EventKind::InstallScheduled),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Announcement lifecycle of a row. `Pending` between insert and the
/// message-id backfill; `Orphaned` when the announcement post failed.
/// Both non-finalized states are valid rows, not corruption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "finalized")]
    Finalized,
    #[serde(rename = "orphaned")]
    Orphaned,
}

impl MessageState {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageState::Pending => "pending",
            MessageState::Finalized => "finalized",
            MessageState::Orphaned => "orphaned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(MessageState::Pending),
            "finalized" => Some(MessageState::Finalized),
            "orphaned" => Some(MessageState::Orphaned),
            _ => None,
        }
    }
}

/// A not-yet-persisted event, carrying exactly the payload its kind needs.
#[derive(Debug, Clone)]
pub enum EventDraft {
    Set {
        actor_id: String,
        channel_id: String,
        customer_name: String,
        /// Business appointment moment, unix seconds; a date with no time
        /// is local midnight in the configured offset.
        set_at: i64,
        has_bill: bool,
    },
    Closed {
        actor_id: String,
        channel_id: String,
        customer_name: String,
        /// System size in kW.
        system_size: f64,
        setter_id: String,
    },
    InstallScheduled {
        actor_id: String,
        channel_id: String,
        customer_name: String,
        setter_id: String,
    },
}

impl EventDraft {
    pub fn kind(&self) -> EventKind {
        match self {
            EventDraft::Set { .. } => EventKind::Set,
            EventDraft::Closed { .. } => EventKind::Closed,
            EventDraft::InstallScheduled { .. } => EventKind::InstallScheduled,
        }
    }

    pub fn actor_id(&self) -> &str {
        match self {
            EventDraft::Set { actor_id, .. }
            | EventDraft::Closed { actor_id, .. }
            | EventDraft::InstallScheduled { actor_id, .. } => actor_id,
        }
    }

    pub fn channel_id(&self) -> &str {
        match self {
            EventDraft::Set { channel_id, .. }
            | EventDraft::Closed { channel_id, .. }
            | EventDraft::InstallScheduled { channel_id, .. } => channel_id,
        }
    }

    pub fn customer_name(&self) -> &str {
        match self {
            EventDraft::Set { customer_name, .. }
            | EventDraft::Closed { customer_name, .. }
            | EventDraft::InstallScheduled { customer_name, .. } => customer_name,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.customer_name().trim().is_empty() {
            return Err(LedgerError::Validation(
                "customer name is empty".to_string(),
            ));
        }
        if self.actor_id().is_empty() {
            return Err(LedgerError::Validation("actor id is empty".to_string()));
        }
        match self {
            EventDraft::Closed {
                system_size,
                setter_id,
                ..
            } => {
                if !system_size.is_finite() || *system_size <= 0.0 {
                    return Err(LedgerError::Validation(format!(
                        "system size must be a positive number, got {system_size}"
                    )));
                }
                if setter_id.is_empty() {
                    return Err(LedgerError::Validation("setter id is empty".to_string()));
                }
            }
            EventDraft::InstallScheduled { setter_id, .. } => {
                if setter_id.is_empty() {
                    return Err(LedgerError::Validation("setter id is empty".to_string()));
                }
            }
            EventDraft::Set { .. } => {}
        }
        Ok(())
    }
}

/// A persisted row of the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    pub id: i64,
    pub kind: EventKind,
    pub actor_id: String,
    pub channel_id: String,
    /// Ledger-insertion time, unix seconds; never business time.
    pub created_at: i64,
    pub message_id: Option<String>,
    pub message_state: MessageState,
    pub customer_name: String,
    pub set_at: Option<i64>,
    pub has_bill: Option<bool>,
    pub system_size: Option<f64>,
    pub setter_id: Option<String>,
}
